// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module mocker: mock functions, spies, and mock metadata.
//!
//! The mocker owns every mock function it creates, so the bulk operations
//! (`clear_all`, `reset_all`, `restore_all`) can reach all of them. Mock
//! metadata is a structural description of a module's exports from which a
//! fully mocked replica can be synthesized.

use crate::value::{JsArray, JsFunction, JsObject, NativeFn, Value};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors from mocker operations.
#[derive(Debug, Error)]
pub enum MockError {
    /// `spy_on` target was not an object or function.
    #[error("Cannot spy on '{0}': target has no properties")]
    NotAnObject(String),

    /// `spy_on` property was missing or not a function.
    #[error("Cannot spy on property '{0}': value is not a function")]
    NotAFunction(String),
}

/// Recording state attached to a mock function.
#[derive(Default)]
pub struct MockState {
    calls: Mutex<Vec<Vec<Value>>>,
    results: Mutex<Vec<Value>>,
    implementation: Mutex<Option<NativeFn>>,
}

impl MockState {
    /// Records the arguments of a call.
    pub fn record_call(&self, args: Vec<Value>) {
        self.calls.lock().push(args);
    }

    /// Records the value a call returned.
    pub fn record_result(&self, value: Value) {
        self.results.lock().push(value);
    }

    /// Snapshot of recorded call argument lists.
    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Snapshot of recorded results.
    pub fn results(&self) -> Vec<Value> {
        self.results.lock().clone()
    }

    /// Replaces the mock implementation.
    pub fn set_implementation(&self, implementation: Option<NativeFn>) {
        *self.implementation.lock() = implementation;
    }

    /// Current mock implementation, if any.
    pub fn implementation(&self) -> Option<NativeFn> {
        self.implementation.lock().clone()
    }

    /// Drops recorded calls and results.
    pub fn clear(&self) {
        self.calls.lock().clear();
        self.results.lock().clear();
    }

    /// Drops recordings and the implementation.
    pub fn reset(&self) {
        self.clear();
        *self.implementation.lock() = None;
    }
}

/// Structural description of a value, used to synthesize automocks.
#[derive(Debug, Clone)]
pub enum MockMetadata {
    /// A primitive carried over verbatim.
    Constant(Value),
    /// A callable with named properties.
    Function {
        /// Function name.
        name: String,
        /// Metadata for properties hanging off the function.
        members: BTreeMap<String, MockMetadata>,
    },
    /// A plain object.
    Object {
        /// Metadata per property.
        members: BTreeMap<String, MockMetadata>,
    },
    /// An array.
    Array {
        /// Metadata per element.
        items: Vec<MockMetadata>,
    },
}

struct Spy {
    target: JsObject,
    key: String,
    original: Value,
}

/// Factory and registry for mock functions and spies.
#[derive(Default)]
pub struct ModuleMocker {
    mocks: Mutex<Vec<JsFunction>>,
    spies: Mutex<Vec<Spy>>,
}

impl ModuleMocker {
    /// Creates a new mocker with no registered mocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording mock function.
    ///
    /// The implementation, when given, is installed on the mock state so
    /// `reset_all` removes it again.
    pub fn mock_fn(&self, implementation: Option<NativeFn>) -> Value {
        let function = self.create_mock("mockFn");
        if implementation.is_some() {
            if let Some(state) = function.mock_state() {
                state.set_implementation(implementation);
            }
        }
        Value::Function(function)
    }

    /// Replaces `method` on the target with a recording mock that delegates
    /// to the original implementation. The original is reinstated by
    /// [`restore_all`](Self::restore_all).
    pub fn spy_on(&self, target: &Value, method: &str) -> Result<Value, MockError> {
        let bag = match target {
            Value::Object(object) => object.clone(),
            Value::Function(function) => function.properties().clone(),
            other => return Err(MockError::NotAnObject(other.to_string())),
        };
        let original = bag
            .get(method)
            .ok_or_else(|| MockError::NotAFunction(method.to_string()))?;
        let original_fn = original
            .as_function()
            .ok_or_else(|| MockError::NotAFunction(method.to_string()))?
            .clone();

        let spy = self.create_mock(method);
        if let Some(state) = spy.mock_state() {
            let delegate: NativeFn = std::sync::Arc::new(move |args| original_fn.call(args));
            state.set_implementation(Some(delegate));
        }
        bag.set(method, Value::Function(spy.clone()));
        self.spies.lock().push(Spy {
            target: bag,
            key: method.to_string(),
            original,
        });
        Ok(Value::Function(spy))
    }

    /// Returns true if the value is a mock function created by a mocker.
    pub fn is_mock_function(&self, value: &Value) -> bool {
        value
            .as_function()
            .map(|function| function.mock_state().is_some())
            .unwrap_or(false)
    }

    /// The metadata used to seed recursive generation: an object with no
    /// members.
    pub fn empty_metadata() -> MockMetadata {
        MockMetadata::Object {
            members: BTreeMap::new(),
        }
    }

    /// Extracts mock metadata from a value.
    ///
    /// Returns `None` for undefined, which callers surface as a metadata
    /// failure. Reference cycles collapse to empty objects.
    pub fn get_metadata(&self, value: &Value) -> Option<MockMetadata> {
        match value {
            Value::Undefined => None,
            other => {
                let mut seen = HashSet::new();
                Some(self.metadata_of(other, &mut seen))
            }
        }
    }

    fn metadata_of(&self, value: &Value, seen: &mut HashSet<usize>) -> MockMetadata {
        match value {
            Value::Object(object) => {
                if !seen.insert(object.identity()) {
                    return Self::empty_metadata();
                }
                let mut members = BTreeMap::new();
                for key in object.keys() {
                    if let Some(member) = object.get(&key) {
                        members.insert(key, self.metadata_of(&member, seen));
                    }
                }
                MockMetadata::Object { members }
            }
            Value::Array(array) => {
                if !seen.insert(array.identity()) {
                    return Self::empty_metadata();
                }
                let items = array
                    .to_vec()
                    .iter()
                    .map(|item| self.metadata_of(item, seen))
                    .collect();
                MockMetadata::Array { items }
            }
            Value::Function(function) => {
                if !seen.insert(function.identity()) {
                    return Self::empty_metadata();
                }
                let properties = function.properties();
                let mut members = BTreeMap::new();
                for key in properties.keys() {
                    if let Some(member) = properties.get(&key) {
                        members.insert(key, self.metadata_of(&member, seen));
                    }
                }
                MockMetadata::Function {
                    name: function.name(),
                    members,
                }
            }
            primitive => MockMetadata::Constant(primitive.clone()),
        }
    }

    /// Synthesizes a mocked value from metadata.
    ///
    /// Functions become registered recording mocks; constants are carried
    /// over as-is.
    pub fn generate_from_metadata(&self, metadata: &MockMetadata) -> Value {
        match metadata {
            MockMetadata::Constant(value) => value.clone(),
            MockMetadata::Object { members } => {
                let object = JsObject::new();
                for (key, member) in members {
                    object.set(key.clone(), self.generate_from_metadata(member));
                }
                Value::Object(object)
            }
            MockMetadata::Array { items } => {
                let array = JsArray::new();
                for item in items {
                    array.push(self.generate_from_metadata(item));
                }
                Value::Array(array)
            }
            MockMetadata::Function { name, members } => {
                let function = self.create_mock(name);
                for (key, member) in members {
                    function
                        .properties()
                        .set(key.clone(), self.generate_from_metadata(member));
                }
                Value::Function(function)
            }
        }
    }

    /// Clears recorded calls and results on every registered mock.
    pub fn clear_all(&self) {
        for mock in self.mocks.lock().iter() {
            if let Some(state) = mock.mock_state() {
                state.clear();
            }
        }
    }

    /// Clears recordings and implementations on every registered mock.
    pub fn reset_all(&self) {
        for mock in self.mocks.lock().iter() {
            if let Some(state) = mock.mock_state() {
                state.reset();
            }
        }
    }

    /// Reinstates every spied-on method.
    pub fn restore_all(&self) {
        let mut spies = self.spies.lock();
        for spy in spies.drain(..) {
            spy.target.set(spy.key, spy.original);
        }
    }

    fn create_mock(&self, name: &str) -> JsFunction {
        let function = JsFunction::new(name, None);
        function.set_mock_state(std::sync::Arc::new(MockState::default()));
        self.mocks.lock().push(function.clone());
        function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mock_fn_records_calls() {
        let mocker = ModuleMocker::new();
        let mock = mocker.mock_fn(None);
        let function = mock.as_function().unwrap();

        function.call(&[Value::Number(1.0)]);
        function.call(&[Value::String("two".into())]);

        let state = function.mock_state().unwrap();
        assert_eq!(state.call_count(), 2);
        assert_eq!(state.calls()[0], vec![Value::Number(1.0)]);
        assert!(mocker.is_mock_function(&mock));
        assert!(!mocker.is_mock_function(&Value::Number(1.0)));
    }

    #[test]
    fn test_mock_fn_with_implementation() {
        let mocker = ModuleMocker::new();
        let mock = mocker.mock_fn(Some(Arc::new(|_| Value::Number(7.0))));
        let function = mock.as_function().unwrap();

        assert_eq!(function.call(&[]), Value::Number(7.0));

        mocker.reset_all();
        assert_eq!(function.call(&[]), Value::Undefined);
        // reset also drops the recording of the first call
        assert_eq!(function.mock_state().unwrap().call_count(), 1);
    }

    #[test]
    fn test_clear_keeps_implementation() {
        let mocker = ModuleMocker::new();
        let mock = mocker.mock_fn(Some(Arc::new(|_| Value::Number(7.0))));
        let function = mock.as_function().unwrap();
        function.call(&[]);

        mocker.clear_all();
        let state = function.mock_state().unwrap();
        assert_eq!(state.call_count(), 0);
        assert_eq!(function.call(&[]), Value::Number(7.0));
    }

    #[test]
    fn test_spy_on_and_restore() {
        let mocker = ModuleMocker::new();
        let target = JsObject::new();
        let original: NativeFn = Arc::new(|_| Value::Number(1.0));
        target.set("ping", Value::Function(JsFunction::new("ping", Some(original))));
        let holder = Value::Object(target.clone());

        let spy = mocker.spy_on(&holder, "ping").unwrap();
        let spied = target.get("ping").unwrap();
        assert_eq!(spied, spy);
        // delegates to the original implementation while recording
        assert_eq!(spied.as_function().unwrap().call(&[]), Value::Number(1.0));
        assert_eq!(spy.as_function().unwrap().mock_state().unwrap().call_count(), 1);

        mocker.restore_all();
        let restored = target.get("ping").unwrap();
        assert_ne!(restored, spy);
        assert!(!mocker.is_mock_function(&restored));
    }

    #[test]
    fn test_spy_on_non_function() {
        let mocker = ModuleMocker::new();
        let target = JsObject::new();
        target.set("n", Value::Number(3.0));

        assert!(mocker.spy_on(&Value::Object(target), "n").is_err());
        assert!(mocker.spy_on(&Value::Null, "n").is_err());
    }

    #[test]
    fn test_metadata_round_trip() {
        let mocker = ModuleMocker::new();
        let exports = JsObject::new();
        exports.set("version", Value::String("1.2.3".into()));
        let run = JsFunction::new(
            "run",
            Some(Arc::new(|_: &[Value]| Value::Number(9.0)) as NativeFn),
        );
        run.properties().set("retries", Value::Number(3.0));
        exports.set("run", Value::Function(run));

        let metadata = mocker.get_metadata(&Value::Object(exports)).unwrap();
        let mock = mocker.generate_from_metadata(&metadata);
        let object = mock.as_object().unwrap();

        assert_eq!(object.get("version"), Some(Value::String("1.2.3".into())));
        let mocked_run = object.get("run").unwrap();
        assert!(mocker.is_mock_function(&mocked_run));
        // the mocked function loses the real implementation
        assert_eq!(mocked_run.as_function().unwrap().call(&[]), Value::Undefined);
        assert_eq!(
            mocked_run.as_function().unwrap().properties().get("retries"),
            Some(Value::Number(3.0))
        );
    }

    #[test]
    fn test_metadata_of_undefined_is_none() {
        let mocker = ModuleMocker::new();
        assert!(mocker.get_metadata(&Value::Undefined).is_none());
    }

    #[test]
    fn test_metadata_cycle_protection() {
        let mocker = ModuleMocker::new();
        let object = JsObject::new();
        object.set("me", Value::Object(object.clone()));

        let metadata = mocker.get_metadata(&Value::Object(object)).unwrap();
        let mock = mocker.generate_from_metadata(&metadata);
        let inner = mock.as_object().unwrap().get("me").unwrap();
        assert!(inner.as_object().unwrap().is_empty());
    }
}
