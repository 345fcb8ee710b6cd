// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! JavaScript value representation for sandboxed module exports.
//!
//! Objects, arrays, and functions are shared handles: cloning a `Value`
//! clones the handle, not the contents, and equality on reference types is
//! identity (`===`). The module runtime depends on this for its caching
//! contract, where two requires of the same module must observe the same
//! exports object.

use crate::mocker::MockState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A native implementation backing a [`JsFunction`].
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A JavaScript value.
///
/// Values are thread-safe and cheap to clone; reference types share their
/// contents through the handle.
#[derive(Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Object handle
    Object(JsObject),
    /// Array handle
    Array(JsArray),
    /// Function handle
    Function(JsFunction),
}

impl Value {
    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this value is nullish (null or undefined).
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns true if this value is a function.
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Returns the object handle, if this value is an object.
    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the array handle, if this value is an array.
    pub fn as_array(&self) -> Option<&JsArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Returns the function handle, if this value is a function.
    pub fn as_function(&self) -> Option<&JsFunction> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Returns the number, if this value is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the type of this value as a string (`typeof`).
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // Historical quirk
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) | Value::Array(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Parses a JSON document into a value using the sandbox's parser.
    pub fn from_json_str(text: &str) -> serde_json::Result<Value> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Self::from_json(&json))
    }

    /// Converts a `serde_json::Value` into a sandbox value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                let array = JsArray::new();
                for item in items {
                    array.push(Self::from_json(item));
                }
                Value::Array(array)
            }
            serde_json::Value::Object(map) => {
                let object = JsObject::new();
                for (key, item) in map {
                    object.set(key, Self::from_json(item));
                }
                Value::Object(object)
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                // NaN is never equal to itself
                if a.is_nan() && b.is_nan() {
                    false
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(object) => write!(f, "[Object ({} keys)]", object.len()),
            Value::Array(array) => write!(f, "[Array ({})]", array.len()),
            Value::Function(function) => write!(f, "[Function: {}]", function.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// A shared JavaScript object.
#[derive(Clone, Default)]
pub struct JsObject(Arc<RwLock<HashMap<String, Value>>>);

impl JsObject {
    /// Creates a new empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a property.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().get(key).cloned()
    }

    /// Writes a property.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.write().insert(key.into(), value);
    }

    /// Checks for a property.
    pub fn has(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    /// Deletes a property, returning its previous value.
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.0.write().remove(key)
    }

    /// Returns the property names.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.0.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Returns true if the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Identity comparison (`===`).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity token for cycle detection.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsObject({} keys)", self.len())
    }
}

/// A shared JavaScript array.
#[derive(Clone, Default)]
pub struct JsArray(Arc<RwLock<Vec<Value>>>);

impl JsArray {
    /// Creates a new empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an element.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Appends an element.
    pub fn push(&self, value: Value) {
        self.0.write().push(value);
    }

    /// Array length.
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Returns true if the array is empty.
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    /// Identity comparison (`===`).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity token for cycle detection.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for JsArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsArray({})", self.len())
    }
}

struct FunctionInner {
    name: RwLock<String>,
    body: RwLock<Option<NativeFn>>,
    properties: JsObject,
    mock: RwLock<Option<Arc<MockState>>>,
}

/// A shared JavaScript function.
///
/// Functions carry an optional native body, a property bag (JS functions
/// are objects), and, when created by the module mocker, recording mock
/// state.
#[derive(Clone)]
pub struct JsFunction(Arc<FunctionInner>);

impl JsFunction {
    /// Creates a function with the given name and optional body.
    pub fn new(name: impl Into<String>, body: Option<NativeFn>) -> Self {
        Self(Arc::new(FunctionInner {
            name: RwLock::new(name.into()),
            body: RwLock::new(body),
            properties: JsObject::new(),
            mock: RwLock::new(None),
        }))
    }

    /// The function name.
    pub fn name(&self) -> String {
        self.0.name.read().clone()
    }

    /// The function's property bag.
    pub fn properties(&self) -> &JsObject {
        &self.0.properties
    }

    /// Replaces the function body.
    pub fn set_body(&self, body: Option<NativeFn>) {
        *self.0.body.write() = body;
    }

    /// Attaches mock state. Used by the module mocker.
    pub fn set_mock_state(&self, state: Arc<MockState>) {
        *self.0.mock.write() = Some(state);
    }

    /// Mock state, if this is a mock function.
    pub fn mock_state(&self) -> Option<Arc<MockState>> {
        self.0.mock.read().clone()
    }

    /// Invokes the function.
    ///
    /// Mock state, when present, records the call and may supply an
    /// implementation override; otherwise the body runs, and a bodiless
    /// function returns undefined.
    pub fn call(&self, args: &[Value]) -> Value {
        let mock = self.mock_state();
        if let Some(state) = &mock {
            state.record_call(args.to_vec());
        }
        let implementation = mock
            .as_ref()
            .and_then(|state| state.implementation())
            .or_else(|| self.0.body.read().clone());
        let result = match implementation {
            Some(body) => body(args),
            None => Value::Undefined,
        };
        if let Some(state) = &mock {
            state.record_result(result.clone());
        }
        result
    }

    /// Identity comparison (`===`).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity token for cycle detection.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsFunction({})", self.name())
    }
}
