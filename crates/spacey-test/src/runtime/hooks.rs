// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The reflective control object injected into every evaluated module.
//!
//! One `TestHooks` instance is created per evaluated module, bound to that
//! module's filename and require surface. Every mutator returns `&Self`
//! for chaining. Writes land in the runtime's policy inputs and
//! registries, steering the outcome of subsequent requires.

use crate::error::{Result, TestError};
use crate::runtime::require::ModuleRequire;
use crate::runtime::test_runtime::{MockFactory, TestRuntime};
use spacey_sandbox::{FakeTimers, NativeFn, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the legacy spec-harness object on the environment global.
pub const SPEC_HARNESS_GLOBAL: &str = "specHarness";
/// Field on the legacy spec harness holding the default test timeout.
pub const DEFAULT_TIMEOUT_FIELD: &str = "DEFAULT_TIMEOUT_INTERVAL";
/// Well-known global key for the test timeout, used without a legacy
/// harness.
pub const TEST_TIMEOUT_GLOBAL: &str = "__SPACEY_TEST_TIMEOUT__";
/// Well-known global key for the retry count.
pub const RETRY_TIMES_GLOBAL: &str = "__SPACEY_RETRY_TIMES__";

/// The per-module test control object (injected as `harness`).
pub struct TestHooks {
    runtime: Arc<TestRuntime>,
    filename: PathBuf,
    require: ModuleRequire,
}

impl TestRuntime {
    /// Creates a control object bound to `path`, for harness code.
    pub fn create_hooks(self: &Arc<Self>, path: &Path) -> TestHooks {
        let require = self.create_require(path);
        self.create_hooks_bound(path.to_path_buf(), require)
    }

    pub(crate) fn create_hooks_bound(
        self: &Arc<Self>,
        filename: PathBuf,
        require: ModuleRequire,
    ) -> TestHooks {
        TestHooks {
            runtime: Arc::clone(self),
            filename,
            require,
        }
    }
}

impl TestHooks {
    /// The module this object is bound to.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    // ----- automock toggles ---------------------------------------------

    /// Turns automocking on.
    pub fn enable_automock(&self) -> &Self {
        self.runtime.enable_automock();
        self
    }

    /// Alias of [`enable_automock`](Self::enable_automock).
    pub fn auto_mock_on(&self) -> &Self {
        self.enable_automock()
    }

    /// Turns automocking off.
    pub fn disable_automock(&self) -> &Self {
        self.runtime.disable_automock();
        self
    }

    /// Alias of [`disable_automock`](Self::disable_automock).
    pub fn auto_mock_off(&self) -> &Self {
        self.disable_automock()
    }

    // ----- per-module mock controls -------------------------------------

    /// Marks a module as mocked.
    pub fn mock(&self, name: &str) -> &Self {
        self.runtime.mock_module(&self.filename, name);
        self
    }

    /// Alias of [`mock`](Self::mock).
    pub fn do_mock(&self, name: &str) -> &Self {
        self.mock(name)
    }

    /// Mocks a module with a factory for its exports.
    pub fn mock_with_factory(&self, name: &str, factory: MockFactory) -> &Self {
        self.set_mock(name, factory)
    }

    /// Mocks a module that has no file on disk.
    pub fn mock_virtual(&self, name: &str, factory: MockFactory) -> &Self {
        self.runtime
            .set_mock_factory(&self.filename, name, factory, true);
        self
    }

    /// Marks a module as not mocked. Dominates every other signal.
    pub fn unmock(&self, name: &str) -> &Self {
        self.runtime.unmock_module(&self.filename, name);
        self
    }

    /// Alias of [`unmock`](Self::unmock).
    pub fn dont_mock(&self, name: &str) -> &Self {
        self.unmock(name)
    }

    /// Unmocks a module and its transitive dependencies.
    pub fn deep_unmock(&self, name: &str) -> &Self {
        self.runtime.deep_unmock_module(&self.filename, name);
        self
    }

    /// Registers a mock factory for a module.
    pub fn set_mock(&self, name: &str, factory: MockFactory) -> &Self {
        self.runtime
            .set_mock_factory(&self.filename, name, factory, false);
        self
    }

    /// Registers a fixed value as a module's mock.
    pub fn set_mock_value(&self, name: &str, value: Value) -> &Self {
        let factory: MockFactory = Arc::new(move || value.clone());
        self.set_mock(name, factory)
    }

    // ----- registries ---------------------------------------------------

    /// Resets the module and mock registries.
    pub fn reset_modules(&self) -> &Self {
        self.runtime.reset_modules();
        self
    }

    /// Runs `f` inside a fresh isolation scope.
    pub fn isolate_modules(&self, f: impl FnOnce()) -> Result<&Self> {
        self.runtime.isolate_modules(f)?;
        Ok(self)
    }

    // ----- mock function facilities -------------------------------------

    /// Clears recorded calls on all mocks.
    pub fn clear_all_mocks(&self) -> &Self {
        self.runtime.clear_all_mocks();
        self
    }

    /// Clears recordings and implementations on all mocks.
    pub fn reset_all_mocks(&self) -> &Self {
        self.runtime.reset_all_mocks();
        self
    }

    /// Restores all spied-on methods.
    pub fn restore_all_mocks(&self) -> &Self {
        self.runtime.restore_all_mocks();
        self
    }

    /// Creates a recording mock function.
    pub fn mock_fn(&self, implementation: Option<NativeFn>) -> Value {
        self.runtime.environment().mocker().mock_fn(implementation)
    }

    /// Spies on a method of the target.
    pub fn spy_on(&self, target: &Value, method: &str) -> Result<Value> {
        self.runtime
            .environment()
            .mocker()
            .spy_on(target, method)
            .map_err(|error| TestError::evaluation(error.to_string()))
    }

    /// True when the value is a mock function.
    pub fn is_mock_function(&self, value: &Value) -> bool {
        self.runtime.environment().mocker().is_mock_function(value)
    }

    /// Generates a mock from a module's real exports.
    pub fn gen_mock_from_module(&self, name: &str) -> Result<Value> {
        self.runtime.generate_mock(&self.filename, name)
    }

    // ----- requires -----------------------------------------------------

    /// The real module, bypassing mocks.
    pub fn require_actual(&self, request: &str) -> Result<Value> {
        self.require.require_actual(request)
    }

    /// The mock for a module.
    pub fn require_mock(&self, request: &str) -> Result<Value> {
        self.require.require_mock(request)
    }

    // ----- timers -------------------------------------------------------

    /// Switches the environment to fake timers.
    pub fn use_fake_timers(&self) -> &Self {
        self.with_timers(|timers| timers.use_fake_timers())
    }

    /// Switches the environment back to real timers.
    pub fn use_real_timers(&self) -> &Self {
        self.with_timers(|timers| timers.use_real_timers())
    }

    /// Cancels every fake timer.
    pub fn clear_all_timers(&self) -> &Self {
        self.with_timers(|timers| timers.clear_all())
    }

    /// Runs every fake timer until none remain.
    pub fn run_all_timers(&self) -> &Self {
        self.with_timers(|timers| timers.run_all())
    }

    /// Drains the tick queue.
    pub fn run_all_ticks(&self) -> &Self {
        self.with_timers(|timers| timers.run_all_ticks())
    }

    /// Drains the immediate queue.
    pub fn run_all_immediates(&self) -> &Self {
        self.with_timers(|timers| timers.run_all_immediates())
    }

    /// Runs the timers pending right now, but not ones they schedule.
    pub fn run_only_pending_timers(&self) -> &Self {
        self.with_timers(|timers| timers.run_only_pending())
    }

    /// Advances the fake clock by `ms`.
    pub fn advance_timers_by_time(&self, ms: u64) -> &Self {
        self.with_timers(|timers| timers.advance_by(ms))
    }

    /// Alias of [`advance_timers_by_time`](Self::advance_timers_by_time).
    pub fn run_timers_to_time(&self, ms: u64) -> &Self {
        self.advance_timers_by_time(ms)
    }

    /// Advances the clock to the next timer, `steps` times (default 1).
    pub fn advance_timers_to_next_timer(&self, steps: Option<u64>) -> &Self {
        self.with_timers(|timers| timers.advance_to_next(steps.unwrap_or(1)))
    }

    /// Number of fake timers waiting on the clock.
    pub fn get_timer_count(&self) -> usize {
        match self.live_timers() {
            Some(timers) => timers.timer_count(),
            None => 0,
        }
    }

    fn live_timers(&self) -> Option<Arc<FakeTimers>> {
        match self.runtime.environment().fake_timers() {
            Some(timers) => Some(timers),
            None => {
                tracing::error!(
                    "A timer function was called from '{}' but fake timers are not available; the environment may have been torn down",
                    self.filename.display()
                );
                self.runtime.set_exit_code(1);
                None
            }
        }
    }

    fn with_timers(&self, f: impl FnOnce(&FakeTimers)) -> &Self {
        if let Some(timers) = self.live_timers() {
            f(&timers);
        }
        self
    }

    // ----- harness knobs ------------------------------------------------

    /// Sets the default test timeout, on the legacy spec harness when one
    /// is installed, otherwise under the well-known global key.
    pub fn set_timeout(&self, ms: u64) -> &Self {
        if let Some(global) = self.runtime.environment().global() {
            match global.get(SPEC_HARNESS_GLOBAL).and_then(|h| h.as_object().cloned()) {
                Some(harness) => harness.set(DEFAULT_TIMEOUT_FIELD, Value::Number(ms as f64)),
                None => global.set(TEST_TIMEOUT_GLOBAL, Value::Number(ms as f64)),
            }
        }
        self
    }

    /// Sets how many times a failing test is retried.
    pub fn retry_times(&self, n: u64) -> &Self {
        if let Some(global) = self.runtime.environment().global() {
            global.set(RETRY_TIMES_GLOBAL, Value::Number(n as f64));
        }
        self
    }

    /// Forwards a matcher map to the spec harness.
    pub fn add_matchers(&self, matchers: Value) -> &Self {
        if let Some(global) = self.runtime.environment().global() {
            if let Some(harness) = global
                .get(SPEC_HARNESS_GLOBAL)
                .and_then(|h| h.as_object().cloned())
            {
                if let Some(Value::Function(add)) = harness.get("addMatchers") {
                    add.call(&[matchers]);
                }
            }
        }
        self
    }
}
