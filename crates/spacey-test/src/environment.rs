// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Test environment interface and the in-process sandbox environment.
//!
//! The environment owns the sandbox global object, the module mocker, the
//! fake-timer facility, and the script runner. A `None` global means the
//! environment has been torn down; the executor treats that as a
//! diagnostic, never an error.

use crate::runtime::{ModuleRecord, ModuleRequire, TestHooks};
use crate::transform::TransformedScript;
use parking_lot::RwLock;
use spacey_sandbox::{FakeTimers, JsObject, ModuleMocker, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Callable produced by the environment for one transformed script.
///
/// Invoked by the executor with the module scope; the scope's `exports` is
/// the invocation target, so evaluated code sees it as bare `this`.
pub type ModuleWrapper = Arc<dyn Fn(&ModuleScope<'_>) -> crate::error::Result<()> + Send + Sync>;

/// The injected locals a module wrapper is invoked with, in the wrapper's
/// positional order.
pub struct ModuleScope<'a> {
    /// The module record (`module`).
    pub module: &'a ModuleRecord,
    /// The exports object (`exports`, and bare `this`).
    pub exports: Value,
    /// The caller-facing require surface bound to this module.
    pub require: &'a ModuleRequire,
    /// Directory of the module file (`__dirname`).
    pub dirname: &'a Path,
    /// Path of the module file (`__filename`).
    pub filename: &'a Path,
    /// The environment global.
    pub global: JsObject,
    /// The reflective control object bound to this module.
    pub hooks: &'a TestHooks,
    /// Configured extra globals, in configuration order.
    pub extra_globals: Vec<Value>,
}

impl ModuleScope<'_> {
    /// The exports object handle. Pre-registration guarantees exports is an
    /// object when evaluation starts.
    pub fn exports_object(&self) -> JsObject {
        self.exports.as_object().cloned().unwrap_or_default()
    }
}

/// The environment a runtime evaluates modules inside.
pub trait TestEnvironment: Send + Sync {
    /// The sandbox global object, or `None` once torn down.
    fn global(&self) -> Option<JsObject>;

    /// The module mocker.
    fn mocker(&self) -> &ModuleMocker;

    /// The fake-timer facility, or `None` when unavailable.
    fn fake_timers(&self) -> Option<Arc<FakeTimers>>;

    /// Produces the wrapper callable for a transformed script, or `None`
    /// when the environment cannot run it (torn down, or unknown script).
    fn run_script(&self, script: &TransformedScript) -> Option<ModuleWrapper>;

    /// Exports of a core module, when the environment hosts one by that
    /// name.
    fn core_module(&self, name: &str) -> Option<Value>;

    /// Exports of a native addon, when the environment has one loaded for
    /// that path.
    fn native_addon(&self, path: &Path) -> Option<Value>;
}

/// In-process environment: scripts are registered Rust callables keyed by
/// module path, and core modules and native addons are registered export
/// values.
pub struct SandboxEnvironment {
    global: RwLock<Option<JsObject>>,
    mocker: ModuleMocker,
    fake_timers: RwLock<Option<Arc<FakeTimers>>>,
    scripts: RwLock<HashMap<PathBuf, ModuleWrapper>>,
    core_modules: RwLock<HashMap<String, Value>>,
    native_addons: RwLock<HashMap<PathBuf, Value>>,
}

impl SandboxEnvironment {
    /// Creates a live environment with an empty global and fake timers
    /// installed.
    pub fn new() -> Self {
        Self {
            global: RwLock::new(Some(JsObject::new())),
            mocker: ModuleMocker::new(),
            fake_timers: RwLock::new(Some(Arc::new(FakeTimers::new()))),
            scripts: RwLock::new(HashMap::new()),
            core_modules: RwLock::new(HashMap::new()),
            native_addons: RwLock::new(HashMap::new()),
        }
    }

    /// Registers the wrapper for a module path.
    pub fn register_module(&self, path: impl Into<PathBuf>, wrapper: ModuleWrapper) {
        self.scripts.write().insert(path.into(), wrapper);
    }

    /// Registers a wrapper from a plain closure.
    pub fn register_module_fn<F>(&self, path: impl Into<PathBuf>, body: F)
    where
        F: Fn(&ModuleScope<'_>) -> crate::error::Result<()> + Send + Sync + 'static,
    {
        self.register_module(path, Arc::new(body));
    }

    /// Registers a core module's exports.
    pub fn register_core_module(&self, name: impl Into<String>, exports: Value) {
        self.core_modules.write().insert(name.into(), exports);
    }

    /// Registers a native addon's exports.
    pub fn register_native_addon(&self, path: impl Into<PathBuf>, exports: Value) {
        self.native_addons.write().insert(path.into(), exports);
    }

    /// Tears the environment down: the global and fake timers become
    /// unavailable and scripts no longer run.
    pub fn teardown(&self) {
        *self.global.write() = None;
        *self.fake_timers.write() = None;
    }
}

impl Default for SandboxEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnvironment for SandboxEnvironment {
    fn global(&self) -> Option<JsObject> {
        self.global.read().clone()
    }

    fn mocker(&self) -> &ModuleMocker {
        &self.mocker
    }

    fn fake_timers(&self) -> Option<Arc<FakeTimers>> {
        self.fake_timers.read().clone()
    }

    fn run_script(&self, script: &TransformedScript) -> Option<ModuleWrapper> {
        if self.global.read().is_none() {
            return None;
        }
        self.scripts.read().get(&script.path).cloned()
    }

    fn core_module(&self, name: &str) -> Option<Value> {
        let name = name.strip_prefix("node:").unwrap_or(name);
        self.core_modules.read().get(name).cloned()
    }

    fn native_addon(&self, path: &Path) -> Option<Value> {
        self.native_addons.read().get(path).cloned()
    }
}
