// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records and the coexisting module/mock registries.

use crate::resolve::ModuleId;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use spacey_sandbox::{JsObject, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle to a module record.
pub type ModuleHandle = Arc<ModuleRecord>;

/// A loaded (or loading) module.
///
/// Records are pre-registered before evaluation with an empty exports
/// object and `loaded = false`, so circular requires observe a partial
/// record instead of recursing. `loaded` flips once evaluation completes.
pub struct ModuleRecord {
    id: PathBuf,
    filename: PathBuf,
    exports: RwLock<Value>,
    loaded: AtomicBool,
    caller: RwLock<Option<PathBuf>>,
    children: RwLock<Vec<ModuleHandle>>,
    paths: RwLock<Vec<PathBuf>>,
}

impl ModuleRecord {
    /// Creates a pre-registered record for a module key.
    pub(crate) fn pre_register(key: PathBuf) -> ModuleHandle {
        Arc::new(Self {
            id: key.clone(),
            filename: key,
            exports: RwLock::new(Value::Object(JsObject::new())),
            loaded: AtomicBool::new(false),
            caller: RwLock::new(None),
            children: RwLock::new(Vec::new()),
            paths: RwLock::new(Vec::new()),
        })
    }

    /// The module key (same as the filename).
    pub fn id(&self) -> &Path {
        &self.id
    }

    /// Absolute path of the module file.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Current exports value.
    pub fn exports(&self) -> Value {
        self.exports.read().clone()
    }

    /// Replaces the exports value (`module.exports = ...`).
    pub fn set_exports(&self, exports: Value) {
        *self.exports.write() = exports;
    }

    /// True once evaluation has completed.
    pub fn loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub(crate) fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::SeqCst);
    }

    /// Path of the module that required this one, when any.
    pub fn caller(&self) -> Option<PathBuf> {
        self.caller.read().clone()
    }

    pub(crate) fn set_caller(&self, caller: Option<PathBuf>) {
        *self.caller.write() = caller;
    }

    /// Modules this one required during evaluation.
    pub fn children(&self) -> Vec<ModuleHandle> {
        self.children.read().clone()
    }

    pub(crate) fn reset_children(&self) {
        self.children.write().clear();
    }

    pub(crate) fn add_child(&self, child: ModuleHandle) {
        self.children.write().push(child);
    }

    /// The `node_modules` search-path chain for this module.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.read().clone()
    }

    pub(crate) fn set_paths(&self, paths: Vec<PathBuf>) {
        *self.paths.write() = paths;
    }
}

impl std::fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("id", &self.id)
            .field("loaded", &self.loaded())
            .finish()
    }
}

/// Registry of real modules, keyed by module key.
#[derive(Default)]
pub(crate) struct ModuleRegistry {
    entries: FxHashMap<PathBuf, ModuleHandle>,
}

impl ModuleRegistry {
    pub(crate) fn get(&self, key: &Path) -> Option<ModuleHandle> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn contains(&self, key: &Path) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn insert(&mut self, key: PathBuf, record: ModuleHandle) {
        self.entries.insert(key, record);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn keys(&self) -> Vec<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&PathBuf, &ModuleHandle)> {
        self.entries.iter()
    }
}

/// Registry of mock exports, keyed by module identifier.
#[derive(Default)]
pub(crate) struct MockRegistry {
    entries: FxHashMap<ModuleId, Value>,
}

impl MockRegistry {
    pub(crate) fn get(&self, id: &ModuleId) -> Option<Value> {
        self.entries.get(id).cloned()
    }

    pub(crate) fn insert(&mut self, id: ModuleId, exports: Value) {
        self.entries.insert(id, exports);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn keys(&self) -> Vec<ModuleId> {
        self.entries.keys().cloned().collect()
    }
}

/// Which registry a real-module load goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegistrySelection {
    /// Framework-internal modules; untouched by `reset_modules`.
    Internal,
    /// The runtime-wide module registry.
    Real,
    /// The registry of the open isolation scope.
    Isolated,
}
