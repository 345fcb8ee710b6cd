// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The test-framework module runtime.
//!
//! One `TestRuntime` owns every registry, policy map, cache, and
//! reentrancy slot for a single test execution stream. All state is
//! mutated from that stream; the locks here only bridge re-entrant calls
//! from evaluated module code, and no lock is held across evaluation.

use crate::config::RuntimeConfig;
use crate::environment::TestEnvironment;
use crate::error::{Result, TestError};
use crate::resolve::{normalize, ModuleId, Resolver};
use crate::runtime::registry::{
    MockRegistry, ModuleHandle, ModuleRegistry, RegistrySelection,
};
use crate::runtime::RequireIntent;
use crate::transform::Transformer;
use dashmap::DashMap;
use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use spacey_sandbox::{MockMetadata, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Factory producing the exports of a registered mock.
pub type MockFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// The module runtime core: resolution policy, registries, loading,
/// sandboxed evaluation, and the reflective control surface.
pub struct TestRuntime {
    pub(crate) config: RuntimeConfig,
    pub(crate) environment: Arc<dyn TestEnvironment>,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) transformer: Arc<dyn Transformer>,

    // Module and mock registries, plus their isolation-scope overlays
    pub(crate) internal_registry: RwLock<ModuleRegistry>,
    pub(crate) module_registry: RwLock<ModuleRegistry>,
    pub(crate) isolated_module_registry: RwLock<Option<ModuleRegistry>>,
    pub(crate) mock_registry: RwLock<MockRegistry>,
    pub(crate) isolated_mock_registry: RwLock<Option<MockRegistry>>,

    // Resolution policy inputs
    pub(crate) explicit_should_mock: RwLock<FxHashMap<ModuleId, bool>>,
    pub(crate) transitive_should_mock: RwLock<FxHashMap<ModuleId, bool>>,
    pub(crate) mock_factories: RwLock<FxHashMap<ModuleId, MockFactory>>,
    pub(crate) virtual_mocks: RwLock<HashSet<PathBuf>>,
    pub(crate) unmock_patterns: Option<Regex>,
    pub(crate) auto_mock: AtomicBool,

    // Memo caches
    pub(crate) should_mock_cache: DashMap<ModuleId, bool>,
    pub(crate) transitive_unmock_cache: DashMap<(PathBuf, ModuleId), bool>,
    pub(crate) mock_metadata_cache: RwLock<FxHashMap<PathBuf, MockMetadata>>,
    pub(crate) cache_fs: DashMap<PathBuf, Arc<String>>,
    pub(crate) source_maps: DashMap<PathBuf, PathBuf>,
    pub(crate) coverage_mapped: RwLock<HashSet<PathBuf>>,

    // Reentrancy state
    pub(crate) executing_module_path: RwLock<PathBuf>,
    pub(crate) executing_manual_mock: RwLock<Option<PathBuf>>,

    exit_code: RwLock<Option<i32>>,
}

impl TestRuntime {
    /// Creates a runtime over the given collaborators. Configuration is
    /// read once here; the unmock patterns are compiled into a single
    /// regex union.
    pub fn new(
        config: RuntimeConfig,
        environment: Arc<dyn TestEnvironment>,
        resolver: Arc<dyn Resolver>,
        transformer: Arc<dyn Transformer>,
    ) -> Result<Arc<Self>> {
        let unmock_patterns = if config.unmocked_module_path_patterns.is_empty() {
            None
        } else {
            Some(Regex::new(&config.unmocked_module_path_patterns.join("|"))?)
        };
        let auto_mock = config.automock;

        let runtime = Arc::new(Self {
            environment,
            resolver,
            transformer,
            internal_registry: RwLock::new(ModuleRegistry::default()),
            module_registry: RwLock::new(ModuleRegistry::default()),
            isolated_module_registry: RwLock::new(None),
            mock_registry: RwLock::new(MockRegistry::default()),
            isolated_mock_registry: RwLock::new(None),
            explicit_should_mock: RwLock::new(FxHashMap::default()),
            transitive_should_mock: RwLock::new(FxHashMap::default()),
            mock_factories: RwLock::new(FxHashMap::default()),
            virtual_mocks: RwLock::new(HashSet::new()),
            unmock_patterns,
            auto_mock: AtomicBool::new(auto_mock),
            should_mock_cache: DashMap::new(),
            transitive_unmock_cache: DashMap::new(),
            mock_metadata_cache: RwLock::new(FxHashMap::default()),
            cache_fs: DashMap::new(),
            source_maps: DashMap::new(),
            coverage_mapped: RwLock::new(HashSet::new()),
            executing_module_path: RwLock::new(PathBuf::new()),
            executing_manual_mock: RwLock::new(None),
            exit_code: RwLock::new(None),
            config,
        });

        // Setup files living under the dependency directory must not drag
        // automocking into their own dependency chains.
        if runtime.auto_mock.load(Ordering::SeqCst) {
            let dependency_dir = dependency_fragment();
            let empty = HashSet::new();
            for setup_file in &runtime.config.setup_files {
                if setup_file.display().to_string().contains(&dependency_dir) {
                    let id = runtime.resolver.module_id(&empty, setup_file, None);
                    runtime.transitive_should_mock.write().insert(id, false);
                }
            }
        }

        Ok(runtime)
    }

    /// The runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The environment this runtime evaluates inside.
    pub fn environment(&self) -> &Arc<dyn TestEnvironment> {
        &self.environment
    }

    /// The resolver in use.
    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// Exit code requested by a diagnostic, if any.
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_code.read()
    }

    pub(crate) fn set_exit_code(&self, code: i32) {
        *self.exit_code.write() = Some(code);
    }

    // ----- source cache -------------------------------------------------

    /// Seeds the read-through source cache, so in-memory module sources
    /// need no backing file.
    pub fn seed_source(&self, path: &Path, source: impl Into<String>) {
        self.cache_fs.insert(normalize(path), Arc::new(source.into()));
    }

    /// Reads module source through the cache, stripping a byte-order mark.
    pub(crate) fn cached_source(&self, path: &Path) -> Result<Arc<String>> {
        let key = normalize(path);
        if let Some(cached) = self.cache_fs.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }
        let mut text = std::fs::read_to_string(path)?;
        if let Some(stripped) = text.strip_prefix('\u{feff}') {
            text = stripped.to_string();
        }
        let source = Arc::new(text);
        self.cache_fs.insert(key, Arc::clone(&source));
        Ok(source)
    }

    // ----- registries ---------------------------------------------------

    /// Selects the registry a real-module load goes through.
    pub(crate) fn select_registry(&self, intent: RequireIntent, key: &Path) -> RegistrySelection {
        if intent == RequireIntent::Internal {
            return RegistrySelection::Internal;
        }
        if self.module_registry.read().contains(key)
            || self.isolated_module_registry.read().is_none()
        {
            RegistrySelection::Real
        } else {
            RegistrySelection::Isolated
        }
    }

    pub(crate) fn registry_get(
        &self,
        selection: RegistrySelection,
        key: &Path,
    ) -> Option<ModuleHandle> {
        match selection {
            RegistrySelection::Internal => self.internal_registry.read().get(key),
            RegistrySelection::Real => self.module_registry.read().get(key),
            RegistrySelection::Isolated => self
                .isolated_module_registry
                .read()
                .as_ref()
                .and_then(|registry| registry.get(key)),
        }
    }

    pub(crate) fn registry_insert(
        &self,
        selection: RegistrySelection,
        key: PathBuf,
        record: ModuleHandle,
    ) {
        match selection {
            RegistrySelection::Internal => self.internal_registry.write().insert(key, record),
            RegistrySelection::Real => self.module_registry.write().insert(key, record),
            RegistrySelection::Isolated => {
                if let Some(registry) = self.isolated_module_registry.write().as_mut() {
                    registry.insert(key, record);
                }
            }
        }
    }

    /// Finds a record across the live registries: isolation scope first,
    /// then the runtime-wide registry, then internal.
    pub(crate) fn find_record(&self, key: &Path) -> Option<ModuleHandle> {
        if let Some(isolated) = self.isolated_module_registry.read().as_ref() {
            if let Some(record) = isolated.get(key) {
                return Some(record);
            }
        }
        self.module_registry
            .read()
            .get(key)
            .or_else(|| self.internal_registry.read().get(key))
    }

    /// Derives a record's parent by looking its caller up in the live
    /// registries.
    pub(crate) fn module_parent(&self, record: &ModuleHandle) -> Option<ModuleHandle> {
        let caller = record.caller()?;
        self.find_record(&caller)
    }

    /// Snapshot of the visible module cache: the runtime-wide registry
    /// overlaid with the isolation scope, sorted by path.
    pub(crate) fn cache_snapshot(&self) -> Vec<(PathBuf, Value)> {
        let mut entries: FxHashMap<PathBuf, Value> = FxHashMap::default();
        for (key, record) in self.module_registry.read().iter() {
            entries.insert(key.clone(), record.exports());
        }
        if let Some(isolated) = self.isolated_module_registry.read().as_ref() {
            for (key, record) in isolated.iter() {
                entries.insert(key.clone(), record.exports());
            }
        }
        let mut snapshot: Vec<(PathBuf, Value)> = entries.into_iter().collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    // ----- lifecycle ----------------------------------------------------

    /// Discards the isolation scope, clears the real and mock registries,
    /// and resets environment mocks and fake timers when the environment
    /// is live. Internal modules survive.
    pub fn reset_modules(&self) {
        *self.isolated_module_registry.write() = None;
        *self.isolated_mock_registry.write() = None;
        self.module_registry.write().clear();
        self.mock_registry.write().clear();

        if let Some(global) = self.environment.global() {
            for key in global.keys() {
                if let Some(value) = global.get(&key) {
                    if let Some(function) = value.as_function() {
                        if let Some(state) = function.mock_state() {
                            state.clear();
                        }
                    }
                }
            }
        }
        if let Some(timers) = self.environment.fake_timers() {
            timers.reset();
        }
    }

    /// Runs `f` inside a fresh isolation scope. Both isolated registries
    /// are created together and torn down unconditionally when `f`
    /// returns, by guard, so an early exit cannot leak the scope.
    pub fn isolate_modules<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        {
            let mut modules = self.isolated_module_registry.write();
            let mut mocks = self.isolated_mock_registry.write();
            if modules.is_some() || mocks.is_some() {
                return Err(TestError::NestedIsolation);
            }
            *modules = Some(ModuleRegistry::default());
            *mocks = Some(MockRegistry::default());
        }
        let _guard = IsolationGuard { runtime: self };
        Ok(f())
    }

    /// Clears recorded calls on every mock the environment knows about.
    pub fn clear_all_mocks(&self) {
        self.environment.mocker().clear_all();
    }

    /// Clears recordings and implementations on every mock.
    pub fn reset_all_mocks(&self) {
        self.environment.mocker().reset_all();
    }

    /// Restores every spied-on method.
    pub fn restore_all_mocks(&self) {
        self.environment.mocker().restore_all();
    }

    // ----- policy mutators ----------------------------------------------

    pub(crate) fn id_for(&self, from: &Path, name: &str) -> ModuleId {
        let virtuals = self.virtual_mocks.read();
        self.resolver.module_id(&virtuals, from, Some(name))
    }

    /// Marks a module as explicitly mocked.
    pub fn mock_module(&self, from: &Path, name: &str) {
        let id = self.id_for(from, name);
        self.explicit_should_mock.write().insert(id, true);
    }

    /// Marks a module as explicitly unmocked. This dominates every other
    /// mock signal.
    pub fn unmock_module(&self, from: &Path, name: &str) {
        let id = self.id_for(from, name);
        self.explicit_should_mock.write().insert(id, false);
    }

    /// Unmocks a module and its transitive dependency chain.
    pub fn deep_unmock_module(&self, from: &Path, name: &str) {
        let id = self.id_for(from, name);
        self.explicit_should_mock.write().insert(id.clone(), false);
        self.transitive_should_mock.write().insert(id, false);
    }

    /// Registers a mock factory for a module and marks it mocked. Virtual
    /// mocks also register the path the request would occupy, so an
    /// identifier exists for a module with no file on disk.
    pub fn set_mock_factory(
        &self,
        from: &Path,
        name: &str,
        factory: MockFactory,
        virtual_mock: bool,
    ) {
        if virtual_mock {
            let path = self.resolver.get_module_path(from, name);
            self.virtual_mocks.write().insert(path);
        }
        let id = self.id_for(from, name);
        self.explicit_should_mock.write().insert(id.clone(), true);
        self.mock_factories.write().insert(id, factory);
    }

    /// Turns automocking on.
    pub fn enable_automock(&self) {
        self.auto_mock.store(true, Ordering::SeqCst);
    }

    /// Turns automocking off.
    pub fn disable_automock(&self) {
        self.auto_mock.store(false, Ordering::SeqCst);
    }

    pub(crate) fn auto_mock_enabled(&self) -> bool {
        self.auto_mock.load(Ordering::SeqCst)
    }

    // ----- shared helpers -----------------------------------------------

    pub(crate) fn resolve_module(&self, from: &Path, request: &str) -> Result<PathBuf> {
        self.resolver.resolve_module(from, request)
    }

    pub(crate) fn core_exports(&self, from: &Path, name: &str) -> Result<Value> {
        self.environment
            .core_module(name)
            .ok_or_else(|| TestError::not_found(name, from.display().to_string()))
    }

    /// Appends the sibling-extension hint to a module-not-found error when
    /// files with the requested basename but unconfigured extensions sit
    /// next to the resolution target.
    pub(crate) fn enrich_not_found(
        &self,
        error: TestError,
        from: &Path,
        request: &str,
    ) -> TestError {
        let TestError::ModuleNotFound {
            request: req,
            from: from_display,
            hint,
        } = &error
        else {
            return error;
        };
        if !hint.is_empty() || !(request.starts_with("./") || request.starts_with("../")) {
            return error;
        }
        let target = normalize(&from.parent().unwrap_or(Path::new(".")).join(request));
        let Some(stem) = target.file_name().map(|name| name.to_os_string()) else {
            return error;
        };
        let Some(dir) = target.parent() else {
            return error;
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return error;
        };
        let mut siblings = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.file_stem().map(|s| s.to_os_string()) != Some(stem.clone()) {
                continue;
            }
            let extension = match path.extension().and_then(|e| e.to_str()) {
                Some(extension) => format!(".{}", extension),
                None => continue,
            };
            if !self.config.module_file_extensions.contains(&extension) {
                siblings.push(
                    path.file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .to_string(),
                );
            }
        }
        if siblings.is_empty() {
            return error;
        }
        siblings.sort();
        let hint = format!(
            " (however, a sibling file named '{}' exists; consider adding its extension to module_file_extensions)",
            siblings.join("', '")
        );
        TestError::ModuleNotFound {
            request: req.clone(),
            from: from_display.clone(),
            hint,
        }
    }
}

/// Separator-wrapped name of the dependency directory, so a bare
/// `node_modules` path component is matched and a package named
/// `node_modules_helper` is not.
pub(crate) fn dependency_fragment() -> String {
    format!(
        "{}node_modules{}",
        std::path::MAIN_SEPARATOR,
        std::path::MAIN_SEPARATOR
    )
}

struct IsolationGuard<'a> {
    runtime: &'a TestRuntime,
}

impl Drop for IsolationGuard<'_> {
    fn drop(&mut self) {
        *self.runtime.isolated_module_registry.write() = None;
        *self.runtime.isolated_mock_registry.write() = None;
    }
}
