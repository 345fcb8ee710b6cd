// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The caller-facing require surface.

use crate::error::{Result, TestError};
use crate::resolve::normalize;
use crate::runtime::policy::{RequireIntent, Resolution};
use crate::runtime::registry::{ModuleHandle, ModuleRecord};
use crate::runtime::test_runtime::TestRuntime;
use spacey_sandbox::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options for [`ModuleRequire::resolve`].
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Directories to resolve from, tried in order, instead of the normal
    /// algorithm.
    pub paths: Option<Vec<PathBuf>>,
}

/// A require function bound to one calling module.
///
/// Every evaluated module receives a fresh surface bound to its own
/// filename; the runtime hands the same type to embedders through
/// [`TestRuntime::create_require`].
#[derive(Clone)]
pub struct ModuleRequire {
    runtime: Arc<TestRuntime>,
    from: PathBuf,
    intent: RequireIntent,
}

impl ModuleRequire {
    pub(crate) fn new(runtime: Arc<TestRuntime>, from: PathBuf, intent: RequireIntent) -> Self {
        Self {
            runtime,
            from,
            intent,
        }
    }

    /// The path this surface is bound to.
    pub fn from_path(&self) -> &Path {
        &self.from
    }

    /// Requires a module under the full resolution policy. Internal
    /// surfaces stay internal.
    pub fn require(&self, request: &str) -> Result<Value> {
        match self.intent {
            RequireIntent::Internal => self
                .runtime
                .require_internal_module(&self.from, request),
            _ => self.runtime.require_module_or_mock(&self.from, request),
        }
    }

    /// Requires the real module, bypassing every mock decision.
    pub fn require_actual(&self, request: &str) -> Result<Value> {
        self.runtime.require_actual(&self.from, request)
    }

    /// Requires the mock for a module.
    pub fn require_mock(&self, request: &str) -> Result<Value> {
        self.runtime.require_mock(&self.from, request)
    }

    /// Resolves a request to a path without loading it.
    ///
    /// With an explicit `paths` option, each directory is tried in order
    /// and exhaustion fails enumerating them. Without one, normal
    /// resolution falls back to the manual-mock lookup before failing.
    pub fn resolve(&self, request: &str, options: Option<&ResolveOptions>) -> Result<PathBuf> {
        if let Some(paths) = options.and_then(|options| options.paths.as_ref()) {
            for dir in paths {
                if let Some(found) = self
                    .runtime
                    .resolver()
                    .resolve_module_from_dir_if_exists(dir, request)
                {
                    return Ok(found);
                }
            }
            return Err(TestError::ResolveFromPaths {
                request: request.to_string(),
                tried: paths.clone(),
                from: self.from.display().to_string(),
            });
        }
        match self.runtime.resolve_module(&self.from, request) {
            Ok(path) => Ok(path),
            Err(error) => self
                .runtime
                .resolver()
                .get_mock_module(&self.from, request)
                .ok_or(error),
        }
    }

    /// The directories `require.resolve.paths` would search.
    ///
    /// Fails on an empty request, returns the caller's directory for
    /// relative requests, and `None` for core modules.
    pub fn resolve_paths(&self, request: &str) -> Result<Option<Vec<PathBuf>>> {
        if request.is_empty() {
            return Err(TestError::BadResolveArg);
        }
        let dirname = self
            .from
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        if request.starts_with("./") || request.starts_with("../") {
            return Ok(Some(vec![dirname]));
        }
        if self.runtime.resolver().is_core_module(request) {
            return Ok(None);
        }
        Ok(Some(self.runtime.resolver().get_module_paths(&dirname)))
    }

    /// Snapshot view of the visible module cache.
    pub fn cache(&self) -> Vec<(PathBuf, Value)> {
        self.runtime.cache_snapshot()
    }

    /// The main module: the terminal ancestor of this module's parent
    /// chain.
    pub fn main(&self) -> Option<ModuleHandle> {
        let record = self.runtime.find_record(&normalize(&self.from))?;
        let mut current = self.runtime.module_parent(&record)?;
        loop {
            match self.runtime.module_parent(&current) {
                None => return Some(current),
                Some(parent) if parent.id() == current.id() => return Some(current),
                Some(parent) => current = parent,
            }
        }
    }
}

impl TestRuntime {
    /// Creates a require surface bound to `path`, for harness code.
    pub fn create_require(self: &Arc<Self>, path: &Path) -> ModuleRequire {
        ModuleRequire::new(Arc::clone(self), path.to_path_buf(), RequireIntent::Normal)
    }

    /// Loads the entry module of a require graph (no requesting module).
    pub fn load_entry_module(self: &Arc<Self>, path: &Path) -> Result<Value> {
        self.require_by_path(None, None, path, RequireIntent::Normal)
    }

    /// Requires the real module for `(from, request)` without consulting
    /// the mock policy, but through the normal registries.
    pub fn require_actual(self: &Arc<Self>, from: &Path, request: &str) -> Result<Value> {
        if self.resolver.is_core_module(request) {
            return self.core_exports(from, request);
        }
        match self.resolve_kind(from, request, RequireIntent::ForceReal)? {
            Resolution::Real(path) => {
                self.require_by_path(Some(from), Some(request), &path, RequireIntent::ForceReal)
            }
            // Force-real resolution only produces real modules.
            _ => Err(TestError::not_found(request, from.display().to_string())),
        }
    }

    /// Requires a framework-internal module; never mocked, cached in the
    /// internal registry, untouched by `reset_modules`.
    pub fn require_internal_module(
        self: &Arc<Self>,
        from: &Path,
        request: &str,
    ) -> Result<Value> {
        if self.resolver.is_core_module(request) {
            return self.core_exports(from, request);
        }
        let path = self.resolve_module(from, request)?;
        self.require_by_path(Some(from), Some(request), &path, RequireIntent::Internal)
    }

    /// Requires `(from, request)` under the full resolution policy.
    pub fn require_module_or_mock(
        self: &Arc<Self>,
        from: &Path,
        request: &str,
    ) -> Result<Value> {
        let result = match self.resolve_kind(from, request, RequireIntent::Normal) {
            Ok(Resolution::Core(name)) => self.core_exports(from, &name),
            Ok(Resolution::Real(path)) => {
                self.require_by_path(Some(from), Some(request), &path, RequireIntent::Normal)
            }
            Ok(Resolution::ManualMock(_)) | Ok(Resolution::AutoMock(_)) => {
                self.require_mock(from, request)
            }
            Err(error) => Err(error),
        };
        result.map_err(|error| self.enrich_not_found(error, from, request))
    }

    /// Requires the mock for `(from, request)`.
    ///
    /// Preference order: a cached entry (isolation scope first), a
    /// registered factory, a manual mock file (including one in a
    /// `__mocks__` directory adjacent to the real module), and finally a
    /// synthesized automock.
    pub fn require_mock(self: &Arc<Self>, from: &Path, request: &str) -> Result<Value> {
        let id = self.id_for(from, request);

        if let Some(isolated) = self.isolated_mock_registry.read().as_ref() {
            if let Some(cached) = isolated.get(&id) {
                return Ok(cached);
            }
        }
        if let Some(cached) = self.mock_registry.read().get(&id) {
            return Ok(cached);
        }

        let factory = self.mock_factories.read().get(&id).cloned();
        if let Some(factory) = factory {
            let exports = factory();
            self.insert_mock(id, exports.clone());
            return Ok(exports);
        }

        let manual = self.resolver.get_mock_module(from, request);
        let mut module_path = match &manual {
            Some(path) => path.clone(),
            None => self.resolve_module(from, request)?,
        };
        let mut is_manual_mock =
            manual.is_some() && self.resolver.resolve_stub_module(from, request).is_none();
        if !is_manual_mock {
            // A __mocks__ directory sitting immediately next to the real
            // module supplies its manual mock.
            if let (Some(dir), Some(base)) = (module_path.parent(), module_path.file_name()) {
                let adjacent = dir.join("__mocks__").join(base);
                if adjacent.is_file() {
                    module_path = adjacent;
                    is_manual_mock = true;
                }
            }
        }

        let exports = if is_manual_mock {
            tracing::debug!(mock = %module_path.display(), "loading manual mock");
            let record = ModuleRecord::pre_register(normalize(&module_path));
            self.load_module(
                &record,
                Some(from),
                Some(request),
                &module_path,
                RequireIntent::Normal,
            )?;
            record.exports()
        } else {
            self.generate_mock(from, request)?
        };
        self.insert_mock(id, exports.clone());
        Ok(exports)
    }

    /// Requires a resolved real-module path into the selected registry,
    /// pre-registering a record on miss.
    pub(crate) fn require_by_path(
        self: &Arc<Self>,
        from: Option<&Path>,
        request: Option<&str>,
        path: &Path,
        intent: RequireIntent,
    ) -> Result<Value> {
        let key = normalize(path);
        let selection = self.select_registry(intent, &key);
        if let Some(record) = self.registry_get(selection, &key) {
            return Ok(record.exports());
        }

        let record = ModuleRecord::pre_register(key.clone());
        self.registry_insert(selection, key, record.clone());
        if let Some(from) = from {
            if let Some(parent) = self.find_record(&normalize(from)) {
                parent.add_child(record.clone());
            }
        }

        self.load_module(&record, from, request, path, intent)?;
        Ok(record.exports())
    }

    pub(crate) fn insert_mock(&self, id: crate::resolve::ModuleId, exports: Value) {
        if let Some(isolated) = self.isolated_mock_registry.write().as_mut() {
            isolated.insert(id, exports);
            return;
        }
        self.mock_registry.write().insert(id, exports);
    }
}
