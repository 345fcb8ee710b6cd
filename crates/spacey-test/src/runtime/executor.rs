// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Sandboxed module evaluation.
//!
//! The executor invokes the transformed script's wrapper with the injected
//! locals (module, exports, require, dirname, filename, global, the
//! reflective control object, and the configured extra globals). The
//! reentrancy slots for "currently executing module" and "currently
//! executing manual mock" are saved and restored by a drop guard, so every
//! exit path, including errors from evaluated code, leaves them intact.

use crate::environment::ModuleScope;
use crate::error::{Result, TestError};
use crate::runtime::registry::ModuleHandle;
use crate::runtime::test_runtime::TestRuntime;
use crate::runtime::{ModuleRequire, RequireIntent};
use std::path::{Path, PathBuf};
use std::sync::Arc;

impl TestRuntime {
    /// Evaluates a transformable module into its pre-registered record.
    ///
    /// A torn-down environment (no global) is a diagnostic, not an error:
    /// it is logged, the exit code is set to 1, and the call returns.
    pub(crate) fn exec_module(
        self: &Arc<Self>,
        record: &ModuleHandle,
        from: Option<&Path>,
        intent: RequireIntent,
    ) -> Result<()> {
        let Some(global) = self.environment.global() else {
            self.report_torn_down(record.filename());
            return Ok(());
        };

        let filename = record.filename().to_path_buf();
        let dirname = filename
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let _reentrancy = ReentrancyGuard::enter(self, &filename);
        record.reset_children();
        record.set_caller(from.map(PathBuf::from));
        record.set_paths(self.resolver.get_module_paths(&dirname));

        let require = ModuleRequire::new(Arc::clone(self), filename.clone(), intent);
        let source = self.cached_source(&filename)?;
        let transformed = self.transformer.transform(&filename, &self.config, &source)?;
        if let Some(map_path) = &transformed.source_map_path {
            self.source_maps.insert(filename.clone(), map_path.clone());
            if transformed.map_coverage {
                self.coverage_mapped.write().insert(filename.clone());
            }
        }

        let Some(wrapper) = self.environment.run_script(&transformed.script) else {
            self.report_torn_down(&filename);
            return Ok(());
        };

        let mut extra_globals = Vec::with_capacity(self.config.extra_globals.len());
        for name in &self.config.extra_globals {
            let value = global
                .get(name)
                .ok_or_else(|| TestError::MissingExtraGlobal { name: name.clone() })?;
            extra_globals.push(value);
        }

        let hooks = self.create_hooks_bound(filename.clone(), require.clone());
        let scope = ModuleScope {
            module: record.as_ref(),
            exports: record.exports(),
            require: &require,
            dirname: &dirname,
            filename: &filename,
            global,
            hooks: &hooks,
            extra_globals,
        };

        tracing::debug!(module = %filename.display(), "evaluating module");
        wrapper(&scope)
    }

    fn report_torn_down(&self, path: &Path) {
        tracing::error!(
            "ReferenceError: You are trying to require '{}' after the test environment has been torn down",
            path.display()
        );
        self.set_exit_code(1);
    }
}

/// Saves the reentrancy slots on entry and restores them, in reverse order
/// of the save, when dropped.
struct ReentrancyGuard<'a> {
    runtime: &'a TestRuntime,
    previous_path: PathBuf,
    previous_manual: Option<PathBuf>,
}

impl<'a> ReentrancyGuard<'a> {
    fn enter(runtime: &'a TestRuntime, filename: &Path) -> Self {
        let previous_path = std::mem::replace(
            &mut *runtime.executing_module_path.write(),
            filename.to_path_buf(),
        );
        let previous_manual = std::mem::replace(
            &mut *runtime.executing_manual_mock.write(),
            Some(filename.to_path_buf()),
        );
        Self {
            runtime,
            previous_path,
            previous_manual,
        }
    }
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        *self.runtime.executing_manual_mock.write() = self.previous_manual.take();
        *self.runtime.executing_module_path.write() = std::mem::take(&mut self.previous_path);
    }
}
