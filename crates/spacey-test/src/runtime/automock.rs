// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Automock generation.
//!
//! The real module is loaded inside a throwaway registry frame so its
//! top-level side effects cannot leak into the live registries, then its
//! exports are described to the environment's mocker and a mock is
//! synthesized from the metadata. Metadata is cached per module path; the
//! cache entry is seeded with empty metadata before the load so cyclic
//! modules generate instead of recursing.

use crate::error::{Result, TestError};
use crate::resolve::normalize;
use crate::runtime::registry::{MockRegistry, ModuleRegistry};
use crate::runtime::test_runtime::TestRuntime;
use spacey_sandbox::{ModuleMocker, Value};
use std::path::Path;
use std::sync::Arc;

impl TestRuntime {
    /// Generates (or regenerates from cached metadata) the automock for
    /// `(from, request)`.
    pub(crate) fn generate_mock(self: &Arc<Self>, from: &Path, request: &str) -> Result<Value> {
        let path = self.resolve_module(from, request)?;
        let key = normalize(&path);

        let cached = self.mock_metadata_cache.read().contains_key(&key);
        if !cached {
            self.mock_metadata_cache
                .write()
                .insert(key.clone(), ModuleMocker::empty_metadata());

            tracing::debug!(module = %key.display(), "generating automock");
            let exports = {
                let _frame = RegistryFrame::enter(self);
                self.require_real_module(from, request)
            }?;

            let metadata = self
                .environment
                .mocker()
                .get_metadata(&exports)
                .ok_or_else(|| TestError::AutomockMetadataNull { path: key.clone() })?;
            self.mock_metadata_cache.write().insert(key.clone(), metadata);
        }

        let metadata = self
            .mock_metadata_cache
            .read()
            .get(&key)
            .cloned()
            .unwrap_or_else(ModuleMocker::empty_metadata);
        Ok(self.environment.mocker().generate_from_metadata(&metadata))
    }

    /// Real load used by generation: resolution and evaluation run as a
    /// normal require, but against the throwaway frame.
    fn require_real_module(self: &Arc<Self>, from: &Path, request: &str) -> Result<Value> {
        let path = self.resolve_module(from, request)?;
        self.require_by_path(
            Some(from),
            Some(request),
            &path,
            crate::runtime::RequireIntent::Normal,
        )
    }
}

/// Swaps the live real and mock registries for fresh ones; the originals
/// come back when the frame drops, on every exit path.
struct RegistryFrame<'a> {
    runtime: &'a TestRuntime,
    saved_modules: ModuleRegistry,
    saved_mocks: MockRegistry,
}

impl<'a> RegistryFrame<'a> {
    fn enter(runtime: &'a TestRuntime) -> Self {
        let saved_modules =
            std::mem::take(&mut *runtime.module_registry.write());
        let saved_mocks = std::mem::take(&mut *runtime.mock_registry.write());
        Self {
            runtime,
            saved_modules,
            saved_mocks,
        }
    }
}

impl Drop for RegistryFrame<'_> {
    fn drop(&mut self) {
        *self.runtime.module_registry.write() = std::mem::take(&mut self.saved_modules);
        *self.runtime.mock_registry.write() = std::mem::take(&mut self.saved_mocks);
    }
}
