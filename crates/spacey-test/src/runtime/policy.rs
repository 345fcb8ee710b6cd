// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resolution policy: whether a require delivers the real module, a manual
//! mock, an automock, or a core module.
//!
//! The decision is a pure function of the policy inputs (explicit and
//! transitive mock maps, the unmock-pattern union, the automock flag, the
//! virtual-mock set) plus the reentrancy state, memoized where the inputs
//! allow. An explicit `false` dominates every other signal.

use crate::error::Result;
use crate::resolve::{normalize, ModuleId};
use crate::runtime::test_runtime::{dependency_fragment, TestRuntime};
use std::path::{Path, PathBuf};

/// Why a module is being required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequireIntent {
    /// Ordinary require; the full mock policy applies.
    Normal,
    /// Framework-internal load; never mocked, cached separately.
    Internal,
    /// `requireActual`: bypass every mock decision.
    ForceReal,
    /// `requireMock`: always deliver a mock.
    MockOnly,
}

/// Outcome of resolving one request.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Deliver the real module at this path.
    Real(PathBuf),
    /// Deliver the manual mock file at this path.
    ManualMock(PathBuf),
    /// Synthesize (or fetch) an automock under this identifier.
    AutoMock(ModuleId),
    /// Deliver a core module by name.
    Core(String),
}

impl TestRuntime {
    /// Decides how `(from, request)` resolves under the given intent.
    pub fn resolve_kind(
        &self,
        from: &Path,
        request: &str,
        intent: RequireIntent,
    ) -> Result<Resolution> {
        let id = self.id_for(from, request);

        match intent {
            RequireIntent::ForceReal | RequireIntent::Internal => {
                return Ok(Resolution::Real(self.resolve_module(from, request)?));
            }
            RequireIntent::MockOnly => return self.mock_resolution(from, request, id),
            RequireIntent::Normal => {}
        }

        if self.resolver.is_core_module(request) {
            return Ok(Resolution::Core(request.to_string()));
        }

        // A registered manual mock wins outright when nothing by that name
        // is registered as a real module, unless the mock is the file
        // currently evaluating (a manual mock must not re-dispatch to
        // itself) or the module is explicitly unmocked.
        let manual = self.resolver.get_mock_module(from, request);
        if let Some(manual_path) = &manual {
            let resource = self.resolver.get_module(request);
            let executing_manual = self.executing_manual_mock.read().clone();
            let explicit = self.explicit_should_mock.read().get(&id).copied();
            if resource.is_none()
                && executing_manual.as_deref() != Some(manual_path.as_path())
                && explicit != Some(false)
            {
                return Ok(Resolution::ManualMock(manual_path.clone()));
            }
        }

        if self.should_mock(from, request, &id)? {
            self.mock_resolution(from, request, id)
        } else {
            Ok(Resolution::Real(self.resolve_module(from, request)?))
        }
    }

    /// The mock branch of the decision: a manual mock file when the
    /// resolver reports one with no stub redirection, an automock
    /// otherwise.
    pub(crate) fn mock_resolution(
        &self,
        from: &Path,
        request: &str,
        id: ModuleId,
    ) -> Result<Resolution> {
        if let Some(manual) = self.resolver.get_mock_module(from, request) {
            if self.resolver.resolve_stub_module(from, request).is_none() {
                return Ok(Resolution::ManualMock(manual));
            }
        }
        Ok(Resolution::AutoMock(id))
    }

    /// Whether `(from, request)` should deliver a mock.
    pub(crate) fn should_mock(&self, from: &Path, request: &str, id: &ModuleId) -> Result<bool> {
        if let Some(explicit) = self.explicit_should_mock.read().get(id) {
            return Ok(*explicit);
        }
        if !self.auto_mock_enabled() {
            return Ok(false);
        }
        if self.resolver.is_core_module(request) {
            return Ok(false);
        }
        let transitive_key = (normalize(from), id.clone());
        if self.transitive_unmock_cache.contains_key(&transitive_key) {
            return Ok(false);
        }
        if let Some(cached) = self.should_mock_cache.get(id) {
            return Ok(*cached);
        }

        let real_path = match self.resolve_module(from, request) {
            Ok(path) => path,
            Err(error) => {
                // Unresolvable but manually mocked: the mock is all there
                // is, deliver it.
                if self.resolver.get_mock_module(from, request).is_some() {
                    self.should_mock_cache.insert(id.clone(), true);
                    return Ok(true);
                }
                return Err(error);
            }
        };

        if let Some(patterns) = &self.unmock_patterns {
            if patterns.is_match(&real_path.display().to_string()) {
                self.should_mock_cache.insert(id.clone(), false);
                return Ok(false);
            }
        }

        // Transitive unmocking: a caller that is itself unmocked (deeply,
        // or as an unmock-patterned dependency requiring a fellow
        // dependency) propagates "do not mock" to its requires.
        let caller_id = {
            let virtuals = self.virtual_mocks.read();
            self.resolver.module_id(&virtuals, from, None)
        };
        let caller_transitively_unmocked = self
            .transitive_should_mock
            .read()
            .get(&caller_id)
            .copied()
            == Some(false);
        let dependency_dir = dependency_fragment();
        let from_display = from.display().to_string();
        let crossing_dependencies = from_display.contains(&dependency_dir)
            && real_path.display().to_string().contains(&dependency_dir);
        let caller_unmock_patterned = self
            .unmock_patterns
            .as_ref()
            .map_or(false, |patterns| patterns.is_match(&from_display));
        let caller_explicitly_unmocked = self
            .explicit_should_mock
            .read()
            .get(&caller_id)
            .copied()
            == Some(false);

        if caller_transitively_unmocked
            || (crossing_dependencies && (caller_unmock_patterned || caller_explicitly_unmocked))
        {
            self.transitive_should_mock.write().insert(id.clone(), false);
            self.transitive_unmock_cache.insert(transitive_key, true);
            return Ok(false);
        }

        self.should_mock_cache.insert(id.clone(), true);
        Ok(true)
    }
}
