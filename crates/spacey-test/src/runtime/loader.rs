// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loading: dispatch on file kind and populate a registry slot.
//!
//! Callers pre-register the record before invoking the loader, which is
//! what makes circular requires resolve to a partial record instead of
//! recursing.

use crate::error::{Result, TestError};
use crate::runtime::registry::ModuleHandle;
use crate::runtime::test_runtime::TestRuntime;
use crate::runtime::RequireIntent;
use spacey_sandbox::Value;
use std::path::Path;
use std::sync::Arc;

impl TestRuntime {
    /// Loads `path` into the pre-registered record.
    ///
    /// JSON files are transformed and parsed by the sandbox's parser;
    /// native addons come from the host loader; everything else is
    /// evaluated by the executor. `loaded` flips only after success.
    pub(crate) fn load_module(
        self: &Arc<Self>,
        record: &ModuleHandle,
        from: Option<&Path>,
        request: Option<&str>,
        path: &Path,
        intent: RequireIntent,
    ) -> Result<()> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension {
            "json" => {
                let text = self.cached_source(path)?;
                let transformed = self.transformer.transform_json(path, &self.config, &text)?;
                record.set_exports(Value::from_json_str(&transformed)?);
                record.set_caller(from.map(|caller| caller.to_path_buf()));
            }
            "node" => {
                let exports = self
                    .environment
                    .native_addon(path)
                    .ok_or_else(|| TestError::NativeAddon(path.to_path_buf()))?;
                record.set_exports(exports);
                record.set_caller(from.map(|caller| caller.to_path_buf()));
            }
            _ => {
                // A load with no request is the root of the require graph.
                let exec_from = if request.is_some() { from } else { None };
                self.exec_module(record, exec_from, intent)?;
            }
        }
        record.set_loaded(true);
        Ok(())
    }
}
