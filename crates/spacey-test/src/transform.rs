// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code transformation interface and the CommonJS source wrapper.

use crate::config::RuntimeConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Name under which the module wrapper is reachable inside an executed
/// script. Environments use it to pick the wrapper callable out of the
/// evaluation result.
pub const EVAL_RESULT_VARIABLE: &str = "Object.<anonymous>";

/// An executable script produced by a transformer.
#[derive(Debug, Clone)]
pub struct TransformedScript {
    /// Path of the source module.
    pub path: PathBuf,
    /// Transformed program text.
    pub code: String,
}

/// Outcome of transforming one module.
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// The executable script.
    pub script: TransformedScript,
    /// Source map emitted alongside the transform, if any.
    pub source_map_path: Option<PathBuf>,
    /// Whether coverage data for this file must be mapped through the
    /// source map.
    pub map_coverage: bool,
}

/// Transforms module source before evaluation.
pub trait Transformer: Send + Sync {
    /// Transforms the cached source of `path` into an executable script.
    fn transform(
        &self,
        path: &Path,
        config: &RuntimeConfig,
        cached_source: &str,
    ) -> Result<TransformResult>;

    /// Transforms JSON text before it is parsed in the sandbox.
    fn transform_json(&self, path: &Path, config: &RuntimeConfig, text: &str) -> Result<String>;
}

/// Pass-through transformer: wraps source in the CommonJS module wrapper
/// and forwards JSON untouched. Discovers a sibling `.map` file when the
/// build step left one behind.
#[derive(Debug, Default)]
pub struct SourceTransformer;

impl SourceTransformer {
    /// Creates the pass-through transformer.
    pub fn new() -> Self {
        Self
    }

    /// Wraps source code in the module wrapper function.
    fn wrap(source: &str, config: &RuntimeConfig) -> String {
        let mut params = vec![
            "module",
            "exports",
            "require",
            "__dirname",
            "__filename",
            "global",
            "harness",
        ]
        .join(", ");
        for extra in &config.extra_globals {
            params.push_str(", ");
            params.push_str(extra);
        }
        format!(
            "({{\"{}\":function({}) {{\n{}\n}}}});",
            EVAL_RESULT_VARIABLE, params, source
        )
    }
}

impl Transformer for SourceTransformer {
    fn transform(
        &self,
        path: &Path,
        config: &RuntimeConfig,
        cached_source: &str,
    ) -> Result<TransformResult> {
        let mut map_path = path.as_os_str().to_os_string();
        map_path.push(".map");
        let map_path = PathBuf::from(map_path);
        let source_map_path = map_path.is_file().then_some(map_path);
        Ok(TransformResult {
            script: TransformedScript {
                path: path.to_path_buf(),
                code: Self::wrap(cached_source, config),
            },
            source_map_path,
            map_coverage: false,
        })
    }

    fn transform_json(&self, _path: &Path, _config: &RuntimeConfig, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}
