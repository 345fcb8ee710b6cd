// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime configuration, read once at construction.

use serde::Deserialize;
use std::path::PathBuf;

/// Per-project configuration for a [`TestRuntime`](crate::TestRuntime).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Deliver automocks by default.
    pub automock: bool,
    /// Patterns of module paths that are never automocked. Compiled into a
    /// single regex union at construction.
    pub unmocked_module_path_patterns: Vec<String>,
    /// File extensions tried during resolution, in order.
    pub module_file_extensions: Vec<String>,
    /// Names of additional globals injected into every module wrapper,
    /// looked up on the environment global.
    pub extra_globals: Vec<String>,
    /// Framework setup files, loaded before test code.
    pub setup_files: Vec<PathBuf>,
    /// Directory for the transformer's on-disk cache.
    pub cache_directory: PathBuf,
    /// Project root.
    pub root_dir: PathBuf,
    /// Patterns of paths excluded from module resolution.
    pub module_path_ignore_patterns: Vec<String>,
    /// Options passed through to the haste-map factory.
    pub haste: HasteConfig,
    /// Passed through to the resolver; has no effect in the runtime core.
    pub mapper_returns_string: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            automock: false,
            unmocked_module_path_patterns: Vec::new(),
            module_file_extensions: vec![".js".into(), ".json".into(), ".node".into()],
            extra_globals: Vec::new(),
            setup_files: Vec::new(),
            cache_directory: PathBuf::from(".spacey-cache"),
            root_dir: PathBuf::from("."),
            module_path_ignore_patterns: Vec::new(),
            haste: HasteConfig::default(),
            mapper_returns_string: false,
        }
    }
}

/// Options forwarded to the external haste-map factory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HasteConfig {
    /// Platform used when a platform-specific module is absent.
    pub default_platform: Option<String>,
    /// Platforms to consider during haste resolution.
    pub platforms: Vec<String>,
    /// Fail instead of warning on duplicate haste names.
    pub throw_on_module_collision: bool,
}
