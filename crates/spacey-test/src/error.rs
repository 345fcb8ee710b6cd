// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the test-framework module runtime.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for module runtime operations.
pub type Result<T> = std::result::Result<T, TestError>;

/// Errors that can occur in the module runtime.
#[derive(Debug, Error)]
pub enum TestError {
    /// Module resolution failed. The hint names sibling files whose
    /// extensions are missing from the configured set, when any exist.
    #[error("Cannot find module '{request}' from '{from}'{hint}")]
    ModuleNotFound {
        /// Module specifier as requested.
        request: String,
        /// Path of the requiring module.
        from: String,
        /// Sibling-extension hint, or an empty string.
        hint: String,
    },

    /// `resolve` with an explicit `paths` option exhausted every directory.
    #[error("Cannot resolve module '{request}' from paths {tried:?} from '{from}'")]
    ResolveFromPaths {
        /// Module specifier as requested.
        request: String,
        /// Directories tried, in order.
        tried: Vec<PathBuf>,
        /// Path of the requiring module.
        from: String,
    },

    /// `isolate_modules` called while an isolation scope is already open.
    #[error("isolate_modules cannot be nested")]
    NestedIsolation,

    /// Null or empty request passed to `resolve_paths`.
    #[error("The argument to require.resolve.paths must be a non-empty string")]
    BadResolveArg,

    /// A configured extra global is missing from the environment global.
    #[error("You have requested '{name}' as an extra global, but it could not be found on the environment global")]
    MissingExtraGlobal {
        /// Name of the missing global.
        name: String,
    },

    /// The environment produced no mock metadata for a module's exports.
    #[error("Failed to generate mock for module '{path}': metadata was null. This is often the result of a module that exports nothing")]
    AutomockMetadataNull {
        /// Path of the module being automocked.
        path: PathBuf,
    },

    /// Native addon with no registered loader.
    #[error("No native-addon loader is registered for '{0}'")]
    NativeAddon(PathBuf),

    /// File system error.
    #[error("File system error: {0}")]
    Fs(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Invalid unmock pattern in the configuration.
    #[error("Invalid unmock pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Error raised by evaluated module code.
    #[error("{0}")]
    Evaluation(String),
}

impl TestError {
    /// Creates a module-not-found error with no hint.
    pub fn not_found(request: impl Into<String>, from: impl Into<String>) -> Self {
        Self::ModuleNotFound {
            request: request.into(),
            from: from.into(),
            hint: String::new(),
        }
    }

    /// Creates an evaluation error.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }
}
