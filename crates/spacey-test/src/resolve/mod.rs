// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module identifier derivation and the resolver interface.
//!
//! The runtime consumes resolution through the [`Resolver`] trait; the
//! bundled [`NodeResolver`] implements the Node.js algorithm over the real
//! filesystem.

mod node_resolver;

pub use node_resolver::NodeResolver;

use crate::error::Result;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Stable opaque identifier for a resolved (or virtual) module.
///
/// Derived from the caller path and request; distinct requests that reach
/// the same module share an identifier. Used as the key of every mock
/// registry and policy map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId(String);

impl ModuleId {
    /// Wraps a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Identifier for a module key (an absolute path).
    pub fn from_key(path: &Path) -> Self {
        Self(normalize(path).display().to_string())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lexically normalizes a path: resolves `.` and `..` components and
/// unifies separators, without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Module path resolution, as consumed by the runtime.
///
/// Implementations may be shared across runtimes and are treated as
/// read-mostly.
pub trait Resolver: Send + Sync {
    /// Derives the stable module identifier for `(from, request)`.
    ///
    /// With no request, the identifier names `from` itself. Virtual mocks
    /// participate so that identifiers exist for modules with no file on
    /// disk.
    fn module_id(
        &self,
        virtual_mocks: &HashSet<PathBuf>,
        from: &Path,
        request: Option<&str>,
    ) -> ModuleId;

    /// Resolves a request to an absolute module path.
    fn resolve_module(&self, from: &Path, request: &str) -> Result<PathBuf>;

    /// Resolves a request against a specific directory, or returns `None`.
    fn resolve_module_from_dir_if_exists(&self, dir: &Path, request: &str) -> Option<PathBuf>;

    /// Checks whether a name refers to a core module.
    fn is_core_module(&self, name: &str) -> bool;

    /// Looks up a module registered by name (the haste-map view).
    fn get_module(&self, name: &str) -> Option<PathBuf>;

    /// Looks up a manual mock for the request.
    fn get_mock_module(&self, from: &Path, name: &str) -> Option<PathBuf>;

    /// Resolves a stub-redirection for the request, when the project maps
    /// one.
    fn resolve_stub_module(&self, _from: &Path, _name: &str) -> Option<PathBuf> {
        None
    }

    /// The `node_modules` search-path chain rooted at `dir`.
    fn get_module_paths(&self, dir: &Path) -> Vec<PathBuf>;

    /// Derives the path a request would occupy, whether or not it exists.
    /// Used to key virtual mocks.
    fn get_module_path(&self, from: &Path, name: &str) -> PathBuf;
}
