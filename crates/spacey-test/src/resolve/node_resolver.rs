// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution (Node.js algorithm).

use crate::config::RuntimeConfig;
use crate::error::{Result, TestError};
use crate::resolve::{normalize, ModuleId, Resolver};
use parking_lot::RwLock;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Minimal package.json structure for resolution.
#[derive(Debug, Deserialize)]
struct PackageJson {
    main: Option<String>,
}

/// Module resolver implementing the Node.js resolution algorithm, plus the
/// test-framework lookups: manual mocks under `__mocks__` and a registered
/// named-module table standing in for the haste map.
pub struct NodeResolver {
    /// Core module names.
    builtins: Vec<String>,
    /// File extensions to try.
    extensions: Vec<String>,
    /// Roots searched for named manual mocks.
    mock_roots: Vec<PathBuf>,
    /// Paths excluded from resolution.
    ignore: Option<Regex>,
    /// Modules registered by name.
    named_modules: RwLock<HashMap<String, PathBuf>>,
}

impl NodeResolver {
    /// Creates a resolver for the given project configuration.
    pub fn new(config: &RuntimeConfig) -> Self {
        let ignore = if config.module_path_ignore_patterns.is_empty() {
            None
        } else {
            Regex::new(&config.module_path_ignore_patterns.join("|")).ok()
        };
        Self {
            builtins: builtin_names(),
            extensions: config.module_file_extensions.clone(),
            mock_roots: vec![config.root_dir.clone()],
            ignore,
            named_modules: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a module under a bare name, the way a haste map would.
    pub fn register_named_module(&self, name: impl Into<String>, path: PathBuf) {
        self.named_modules.write().insert(name.into(), path);
    }

    fn is_ignored(&self, path: &Path) -> bool {
        match &self.ignore {
            Some(pattern) => pattern.is_match(&path.display().to_string()),
            None => false,
        }
    }

    /// Resolve a file path, trying the exact name, configured extensions,
    /// and directory entry points.
    fn resolve_file(&self, path: &Path) -> Option<PathBuf> {
        if self.is_ignored(path) {
            return None;
        }
        if path.is_file() {
            return Some(canonical(path));
        }
        for ext in &self.extensions {
            let mut with_ext = path.as_os_str().to_os_string();
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return Some(canonical(&with_ext));
            }
        }
        if path.is_dir() {
            return self.resolve_directory(path);
        }
        None
    }

    /// Resolve a directory (package.json `main`, then index files).
    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        let package_json_path = dir.join("package.json");
        if package_json_path.is_file() {
            if let Ok(content) = std::fs::read_to_string(&package_json_path) {
                if let Ok(pkg) = serde_json::from_str::<PackageJson>(&content) {
                    if let Some(main) = pkg.main {
                        if let Some(resolved) = self.resolve_file(&dir.join(main)) {
                            return Some(resolved);
                        }
                    }
                }
            }
        }
        for ext in &self.extensions {
            let index = dir.join(format!("index{}", ext));
            if index.is_file() {
                return Some(canonical(&index));
            }
        }
        None
    }

    /// Resolve a bare specifier by walking ancestor `node_modules`
    /// directories.
    fn resolve_node_modules(&self, specifier: &str, parent_dir: &Path) -> Option<PathBuf> {
        let (package_name, subpath) = parse_package_specifier(specifier);
        let mut current = Some(parent_dir);
        while let Some(dir) = current {
            let package_dir = dir.join("node_modules").join(package_name);
            if package_dir.exists() {
                let target = match subpath {
                    Some(sub) => package_dir.join(sub),
                    None => package_dir,
                };
                if let Some(resolved) = self.resolve_file(&target) {
                    return Some(resolved);
                }
            }
            current = dir.parent();
        }
        None
    }

    fn try_resolve(&self, from: &Path, request: &str) -> Option<PathBuf> {
        if is_relative_request(request) || Path::new(request).is_absolute() {
            let parent_dir = from.parent().unwrap_or(Path::new("."));
            let base = if Path::new(request).is_absolute() {
                PathBuf::from(request)
            } else {
                normalize(&parent_dir.join(request))
            };
            return self.resolve_file(&base);
        }
        if let Some(named) = self.named_modules.read().get(request) {
            return self.resolve_file(named);
        }
        let parent_dir = from.parent().unwrap_or(Path::new("."));
        self.resolve_node_modules(request, parent_dir)
    }
}

impl Resolver for NodeResolver {
    fn module_id(
        &self,
        virtual_mocks: &HashSet<PathBuf>,
        from: &Path,
        request: Option<&str>,
    ) -> ModuleId {
        let request = match request {
            Some(request) => request,
            None => return ModuleId::from_key(from),
        };
        if let Some(path) = self.try_resolve(from, request) {
            return ModuleId::from_key(&path);
        }
        let virtual_path = self.get_module_path(from, request);
        if virtual_mocks.contains(&virtual_path) {
            return ModuleId::from_key(&virtual_path);
        }
        ModuleId::new(request)
    }

    fn resolve_module(&self, from: &Path, request: &str) -> Result<PathBuf> {
        self.try_resolve(from, request)
            .ok_or_else(|| TestError::not_found(request, from.display().to_string()))
    }

    fn resolve_module_from_dir_if_exists(&self, dir: &Path, request: &str) -> Option<PathBuf> {
        if is_relative_request(request) || Path::new(request).is_absolute() {
            let base = if Path::new(request).is_absolute() {
                PathBuf::from(request)
            } else {
                normalize(&dir.join(request))
            };
            return self.resolve_file(&base);
        }
        self.resolve_file(&dir.join(request))
            .or_else(|| self.resolve_node_modules(request, dir))
    }

    fn is_core_module(&self, name: &str) -> bool {
        let name = name.strip_prefix("node:").unwrap_or(name);
        self.builtins.iter().any(|builtin| builtin == name)
    }

    fn get_module(&self, name: &str) -> Option<PathBuf> {
        self.named_modules.read().get(name).cloned()
    }

    fn get_mock_module(&self, _from: &Path, name: &str) -> Option<PathBuf> {
        // Named mocks only; sibling __mocks__ files of user modules are
        // discovered by the mock loader itself.
        if is_relative_request(name) || Path::new(name).is_absolute() {
            return None;
        }
        for root in &self.mock_roots {
            let base = root.join("__mocks__").join(name);
            if base.is_file() {
                return Some(canonical(&base));
            }
            for ext in &self.extensions {
                let mut with_ext = base.as_os_str().to_os_string();
                with_ext.push(ext);
                let with_ext = PathBuf::from(with_ext);
                if with_ext.is_file() {
                    return Some(canonical(&with_ext));
                }
            }
        }
        None
    }

    fn get_module_paths(&self, dir: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let mut current = Some(dir);
        while let Some(ancestor) = current {
            let is_node_modules = ancestor
                .file_name()
                .map(|name| name == "node_modules")
                .unwrap_or(false);
            if !is_node_modules {
                paths.push(ancestor.join("node_modules"));
            }
            current = ancestor.parent();
        }
        paths
    }

    fn get_module_path(&self, from: &Path, name: &str) -> PathBuf {
        if Path::new(name).is_absolute() {
            return normalize(Path::new(name));
        }
        let parent_dir = from.parent().unwrap_or(Path::new("."));
        normalize(&parent_dir.join(name))
    }
}

/// Canonicalize with a lossless fallback.
fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn is_relative_request(request: &str) -> bool {
    request.starts_with("./") || request.starts_with("../")
}

/// Parse a package specifier into name and optional subpath.
fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    if specifier.starts_with('@') {
        // Scoped package: @scope/name or @scope/name/subpath
        if let Some(slash_pos) = specifier[1..].find('/') {
            let after_scope = &specifier[slash_pos + 2..];
            if let Some(subpath_pos) = after_scope.find('/') {
                let name_end = slash_pos + 2 + subpath_pos;
                return (&specifier[..name_end], Some(&specifier[name_end + 1..]));
            }
        }
        (specifier, None)
    } else {
        // Regular package: name or name/subpath
        if let Some(slash_pos) = specifier.find('/') {
            (&specifier[..slash_pos], Some(&specifier[slash_pos + 1..]))
        } else {
            (specifier, None)
        }
    }
}

fn builtin_names() -> Vec<String> {
    [
        "assert",
        "buffer",
        "child_process",
        "cluster",
        "console",
        "constants",
        "crypto",
        "dgram",
        "dns",
        "domain",
        "events",
        "fs",
        "http",
        "https",
        "module",
        "net",
        "os",
        "path",
        "perf_hooks",
        "process",
        "punycode",
        "querystring",
        "readline",
        "repl",
        "stream",
        "string_decoder",
        "sys",
        "timers",
        "tls",
        "tty",
        "url",
        "util",
        "v8",
        "vm",
        "worker_threads",
        "zlib",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_for(root: &Path) -> NodeResolver {
        let config = RuntimeConfig {
            root_dir: root.to_path_buf(),
            ..RuntimeConfig::default()
        };
        NodeResolver::new(&config)
    }

    fn touch(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_is_core_module() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_for(dir.path());
        assert!(resolver.is_core_module("fs"));
        assert!(resolver.is_core_module("path"));
        assert!(resolver.is_core_module("node:fs"));
        assert!(!resolver.is_core_module("lodash"));
    }

    #[test]
    fn test_parse_package_specifier() {
        assert_eq!(parse_package_specifier("lodash"), ("lodash", None));
        assert_eq!(parse_package_specifier("lodash/get"), ("lodash", Some("get")));
        assert_eq!(parse_package_specifier("@types/node"), ("@types/node", None));
        assert_eq!(
            parse_package_specifier("@babel/core/lib/index"),
            ("@babel/core", Some("lib/index"))
        );
    }

    #[test]
    fn test_resolve_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("lib.js"), "module.exports = {};\n");
        let resolver = resolver_for(dir.path());
        let from = dir.path().join("main.js");

        let resolved = resolver.resolve_module(&from, "./lib").unwrap();
        assert_eq!(resolved.file_name().unwrap(), "lib.js");
        assert!(resolver.resolve_module(&from, "./missing").is_err());
    }

    #[test]
    fn test_resolve_directory_index_and_main() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("pkg/index.js"), "");
        touch(&dir.path().join("withmain/package.json"), r#"{"main": "lib/entry.js"}"#);
        touch(&dir.path().join("withmain/lib/entry.js"), "");
        let resolver = resolver_for(dir.path());
        let from = dir.path().join("main.js");

        let index = resolver.resolve_module(&from, "./pkg").unwrap();
        assert_eq!(index.file_name().unwrap(), "index.js");
        let main = resolver.resolve_module(&from, "./withmain").unwrap();
        assert_eq!(main.file_name().unwrap(), "entry.js");
    }

    #[test]
    fn test_resolve_node_modules_walk() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("node_modules/left-pad/index.js"), "");
        let resolver = resolver_for(dir.path());
        let from = dir.path().join("deep/nested/main.js");
        touch(&from, "");

        let resolved = resolver.resolve_module(&from, "left-pad").unwrap();
        assert!(resolved.ends_with("node_modules/left-pad/index.js"));
    }

    #[test]
    fn test_named_module_registration() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("src/banana.js"), "");
        let resolver = resolver_for(dir.path());
        resolver.register_named_module("Banana", dir.path().join("src/banana.js"));
        let from = dir.path().join("main.js");

        assert!(resolver.get_module("Banana").is_some());
        let resolved = resolver.resolve_module(&from, "Banana").unwrap();
        assert_eq!(resolved.file_name().unwrap(), "banana.js");
    }

    #[test]
    fn test_get_mock_module_from_root() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("__mocks__/left-pad.js"), "");
        let resolver = resolver_for(dir.path());
        let from = dir.path().join("main.js");

        let mock = resolver.get_mock_module(&from, "left-pad").unwrap();
        assert!(mock.ends_with("__mocks__/left-pad.js"));
        assert!(resolver.get_mock_module(&from, "./left-pad").is_none());
    }

    #[test]
    fn test_get_module_paths_skips_node_modules_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_for(dir.path());
        let nested = dir.path().join("node_modules/pkg");

        let paths = resolver.get_module_paths(&nested);
        assert!(paths.contains(&nested.join("node_modules")));
        assert!(!paths.contains(&dir.path().join("node_modules/node_modules")));
    }

    #[test]
    fn test_module_id_virtual() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_for(dir.path());
        let from = dir.path().join("main.js");

        let mut virtuals = HashSet::new();
        let bare = resolver.module_id(&virtuals, &from, Some("ghost"));
        assert_eq!(bare.as_str(), "ghost");

        virtuals.insert(resolver.get_module_path(&from, "ghost"));
        let virtual_id = resolver.module_id(&virtuals, &from, Some("ghost"));
        assert!(virtual_id.as_str().ends_with("ghost"));
        assert_ne!(bare, virtual_id);
    }
}
