//! Shared fixture harness: a temporary project tree with registered
//! module bodies, resolved by the real Node resolver and evaluated by the
//! in-process sandbox environment.

use spacey_test::{
    ModuleRequire, ModuleScope, NodeResolver, RuntimeConfig, SandboxEnvironment,
    SourceTransformer, TestHooks, TestRuntime,
};
use spacey_sandbox::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Project {
    pub dir: TempDir,
    pub env: Arc<SandboxEnvironment>,
    pub runtime: Arc<TestRuntime>,
}

pub struct ProjectBuilder {
    config: RuntimeConfig,
    files: Vec<(String, String)>,
    bodies: Vec<(String, spacey_test::ModuleWrapper)>,
}

pub fn project() -> ProjectBuilder {
    ProjectBuilder {
        config: RuntimeConfig::default(),
        files: Vec::new(),
        bodies: Vec::new(),
    }
}

impl ProjectBuilder {
    pub fn automock(mut self) -> Self {
        self.config.automock = true;
        self
    }

    pub fn unmock_patterns(mut self, patterns: &[&str]) -> Self {
        self.config.unmocked_module_path_patterns =
            patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn extra_globals(mut self, names: &[&str]) -> Self {
        self.config.extra_globals = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Adds a plain file (JSON fixtures, stray siblings).
    pub fn file(mut self, rel: &str, contents: &str) -> Self {
        self.files.push((rel.to_string(), contents.to_string()));
        self
    }

    /// Adds a module: a stub source file on disk plus its executable body.
    pub fn module<F>(mut self, rel: &str, body: F) -> Self
    where
        F: Fn(&ModuleScope<'_>) -> spacey_test::Result<()> + Send + Sync + 'static,
    {
        self.files
            .push((rel.to_string(), format!("// module body for {}\n", rel)));
        self.bodies.push((rel.to_string(), Arc::new(body)));
        self
    }

    pub fn build(self) -> Project {
        let dir = tempfile::tempdir().expect("create project dir");
        for (rel, contents) in &self.files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(&path, contents).expect("write fixture");
        }

        let mut config = self.config;
        config.root_dir = dir.path().to_path_buf();
        let resolver = Arc::new(NodeResolver::new(&config));
        let env = Arc::new(SandboxEnvironment::new());
        let transformer = Arc::new(SourceTransformer::new());
        let runtime = TestRuntime::new(
            config,
            env.clone() as Arc<dyn spacey_test::TestEnvironment>,
            resolver,
            transformer,
        )
        .expect("construct runtime");

        let project = Project { dir, env, runtime };
        for (rel, wrapper) in self.bodies {
            let path = project.path(&rel);
            project.env.register_module(path, wrapper);
        }
        project
    }
}

impl Project {
    /// Absolute (canonical where possible) path of a project-relative file.
    pub fn path(&self, rel: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        path.canonicalize().unwrap_or(path)
    }

    /// Requires under the full mock policy, from a project-relative path.
    pub fn require_from(&self, from_rel: &str, request: &str) -> spacey_test::Result<Value> {
        self.runtime
            .require_module_or_mock(&self.path(from_rel), request)
    }

    pub fn hooks(&self, from_rel: &str) -> TestHooks {
        self.runtime.create_hooks(&self.path(from_rel))
    }

    pub fn require_surface(&self, from_rel: &str) -> ModuleRequire {
        self.runtime.create_require(&self.path(from_rel))
    }
}
