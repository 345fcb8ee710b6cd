// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-test
//!
//! The module runtime at the core of the Spacey test framework.
//!
//! A [`TestRuntime`] resolves module requests, decides per request whether
//! the real implementation or a mock is delivered, evaluates transformed
//! module code inside a sandboxed environment, and maintains the
//! coexisting module registries (internal, real, isolated, mock) that make
//! circular requires, isolation scopes, and automock containment work at
//! the same time. Evaluated code steers the policy through the injected
//! [`TestHooks`] object.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use spacey_test::{NodeResolver, RuntimeConfig, SandboxEnvironment,
//!     SourceTransformer, TestRuntime};
//! use std::sync::Arc;
//!
//! let config = RuntimeConfig::default();
//! let resolver = Arc::new(NodeResolver::new(&config));
//! let environment = Arc::new(SandboxEnvironment::new());
//! let transformer = Arc::new(SourceTransformer::new());
//! let runtime = TestRuntime::new(config, environment, resolver, transformer)?;
//! let exports = runtime.load_entry_module(test_path.as_path())?;
//! # Ok::<(), spacey_test::TestError>(())
//! ```
//!
//! The collaborators are trait objects: the resolver maps requests to
//! paths, the transformer turns source into executable scripts, and the
//! environment supplies the sandbox global, the script runner, the module
//! mocker, and fake timers. In-process implementations of each ship with
//! the crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod environment;
pub mod error;
pub mod resolve;
pub mod runtime;
pub mod transform;

pub use config::{HasteConfig, RuntimeConfig};
pub use environment::{ModuleScope, ModuleWrapper, SandboxEnvironment, TestEnvironment};
pub use error::{Result, TestError};
pub use resolve::{ModuleId, NodeResolver, Resolver};
pub use runtime::{
    MockFactory, ModuleHandle, ModuleRecord, ModuleRequire, RequireIntent, ResolveOptions,
    Resolution, TestHooks, TestRuntime, DEFAULT_TIMEOUT_FIELD, RETRY_TIMES_GLOBAL,
    SPEC_HARNESS_GLOBAL, TEST_TIMEOUT_GLOBAL,
};
pub use transform::{
    SourceTransformer, TransformResult, TransformedScript, Transformer, EVAL_RESULT_VARIABLE,
};

/// Version of the test-framework runtime.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
