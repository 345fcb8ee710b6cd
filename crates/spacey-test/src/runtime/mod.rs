// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The module runtime: policy, registries, loading, execution, and the
//! caller-facing surfaces.

mod automock;
mod executor;
mod hooks;
mod loader;
mod policy;
mod registry;
mod require;
mod test_runtime;

pub use hooks::{
    TestHooks, DEFAULT_TIMEOUT_FIELD, RETRY_TIMES_GLOBAL, SPEC_HARNESS_GLOBAL,
    TEST_TIMEOUT_GLOBAL,
};
pub use policy::{RequireIntent, Resolution};
pub use registry::{ModuleHandle, ModuleRecord};
pub use require::{ModuleRequire, ResolveOptions};
pub use test_runtime::{MockFactory, TestRuntime};
