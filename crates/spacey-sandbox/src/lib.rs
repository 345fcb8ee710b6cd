// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-sandbox
//!
//! Sandbox-facing building blocks for the Spacey test framework:
//!
//! - A shared JavaScript value model (`Value`, `JsObject`, `JsArray`,
//!   `JsFunction`) with identity semantics, so module exports cached by the
//!   runtime compare the way `===` does in the sandbox.
//! - A module mocker (`ModuleMocker`) that creates recording mock
//!   functions, spies on object methods, and extracts/synthesizes mock
//!   metadata from real module exports.
//! - A fake-timer facility (`FakeTimers`) driven by a logical clock, for
//!   deterministic timer control from test code.
//!
//! The module runtime (`spacey-test`) consumes these through its
//! environment interface; nothing in this crate knows about module
//! resolution or registries.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod mocker;
pub mod timers;
pub mod value;

pub use mocker::{MockError, MockMetadata, MockState, ModuleMocker};
pub use timers::{FakeTimers, TimerId};
pub use value::{JsArray, JsFunction, JsObject, NativeFn, Value};

/// Version of the sandbox crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
