// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ocr-pd: the policy domain.
//!
//! Ties the engine, scheduler and transport together: one dispatch
//! entry point, one comm worker and N compute workers per domain, a
//! runlevel sequencer around the lot, and the user-facing task API.
//! The harness boots a whole run of domains over the in-process
//! channel transport.

pub mod api;
pub mod config;
pub mod functions;
pub mod harness;
pub mod policy;
pub mod runlevel;
pub mod worker;

pub use api::{DepSlot, TaskContext};
pub use config::RuntimeConfig;
pub use functions::{EdtFn, FnRegistry};
pub use harness::Harness;
pub use policy::PolicyDomain;
pub use runlevel::{RlComponent, RunState, RunlevelController};
