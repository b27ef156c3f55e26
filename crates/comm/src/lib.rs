// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ocr-comm: the transport seam between policy domains.
//!
//! A [`CommPlatform`] delivers encoded frames intact and in order per
//! (src, dst) pair without ever inspecting payload semantics. The
//! in-process [`ChannelHub`] binds every domain of a run over crossbeam
//! channels; handle pools track in-flight tickets for the comm worker.

mod channel;
mod platform;
mod pool;

pub use channel::{ChannelEndpoint, ChannelHub};
pub use platform::{CommError, CommPlatform, SendMode};
pub use pool::{HandlePool, Pooled, RecvHandle, SendHandle};
