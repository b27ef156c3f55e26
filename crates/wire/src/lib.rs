// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy-message protocol between policy domains.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod body;
mod codec;
mod message;

pub use body::{MessageBody, MetadataOp, NotifyKind, PolicyMessageFrame};
pub use codec::{decode, encode, WireError, FIXED_FRAME_SIZE};
pub use message::{Direction, FnId, MessageHeader, PolicyMessage};
