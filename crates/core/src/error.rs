// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime status taxonomy.
//!
//! Success is `Ok(())`; everything else is a small closed set of codes.
//! `Pending` is load-bearing: a handler that returns it has taken
//! ownership of the message, and the caller must neither free it nor
//! expect a synchronous response.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RuntimeError {
    /// Disallowed operation (double destroy, write after single assignment).
    #[error("operation not permitted")]
    Perm,

    /// Malformed arguments.
    #[error("invalid argument")]
    Inval,

    /// Acquire mode forbidden by an existing acquire.
    #[error("access mode conflict")]
    Access,

    /// Labeled GUID collision; the caller adapts.
    #[error("guid already exists")]
    GuidExists,

    /// Acquire deferred; the caller must wait on an event.
    #[error("resource busy")]
    Busy,

    /// Handler deferred; the response arrives asynchronously via a strand.
    /// The message now belongs to the handler.
    #[error("operation pending")]
    Pending,

    /// Heuristic had no effect.
    #[error("no effect")]
    Nop,

    /// Resiliency fault intercepted (advisory; nothing raises it here).
    #[error("fault intercepted")]
    Fault,
}

impl RuntimeError {
    /// Wire representation used in `return_detail`.
    pub fn code(&self) -> u8 {
        match self {
            RuntimeError::Perm => 1,
            RuntimeError::Inval => 2,
            RuntimeError::Access => 3,
            RuntimeError::GuidExists => 4,
            RuntimeError::Busy => 5,
            RuntimeError::Pending => 6,
            RuntimeError::Nop => 7,
            RuntimeError::Fault => 8,
        }
    }

    /// Decode a `return_detail` byte. Zero is success.
    pub fn from_code(code: u8) -> Option<RuntimeError> {
        match code {
            1 => Some(RuntimeError::Perm),
            2 => Some(RuntimeError::Inval),
            3 => Some(RuntimeError::Access),
            4 => Some(RuntimeError::GuidExists),
            5 => Some(RuntimeError::Busy),
            6 => Some(RuntimeError::Pending),
            7 => Some(RuntimeError::Nop),
            8 => Some(RuntimeError::Fault),
            _ => None,
        }
    }
}

/// Fold a `Result` into the wire byte.
pub fn detail_of(res: &Result<(), RuntimeError>) -> u8 {
    match res {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
