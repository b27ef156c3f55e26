// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datablock access modes and coherence states.

use serde::{Deserialize, Serialize};

/// Access mode requested on a dependence slot or acquire.
///
/// `Const` promises no concurrent writer anywhere; `Rw` is a write that
/// tolerates co-located readers; `Ew` is exclusive. `Null` marks a pure
/// control dependence carrying no datablock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    Ro,
    Const,
    Rw,
    Ew,
    Null,
}

impl AccessMode {
    pub fn is_write(&self) -> bool {
        matches!(self, AccessMode::Rw | AccessMode::Ew)
    }

    pub fn is_read(&self) -> bool {
        matches!(self, AccessMode::Ro | AccessMode::Const)
    }

    /// Queue index for the per-mode wait queues. Drain priority when a
    /// writer may be scheduled is RW > EW > CONST > RO.
    pub fn queue_index(&self) -> Option<usize> {
        match self {
            AccessMode::Rw => Some(0),
            AccessMode::Ew => Some(1),
            AccessMode::Const => Some(2),
            AccessMode::Ro => Some(3),
            AccessMode::Null => None,
        }
    }

    /// The four queued modes in writer-priority drain order.
    pub const QUEUED: [AccessMode; 4] =
        [AccessMode::Rw, AccessMode::Ew, AccessMode::Const, AccessMode::Ro];
}

/// Coherence state of one metadata instance of a datablock.
///
/// `Prime` holds full privileges in the current mode. `Shared` means
/// readers coexist across locations. `Idle` is a slave without
/// privileges (and a master that surrendered them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbState {
    Idle,
    Shared,
    Prime,
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
