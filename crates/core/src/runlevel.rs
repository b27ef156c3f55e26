// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runlevel vocabulary.
//!
//! A policy domain climbs the ordered levels on bring-up and walks them
//! back down on tear-down. Components acknowledge each phase before the
//! domain advances.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Runlevel {
    ConfigParse = 0,
    NetworkOk = 1,
    PdOk = 2,
    MemoryOk = 3,
    GuidOk = 4,
    ComputeOk = 5,
    UserOk = 6,
}

impl Runlevel {
    pub const ALL: [Runlevel; 7] = [
        Runlevel::ConfigParse,
        Runlevel::NetworkOk,
        Runlevel::PdOk,
        Runlevel::MemoryOk,
        Runlevel::GuidOk,
        Runlevel::ComputeOk,
        Runlevel::UserOk,
    ];

    pub fn next_up(&self) -> Option<Runlevel> {
        let idx = *self as usize;
        Runlevel::ALL.get(idx + 1).copied()
    }

    pub fn next_down(&self) -> Option<Runlevel> {
        let idx = *self as usize;
        idx.checked_sub(1).map(|i| Runlevel::ALL[i])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RlDirection {
    BringUp,
    TearDown,
}

/// Tear-down phases inside USER_OK. Compute quiesces before comm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserPhase {
    Run = 0,
    CompQuiesce = 1,
    CommQuiesce = 2,
    Done = 3,
}

#[cfg(test)]
#[path = "runlevel_tests.rs"]
mod tests;
