// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sparse hint maps carried in EDT and DB metadata.
//!
//! A hint is advisory: the runtime may honor or ignore it. The map is
//! sparse (key → u64) and serialises as written, so hints survive a
//! marshal round-trip without densifying.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HintKey {
    /// Placement affinity: value is an affinity GUID's raw bits.
    EdtAffinity,
    /// Producer pushes the DB with the satisfy; reader modes only.
    DbEager,
    /// Slave clones linger at zero users until invalidated.
    DbLazy,
    /// Advisory slot for user-side accounting.
    EdtStatsSlot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hints {
    entries: IndexMap<HintKey, u64>,
}

impl Hints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: HintKey, value: u64) -> &mut Self {
        self.entries.insert(key, value);
        self
    }

    pub fn get(&self, key: HintKey) -> Option<u64> {
        self.entries.get(&key).copied()
    }

    pub fn is_set(&self, key: HintKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "hint_tests.rs"]
mod tests;
