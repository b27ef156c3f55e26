// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Globally unique handles.
//!
//! A GUID is a packed 64-bit value: a kind tag, the home location the
//! entity was minted at, and a per-location counter. GUIDs are never
//! reused within a run; the counter is only ever incremented.

use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

const KIND_BITS: u32 = 6;
const LOC_BITS: u32 = 10;
const COUNTER_BITS: u32 = 64 - KIND_BITS - LOC_BITS;

const KIND_SHIFT: u32 = 64 - KIND_BITS;
const LOC_SHIFT: u32 = COUNTER_BITS;

const LOC_MASK: u64 = (1 << LOC_BITS) - 1;
const COUNTER_MASK: u64 = (1 << COUNTER_BITS) - 1;

/// Largest location id representable inside a GUID.
pub const MAX_GUID_LOCATION: u64 = LOC_MASK;

/// The null handle. Kind decodes to [`GuidKind::None`].
pub const NULL_GUID: Guid = Guid(0);

/// Kind tag carried in the top bits of every GUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuidKind {
    None = 0,
    Db = 1,
    Edt = 2,
    EdtTemplate = 3,
    Event = 4,
    Affinity = 5,
    Worker = 6,
    Unknown = 7,
}

impl GuidKind {
    fn from_bits(bits: u64) -> GuidKind {
        match bits {
            0 => GuidKind::None,
            1 => GuidKind::Db,
            2 => GuidKind::Edt,
            3 => GuidKind::EdtTemplate,
            4 => GuidKind::Event,
            5 => GuidKind::Affinity,
            6 => GuidKind::Worker,
            _ => GuidKind::Unknown,
        }
    }
}

/// Opaque 64-bit runtime handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(pub u64);

impl Guid {
    /// Pack a new GUID. `counter` is truncated to its field width; the
    /// provider is responsible for never letting it wrap within a run.
    pub fn pack(kind: GuidKind, home: Location, counter: u64) -> Guid {
        let bits = ((kind as u64) << KIND_SHIFT)
            | ((home.as_u64() & LOC_MASK) << LOC_SHIFT)
            | (counter & COUNTER_MASK);
        Guid(bits)
    }

    pub fn kind(&self) -> GuidKind {
        GuidKind::from_bits(self.0 >> KIND_SHIFT)
    }

    /// Location of the policy domain owning the canonical metadata.
    pub fn home(&self) -> Location {
        Location((self.0 >> LOC_SHIFT) & LOC_MASK)
    }

    pub fn counter(&self) -> u64 {
        self.0 & COUNTER_MASK
    }

    pub fn is_null(&self) -> bool {
        *self == NULL_GUID
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Guid(null)")
        } else {
            write!(f, "Guid({:?}@{}#{})", self.kind(), self.home().as_u64(), self.counter())
        }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
#[path = "guid_tests.rs"]
mod tests;
