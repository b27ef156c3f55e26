// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy-domain locations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer identity of a policy domain.
///
/// One per island of execution; encoded into every GUID minted there and
/// into every message envelope as source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(pub u64);

/// Sentinel for "no location" (unowned master metadata, unset peers).
pub const INVALID_LOCATION: Location = Location(u64::MAX);

impl Location {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != INVALID_LOCATION
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "PD{}", self.0)
        } else {
            write!(f, "PD-invalid")
        }
    }
}

impl From<u64> for Location {
    fn from(raw: u64) -> Self {
        Location(raw)
    }
}
