// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! EDT placement heuristic.
//!
//! An affinity hint names the destination outright; without one, new
//! work is spread round-robin across the known locations. Placement is
//! advice to dispatch: a remote choice remaps the message destination,
//! nothing more.

use ocr_core::{Guid, HintKey, Hints, Location};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

pub struct Placer {
    locations: Vec<Location>,
    next: AtomicUsize,
}

impl Placer {
    /// `locations` is every PD of the run, in stable order.
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations, next: AtomicUsize::new(0) }
    }

    /// Destination for a new EDT created at `here`.
    pub fn place(&self, here: Location, hints: &Hints) -> Location {
        if let Some(raw) = hints.get(HintKey::EdtAffinity) {
            let target = Guid(raw).home();
            debug!(%here, %target, "placement via affinity hint");
            return target;
        }
        if self.locations.len() <= 1 {
            return here;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.locations.len();
        let target = self.locations[idx];
        debug!(%here, %target, "placement via round-robin");
        target
    }
}

#[cfg(test)]
#[path = "placement_tests.rs"]
mod tests;
