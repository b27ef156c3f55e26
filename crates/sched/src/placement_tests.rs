// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ocr_core::GuidKind;

fn affinity_hint(loc: Location) -> Hints {
    let mut hints = Hints::new();
    let aff = Guid::pack(GuidKind::Affinity, loc, 0);
    hints.set(HintKey::EdtAffinity, aff.as_u64());
    hints
}

#[test]
fn affinity_hint_wins() {
    let placer = Placer::new(vec![Location(0), Location(1), Location(2)]);
    let target = placer.place(Location(0), &affinity_hint(Location(2)));
    assert_eq!(target, Location(2));
}

#[test]
fn round_robin_covers_all_locations() {
    let placer = Placer::new(vec![Location(0), Location(1), Location(2)]);
    let none = Hints::new();
    let mut seen = std::collections::HashSet::new();
    for _ in 0..3 {
        seen.insert(placer.place(Location(0), &none));
    }
    assert_eq!(seen.len(), 3);
}

#[test]
fn single_location_stays_home() {
    let placer = Placer::new(vec![Location(0)]);
    assert_eq!(placer.place(Location(0), &Hints::new()), Location(0));
}
