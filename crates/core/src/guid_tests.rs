// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    db = { GuidKind::Db },
    edt = { GuidKind::Edt },
    template = { GuidKind::EdtTemplate },
    event = { GuidKind::Event },
    affinity = { GuidKind::Affinity },
    worker = { GuidKind::Worker },
)]
fn pack_round_trips_kind(kind: GuidKind) {
    let g = Guid::pack(kind, Location(3), 42);
    assert_eq!(g.kind(), kind);
    assert_eq!(g.home(), Location(3));
    assert_eq!(g.counter(), 42);
}

#[test]
fn null_guid_decodes_as_none() {
    assert!(NULL_GUID.is_null());
    assert_eq!(NULL_GUID.kind(), GuidKind::None);
}

#[test]
fn home_location_survives_max_field_width() {
    let g = Guid::pack(GuidKind::Db, Location(MAX_GUID_LOCATION), 7);
    assert_eq!(g.home().as_u64(), MAX_GUID_LOCATION);
}

#[test]
fn counters_at_distinct_locations_never_collide() {
    let a = Guid::pack(GuidKind::Event, Location(0), 5);
    let b = Guid::pack(GuidKind::Event, Location(1), 5);
    assert_ne!(a, b);
}

#[test]
fn serde_is_transparent() {
    let g = Guid::pack(GuidKind::Edt, Location(2), 99);
    let json = serde_json::to_string(&g).unwrap();
    assert_eq!(json, g.as_u64().to_string());
    let back: Guid = serde_json::from_str(&json).unwrap();
    assert_eq!(back, g);
}
