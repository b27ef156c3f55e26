// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ocr_core::{GuidKind, Location};

fn edt(n: u64) -> Guid {
    Guid::pack(GuidKind::Edt, Location(0), n)
}

#[test]
fn owner_pops_lifo() {
    let set = WorkpileSet::new(2);
    set.push(0, edt(1));
    set.push(0, edt(2));
    assert_eq!(set.take(0), Some(edt(2)));
    assert_eq!(set.take(0), Some(edt(1)));
    assert_eq!(set.backlog(), 0);
}

#[test]
fn empty_set_yields_nothing() {
    let set = WorkpileSet::new(3);
    assert_eq!(set.take(1), None);
}

#[test]
fn thief_steals_from_the_head() {
    let set = WorkpileSet::new(2);
    set.push(0, edt(1));
    set.push(0, edt(2));
    // Worker 1 has nothing; it must steal worker 0's oldest entry.
    assert_eq!(set.take(1), Some(edt(1)));
    assert_eq!(set.take(0), Some(edt(2)));
}

#[test]
fn steal_sweep_finds_any_victim() {
    let set = WorkpileSet::new(4);
    set.push(2, edt(9));
    assert_eq!(set.take(0), Some(edt(9)));
}

#[test]
fn out_of_range_worker_still_steals() {
    // The comm worker occasionally drains ready EDTs with an index
    // past the compute piles.
    let set = WorkpileSet::new(1);
    set.push(0, edt(5));
    assert_eq!(set.take(7), Some(edt(5)));
}
