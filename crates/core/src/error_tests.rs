// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn codes_round_trip() {
    for code in 1..=8u8 {
        let err = RuntimeError::from_code(code).unwrap();
        assert_eq!(err.code(), code);
    }
    assert_eq!(RuntimeError::from_code(0), None);
    assert_eq!(RuntimeError::from_code(200), None);
}

#[test]
fn detail_of_success_is_zero() {
    assert_eq!(detail_of(&Ok(())), 0);
    assert_eq!(detail_of(&Err(RuntimeError::Pending)), RuntimeError::Pending.code());
}
