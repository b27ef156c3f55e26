// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grant rules of the coherence machine.
//!
//! Pure decisions over (state, current mode, requested mode); the
//! queueing, fetching and messaging around a `Defer` live in the
//! datablock itself. Local rules apply to acquires made on this
//! metadata instance; remote rules apply only on the master when a
//! peer asks.

use ocr_core::{AccessMode, DbState};

/// Outcome of an acquire attempt. A grant may retune the instance's
/// current mode and, for remote grants, its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Grant { mode: AccessMode, state: DbState },
    Defer,
}

/// Acquire by an EDT running on this instance's policy domain.
pub fn local_acquire(state: DbState, mode: AccessMode, requested: AccessMode) -> Decision {
    match state {
        DbState::Prime => local_acquire_prime(mode, requested),
        DbState::Shared => local_acquire_shared(mode, requested),
        // Privileges absent: always queue (the caller issues the pull).
        DbState::Idle => Decision::Defer,
    }
}

fn local_acquire_prime(mode: AccessMode, requested: AccessMode) -> Decision {
    if mode == AccessMode::Ro {
        // An idle prime instance transitions to whatever is asked.
        return Decision::Grant { mode: requested, state: DbState::Prime };
    }
    if mode == AccessMode::Const && requested.is_read() {
        return Decision::Grant { mode, state: DbState::Prime };
    }
    if mode == AccessMode::Rw && matches!(requested, AccessMode::Rw | AccessMode::Ro) {
        return Decision::Grant { mode, state: DbState::Prime };
    }
    Decision::Defer
}

fn local_acquire_shared(mode: AccessMode, requested: AccessMode) -> Decision {
    if requested.is_write() {
        // Writers are granted from prime only.
        return Decision::Defer;
    }
    if mode == AccessMode::Ro && requested == AccessMode::Const {
        return Decision::Grant { mode: AccessMode::Const, state: DbState::Shared };
    }
    Decision::Grant { mode, state: DbState::Shared }
}

/// Acquire requested by a peer policy domain; runs on the master only.
pub fn remote_acquire(state: DbState, mode: AccessMode, requested: AccessMode) -> Decision {
    match state {
        DbState::Prime => remote_acquire_prime(mode, requested),
        DbState::Shared => remote_acquire_shared(mode, requested),
        // A slave never receives remote acquires; an idle master has
        // surrendered privileges and must queue behind the holder.
        DbState::Idle => Decision::Defer,
    }
}

fn remote_acquire_prime(mode: AccessMode, requested: AccessMode) -> Decision {
    if mode == AccessMode::Ro {
        // RO promises nothing, so the user count is irrelevant here.
        return Decision::Grant { mode: requested, state: DbState::Shared };
    }
    if mode == AccessMode::Const && requested.is_read() {
        return Decision::Grant { mode, state: DbState::Shared };
    }
    Decision::Defer
}

fn remote_acquire_shared(mode: AccessMode, requested: AccessMode) -> Decision {
    if mode.is_write() || requested.is_write() {
        return Decision::Defer;
    }
    if mode == AccessMode::Ro && requested == AccessMode::Const {
        return Decision::Grant { mode: AccessMode::Const, state: DbState::Shared };
    }
    Decision::Grant { mode, state: DbState::Shared }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
