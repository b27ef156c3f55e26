// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred effects of engine operations.
//!
//! Handlers compute state transitions under a lock and hand the
//! resulting traffic back as actions; the policy domain executes them
//! lock-free, looping until no action produces further actions.

use ocr_core::{AccessMode, Guid, Location, RuntimeError};
use ocr_wire::MessageBody;

#[derive(Debug, PartialEq)]
pub enum Action {
    /// Queue an outbound request. `want_response` responses come back
    /// through the engine's response handlers (or a strand when a
    /// worker is parked on the call).
    Send { dest: Location, body: MessageBody, want_response: bool },

    /// Answer a previously deferred request: the stored rendezvous tag
    /// pairs it with the requester's envelope.
    Respond { dest: Location, msg_id: u64, body: MessageBody, status: Result<(), RuntimeError> },

    /// Deliver a satisfaction to a dependence slot. The destination may
    /// be an EDT or a chained event, local or remote; dispatch routes
    /// by the GUID's kind and home. `mode` is the access the slot was
    /// registered with; `eager` bundles a pushed datablock payload.
    SatisfyDep { dest: Guid, slot: u64, payload: Guid, mode: AccessMode, eager: Option<Vec<u8>> },

    /// All dependences of an EDT are satisfied; acquire this slot's
    /// datablock on its behalf.
    AcquireSlot { db: Guid, edt: Guid, slot: u64, mode: AccessMode },

    /// A deferred acquire was granted; clear the EDT's pending count.
    AcquireGranted { edt: Guid, slot: u64, db: Guid },

    /// Hand a ready EDT to the workpiles.
    EdtReady(Guid),

    /// A collective generation completed: wrap the reduced datum in a
    /// fresh datablock and satisfy every registered consumer with it.
    CollectiveResult { datum: Vec<u64>, consumers: Vec<(Guid, u64, AccessMode)> },

    /// Drop a registry entry whose metadata reached end of life.
    DestroyGuid(Guid),
}
