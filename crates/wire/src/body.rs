// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kind-specific message bodies.
//!
//! The taxonomy is closed: every operation a policy domain can be asked
//! to perform is one variant here. Fields double as request inputs and
//! response outputs; a handler fills the output fields before the
//! envelope is flipped into a response.

use crate::message::FnId;
use ocr_core::{
    AccessMode, EventKind, EventParams, Guid, Hints, Location, RlDirection, Runlevel,
};
use serde::{Deserialize, Serialize};

/// Scheduler notifications posted by workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyKind {
    /// A compute worker finished running an EDT.
    EdtDone,
    /// All dependences of an EDT are satisfied; it is ready to place.
    EdtSatisfied,
}

/// Metadata traffic between a datablock's master and its clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataOp {
    /// Master → new slave: materialize a clone.
    Clone { size: u64, single_assignment: bool, hints: Hints, payload: Vec<u8> },
    /// Slave → master on destroy, then master → every tracked slave.
    Del,
    /// Lazy-write privilege movement, one body for the whole exchange:
    /// requester → master to ask, master → clones to revoke, and the
    /// acknowledgements/grant carry the payload when bytes move.
    Invalidate {
        requester: Location,
        mode: AccessMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageBody {
    // === Events ===
    EvtCreate {
        /// O: the created event.
        guid: Guid,
        kind: EventKind,
        params: EventParams,
    },
    EvtDestroy {
        guid: Guid,
    },
    EvtSatisfy {
        guid: Guid,
        slot: u64,
        /// Payload handle; NULL_GUID for a pure control satisfy.
        payload: Guid,
        /// Collective contributions carry their datum inline.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datum: Option<Vec<u64>>,
        /// Eager push: the DB travels bundled with the satisfy.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eager_payload: Option<Vec<u8>>,
    },

    // === Dependences ===
    DepAdd {
        source: Guid,
        dest: Guid,
        slot: u64,
        mode: AccessMode,
    },
    /// Deliver a satisfaction to one EDT slot.
    DepSatisfy {
        edt: Guid,
        slot: u64,
        payload: Guid,
        mode: AccessMode,
        /// Eager push: the DB travels bundled with the satisfaction.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eager_payload: Option<Vec<u8>>,
    },

    // === Datablocks ===
    DbCreate {
        /// O: the created datablock.
        guid: Guid,
        size: u64,
        single_assignment: bool,
        hints: Hints,
    },
    /// Pull (slave → master, payload empty) and push (master → slave,
    /// payload filled) share this body.
    DbAcquire {
        guid: Guid,
        edt: Guid,
        slot: u64,
        mode: AccessMode,
        /// O on the push: DB contents.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Vec<u8>>,
        /// O on the push: slave must ship contents back on release.
        #[serde(default)]
        write_back: bool,
    },
    DbRelease {
        guid: Guid,
        edt: Guid,
        /// Written-back contents when the acquire demanded it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Vec<u8>>,
    },
    DbDestroy {
        guid: Guid,
    },
    DbGetSize {
        guid: Guid,
        /// O: byte size.
        size: u64,
    },

    // === EDTs ===
    EdtTempCreate {
        /// O: the created template.
        guid: Guid,
        func: FnId,
        paramc: u64,
        depc: u64,
    },
    EdtTempDestroy {
        guid: Guid,
    },
    WorkCreate {
        /// O: the created EDT.
        guid: Guid,
        template: Guid,
        /// Template metadata rides along so a placed EDT needs no
        /// template round-trip at the destination.
        func: FnId,
        paramc: u64,
        depc: u64,
        paramv: Vec<u64>,
        /// Pre-wired dependences; slots left NULL are added later.
        depv: Option<Vec<Guid>>,
        hints: Hints,
        /// Request an output event.
        output_event: bool,
        /// O: the output event when requested.
        out_event: Guid,
        /// Open a finish scope around this EDT.
        finish: bool,
        /// Finish-scope latch of the creating EDT, if any.
        parent_latch: Guid,
    },
    WorkDestroy {
        guid: Guid,
    },

    // === GUID management ===
    GuidCreate {
        /// O: the minted handle.
        guid: Guid,
        kind: ocr_core::GuidKind,
    },
    GuidReserve {
        count: u64,
        kind: ocr_core::GuidKind,
        /// O: first handle of the reserved range.
        start: Guid,
    },
    GuidDestroy {
        guid: Guid,
    },

    // === Memory ===
    MemAlloc {
        size: u64,
    },
    MemUnalloc {
        size: u64,
    },

    // === Datablock metadata ===
    MetadataComm {
        guid: Guid,
        op: MetadataOp,
    },

    // === Scheduler ===
    /// Park an outbound envelope on the comm queue.
    CommGive {
        handle: Option<Box<PolicyMessageFrame>>,
    },
    /// Comm worker pulls one outbound envelope per iteration.
    CommTake {
        /// O: next parked envelope, if any.
        handle: Option<Box<PolicyMessageFrame>>,
    },
    SchedGetWork {
        /// Asking compute worker's index.
        worker: u64,
        /// O: an EDT to run, or NULL_GUID.
        edt: Guid,
    },
    SchedNotify {
        kind: NotifyKind,
        edt: Guid,
        /// EDT_DONE: the handle the function returned, chained into
        /// the output event.
        payload: Guid,
    },

    // === Management ===
    MgtRlNotify {
        runlevel: Runlevel,
        phase: u64,
        direction: RlDirection,
        /// Exit code riding the tear-down notification.
        error_code: u64,
    },
}

/// An encoded envelope carried inside CommGive/CommTake. Keeping the
/// frame opaque avoids a recursive body type on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyMessageFrame {
    pub dest: Location,
    pub msg_id: u64,
    pub want_response: bool,
    pub frame: Vec<u8>,
}

impl MessageBody {
    /// Stable operation name for logs.
    pub fn op_name(&self) -> &'static str {
        match self {
            MessageBody::EvtCreate { .. } => "evt_create",
            MessageBody::EvtDestroy { .. } => "evt_destroy",
            MessageBody::EvtSatisfy { .. } => "evt_satisfy",
            MessageBody::DepAdd { .. } => "dep_add",
            MessageBody::DepSatisfy { .. } => "dep_satisfy",
            MessageBody::DbCreate { .. } => "db_create",
            MessageBody::DbAcquire { .. } => "db_acquire",
            MessageBody::DbRelease { .. } => "db_release",
            MessageBody::DbDestroy { .. } => "db_destroy",
            MessageBody::DbGetSize { .. } => "db_get_size",
            MessageBody::EdtTempCreate { .. } => "edttemp_create",
            MessageBody::EdtTempDestroy { .. } => "edttemp_destroy",
            MessageBody::WorkCreate { .. } => "work_create",
            MessageBody::WorkDestroy { .. } => "work_destroy",
            MessageBody::GuidCreate { .. } => "guid_create",
            MessageBody::GuidReserve { .. } => "guid_reserve",
            MessageBody::GuidDestroy { .. } => "guid_destroy",
            MessageBody::MemAlloc { .. } => "mem_alloc",
            MessageBody::MemUnalloc { .. } => "mem_unalloc",
            MessageBody::MetadataComm { .. } => "metadata_comm",
            MessageBody::CommGive { .. } => "comm_give",
            MessageBody::CommTake { .. } => "comm_take",
            MessageBody::SchedGetWork { .. } => "sched_get_work",
            MessageBody::SchedNotify { .. } => "sched_notify",
            MessageBody::MgtRlNotify { .. } => "mgt_rl_notify",
        }
    }
}
