// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Comm-platform contract.

use ocr_core::Location;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommError {
    #[error("no route to {0}")]
    UnknownLocation(Location),

    /// The peer tore down its endpoint. Messages destined for a
    /// dismantled domain may be dropped during tear-down.
    #[error("peer {0} disconnected")]
    Disconnected(Location),
}

/// How long the platform may hold the caller's buffer.
///
/// `Persistent` lets the platform keep the frame until completion;
/// `Transient` obliges it to copy before returning. Frames here are
/// owned byte vectors, so both modes hand ownership over; the
/// distinction matters to transports that alias caller memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    Persistent,
    Transient,
}

/// One policy domain's binding to the external transport.
///
/// Contract: frames are delivered intact; order between a (src, dst)
/// pair is preserved per lane; nothing is guaranteed across lanes. The
/// platform never looks inside a frame; rendezvous matching by
/// `msg_id` is the comm worker's business.
pub trait CommPlatform: Send + Sync {
    fn location(&self) -> Location;

    /// Non-blocking send of one encoded frame.
    fn send(&self, dest: Location, frame: Vec<u8>, mode: SendMode) -> Result<(), CommError>;

    /// Poll for one incoming frame. Checks the fixed-size fast lane
    /// first (pre-posted receive), then the variable lane
    /// (probe-for-size path). Never blocks.
    fn poll(&self) -> Option<Vec<u8>>;

    /// True when no frame this endpoint sent is still in flight.
    fn sends_drained(&self) -> bool;
}
