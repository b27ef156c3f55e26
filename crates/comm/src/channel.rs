// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process channel transport.
//!
//! Every location gets two inbound lanes: a fixed-size fast lane for
//! small frames (standing in for the pre-posted fixed-size receive)
//! and an unbounded variable lane for everything else (the
//! probe-then-receive path). Frames never cross lanes, so per-lane
//! FIFO gives the per-(src, dst, tag) ordering the contract asks for.

use crate::platform::{CommError, CommPlatform, SendMode};
use crossbeam_channel::{unbounded, Receiver, Sender};
use ocr_core::Location;
use ocr_wire::FIXED_FRAME_SIZE;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

struct Inbox {
    fixed_tx: Sender<Vec<u8>>,
    var_tx: Sender<Vec<u8>>,
}

/// Wiring for one run: call [`ChannelHub::new`] with every location,
/// then hand each policy domain its endpoint.
pub struct ChannelHub {
    inboxes: Arc<HashMap<u64, Inbox>>,
    receivers: HashMap<u64, (Receiver<Vec<u8>>, Receiver<Vec<u8>>)>,
}

impl ChannelHub {
    pub fn new(locations: &[Location]) -> Self {
        let mut inboxes = HashMap::new();
        let mut receivers = HashMap::new();
        for loc in locations {
            let (fixed_tx, fixed_rx) = unbounded();
            let (var_tx, var_rx) = unbounded();
            inboxes.insert(loc.as_u64(), Inbox { fixed_tx, var_tx });
            receivers.insert(loc.as_u64(), (fixed_rx, var_rx));
        }
        Self { inboxes: Arc::new(inboxes), receivers }
    }

    /// Detach the endpoint for `me`. Each location's endpoint can be
    /// taken once.
    pub fn endpoint(&mut self, me: Location) -> Option<ChannelEndpoint> {
        let (fixed_rx, var_rx) = self.receivers.remove(&me.as_u64())?;
        Some(ChannelEndpoint { me, inboxes: Arc::clone(&self.inboxes), fixed_rx, var_rx })
    }
}

pub struct ChannelEndpoint {
    me: Location,
    inboxes: Arc<HashMap<u64, Inbox>>,
    fixed_rx: Receiver<Vec<u8>>,
    var_rx: Receiver<Vec<u8>>,
}

impl CommPlatform for ChannelEndpoint {
    fn location(&self) -> Location {
        self.me
    }

    fn send(&self, dest: Location, frame: Vec<u8>, _mode: SendMode) -> Result<(), CommError> {
        let inbox = self.inboxes.get(&dest.as_u64()).ok_or(CommError::UnknownLocation(dest))?;
        let lane =
            if frame.len() <= FIXED_FRAME_SIZE { &inbox.fixed_tx } else { &inbox.var_tx };
        trace!(src = %self.me, dest = %dest, bytes = frame.len(), "transport send");
        lane.send(frame).map_err(|_| CommError::Disconnected(dest))
    }

    fn poll(&self) -> Option<Vec<u8>> {
        self.fixed_rx.try_recv().ok().or_else(|| self.var_rx.try_recv().ok())
    }

    fn sends_drained(&self) -> bool {
        // Channel queues are visible from the sender side; drained
        // means every inbox we can reach is empty. Conservative (it
        // counts other senders' frames) which is fine for a barrier.
        self.inboxes
            .values()
            .all(|inbox| inbox.fixed_tx.is_empty() && inbox.var_tx.is_empty())
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
