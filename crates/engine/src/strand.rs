// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strands: parked continuations for remote calls.
//!
//! A compute worker that needs a remote reply registers a strand keyed
//! by the rendezvous tag and parks on it; the comm worker marks it
//! ready when the matching response lands. Comm workers never park;
//! responses to engine-originated traffic bypass strands and go
//! through the engine's response handlers instead.

use ocr_wire::PolicyMessage;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct StrandState {
    response: Option<PolicyMessage>,
    ready: bool,
}

#[derive(Default)]
pub struct Strand {
    state: Mutex<StrandState>,
    cv: Condvar,
}

impl Strand {
    /// Park until the comm worker marks this strand ready. Only ever
    /// called from a compute worker.
    pub fn wait(&self) -> Option<PolicyMessage> {
        let mut state = self.state.lock();
        while !state.ready {
            self.cv.wait(&mut state);
        }
        state.response.take()
    }

    fn complete(&self, response: Option<PolicyMessage>) {
        let mut state = self.state.lock();
        state.response = response;
        state.ready = true;
        self.cv.notify_all();
    }
}

#[derive(Default)]
pub struct StrandTable {
    pending: Mutex<HashMap<u64, Arc<Strand>>>,
}

impl StrandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the response tagged `msg_id`.
    pub fn register(&self, msg_id: u64) -> Arc<Strand> {
        let strand = Arc::new(Strand::default());
        self.pending.lock().insert(msg_id, Arc::clone(&strand));
        strand
    }

    /// Route a response to its strand. Hands the message back when no
    /// strand is registered for the tag (engine-routed traffic).
    pub fn complete(&self, msg_id: u64, response: PolicyMessage) -> Option<PolicyMessage> {
        match self.pending.lock().remove(&msg_id) {
            Some(strand) => {
                strand.complete(Some(response));
                None
            }
            None => Some(response),
        }
    }

    /// Forget a registration whose call completed synchronously.
    pub fn discard(&self, msg_id: u64) {
        self.pending.lock().remove(&msg_id);
    }

    /// True when a strand is waiting on this tag.
    pub fn is_registered(&self, msg_id: u64) -> bool {
        self.pending.lock().contains_key(&msg_id)
    }

    /// Tear-down: release every parked worker empty-handed.
    pub fn abandon_all(&self) {
        for (_, strand) in self.pending.lock().drain() {
            strand.complete(None);
        }
    }
}

#[cfg(test)]
#[path = "strand_tests.rs"]
mod tests;
