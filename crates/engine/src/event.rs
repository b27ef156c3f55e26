// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed events.
//!
//! Dependences register first or last, satisfactions carry an optional
//! payload GUID, and every delivery is an [`Action::SatisfyDep`] the
//! policy domain routes to its destination. Event code runs on the
//! event's home domain only; remote callers have their traffic
//! forwarded by dispatch.

use crate::action::Action;
use ocr_core::{
    AccessMode, ChannelParams, CollectiveParams, EventKind, EventParams, Guid, RuntimeError,
    NULL_GUID,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

/// Latch slot taking the counter up.
pub const LATCH_INCR_SLOT: u64 = 0;
/// Latch slot taking the counter down; zero fires the latch.
pub const LATCH_DECR_SLOT: u64 = 1;

#[derive(Debug, Clone, Copy)]
struct Waiter {
    dest: Guid,
    slot: u64,
    mode: AccessMode,
}

struct ChannelState {
    params: ChannelParams,
    /// Satisfactions waiting for a dependence, oldest first.
    sats: VecDeque<(Guid, Option<Vec<u8>>)>,
    /// Dependences waiting for a satisfaction, oldest first.
    deps: VecDeque<Waiter>,
}

struct CollectiveState {
    params: CollectiveParams,
    /// Open generations, oldest first. Indexed relative to
    /// `completed`.
    gens: VecDeque<GenAcc>,
    /// Per-contribution-slot running count, for generation indexing.
    slot_counts: HashMap<u64, u64>,
    completed: u64,
}

struct GenAcc {
    received: u64,
    acc: Vec<u64>,
}

struct EvtInner {
    waiters: Vec<Waiter>,
    satisfied: bool,
    payload: Guid,
    /// Deliveries so far (counted events destroy on a quota).
    delivered: u64,
    latch_count: i64,
    counted_quota: u64,
    channel: Option<ChannelState>,
    collective: Option<CollectiveState>,
}

pub struct RuntimeEvent {
    guid: Guid,
    kind: EventKind,
    inner: Mutex<EvtInner>,
}

impl RuntimeEvent {
    pub fn new(guid: Guid, kind: EventKind, params: &EventParams) -> Result<Arc<Self>, RuntimeError> {
        let mut latch_count = 0;
        let mut counted_quota = 0;
        let mut channel = None;
        let mut collective = None;
        match (kind, params) {
            (EventKind::Once | EventKind::Idem | EventKind::Sticky, EventParams::Plain) => {}
            (EventKind::Latch, EventParams::Latch(p)) => {
                latch_count = p.init_count as i64;
            }
            (EventKind::Latch, EventParams::Plain) => {}
            (EventKind::Counted, EventParams::Counted(p)) => {
                if p.nb_deps == 0 {
                    return Err(RuntimeError::Inval);
                }
                counted_quota = p.nb_deps;
            }
            (EventKind::Channel, EventParams::Channel(p)) => {
                if p.max_gen == 0 || p.nb_sat == 0 || p.nb_deps == 0 {
                    return Err(RuntimeError::Inval);
                }
                channel = Some(ChannelState {
                    params: *p,
                    sats: VecDeque::new(),
                    deps: VecDeque::new(),
                });
            }
            (EventKind::Collective, EventParams::Collective(p)) => {
                if p.max_gen == 0 || p.nb_contribs == 0 || p.nb_datum == 0 {
                    return Err(RuntimeError::Inval);
                }
                collective = Some(CollectiveState {
                    params: *p,
                    gens: VecDeque::new(),
                    slot_counts: HashMap::new(),
                    completed: 0,
                });
            }
            _ => return Err(RuntimeError::Inval),
        }
        Ok(Arc::new(Self {
            guid,
            kind,
            inner: Mutex::new(EvtInner {
                waiters: Vec::new(),
                satisfied: false,
                payload: NULL_GUID,
                delivered: 0,
                latch_count,
                counted_quota,
                channel,
                collective,
            }),
        }))
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Register `dest`'s slot on this event.
    pub fn add_dependence(
        &self,
        dest: Guid,
        slot: u64,
        mode: AccessMode,
    ) -> Result<Vec<Action>, RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        let waiter = Waiter { dest, slot, mode };

        match self.kind {
            EventKind::Once | EventKind::Idem | EventKind::Sticky | EventKind::Counted => {
                if inner.satisfied {
                    let payload = inner.payload;
                    Self::deliver(&mut inner, waiter, payload, None, &mut actions);
                    self.maybe_auto_destroy(&mut inner, &mut actions);
                } else {
                    inner.waiters.push(waiter);
                }
            }
            EventKind::Latch => {
                inner.waiters.push(waiter);
            }
            EventKind::Channel => {
                let Some(ch) = inner.channel.as_mut() else {
                    return Err(RuntimeError::Inval);
                };
                ch.deps.push_back(waiter);
                Self::pair_channel(&mut inner, &mut actions);
            }
            EventKind::Collective => {
                // Consumers persist across generations.
                inner.waiters.push(waiter);
            }
        }
        Ok(actions)
    }

    /// Satisfy one slot. `datum` carries collective contributions,
    /// `eager` an eagerly pushed datablock payload.
    pub fn satisfy(
        &self,
        slot: u64,
        payload: Guid,
        datum: Option<&[u64]>,
        eager: Option<Vec<u8>>,
    ) -> Result<Vec<Action>, RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        trace!(guid = %self.guid, kind = ?self.kind, slot, "satisfy");

        match self.kind {
            EventKind::Once | EventKind::Sticky => {
                if inner.satisfied {
                    return Err(RuntimeError::Perm);
                }
                Self::fire(&mut inner, payload, &mut actions);
                self.maybe_auto_destroy(&mut inner, &mut actions);
            }
            EventKind::Idem => {
                if !inner.satisfied {
                    Self::fire(&mut inner, payload, &mut actions);
                }
            }
            EventKind::Counted => {
                if inner.satisfied {
                    return Err(RuntimeError::Perm);
                }
                Self::fire(&mut inner, payload, &mut actions);
                self.maybe_auto_destroy(&mut inner, &mut actions);
            }
            EventKind::Latch => {
                match slot {
                    LATCH_INCR_SLOT => inner.latch_count += 1,
                    LATCH_DECR_SLOT => inner.latch_count -= 1,
                    _ => return Err(RuntimeError::Inval),
                }
                if inner.latch_count == 0 {
                    Self::fire(&mut inner, payload, &mut actions);
                    actions.push(Action::DestroyGuid(self.guid));
                }
            }
            EventKind::Channel => {
                let Some(ch) = inner.channel.as_mut() else {
                    return Err(RuntimeError::Inval);
                };
                let in_flight = ch.sats.len() as u64;
                if in_flight >= ch.params.max_gen * ch.params.nb_sat {
                    return Err(RuntimeError::Busy);
                }
                ch.sats.push_back((payload, eager));
                Self::pair_channel(&mut inner, &mut actions);
            }
            EventKind::Collective => {
                let datum = datum.ok_or(RuntimeError::Inval)?;
                self.contribute(&mut inner, slot, datum, &mut actions)?;
            }
        }
        Ok(actions)
    }

    /// Explicit destroy; events that auto-destroy answer `Perm` once
    /// they are gone from the registry, upstream of this call.
    pub fn destroy(&self) -> Vec<Action> {
        vec![Action::DestroyGuid(self.guid)]
    }

    fn fire(inner: &mut EvtInner, payload: Guid, actions: &mut Vec<Action>) {
        inner.satisfied = true;
        inner.payload = payload;
        let waiters = std::mem::take(&mut inner.waiters);
        for waiter in waiters {
            Self::deliver(inner, waiter, payload, None, actions);
        }
    }

    fn deliver(
        inner: &mut EvtInner,
        waiter: Waiter,
        payload: Guid,
        eager: Option<Vec<u8>>,
        actions: &mut Vec<Action>,
    ) {
        inner.delivered += 1;
        actions.push(Action::SatisfyDep {
            dest: waiter.dest,
            slot: waiter.slot,
            payload,
            mode: waiter.mode,
            eager,
        });
    }

    /// ONCE dies on satisfaction-and-drain; COUNTED on its quota.
    fn maybe_auto_destroy(&self, inner: &mut EvtInner, actions: &mut Vec<Action>) {
        let done = match self.kind {
            EventKind::Once => inner.satisfied && inner.delivered > 0,
            EventKind::Counted => inner.delivered >= inner.counted_quota,
            _ => false,
        };
        if done {
            actions.push(Action::DestroyGuid(self.guid));
        }
    }

    fn pair_channel(inner: &mut EvtInner, actions: &mut Vec<Action>) {
        loop {
            let Some(ch) = inner.channel.as_mut() else { return };
            if ch.sats.is_empty() || ch.deps.is_empty() {
                return;
            }
            let (payload, eager) = match ch.sats.pop_front() {
                Some(pair) => pair,
                None => return,
            };
            let Some(waiter) = ch.deps.pop_front() else { return };
            Self::deliver(inner, waiter, payload, eager, actions);
        }
    }

    fn contribute(
        &self,
        inner: &mut EvtInner,
        slot: u64,
        datum: &[u64],
        actions: &mut Vec<Action>,
    ) -> Result<(), RuntimeError> {
        let consumers: Vec<(Guid, u64, AccessMode)> =
            inner.waiters.iter().map(|w| (w.dest, w.slot, w.mode)).collect();
        let Some(col) = inner.collective.as_mut() else {
            return Err(RuntimeError::Inval);
        };
        if datum.len() as u64 != col.params.nb_datum {
            return Err(RuntimeError::Inval);
        }
        let count = col.slot_counts.entry(slot).or_insert(0);
        let gen = *count;
        *count += 1;
        if gen < col.completed {
            return Err(RuntimeError::Inval);
        }
        let open = gen - col.completed;
        if open >= col.params.max_gen {
            return Err(RuntimeError::Busy);
        }
        while col.gens.len() as u64 <= open {
            col.gens.push_back(GenAcc {
                received: 0,
                acc: vec![0; col.params.nb_datum as usize],
            });
        }
        let acc = &mut col.gens[open as usize];
        for (sum, v) in acc.acc.iter_mut().zip(datum) {
            *sum = sum.wrapping_add(*v);
        }
        acc.received += 1;

        // Generations complete strictly in order.
        while col.gens.front().map(|g| g.received == col.params.nb_contribs).unwrap_or(false) {
            let Some(done) = col.gens.pop_front() else { break };
            col.completed += 1;
            trace!(guid = %self.guid, generation = col.completed, "collective generation reduced");
            actions.push(Action::CollectiveResult {
                datum: done.acc,
                consumers: consumers.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
