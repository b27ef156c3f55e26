// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed datablock coherence.
//!
//! Every metadata instance carries one lock; all transitions happen
//! under it and messaging happens after it drops, via returned
//! [`Action`]s. The master instance lives on the GUID's home domain;
//! every other domain holding a clone is a slave whose `md_peers`
//! points home.
//!
//! Write-privilege movement:
//! - non-lazy: a slave surrenders privileges at zero users (release
//!   back to the master), so writers pull through the master's queues.
//! - lazy: clones linger; a writer routes an invalidate through the
//!   master, which collects every other clone before forwarding
//!   ownership. At most one hot copy holds write privileges.
//! - eager: the producer pushes payload bundled with the satisfy;
//!   consumers never pull and never release back.

mod state;

pub use state::{local_acquire, remote_acquire, Decision};

use crate::action::Action;
use ocr_core::{
    AccessMode, DbState, Guid, HintKey, Hints, Location, RuntimeError, INVALID_LOCATION,
    NULL_GUID,
};
use ocr_wire::{MessageBody, MetadataOp};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Outcome of a local acquire.
#[derive(Debug)]
pub enum LocalAcquire {
    Granted { data: Arc<RwLock<Vec<u8>>> },
    Deferred,
}

/// Outcome of a master-side operation on behalf of a peer.
pub enum RemoteOutcome {
    /// Answer now; dispatch flips the request into a response.
    Done { payload: Option<Vec<u8>>, write_back: bool },
    /// Queued; the answer goes out later as a stored-tag response.
    Queued,
}

struct LocalWaiter {
    edt: Guid,
    slot: u64,
    mode: AccessMode,
}

struct RemoteWaiter {
    requester: Location,
    msg_id: u64,
    edt: Guid,
    slot: u64,
    mode: AccessMode,
}

struct DbInner {
    state: DbState,
    mode: AccessMode,
    has_peers: bool,
    md_peers: Location,
    write_back: bool,
    is_fetching: bool,
    is_releasing: bool,
    is_eager: bool,
    is_lazy: bool,
    single_assignment: bool,
    assigned: bool,
    free_requested: bool,
    num_users: u64,
    size: u64,
    has_payload: bool,
    payload: Arc<RwLock<Vec<u8>>>,
    local_queues: [VecDeque<LocalWaiter>; 4],
    remote_queues: [VecDeque<RemoteWaiter>; 4],
    /// Master: bitmap of locations holding clones.
    clone_locs: u64,
    /// Master, lazy: clone currently holding write privileges.
    hot: Option<Location>,
    /// Master: outstanding destroy acknowledgements.
    del_acks_pending: u64,
    /// Slave: deferred destroy broadcast (source, tag) awaiting drain.
    pending_del: Option<(Location, u64)>,
    /// Deferred invalidate (source, tag, mode) refused while users
    /// were live.
    pending_invalidate: Option<(Location, u64, AccessMode)>,
    /// Master: outstanding invalidate acknowledgements.
    invalidate_acks_pending: u64,
    /// Master: requester to hand ownership to once invalidates drain.
    forward_to: Option<(Location, u64, AccessMode)>,
    /// Slave: grant that raced ahead of the clone payload.
    pending_grant: Option<(AccessMode, bool)>,
}

pub struct DataBlock {
    guid: Guid,
    inner: Mutex<DbInner>,
}

fn loc_bit(loc: Location) -> u64 {
    1u64.checked_shl(loc.as_u64() as u32).unwrap_or(0)
}

impl DataBlock {
    /// Master instance, created on the GUID's home domain. Born prime
    /// with a zeroed payload; the creator acquires separately.
    pub fn master(guid: Guid, size: u64, single_assignment: bool, hints: &Hints) -> Arc<Self> {
        Arc::new(Self {
            guid,
            inner: Mutex::new(DbInner {
                state: DbState::Prime,
                mode: AccessMode::Ro,
                has_peers: false,
                md_peers: INVALID_LOCATION,
                write_back: false,
                is_fetching: false,
                is_releasing: false,
                is_eager: hints.is_set(HintKey::DbEager),
                is_lazy: hints.is_set(HintKey::DbLazy),
                single_assignment,
                assigned: false,
                free_requested: false,
                num_users: 0,
                size,
                has_payload: true,
                payload: Arc::new(RwLock::new(vec![0; size as usize])),
                local_queues: Default::default(),
                remote_queues: Default::default(),
                clone_locs: 0,
                hot: None,
                del_acks_pending: 0,
                pending_del: None,
                pending_invalidate: None,
                invalidate_acks_pending: 0,
                forward_to: None,
                pending_grant: None,
            }),
        })
    }

    /// Slave shell for a remotely homed GUID; idle until a clone or a
    /// grant fills it.
    pub fn shell(guid: Guid, home: Location) -> Arc<Self> {
        Arc::new(Self {
            guid,
            inner: Mutex::new(DbInner {
                state: DbState::Idle,
                mode: AccessMode::Ro,
                has_peers: true,
                md_peers: home,
                write_back: false,
                is_fetching: false,
                is_releasing: false,
                is_eager: false,
                is_lazy: false,
                single_assignment: false,
                assigned: false,
                free_requested: false,
                num_users: 0,
                size: 0,
                has_payload: false,
                payload: Arc::new(RwLock::new(Vec::new())),
                local_queues: Default::default(),
                remote_queues: Default::default(),
                clone_locs: 0,
                hot: None,
                del_acks_pending: 0,
                pending_del: None,
                pending_invalidate: None,
                invalidate_acks_pending: 0,
                forward_to: None,
                pending_grant: None,
            }),
        })
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn size(&self) -> Option<u64> {
        let inner = self.inner.lock();
        inner.has_payload.then_some(inner.size)
    }

    pub fn is_eager(&self) -> bool {
        self.inner.lock().is_eager
    }

    /// Shared handle to the backing bytes.
    pub fn payload_arc(&self) -> Arc<RwLock<Vec<u8>>> {
        Arc::clone(&self.inner.lock().payload)
    }

    /// Snapshot of the current contents, for pushes and write-backs.
    fn payload_bytes(inner: &DbInner) -> Vec<u8> {
        inner.payload.read().clone()
    }

    // === Local side ===

    /// Acquire on behalf of a local EDT dependence slot.
    pub fn acquire_local(
        &self,
        edt: Guid,
        slot: u64,
        mode: AccessMode,
    ) -> Result<(LocalAcquire, Vec<Action>), RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();

        if inner.free_requested {
            return Err(RuntimeError::Perm);
        }
        if mode.is_write() {
            if inner.is_eager {
                // Eager clones are pushed, never coherent for writing.
                return Err(RuntimeError::Perm);
            }
            if inner.single_assignment && inner.assigned {
                return Err(RuntimeError::Perm);
            }
        }

        if inner.is_fetching || inner.is_releasing {
            Self::enqueue_local(&mut inner, edt, slot, mode);
            return Ok((LocalAcquire::Deferred, actions));
        }

        // Lazy clone asking for privileges it lacks: route an
        // invalidate through the master instead of a plain pull.
        if inner.has_peers
            && inner.is_lazy
            && mode.is_write()
            && inner.state == DbState::Shared
        {
            Self::enqueue_local(&mut inner, edt, slot, mode);
            inner.is_fetching = true;
            actions.push(Action::Send {
                dest: inner.md_peers,
                body: MessageBody::MetadataComm {
                    guid: self.guid,
                    op: MetadataOp::Invalidate { requester: INVALID_LOCATION, mode, payload: None },
                },
                want_response: true,
            });
            return Ok((LocalAcquire::Deferred, actions));
        }

        match local_acquire(inner.state, inner.mode, mode) {
            Decision::Grant { mode: new_mode, state } => {
                inner.state = state;
                inner.mode = new_mode;
                inner.num_users += 1;
                if mode.is_write() && inner.single_assignment {
                    inner.assigned = true;
                }
                trace!(guid = %self.guid, ?mode, users = inner.num_users, "local acquire granted");
                Ok((LocalAcquire::Granted { data: Arc::clone(&inner.payload) }, actions))
            }
            Decision::Defer => {
                Self::enqueue_local(&mut inner, edt, slot, mode);
                if inner.state == DbState::Idle && inner.has_peers && !inner.is_fetching {
                    if inner.is_eager {
                        // The payload arrives with the satisfy; just wait.
                        return Ok((LocalAcquire::Deferred, actions));
                    }
                    inner.is_fetching = true;
                    actions.push(Action::Send {
                        dest: inner.md_peers,
                        body: MessageBody::DbAcquire {
                            guid: self.guid,
                            edt,
                            slot,
                            mode,
                            payload: None,
                            write_back: false,
                        },
                        want_response: true,
                    });
                } else if inner.state == DbState::Idle && !inner.has_peers {
                    // Master surrendered to a lazy writer; call the
                    // privileges back in.
                    Self::master_reclaim(self.guid, &mut inner, &mut actions);
                }
                Ok((LocalAcquire::Deferred, actions))
            }
        }
    }

    /// Release by a local EDT. The last user out triggers the pending
    /// drain and, on a non-lazy slave, the release back home.
    pub fn release_local(&self) -> Result<Vec<Action>, RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();

        inner.num_users = inner.num_users.checked_sub(1).ok_or(RuntimeError::Inval)?;
        if inner.num_users > 0 {
            return Ok(actions);
        }

        if inner.has_peers {
            // Slave.
            inner.mode = AccessMode::Ro;
            if inner.free_requested {
                // Destroy already in flight: deallocate quietly, no
                // release traffic home.
                Self::finish_slave_del(self.guid, &mut inner, &mut actions);
                return Ok(actions);
            }
            let scheduled = Self::drain_local(self.guid, &mut inner, &mut actions);
            if !scheduled && !inner.is_eager {
                if let Some((src, msg_id, _)) = inner.pending_invalidate.take() {
                    Self::apply_invalidate(self.guid, &mut inner, src, msg_id, &mut actions);
                } else if !inner.is_lazy {
                    inner.state = DbState::Idle;
                    inner.is_releasing = true;
                    let payload =
                        inner.write_back.then(|| Self::payload_bytes(&inner));
                    inner.write_back = false;
                    actions.push(Action::Send {
                        dest: inner.md_peers,
                        body: MessageBody::DbRelease {
                            guid: self.guid,
                            edt: NULL_GUID,
                            payload,
                        },
                        want_response: true,
                    });
                }
            }
        } else {
            // Master: the counter covers local and peer users alike.
            if let Some((src, msg_id, mode)) = inner.pending_invalidate.take() {
                Self::start_invalidate(self.guid, &mut inner, src, msg_id, mode, &mut actions);
            } else {
                inner.state = DbState::Prime;
                inner.mode = AccessMode::Ro;
                let granted_local = Self::drain_local(self.guid, &mut inner, &mut actions);
                if !granted_local {
                    Self::drain_remote(self.guid, &mut inner, &mut actions);
                }
            }
            Self::finish_master_del(self.guid, &mut inner, &mut actions);
        }
        Ok(actions)
    }

    /// Destroy initiated on this domain.
    pub fn destroy(&self) -> Result<Vec<Action>, RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();

        if inner.free_requested {
            return Err(RuntimeError::Perm);
        }
        inner.free_requested = true;

        if inner.has_peers {
            // Slave: tell the master, free the clone when users drain.
            actions.push(Action::Send {
                dest: inner.md_peers,
                body: MessageBody::MetadataComm { guid: self.guid, op: MetadataOp::Del },
                want_response: false,
            });
            if inner.num_users == 0 {
                actions.push(Action::DestroyGuid(self.guid));
            }
        } else {
            Self::broadcast_del(self.guid, &mut inner, None, &mut actions);
            Self::finish_master_del(self.guid, &mut inner, &mut actions);
        }
        Ok(actions)
    }

    // === Master side, peer-driven ===

    /// M_ACQUIRE pull arriving at the master.
    pub fn remote_acquire_msg(
        &self,
        requester: Location,
        msg_id: u64,
        edt: Guid,
        slot: u64,
        mode: AccessMode,
    ) -> Result<(RemoteOutcome, Vec<Action>), RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();

        if inner.free_requested {
            return Err(RuntimeError::Perm);
        }
        if mode.is_write() && inner.single_assignment && inner.assigned {
            return Err(RuntimeError::Perm);
        }
        if inner.forward_to.is_some() {
            // Ownership is mid-flight to a lazy writer; queue behind it.
            Self::enqueue_remote(&mut inner, requester, msg_id, edt, slot, mode);
            return Ok((RemoteOutcome::Queued, actions));
        }

        match remote_acquire(inner.state, inner.mode, mode) {
            Decision::Grant { mode: new_mode, state } => {
                let first_contact = inner.clone_locs & loc_bit(requester) == 0;
                inner.state = state;
                inner.mode = new_mode;
                inner.num_users += 1;
                if mode.is_write() && inner.single_assignment {
                    inner.assigned = true;
                }
                inner.clone_locs |= loc_bit(requester);
                if inner.is_lazy && mode.is_write() {
                    inner.hot = Some(requester);
                }
                let write_back = mode.is_write() && !inner.single_assignment;
                debug!(guid = %self.guid, %requester, ?mode, first_contact, "remote acquire granted");
                if first_contact {
                    // Clone materializes the slave; the grant itself
                    // travels payload-free right behind it.
                    actions.push(Action::Send {
                        dest: requester,
                        body: MessageBody::MetadataComm {
                            guid: self.guid,
                            op: MetadataOp::Clone {
                                size: inner.size,
                                single_assignment: inner.single_assignment,
                                hints: Self::clone_hints(&inner),
                                payload: Self::payload_bytes(&inner),
                            },
                        },
                        want_response: false,
                    });
                    Ok((RemoteOutcome::Done { payload: None, write_back }, actions))
                } else {
                    Ok((
                        RemoteOutcome::Done {
                            payload: Some(Self::payload_bytes(&inner)),
                            write_back,
                        },
                        actions,
                    ))
                }
            }
            Decision::Defer => {
                Self::enqueue_remote(&mut inner, requester, msg_id, edt, slot, mode);
                if inner.state == DbState::Idle {
                    Self::master_reclaim(self.guid, &mut inner, &mut actions);
                }
                Ok((RemoteOutcome::Queued, actions))
            }
        }
    }

    /// M_RELEASE arriving at the master. A write-back payload replaces
    /// the canonical bytes.
    pub fn remote_release_msg(
        &self,
        requester: Location,
        payload: Option<Vec<u8>>,
    ) -> Result<Vec<Action>, RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();

        if let Some(bytes) = payload {
            inner.size = bytes.len() as u64;
            *inner.payload.write() = bytes;
        }
        inner.num_users = inner.num_users.checked_sub(1).ok_or(RuntimeError::Inval)?;
        trace!(guid = %self.guid, %requester, users = inner.num_users, "remote release");
        if inner.num_users == 0 {
            inner.state = DbState::Prime;
            inner.mode = AccessMode::Ro;
            let granted_local = Self::drain_local(self.guid, &mut inner, &mut actions);
            if !granted_local {
                Self::drain_remote(self.guid, &mut inner, &mut actions);
            }
            Self::finish_master_del(self.guid, &mut inner, &mut actions);
        }
        Ok(actions)
    }

    /// M_DEL arriving at the master from a destroying slave.
    pub fn remote_del_msg(&self, requester: Location) -> Result<Vec<Action>, RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        if inner.free_requested {
            return Err(RuntimeError::Perm);
        }
        inner.free_requested = true;
        Self::broadcast_del(self.guid, &mut inner, Some(requester), &mut actions);
        Self::finish_master_del(self.guid, &mut inner, &mut actions);
        Ok(actions)
    }

    /// Invalidate request routed to the master by a lazy writer.
    pub fn invalidate_request_msg(
        &self,
        requester: Location,
        msg_id: u64,
        mode: AccessMode,
    ) -> Result<(RemoteOutcome, Vec<Action>), RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();

        if inner.forward_to.is_some() || inner.invalidate_acks_pending > 0 {
            return Err(RuntimeError::Busy);
        }
        if inner.num_users > 0 {
            // Refuse to invalidate under live users; park it.
            if inner.pending_invalidate.is_some() {
                return Err(RuntimeError::Busy);
            }
            inner.pending_invalidate = Some((requester, msg_id, mode));
            return Ok((RemoteOutcome::Queued, actions));
        }
        Self::start_invalidate(self.guid, &mut inner, requester, msg_id, mode, &mut actions);
        Ok((RemoteOutcome::Queued, actions))
    }

    /// Invalidate broadcast arriving at a slave clone.
    pub fn invalidate_clone_msg(
        &self,
        src: Location,
        msg_id: u64,
    ) -> Result<(RemoteOutcome, Vec<Action>), RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        if inner.num_users > 0 {
            if inner.pending_invalidate.is_some() {
                return Err(RuntimeError::Busy);
            }
            inner.pending_invalidate = Some((src, msg_id, AccessMode::Ro));
            return Ok((RemoteOutcome::Queued, actions));
        }
        let payload = Self::drop_clone(&mut inner);
        Ok((RemoteOutcome::Done { payload, write_back: false }, actions))
    }

    // === Slave side, response-driven ===

    /// Clone pushed by the master on first contact.
    pub fn install_clone(
        &self,
        size: u64,
        single_assignment: bool,
        hints: &Hints,
        payload: Vec<u8>,
    ) -> Vec<Action> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        inner.size = size;
        inner.single_assignment = single_assignment;
        inner.is_eager = hints.is_set(HintKey::DbEager);
        inner.is_lazy = hints.is_set(HintKey::DbLazy);
        *inner.payload.write() = payload;
        inner.has_payload = true;
        if let Some((mode, write_back)) = inner.pending_grant.take() {
            Self::apply_grant(&mut inner, mode, write_back);
            Self::drain_local(self.guid, &mut inner, &mut actions);
        }
        actions
    }

    /// Answer to our pull. Payload present on refresh grants; absent on
    /// first contact where the clone message carries it and may still
    /// be in flight.
    pub fn on_acquire_response(
        &self,
        payload: Option<Vec<u8>>,
        write_back: bool,
        mode: AccessMode,
    ) -> Vec<Action> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        inner.is_fetching = false;
        if let Some(bytes) = payload {
            inner.size = bytes.len() as u64;
            *inner.payload.write() = bytes;
            inner.has_payload = true;
        }
        if inner.has_payload {
            Self::apply_grant(&mut inner, mode, write_back);
            Self::drain_local(self.guid, &mut inner, &mut actions);
        } else {
            // Grant outran the clone payload; apply once it lands.
            inner.pending_grant = Some((mode, write_back));
        }
        actions
    }

    /// Master acknowledged our release.
    pub fn on_release_acked(&self) -> Vec<Action> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        inner.is_releasing = false;
        // Acquires that queued while the release was in flight restart
        // the pull.
        if let Some(mode) = Self::first_queued_mode(&inner) {
            if !inner.is_fetching {
                inner.is_fetching = true;
                actions.push(Action::Send {
                    dest: inner.md_peers,
                    body: MessageBody::DbAcquire {
                        guid: self.guid,
                        edt: NULL_GUID,
                        slot: 0,
                        mode,
                        payload: None,
                        write_back: false,
                    },
                    want_response: true,
                });
            }
        }
        Self::finish_slave_del(self.guid, &mut inner, &mut actions);
        actions
    }

    /// A slave acknowledged the destroy broadcast.
    pub fn on_del_acked(&self) -> Vec<Action> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        inner.del_acks_pending = inner.del_acks_pending.saturating_sub(1);
        Self::finish_master_del(self.guid, &mut inner, &mut actions);
        actions
    }

    /// A clone acknowledged the invalidate broadcast (master side).
    pub fn on_invalidate_acked(&self, payload: Option<Vec<u8>>) -> Vec<Action> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        if let Some(bytes) = payload {
            inner.size = bytes.len() as u64;
            *inner.payload.write() = bytes;
        }
        inner.invalidate_acks_pending = inner.invalidate_acks_pending.saturating_sub(1);
        if inner.invalidate_acks_pending == 0 {
            match inner.forward_to.take() {
                Some((requester, msg_id, mode)) => {
                    Self::forward_ownership(
                        self.guid,
                        &mut inner,
                        requester,
                        msg_id,
                        mode,
                        &mut actions,
                    );
                }
                None => {
                    // Reclaim: privileges are home again.
                    inner.state = DbState::Prime;
                    inner.mode = AccessMode::Ro;
                    inner.hot = None;
                    let granted_local = Self::drain_local(self.guid, &mut inner, &mut actions);
                    if !granted_local {
                        Self::drain_remote(self.guid, &mut inner, &mut actions);
                    }
                }
            }
        }
        actions
    }

    /// The master granted our invalidate: ownership arrives with the
    /// canonical payload (requester side).
    pub fn on_invalidate_granted(&self, payload: Option<Vec<u8>>) -> Vec<Action> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        inner.is_fetching = false;
        if let Some(bytes) = payload {
            inner.size = bytes.len() as u64;
            *inner.payload.write() = bytes;
            inner.has_payload = true;
        }
        inner.state = DbState::Prime;
        inner.mode = AccessMode::Ro;
        inner.write_back = true;
        Self::drain_local(self.guid, &mut inner, &mut actions);
        actions
    }

    /// Eager push riding a satisfy: current contents are discarded and
    /// replaced wholesale.
    pub fn install_eager(&self, payload: Vec<u8>) -> Vec<Action> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        inner.is_eager = true;
        inner.size = payload.len() as u64;
        *inner.payload.write() = payload;
        inner.has_payload = true;
        inner.state = DbState::Shared;
        inner.mode = AccessMode::Ro;
        Self::drain_local(self.guid, &mut inner, &mut actions);
        actions
    }

    /// Master notes an eager consumer so destroy broadcasts reach it.
    pub fn note_eager_clone(&self, consumer: Location) {
        let mut inner = self.inner.lock();
        inner.clone_locs |= loc_bit(consumer);
    }

    // === Internals; all run under the instance lock ===

    fn clone_hints(inner: &DbInner) -> Hints {
        let mut hints = Hints::new();
        if inner.is_eager {
            hints.set(HintKey::DbEager, 1);
        }
        if inner.is_lazy {
            hints.set(HintKey::DbLazy, 1);
        }
        hints
    }

    fn enqueue_local(inner: &mut DbInner, edt: Guid, slot: u64, mode: AccessMode) {
        if let Some(idx) = mode.queue_index() {
            inner.local_queues[idx].push_back(LocalWaiter { edt, slot, mode });
        }
    }

    fn enqueue_remote(
        inner: &mut DbInner,
        requester: Location,
        msg_id: u64,
        edt: Guid,
        slot: u64,
        mode: AccessMode,
    ) {
        if let Some(idx) = mode.queue_index() {
            inner.remote_queues[idx].push_back(RemoteWaiter { requester, msg_id, edt, slot, mode });
        }
    }

    fn first_queued_mode(inner: &DbInner) -> Option<AccessMode> {
        AccessMode::QUEUED
            .iter()
            .find(|m| {
                m.queue_index().map(|i| !inner.local_queues[i].is_empty()).unwrap_or(false)
            })
            .copied()
    }

    fn apply_grant(inner: &mut DbInner, mode: AccessMode, write_back: bool) {
        inner.state = if mode.is_write() { DbState::Prime } else { DbState::Shared };
        inner.mode = AccessMode::Ro;
        inner.write_back = inner.write_back || write_back;
        if mode.is_write() && inner.single_assignment {
            inner.assigned = true;
        }
    }

    /// Writer-priority sweep over the local queues; every waiter the
    /// grant table accepts checks in.
    fn drain_local(guid: Guid, inner: &mut DbInner, actions: &mut Vec<Action>) -> bool {
        let mut granted = false;
        for mode in AccessMode::QUEUED {
            let Some(idx) = mode.queue_index() else { continue };
            loop {
                let Some(head_mode) = inner.local_queues[idx].front().map(|w| w.mode) else {
                    break;
                };
                match local_acquire(inner.state, inner.mode, head_mode) {
                    Decision::Grant { mode: new_mode, state } => {
                        let Some(waiter) = inner.local_queues[idx].pop_front() else { break };
                        inner.state = state;
                        inner.mode = new_mode;
                        inner.num_users += 1;
                        if waiter.mode.is_write() && inner.single_assignment {
                            inner.assigned = true;
                        }
                        granted = true;
                        actions.push(Action::AcquireGranted {
                            edt: waiter.edt,
                            slot: waiter.slot,
                            db: guid,
                        });
                    }
                    Decision::Defer => break,
                }
            }
        }
        granted
    }

    /// Master drain of queued peers: one writer, or every reader.
    fn drain_remote(guid: Guid, inner: &mut DbInner, actions: &mut Vec<Action>) {
        for mode in AccessMode::QUEUED {
            let Some(idx) = mode.queue_index() else { continue };
            loop {
                let Some(head_mode) = inner.remote_queues[idx].front().map(|w| w.mode) else {
                    break;
                };
                match remote_acquire(inner.state, inner.mode, head_mode) {
                    Decision::Grant { mode: new_mode, state } => {
                        let Some(waiter) = inner.remote_queues[idx].pop_front() else { break };
                        inner.state = state;
                        inner.mode = new_mode;
                        inner.num_users += 1;
                        if waiter.mode.is_write() && inner.single_assignment {
                            inner.assigned = true;
                        }
                        let first_contact = inner.clone_locs & loc_bit(waiter.requester) == 0;
                        inner.clone_locs |= loc_bit(waiter.requester);
                        if inner.is_lazy && waiter.mode.is_write() {
                            inner.hot = Some(waiter.requester);
                        }
                        let write_back = waiter.mode.is_write() && !inner.single_assignment;
                        if first_contact {
                            actions.push(Action::Send {
                                dest: waiter.requester,
                                body: MessageBody::MetadataComm {
                                    guid,
                                    op: MetadataOp::Clone {
                                        size: inner.size,
                                        single_assignment: inner.single_assignment,
                                        hints: Self::clone_hints(inner),
                                        payload: Self::payload_bytes(inner),
                                    },
                                },
                                want_response: false,
                            });
                        }
                        let payload =
                            (!first_contact).then(|| Self::payload_bytes(inner));
                        actions.push(Action::Respond {
                            dest: waiter.requester,
                            msg_id: waiter.msg_id,
                            body: MessageBody::DbAcquire {
                                guid,
                                edt: waiter.edt,
                                slot: waiter.slot,
                                mode: waiter.mode,
                                payload,
                                write_back,
                            },
                            status: Ok(()),
                        });
                    }
                    Decision::Defer => break,
                }
            }
        }
    }

    /// Pull clone privileges home without a forward target: used when
    /// the master itself (or a fresh peer) needs a DB whose lazy hot
    /// copy is elsewhere.
    fn master_reclaim(guid: Guid, inner: &mut DbInner, actions: &mut Vec<Action>) {
        if inner.invalidate_acks_pending > 0 || inner.forward_to.is_some() {
            return;
        }
        let mut count = 0;
        let clones = inner.clone_locs;
        for loc in 0..64u64 {
            if clones & (1 << loc) != 0 {
                count += 1;
                actions.push(Action::Send {
                    dest: Location(loc),
                    body: MessageBody::MetadataComm {
                        guid,
                        op: MetadataOp::Invalidate {
                            requester: INVALID_LOCATION,
                            mode: AccessMode::Ro,
                            payload: None,
                        },
                    },
                    want_response: true,
                });
            }
        }
        inner.clone_locs = 0;
        inner.invalidate_acks_pending = count;
        if count == 0 {
            inner.state = DbState::Prime;
            inner.mode = AccessMode::Ro;
            inner.hot = None;
        }
    }

    fn start_invalidate(
        guid: Guid,
        inner: &mut DbInner,
        requester: Location,
        msg_id: u64,
        mode: AccessMode,
        actions: &mut Vec<Action>,
    ) {
        let mut others = 0;
        let clones = inner.clone_locs & !loc_bit(requester);
        for loc in 0..64u64 {
            if clones & (1 << loc) != 0 {
                others += 1;
                actions.push(Action::Send {
                    dest: Location(loc),
                    body: MessageBody::MetadataComm {
                        guid,
                        op: MetadataOp::Invalidate { requester, mode, payload: None },
                    },
                    want_response: true,
                });
            }
        }
        inner.invalidate_acks_pending = others;
        if others == 0 {
            Self::forward_ownership(guid, inner, requester, msg_id, mode, actions);
        } else {
            inner.forward_to = Some((requester, msg_id, mode));
        }
    }

    /// Hand write privileges to the lazy requester: the master itself
    /// goes idle and the canonical bytes ride the grant.
    fn forward_ownership(
        guid: Guid,
        inner: &mut DbInner,
        requester: Location,
        msg_id: u64,
        mode: AccessMode,
        actions: &mut Vec<Action>,
    ) {
        inner.state = DbState::Idle;
        inner.mode = AccessMode::Ro;
        inner.hot = Some(requester);
        // Every other clone just dropped; only the new holder remains.
        inner.clone_locs = loc_bit(requester);
        debug!(%guid, %requester, ?mode, "forwarding lazy ownership");
        actions.push(Action::Respond {
            dest: requester,
            msg_id,
            body: MessageBody::MetadataComm {
                guid,
                op: MetadataOp::Invalidate {
                    requester,
                    mode,
                    payload: Some(Self::payload_bytes(inner)),
                },
            },
            status: Ok(()),
        });
    }

    /// Deferred invalidate applied once the last user checks out.
    fn apply_invalidate(
        guid: Guid,
        inner: &mut DbInner,
        src: Location,
        msg_id: u64,
        actions: &mut Vec<Action>,
    ) {
        let payload = Self::drop_clone(inner);
        actions.push(Action::Respond {
            dest: src,
            msg_id,
            body: MessageBody::MetadataComm {
                guid,
                op: MetadataOp::Invalidate {
                    requester: INVALID_LOCATION,
                    mode: AccessMode::Ro,
                    payload,
                },
            },
            status: Ok(()),
        });
    }

    /// Drop clone privileges; a dirty clone hands its bytes back.
    fn drop_clone(inner: &mut DbInner) -> Option<Vec<u8>> {
        let payload = inner.write_back.then(|| Self::payload_bytes(inner));
        inner.write_back = false;
        inner.state = DbState::Idle;
        inner.mode = AccessMode::Ro;
        inner.has_payload = false;
        *inner.payload.write() = Vec::new();
        payload
    }

    fn broadcast_del(
        guid: Guid,
        inner: &mut DbInner,
        avoid: Option<Location>,
        actions: &mut Vec<Action>,
    ) {
        let mut clones = inner.clone_locs;
        if let Some(loc) = avoid {
            clones &= !loc_bit(loc);
        }
        let mut count = 0;
        for loc in 0..64u64 {
            if clones & (1 << loc) != 0 {
                count += 1;
                actions.push(Action::Send {
                    dest: Location(loc),
                    body: MessageBody::MetadataComm { guid, op: MetadataOp::Del },
                    want_response: true,
                });
            }
        }
        inner.del_acks_pending = count;
    }

    /// Master frees once every slave acknowledged and local users drained.
    fn finish_master_del(guid: Guid, inner: &mut DbInner, actions: &mut Vec<Action>) {
        if inner.free_requested && inner.num_users == 0 && inner.del_acks_pending == 0 {
            debug!(%guid, "datablock freed");
            actions.push(Action::DestroyGuid(guid));
        }
    }

    /// Slave quietly deallocates once users drain; a parked destroy
    /// broadcast gets its answer here.
    fn finish_slave_del(guid: Guid, inner: &mut DbInner, actions: &mut Vec<Action>) {
        if inner.free_requested && inner.num_users == 0 && !inner.is_releasing {
            if let Some((src, msg_id)) = inner.pending_del.take() {
                actions.push(Action::Respond {
                    dest: src,
                    msg_id,
                    body: MessageBody::MetadataComm { guid, op: MetadataOp::Del },
                    status: Ok(()),
                });
            }
            actions.push(Action::DestroyGuid(guid));
        }
    }

    /// Destroy broadcast arriving at a slave.
    pub fn del_clone_msg(
        &self,
        src: Location,
        msg_id: u64,
    ) -> Result<(RemoteOutcome, Vec<Action>), RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        inner.free_requested = true;
        if inner.num_users == 0 && !inner.is_releasing {
            actions.push(Action::DestroyGuid(self.guid));
            return Ok((RemoteOutcome::Done { payload: None, write_back: false }, actions));
        }
        inner.pending_del = Some((src, msg_id));
        Ok((RemoteOutcome::Queued, actions))
    }
}

#[cfg(test)]
#[path = "block_tests.rs"]
mod tests;
