// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The comm/compute worker pair.
//!
//! Compute workers pull EDTs through SCHED_GET_WORK and execute them;
//! the comm worker drains the comm queue outward and polls the
//! transport inward, never blocking on user work. USER_OK tear-down
//! runs here: compute quiesces first, then comm drains its in-flight
//! traffic and declares the domain done.

use crate::api::TaskContext;
use crate::policy::PolicyDomain;
use ocr_comm::{HandlePool, RecvHandle, SendHandle, SendMode};
use ocr_core::{Guid, RuntimeError, UserPhase, NULL_GUID};
use ocr_wire::{decode, MessageBody, NotifyKind, PolicyMessage};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Idle backoff; keeps spinning workers off the hot path without
/// adding visible latency.
const IDLE_NAP: Duration = Duration::from_micros(50);

/// Compute worker body. The blessed worker of the blessed domain
/// launches the main EDT exactly once on its first USER_OK entry.
pub fn compute_loop(pd: Arc<PolicyDomain>, index: usize) {
    info!(pd = %pd.location(), index, "compute worker up");
    if pd.blessed && index == 0 {
        if let Err(code) = pd.bootstrap_main() {
            warn!(?code, "blessed bootstrap failed");
        }
    }
    loop {
        match pd.run.phase() {
            UserPhase::Run => match get_work(&pd, index) {
                Some(edt) => execute(&pd, edt),
                None => thread::sleep(IDLE_NAP),
            },
            UserPhase::CompQuiesce => {
                debug!(pd = %pd.location(), index, "compute worker quiescing");
                pd.run.note_compute_quiesced();
                pd.run.wait_done();
                break;
            }
            UserPhase::CommQuiesce | UserPhase::Done => break,
        }
    }
    info!(pd = %pd.location(), index, "compute worker down");
}

fn get_work(pd: &PolicyDomain, index: usize) -> Option<Guid> {
    let mut msg = PolicyMessage::request(
        pd.location(),
        pd.location(),
        pd.next_msg_id(),
        MessageBody::SchedGetWork { worker: index as u64, edt: NULL_GUID },
    );
    if pd.process_message(&mut msg, false).is_err() {
        return None;
    }
    match msg.body {
        MessageBody::SchedGetWork { edt, .. } if !edt.is_null() => Some(edt),
        _ => None,
    }
}

fn execute(pd: &Arc<PolicyDomain>, edt: Guid) {
    let Some(task) = pd.provider.edt(edt) else {
        // Dropped between scheduling and pickup (tear-down race).
        return;
    };
    let deps = match task.start() {
        Ok(deps) => deps,
        Err(code) => {
            warn!(%edt, ?code, "refusing to run task");
            return;
        }
    };
    let Some(func) = pd.functions.get(task.func) else {
        warn!(%edt, func = task.func.0, "unknown EDT function");
        return;
    };
    trace!(%edt, "running");
    let mut ctx = TaskContext::new(pd, &task, deps);
    let ret = func(&mut ctx);
    if let Err(code) = task.finish() {
        warn!(%edt, ?code, "finish bookkeeping failed");
    }

    let mut msg = PolicyMessage::request(
        pd.location(),
        pd.location(),
        pd.next_msg_id(),
        MessageBody::SchedNotify { kind: NotifyKind::EdtDone, edt, payload: ret },
    );
    if let Err(code) = pd.process_message(&mut msg, false) {
        if code != RuntimeError::Pending {
            warn!(%edt, ?code, "completion notification failed");
        }
    }
}

/// Comm worker body: one outbound send and a full inbound drain per
/// iteration, then the tear-down bookkeeping.
pub fn comm_loop(pd: Arc<PolicyDomain>) {
    info!(pd = %pd.location(), "comm worker up");
    let mut recvs: HandlePool<RecvHandle> = HandlePool::new();
    loop {
        let phase = pd.run.phase();
        let mut busy = false;

        if phase <= UserPhase::CompQuiesce {
            busy |= pump_outbound(&pd, &mut recvs);
        }
        busy |= pump_inbound(&pd, &mut recvs);

        match phase {
            UserPhase::Run => {}
            UserPhase::CompQuiesce => {
                if pd.run.all_compute_quiesced()
                    && pd.outbound_empty()
                    && pd.platform.sends_drained()
                {
                    debug!(pd = %pd.location(), "comm quiescing");
                    pd.run.advance(UserPhase::CommQuiesce);
                }
            }
            UserPhase::CommQuiesce => {
                if !busy && pd.outbound_empty() && pd.platform.sends_drained() {
                    // Nothing in flight either way; release any still
                    // parked workers and finish the dance.
                    pd.strands.abandon_all();
                    pd.run.advance(UserPhase::Done);
                }
            }
            UserPhase::Done => break,
        }
        if !busy {
            thread::sleep(IDLE_NAP);
        }
    }
    info!(pd = %pd.location(), outstanding = recvs.len(), "comm worker down");
}

/// Take one handle from the comm queue (through COMM_TAKE) and push it
/// into the transport. Sends expecting a response move to the receive
/// pool, keyed by their rendezvous tag.
fn pump_outbound(pd: &PolicyDomain, recvs: &mut HandlePool<RecvHandle>) -> bool {
    let mut msg = PolicyMessage::request(
        pd.location(),
        pd.location(),
        pd.next_msg_id(),
        MessageBody::CommTake { handle: None },
    );
    if pd.process_message(&mut msg, false).is_err() {
        return false;
    }
    let MessageBody::CommTake { handle: Some(handle) } = msg.body else {
        return false;
    };
    let mut send =
        SendHandle::new(handle.dest, handle.msg_id, handle.frame, handle.want_response);
    let dest = send.dest;
    let frame = std::mem::take(&mut send.frame);
    match pd.platform.send(dest, frame, SendMode::Persistent) {
        Ok(()) => {
            if send.want_response {
                recvs.alloc(send.into_recv());
            }
        }
        Err(err) => {
            // Tear-down window: traffic to a dismantled peer is dropped.
            debug!(%dest, %err, "send dropped");
        }
    }
    true
}

fn pump_inbound(pd: &Arc<PolicyDomain>, recvs: &mut HandlePool<RecvHandle>) -> bool {
    let mut busy = false;
    while let Some(frame) = pd.platform.poll() {
        busy = true;
        match decode(&frame) {
            Ok(msg) if msg.is_response() => {
                let msg_id = msg.header.msg_id;
                recvs.remove_where(|h| h.msg_id == msg_id);
                if let Some(unclaimed) = pd.strands.complete(msg_id, msg) {
                    pd.process_response(unclaimed);
                }
            }
            Ok(msg) => pd.enqueue_incoming(msg),
            Err(err) => warn!(%err, "undecodable frame dropped"),
        }
    }
    busy
}
