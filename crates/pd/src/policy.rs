// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy-domain dispatch.
//!
//! One entry point: [`PolicyDomain::process_message`]. Local requests
//! hit the closed handler table and are mutated into their responses
//! in place; remote destinations are wrapped into send handles for the
//! comm queue. `Err(RuntimeError::Pending)` always means "the answer
//! comes later": through a strand for parked workers, through the
//! engine's response handlers for runtime traffic.

use crate::functions::{FnRegistry, PROCESS_REQUEST_FN};
use crate::runlevel::RunState;
use ocr_comm::{CommPlatform, SendHandle};
use ocr_core::{
    AccessMode, Guid, GuidKind, Hints, Location, RlDirection, RuntimeError, NULL_GUID,
};
use ocr_engine::db::RemoteOutcome;
use ocr_engine::event::LATCH_DECR_SLOT;
use ocr_engine::{
    Action, DataBlock, EdtTask, EdtTemplate, GuidProvider, LocalAcquire, Metadata, RuntimeEvent,
    StrandTable,
};
use ocr_sched::{CommQueue, Placer, WorkpileSet};
use ocr_wire::{
    encode, FnId, MessageBody, MetadataOp, NotifyKind, PolicyMessage, PolicyMessageFrame,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub struct PolicyDomain {
    pub(crate) me: Location,
    pub(crate) locations: Vec<Location>,
    pub(crate) blessed: bool,
    pub(crate) provider: GuidProvider,
    pub(crate) platform: Box<dyn CommPlatform>,
    pub(crate) comm_queue: CommQueue,
    pub(crate) workpiles: WorkpileSet,
    pub(crate) placer: Placer,
    pub(crate) strands: StrandTable,
    pub(crate) functions: Arc<FnRegistry>,
    pub(crate) run: RunState,
    msg_counter: AtomicU64,
    next_pile: AtomicUsize,
    /// Incoming requests parked under their wrapper EDT's handle.
    runtime_msgs: Mutex<HashMap<Guid, PolicyMessage>>,
    pub(crate) main_fn: FnId,
    pub(crate) args: Vec<String>,
}

impl PolicyDomain {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        me: Location,
        locations: Vec<Location>,
        blessed: bool,
        platform: Box<dyn CommPlatform>,
        compute_workers: usize,
        functions: Arc<FnRegistry>,
        main_fn: FnId,
        args: Vec<String>,
    ) -> Self {
        Self {
            me,
            provider: GuidProvider::new(me),
            platform,
            comm_queue: CommQueue::new(),
            workpiles: WorkpileSet::new(compute_workers),
            placer: Placer::new(locations.clone()),
            strands: StrandTable::new(),
            functions,
            run: RunState::new(compute_workers),
            msg_counter: AtomicU64::new(1),
            next_pile: AtomicUsize::new(0),
            runtime_msgs: Mutex::new(HashMap::new()),
            locations,
            blessed,
            main_fn,
            args,
        }
    }

    pub fn location(&self) -> Location {
        self.me
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub(crate) fn next_msg_id(&self) -> u64 {
        self.msg_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// The dispatch entry point. Requests for this location run their
    /// handler synchronously, mutating `msg` into its response body;
    /// anything else is parked on the comm queue and answered later.
    pub fn process_message(
        &self,
        msg: &mut PolicyMessage,
        want_response: bool,
    ) -> Result<(), RuntimeError> {
        // Placement runs once, at the origin of new work.
        if msg.is_request() && msg.header.src == self.me && msg.header.dest == self.me {
            if let MessageBody::WorkCreate { hints, .. } = &msg.body {
                msg.header.dest = self.placer.place(self.me, hints);
            }
        }

        if msg.header.dest != self.me {
            msg.header.requires_response = want_response;
            let dest = msg.header.dest;
            let msg_id = msg.header.msg_id;
            let frame = encode(msg).map_err(|_| RuntimeError::Inval)?;
            trace!(op = msg.body.op_name(), %dest, msg_id, "forwarding");
            self.give_outbound(PolicyMessageFrame { dest, msg_id, want_response, frame });
            return Err(RuntimeError::Pending);
        }
        self.handle_local(msg)
    }

    /// Dispatch from a compute worker that needs the answer: parks on
    /// a strand when the destination is remote (or the handler
    /// deferred) and hands the response body back through `msg`.
    pub fn call_and_wait(&self, msg: &mut PolicyMessage) -> Result<(), RuntimeError> {
        let msg_id = msg.header.msg_id;
        let strand = self.strands.register(msg_id);
        match self.process_message(msg, true) {
            Err(RuntimeError::Pending) => match strand.wait() {
                Some(response) => {
                    let status = response.status();
                    *msg = response;
                    status
                }
                None => Err(RuntimeError::Pending),
            },
            other => {
                self.strands.discard(msg_id);
                other
            }
        }
    }

    // === Handler table ===

    fn handle_local(&self, msg: &mut PolicyMessage) -> Result<(), RuntimeError> {
        let src = msg.header.src;
        let msg_id = msg.header.msg_id;
        trace!(op = msg.body.op_name(), %src, msg_id, "dispatch");

        match &mut msg.body {
            MessageBody::EvtCreate { guid, kind, params } => {
                let g = self.provider.mint(GuidKind::Event);
                let ev = RuntimeEvent::new(g, *kind, params)?;
                self.provider.insert(g, Metadata::Event(ev));
                *guid = g;
                Ok(())
            }
            MessageBody::EvtDestroy { guid } => {
                let ev = self.provider.event(*guid).ok_or(RuntimeError::Inval)?;
                let actions = ev.destroy();
                self.run_actions(actions);
                Ok(())
            }
            MessageBody::EvtSatisfy { guid, slot, payload, datum, eager_payload } => {
                let ev = self.provider.event(*guid).ok_or(RuntimeError::Inval)?;
                let eager = match eager_payload.take() {
                    Some(bytes) => Some(bytes),
                    None => self.capture_eager(*payload, None),
                };
                let actions = ev.satisfy(*slot, *payload, datum.as_deref(), eager)?;
                self.run_actions(actions);
                Ok(())
            }
            MessageBody::DepAdd { source, dest, slot, mode } => {
                let actions = self.dep_add(*source, *dest, *slot, *mode)?;
                self.run_actions(actions);
                Ok(())
            }
            MessageBody::DepSatisfy { edt, slot, payload, mode, eager_payload } => {
                if let Some(bytes) = eager_payload.take() {
                    if let Some(block) = self.db_block(*payload) {
                        let actions = block.install_eager(bytes);
                        self.run_actions(actions);
                    }
                }
                let task = self.provider.edt(*edt).ok_or(RuntimeError::Inval)?;
                let actions = task.satisfy_slot(*slot, *payload, *mode)?;
                self.run_actions(actions);
                Ok(())
            }
            MessageBody::DbCreate { guid, size, single_assignment, hints } => {
                let g = self.provider.mint(GuidKind::Db);
                let block = DataBlock::master(g, *size, *single_assignment, hints);
                self.provider.insert(g, Metadata::Db(block));
                *guid = g;
                Ok(())
            }
            MessageBody::DbAcquire { guid, edt, slot, mode, payload, write_back } => {
                // Arriving pulls only: local acquires run through the
                // engine as part of dependence resolution.
                let block = self.provider.db(*guid).ok_or(RuntimeError::Inval)?;
                let (outcome, actions) =
                    block.remote_acquire_msg(src, msg_id, *edt, *slot, *mode)?;
                self.run_actions(actions);
                match outcome {
                    RemoteOutcome::Done { payload: p, write_back: wb } => {
                        *payload = p;
                        *write_back = wb;
                        Ok(())
                    }
                    RemoteOutcome::Queued => Err(RuntimeError::Pending),
                }
            }
            MessageBody::DbRelease { guid, payload, .. } => {
                let block = self.provider.db(*guid).ok_or(RuntimeError::Inval)?;
                let actions = if src == self.me {
                    block.release_local()?
                } else {
                    block.remote_release_msg(src, payload.take())?
                };
                self.run_actions(actions);
                Ok(())
            }
            MessageBody::DbDestroy { guid } => {
                let block = self.provider.db(*guid).ok_or(RuntimeError::Inval)?;
                let actions = block.destroy()?;
                self.run_actions(actions);
                Ok(())
            }
            MessageBody::DbGetSize { guid, size } => {
                let block = self.provider.db(*guid).ok_or(RuntimeError::Inval)?;
                *size = block.size().ok_or(RuntimeError::Inval)?;
                Ok(())
            }
            MessageBody::EdtTempCreate { guid, func, paramc, depc } => {
                let g = self.provider.mint(GuidKind::EdtTemplate);
                let template =
                    EdtTemplate { guid: g, func: *func, paramc: *paramc, depc: *depc };
                self.provider.insert(g, Metadata::Template(Arc::new(template)));
                *guid = g;
                Ok(())
            }
            MessageBody::EdtTempDestroy { guid } => {
                self.provider.remove(*guid).map(|_| ()).ok_or(RuntimeError::Inval)
            }
            MessageBody::WorkCreate {
                guid,
                template,
                func,
                paramc,
                depc,
                paramv,
                depv,
                hints: _,
                output_event,
                out_event,
                finish,
                parent_latch,
            } => {
                let tpl = EdtTemplate {
                    guid: *template,
                    func: *func,
                    paramc: *paramc,
                    depc: *depc,
                };
                let g = self.provider.mint(GuidKind::Edt);
                let mut oe = NULL_GUID;
                if *output_event {
                    let eg = self.provider.mint(GuidKind::Event);
                    let ev = RuntimeEvent::new(
                        eg,
                        ocr_core::EventKind::Once,
                        &ocr_core::EventParams::Plain,
                    )?;
                    self.provider.insert(eg, Metadata::Event(ev));
                    oe = eg;
                }
                let mut finish_latch = NULL_GUID;
                let mut actions = Vec::new();
                if *finish {
                    let lg = self.provider.mint(GuidKind::Event);
                    let latch = RuntimeEvent::new(
                        lg,
                        ocr_core::EventKind::Latch,
                        &ocr_core::EventParams::Latch(ocr_core::LatchParams { init_count: 1 }),
                    )?;
                    if !oe.is_null() {
                        actions.extend(latch.add_dependence(oe, 0, AccessMode::Null)?);
                    }
                    self.provider.insert(lg, Metadata::Event(latch));
                    finish_latch = lg;
                }
                let dep_modes = vec![AccessMode::Rw; *depc as usize];
                let (task, creation) = EdtTask::new(
                    g,
                    &tpl,
                    paramv.clone(),
                    dep_modes,
                    oe,
                    finish_latch,
                    *parent_latch,
                )?;
                self.provider.insert(g, Metadata::Edt(task));
                if let Some(sources) = depv {
                    for (idx, source) in sources.clone().into_iter().enumerate() {
                        if !source.is_null() {
                            actions.extend(self.dep_add(
                                source,
                                g,
                                idx as u64,
                                AccessMode::Rw,
                            )?);
                        }
                    }
                }
                actions.extend(creation);
                *guid = g;
                *out_event = oe;
                self.run_actions(actions);
                Ok(())
            }
            MessageBody::WorkDestroy { guid } => {
                self.provider.remove(*guid).map(|_| ()).ok_or(RuntimeError::Inval)
            }
            MessageBody::GuidCreate { guid, kind } => {
                *guid = self.provider.mint(*kind);
                Ok(())
            }
            MessageBody::GuidReserve { count, kind, start } => {
                if *count == 0 {
                    return Err(RuntimeError::Inval);
                }
                *start = self.provider.reserve(*kind, *count);
                Ok(())
            }
            MessageBody::GuidDestroy { guid } => {
                self.provider.remove(*guid);
                Ok(())
            }
            MessageBody::MemAlloc { size } | MessageBody::MemUnalloc { size } => {
                if *size == 0 {
                    return Err(RuntimeError::Inval);
                }
                Ok(())
            }
            MessageBody::MetadataComm { guid, op } => self.handle_metadata(src, msg_id, *guid, op),
            MessageBody::CommGive { handle } => {
                if let Some(frame) = handle.take() {
                    self.comm_queue.give(SendHandle::new(
                        frame.dest,
                        frame.msg_id,
                        frame.frame,
                        frame.want_response,
                    ));
                }
                Ok(())
            }
            MessageBody::CommTake { handle } => {
                *handle = self.comm_queue.take().map(|h| {
                    Box::new(PolicyMessageFrame {
                        dest: h.dest,
                        msg_id: h.msg_id,
                        want_response: h.want_response,
                        frame: h.frame,
                    })
                });
                Ok(())
            }
            MessageBody::SchedGetWork { worker, edt } => {
                *edt = self.workpiles.take(*worker as usize).unwrap_or(NULL_GUID);
                Ok(())
            }
            MessageBody::SchedNotify { kind, edt, payload } => match kind {
                NotifyKind::EdtDone => {
                    let task = self.provider.edt(*edt).ok_or(RuntimeError::Inval)?;
                    self.edt_done(&task, *payload)
                }
                NotifyKind::EdtSatisfied => {
                    self.run_actions(vec![Action::EdtReady(*edt)]);
                    Ok(())
                }
            },
            MessageBody::MgtRlNotify { direction, error_code, .. } => {
                if *direction == RlDirection::TearDown {
                    self.run.request_shutdown(*error_code);
                }
                Ok(())
            }
        }
    }

    fn handle_metadata(
        &self,
        src: Location,
        msg_id: u64,
        guid: Guid,
        op: &mut MetadataOp,
    ) -> Result<(), RuntimeError> {
        match op {
            MetadataOp::Clone { size, single_assignment, hints, payload } => {
                let block = self.db_block(guid).ok_or(RuntimeError::Inval)?;
                let actions = block.install_clone(
                    *size,
                    *single_assignment,
                    hints,
                    std::mem::take(payload),
                );
                self.run_actions(actions);
                Ok(())
            }
            MetadataOp::Del => {
                if guid.home() == self.me {
                    let block = self.provider.db(guid).ok_or(RuntimeError::Inval)?;
                    let actions = block.remote_del_msg(src)?;
                    self.run_actions(actions);
                    Ok(())
                } else {
                    // Destroy broadcast hitting a clone; a clone that
                    // already deallocated just acknowledges.
                    let Some(block) = self.provider.db(guid) else { return Ok(()) };
                    let (outcome, actions) = block.del_clone_msg(src, msg_id)?;
                    self.run_actions(actions);
                    match outcome {
                        RemoteOutcome::Done { .. } => Ok(()),
                        RemoteOutcome::Queued => Err(RuntimeError::Pending),
                    }
                }
            }
            MetadataOp::Invalidate { mode, payload, .. } => {
                if guid.home() == self.me {
                    let block = self.provider.db(guid).ok_or(RuntimeError::Inval)?;
                    let (_, actions) = block.invalidate_request_msg(src, msg_id, *mode)?;
                    self.run_actions(actions);
                    Err(RuntimeError::Pending)
                } else {
                    let Some(block) = self.provider.db(guid) else { return Ok(()) };
                    let (outcome, actions) = block.invalidate_clone_msg(src, msg_id)?;
                    self.run_actions(actions);
                    match outcome {
                        RemoteOutcome::Done { payload: p, .. } => {
                            *payload = p;
                            Ok(())
                        }
                        RemoteOutcome::Queued => Err(RuntimeError::Pending),
                    }
                }
            }
        }
    }

    // === Request/response plumbing used by the comm worker ===

    /// Handle a transport-delivered request end to end: dispatch, then
    /// flip and queue the response unless the handler took ownership.
    pub fn process_request(&self, mut msg: PolicyMessage) {
        let want = msg.header.requires_response;
        let src = msg.header.src;
        let msg_id = msg.header.msg_id;
        let result = self.handle_local(&mut msg);
        match result {
            Err(RuntimeError::Pending) => {}
            res => {
                if let Err(code) = res {
                    debug!(op = msg.body.op_name(), %src, ?code, "request failed");
                }
                if want {
                    msg.into_response(&res);
                    if let Ok(frame) = encode(&mut msg) {
                        self.give_outbound(PolicyMessageFrame {
                            dest: src,
                            msg_id,
                            want_response: false,
                            frame,
                        });
                    }
                }
            }
        }
    }

    /// Responses nobody is parked on: engine-originated traffic.
    pub fn process_response(&self, msg: PolicyMessage) {
        if let Err(code) = msg.status() {
            warn!(op = msg.body.op_name(), ?code, "remote operation failed");
            return;
        }
        match msg.body {
            MessageBody::DbAcquire { guid, mode, payload, write_back, .. } => {
                if let Some(block) = self.provider.db(guid) {
                    let actions = block.on_acquire_response(payload, write_back, mode);
                    self.run_actions(actions);
                }
            }
            MessageBody::DbRelease { guid, .. } => {
                if let Some(block) = self.provider.db(guid) {
                    let actions = block.on_release_acked();
                    self.run_actions(actions);
                }
            }
            MessageBody::MetadataComm { guid, op: MetadataOp::Del } => {
                if let Some(block) = self.provider.db(guid) {
                    let actions = block.on_del_acked();
                    self.run_actions(actions);
                }
            }
            MessageBody::MetadataComm { guid, op: MetadataOp::Invalidate { payload, .. } } => {
                if let Some(block) = self.provider.db(guid) {
                    let actions = if guid.home() == self.me {
                        block.on_invalidate_acked(payload)
                    } else {
                        block.on_invalidate_granted(payload)
                    };
                    self.run_actions(actions);
                }
            }
            _ => {
                trace!(op = msg.body.op_name(), "response acknowledged");
            }
        }
    }

    /// Wrap a fresh transport request into a runtime EDT; a compute
    /// worker will invoke dispatch on it.
    pub fn enqueue_incoming(&self, msg: PolicyMessage) {
        let g = self.provider.mint(GuidKind::Edt);
        self.runtime_msgs.lock().insert(g, msg);
        let tpl = EdtTemplate { guid: NULL_GUID, func: PROCESS_REQUEST_FN, paramc: 0, depc: 0 };
        match EdtTask::new(g, &tpl, vec![], vec![], NULL_GUID, NULL_GUID, NULL_GUID) {
            Ok((task, actions)) => {
                self.provider.insert(g, Metadata::Edt(task));
                self.run_actions(actions);
            }
            Err(code) => warn!(?code, "failed to wrap incoming request"),
        }
    }

    /// Body of the runtime request-processing EDT.
    pub fn process_wrapped_request(&self, wrapper: Guid) {
        if let Some(msg) = self.runtime_msgs.lock().remove(&wrapper) {
            self.process_request(msg);
        }
    }

    // === Action executor ===

    pub(crate) fn run_actions(&self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Send { dest, body, want_response } => {
                    self.send_request(dest, body, want_response);
                }
                Action::Respond { dest, msg_id, body, status } => {
                    let mut msg = PolicyMessage::response(self.me, dest, msg_id, body, &status);
                    if let Ok(frame) = encode(&mut msg) {
                        self.give_outbound(PolicyMessageFrame {
                            dest,
                            msg_id,
                            want_response: false,
                            frame,
                        });
                    }
                }
                Action::SatisfyDep { dest, slot, payload, mode, eager } => {
                    self.do_satisfy_dep(dest, slot, payload, mode, eager, &mut queue);
                }
                Action::AcquireSlot { db, edt, slot, mode } => {
                    self.do_acquire_slot(db, edt, slot, mode, &mut queue);
                }
                Action::AcquireGranted { edt, slot, db } => {
                    self.do_acquire_granted(edt, slot, db, &mut queue);
                }
                Action::EdtReady(guid) => {
                    let pile = self.next_pile.fetch_add(1, Ordering::Relaxed)
                        % self.workpiles.worker_count().max(1);
                    self.workpiles.push(pile, guid);
                }
                Action::CollectiveResult { datum, consumers } => {
                    let bytes: Vec<u8> =
                        datum.iter().flat_map(|v| v.to_le_bytes()).collect();
                    let g = self.provider.mint(GuidKind::Db);
                    let block = DataBlock::master(g, bytes.len() as u64, false, &Hints::new());
                    *block.payload_arc().write() = bytes;
                    self.provider.insert(g, Metadata::Db(block));
                    for (dest, slot, mode) in consumers {
                        queue.push_back(Action::SatisfyDep {
                            dest,
                            slot,
                            payload: g,
                            mode,
                            eager: None,
                        });
                    }
                }
                Action::DestroyGuid(guid) => {
                    self.provider.remove(guid);
                }
            }
        }
    }

    fn do_satisfy_dep(
        &self,
        dest: Guid,
        slot: u64,
        payload: Guid,
        mode: AccessMode,
        eager: Option<Vec<u8>>,
        queue: &mut VecDeque<Action>,
    ) {
        if dest.home() == self.me {
            if let Some(bytes) = eager {
                if let Some(block) = self.db_block(payload) {
                    queue.extend(block.install_eager(bytes));
                }
            }
            match self.provider.lookup(dest) {
                Some(Metadata::Edt(task)) => match task.satisfy_slot(slot, payload, mode) {
                    Ok(actions) => queue.extend(actions),
                    Err(code) => warn!(%dest, slot, ?code, "slot satisfaction refused"),
                },
                Some(Metadata::Event(ev)) => match ev.satisfy(slot, payload, None, None) {
                    Ok(actions) => queue.extend(actions),
                    Err(code) => warn!(%dest, slot, ?code, "event satisfaction refused"),
                },
                _ => warn!(%dest, "satisfaction for unknown destination"),
            }
        } else {
            let eager = match eager {
                Some(bytes) => {
                    if let Some(block) = self.provider.db(payload) {
                        block.note_eager_clone(dest.home());
                    }
                    Some(bytes)
                }
                None => self.capture_eager(payload, Some(dest.home())),
            };
            let body = match dest.kind() {
                GuidKind::Edt => MessageBody::DepSatisfy {
                    edt: dest,
                    slot,
                    payload,
                    mode,
                    eager_payload: eager,
                },
                GuidKind::Event => MessageBody::EvtSatisfy {
                    guid: dest,
                    slot,
                    payload,
                    datum: None,
                    eager_payload: eager,
                },
                _ => {
                    warn!(%dest, "satisfaction for unroutable destination");
                    return;
                }
            };
            self.send_request(dest.home(), body, false);
        }
    }

    fn do_acquire_slot(
        &self,
        db: Guid,
        edt: Guid,
        slot: u64,
        mode: AccessMode,
        queue: &mut VecDeque<Action>,
    ) {
        let Some(block) = self.db_block(db) else {
            warn!(%db, "acquire against unknown datablock");
            return;
        };
        match block.acquire_local(edt, slot, mode) {
            Ok((LocalAcquire::Granted { data }, actions)) => {
                queue.extend(actions);
                if let Some(task) = self.provider.edt(edt) {
                    match task.slot_acquired(slot, data) {
                        Ok(actions) => queue.extend(actions),
                        Err(code) => warn!(%edt, slot, ?code, "grant bookkeeping failed"),
                    }
                }
            }
            Ok((LocalAcquire::Deferred, actions)) => queue.extend(actions),
            Err(code) => warn!(%db, %edt, ?code, "acquire refused"),
        }
    }

    fn do_acquire_granted(&self, edt: Guid, slot: u64, db: Guid, queue: &mut VecDeque<Action>) {
        let Some(block) = self.provider.db(db) else { return };
        if let Some(task) = self.provider.edt(edt) {
            match task.slot_acquired(slot, block.payload_arc()) {
                Ok(actions) => queue.extend(actions),
                Err(code) => warn!(%edt, slot, ?code, "grant bookkeeping failed"),
            }
        }
    }

    // === Engine helpers ===

    /// Register `dest`'s slot against `source` (event, datablock, or
    /// the null control source).
    fn dep_add(
        &self,
        source: Guid,
        dest: Guid,
        slot: u64,
        mode: AccessMode,
    ) -> Result<Vec<Action>, RuntimeError> {
        if source.is_null() {
            return Ok(vec![Action::SatisfyDep {
                dest,
                slot,
                payload: NULL_GUID,
                mode,
                eager: None,
            }]);
        }
        match source.kind() {
            GuidKind::Db => Ok(vec![Action::SatisfyDep {
                dest,
                slot,
                payload: source,
                mode,
                eager: None,
            }]),
            GuidKind::Event => {
                let ev = self.provider.event(source).ok_or(RuntimeError::Inval)?;
                ev.add_dependence(dest, slot, mode)
            }
            _ => Err(RuntimeError::Inval),
        }
    }

    /// Local eager payload headed off-domain rides along with the
    /// satisfaction; the master tracks the pushed clone.
    fn capture_eager(&self, payload: Guid, consumer: Option<Location>) -> Option<Vec<u8>> {
        if payload.is_null() || payload.home() != self.me {
            return None;
        }
        let block = self.provider.db(payload)?;
        if !block.is_eager() {
            return None;
        }
        if let Some(loc) = consumer {
            block.note_eager_clone(loc);
        }
        Some(block.payload_arc().read().clone())
    }

    /// Existing metadata, or a slave shell for a remotely homed GUID.
    fn db_block(&self, guid: Guid) -> Option<Arc<DataBlock>> {
        if let Some(block) = self.provider.db(guid) {
            return Some(block);
        }
        if guid.home() == self.me {
            return None;
        }
        let shell = DataBlock::shell(guid, guid.home());
        match self.provider.insert_if_absent(guid, Metadata::Db(shell)) {
            Metadata::Db(block) => Some(block),
            _ => None,
        }
    }

    /// Completion of an EDT: release its datablocks, chain the output
    /// event (through the finish latch when one is open), close the
    /// enclosing scope, forget the task.
    pub(crate) fn edt_done(
        &self,
        task: &Arc<EdtTask>,
        ret: Guid,
    ) -> Result<(), RuntimeError> {
        let mut actions = Vec::new();
        for db in task.acquired_dbs() {
            if let Some(block) = self.provider.db(db) {
                match block.release_local() {
                    Ok(a) => actions.extend(a),
                    Err(code) => warn!(%db, ?code, "release at completion failed"),
                }
            }
        }
        if !task.finish_latch.is_null() {
            actions.push(Action::SatisfyDep {
                dest: task.finish_latch,
                slot: LATCH_DECR_SLOT,
                payload: ret,
                mode: AccessMode::Null,
                eager: None,
            });
        } else if !task.output_event.is_null() {
            actions.push(Action::SatisfyDep {
                dest: task.output_event,
                slot: 0,
                payload: ret,
                mode: AccessMode::Null,
                eager: None,
            });
        }
        if !task.parent_latch.is_null() {
            actions.push(Action::SatisfyDep {
                dest: task.parent_latch,
                slot: LATCH_DECR_SLOT,
                payload: NULL_GUID,
                mode: AccessMode::Null,
                eager: None,
            });
        }
        self.provider.remove(task.guid);
        self.run_actions(actions);
        Ok(())
    }

    // === Outbound plumbing ===

    fn send_request(&self, dest: Location, body: MessageBody, want_response: bool) {
        let msg_id = self.next_msg_id();
        let mut msg = PolicyMessage::request(self.me, dest, msg_id, body);
        msg.header.requires_response = want_response;
        if let Ok(frame) = encode(&mut msg) {
            self.give_outbound(PolicyMessageFrame { dest, msg_id, want_response, frame });
        }
    }

    /// All outbound traffic funnels through the COMM_GIVE handler.
    fn give_outbound(&self, frame: PolicyMessageFrame) {
        let mut give = PolicyMessage::request(
            self.me,
            self.me,
            self.next_msg_id(),
            MessageBody::CommGive { handle: Some(Box::new(frame)) },
        );
        if let Err(code) = self.handle_local(&mut give) {
            warn!(?code, "comm give failed");
        }
    }

    pub(crate) fn outbound_empty(&self) -> bool {
        self.comm_queue.is_empty()
    }

    // === Bootstrap and shutdown ===

    /// The blessed worker's one-time duty: pack argv into a datablock
    /// and launch the main EDT with it.
    pub(crate) fn bootstrap_main(&self) -> Result<(), RuntimeError> {
        let argv = ocr_core::pack_args(&self.args);

        let mut msg = PolicyMessage::request(
            self.me,
            self.me,
            self.next_msg_id(),
            MessageBody::DbCreate {
                guid: NULL_GUID,
                size: argv.len() as u64,
                single_assignment: false,
                hints: Hints::new(),
            },
        );
        self.handle_local(&mut msg)?;
        let MessageBody::DbCreate { guid: argv_db, .. } = msg.body else {
            return Err(RuntimeError::Inval);
        };
        if let Some(block) = self.provider.db(argv_db) {
            *block.payload_arc().write() = argv;
        }

        let mut msg = PolicyMessage::request(
            self.me,
            self.me,
            self.next_msg_id(),
            MessageBody::EdtTempCreate {
                guid: NULL_GUID,
                func: self.main_fn,
                paramc: 0,
                depc: 1,
            },
        );
        self.handle_local(&mut msg)?;
        let MessageBody::EdtTempCreate { guid: tpl, .. } = msg.body else {
            return Err(RuntimeError::Inval);
        };

        let mut msg = PolicyMessage::request(
            self.me,
            self.me,
            self.next_msg_id(),
            MessageBody::WorkCreate {
                guid: NULL_GUID,
                template: tpl,
                func: self.main_fn,
                paramc: 0,
                depc: 1,
                paramv: vec![],
                depv: None,
                hints: Hints::new(),
                output_event: false,
                out_event: NULL_GUID,
                finish: false,
                parent_latch: NULL_GUID,
            },
        );
        self.handle_local(&mut msg)?;
        let MessageBody::WorkCreate { guid: main_edt, .. } = msg.body else {
            return Err(RuntimeError::Inval);
        };

        let mut msg = PolicyMessage::request(
            self.me,
            self.me,
            self.next_msg_id(),
            MessageBody::DepAdd {
                source: argv_db,
                dest: main_edt,
                slot: 0,
                mode: AccessMode::Ro,
            },
        );
        self.handle_local(&mut msg)?;
        debug!(%argv_db, %main_edt, "blessed bootstrap complete");
        Ok(())
    }

    /// ocrShutdown: tear-down notification to every domain, self
    /// included (it loops back over the transport).
    pub(crate) fn shutdown_broadcast(&self, code: u64) {
        for loc in self.locations.clone() {
            self.send_request(
                loc,
                MessageBody::MgtRlNotify {
                    runlevel: ocr_core::Runlevel::ComputeOk,
                    phase: 0,
                    direction: RlDirection::TearDown,
                    error_code: code,
                },
                false,
            );
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
