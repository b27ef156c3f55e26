// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task-side API.
//!
//! Every EDT function receives a [`TaskContext`]: its parameters, its
//! resolved dependence slots, and the operations of the user API. Each
//! operation is a policy message through dispatch; calls that need an
//! answer from another domain park the worker on a strand.

use crate::policy::PolicyDomain;
use ocr_core::{
    AccessMode, EventKind, EventParams, Guid, GuidKind, HintKey, Hints, Location, RuntimeError,
    NULL_GUID,
};
use ocr_engine::EdtTask;
use ocr_wire::{FnId, MessageBody, PolicyMessage};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;
use tracing::error;

/// One resolved dependence of the running EDT.
pub struct DepSlot {
    pub guid: Guid,
    pub mode: AccessMode,
    data: Option<Arc<RwLock<Vec<u8>>>>,
}

impl DepSlot {
    /// Read access to the datablock bytes, when this slot carries one.
    pub fn data(&self) -> Option<RwLockReadGuard<'_, Vec<u8>>> {
        self.data.as_ref().map(|d| d.read())
    }

    /// Write access; modes are the caller's promise, not a fence.
    pub fn data_mut(&self) -> Option<RwLockWriteGuard<'_, Vec<u8>>> {
        self.data.as_ref().map(|d| d.write())
    }

    /// Decode the slot as little-endian u64 words.
    pub fn as_u64s(&self) -> Vec<u64> {
        match self.data() {
            Some(bytes) => bytes
                .chunks_exact(8)
                .map(|c| u64::from_le_bytes(c.try_into().unwrap_or([0; 8])))
                .collect(),
            None => Vec::new(),
        }
    }
}

pub struct TaskContext<'a> {
    pd: &'a PolicyDomain,
    task: &'a Arc<EdtTask>,
    deps: Vec<DepSlot>,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        pd: &'a PolicyDomain,
        task: &'a Arc<EdtTask>,
        deps: Vec<(Guid, AccessMode, Option<Arc<RwLock<Vec<u8>>>>)>,
    ) -> Self {
        let deps = deps
            .into_iter()
            .map(|(guid, mode, data)| DepSlot { guid, mode, data })
            .collect();
        Self { pd, task, deps }
    }

    pub(crate) fn pd(&self) -> &PolicyDomain {
        self.pd
    }

    // === Identity ===

    pub fn edt_guid(&self) -> Guid {
        self.task.guid
    }

    pub fn output_event(&self) -> Guid {
        self.task.output_event
    }

    pub fn paramv(&self) -> &[u64] {
        &self.task.paramv
    }

    pub fn depv(&self) -> &[DepSlot] {
        &self.deps
    }

    // === Call plumbing ===

    fn request(&self, dest: Location, body: MessageBody) -> PolicyMessage {
        PolicyMessage::request(self.pd.me, dest, self.pd.next_msg_id(), body)
    }

    fn call(&self, mut msg: PolicyMessage) -> Result<PolicyMessage, RuntimeError> {
        self.pd.call_and_wait(&mut msg)?;
        Ok(msg)
    }

    // === Events ===

    pub fn event_create(&self, kind: EventKind) -> Result<Guid, RuntimeError> {
        self.event_create_params(kind, EventParams::Plain)
    }

    pub fn event_create_params(
        &self,
        kind: EventKind,
        params: EventParams,
    ) -> Result<Guid, RuntimeError> {
        let msg = self.request(
            self.pd.me,
            MessageBody::EvtCreate { guid: NULL_GUID, kind, params },
        );
        match self.call(msg)?.body {
            MessageBody::EvtCreate { guid, .. } => Ok(guid),
            _ => Err(RuntimeError::Inval),
        }
    }

    pub fn event_destroy(&self, event: Guid) -> Result<(), RuntimeError> {
        let msg = self.request(event.home(), MessageBody::EvtDestroy { guid: event });
        self.call(msg).map(|_| ())
    }

    pub fn event_satisfy(&self, event: Guid, payload: Guid) -> Result<(), RuntimeError> {
        self.event_satisfy_slot(event, payload, 0)
    }

    pub fn event_satisfy_slot(
        &self,
        event: Guid,
        payload: Guid,
        slot: u64,
    ) -> Result<(), RuntimeError> {
        let msg = self.request(
            event.home(),
            MessageBody::EvtSatisfy {
                guid: event,
                slot,
                payload,
                datum: None,
                eager_payload: self.pd_eager_capture(event, payload),
            },
        );
        self.call(msg).map(|_| ())
    }

    /// Contribute to a collective event's slot for the current
    /// generation.
    pub fn collective_satisfy_slot(
        &self,
        event: Guid,
        datum: &[u64],
        slot: u64,
    ) -> Result<(), RuntimeError> {
        let msg = self.request(
            event.home(),
            MessageBody::EvtSatisfy {
                guid: event,
                slot,
                payload: NULL_GUID,
                datum: Some(datum.to_vec()),
                eager_payload: None,
            },
        );
        self.call(msg).map(|_| ())
    }

    /// Bundle a local eager datablock with a satisfy that leaves the
    /// domain.
    fn pd_eager_capture(&self, event: Guid, payload: Guid) -> Option<Vec<u8>> {
        if event.home() == self.pd.me || payload.is_null() {
            return None;
        }
        let block = self.pd.provider.db(payload)?;
        if !block.is_eager() {
            return None;
        }
        block.note_eager_clone(event.home());
        Some(block.payload_arc().read().clone())
    }

    // === Dependences ===

    pub fn add_dependence(
        &self,
        source: Guid,
        dest: Guid,
        slot: u64,
        mode: AccessMode,
    ) -> Result<(), RuntimeError> {
        let dest_pd = if source.is_null() { self.pd.me } else { source.home() };
        let msg = self.request(dest_pd, MessageBody::DepAdd { source, dest, slot, mode });
        self.call(msg).map(|_| ())
    }

    // === Datablocks ===

    /// Create a datablock on this domain and check in as its first
    /// user; the returned bytes stay valid until [`Self::db_release`].
    pub fn db_create(
        &self,
        size: u64,
        hints: &Hints,
    ) -> Result<(Guid, Arc<RwLock<Vec<u8>>>), RuntimeError> {
        let msg = self.request(
            self.pd.me,
            MessageBody::DbCreate {
                guid: NULL_GUID,
                size,
                single_assignment: false,
                hints: hints.clone(),
            },
        );
        let guid = match self.call(msg)?.body {
            MessageBody::DbCreate { guid, .. } => guid,
            _ => return Err(RuntimeError::Inval),
        };
        let block = self.pd.provider.db(guid).ok_or(RuntimeError::Inval)?;
        match block.acquire_local(self.task.guid, 0, AccessMode::Rw)? {
            (ocr_engine::LocalAcquire::Granted { data }, actions) => {
                self.pd.run_actions(actions);
                Ok((guid, data))
            }
            _ => Err(RuntimeError::Busy),
        }
    }

    pub fn db_release(&self, db: Guid) -> Result<(), RuntimeError> {
        let dest = if self.pd.provider.db(db).is_some() { self.pd.me } else { db.home() };
        let msg = self.request(
            dest,
            MessageBody::DbRelease { guid: db, edt: self.task.guid, payload: None },
        );
        self.call(msg).map(|_| ())
    }

    pub fn db_destroy(&self, db: Guid) -> Result<(), RuntimeError> {
        let dest = if self.pd.provider.db(db).is_some() { self.pd.me } else { db.home() };
        let msg = self.request(dest, MessageBody::DbDestroy { guid: db });
        self.call(msg).map(|_| ())
    }

    /// Byte size of a datablock; answered from a local clone when one
    /// exists, otherwise by the home domain.
    pub fn db_get_size(&self, db: Guid) -> Result<u64, RuntimeError> {
        if let Some(block) = self.pd.provider.db(db) {
            if let Some(size) = block.size() {
                return Ok(size);
            }
        }
        let msg = self.request(db.home(), MessageBody::DbGetSize { guid: db, size: 0 });
        match self.call(msg)?.body {
            MessageBody::DbGetSize { size, .. } => Ok(size),
            _ => Err(RuntimeError::Inval),
        }
    }

    // === EDTs ===

    pub fn edt_template_create(
        &self,
        func: FnId,
        paramc: u64,
        depc: u64,
    ) -> Result<Guid, RuntimeError> {
        let msg = self.request(
            self.pd.me,
            MessageBody::EdtTempCreate { guid: NULL_GUID, func, paramc, depc },
        );
        match self.call(msg)?.body {
            MessageBody::EdtTempCreate { guid, .. } => Ok(guid),
            _ => Err(RuntimeError::Inval),
        }
    }

    pub fn edt_template_destroy(&self, template: Guid) -> Result<(), RuntimeError> {
        let msg = self.request(template.home(), MessageBody::EdtTempDestroy { guid: template });
        self.call(msg).map(|_| ())
    }

    /// Create an EDT from a locally known template. Placement follows
    /// the hints; the returned pair is (EDT, output event or NULL).
    pub fn edt_create(
        &self,
        template: Guid,
        paramv: &[u64],
        hints: &Hints,
        output_event: bool,
    ) -> Result<(Guid, Guid), RuntimeError> {
        self.edt_create_ext(template, paramv, None, hints, output_event, false)
    }

    pub fn edt_create_ext(
        &self,
        template: Guid,
        paramv: &[u64],
        depv: Option<Vec<Guid>>,
        hints: &Hints,
        output_event: bool,
        finish: bool,
    ) -> Result<(Guid, Guid), RuntimeError> {
        let tpl = self.pd.provider.template(template).ok_or(RuntimeError::Inval)?;
        // The child joins the innermost finish scope.
        let parent_latch = if !self.task.finish_latch.is_null() {
            self.task.finish_latch
        } else {
            self.task.parent_latch
        };
        if !parent_latch.is_null() {
            self.event_satisfy_slot(
                parent_latch,
                NULL_GUID,
                ocr_engine::event::LATCH_INCR_SLOT,
            )?;
        }
        let msg = self.request(
            self.pd.me,
            MessageBody::WorkCreate {
                guid: NULL_GUID,
                template,
                func: tpl.func,
                paramc: tpl.paramc,
                depc: tpl.depc,
                paramv: paramv.to_vec(),
                depv,
                hints: hints.clone(),
                output_event,
                out_event: NULL_GUID,
                finish,
                parent_latch,
            },
        );
        match self.call(msg)?.body {
            MessageBody::WorkCreate { guid, out_event, .. } => Ok((guid, out_event)),
            _ => Err(RuntimeError::Inval),
        }
    }

    /// Destroy an EDT that has not started running.
    pub fn edt_destroy(&self, edt: Guid) -> Result<(), RuntimeError> {
        let msg = self.request(edt.home(), MessageBody::WorkDestroy { guid: edt });
        self.call(msg).map(|_| ())
    }

    // === Affinity ===

    pub fn affinity_count(&self) -> u64 {
        self.pd.locations.len() as u64
    }

    /// Affinity handles for every policy domain, in stable order.
    pub fn affinity_get(&self) -> Vec<Guid> {
        self.pd
            .locations
            .iter()
            .map(|loc| Guid::pack(GuidKind::Affinity, *loc, 0))
            .collect()
    }

    pub fn current_affinity(&self) -> Guid {
        Guid::pack(GuidKind::Affinity, self.pd.me, 0)
    }

    pub fn affinity_to_hint_value(&self, affinity: Guid) -> u64 {
        affinity.as_u64()
    }

    /// Hints preloaded with an EDT affinity.
    pub fn affinity_hints(&self, affinity: Guid) -> Hints {
        let mut hints = Hints::new();
        hints.set(HintKey::EdtAffinity, affinity.as_u64());
        hints
    }

    // === Run control ===

    /// Graceful end of the run; `code` becomes the blessed domain's
    /// exit code.
    pub fn shutdown(&self, code: u64) {
        self.pd.shutdown_broadcast(code);
    }

    /// Unrecoverable: tears the whole process down.
    pub fn abort(&self, code: u64) -> ! {
        error!(code, "user abort");
        std::process::exit(code as i32)
    }
}
