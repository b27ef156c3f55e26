// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! EDT templates and instances.
//!
//! An instance collects satisfactions slot by slot, acquires its
//! datablock dependences, and only then reaches the workpiles. The
//! function itself is an id into the process-wide registry; execution
//! is the compute worker's business.

use crate::action::Action;
use ocr_core::{AccessMode, Guid, GuidKind, RuntimeError, NULL_GUID};
use ocr_wire::FnId;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::trace;

pub struct EdtTemplate {
    pub guid: Guid,
    pub func: FnId,
    pub paramc: u64,
    pub depc: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdtState {
    /// Slots still unsatisfied or unacquired.
    Uninitialized,
    /// Parked on a workpile.
    Ready,
    Running,
    Done,
}

/// One dependence slot.
pub struct Slot {
    pub mode: AccessMode,
    pub satisfied: bool,
    pub payload: Guid,
    /// Backing bytes once the acquire granted (datablock deps only).
    pub data: Option<Arc<RwLock<Vec<u8>>>>,
}

struct TaskInner {
    state: EdtState,
    slots: Vec<Slot>,
    unsatisfied: u64,
    pending_acquires: u64,
}

pub struct EdtTask {
    pub guid: Guid,
    pub func: FnId,
    pub paramv: Vec<u64>,
    pub output_event: Guid,
    /// Latch of the finish scope this task opens (finish EDTs only).
    pub finish_latch: Guid,
    /// Latch of the enclosing finish scope, decremented on completion.
    pub parent_latch: Guid,
    inner: Mutex<TaskInner>,
}

impl EdtTask {
    /// Returned actions are non-empty only for a dependence-free task,
    /// which is ready on the spot.
    pub fn new(
        guid: Guid,
        template: &EdtTemplate,
        paramv: Vec<u64>,
        dep_modes: Vec<AccessMode>,
        output_event: Guid,
        finish_latch: Guid,
        parent_latch: Guid,
    ) -> Result<(Arc<Self>, Vec<Action>), RuntimeError> {
        if paramv.len() as u64 != template.paramc {
            return Err(RuntimeError::Inval);
        }
        if dep_modes.len() as u64 != template.depc {
            return Err(RuntimeError::Inval);
        }
        let slots: Vec<Slot> = dep_modes
            .into_iter()
            .map(|mode| Slot { mode, satisfied: false, payload: NULL_GUID, data: None })
            .collect();
        let unsatisfied = slots.len() as u64;
        let task = Arc::new(Self {
            guid,
            func: template.func,
            paramv,
            output_event,
            finish_latch,
            parent_latch,
            inner: Mutex::new(TaskInner {
                state: EdtState::Uninitialized,
                slots,
                unsatisfied,
                pending_acquires: 0,
            }),
        });
        let mut actions = Vec::new();
        if unsatisfied == 0 {
            let mut inner = task.inner.lock();
            task.begin_acquires(&mut inner, &mut actions);
        }
        Ok((task, actions))
    }

    pub fn state(&self) -> EdtState {
        self.inner.lock().state
    }

    pub fn depc(&self) -> u64 {
        self.inner.lock().slots.len() as u64
    }

    /// Satisfy one dependence slot with the access mode it was
    /// registered under. When the last slot lands, the returned
    /// actions start the acquire round (or go straight to ready when
    /// no datablocks are involved).
    pub fn satisfy_slot(
        &self,
        slot: u64,
        payload: Guid,
        mode: AccessMode,
    ) -> Result<Vec<Action>, RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        let idx = slot as usize;
        let entry = inner.slots.get_mut(idx).ok_or(RuntimeError::Inval)?;
        if entry.satisfied {
            return Err(RuntimeError::Perm);
        }
        entry.satisfied = true;
        entry.payload = payload;
        entry.mode = mode;
        inner.unsatisfied = inner.unsatisfied.checked_sub(1).ok_or(RuntimeError::Inval)?;
        trace!(edt = %self.guid, slot, remaining = inner.unsatisfied, "slot satisfied");
        if inner.unsatisfied == 0 {
            self.begin_acquires(&mut inner, &mut actions);
        }
        Ok(actions)
    }

    fn begin_acquires(&self, inner: &mut TaskInner, actions: &mut Vec<Action>) {
        let mut pending = 0;
        for (idx, slot) in inner.slots.iter().enumerate() {
            if slot.mode != AccessMode::Null
                && !slot.payload.is_null()
                && slot.payload.kind() == GuidKind::Db
            {
                pending += 1;
                actions.push(Action::AcquireSlot {
                    db: slot.payload,
                    edt: self.guid,
                    slot: idx as u64,
                    mode: slot.mode,
                });
            }
        }
        inner.pending_acquires = pending;
        if pending == 0 {
            inner.state = EdtState::Ready;
            actions.push(Action::EdtReady(self.guid));
        }
    }

    /// An acquire granted (synchronously or from a drain). The last
    /// one in flips the task to ready.
    pub fn slot_acquired(
        &self,
        slot: u64,
        data: Arc<RwLock<Vec<u8>>>,
    ) -> Result<Vec<Action>, RuntimeError> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();
        let entry = inner.slots.get_mut(slot as usize).ok_or(RuntimeError::Inval)?;
        entry.data = Some(data);
        inner.pending_acquires =
            inner.pending_acquires.checked_sub(1).ok_or(RuntimeError::Inval)?;
        if inner.pending_acquires == 0 {
            inner.state = EdtState::Ready;
            actions.push(Action::EdtReady(self.guid));
        }
        Ok(actions)
    }

    /// Snapshot the dependence vector for execution and mark running.
    /// Runs at most once per creation.
    pub fn start(&self) -> Result<Vec<(Guid, AccessMode, Option<Arc<RwLock<Vec<u8>>>>)>, RuntimeError>
    {
        let mut inner = self.inner.lock();
        if inner.state != EdtState::Ready {
            return Err(RuntimeError::Perm);
        }
        inner.state = EdtState::Running;
        Ok(inner
            .slots
            .iter()
            .map(|s| (s.payload, s.mode, s.data.clone()))
            .collect())
    }

    /// The function returned. Datablock releases and output-event
    /// satisfaction are the policy domain's follow-up; this just
    /// closes the state machine.
    pub fn finish(&self) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock();
        if inner.state != EdtState::Running {
            return Err(RuntimeError::Perm);
        }
        inner.state = EdtState::Done;
        Ok(())
    }

    /// Datablock slots that were acquired and need releasing.
    pub fn acquired_dbs(&self) -> Vec<Guid> {
        self.inner
            .lock()
            .slots
            .iter()
            .filter(|s| s.data.is_some())
            .map(|s| s.payload)
            .collect()
    }
}

#[cfg(test)]
#[path = "edt_tests.rs"]
mod tests;
