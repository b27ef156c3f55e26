// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runlevel sequencing and the USER_OK run state.
//!
//! Bring-up walks the levels leaves-first, tear-down roots-first;
//! every component acknowledges every phase of every level before the
//! domain advances. The sequencer is synchronous, which is the
//! barrier. USER_OK itself is driven by the workers through
//! [`RunState`]: compute quiesces first, comm drains second.

use ocr_core::{RlDirection, Runlevel, RuntimeError, UserPhase};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// A component participating in runlevel transitions. Phase counts are
/// declared up front (during CONFIG_PARSE in spirit); most components
/// need exactly one phase per level.
pub trait RlComponent: Send + Sync {
    fn name(&self) -> &'static str;

    fn phase_count(&self, _level: Runlevel, _dir: RlDirection) -> u64 {
        1
    }

    fn switch_runlevel(
        &self,
        level: Runlevel,
        phase: u64,
        dir: RlDirection,
    ) -> Result<(), RuntimeError>;
}

/// Drives every component through the ordered levels. Components are
/// held leaves-first; tear-down walks them in reverse.
pub struct RunlevelController {
    components: Vec<Arc<dyn RlComponent>>,
    current: Mutex<(Runlevel, RlDirection)>,
}

impl RunlevelController {
    pub fn new(components: Vec<Arc<dyn RlComponent>>) -> Self {
        Self {
            components,
            current: Mutex::new((Runlevel::ConfigParse, RlDirection::BringUp)),
        }
    }

    pub fn current(&self) -> Runlevel {
        self.current.lock().0
    }

    fn run_level(&self, level: Runlevel, dir: RlDirection) -> Result<(), RuntimeError> {
        let phases = self
            .components
            .iter()
            .map(|c| c.phase_count(level, dir))
            .max()
            .unwrap_or(1);
        for phase in 0..phases {
            let walk: Box<dyn Iterator<Item = &Arc<dyn RlComponent>>> = match dir {
                RlDirection::BringUp => Box::new(self.components.iter()),
                RlDirection::TearDown => Box::new(self.components.iter().rev()),
            };
            for component in walk {
                if phase < component.phase_count(level, dir) {
                    component.switch_runlevel(level, phase, dir)?;
                    debug!(component = component.name(), ?level, phase, ?dir, "phase acknowledged");
                }
            }
            // Synchronous sweep: every component has acknowledged this
            // phase before the next begins.
        }
        *self.current.lock() = (level, dir);
        Ok(())
    }

    /// CONFIG_PARSE through USER_OK, in order.
    pub fn bring_up(&self) -> Result<(), RuntimeError> {
        for level in Runlevel::ALL {
            self.run_level(level, RlDirection::BringUp)?;
        }
        info!("bring-up complete");
        Ok(())
    }

    /// COMPUTE_OK back down to CONFIG_PARSE. USER_OK tear-down happens
    /// beforehand, inside the worker loops.
    pub fn tear_down(&self) -> Result<(), RuntimeError> {
        for level in Runlevel::ALL.iter().rev() {
            if *level == Runlevel::UserOk {
                continue;
            }
            self.run_level(*level, RlDirection::TearDown)?;
        }
        info!("tear-down complete");
        Ok(())
    }
}

/// Shared USER_OK state of one policy domain.
pub struct RunState {
    phase: Mutex<UserPhase>,
    cv: Condvar,
    exit_code: AtomicU64,
    compute_workers: usize,
    quiesced: AtomicUsize,
}

impl RunState {
    pub fn new(compute_workers: usize) -> Self {
        Self {
            phase: Mutex::new(UserPhase::Run),
            cv: Condvar::new(),
            exit_code: AtomicU64::new(0),
            compute_workers,
            quiesced: AtomicUsize::new(0),
        }
    }

    pub fn phase(&self) -> UserPhase {
        *self.phase.lock()
    }

    pub fn exit_code(&self) -> u64 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// Start USER_OK tear-down: compute workers stop picking EDTs.
    pub fn request_shutdown(&self, code: u64) {
        let mut phase = self.phase.lock();
        if *phase == UserPhase::Run {
            self.exit_code.store(code, Ordering::SeqCst);
            *phase = UserPhase::CompQuiesce;
            info!(code, "entering compute quiesce");
            self.cv.notify_all();
        }
    }

    /// A compute worker reached its quiesce point.
    pub fn note_compute_quiesced(&self) {
        self.quiesced.fetch_add(1, Ordering::SeqCst);
    }

    pub fn all_compute_quiesced(&self) -> bool {
        self.quiesced.load(Ordering::SeqCst) >= self.compute_workers
    }

    /// Comm worker advances once its side of the dance is done.
    pub fn advance(&self, to: UserPhase) {
        let mut phase = self.phase.lock();
        if *phase < to {
            *phase = to;
            self.cv.notify_all();
        }
    }

    /// Park until tear-down completes.
    pub fn wait_done(&self) {
        let mut phase = self.phase.lock();
        while *phase != UserPhase::Done {
            self.cv.wait(&mut phase);
        }
    }
}

#[cfg(test)]
#[path = "runlevel_tests.rs"]
mod tests;
