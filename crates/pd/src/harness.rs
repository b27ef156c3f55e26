// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boots a whole run: N policy domains over the in-process channel
//! transport, runlevel-gated per domain, then the exit code.
//!
//! The runlevel controller owns every side effect of bring-up: the
//! transport endpoint binds at NETWORK_OK, the policy domain is built
//! at PD_OK, and the comm/compute worker threads spawn during
//! COMPUTE_OK. Tear-down is symmetric; the COMPUTE_OK down-phase joins
//! the worker threads, so it blocks until the USER_OK dance finishes.

use crate::config::RuntimeConfig;
use crate::functions::FnRegistry;
use crate::policy::PolicyDomain;
use crate::runlevel::{RlComponent, RunlevelController};
use crate::worker;
use ocr_comm::{ChannelEndpoint, ChannelHub};
use ocr_core::{Location, RlDirection, Runlevel, RuntimeError};
use ocr_wire::FnId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Everything one domain's components act on across the runlevel
/// sweep. Each slot is filled by the level that owns it.
struct DomainCell {
    me: Location,
    locations: Vec<Location>,
    blessed: bool,
    compute_workers: usize,
    functions: Arc<FnRegistry>,
    main_fn: FnId,
    args: Vec<String>,
    /// Bound at NETWORK_OK, consumed at PD_OK.
    endpoint: Mutex<Option<ChannelEndpoint>>,
    /// Built at PD_OK.
    pd: Mutex<Option<Arc<PolicyDomain>>>,
    /// Spawned at COMPUTE_OK bring-up, joined at COMPUTE_OK tear-down.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DomainCell {
    fn domain(&self) -> Result<Arc<PolicyDomain>, RuntimeError> {
        self.pd.lock().clone().ok_or(RuntimeError::Inval)
    }
}

/// Binds this domain's transport endpoint out of the shared hub.
struct CommPlatformComponent {
    cell: Arc<DomainCell>,
    hub: Arc<Mutex<ChannelHub>>,
}

impl RlComponent for CommPlatformComponent {
    fn name(&self) -> &'static str {
        "comm-platform"
    }

    fn switch_runlevel(
        &self,
        level: Runlevel,
        _phase: u64,
        dir: RlDirection,
    ) -> Result<(), RuntimeError> {
        if level == Runlevel::NetworkOk && dir == RlDirection::BringUp {
            let endpoint =
                self.hub.lock().endpoint(self.cell.me).ok_or(RuntimeError::Inval)?;
            *self.cell.endpoint.lock() = Some(endpoint);
            debug!(pd = %self.cell.me, "transport endpoint bound");
        }
        Ok(())
    }
}

/// Assembles the policy domain once the transport is up.
struct PolicyComponent {
    cell: Arc<DomainCell>,
}

impl RlComponent for PolicyComponent {
    fn name(&self) -> &'static str {
        "policy-domain"
    }

    fn switch_runlevel(
        &self,
        level: Runlevel,
        _phase: u64,
        dir: RlDirection,
    ) -> Result<(), RuntimeError> {
        if level == Runlevel::PdOk && dir == RlDirection::BringUp {
            let endpoint = self.cell.endpoint.lock().take().ok_or(RuntimeError::Inval)?;
            let pd = Arc::new(PolicyDomain::new(
                self.cell.me,
                self.cell.locations.clone(),
                self.cell.blessed,
                Box::new(endpoint),
                self.cell.compute_workers,
                Arc::clone(&self.cell.functions),
                self.cell.main_fn,
                self.cell.args.clone(),
            ));
            *self.cell.pd.lock() = Some(pd);
            debug!(pd = %self.cell.me, "policy domain assembled");
        }
        Ok(())
    }
}

/// The provider lives inside the domain; its phase confirms the domain
/// reached GUID_OK with a provider to mint from.
struct GuidComponent {
    cell: Arc<DomainCell>,
}

impl RlComponent for GuidComponent {
    fn name(&self) -> &'static str {
        "guid-provider"
    }

    fn switch_runlevel(
        &self,
        level: Runlevel,
        _phase: u64,
        dir: RlDirection,
    ) -> Result<(), RuntimeError> {
        if level == Runlevel::GuidOk && dir == RlDirection::BringUp {
            self.cell.domain()?;
        }
        Ok(())
    }
}

/// Scheduler readiness check ahead of the worker spawn in the same
/// level's walk.
struct SchedulerComponent {
    cell: Arc<DomainCell>,
}

impl RlComponent for SchedulerComponent {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    fn switch_runlevel(
        &self,
        level: Runlevel,
        _phase: u64,
        dir: RlDirection,
    ) -> Result<(), RuntimeError> {
        if level == Runlevel::ComputeOk && dir == RlDirection::BringUp {
            self.cell.domain()?;
        }
        Ok(())
    }
}

/// Spawns the comm/compute threads on COMPUTE_OK bring-up and joins
/// them on the way back down. The join blocks until USER_OK tear-down
/// releases the workers, which is what makes COMPUTE_OK tear-down a
/// real barrier; the worker convention declares two down-phases.
struct WorkerComponent {
    cell: Arc<DomainCell>,
}

impl RlComponent for WorkerComponent {
    fn name(&self) -> &'static str {
        "workers"
    }

    fn phase_count(&self, level: Runlevel, dir: RlDirection) -> u64 {
        if level == Runlevel::ComputeOk && dir == RlDirection::TearDown {
            2
        } else {
            1
        }
    }

    fn switch_runlevel(
        &self,
        level: Runlevel,
        phase: u64,
        dir: RlDirection,
    ) -> Result<(), RuntimeError> {
        if level != Runlevel::ComputeOk {
            return Ok(());
        }
        match (dir, phase) {
            (RlDirection::BringUp, 0) => {
                let pd = self.cell.domain()?;
                let mut handles = self.cell.workers.lock();
                let comm_pd = Arc::clone(&pd);
                handles.push(
                    thread::Builder::new()
                        .name(format!("{}-comm", pd.location()))
                        .spawn(move || worker::comm_loop(comm_pd))
                        .map_err(|_| RuntimeError::Fault)?,
                );
                for index in 0..self.cell.compute_workers {
                    let work_pd = Arc::clone(&pd);
                    handles.push(
                        thread::Builder::new()
                            .name(format!("{}-compute-{index}", pd.location()))
                            .spawn(move || worker::compute_loop(work_pd, index))
                            .map_err(|_| RuntimeError::Fault)?,
                    );
                }
                debug!(pd = %self.cell.me, count = handles.len(), "workers spawned");
                Ok(())
            }
            (RlDirection::TearDown, 0) => {
                let handles: Vec<JoinHandle<()>> =
                    self.cell.workers.lock().drain(..).collect();
                for handle in handles {
                    let _ = handle.join();
                }
                Ok(())
            }
            (RlDirection::TearDown, 1) => {
                debug!(pd = %self.cell.me, "workers joined");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Leaves first: transport, then the domain built on it, then the
/// domain-resident services, workers last.
fn components(cell: &Arc<DomainCell>, hub: &Arc<Mutex<ChannelHub>>) -> Vec<Arc<dyn RlComponent>> {
    vec![
        Arc::new(CommPlatformComponent { cell: Arc::clone(cell), hub: Arc::clone(hub) }),
        Arc::new(PolicyComponent { cell: Arc::clone(cell) }),
        Arc::new(GuidComponent { cell: Arc::clone(cell) }),
        Arc::new(SchedulerComponent { cell: Arc::clone(cell) }),
        Arc::new(WorkerComponent { cell: Arc::clone(cell) }),
    ]
}

pub struct Harness;

impl Harness {
    /// Run the program to completion and return the blessed domain's
    /// exit code. Location 0 is blessed; its first compute worker
    /// launches the main EDT during first USER_OK entry.
    pub fn boot(
        cfg: RuntimeConfig,
        functions: FnRegistry,
        main_fn: FnId,
    ) -> Result<u64, RuntimeError> {
        if cfg.pd_count == 0 || cfg.workers_per_pd == 0 {
            return Err(RuntimeError::Inval);
        }
        let functions = Arc::new(functions);
        let locations: Vec<Location> = (0..cfg.pd_count).map(Location).collect();
        let hub = Arc::new(Mutex::new(ChannelHub::new(&locations)));

        let mut domains = Vec::new();
        for loc in &locations {
            let cell = Arc::new(DomainCell {
                me: *loc,
                locations: locations.clone(),
                blessed: *loc == Location(0),
                compute_workers: cfg.workers_per_pd,
                functions: Arc::clone(&functions),
                main_fn,
                args: cfg.args.clone(),
                endpoint: Mutex::new(None),
                pd: Mutex::new(None),
                workers: Mutex::new(Vec::new()),
            });
            let controller = RunlevelController::new(components(&cell, &hub));
            controller.bring_up()?;
            domains.push((cell, controller));
        }

        // COMPUTE_OK tear-down joins each domain's workers, so this
        // returns only after every domain finished its USER_OK dance.
        for (cell, controller) in &domains {
            controller.tear_down()?;
            if let Some(pd) = cell.pd.lock().as_ref() {
                debug!(pd = %pd.location(), code = pd.run.exit_code(), "domain torn down");
            }
        }

        // Non-blessed domains report success after a clean tear-down;
        // the run's code is the blessed one's.
        let code = domains
            .first()
            .and_then(|(cell, _)| cell.pd.lock().as_ref().map(|pd| pd.run.exit_code()))
            .unwrap_or(0);
        info!(code, "run complete");
        Ok(code)
    }
}

#[cfg(test)]
#[path = "harness_tests.rs"]
mod tests;
