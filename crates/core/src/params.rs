// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event creation parameters.

use serde::{Deserialize, Serialize};

/// The closed set of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Auto-destroys once satisfied and drained.
    Once,
    /// Extra satisfies are ignored.
    Idem,
    /// Extra satisfies are an error.
    Sticky,
    /// Counting event; fires when incr/decr balance reaches zero.
    Latch,
    /// Generational n-producer/m-consumer pipe.
    Channel,
    /// Fires after a declared number of satisfies, then self-destroys.
    Counted,
    /// All-reduce over per-PD contribution slots, generational.
    Collective,
}

/// Latch events fire when increments and decrements balance out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatchParams {
    /// Initial counter value. Zero means the first decrement fires.
    pub init_count: u64,
}

/// Channel events pair the i-th satisfy with the i-th registered
/// dependence, per generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// Maximum in-flight generations.
    pub max_gen: u64,
    /// Satisfactions per generation.
    pub nb_sat: u64,
    /// Dependences per generation.
    pub nb_deps: u64,
}

/// Collective (all-reduce) events gather per-PD contributions and
/// distribute the reduced value each generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveParams {
    /// Maximum in-flight generations.
    pub max_gen: u64,
    /// Total contributions per generation across all PDs.
    pub nb_contribs: u64,
    /// Contributions made from each PD.
    pub nb_contribs_pd: u64,
    /// Number of u64 data elements per contribution.
    pub nb_datum: u64,
}

/// Counted events self-destroy after a declared number of dependences
/// have consumed the satisfaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountedParams {
    pub nb_deps: u64,
}

/// Kind-specific creation parameters; `Plain` covers the kinds that
/// take none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventParams {
    Plain,
    Latch(LatchParams),
    Counted(CountedParams),
    Channel(ChannelParams),
    Collective(CollectiveParams),
}

impl Default for EventParams {
    fn default() -> Self {
        EventParams::Plain
    }
}
