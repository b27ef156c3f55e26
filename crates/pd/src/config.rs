// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration.
//!
//! The instantiated-graph end of configuration: how many policy
//! domains, how many compute workers each, and the program arguments
//! packed into the blessed EDT's argv datablock. Parsing whatever text
//! format produced these values is somebody else's concern.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of policy domains in the run.
    pub pd_count: u64,
    /// Compute workers per domain (the comm worker is extra).
    pub workers_per_pd: usize,
    /// Program arguments for `arg_count`/`arg_at` in the blessed EDT.
    pub args: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { pd_count: 1, workers_per_pd: 2, args: vec!["ocr".to_string()] }
    }
}

impl RuntimeConfig {
    pub fn with_pds(pd_count: u64) -> Self {
        Self { pd_count, ..Self::default() }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
