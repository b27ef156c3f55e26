// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide EDT function registry.
//!
//! Function pointers never travel between domains; templates carry a
//! [`FnId`] and every domain resolves it here. Id 0 is reserved for
//! the runtime's own request-processing EDT.

use crate::api::TaskContext;
use ocr_core::{Guid, NULL_GUID};
use ocr_wire::FnId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub type EdtFn = Arc<dyn Fn(&mut TaskContext<'_>) -> Guid + Send + Sync>;

/// The runtime EDT wrapping an incoming request: it just invokes
/// dispatch on the parked message.
pub const PROCESS_REQUEST_FN: FnId = FnId(0);

pub struct FnRegistry {
    fns: RwLock<HashMap<FnId, EdtFn>>,
    next: RwLock<u64>,
}

impl Default for FnRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FnRegistry {
    pub fn new() -> Self {
        let registry = Self { fns: RwLock::new(HashMap::new()), next: RwLock::new(1) };
        registry.fns.write().insert(
            PROCESS_REQUEST_FN,
            Arc::new(|ctx: &mut TaskContext<'_>| {
                ctx.pd().process_wrapped_request(ctx.edt_guid());
                NULL_GUID
            }) as EdtFn,
        );
        registry
    }

    /// Register a user EDT function; ids are dense and start at 1.
    pub fn register(&self, func: impl Fn(&mut TaskContext<'_>) -> Guid + Send + Sync + 'static) -> FnId {
        let mut next = self.next.write();
        let id = FnId(*next);
        *next += 1;
        self.fns.write().insert(id, Arc::new(func));
        id
    }

    pub fn get(&self, id: FnId) -> Option<EdtFn> {
        self.fns.read().get(&id).cloned()
    }
}

#[cfg(test)]
#[path = "functions_tests.rs"]
mod tests;
