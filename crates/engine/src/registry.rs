// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GUID provider: mints handles and maps them to local metadata.
//!
//! The map is bucketed so unrelated lookups do not contend. An entry
//! exists for every entity homed here plus every remote entity with a
//! live local clone; absence of an entry for a remotely homed GUID
//! means "talk to the home PD".

use crate::db::DataBlock;
use crate::edt::{EdtTask, EdtTemplate};
use crate::event::RuntimeEvent;
use ocr_core::{Guid, GuidKind, Location};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const BUCKETS: usize = 16;

#[derive(Clone)]
pub enum Metadata {
    Db(Arc<DataBlock>),
    Event(Arc<RuntimeEvent>),
    Edt(Arc<EdtTask>),
    Template(Arc<EdtTemplate>),
}

pub struct GuidProvider {
    me: Location,
    counter: AtomicU64,
    buckets: Vec<Mutex<HashMap<Guid, Metadata>>>,
}

impl GuidProvider {
    pub fn new(me: Location) -> Self {
        Self {
            me,
            // Counter zero is reserved so no handle collides with NULL.
            counter: AtomicU64::new(1),
            buckets: (0..BUCKETS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    pub fn location(&self) -> Location {
        self.me
    }

    /// Mint a fresh handle homed here. Never reused within a run.
    pub fn mint(&self, kind: GuidKind) -> Guid {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        Guid::pack(kind, self.me, counter)
    }

    /// Reserve `count` consecutive handles, returning the first.
    pub fn reserve(&self, kind: GuidKind, count: u64) -> Guid {
        let start = self.counter.fetch_add(count, Ordering::Relaxed);
        Guid::pack(kind, self.me, start)
    }

    fn bucket(&self, guid: Guid) -> &Mutex<HashMap<Guid, Metadata>> {
        let idx = (guid.as_u64() as usize) % BUCKETS;
        &self.buckets[idx]
    }

    pub fn insert(&self, guid: Guid, metadata: Metadata) {
        self.bucket(guid).lock().insert(guid, metadata);
    }

    /// Insert unless present; returns the surviving entry. Keeps
    /// concurrent shell creation from splitting waiters across two
    /// instances.
    pub fn insert_if_absent(&self, guid: Guid, metadata: Metadata) -> Metadata {
        self.bucket(guid).lock().entry(guid).or_insert(metadata).clone()
    }

    pub fn lookup(&self, guid: Guid) -> Option<Metadata> {
        self.bucket(guid).lock().get(&guid).cloned()
    }

    pub fn remove(&self, guid: Guid) -> Option<Metadata> {
        self.bucket(guid).lock().remove(&guid)
    }

    pub fn db(&self, guid: Guid) -> Option<Arc<DataBlock>> {
        match self.lookup(guid) {
            Some(Metadata::Db(db)) => Some(db),
            _ => None,
        }
    }

    pub fn event(&self, guid: Guid) -> Option<Arc<RuntimeEvent>> {
        match self.lookup(guid) {
            Some(Metadata::Event(ev)) => Some(ev),
            _ => None,
        }
    }

    pub fn edt(&self, guid: Guid) -> Option<Arc<EdtTask>> {
        match self.lookup(guid) {
            Some(Metadata::Edt(edt)) => Some(edt),
            _ => None,
        }
    }

    pub fn template(&self, guid: Guid) -> Option<Arc<EdtTemplate>> {
        match self.lookup(guid) {
            Some(Metadata::Template(t)) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
