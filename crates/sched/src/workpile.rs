// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker work deques with randomized stealing.
//!
//! The owner pushes and pops at the tail; thieves steal from the head.
//! Victim order is reshuffled on every steal attempt so no worker is
//! systematically favored.

use ocr_core::Guid;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::VecDeque;

struct Workpile {
    deque: Mutex<VecDeque<Guid>>,
}

impl Workpile {
    fn new() -> Self {
        Self { deque: Mutex::new(VecDeque::new()) }
    }

    fn push(&self, edt: Guid) {
        self.deque.lock().push_back(edt);
    }

    fn pop(&self) -> Option<Guid> {
        self.deque.lock().pop_back()
    }

    fn steal(&self) -> Option<Guid> {
        self.deque.lock().pop_front()
    }
}

/// All workpiles of one policy domain, one per compute worker.
pub struct WorkpileSet {
    piles: Vec<Workpile>,
}

impl WorkpileSet {
    pub fn new(workers: usize) -> Self {
        Self { piles: (0..workers).map(|_| Workpile::new()).collect() }
    }

    pub fn worker_count(&self) -> usize {
        self.piles.len()
    }

    /// Park a ready EDT on `worker`'s deque.
    pub fn push(&self, worker: usize, edt: Guid) {
        if let Some(pile) = self.piles.get(worker) {
            pile.push(edt);
        }
    }

    /// Owner pop, then randomized steal sweep over the other piles.
    pub fn take(&self, worker: usize) -> Option<Guid> {
        if let Some(pile) = self.piles.get(worker) {
            if let Some(edt) = pile.pop() {
                return Some(edt);
            }
        }
        let mut victims: Vec<usize> =
            (0..self.piles.len()).filter(|&v| v != worker).collect();
        victims.shuffle(&mut rand::thread_rng());
        for victim in victims {
            if let Some(edt) = self.piles[victim].steal() {
                return Some(edt);
            }
        }
        None
    }

    /// Total parked EDTs across all piles.
    pub fn backlog(&self) -> usize {
        self.piles.iter().map(|p| p.deque.lock().len()).sum()
    }
}

#[cfg(test)]
#[path = "workpile_tests.rs"]
mod tests;
