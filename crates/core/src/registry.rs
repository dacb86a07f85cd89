// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running occurrence counters keyed by error code
//!
//! Every code owns an independent pair of atomics: the running `total` and the
//! total that was last published by a flush. Counters are sharded in a
//! concurrent map so unrelated codes never contend on a shared lock, and an
//! increment never waits on a flush.

use crate::code::ErrorCode;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter state for one code
#[derive(Debug, Default)]
struct CounterEntry {
    total: AtomicU64,
    flushed: AtomicU64,
}

impl CounterEntry {
    fn pending(&self) -> (u64, u64) {
        // Read the flushed mark first so the delta can never go "negative"
        // relative to a mark that was advanced after the total was read.
        let flushed = self.flushed.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire);
        (flushed, total)
    }
}

/// Unflushed occurrences for one code, observed at a single instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDelta {
    pub code: ErrorCode,
    /// Flushed mark at observation time
    pub base: u64,
    /// Running total at observation time
    pub observed: u64,
}

impl PendingDelta {
    /// Occurrences between `base` and `observed`; wraps at `u64::MAX`
    pub fn delta(&self) -> u64 {
        self.observed.wrapping_sub(self.base)
    }
}

/// Point-in-time view of one counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterView {
    pub code: ErrorCode,
    pub total: u64,
    pub last_flushed: u64,
}

/// Process-scoped registry of error counters
#[derive(Debug, Default)]
pub struct ErrorRegistry {
    counters: DashMap<ErrorCode, CounterEntry>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `code`
    pub fn increment(&self, code: ErrorCode) {
        self.increment_by(code, 1);
    }

    /// Record `count` occurrences of `code`
    pub fn increment_by(&self, code: ErrorCode, count: u64) {
        // Fast path: shared shard lock only
        if let Some(entry) = self.counters.get(&code) {
            entry.total.fetch_add(count, Ordering::AcqRel);
            return;
        }
        self.counters
            .entry(code)
            .or_default()
            .total
            .fetch_add(count, Ordering::AcqRel);
    }

    /// Current running total for `code` (0 if never seen)
    pub fn total(&self, code: ErrorCode) -> u64 {
        self.counters
            .get(&code)
            .map(|e| e.total.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Read the unflushed delta for `code` and mark it flushed in one step
    ///
    /// The caller takes ownership of the delta. A two-phase flush that
    /// observed the same occurrences before this call will find its marks
    /// stale and report them from [`ErrorRegistry::mark_flushed`].
    pub fn read_and_mark_flushed(&self, code: ErrorCode) -> u64 {
        let Some(entry) = self.counters.get(&code) else {
            return 0;
        };
        loop {
            let (base, observed) = entry.pending();
            if entry
                .flushed
                .compare_exchange(base, observed, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return observed.wrapping_sub(base);
            }
        }
    }

    /// Observe every code with a nonzero unflushed delta, ordered by code
    ///
    /// Nothing is marked; call [`ErrorRegistry::mark_flushed`] once the
    /// deltas are durably published.
    pub fn pending(&self) -> Vec<PendingDelta> {
        let mut pending: Vec<PendingDelta> = self
            .counters
            .iter()
            .filter_map(|entry| {
                let (base, observed) = entry.value().pending();
                (base != observed).then_some(PendingDelta {
                    code: *entry.key(),
                    base,
                    observed,
                })
            })
            .collect();
        pending.sort_by_key(|p| p.code);
        pending
    }

    /// Advance flushed marks to the observed totals
    ///
    /// A mark only moves if it still equals the `base` it was observed at, so
    /// a stale set of deltas can never rewind or double-apply a mark. Returns
    /// how many marks had already moved and were left alone.
    pub fn mark_flushed(&self, deltas: &[PendingDelta]) -> usize {
        deltas
            .iter()
            .filter(|delta| {
                self.counters.get(&delta.code).map_or(true, |entry| {
                    entry
                        .flushed
                        .compare_exchange(
                            delta.base,
                            delta.observed,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_err()
                })
            })
            .count()
    }

    /// Number of codes with unflushed occurrences
    pub fn pending_codes(&self) -> usize {
        self.counters
            .iter()
            .filter(|e| {
                let (base, observed) = e.value().pending();
                base != observed
            })
            .count()
    }

    /// Live view of all counters, ordered by code
    pub fn entries(&self) -> Vec<CounterView> {
        let mut views: Vec<CounterView> = self
            .counters
            .iter()
            .map(|entry| {
                let (last_flushed, total) = entry.value().pending();
                CounterView {
                    code: *entry.key(),
                    total,
                    last_flushed,
                }
            })
            .collect();
        views.sort_by_key(|v| v.code);
        views
    }

    /// Number of distinct codes seen
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
