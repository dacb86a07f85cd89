// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory sink for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::sink::{QueryableSink, SinkError, SumQuery};
use async_trait::async_trait;
use errlog_core::SnapshotRow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded sink call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    EnsureExists,
    Append { rows: usize },
    QuerySum(SumQuery),
    RowCount,
}

#[derive(Default)]
struct FakeState {
    exists: bool,
    ensure_calls: u32,
    rows: Vec<SnapshotRow>,
    calls: Vec<SinkCall>,
    fail_appends: u32,
}

/// Fake sink that keeps rows in memory and can be told to fail
#[derive(Clone, Default)]
pub struct FakeSink {
    state: Arc<Mutex<FakeState>>,
    append_delay: Option<Duration>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every append sleep first, to hold a flush in flight
    pub fn with_append_delay(mut self, delay: Duration) -> Self {
        self.append_delay = Some(delay);
        self
    }

    /// Fail the next `count` appends with [`SinkError::Unavailable`]
    pub fn fail_next_appends(&self, count: u32) {
        self.lock().fail_appends = count;
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().calls.clone()
    }

    /// Every row appended so far
    pub fn rows(&self) -> Vec<SnapshotRow> {
        self.lock().rows.clone()
    }

    /// Whether any `ensure_exists` call has created the table
    pub fn exists(&self) -> bool {
        self.lock().exists
    }

    /// How many times `ensure_exists` was called
    pub fn ensure_calls(&self) -> u32 {
        self.lock().ensure_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl QueryableSink for FakeSink {
    async fn ensure_exists(&self) -> Result<(), SinkError> {
        let mut state = self.lock();
        state.calls.push(SinkCall::EnsureExists);
        state.ensure_calls += 1;
        state.exists = true;
        Ok(())
    }

    async fn append(&self, rows: &[SnapshotRow]) -> Result<(), SinkError> {
        self.lock().calls.push(SinkCall::Append { rows: rows.len() });

        if let Some(delay) = self.append_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.fail_appends > 0 {
            state.fail_appends -= 1;
            return Err(SinkError::Unavailable("injected failure".to_string()));
        }
        state.rows.extend_from_slice(rows);
        Ok(())
    }

    async fn query_sum(&self, query: &SumQuery) -> Result<u64, SinkError> {
        let mut state = self.lock();
        state.calls.push(SinkCall::QuerySum(*query));
        Ok(state
            .rows
            .iter()
            .filter(|row| query.matches(row))
            .map(|row| row.value)
            .sum())
    }

    async fn row_count(&self) -> Result<u64, SinkError> {
        let mut state = self.lock();
        state.calls.push(SinkCall::RowCount);
        Ok(state.rows.len() as u64)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
