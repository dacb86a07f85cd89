// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flush coordination
//!
//! At most one flush cycle runs at a time. A cycle lazily creates the table,
//! snapshots the registry, appends the rows as one batch, and only then marks
//! the captured deltas as flushed.
//!
//! Explicit requests queue behind an in-flight cycle and then run their own,
//! so everything that happened before the request is published when it
//! returns. Timer ticks that find a cycle in flight are dropped.

use crate::error::FlushError;
use chrono::{DateTime, Utc};
use errlog_core::{Clock, ErrorRegistry, SnapshotBuilder};
use errlog_storage::QueryableSink;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Whether a cycle is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPhase {
    Idle,
    Flushing,
}

/// Outcome of one successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Rows appended (one per code with new occurrences)
    pub rows: usize,
    /// Occurrences accounted for across all rows
    pub occurrences: u64,
    pub taken_at: DateTime<Utc>,
}

/// Running totals across cycles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub flushes_completed: u64,
    pub flushes_failed: u64,
    pub rows_written: u64,
    pub last_flush: Option<DateTime<Utc>>,
}

/// Drives snapshot-and-publish cycles against a sink
pub struct FlushCoordinator<S, C> {
    registry: Arc<ErrorRegistry>,
    sink: S,
    clock: C,
    gate: tokio::sync::Mutex<()>,
    flushing: AtomicBool,
    stats: Mutex<FlushStats>,
}

impl<S, C> FlushCoordinator<S, C>
where
    S: QueryableSink,
    C: Clock,
{
    pub fn new(registry: Arc<ErrorRegistry>, sink: S, clock: C) -> Self {
        Self {
            registry,
            sink,
            clock,
            gate: tokio::sync::Mutex::new(()),
            flushing: AtomicBool::new(false),
            stats: Mutex::new(FlushStats::default()),
        }
    }

    pub fn registry(&self) -> &Arc<ErrorRegistry> {
        &self.registry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn phase(&self) -> FlushPhase {
        if self.flushing.load(Ordering::Acquire) {
            FlushPhase::Flushing
        } else {
            FlushPhase::Idle
        }
    }

    pub fn stats(&self) -> FlushStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Run a cycle now and wait until its rows are visible
    ///
    /// The cycle runs on its own task, so it completes even if the caller
    /// stops waiting.
    pub async fn flush(self: &Arc<Self>) -> Result<FlushReport, FlushError> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.flush_exclusive().await })
            .await
            .map_err(|e| FlushError::Aborted(e.to_string()))?
    }

    async fn flush_exclusive(&self) -> Result<FlushReport, FlushError> {
        let _gate = self.gate.lock().await;
        self.run_cycle().await
    }

    /// Run a cycle unless one is already in flight
    ///
    /// Returns `None` when the trigger was coalesced into the running cycle.
    pub async fn try_flush(&self) -> Option<Result<FlushReport, FlushError>> {
        let Ok(_gate) = self.gate.try_lock() else {
            debug!("flush already in progress, skipping tick");
            return None;
        };
        Some(self.run_cycle().await)
    }

    async fn run_cycle(&self) -> Result<FlushReport, FlushError> {
        self.flushing.store(true, Ordering::Release);
        let start = std::time::Instant::now();
        let result = self.publish().await;
        self.flushing.store(false, Ordering::Release);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        match &result {
            Ok(report) => {
                stats.flushes_completed += 1;
                stats.rows_written += report.rows as u64;
                stats.last_flush = Some(report.taken_at);
                if report.rows > 0 {
                    info!(
                        rows = report.rows,
                        occurrences = report.occurrences,
                        elapsed_ms,
                        "flushed error log"
                    );
                } else {
                    debug!(elapsed_ms, "nothing to flush");
                }
            }
            Err(e) => {
                stats.flushes_failed += 1;
                warn!(
                    pending_rows = e.pending_rows(),
                    elapsed_ms,
                    error = %e,
                    "error log flush failed, deltas kept for retry"
                );
            }
        }
        result
    }

    async fn publish(&self) -> Result<FlushReport, FlushError> {
        self.sink
            .ensure_exists()
            .await
            .map_err(FlushError::CreateTable)?;

        let snapshot = SnapshotBuilder::build(&self.registry, self.clock.now());
        let report = FlushReport {
            rows: snapshot.len(),
            occurrences: snapshot
                .rows()
                .iter()
                .fold(0u64, |sum, row| sum.wrapping_add(row.value)),
            taken_at: snapshot.taken_at(),
        };
        if snapshot.is_empty() {
            return Ok(report);
        }

        self.sink
            .append(snapshot.rows())
            .await
            .map_err(|source| FlushError::Append {
                rows: snapshot.len(),
                source,
            })?;
        let stale = snapshot.commit(&self.registry);
        if stale > 0 {
            warn!(
                stale,
                "flushed deltas were already marked by another reader"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "flush_tests.rs"]
mod tests;
