// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queryable destination for snapshot rows

use async_trait::async_trait;
use chrono::NaiveDate;
use errlog_core::{ErrorCode, SnapshotRow};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from sink operations
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt table at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("batch spans multiple partitions: {first} and {other}")]
    MixedPartitions { first: NaiveDate, other: NaiveDate },
}

/// Aggregate read: `sum(value) WHERE code = X [AND event_date BETWEEN from AND to]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumQuery {
    pub code: ErrorCode,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SumQuery {
    /// Sum over the whole table history for `code`
    pub fn code(code: ErrorCode) -> Self {
        Self {
            code,
            from: None,
            to: None,
        }
    }

    /// Restrict to partitions on or after `date`
    pub fn since(mut self, date: NaiveDate) -> Self {
        self.from = Some(date);
        self
    }

    /// Restrict to partitions on or before `date`
    pub fn until(mut self, date: NaiveDate) -> Self {
        self.to = Some(date);
        self
    }

    /// Whether a partition date falls inside the range
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    pub fn matches(&self, row: &SnapshotRow) -> bool {
        row.code == self.code && self.covers(row.event_date)
    }
}

/// Append-only, aggregate-queryable table of snapshot rows
#[async_trait]
pub trait QueryableSink: Send + Sync + 'static {
    /// Create the backing table if it does not exist yet; idempotent
    async fn ensure_exists(&self) -> Result<(), SinkError>;

    /// Durably add one batch; all rows become visible together or not at all
    async fn append(&self, rows: &[SnapshotRow]) -> Result<(), SinkError>;

    /// Sum of `value` over rows matching `query`
    async fn query_sum(&self, query: &SumQuery) -> Result<u64, SinkError>;

    /// Number of rows stored
    async fn row_count(&self) -> Result<u64, SinkError>;

    /// Sum of `value` for `code` over the whole table
    async fn query_code_sum(&self, code: ErrorCode) -> Result<u64, SinkError> {
        self.query_sum(&SumQuery::code(code)).await
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
