// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for flush cycles

use errlog_storage::SinkError;
use thiserror::Error;

/// Errors that can abort a flush cycle
///
/// A failed cycle leaves every counter unflushed, so the same deltas are
/// published by the next successful cycle.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("failed to create error log table: {0}")]
    CreateTable(#[source] SinkError),
    #[error("failed to append {rows} rows: {source}")]
    Append {
        rows: usize,
        #[source]
        source: SinkError,
    },
    #[error("flush task aborted: {0}")]
    Aborted(String),
}

impl FlushError {
    /// Rows that were pending when the cycle failed
    pub fn pending_rows(&self) -> usize {
        match self {
            FlushError::Append { rows, .. } => *rows,
            _ => 0,
        }
    }
}
