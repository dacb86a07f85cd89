// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced sink wrapper for consistent observability

use async_trait::async_trait;
use errlog_core::SnapshotRow;
use errlog_storage::{QueryableSink, SinkError, SumQuery};
use tracing::Instrument;

/// Wrapper that adds tracing to any QueryableSink
#[derive(Clone)]
pub struct TracedSink<S> {
    inner: S,
}

impl<S> TracedSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: QueryableSink> QueryableSink for TracedSink<S> {
    async fn ensure_exists(&self) -> Result<(), SinkError> {
        let result = self
            .inner
            .ensure_exists()
            .instrument(tracing::debug_span!("sink.ensure_exists"))
            .await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "table creation failed");
        }
        result
    }

    async fn append(&self, rows: &[SnapshotRow]) -> Result<(), SinkError> {
        let span = tracing::info_span!("sink.append", rows = rows.len());

        async {
            let start = std::time::Instant::now();
            let result = self.inner.append(rows).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "appended"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "append failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn query_sum(&self, query: &SumQuery) -> Result<u64, SinkError> {
        let result = self.inner.query_sum(query).await;
        tracing::trace!(
            code = %query.code,
            from = ?query.from,
            to = ?query.to,
            sum = ?result.as_ref().ok(),
            "queried"
        );
        result
    }

    async fn row_count(&self) -> Result<u64, SinkError> {
        self.inner.row_count().await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
