// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-scoped error log: counting, periodic flushing, and queries

use crate::config::ErrorLogConfig;
use crate::error::FlushError;
use crate::flush::{FlushCoordinator, FlushReport, FlushStats};
use crate::timer::spawn_flush_loop;
use errlog_core::{Clock, ErrorCode, ErrorRegistry};
use errlog_storage::{QueryableSink, SinkError, SumQuery};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct FlushTimer {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the registry, the flush coordinator, and the optional timer
pub struct ErrorLog<S, C> {
    coordinator: Arc<FlushCoordinator<S, C>>,
    timer: Option<FlushTimer>,
}

impl<S, C> ErrorLog<S, C>
where
    S: QueryableSink,
    C: Clock,
{
    /// Wire up the error log; spawns the flush timer when enabled
    ///
    /// Must be called from within a tokio runtime if the timer is enabled.
    pub fn start(registry: Arc<ErrorRegistry>, sink: S, clock: C, config: &ErrorLogConfig) -> Self {
        let coordinator = Arc::new(FlushCoordinator::new(registry, sink, clock));

        let timer = config.enabled.then(|| {
            let (shutdown, rx) = watch::channel(false);
            let handle = spawn_flush_loop(Arc::clone(&coordinator), config.flush_interval, rx);
            FlushTimer { shutdown, handle }
        });
        if timer.is_none() {
            info!("error log timer disabled, flushing on request only");
        }

        Self { coordinator, timer }
    }

    /// Record one occurrence of `code`
    pub fn increment(&self, code: ErrorCode) {
        self.coordinator.registry().increment(code);
    }

    pub fn registry(&self) -> &Arc<ErrorRegistry> {
        self.coordinator.registry()
    }

    pub fn coordinator(&self) -> &Arc<FlushCoordinator<S, C>> {
        &self.coordinator
    }

    pub fn stats(&self) -> FlushStats {
        self.coordinator.stats()
    }

    /// Flush now and wait until the rows are queryable
    pub async fn flush(&self) -> Result<FlushReport, FlushError> {
        self.coordinator.flush().await
    }

    pub async fn query_code_sum(&self, code: ErrorCode) -> Result<u64, SinkError> {
        self.coordinator.sink().query_code_sum(code).await
    }

    pub async fn query_sum(&self, query: &SumQuery) -> Result<u64, SinkError> {
        self.coordinator.sink().query_sum(query).await
    }

    /// Stop the timer and publish whatever is still buffered
    pub async fn shutdown(mut self) -> Result<FlushReport, FlushError> {
        if let Some(timer) = self.timer.take() {
            let _ = timer.shutdown.send(true);
            if let Err(e) = timer.handle.await {
                warn!(error = %e, "flush timer ended abnormally");
            }
        }
        self.coordinator.flush().await
    }
}

impl<S, C> Drop for ErrorLog<S, C> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            let _ = timer.shutdown.send(true);
        }
    }
}

#[cfg(test)]
#[path = "error_log_tests.rs"]
mod tests;
