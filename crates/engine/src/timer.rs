// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic flush driver

use crate::flush::FlushCoordinator;
use errlog_core::Clock;
use errlog_storage::QueryableSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Spawn a task that flushes every `interval` until `shutdown` flips to true
pub fn spawn_flush_loop<S, C>(
    coordinator: Arc<FlushCoordinator<S, C>>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: QueryableSink,
    C: Clock,
{
    tokio::spawn(run_flush_loop(coordinator, interval, shutdown))
}

/// Flush every `interval` until `shutdown` flips to true or its sender drops
pub async fn run_flush_loop<S, C>(
    coordinator: Arc<FlushCoordinator<S, C>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    S: QueryableSink,
    C: Clock,
{
    info!(interval_ms = interval.as_millis() as u64, "error log flush timer started");

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Failures are logged by the coordinator and retried next tick
                if coordinator.try_flush().await.is_none() {
                    debug!("timer tick coalesced into running flush");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("error log flush timer stopped");
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
