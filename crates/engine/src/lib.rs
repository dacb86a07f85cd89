// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Error log engine: flush coordination and lifecycle

mod config;
mod error;
mod error_log;
mod flush;
mod timer;
mod traced;

pub use config::{ErrorLogConfig, DEFAULT_FLUSH_INTERVAL};
pub use error::FlushError;
pub use error_log::ErrorLog;
pub use flush::{FlushCoordinator, FlushPhase, FlushReport, FlushStats};
pub use timer::{run_flush_loop, spawn_flush_loop};
pub use traced::TracedSink;
