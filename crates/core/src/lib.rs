// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! errlog-core: error occurrence counting
//!
//! This crate provides:
//! - Error codes and the well-known name catalog
//! - A concurrent registry of per-code occurrence counters
//! - Snapshots that turn unflushed counts into log rows
//! - A clock abstraction for testable timestamps

pub mod clock;
pub mod code;
pub mod registry;
pub mod snapshot;

pub use clock::{Clock, FakeClock, SystemClock};
pub use code::{well_known_name, ErrorCode};
pub use registry::{CounterView, ErrorRegistry, PendingDelta};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotRow};
