// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Error log daemon (errlogd)
//!
//! Hosts an error log for one process, exposing raise, flush and query
//! requests over a Unix socket.

pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use lifecycle::{startup, Config, DaemonState, LifecycleError};
pub use protocol::{ErrorEntry, ProtocolError, Request, Response, PROTOCOL_VERSION};
