// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error log settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default period between timer-driven flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(7500);

/// Error log configuration, usually read from the `[error_log]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorLogConfig {
    /// Run the periodic flush timer; explicit flushes work either way
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Table directory; the host picks a default when unset
    pub table_dir: Option<PathBuf>,
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            table_dir: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
