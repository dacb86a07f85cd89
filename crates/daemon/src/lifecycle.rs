// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use errlog_core::{ErrorRegistry, SystemClock};
use errlog_engine::{ErrorLog, ErrorLogConfig, FlushError, TracedSink};
use errlog_storage::LogTable;
use fs2::FileExt;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

/// Error log with the concrete sink and clock the daemon runs with
pub type DaemonErrorLog = ErrorLog<TracedSink<LogTable>, SystemClock>;

/// Contents of `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    error_log: ErrorLogConfig,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// State directory holding the table, log and lock
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Error log settings from `config.toml`
    pub error_log: ErrorLogConfig,
}

impl Config {
    /// Resolve configuration from the environment
    pub fn load() -> Result<Self, LifecycleError> {
        Self::for_dirs(&state_dir()?, &socket_dir())
    }

    /// Build configuration rooted at explicit directories
    pub fn for_dirs(state_dir: &Path, socket_dir: &Path) -> Result<Self, LifecycleError> {
        let config_path = state_dir.join("config.toml");
        let file_config = match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                toml::from_str::<FileConfig>(&content).map_err(|source| LifecycleError::Config {
                    path: config_path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            state_dir: state_dir.to_path_buf(),
            socket_path: socket_dir.join("errlogd.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            error_log: file_config.error_log,
        })
    }

    /// Directory of the error log table
    pub fn table_dir(&self) -> PathBuf {
        self.error_log
            .table_dir
            .clone()
            .unwrap_or_else(|| self.state_dir.join("error_log"))
    }
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Error counting and flushing
    pub error_log: DaemonErrorLog,
    /// When daemon started
    pub start_time: Instant,
    /// Shutdown requested flag
    pub shutdown_requested: bool,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    ///
    /// Publishes buffered counts before removing the socket and PID file.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        let result = self.error_log.shutdown().await;
        match &result {
            Ok(report) => info!(rows = report.rows, "final error log flush complete"),
            Err(e) => warn!(error = %e, "final error log flush failed"),
        }

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // Lock file is released when self.lock_file is dropped
        info!("Daemon shutdown complete");
        result.map(|_| ()).map_err(LifecycleError::from)
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Invalid config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Flush error: {0}")]
    Flush(#[from] FlushError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state and socket directories
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents races
    let lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Error log; the table itself is created on first flush
    let table_dir = config.table_dir();
    let error_log = ErrorLog::start(
        Arc::new(ErrorRegistry::new()),
        TracedSink::new(LogTable::new(&table_dir)),
        SystemClock,
        &config.error_log,
    );
    info!(
        table = %table_dir.display(),
        flush_interval_ms = config.error_log.flush_interval.as_millis() as u64,
        timer = config.error_log.enabled,
        "error log ready"
    );

    // 4. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        error_log,
        start_time: Instant::now(),
        shutdown_requested: false,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Get the state directory for errlogd
fn state_dir() -> Result<PathBuf, LifecycleError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("errlog"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/errlog"))
}

/// Get the socket directory for errlogd
///
/// Can be overridden with ERRLOG_SOCKET_DIR for testing.
fn socket_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ERRLOG_SOCKET_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("/tmp/errlog")
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
