// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use errlog_storage::SumQuery;
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::{debug, error};

use crate::lifecycle::DaemonState;
use crate::protocol::{
    self, ErrorEntry, ProtocolError, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION,
};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("request timed out")]
    Timeout,
}

/// Handle a single client connection
pub async fn handle_connection(
    daemon: &mut DaemonState,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);
    let response = handle_request(daemon, request).await;
    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

/// Handle a single request and return a response
pub async fn handle_request(daemon: &mut DaemonState, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Raise { code } => {
            daemon.error_log.increment(code);
            Response::Ok
        }

        Request::Flush => match daemon.error_log.flush().await {
            Ok(report) => Response::Flushed { rows: report.rows },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Query { code, from, to } => {
            let query = SumQuery { code, from, to };
            match daemon.error_log.query_sum(&query).await {
                Ok(value) => Response::Sum { code, value },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::Errors => {
            let entries = daemon
                .error_log
                .registry()
                .entries()
                .into_iter()
                .map(|view| ErrorEntry {
                    code: view.code,
                    name: view.code.name().to_string(),
                    total: view.total,
                    last_flushed: view.last_flushed,
                })
                .collect();
            Response::Errors { entries }
        }

        Request::Status => {
            let registry = daemon.error_log.registry();
            let stats = daemon.error_log.stats();
            Response::Status {
                uptime_secs: daemon.start_time.elapsed().as_secs(),
                tracked_codes: registry.len(),
                pending_codes: registry.pending_codes(),
                phase: daemon.error_log.coordinator().phase(),
                flushes_completed: stats.flushes_completed,
                flushes_failed: stats.flushes_failed,
                rows_written: stats.rows_written,
                last_flush: stats.last_flush,
            }
        }

        Request::Shutdown => {
            daemon.shutdown_requested = true;
            Response::ShuttingDown
        }
    }
}
