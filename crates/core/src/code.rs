// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error codes and their display names
//!
//! Codes are plain integers chosen by the host application. A small catalog
//! maps well-known codes to names for display, but any code is accepted and
//! tracked whether or not it appears here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer identifier for a category of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    /// Name from the well-known catalog, or an empty string for custom codes
    pub fn name(self) -> &'static str {
        well_known_name(self).unwrap_or("")
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Look up the catalog name for a code
pub fn well_known_name(code: ErrorCode) -> Option<&'static str> {
    let name = match code.0 {
        0 => "OK",
        1 => "UNSUPPORTED_METHOD",
        2 => "UNSUPPORTED_PARAMETER",
        3 => "UNEXPECTED_END_OF_FILE",
        6 => "CANNOT_PARSE_TEXT",
        36 => "BAD_ARGUMENTS",
        38 => "CANNOT_PARSE_DATE",
        43 => "ILLEGAL_TYPE_OF_ARGUMENT",
        47 => "UNKNOWN_IDENTIFIER",
        48 => "NOT_IMPLEMENTED",
        49 => "LOGICAL_ERROR",
        57 => "TABLE_ALREADY_EXISTS",
        60 => "UNKNOWN_TABLE",
        62 => "SYNTAX_ERROR",
        81 => "UNKNOWN_DATABASE",
        159 => "TIMEOUT_EXCEEDED",
        164 => "READONLY",
        241 => "MEMORY_LIMIT_EXCEEDED",
        252 => "TOO_MANY_PARTS",
        394 => "QUERY_WAS_CANCELLED",
        499 => "S3_ERROR",
        1000 => "POCO_EXCEPTION",
        1001 => "STD_EXCEPTION",
        1002 => "UNKNOWN_EXCEPTION",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
#[path = "code_tests.rs"]
mod tests;
