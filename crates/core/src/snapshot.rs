// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Converting registry deltas into immutable log rows

use crate::code::ErrorCode;
use crate::registry::{ErrorRegistry, PendingDelta};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One persisted occurrence-count record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub event_date: NaiveDate,
    pub event_time: DateTime<Utc>,
    pub code: ErrorCode,
    /// Catalog name, empty for custom codes
    #[serde(default)]
    pub error: String,
    /// Occurrences since the previous flush of this code
    pub value: u64,
}

/// Deltas observed at one flush instant
///
/// Holds both the rows to publish and the observations needed to advance the
/// registry once they are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    rows: Vec<SnapshotRow>,
    observed: Vec<PendingDelta>,
}

impl Snapshot {
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Mark every captured delta as flushed; returns the number of stale marks
    pub fn commit(&self, registry: &ErrorRegistry) -> usize {
        registry.mark_flushed(&self.observed)
    }
}

/// Builds snapshots from registry state
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Capture all nonzero deltas currently in `registry`
    pub fn build(registry: &ErrorRegistry, now: DateTime<Utc>) -> Snapshot {
        Self::from_deltas(registry.pending(), now)
    }

    /// Pure conversion of observed deltas into rows stamped with `now`
    pub fn from_deltas(mut deltas: Vec<PendingDelta>, now: DateTime<Utc>) -> Snapshot {
        deltas.retain(|d| d.delta() != 0);
        deltas.sort_by_key(|d| d.code);

        let event_time = now.trunc_subsecs(0);
        let event_date = event_time.date_naive();
        let rows = deltas
            .iter()
            .map(|d| SnapshotRow {
                event_date,
                event_time,
                code: d.code,
                error: d.code.name().to_string(),
                value: d.delta(),
            })
            .collect();

        Snapshot {
            taken_at: now,
            rows,
            observed: deltas,
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
