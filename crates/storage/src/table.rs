// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Date-partitioned, append-only error log table
//!
//! On-disk layout under the table directory:
//! - `table.json` holds the schema, written once when the table is created
//! - `<event_date>.jsonl` holds one partition per day, one batch per line
//!
//! A batch is a whole flush cycle, so a newline-terminated line is the unit of
//! atomicity. A failed append cuts the partition back to its last committed
//! length. An unterminated tail found on load is never counted, and is cut off
//! before the next batch is written. Complete lines that fail to parse are
//! skipped with a warning.

use crate::sink::{QueryableSink, SinkError, SumQuery};
use async_trait::async_trait;
use chrono::NaiveDate;
use errlog_core::SnapshotRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const METADATA_FILE: &str = "table.json";
const PARTITION_EXT: &str = "jsonl";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column in the table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Schema stored alongside the partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<Column>,
    pub partition_by: String,
}

impl TableMetadata {
    pub fn error_log() -> Self {
        let columns = [
            ("event_date", "Date"),
            ("event_time", "DateTime"),
            ("code", "Int32"),
            ("error", "String"),
            ("value", "UInt64"),
        ]
        .into_iter()
        .map(|(name, ty)| Column {
            name: name.to_string(),
            ty: ty.to_string(),
        })
        .collect();

        Self {
            name: "error_log".to_string(),
            columns,
            partition_by: "event_date".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BatchEntry {
    seq: u64,
    rows: Vec<SnapshotRow>,
}

#[derive(Debug, Default)]
struct TableState {
    partitions: BTreeMap<NaiveDate, Vec<SnapshotRow>>,
    /// Byte length of each partition file up to its last complete batch
    committed: HashMap<NaiveDate, u64>,
    sequence: u64,
}

impl TableState {
    fn matching<'a>(&'a self, query: &'a SumQuery) -> impl Iterator<Item = &'a SnapshotRow> + 'a {
        self.partitions
            .iter()
            .filter(|(date, _)| query.covers(**date))
            .flat_map(|(_, rows)| rows.iter())
            .filter(|row| row.code == query.code)
    }
}

/// File-backed error log table, created lazily on first use
pub struct LogTable {
    dir: PathBuf,
    state: OnceCell<Mutex<TableState>>,
}

impl LogTable {
    /// Describe a table rooted at `dir`; nothing touches disk until first use
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: OnceCell::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the table has been created (by this process or an earlier one)
    pub fn exists(&self) -> bool {
        self.state.initialized() || self.dir.join(METADATA_FILE).exists()
    }

    /// Partition dates currently holding rows
    pub async fn partitions(&self) -> Result<Vec<NaiveDate>, SinkError> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        let state = self.open().await?.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.partitions.keys().copied().collect())
    }

    /// Rows matching `query`, oldest partition first
    pub async fn rows(&self, query: &SumQuery) -> Result<Vec<SnapshotRow>, SinkError> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        let state = self.open().await?.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.matching(query).cloned().collect())
    }

    async fn open(&self) -> Result<&Mutex<TableState>, SinkError> {
        self.state
            .get_or_try_init(|| async { open_or_create(&self.dir).map(Mutex::new) })
            .await
    }
}

#[async_trait]
impl QueryableSink for LogTable {
    async fn ensure_exists(&self) -> Result<(), SinkError> {
        self.open().await.map(|_| ())
    }

    async fn append(&self, rows: &[SnapshotRow]) -> Result<(), SinkError> {
        let Some(first) = rows.first() else {
            return Ok(());
        };
        let date = first.event_date;
        if let Some(other) = rows.iter().find(|r| r.event_date != date) {
            return Err(SinkError::MixedPartitions {
                first: date,
                other: other.event_date,
            });
        }

        let mut state = self.open().await?.lock().unwrap_or_else(|e| e.into_inner());

        let entry = BatchEntry {
            seq: state.sequence + 1,
            rows: rows.to_vec(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let path = partition_path(&self.dir, date);
        let committed = state.committed.get(&date).copied().unwrap_or(0);
        let len = write_batch(&path, committed, line.as_bytes())?;

        state.committed.insert(date, len);
        state.sequence = entry.seq;
        debug!(seq = entry.seq, partition = %date, rows = entry.rows.len(), "batch appended");
        state.partitions.entry(date).or_default().extend(entry.rows);
        Ok(())
    }

    async fn query_sum(&self, query: &SumQuery) -> Result<u64, SinkError> {
        if !self.exists() {
            return Ok(0);
        }
        let state = self.open().await?.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .matching(query)
            .fold(0u64, |sum, row| sum.wrapping_add(row.value)))
    }

    async fn row_count(&self) -> Result<u64, SinkError> {
        if !self.exists() {
            return Ok(0);
        }
        let state = self.open().await?.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.partitions.values().map(|rows| rows.len() as u64).sum())
    }
}

fn partition_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.{}", date.format(DATE_FORMAT), PARTITION_EXT))
}

/// Write one batch after the last committed batch and return the new length
///
/// On failure the file is cut back to where the batch started, so no part of
/// it can be read back later.
fn write_batch(path: &Path, committed: u64, bytes: &[u8]) -> Result<u64, SinkError> {
    let mut file = OpenOptions::new().create(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    let start = len.min(committed);
    match write_at(&mut file, len, start, bytes) {
        Ok(()) => Ok(start + bytes.len() as u64),
        Err(e) => {
            if let Err(rollback) = file.set_len(start).and_then(|()| file.sync_all()) {
                return Err(SinkError::Corrupt {
                    path: path.to_path_buf(),
                    reason: format!("append failed ({e}) and could not be rolled back: {rollback}"),
                });
            }
            Err(e.into())
        }
    }
}

fn write_at(file: &mut File, len: u64, start: u64, bytes: &[u8]) -> io::Result<()> {
    if len > start {
        // Tail of an earlier failed write
        file.set_len(start)?;
    }
    file.seek(SeekFrom::Start(start))?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Create the table directory and schema, or load an existing table
fn open_or_create(dir: &Path) -> Result<TableState, SinkError> {
    fs::create_dir_all(dir)?;
    let meta_path = dir.join(METADATA_FILE);

    match OpenOptions::new().write(true).create_new(true).open(&meta_path) {
        Ok(mut file) => {
            serde_json::to_writer_pretty(&mut file, &TableMetadata::error_log())?;
            file.sync_all()?;
            info!(path = %dir.display(), "created error log table");
            return Ok(TableState::default());
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e.into()),
    }

    let content = fs::read_to_string(&meta_path)?;
    if content.trim().is_empty() {
        // Creation was interrupted before the schema was written
        fs::write(&meta_path, serde_json::to_vec_pretty(&TableMetadata::error_log())?)?;
    } else {
        let meta: TableMetadata =
            serde_json::from_str(&content).map_err(|e| SinkError::Corrupt {
                path: meta_path.clone(),
                reason: e.to_string(),
            })?;
        if meta != TableMetadata::error_log() {
            return Err(SinkError::Corrupt {
                path: meta_path,
                reason: format!("unexpected schema for table {}", meta.name),
            });
        }
    }

    let mut state = TableState::default();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(PARTITION_EXT) {
            continue;
        }
        let Some(date) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
        else {
            warn!(path = %path.display(), "ignoring file that is not a partition");
            continue;
        };
        load_partition(&path, date, &mut state)?;
    }

    info!(
        path = %dir.display(),
        partitions = state.partitions.len(),
        batches = state.sequence,
        "loaded error log table"
    );
    Ok(state)
}

fn load_partition(path: &Path, date: NaiveDate, state: &mut TableState) -> Result<(), SinkError> {
    let content = fs::read(path)?;
    let complete = content
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i + 1);
    if complete < content.len() {
        warn!(
            partition = %date,
            bytes = content.len() - complete,
            "dropping unterminated batch"
        );
    }
    state.committed.insert(date, complete as u64);

    for (index, line) in content[..complete].split(|b| *b == b'\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<BatchEntry>(line) {
            Ok(batch) => {
                state.sequence = state.sequence.max(batch.seq);
                state.partitions.entry(date).or_default().extend(batch.rows);
            }
            Err(e) => warn!(
                partition = %date,
                line = index + 1,
                error = %e,
                "skipping unreadable batch"
            ),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
