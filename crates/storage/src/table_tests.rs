// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use errlog_core::ErrorCode;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
}

fn row(day: u32, code: i32, value: u64) -> SnapshotRow {
    SnapshotRow {
        event_date: date(day),
        event_time: date(day).and_hms_opt(12, 0, 0).unwrap().and_utc(),
        code: ErrorCode(code),
        error: ErrorCode(code).name().to_string(),
        value,
    }
}

#[tokio::test]
async fn new_table_is_lazy() {
    let dir = tempfile::tempdir().unwrap();
    let table = LogTable::new(dir.path().join("error_log"));

    assert!(!table.exists());
    assert_eq!(table.query_code_sum(ErrorCode(999)).await.unwrap(), 0);
    assert_eq!(table.row_count().await.unwrap(), 0);
    assert!(table.partitions().await.unwrap().is_empty());
    // Reads never create the table
    assert!(!table.dir().exists());
}

#[tokio::test]
async fn ensure_exists_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let table = LogTable::new(dir.path().join("error_log"));

    let (a, b) = tokio::join!(table.ensure_exists(), table.ensure_exists());
    a.unwrap();
    b.unwrap();
    let first = fs::read_to_string(table.dir().join(METADATA_FILE)).unwrap();

    table.ensure_exists().await.unwrap();
    let second = fs::read_to_string(table.dir().join(METADATA_FILE)).unwrap();

    assert!(table.exists());
    assert_eq!(first, second);
    let meta: TableMetadata = serde_json::from_str(&first).unwrap();
    assert_eq!(meta, TableMetadata::error_log());
    assert_eq!(table.row_count().await.unwrap(), 0);
}

#[tokio::test]
async fn appended_rows_are_immediately_queryable() {
    let dir = tempfile::tempdir().unwrap();
    let table = LogTable::new(dir.path());
    table.ensure_exists().await.unwrap();

    table.append(&[row(19, 111, 1), row(19, 222, 4)]).await.unwrap();
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 1);

    table.append(&[row(19, 111, 2)]).await.unwrap();
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 3);
    assert_eq!(table.query_code_sum(ErrorCode(222)).await.unwrap(), 4);
    assert_eq!(table.row_count().await.unwrap(), 3);
}

#[tokio::test]
async fn append_creates_table_on_first_use() {
    let dir = tempfile::tempdir().unwrap();
    let table = LogTable::new(dir.path().join("nested").join("error_log"));

    table.append(&[row(19, 7, 1)]).await.unwrap();
    assert!(table.exists());
    assert_eq!(table.query_code_sum(ErrorCode(7)).await.unwrap(), 1);
}

#[tokio::test]
async fn empty_append_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let table = LogTable::new(dir.path().join("error_log"));

    table.append(&[]).await.unwrap();
    assert!(!table.exists());
}

#[tokio::test]
async fn date_range_selects_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let table = LogTable::new(dir.path());

    table.append(&[row(17, 111, 1)]).await.unwrap();
    table.append(&[row(18, 111, 10)]).await.unwrap();
    table.append(&[row(19, 111, 100)]).await.unwrap();

    assert_eq!(table.partitions().await.unwrap(), vec![date(17), date(18), date(19)]);

    let code = ErrorCode(111);
    assert_eq!(table.query_sum(&SumQuery::code(code)).await.unwrap(), 111);
    assert_eq!(
        table.query_sum(&SumQuery::code(code).since(date(18))).await.unwrap(),
        110
    );
    assert_eq!(
        table
            .query_sum(&SumQuery::code(code).since(date(18)).until(date(18)))
            .await
            .unwrap(),
        10
    );

    let rows = table.rows(&SumQuery::code(code).until(date(18))).await.unwrap();
    let values: Vec<_> = rows.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![1, 10]);
}

#[tokio::test]
async fn batch_spanning_dates_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let table = LogTable::new(dir.path());

    let result = table.append(&[row(18, 1, 1), row(19, 1, 1)]).await;
    assert!(matches!(result, Err(SinkError::MixedPartitions { .. })));
    assert_eq!(table.row_count().await.unwrap(), 0);
}

#[tokio::test]
async fn reopened_table_keeps_history() {
    let dir = tempfile::tempdir().unwrap();

    {
        let table = LogTable::new(dir.path());
        table.append(&[row(18, 111, 2)]).await.unwrap();
        table.append(&[row(19, 111, 3)]).await.unwrap();
    }

    let table = LogTable::new(dir.path());
    assert!(table.exists());
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 5);

    table.append(&[row(19, 111, 1)]).await.unwrap();
    let content = fs::read_to_string(partition_path(dir.path(), date(19))).unwrap();
    let seqs: Vec<u64> = content
        .lines()
        .map(|l| serde_json::from_str::<BatchEntry>(l).unwrap().seq)
        .collect();
    assert_eq!(seqs, vec![2, 3]);
}

#[tokio::test]
async fn torn_batch_is_skipped_and_next_batch_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    {
        let table = LogTable::new(dir.path());
        table.append(&[row(19, 111, 1)]).await.unwrap();
    }

    // Simulate a crash halfway through writing a batch
    let path = partition_path(dir.path(), date(19));
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(br#"{"seq":2,"rows":[{"event_da"#).unwrap();
    drop(file);

    let table = LogTable::new(dir.path());
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 1);

    table.append(&[row(19, 111, 5)]).await.unwrap();
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 6);

    // The fragment was cut off before the new batch was written
    let content = fs::read_to_string(&path).unwrap();
    let seqs: Vec<u64> = content
        .lines()
        .map(|l| serde_json::from_str::<BatchEntry>(l).unwrap().seq)
        .collect();
    assert_eq!(seqs, vec![1, 2]);

    let reloaded = LogTable::new(dir.path());
    assert_eq!(reloaded.query_code_sum(ErrorCode(111)).await.unwrap(), 6);
}

#[tokio::test]
async fn unterminated_complete_batch_is_not_counted() {
    let dir = tempfile::tempdir().unwrap();
    {
        let table = LogTable::new(dir.path());
        table.ensure_exists().await.unwrap();
    }

    // A batch whose write or sync failed after every byte but the newline
    // reached the file; the caller saw an error and will retry the delta
    let path = partition_path(dir.path(), date(19));
    let failed = BatchEntry {
        seq: 1,
        rows: vec![row(19, 111, 1)],
    };
    fs::write(&path, serde_json::to_string(&failed).unwrap()).unwrap();

    let table = LogTable::new(dir.path());
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 0);

    table.append(&[row(19, 111, 1)]).await.unwrap();
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 1);

    let reloaded = LogTable::new(dir.path());
    assert_eq!(reloaded.query_code_sum(ErrorCode(111)).await.unwrap(), 1);
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
}

#[tokio::test]
async fn unterminated_tail_is_dropped_without_touching_earlier_batches() {
    let dir = tempfile::tempdir().unwrap();
    {
        let table = LogTable::new(dir.path());
        table.append(&[row(19, 111, 2)]).await.unwrap();
        table.append(&[row(19, 222, 3)]).await.unwrap();
    }

    let path = partition_path(dir.path(), date(19));
    let committed = fs::metadata(&path).unwrap().len();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    let failed = BatchEntry {
        seq: 3,
        rows: vec![row(19, 111, 7)],
    };
    file.write_all(serde_json::to_string(&failed).unwrap().as_bytes())
        .unwrap();
    drop(file);

    let table = LogTable::new(dir.path());
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 2);
    assert_eq!(table.query_code_sum(ErrorCode(222)).await.unwrap(), 3);
    // Loading alone never rewrites the file
    assert!(fs::metadata(&path).unwrap().len() > committed);

    table.append(&[row(19, 111, 7)]).await.unwrap();
    let reloaded = LogTable::new(dir.path());
    assert_eq!(reloaded.query_code_sum(ErrorCode(111)).await.unwrap(), 9);
    assert_eq!(reloaded.row_count().await.unwrap(), 3);
}

#[tokio::test]
async fn failed_append_leaves_state_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let table = LogTable::new(dir.path());
    table.ensure_exists().await.unwrap();

    // A directory where the partition file should be makes the write fail
    let blocker = partition_path(dir.path(), date(19));
    fs::create_dir(&blocker).unwrap();

    let result = table.append(&[row(19, 111, 1)]).await;
    assert!(matches!(result, Err(SinkError::Io(_))));
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 0);

    fs::remove_dir(&blocker).unwrap();
    table.append(&[row(19, 111, 1)]).await.unwrap();
    assert_eq!(table.query_code_sum(ErrorCode(111)).await.unwrap(), 1);

    let reloaded = LogTable::new(dir.path());
    assert_eq!(reloaded.query_code_sum(ErrorCode(111)).await.unwrap(), 1);
}

#[tokio::test]
async fn corrupt_metadata_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(METADATA_FILE), "not json").unwrap();

    let table = LogTable::new(dir.path());
    let result = table.ensure_exists().await;
    assert!(matches!(result, Err(SinkError::Corrupt { .. })));
}

#[tokio::test]
async fn unrelated_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    {
        let table = LogTable::new(dir.path());
        table.append(&[row(19, 1, 1)]).await.unwrap();
    }
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    fs::write(dir.path().join("yesterday.jsonl"), "garbage\n").unwrap();

    let table = LogTable::new(dir.path());
    assert_eq!(table.partitions().await.unwrap(), vec![date(19)]);
    assert_eq!(table.query_code_sum(ErrorCode(1)).await.unwrap(), 1);
}
