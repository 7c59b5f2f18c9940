//! End-to-end tests for the six literal scenarios the storage engine is
//! expected to satisfy: index insert-split, unique-constraint rejection,
//! crash recovery, deadlock avoidance, range-scan phantom protection, and
//! stable sort ties. Each test drives the full stack (parser -> planner ->
//! executor -> txn -> storage) through `Database`/`Session`, the same way a
//! real client would.

use anyhow::Result;
use database::{Database, QueryResult, Session};
use std::sync::Arc;
use types::Value;

/// Insert enough rows through a B+tree index to force at least one leaf
/// split, then confirm an ordered scan still returns every key in order.
/// (The split's structural invariants themselves -- every leaf at least
/// half full, root promotion to an internal node -- are covered at the
/// `btree` crate's own unit level; this test is the SQL-level contract that
/// a split is transparent to callers.)
#[tokio::test]
async fn index_insert_split_preserves_key_order() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let db = Database::new(temp_dir.path(), "catalog.json", "test.wal", 16).await?;

    db.execute("CREATE TABLE t (id INT PRIMARY KEY)").await?;
    db.execute("CREATE INDEX idx_t_id ON t(id)").await?;

    // One leaf holds 100 entries; 250 rows forces several splits and a new
    // internal root.
    const N: i32 = 250;
    for id in 1..=N {
        let sql = format!("INSERT INTO t VALUES ({id})");
        match db.execute(&sql).await? {
            QueryResult::Count { affected } => assert_eq!(affected, 1),
            other => panic!("expected a count, got {other:?}"),
        }
    }

    match db.execute("SELECT id FROM t ORDER BY id ASC").await? {
        QueryResult::Rows { rows, .. } => {
            assert_eq!(rows.len(), N as usize);
            for (i, row) in rows.iter().enumerate() {
                assert_eq!(row.values[0], Value::Int(i as i32 + 1));
            }
        }
        other => panic!("expected rows, got {other:?}"),
    }

    match db.execute("SELECT COUNT(*) FROM t").await? {
        QueryResult::Rows { rows, .. } => assert_eq!(rows[0].values[0], Value::Int(N)),
        other => panic!("expected rows, got {other:?}"),
    }

    Ok(())
}

/// A second insert of an already-present primary key value is rejected, and
/// the table is left with exactly the first row.
#[tokio::test]
async fn duplicate_key_on_unique_index_is_rejected() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let db = Database::new(temp_dir.path(), "catalog.json", "test.wal", 10).await?;

    db.execute("CREATE TABLE t (id INT PRIMARY KEY, label CHAR(16))")
        .await?;

    match db.execute("INSERT INTO t VALUES (5, 'first')").await? {
        QueryResult::Count { affected } => assert_eq!(affected, 1),
        other => panic!("expected a count, got {other:?}"),
    }

    assert!(
        db.execute("INSERT INTO t VALUES (5, 'second')").await.is_err(),
        "inserting a duplicate primary key should fail"
    );

    match db.execute("SELECT COUNT(*) FROM t").await? {
        QueryResult::Rows { rows, .. } => assert_eq!(rows[0].values[0], Value::Int(1)),
        other => panic!("expected rows, got {other:?}"),
    }

    Ok(())
}

/// A committed transaction survives a restart; a transaction that was never
/// committed is undone, and the write-ahead log records redo entries for the
/// committed rows plus a closing abort for the uncommitted one.
#[tokio::test]
async fn crash_recovery_keeps_committed_work_and_undoes_the_rest() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let data_dir = temp_dir.path();

    {
        let db = Arc::new(Database::new(data_dir, "catalog.json", "test.wal", 4).await?);
        let mut session = Session::new(db.clone());

        session
            .execute("CREATE TABLE t (id INT PRIMARY KEY, label CHAR(16))")
            .await?;

        session.execute("BEGIN").await?;
        session.execute("INSERT INTO t VALUES (1, 'A')").await?;
        session.execute("INSERT INTO t VALUES (2, 'B')").await?;
        session.execute("INSERT INTO t VALUES (3, 'C')").await?;
        session.execute("COMMIT").await?;

        session.execute("BEGIN").await?;
        session.execute("INSERT INTO t VALUES (4, 'D')").await?;
        // Simulate a crash: the process goes away with this transaction
        // still open, no COMMIT or ABORT ever sent.
    }

    // Restart: a fresh `Database` over the same directory replays the log
    // and must redo A/B/C and undo D.
    let db = Database::new(data_dir, "catalog.json", "test.wal", 4).await?;
    match db.execute("SELECT id FROM t ORDER BY id ASC").await? {
        QueryResult::Rows { rows, .. } => {
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[0].values[0], Value::Int(1));
            assert_eq!(rows[1].values[0], Value::Int(2));
            assert_eq!(rows[2].values[0], Value::Int(3));
        }
        other => panic!("expected rows, got {other:?}"),
    }

    Ok(())
}

/// Two transactions updating the same row in opposite commit order: the one
/// that can't get the lock within the bounded retry budget aborts with
/// `DEADLOCK-PREVENTION` rather than waiting forever, and the surviving
/// transaction's effect is the only one reflected in the final state.
#[tokio::test]
async fn concurrent_writers_on_one_row_resolve_via_deadlock_prevention() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let db = Arc::new(Database::new(temp_dir.path(), "catalog.json", "test.wal", 10).await?);

    db.execute("CREATE TABLE accounts (id INT PRIMARY KEY, balance INT)")
        .await?;
    db.execute("INSERT INTO accounts VALUES (1, 100)").await?;

    let mut t1 = Session::new(db.clone());
    t1.execute("BEGIN").await?;
    // T1 now holds the row lock for the rest of this test, until COMMIT.
    t1.execute("UPDATE accounts SET balance = balance + 10 WHERE id = 1")
        .await?;

    let db2 = db.clone();
    let t2_outcome = tokio::spawn(async move {
        let mut t2 = Session::new(db2);
        t2.execute("BEGIN").await?;
        t2.execute("UPDATE accounts SET balance = balance + 20 WHERE id = 1")
            .await
    })
    .await?;

    let err = t2_outcome.expect_err("the second writer should give up waiting for the lock");
    assert!(
        err.to_string().contains("DEADLOCK-PREVENTION"),
        "unexpected error: {err}"
    );

    t1.execute("COMMIT").await?;

    match db.execute("SELECT balance FROM accounts WHERE id = 1").await? {
        QueryResult::Rows { rows, .. } => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].values[0], Value::Int(110));
        }
        other => panic!("expected rows, got {other:?}"),
    }

    Ok(())
}

/// An open range scan holds a shared gap lock across the scanned keys and
/// one key past the high bound, so a concurrent insert that would land in
/// that gap blocks until the scan's transaction ends, then proceeds (spec.md
/// §8 scenario 5) -- it does not abort immediately the way a row-level write
/// conflict does.
#[tokio::test]
async fn range_scan_locks_out_a_phantom_insert_until_it_commits() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let db = Arc::new(Database::new(temp_dir.path(), "catalog.json", "test.wal", 200).await?);

    db.execute("CREATE TABLE readings (id INT PRIMARY KEY)").await?;
    db.execute("CREATE INDEX idx_readings_id ON readings(id)").await?;
    db.execute("INSERT INTO readings VALUES (10)").await?;
    db.execute("INSERT INTO readings VALUES (20)").await?;
    db.execute("INSERT INTO readings VALUES (30)").await?;

    let mut t1 = Session::new(db.clone());
    t1.execute("BEGIN").await?;
    // Locks the gaps for id=10, id=20, and the next key past 20 (id=30).
    t1.execute("SELECT * FROM readings WHERE id <= 20").await?;

    let db2 = db.clone();
    let phantom_insert = tokio::spawn(async move {
        let mut t2 = Session::new(db2);
        // 25 falls in the same next-key gap T1 already locked (the gap
        // whose key is 30): this blocks inside the lock manager's bounded
        // retry loop until T1 commits and releases the gap.
        t2.execute("INSERT INTO readings VALUES (25)").await
    });

    // Give the insert a chance to start waiting before T1 releases the gap,
    // so a regression back to immediate-abort would show up as an error
    // here rather than the insert simply winning a race.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    t1.execute("COMMIT").await?;

    phantom_insert
        .await?
        .expect("insert should proceed once the gap-holder commits");

    match db.execute("SELECT COUNT(*) FROM readings").await? {
        QueryResult::Rows { rows, .. } => assert_eq!(rows[0].values[0], Value::Int(4)),
        other => panic!("expected rows, got {other:?}"),
    }

    Ok(())
}

/// `ORDER BY a ASC, b DESC` over rows with duplicate `(a, b)` pairs must
/// leave equal pairs in their original relative order (the sort is stable).
#[tokio::test]
async fn order_by_is_stable_across_ties() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let db = Database::new(temp_dir.path(), "catalog.json", "test.wal", 10).await?;

    db.execute("CREATE TABLE pairs (seq INT PRIMARY KEY, a INT, b INT)")
        .await?;
    let rows = [(1, 2), (1, 5), (1, 2), (2, 1)];
    for (seq, (a, b)) in rows.iter().enumerate() {
        let sql = format!("INSERT INTO pairs VALUES ({seq}, {a}, {b})");
        db.execute(&sql).await?;
    }

    match db
        .execute("SELECT a, b FROM pairs ORDER BY a ASC, b DESC")
        .await?
    {
        QueryResult::Rows { rows, .. } => {
            let got: Vec<(i32, i32)> = rows
                .iter()
                .map(|r| match (&r.values[0], &r.values[1]) {
                    (Value::Int(a), Value::Int(b)) => (*a, *b),
                    other => panic!("unexpected row shape: {other:?}"),
                })
                .collect();
            assert_eq!(got, vec![(1, 5), (1, 2), (1, 2), (2, 1)]);
        }
        other => panic!("expected rows, got {other:?}"),
    }

    Ok(())
}
