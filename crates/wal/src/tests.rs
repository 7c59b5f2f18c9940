use super::*;
use common::PageId;
use tempfile::tempdir;

fn new_manager(dir: &std::path::Path) -> LogManager {
    let disk = Arc::new(DiskManager::new(dir.join("wal.log")));
    LogManager::new(disk, 4096)
}

#[test]
fn append_assigns_increasing_lsns() {
    let dir = tempdir().unwrap();
    let lm = new_manager(dir.path());
    let txn = TxnId(1);
    let lsn1 = lm
        .append(LogRecord::Begin { txn }, Lsn::INVALID)
        .unwrap();
    let lsn2 = lm
        .append(
            LogRecord::Insert {
                txn,
                table: TableId(1),
                rid: RecordId {
                    page_id: PageId(0),
                    slot: 0,
                },
                row: vec![Value::Int(1)],
            },
            lsn1,
        )
        .unwrap();
    assert!(lsn2.0 > lsn1.0);
}

#[test]
fn force_flush_persists_and_replay_recovers() {
    let dir = tempdir().unwrap();
    let lm = new_manager(dir.path());
    let txn = TxnId(7);
    let lsn1 = lm
        .append(LogRecord::Begin { txn }, Lsn::INVALID)
        .unwrap();
    let lsn2 = lm
        .append(
            LogRecord::Insert {
                txn,
                table: TableId(2),
                rid: RecordId {
                    page_id: PageId(3),
                    slot: 1,
                },
                row: vec![Value::Int(42)],
            },
            lsn1,
        )
        .unwrap();
    lm.force_flush(lsn2).unwrap();
    assert_eq!(lm.persist_lsn(), Some(lsn2));

    let frames = lm.replay().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].record.txn_id(), txn);
    match &frames[1].record {
        LogRecord::Insert { row, .. } => assert_eq!(row[0], Value::Int(42)),
        other => panic!("unexpected record {other:?}"),
    }
}

#[test]
fn force_flush_on_invalid_lsn_is_noop() {
    let dir = tempdir().unwrap();
    let lm = new_manager(dir.path());
    lm.force_flush(Lsn::INVALID).unwrap();
}

#[test]
fn background_flush_eventually_persists_without_force() {
    let dir = tempdir().unwrap();
    let lm = new_manager(dir.path());
    let lsn = lm
        .append(LogRecord::Begin { txn: TxnId(1) }, Lsn::INVALID)
        .unwrap();
    for _ in 0..50 {
        if lm.persist_lsn() == Some(lsn) {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(lm.persist_lsn(), Some(lsn));
}

#[test]
fn replay_preserves_prev_lsn_chain() {
    let dir = tempdir().unwrap();
    let lm = new_manager(dir.path());
    let txn = TxnId(3);
    let l1 = lm.append(LogRecord::Begin { txn }, Lsn::INVALID).unwrap();
    let l2 = lm
        .append(
            LogRecord::Delete {
                txn,
                table: TableId(1),
                rid: RecordId {
                    page_id: PageId(0),
                    slot: 0,
                },
                row: vec![Value::Int(9)],
            },
            l1,
        )
        .unwrap();
    lm.force_flush(l2).unwrap();

    let frames = lm.replay().unwrap();
    assert_eq!(frames[1].prev_lsn, l1);
}

#[test]
fn set_next_lsn_resumes_allocation_after_restart() {
    let dir = tempdir().unwrap();
    {
        let lm = new_manager(dir.path());
        let lsn = lm
            .append(LogRecord::Begin { txn: TxnId(1) }, Lsn::INVALID)
            .unwrap();
        lm.force_flush(lsn).unwrap();
    }
    let lm2 = new_manager(dir.path());
    let frames = lm2.replay().unwrap();
    let max_lsn = frames.iter().map(|f| f.lsn.0).max().unwrap();
    lm2.set_next_lsn(Lsn(max_lsn + 1));
    let next = lm2
        .append(LogRecord::Begin { txn: TxnId(2) }, Lsn::INVALID)
        .unwrap();
    assert_eq!(next.0, max_lsn + 1);
}
