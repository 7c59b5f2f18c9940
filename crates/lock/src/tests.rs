use super::*;
use common::{AbortReason, DbError, PageId};

fn rid(slot: u16) -> RecordId {
    RecordId {
        page_id: PageId(0),
        slot,
    }
}

#[test]
fn compatibility_matrix_matches_multi_granularity_rules() {
    assert!(is_compatible(IntentionShared, IntentionShared));
    assert!(is_compatible(IntentionShared, IntentionExclusive));
    assert!(is_compatible(IntentionShared, Shared));
    assert!(is_compatible(IntentionShared, SharedIntentionExclusive));
    assert!(!is_compatible(IntentionShared, Exclusive));

    assert!(is_compatible(IntentionExclusive, IntentionShared));
    assert!(is_compatible(IntentionExclusive, IntentionExclusive));
    assert!(!is_compatible(IntentionExclusive, Shared));
    assert!(!is_compatible(IntentionExclusive, SharedIntentionExclusive));
    assert!(!is_compatible(IntentionExclusive, Exclusive));

    assert!(is_compatible(Shared, IntentionShared));
    assert!(!is_compatible(Shared, IntentionExclusive));
    assert!(is_compatible(Shared, Shared));
    assert!(!is_compatible(Shared, SharedIntentionExclusive));
    assert!(!is_compatible(Shared, Exclusive));

    assert!(!is_compatible(Exclusive, IntentionShared));
    assert!(!is_compatible(Exclusive, Exclusive));
}

#[test]
fn combine_is_commutative_and_joins_to_exclusive() {
    assert_eq!(combine(IntentionShared, Shared), Shared);
    assert_eq!(combine(Shared, IntentionShared), Shared);
    assert_eq!(combine(IntentionExclusive, Shared), SharedIntentionExclusive);
    assert_eq!(combine(Shared, IntentionExclusive), SharedIntentionExclusive);
    assert_eq!(combine(SharedIntentionExclusive, Exclusive), Exclusive);
    assert_eq!(combine(Exclusive, IntentionShared), Exclusive);
}

#[test]
fn shared_locks_on_same_record_do_not_conflict() {
    let mgr = LockManager::new(50);
    let table = TableId(1);
    let r = rid(0);

    mgr.acquire_record(TxnId(1), table, r, Shared).unwrap();
    mgr.acquire_record(TxnId(2), table, r, Shared).unwrap();
}

#[test]
fn exclusive_lock_blocks_other_txn_until_retries_exhausted() {
    let mgr = LockManager::new(3);
    let table = TableId(1);
    let r = rid(0);

    mgr.acquire_record(TxnId(1), table, r, Exclusive).unwrap();
    let err = mgr
        .acquire_record(TxnId(2), table, r, Shared)
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::TransactionAbort(AbortReason::DeadlockPrevention)
    ));
}

#[test]
fn releasing_unblocks_a_waiting_request() {
    let mgr = Arc::new(LockManager::new(200));
    let table = TableId(1);
    let r = rid(0);

    mgr.acquire_record(TxnId(1), table, r, Exclusive).unwrap();

    let waiter = {
        let mgr = mgr.clone();
        std::thread::spawn(move || mgr.acquire_record(TxnId(2), table, r, Shared))
    };

    std::thread::sleep(Duration::from_micros(200));
    mgr.release_all(TxnId(1));

    waiter.join().unwrap().unwrap();
}

#[test]
fn requesting_an_already_held_mode_is_a_no_op() {
    let mgr = LockManager::new(50);
    let table = TableId(1);

    mgr.acquire_table(TxnId(1), table, IntentionShared).unwrap();
    mgr.acquire_table(TxnId(1), table, IntentionShared).unwrap();
}

#[test]
fn upgrade_from_shared_to_exclusive_succeeds_when_sole_holder() {
    let mgr = LockManager::new(50);
    let table = TableId(1);
    let r = rid(0);

    mgr.acquire_record(TxnId(1), table, r, Shared).unwrap();
    mgr.acquire_record(TxnId(1), table, r, Exclusive).unwrap();
}

#[test]
fn upgrade_blocks_while_another_txn_holds_a_conflicting_mode() {
    let mgr = Arc::new(LockManager::new(1));
    let table = TableId(1);
    let r = rid(0);

    mgr.acquire_record(TxnId(1), table, r, Shared).unwrap();
    mgr.acquire_record(TxnId(2), table, r, Shared).unwrap();

    // txn 1 starts an upgrade but can't complete it while txn 2 still holds S.
    let upgrade_err = mgr.acquire_record(TxnId(1), table, r, Exclusive).unwrap_err();
    assert!(matches!(
        upgrade_err,
        DbError::TransactionAbort(AbortReason::DeadlockPrevention)
    ));
}

#[test]
fn try_lock_in_gap_aborts_when_another_txn_is_present() {
    let mgr = LockManager::new(50);
    let index = IndexId(1);
    let gap = rid(5);

    mgr.acquire_gap(TxnId(1), index, gap).unwrap();
    let err = mgr.try_lock_in_gap(TxnId(2), index, gap).unwrap_err();
    assert!(matches!(
        err,
        DbError::TransactionAbort(AbortReason::DeadlockPrevention)
    ));
}

#[test]
fn try_lock_in_gap_allows_the_owning_txn_again() {
    let mgr = LockManager::new(50);
    let index = IndexId(1);
    let gap = rid(5);

    mgr.acquire_gap(TxnId(1), index, gap).unwrap();
    mgr.try_lock_in_gap(TxnId(1), index, gap).unwrap();
}

#[test]
fn gap_end_sentinel_locks_like_any_other_gap() {
    let mgr = LockManager::new(50);
    let index = IndexId(1);

    mgr.acquire_gap(TxnId(1), index, RecordId::GAP_END).unwrap();
    let err = mgr
        .try_lock_in_gap(TxnId(2), index, RecordId::GAP_END)
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::TransactionAbort(AbortReason::DeadlockPrevention)
    ));
}

#[test]
fn release_all_drops_every_object_for_a_txn() {
    let mgr = LockManager::new(50);
    let table = TableId(1);
    let r1 = rid(0);
    let r2 = rid(1);

    mgr.acquire_table(TxnId(1), table, IntentionExclusive).unwrap();
    mgr.acquire_record(TxnId(1), table, r1, Exclusive).unwrap();
    mgr.acquire_record(TxnId(1), table, r2, Exclusive).unwrap();

    mgr.release_all(TxnId(1));

    // Now txn 2 can take exclusive locks on everything txn 1 held.
    mgr.acquire_table(TxnId(2), table, IntentionExclusive).unwrap();
    mgr.acquire_record(TxnId(2), table, r1, Exclusive).unwrap();
    mgr.acquire_record(TxnId(2), table, r2, Exclusive).unwrap();
}
