//! Transaction manager: begin/commit/abort plus the DML entry points that
//! keep the write-ahead log, heap files, and B+tree indexes in lockstep
//! (spec.md §4.5/§4.8), grounded on
//! `original_source/src/transaction/transaction_manager.cpp`.
//!
//! Strict two-phase locking here degenerates to a single transition: every
//! lock a transaction takes happens during its `Growing` phase, and it
//! moves to `Shrinking` only at commit/abort, where every lock it holds is
//! released at once via [`lock::LockManager::release_all`]. A transaction
//! therefore never needs to track *which* locks it holds (unlike the
//! original's `lock_set_`) — only that it has entered `Shrinking`, so a
//! stray DML call after commit/abort is rejected rather than silently
//! taking a new lock.

pub mod recovery;


use btree::BTreeIndex;
use buffer::BufferPoolManager;
use common::{
    AbortReason, ColumnId, DbError, DbResult, FileTag, Lsn, RecordId, Row, TableId, TxnId,
};
use hashbrown::HashMap;
use lock::{LockDataId, LockManager, LockMode};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use storage::HeapFile;
use types::Value;
use wal::{LogManager, LogRecord};

pub use recovery::Recovery;

/// Where a transaction sits in strict two-phase locking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnPhase {
    Growing,
    Shrinking,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnStatus {
    Running,
    Committed,
    Aborted,
}

/// Enough of a write's before/after image to compensate it during abort.
/// Mirrors the original's `write_set_`, minus the parts recomputable from
/// the heap file (an insert's row image, since `get(rid)` still works until
/// the compensating delete runs).
enum WriteRecord {
    Insert { table: TableId, rid: RecordId },
    Delete { table: TableId, rid: RecordId, row: Row },
    Update { table: TableId, rid: RecordId, old_row: Row },
}

/// A running (or just-finished) transaction. Cheap to share: every field is
/// behind its own lock so `TransactionManager` can hand out `Arc<Transaction>`
/// to every operator touching it concurrently.
pub struct Transaction {
    id: TxnId,
    phase: Mutex<TxnPhase>,
    status: Mutex<TxnStatus>,
    prev_lsn: Mutex<Lsn>,
    write_set: Mutex<Vec<WriteRecord>>,
}

impl Transaction {
    fn new(id: TxnId) -> Self {
        Self {
            id,
            phase: Mutex::new(TxnPhase::Growing),
            status: Mutex::new(TxnStatus::Running),
            prev_lsn: Mutex::new(Lsn::INVALID),
            write_set: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn status(&self) -> TxnStatus {
        *self.status.lock()
    }

    pub fn phase(&self) -> TxnPhase {
        *self.phase.lock()
    }

    fn prev_lsn(&self) -> Lsn {
        *self.prev_lsn.lock()
    }

    fn set_prev_lsn(&self, lsn: Lsn) {
        *self.prev_lsn.lock() = lsn;
    }

    fn push_write(&self, item: WriteRecord) {
        self.write_set.lock().push(item);
    }

    fn require_growing(&self) -> DbResult<()> {
        if *self.phase.lock() == TxnPhase::Shrinking {
            return Err(DbError::TransactionAbort(AbortReason::LockOnShrinking));
        }
        Ok(())
    }

    fn enter_shrinking(&self) {
        *self.phase.lock() = TxnPhase::Shrinking;
    }
}

/// One index maintained on a table, bound to the column ordinals that form
/// its key.
pub struct IndexHandle {
    pub index: Arc<BTreeIndex>,
    pub key_columns: Vec<ColumnId>,
    /// Mirrors `catalog::IndexMeta::unique` — checked by `insert` before the
    /// row is written anywhere, so a rejected insert leaves no trace in the
    /// heap file or any other index.
    pub unique: bool,
}

impl IndexHandle {
    pub fn new(index: Arc<BTreeIndex>, key_columns: Vec<ColumnId>) -> Self {
        Self {
            index,
            key_columns,
            unique: false,
        }
    }

    pub fn new_unique(index: Arc<BTreeIndex>, key_columns: Vec<ColumnId>) -> Self {
        Self {
            index,
            key_columns,
            unique: true,
        }
    }

    fn extract_key(&self, row: &Row) -> Vec<Value> {
        self.key_columns
            .iter()
            .map(|&c| row.values[c as usize].clone())
            .collect()
    }
}

/// An opened heap file and its indexes, the unit `TransactionManager`'s DML
/// helpers and [`Recovery`] operate on. Built and owned by the layer that
/// holds the catalog (`database`), which knows which tables/indexes exist.
pub struct TableHandle {
    pub heap: Arc<HeapFile>,
    pub indexes: Vec<IndexHandle>,
}

impl TableHandle {
    pub fn new(heap: Arc<HeapFile>, indexes: Vec<IndexHandle>) -> Self {
        Self { heap, indexes }
    }
}

fn abort_err(reason: AbortReason) -> DbError {
    DbError::TransactionAbort(reason)
}

fn table_handle<'a>(
    tables: &'a HashMap<TableId, TableHandle>,
    table: TableId,
) -> DbResult<&'a TableHandle> {
    tables
        .get(&table)
        .ok_or_else(|| DbError::Storage(format!("unknown table {} in transaction", table.0)))
}

/// Coordinates the lock manager, the write-ahead log, and per-table storage
/// so every DML statement is atomic and durable. One instance is shared by
/// the whole engine.
pub struct TransactionManager {
    lock_manager: Arc<LockManager>,
    wal: Arc<LogManager>,
    pool: Arc<BufferPoolManager>,
    next_txn_id: AtomicU64,
    active: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(
        lock_manager: Arc<LockManager>,
        wal: Arc<LogManager>,
        pool: Arc<BufferPoolManager>,
    ) -> Self {
        Self {
            lock_manager,
            wal,
            pool,
            next_txn_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn active_transactions(&self) -> usize {
        self.active.lock().len()
    }

    /// Restore the next-transaction-id counter after recovery has scanned
    /// the existing log, so a freshly started transaction never reuses an
    /// id recovery just rolled back.
    pub fn set_next_txn_id(&self, next: u64) {
        self.next_txn_id.store(next, Ordering::SeqCst);
    }

    pub fn begin(&self) -> DbResult<Arc<Transaction>> {
        let id = TxnId(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        let txn = Arc::new(Transaction::new(id));
        let lsn = self.wal.append(LogRecord::Begin { txn: id }, Lsn::INVALID)?;
        txn.set_prev_lsn(lsn);
        self.active.lock().insert(id, txn.clone());
        Ok(txn)
    }

    pub fn commit(&self, txn: &Transaction) -> DbResult<()> {
        if txn.status() == TxnStatus::Aborted {
            return Err(abort_err(AbortReason::CommitAborted));
        }
        let lsn = self
            .wal
            .append(LogRecord::Commit { txn: txn.id() }, txn.prev_lsn())?;
        txn.set_prev_lsn(lsn);
        self.wal.force_flush(lsn)?;

        txn.enter_shrinking();
        self.lock_manager.release_all(txn.id());
        txn.write_set.lock().clear();
        *txn.status.lock() = TxnStatus::Committed;
        self.active.lock().remove(&txn.id());
        Ok(())
    }

    /// Roll back every write `txn` made, in reverse order, then release its
    /// locks. Grounded on `TransactionManager::abort` in
    /// `transaction_manager.cpp`: same three compensations (delete an
    /// insert, reinsert a delete, restore an update), each followed by its
    /// own WAL record so a crash mid-rollback can still be completed by
    /// [`Recovery`].
    pub fn abort(&self, txn: &Transaction, tables: &HashMap<TableId, TableHandle>) -> DbResult<()> {
        if txn.status() == TxnStatus::Committed {
            return Err(abort_err(AbortReason::CommitAborted));
        }

        let writes: Vec<WriteRecord> = std::mem::take(&mut *txn.write_set.lock());
        for item in writes.into_iter().rev() {
            match item {
                WriteRecord::Insert { table, rid } => {
                    let handle = table_handle(tables, table)?;
                    let row = handle.heap.get(rid)?;
                    let lsn = self.wal.append(
                        LogRecord::Delete {
                            txn: txn.id(),
                            table,
                            rid,
                            row: row.values.clone(),
                        },
                        txn.prev_lsn(),
                    )?;
                    txn.set_prev_lsn(lsn);
                    for idx in &handle.indexes {
                        idx.index.delete(&idx.extract_key(&row), rid, lsn)?;
                    }
                    handle.heap.delete(rid, lsn)?;
                }
                WriteRecord::Delete { table, rid, row } => {
                    let handle = table_handle(tables, table)?;
                    let lsn = self.wal.append(
                        LogRecord::Insert {
                            txn: txn.id(),
                            table,
                            rid,
                            row: row.values.clone(),
                        },
                        txn.prev_lsn(),
                    )?;
                    txn.set_prev_lsn(lsn);
                    handle.heap.insert_at(rid, &row, lsn)?;
                    for idx in &handle.indexes {
                        idx.index.insert(idx.extract_key(&row), rid, lsn)?;
                    }
                }
                WriteRecord::Update { table, rid, old_row } => {
                    let handle = table_handle(tables, table)?;
                    let current = handle.heap.get(rid)?;
                    let lsn = self.wal.append(
                        LogRecord::Update {
                            txn: txn.id(),
                            table,
                            rid,
                            old_row: current.values.clone(),
                            new_row: old_row.values.clone(),
                        },
                        txn.prev_lsn(),
                    )?;
                    txn.set_prev_lsn(lsn);
                    handle.heap.update(rid, &old_row, lsn)?;
                    for idx in &handle.indexes {
                        let current_key = idx.extract_key(&current);
                        let restored_key = idx.extract_key(&old_row);
                        if current_key != restored_key {
                            idx.index.delete(&current_key, rid, lsn)?;
                            idx.index.insert(restored_key, rid, lsn)?;
                        }
                    }
                }
            }
        }

        let lsn = self
            .wal
            .append(LogRecord::Abort { txn: txn.id() }, txn.prev_lsn())?;
        txn.set_prev_lsn(lsn);
        self.wal.force_flush(lsn)?;

        txn.enter_shrinking();
        self.lock_manager.release_all(txn.id());
        *txn.status.lock() = TxnStatus::Aborted;
        self.active.lock().remove(&txn.id());
        Ok(())
    }

    /// Insert `values` as a new row of `table`, maintaining every index in
    /// `handle`. Takes an intention-exclusive table lock; row-level and gap
    /// locking for phantom protection is the caller's job (`executor`'s
    /// `InsertExec`, per spec.md §4.7's next-key locking).
    pub fn insert(
        &self,
        txn: &Transaction,
        table: TableId,
        handle: &TableHandle,
        values: Vec<Value>,
    ) -> DbResult<RecordId> {
        txn.require_growing()?;
        self.lock_manager
            .acquire(txn.id(), LockDataId::Table(table), LockMode::IntentionExclusive)?;

        let row = Row::new(values);
        for idx in &handle.indexes {
            if idx.unique && !idx.index.search(&idx.extract_key(&row))?.is_empty() {
                return Err(DbError::Constraint(format!(
                    "duplicate key value violates unique constraint on table {}",
                    table.0
                )));
            }
        }
        let rid = handle.heap.insert(&row, Lsn::INVALID)?;
        let lsn = self.wal.append(
            LogRecord::Insert {
                txn: txn.id(),
                table,
                rid,
                row: row.values.clone(),
            },
            txn.prev_lsn(),
        )?;
        txn.set_prev_lsn(lsn);
        self.stamp_page(table, rid, lsn)?;
        for idx in &handle.indexes {
            idx.index.insert(idx.extract_key(&row), rid, lsn)?;
        }
        txn.push_write(WriteRecord::Insert { table, rid });
        Ok(rid)
    }

    /// Delete the row at `rid`. Takes an exclusive record lock.
    pub fn delete(
        &self,
        txn: &Transaction,
        table: TableId,
        handle: &TableHandle,
        rid: RecordId,
    ) -> DbResult<()> {
        txn.require_growing()?;
        self.lock_manager
            .acquire(txn.id(), LockDataId::Table(table), LockMode::IntentionExclusive)?;
        self.lock_manager
            .acquire(txn.id(), LockDataId::Record(table, rid), LockMode::Exclusive)?;

        let row = handle.heap.get(rid)?;
        let lsn = self.wal.append(
            LogRecord::Delete {
                txn: txn.id(),
                table,
                rid,
                row: row.values.clone(),
            },
            txn.prev_lsn(),
        )?;
        txn.set_prev_lsn(lsn);
        for idx in &handle.indexes {
            idx.index.delete(&idx.extract_key(&row), rid, lsn)?;
        }
        handle.heap.delete(rid, lsn)?;
        txn.push_write(WriteRecord::Delete { table, rid, row });
        Ok(())
    }

    /// Overwrite the row at `rid` with `new_values`. Takes an exclusive
    /// record lock; only indexes whose key actually changed are touched.
    pub fn update(
        &self,
        txn: &Transaction,
        table: TableId,
        handle: &TableHandle,
        rid: RecordId,
        new_values: Vec<Value>,
    ) -> DbResult<()> {
        txn.require_growing()?;
        self.lock_manager
            .acquire(txn.id(), LockDataId::Table(table), LockMode::IntentionExclusive)?;
        self.lock_manager
            .acquire(txn.id(), LockDataId::Record(table, rid), LockMode::Exclusive)?;

        let old_row = handle.heap.get(rid)?;
        let new_row = Row::new(new_values);
        for idx in &handle.indexes {
            if !idx.unique {
                continue;
            }
            let old_key = idx.extract_key(&old_row);
            let new_key = idx.extract_key(&new_row);
            if old_key != new_key && !idx.index.search(&new_key)?.is_empty() {
                return Err(DbError::Constraint(format!(
                    "duplicate key value violates unique constraint on table {}",
                    table.0
                )));
            }
        }
        let lsn = self.wal.append(
            LogRecord::Update {
                txn: txn.id(),
                table,
                rid,
                old_row: old_row.values.clone(),
                new_row: new_row.values.clone(),
            },
            txn.prev_lsn(),
        )?;
        txn.set_prev_lsn(lsn);
        handle.heap.update(rid, &new_row, lsn)?;
        for idx in &handle.indexes {
            let old_key = idx.extract_key(&old_row);
            let new_key = idx.extract_key(&new_row);
            if old_key != new_key {
                idx.index.delete(&old_key, rid, lsn)?;
                idx.index.insert(new_key, rid, lsn)?;
            }
        }
        txn.push_write(WriteRecord::Update {
            table,
            rid,
            old_row,
        });
        Ok(())
    }

    /// Shared record lock for a plain read under repeatable-read semantics.
    pub fn lock_for_read(&self, txn: &Transaction, table: TableId, rid: RecordId) -> DbResult<()> {
        txn.require_growing()?;
        self.lock_manager
            .acquire(txn.id(), LockDataId::Table(table), LockMode::IntentionShared)?;
        self.lock_manager
            .acquire(txn.id(), LockDataId::Record(table, rid), LockMode::Shared)
    }

    /// `insert()` already wrote the row with a placeholder LSN — it can't
    /// know the log's LSN upfront, since the log record itself needs the
    /// RID that the heap assigns during that same write. This fills in the
    /// real one afterwards, the same fetch_page/set_page_lsn pair the
    /// original does right after `add_log_to_buffer`.
    fn stamp_page(&self, table: TableId, rid: RecordId, lsn: Lsn) -> DbResult<()> {
        let mut guard = self.pool.fetch_page(FileTag::Table(table), rid.page_id)?;
        guard.set_page_lsn(lsn);
        Ok(())
    }
}
