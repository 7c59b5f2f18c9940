//! Scan operators: `SeqScanExec` and `IndexScanExec` (spec.md §4.6).

use crate::filter::eval as eval_scalar;
use crate::{ExecutionContext, Executor};
use common::{DbError, DbResult, ExecutionStats, RecordId, Row, TableId};
use planner::{IndexPredicate, ResolvedExpr};
use std::time::Instant;
use txn::IndexHandle;
use types::Value;

/// Sequential scan operator - iterates every live row in a table's heap
/// file in physical order, tagging each row with its `RecordId` so
/// downstream `UpdateExec`/`DeleteExec` can address it.
pub struct SeqScanExec {
    table_id: TableId,
    schema: Vec<String>,
    rids: Vec<(RecordId, Row)>,
    cursor: usize,
    stats: ExecutionStats,
}

impl SeqScanExec {
    pub fn new(table_id: TableId, schema: Vec<String>) -> Self {
        Self {
            table_id,
            schema,
            rids: Vec::new(),
            cursor: 0,
            stats: ExecutionStats::default(),
        }
    }
}

impl Executor for SeqScanExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.cursor = 0;
        self.stats = ExecutionStats::default();

        let handle = ctx.table_handle(self.table_id)?;
        self.rids = handle
            .heap
            .scan()
            .collect::<DbResult<Vec<_>>>()?;
        self.stats.pages_scanned = self.rids.len() as u64;

        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        let start = Instant::now();
        let result = if self.cursor < self.rids.len() {
            let (rid, row) = &self.rids[self.cursor];
            self.cursor += 1;
            self.stats.rows_produced += 1;
            Some(row.clone().with_rid(*rid))
        } else {
            None
        };
        self.stats.total_next_time += start.elapsed();
        Ok(result)
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.rids.clear();
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn schema(&self) -> &[String] {
        &self.schema
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}

/// Index scan operator - resolves a predicate against one of the table's
/// B+tree indexes and fetches the matching rows from the heap.
pub struct IndexScanExec {
    table_id: TableId,
    index_name: String,
    predicate: IndexPredicate,
    schema: Vec<String>,
    matching_rids: Vec<RecordId>,
    cursor: usize,
    stats: ExecutionStats,
}

impl IndexScanExec {
    pub fn new(
        table_id: TableId,
        index_name: String,
        predicate: IndexPredicate,
        schema: Vec<String>,
    ) -> Self {
        Self {
            table_id,
            index_name,
            predicate,
            schema,
            matching_rids: Vec::new(),
            cursor: 0,
            stats: ExecutionStats::default(),
        }
    }

    /// Find the `IndexHandle` named by `self.index_name` among the table's
    /// open indexes. The index's identity lives in the catalog; its open
    /// B+tree handle lives on the `TableHandle` the caller already has.
    fn find_index<'a>(&self, ctx: &ExecutionContext<'a>) -> DbResult<&'a IndexHandle> {
        let table_meta = ctx.catalog.table_by_id(self.table_id)?;
        let index_meta = table_meta.index(&self.index_name)?;
        let handle = ctx.table_handle(self.table_id)?;
        handle
            .indexes
            .iter()
            .find(|idx| idx.index.index_id() == index_meta.id)
            .ok_or_else(|| {
                DbError::Executor(format!(
                    "index '{}' is not open on table {}",
                    self.index_name, self.table_id.0
                ))
            })
    }

    fn query_index(&self, ctx: &ExecutionContext) -> DbResult<Vec<RecordId>> {
        let handle = self.find_index(ctx)?;
        let empty_row = Row::new(Vec::new());

        match &self.predicate {
            IndexPredicate::Eq { value, .. } => {
                let key = eval_scalar(value, &empty_row)?;
                handle.index.search(&[key])
            }
            IndexPredicate::CompositeEq { values, .. } => {
                let key = values
                    .iter()
                    .map(|v| eval_scalar(v, &empty_row))
                    .collect::<DbResult<Vec<Value>>>()?;
                handle.index.search(&key)
            }
            IndexPredicate::Range { low, high, .. } => {
                let low_key = eval_scalar(low, &empty_row)?;
                let high_key = eval_scalar(high, &empty_row)?;
                handle.index.range_scan(Some(&[low_key]), Some(&[high_key]))
            }
        }
    }

    /// Hold a shared next-key gap lock on every matched row plus the first
    /// row beyond the range, so a concurrent insert cannot land inside
    /// `[low, high]` — or immediately past it — before this transaction
    /// commits (spec.md §4.7's phantom protection). Locks are released by
    /// `txn::TransactionManager::commit`/`abort`, not by this executor's
    /// `close`, since the scanning statement may be followed by more
    /// statements in the same transaction.
    fn lock_range_gaps(&self, ctx: &ExecutionContext, high: &ResolvedExpr) -> DbResult<()> {
        let handle = self.find_index(ctx)?;
        let lock_manager = ctx.txn_mgr.lock_manager();
        let index_id = handle.index.index_id();

        for &rid in &self.matching_rids {
            lock_manager.acquire_gap(ctx.txn.id(), index_id, rid)?;
        }

        let empty_row = Row::new(Vec::new());
        let high_key = eval_scalar(high, &empty_row)?;
        if let Some((_, next_rid)) = handle.index.upper_bound(&[high_key])? {
            lock_manager.acquire_gap(ctx.txn.id(), index_id, next_rid)?;
        }
        Ok(())
    }
}

impl Executor for IndexScanExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.cursor = 0;
        self.stats = ExecutionStats::default();
        self.matching_rids = self.query_index(ctx)?;
        if let IndexPredicate::Range { high, .. } = &self.predicate {
            self.lock_range_gaps(ctx, high)?;
        }
        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        let start = Instant::now();

        if self.cursor >= self.matching_rids.len() {
            self.stats.total_next_time += start.elapsed();
            return Ok(None);
        }

        let rid = self.matching_rids[self.cursor];
        self.cursor += 1;

        let handle = ctx.table_handle(self.table_id)?;
        let row = handle.heap.get(rid)?.with_rid(rid);

        self.stats.rows_produced += 1;
        self.stats.total_next_time += start.elapsed();
        Ok(Some(row))
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.matching_rids.clear();
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn schema(&self) -> &[String] {
        &self.schema
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::TestFixture;
    use txn::IndexHandle as TxnIndexHandle;
    use types::Value;

    #[test]
    fn seq_scan_returns_every_inserted_row_tagged_with_rid() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let handle = &fixture.tables[&table_id];
        let txn = fixture.txn_mgr.begin().unwrap();
        let rid1 = fixture
            .txn_mgr
            .insert(&txn, table_id, handle, vec![Value::Int(1), Value::Char("a".into())])
            .unwrap();
        let rid2 = fixture
            .txn_mgr
            .insert(&txn, table_id, handle, vec![Value::Int(2), Value::Char("b".into())])
            .unwrap();

        let mut ctx = fixture.ctx();
        let mut exec = SeqScanExec::new(table_id, vec!["id".into(), "name".into()]);
        exec.open(&mut ctx).unwrap();

        let row1 = exec.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row1.rid(), Some(rid1));
        let row2 = exec.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row2.rid(), Some(rid2));
        assert!(exec.next(&mut ctx).unwrap().is_none());
        exec.close(&mut ctx).unwrap();
    }

    #[test]
    fn index_scan_eq_finds_matching_row() {
        let mut fixture = TestFixture::users();
        let table_id = fixture.table_id();

        // Register a one-column index on `id` in the catalog, then build
        // its B+tree handle and attach it to the table, mirroring how
        // `database` wires indexes up at startup.
        let index_id = fixture
            .catalog
            .create_index("users", "idx_users_id", &["id"], catalog::IndexKind::BTree, false)
            .unwrap();
        let pool = fixture.tables[&table_id].heap.pool();
        let btree = std::sync::Arc::new(btree::BTreeIndex::create(pool, index_id).unwrap());
        fixture
            .tables
            .get_mut(&table_id)
            .unwrap()
            .indexes
            .push(TxnIndexHandle::new(btree, vec![0]));

        let txn = fixture.txn_mgr.begin().unwrap();
        let handle = &fixture.tables[&table_id];
        let rid = fixture
            .txn_mgr
            .insert(&txn, table_id, handle, vec![Value::Int(5), Value::Char("x".into())])
            .unwrap();

        let mut ctx = fixture.ctx();
        let predicate = IndexPredicate::Eq {
            col: 0,
            value: planner::ResolvedExpr::Literal(Value::Int(5)),
        };
        let mut exec = IndexScanExec::new(
            table_id,
            "idx_users_id".into(),
            predicate,
            vec!["id".into(), "name".into()],
        );
        exec.open(&mut ctx).unwrap();
        let row = exec.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.rid(), Some(rid));
        assert!(exec.next(&mut ctx).unwrap().is_none());
    }
}
