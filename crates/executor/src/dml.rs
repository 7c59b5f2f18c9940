//! DML operators: `InsertExec`, `UpdateExec`, `DeleteExec` (spec.md §4.5/§4.8).
//!
//! Every mutation routes through `txn::TransactionManager`, which is what
//! actually appends the WAL record, writes the heap row, and maintains the
//! table's indexes — these operators only evaluate expressions and supply
//! the table/RID the manager needs.

use crate::filter::eval as eval_scalar;
use crate::{ExecutionContext, Executor};
use common::{ColumnId, DbError, DbResult, Row, TableId};
use planner::{AssignOp, ResolvedExpr};
use txn::TableHandle;
use types::Value;

/// Insert operator - evaluates its value-expression list once and inserts
/// the resulting row. Returns a single row containing the affected count
/// (always 1).
pub struct InsertExec {
    table_id: TableId,
    schema: Vec<String>,
    values: Vec<ResolvedExpr>,
    executed: bool,
}

impl InsertExec {
    pub fn new(table_id: TableId, schema: Vec<String>, values: Vec<ResolvedExpr>) -> Self {
        Self {
            table_id,
            schema,
            values,
            executed: false,
        }
    }

    /// Phantom check: for every index on the table, if a concurrent range
    /// scan already holds the gap `row_values` would land in, block until
    /// that scan's transaction ends (or abort once the retry budget is
    /// exhausted) before inserting into the range it relied on being stable
    /// (spec.md §4.7's next-key locking on the insert path, mirroring
    /// `lock_range_gaps` on the scan side).
    fn check_gap_locks(
        &self,
        ctx: &ExecutionContext,
        handle: &TableHandle,
        row_values: &[Value],
    ) -> DbResult<()> {
        let lock_manager = ctx.txn_mgr.lock_manager();
        for idx in &handle.indexes {
            let key: Vec<Value> = idx
                .key_columns
                .iter()
                .map(|&c| row_values[c as usize].clone())
                .collect();
            if let Some((_, next_rid)) = idx.index.upper_bound(&key)? {
                lock_manager.try_lock_in_gap(ctx.txn.id(), idx.index.index_id(), next_rid)?;
            }
        }
        Ok(())
    }
}

impl Executor for InsertExec {
    fn open(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        self.executed = false;
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        if self.executed {
            return Ok(None);
        }
        self.executed = true;

        // INSERT values are literals (or expressions over no columns), so
        // there's no row context to evaluate them against.
        let empty_row = Row::new(Vec::new());
        let mut row_values = Vec::with_capacity(self.values.len());
        for expr in &self.values {
            row_values.push(eval_scalar(expr, &empty_row)?);
        }

        let handle = ctx.table_handle(self.table_id)?;
        self.check_gap_locks(ctx, handle, &row_values)?;
        ctx.txn_mgr.insert(ctx.txn, self.table_id, handle, row_values)?;

        Ok(Some(Row::new(vec![Value::Int(1)])))
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        Ok(())
    }

    fn schema(&self) -> &[String] {
        &self.schema
    }
}

/// Update operator - pulls matching rows from its child (which must tag
/// each row with its `RecordId`, e.g. a `SeqScanExec`/`IndexScanExec`,
/// possibly filtered), applies the `SET` assignments, and writes the new
/// row back through the transaction manager. Returns a single row
/// containing the number of rows updated.
pub struct UpdateExec {
    table_id: TableId,
    schema: Vec<String>,
    input: Box<dyn Executor>,
    assignments: Vec<(ColumnId, AssignOp, ResolvedExpr)>,
    executed: bool,
}

impl UpdateExec {
    pub fn new(
        table_id: TableId,
        schema: Vec<String>,
        input: Box<dyn Executor>,
        assignments: Vec<(ColumnId, AssignOp, ResolvedExpr)>,
    ) -> Self {
        Self {
            table_id,
            schema,
            input,
            assignments,
            executed: false,
        }
    }

    fn apply_assignments(&self, old_row: &Row) -> DbResult<Vec<Value>> {
        let mut new_values = old_row.values.clone();

        for (col_id, op, expr) in &self.assignments {
            let idx = *col_id as usize;
            if idx >= new_values.len() {
                return Err(DbError::Executor(format!(
                    "column index {} out of bounds (row has {} columns)",
                    idx,
                    new_values.len()
                )));
            }
            let rhs = eval_scalar(expr, old_row)?;
            new_values[idx] = match op {
                AssignOp::Set => rhs,
                AssignOp::Add => new_values[idx]
                    .checked_add(&rhs)
                    .map_err(|e| DbError::Executor(e.to_string()))?,
            };
        }

        Ok(new_values)
    }
}

impl Executor for UpdateExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.executed = false;
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        if self.executed {
            return Ok(None);
        }

        let mut count: i32 = 0;
        while let Some(old_row) = self.input.next(ctx)? {
            let rid = old_row.rid().ok_or_else(|| {
                DbError::Executor("UPDATE input row has no RecordId to update".into())
            })?;
            let new_values = self.apply_assignments(&old_row)?;

            let handle = ctx.table_handle(self.table_id)?;
            ctx.txn_mgr
                .update(ctx.txn, self.table_id, handle, rid, new_values)?;
            count += 1;
        }

        self.executed = true;
        Ok(Some(Row::new(vec![Value::Int(count)])))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }

    fn schema(&self) -> &[String] {
        &self.schema
    }
}

/// Delete operator - pulls matching, RID-tagged rows from its child and
/// deletes each through the transaction manager. Returns a single row
/// containing the number of rows deleted.
pub struct DeleteExec {
    table_id: TableId,
    schema: Vec<String>,
    input: Box<dyn Executor>,
    executed: bool,
}

impl DeleteExec {
    pub fn new(table_id: TableId, schema: Vec<String>, input: Box<dyn Executor>) -> Self {
        Self {
            table_id,
            schema,
            input,
            executed: false,
        }
    }
}

impl Executor for DeleteExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.executed = false;
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        if self.executed {
            return Ok(None);
        }

        let mut count: i32 = 0;
        while let Some(row) = self.input.next(ctx)? {
            let rid = row
                .rid()
                .ok_or_else(|| DbError::Executor("DELETE input row has no RecordId to delete".into()))?;

            let handle = ctx.table_handle(self.table_id)?;
            ctx.txn_mgr.delete(ctx.txn, self.table_id, handle, rid)?;
            count += 1;
        }

        self.executed = true;
        Ok(Some(Row::new(vec![Value::Int(count)])))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }

    fn schema(&self) -> &[String] {
        &self.schema
    }
}
