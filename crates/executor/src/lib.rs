//! Query executor: executes physical plans using a Volcano-style iterator model.
//!
//! The executor bridges the planner's physical operators with the storage
//! layer, buffer pool, and transaction manager to perform actual query
//! execution. It implements a pull-based iterator model where each operator
//! pulls rows from its children.
//!
//! # Architecture
//!
//! ```text
//! Physical Plan
//!     ↓
//! Build Executor Tree
//!     ↓
//! open() → Initialize resources
//!     ↓
//! next() → Pull rows iteratively
//!     ↓
//! close() → Clean up resources
//! ```
//!
//! Every DML operator (`InsertExec`/`UpdateExec`/`DeleteExec`) routes its
//! writes through [`txn::TransactionManager`] rather than touching
//! `storage::HeapFile`/`btree::BTreeIndex` directly, so the write-ahead log,
//! heap file, and every index on a table stay in lockstep no matter which
//! operator produced the write (spec.md §4.5/§4.8).

mod aggregate;
mod builder;
mod dml;
mod filter;
mod join;
mod limit;
mod project;
mod scan;
mod sort;

pub use aggregate::AggregateExec;
pub use builder::build_executor;
pub use dml::{DeleteExec, InsertExec, UpdateExec};
pub use filter::FilterExec;
pub use join::{HashJoinExec, NestedLoopJoinExec};
pub use limit::LimitExec;
pub use project::ProjectExec;
pub use scan::{IndexScanExec, SeqScanExec};
pub use sort::{SortExec, SortKey};

use catalog::Catalog;
use common::{DbError, DbResult, ExecutionStats, Row, TableId};
use hashbrown::HashMap;
use planner::PhysicalPlan;
use txn::{TableHandle, Transaction, TransactionManager};

/// Volcano-style iterator interface for query execution.
///
/// Each operator implements this trait to provide a pull-based execution
/// model. Operators initialize resources in `open()`, produce rows via
/// `next()`, and clean up in `close()`.
pub trait Executor {
    /// Initialize the operator (open files, allocate buffers, etc.).
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()>;

    /// Fetch the next row, or None if exhausted.
    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>>;

    /// Release resources (close files, flush buffers, etc.).
    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()>;

    /// Return the schema (column names) of rows produced by this operator.
    fn schema(&self) -> &[String];

    /// Per-operator timing/row counters, for `EXPLAIN ANALYZE`. Not every
    /// operator tracks these; `None` means "no stats available".
    fn stats(&self) -> Option<&ExecutionStats> {
        None
    }
}

/// Shared execution context passed to all operators.
///
/// Carries everything a statement needs to read and write data under one
/// transaction: the catalog (for schema/index metadata), every table's open
/// heap file and indexes, and the transaction manager plus the transaction
/// itself that every DML write is attributed to.
pub struct ExecutionContext<'a> {
    pub catalog: &'a Catalog,
    pub tables: &'a HashMap<TableId, TableHandle>,
    pub txn_mgr: &'a TransactionManager,
    pub txn: &'a Transaction,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        catalog: &'a Catalog,
        tables: &'a HashMap<TableId, TableHandle>,
        txn_mgr: &'a TransactionManager,
        txn: &'a Transaction,
    ) -> Self {
        Self {
            catalog,
            tables,
            txn_mgr,
            txn,
        }
    }

    /// Look up the open heap file and indexes for a table.
    pub fn table_handle(&self, table_id: TableId) -> DbResult<&'a TableHandle> {
        self.tables.get(&table_id).ok_or_else(|| {
            DbError::Executor(format!("table {} is not open in this context", table_id.0))
        })
    }

    /// Column names for a table, in ordinal order.
    pub fn table_schema(&self, table_id: TableId) -> DbResult<Vec<String>> {
        let meta = self.catalog.table_by_id(table_id)?;
        Ok(meta.schema.columns.iter().map(|c| c.name.clone()).collect())
    }
}

/// Execute a query plan and return all result rows.
///
/// This is the main entry point for executing SELECT queries that return data.
///
/// # Errors
///
/// Returns `DbError::Executor` if execution fails at any stage.
pub fn execute_query(plan: PhysicalPlan, ctx: &mut ExecutionContext) -> DbResult<Vec<Row>> {
    let mut executor = build_executor(plan, ctx.catalog)?;

    executor.open(ctx)?;

    let mut results = Vec::new();
    while let Some(row) = executor.next(ctx)? {
        results.push(row);
    }

    executor.close(ctx)?;

    Ok(results)
}

/// Execute a DML statement (INSERT/UPDATE/DELETE) and return affected row count.
///
/// DML statements return a single row containing the number of affected rows.
///
/// # Errors
///
/// Returns `DbError::Executor` if execution fails or no result is produced.
pub fn execute_dml(plan: PhysicalPlan, ctx: &mut ExecutionContext) -> DbResult<u64> {
    let mut executor = build_executor(plan, ctx.catalog)?;

    executor.open(ctx)?;

    let result = executor
        .next(ctx)?
        .ok_or_else(|| DbError::Executor("DML operation returned no result".into()))?;

    executor.close(ctx)?;

    match result.values.first() {
        Some(types::Value::Int(count)) => Ok(*count as u64),
        Some(other) => Err(DbError::Executor(format!(
            "DML result count must be integer, got {:?}",
            other
        ))),
        None => Err(DbError::Executor("DML result has no columns".into())),
    }
}

/// Render a human-readable `EXPLAIN ANALYZE` summary from the root operator's
/// stats, falling back to "no statistics" when an operator doesn't track any.
pub fn format_explain_analyze(executor: &dyn Executor) -> String {
    match executor.stats() {
        Some(stats) => format!(
            "rows={} filtered={} pages={} open={} next={} close={} total={}",
            stats.rows_produced,
            stats.rows_filtered,
            stats.pages_scanned,
            ExecutionStats::format_duration(stats.open_time),
            ExecutionStats::format_duration(stats.total_next_time),
            ExecutionStats::format_duration(stats.close_time),
            ExecutionStats::format_duration(stats.total_time()),
        ),
        None => "no statistics available for this operator".to_string(),
    }
}
