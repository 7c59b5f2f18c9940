//! Test helpers and utilities for executor tests.

use crate::{ExecutionContext, Executor};
use buffer::BufferPoolManager;
use catalog::{Catalog, Column};
use common::{ColumnId, DbError, DbResult, Row, TableId};
use disk::DiskManager;
use expr::{BinaryOp, UnaryOp};
use hashbrown::HashMap;
use lock::LockManager;
use planner::ResolvedExpr;
use std::collections::VecDeque;
use std::sync::Arc;
use storage::HeapFile;
use tempfile::TempDir;
use txn::{TableHandle, Transaction, TransactionManager};
use types::{SqlType, Value};
use wal::LogManager;

/// Mock executor for testing operators in isolation.
///
/// Allows controlled row iteration and error injection for testing.
pub struct MockExecutor {
    rows: VecDeque<Row>,
    schema: Vec<String>,
    next_error: Option<DbError>,
    open_called: bool,
    close_called: bool,
    open_error: Option<DbError>,
    close_error: Option<DbError>,
}

impl MockExecutor {
    /// Create a mock executor that returns the given rows.
    pub fn new(rows: Vec<Row>, schema: Vec<String>) -> Self {
        Self {
            rows: rows.into(),
            schema,
            next_error: None,
            open_called: false,
            close_called: false,
            open_error: None,
            close_error: None,
        }
    }

    /// Create a mock executor that returns an error on next().
    #[allow(dead_code)]
    pub fn with_next_error(error: DbError) -> Self {
        Self {
            rows: VecDeque::new(),
            schema: vec![],
            next_error: Some(error),
            open_called: false,
            close_called: false,
            open_error: None,
            close_error: None,
        }
    }

    /// Create a mock executor that returns an error on open().
    #[allow(dead_code)]
    pub fn with_open_error(error: DbError) -> Self {
        Self {
            rows: VecDeque::new(),
            schema: vec![],
            next_error: None,
            open_called: false,
            close_called: false,
            open_error: Some(error),
            close_error: None,
        }
    }

    /// Create a mock executor that returns an error on close().
    #[allow(dead_code)]
    pub fn with_close_error(error: DbError) -> Self {
        Self {
            rows: VecDeque::new(),
            schema: vec![],
            next_error: None,
            open_called: false,
            close_called: false,
            open_error: None,
            close_error: Some(error),
        }
    }

    #[allow(dead_code)]
    pub fn was_opened(&self) -> bool {
        self.open_called
    }

    #[allow(dead_code)]
    pub fn was_closed(&self) -> bool {
        self.close_called
    }
}

impl Executor for MockExecutor {
    fn open(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        self.open_called = true;
        if let Some(error) = self.open_error.take() {
            return Err(error);
        }
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        if let Some(error) = self.next_error.take() {
            return Err(error);
        }
        Ok(self.rows.pop_front())
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        self.close_called = true;
        if let Some(error) = self.close_error.take() {
            return Err(error);
        }
        Ok(())
    }

    fn schema(&self) -> &[String] {
        &self.schema
    }
}

/// A fully wired, on-disk test harness: disk manager, buffer pool, WAL, lock
/// manager, transaction manager, catalog, and a single open transaction —
/// everything an operator needs for a real `ExecutionContext`.
///
/// Kept alive for the duration of a test; its `TempDir` is removed on drop.
pub struct TestFixture {
    _dir: TempDir,
    pub catalog: Catalog,
    pub tables: HashMap<TableId, TableHandle>,
    pub txn_mgr: TransactionManager,
    pub txn: Arc<Transaction>,
}

impl TestFixture {
    /// Build a fixture with a single table named `users(id INT, name CHAR(16))`.
    pub fn users() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let disk = Arc::new(DiskManager::new(dir.path().join("disk.log")));
        let pool = Arc::new(
            BufferPoolManager::new(dir.path(), 4096, 64, disk.clone(), None)
                .expect("buffer pool"),
        );
        let wal = Arc::new(LogManager::new(disk.clone(), 65536));
        let lock_manager = Arc::new(LockManager::new(200));
        let txn_mgr = TransactionManager::new(lock_manager, wal, pool.clone());

        let mut catalog = Catalog::new();
        let columns = vec![
            Column::new("id", SqlType::Int),
            Column::new("name", SqlType::Char(16)),
        ];
        let table_id = catalog
            .create_table("users", columns)
            .expect("create_table");

        let schema = vec![SqlType::Int, SqlType::Char(16)];
        let heap = Arc::new(HeapFile::create(pool, table_id, schema).expect("heap file"));
        let mut tables = HashMap::new();
        tables.insert(table_id, TableHandle::new(heap, vec![]));

        let txn = txn_mgr.begin().expect("begin txn");

        Self {
            _dir: dir,
            catalog,
            tables,
            txn_mgr,
            txn,
        }
    }

    pub fn table_id(&self) -> TableId {
        *self.tables.keys().next().expect("one table")
    }

    pub fn ctx(&self) -> ExecutionContext<'_> {
        ExecutionContext::new(&self.catalog, &self.tables, &self.txn_mgr, &self.txn)
    }
}

// Row builders

/// Create a row with integer values.
#[allow(dead_code)]
pub fn int_row(values: &[i32]) -> Row {
    Row::new(values.iter().map(|&v| Value::Int(v)).collect())
}

/// Create a row with character values.
#[allow(dead_code)]
pub fn char_row(values: &[&str]) -> Row {
    Row::new(values.iter().map(|&v| Value::Char(v.to_string())).collect())
}

/// Create a row with mixed values.
#[allow(dead_code)]
pub fn make_row(values: Vec<Value>) -> Row {
    Row::new(values)
}

// Expression builders

/// Create a literal expression.
#[allow(dead_code)]
pub fn lit(value: Value) -> ResolvedExpr {
    ResolvedExpr::Literal(value)
}

/// Create a literal integer expression.
#[allow(dead_code)]
pub fn lit_int(value: i32) -> ResolvedExpr {
    ResolvedExpr::Literal(Value::Int(value))
}

/// Create a literal character expression.
#[allow(dead_code)]
pub fn lit_char(value: &str) -> ResolvedExpr {
    ResolvedExpr::Literal(Value::Char(value.to_string()))
}

/// Create a column reference expression.
#[allow(dead_code)]
pub fn col(id: ColumnId) -> ResolvedExpr {
    ResolvedExpr::Column(id)
}

/// Create a binary expression.
#[allow(dead_code)]
pub fn binary(left: ResolvedExpr, op: BinaryOp, right: ResolvedExpr) -> ResolvedExpr {
    ResolvedExpr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Create a unary expression.
#[allow(dead_code)]
pub fn unary(op: UnaryOp, expr: ResolvedExpr) -> ResolvedExpr {
    ResolvedExpr::Unary {
        op,
        expr: Box::new(expr),
    }
}

// Assertion helpers

/// Assert that next() returns the expected row.
#[allow(dead_code)]
pub fn assert_next_row(exec: &mut dyn Executor, ctx: &mut ExecutionContext, expected: Row) {
    match exec.next(ctx) {
        Ok(Some(row)) => assert_eq!(row.values, expected.values, "row mismatch"),
        Ok(None) => panic!("expected row, got None"),
        Err(e) => panic!("expected row, got error: {}", e),
    }
}

/// Assert that next() returns None (exhausted).
#[allow(dead_code)]
pub fn assert_exhausted(exec: &mut dyn Executor, ctx: &mut ExecutionContext) {
    match exec.next(ctx) {
        Ok(None) => {}
        Ok(Some(row)) => panic!("expected exhausted, got row: {:?}", row),
        Err(e) => panic!("expected exhausted, got error: {}", e),
    }
}

/// Assert that a result is an error containing the expected message.
#[allow(dead_code)]
pub fn assert_error_contains<T: std::fmt::Debug>(result: DbResult<T>, expected_msg: &str) {
    match result {
        Ok(val) => panic!(
            "expected error containing '{}', got Ok({:?})",
            expected_msg, val
        ),
        Err(e) => {
            let error_str = format!("{}", e);
            assert!(
                error_str.contains(expected_msg),
                "expected error containing '{}', got '{}'",
                expected_msg,
                error_str
            );
        }
    }
}

/// Assert that a result is a specific error variant.
#[allow(dead_code)]
pub fn assert_executor_error<T: std::fmt::Debug>(result: DbResult<T>) {
    match result {
        Ok(val) => panic!("expected Executor error, got Ok({:?})", val),
        Err(DbError::Executor(_)) => {}
        Err(e) => panic!("expected Executor error, got {}", e),
    }
}

/// Drain an executor (already built, not yet opened) into `out`, using a
/// disposable fixture for the `ExecutionContext` it needs — for operators
/// under test that never touch `ctx` (pure in-memory transforms like
/// `FilterExec`/`ProjectExec`/`SortExec`/`LimitExec`).
#[allow(dead_code)]
pub fn run_executor(exec: &mut dyn Executor, out: &mut Vec<Row>) {
    let fixture = TestFixture::users();
    let mut ctx = fixture.ctx();
    exec.open(&mut ctx).expect("open");
    while let Some(row) = exec.next(&mut ctx).expect("next") {
        out.push(row);
    }
    exec.close(&mut ctx).expect("close");
}
