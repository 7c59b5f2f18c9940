//! Test execution context and database state management.
//!
//! Provides helpers for creating isolated test environments with temporary
//! storage, catalog, buffer pool, and write-ahead log. Each test gets its
//! own clean state that is automatically cleaned up on drop. Mirrors the
//! construction sequence `database::Database::new` uses against the real
//! storage stack, minus the async wrapper.

use buffer::BufferPoolManager;
use catalog::{Catalog, Column};
use common::{DbResult, RecordId, Row, TableId};
use disk::DiskManager;
use executor::ExecutionContext;
use hashbrown::HashMap;
use lock::LockManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::HeapFile;
use tempfile::TempDir;
use txn::{IndexHandle, TableHandle, Transaction, TransactionManager};
use wal::LogManager;

const TEST_PAGE_SIZE: usize = 4096;
const TEST_POOL_PAGES: usize = 32;
const TEST_LOCK_MAX_ATTEMPTS: u32 = 50;

/// A test execution context with isolated temporary storage.
///
/// Owns a full, private copy of the storage stack: a [`DiskManager`], a
/// [`LogManager`], a [`BufferPoolManager`], a [`LockManager`], a
/// [`TransactionManager`], and a [`Catalog`]. All components are backed by
/// files under a temporary directory that is removed when the context is
/// dropped.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
///
/// let mut ctx = TestContext::new().unwrap();
/// let txn = ctx.begin().unwrap();
/// let exec_ctx = ctx.execution_context(&txn);
/// ctx.commit(&txn).unwrap();
/// ```
pub struct TestContext {
    _temp_dir: TempDir,
    data_dir: PathBuf,
    pool: Arc<BufferPoolManager>,
    txn_mgr: Arc<TransactionManager>,
    catalog: Catalog,
    tables: HashMap<TableId, TableHandle>,
}

impl TestContext {
    /// Create a new test context with an empty catalog.
    pub fn new() -> DbResult<Self> {
        let temp_dir = tempfile::tempdir()?;
        Self::with_dir_and_catalog(temp_dir, Catalog::new())
    }

    /// Create a test context using an existing temporary directory.
    pub fn with_dir(temp_dir: TempDir) -> DbResult<Self> {
        Self::with_dir_and_catalog(temp_dir, Catalog::new())
    }

    /// Create a test context with a pre-populated catalog.
    ///
    /// Opens a heap file (and any declared indexes) for every table the
    /// catalog already describes, so callers can start inserting rows
    /// immediately.
    ///
    /// # Example
    ///
    /// ```
    /// use catalog::{Catalog, Column};
    /// use types::SqlType;
    /// use testsupport::prelude::*;
    ///
    /// let mut catalog = Catalog::new();
    /// catalog.create_table("users", vec![
    ///     Column::new("id", SqlType::Int),
    ///     Column::new("name", SqlType::Char(32)),
    /// ]).unwrap();
    ///
    /// let ctx = TestContext::with_catalog(catalog).unwrap();
    /// ```
    pub fn with_catalog(catalog: Catalog) -> DbResult<Self> {
        let temp_dir = tempfile::tempdir()?;
        Self::with_dir_and_catalog(temp_dir, catalog)
    }

    fn with_dir_and_catalog(temp_dir: TempDir, catalog: Catalog) -> DbResult<Self> {
        let data_dir = temp_dir.path().to_path_buf();
        let log_path = data_dir.join("test.wal");

        let disk = Arc::new(DiskManager::new(log_path.as_path()));
        let wal = Arc::new(LogManager::new(disk.clone(), 1 << 16));
        let pool = Arc::new(BufferPoolManager::new(
            data_dir.as_path(),
            TEST_PAGE_SIZE,
            TEST_POOL_PAGES,
            disk,
            Some(wal.clone()),
        )?);
        let lock_manager = Arc::new(LockManager::new(TEST_LOCK_MAX_ATTEMPTS));
        let txn_mgr = Arc::new(TransactionManager::new(lock_manager, wal, pool.clone()));

        let mut tables = HashMap::new();
        for table in catalog.tables() {
            let schema = table.schema.columns.iter().map(|c| c.ty).collect::<Vec<_>>();
            let heap = Arc::new(HeapFile::create(pool.clone(), table.id, schema)?);
            let mut indexes = Vec::new();
            for index in table.indexes() {
                let btree = Arc::new(btree::BTreeIndex::create(pool.clone(), index.id)?);
                let handle = if index.unique {
                    IndexHandle::new_unique(btree, index.columns.clone())
                } else {
                    IndexHandle::new(btree, index.columns.clone())
                };
                indexes.push(handle);
            }
            tables.insert(table.id, TableHandle::new(heap, indexes));
        }

        Ok(Self {
            _temp_dir: temp_dir,
            data_dir,
            pool,
            txn_mgr,
            catalog,
            tables,
        })
    }

    /// Create a new table, opening its heap file immediately.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> DbResult<TableId> {
        let schema: Vec<_> = columns.iter().map(|c| c.ty).collect();
        let table_id = self.catalog.create_table(name, columns)?;
        let heap = Arc::new(HeapFile::create(self.pool.clone(), table_id, schema)?);
        self.tables.insert(table_id, TableHandle::new(heap, Vec::new()));
        Ok(table_id)
    }

    /// Begin a new transaction against this context's transaction manager.
    pub fn begin(&self) -> DbResult<Arc<Transaction>> {
        self.txn_mgr.begin()
    }

    /// Commit a transaction.
    pub fn commit(&self, txn: &Transaction) -> DbResult<()> {
        self.txn_mgr.commit(txn)
    }

    /// Abort a transaction, rolling back its write set.
    pub fn abort(&self, txn: &Transaction) -> DbResult<()> {
        self.txn_mgr.abort(txn, &self.tables)
    }

    /// Build an [`ExecutionContext`] for running a plan under `txn`.
    pub fn execution_context<'a>(&'a self, txn: &'a Transaction) -> ExecutionContext<'a> {
        ExecutionContext::new(&self.catalog, &self.tables, &self.txn_mgr, txn)
    }

    /// Insert `values` into `table` within `txn`, via the transaction
    /// manager (so indexes and the write-ahead log stay consistent).
    pub fn insert(
        &self,
        txn: &Transaction,
        table: TableId,
        values: Vec<types::Value>,
    ) -> DbResult<RecordId> {
        let handle = self.table_handle(table)?;
        self.txn_mgr.insert(txn, table, handle, values)
    }

    fn table_handle(&self, table: TableId) -> DbResult<&TableHandle> {
        self.tables
            .get(&table)
            .ok_or_else(|| common::DbError::TableNotFound(table.0.to_string()))
    }

    /// Get the path to the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get a reference to the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get a mutable reference to the catalog.
    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    /// Get the open table handles.
    pub fn tables(&self) -> &HashMap<TableId, TableHandle> {
        &self.tables
    }

    /// Get the underlying buffer pool, for opening heap files/indexes
    /// outside of the convenience methods above.
    pub fn pool(&self) -> Arc<BufferPoolManager> {
        self.pool.clone()
    }

    /// Get the underlying transaction manager.
    pub fn txn_mgr(&self) -> &TransactionManager {
        &self.txn_mgr
    }

    /// Register a table handle directly, bypassing [`Self::create_table`].
    /// Used after a catalog mutation that already created the table.
    pub fn register_table(&mut self, id: TableId, handle: TableHandle) {
        self.tables.insert(id, handle);
    }

    /// Remove a previously registered table handle.
    pub fn remove_table(&mut self, id: TableId) {
        self.tables.remove(&id);
    }

    /// Get a mutable reference to an open table handle, e.g. to push a
    /// freshly backfilled index onto it.
    pub fn table_handle_mut(&mut self, table: TableId) -> Option<&mut TableHandle> {
        self.tables.get_mut(&table)
    }
}

/// Helper function to create a basic test catalog with a simple table.
///
/// Creates a catalog with a "users" table containing:
/// - id: INT (column 0)
/// - name: CHAR(32) (column 1)
/// - age: INT (column 2)
///
/// This is useful for basic tests that don't need complex schemas.
pub fn create_simple_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .create_table(
            "users",
            vec![
                Column::new("id".to_string(), types::SqlType::Int),
                Column::new("name".to_string(), types::SqlType::Char(32)),
                Column::new("age".to_string(), types::SqlType::Int),
            ],
        )
        .expect("failed to create users table");
    catalog
}

/// Helper function to insert test rows into a table already open in `ctx`.
///
/// Inserts each row in its own transaction, committing immediately, so
/// callers don't need to manage transaction lifecycles just to seed data.
///
/// # Example
///
/// ```no_run
/// use types::Value;
/// use testsupport::prelude::*;
///
/// let mut ctx = TestContext::new().unwrap();
/// let table_id = ctx.create_table("users", vec![]).unwrap();
///
/// let rows = vec![
///     vec![Value::Int(1), Value::Char("Alice".into())],
///     vec![Value::Int(2), Value::Char("Bob".into())],
/// ];
///
/// insert_test_rows(&ctx, table_id, rows).unwrap();
/// ```
pub fn insert_test_rows(
    ctx: &TestContext,
    table_id: TableId,
    rows: Vec<Vec<types::Value>>,
) -> DbResult<()> {
    for values in rows {
        let txn = ctx.begin()?;
        ctx.insert(&txn, table_id, values)?;
        ctx.commit(&txn)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let ctx = TestContext::new();
        assert!(ctx.is_ok());
    }

    #[test]
    fn test_context_with_catalog() {
        let catalog = create_simple_catalog();
        let ctx = TestContext::with_catalog(catalog);
        assert!(ctx.is_ok());

        let ctx = ctx.unwrap();
        assert!(ctx.catalog().table("users").is_ok());
    }

    #[test]
    fn test_execution_context() {
        let ctx = TestContext::new().unwrap();
        let txn = ctx.begin().unwrap();
        let _exec_ctx = ctx.execution_context(&txn);
        ctx.commit(&txn).unwrap();
    }

    #[test]
    fn test_simple_catalog() {
        let catalog = create_simple_catalog();
        let table = catalog.table("users").unwrap();
        assert_eq!(table.name, "users");
        assert_eq!(table.schema.columns.len(), 3);
    }

    #[test]
    fn test_insert_and_scan() {
        let mut ctx = TestContext::new().unwrap();
        let table_id = ctx
            .create_table(
                "users",
                vec![
                    Column::new("id".to_string(), types::SqlType::Int),
                    Column::new("name".to_string(), types::SqlType::Char(32)),
                ],
            )
            .unwrap();

        insert_test_rows(
            &ctx,
            table_id,
            vec![
                vec![types::Value::Int(1), types::Value::Char("Alice".into())],
                vec![types::Value::Int(2), types::Value::Char("Bob".into())],
            ],
        )
        .unwrap();

        let handle = ctx.tables().get(&table_id).unwrap();
        let count = handle.heap.scan().count();
        assert_eq!(count, 2);
    }
}
