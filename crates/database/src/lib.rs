//! Top-level database handle: wires the catalog and the synchronous storage
//! engine (disk manager, buffer pool, write-ahead log, lock manager,
//! transaction manager) together behind one async-friendly API.
//!
//! Every public method takes `&self` and is `async`, but the actual work is
//! synchronous and runs inside `tokio::task::spawn_blocking` so a caller on
//! a shared runtime (the TCP server, the REPL) never blocks it. DDL
//! statements are handled directly here, since the planner rejects them
//! outright (`Planner::lower_to_logical` treats DDL as "handled elsewhere");
//! every other statement goes catalog -> planner -> executor, wrapped in a
//! single transaction that commits on success and aborts on error.

use anyhow::{Context, Result};
use buffer::BufferPoolManager;
use catalog::{Catalog, Column, IndexKind, IndexMeta};
use common::{Config, TableId};
use disk::DiskManager;
use executor::{build_executor, execute_dml, execute_query, format_explain_analyze, ExecutionContext};
use hashbrown::HashMap;
use lock::LockManager;
use parser::{parse_sql, Statement, TxnControl};
use planner::{PhysicalPlan, Planner, PlanningContext};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use storage::HeapFile;
use tokio::sync::RwLock;
use txn::{IndexHandle, Recovery, TableHandle, TransactionManager};
use types::Value;
use wal::LogManager;

/// Text for the `HELP` statement.
const HELP_TEXT: &str = "\
Accepted statements:
  CREATE TABLE t (col ty, ...) [PRIMARY KEY (col, ...)];
  DROP TABLE t;
  CREATE INDEX name ON t (col);
  DROP INDEX name;
  INSERT INTO t VALUES (...);
  DELETE FROM t [WHERE ...];
  UPDATE t SET col = val [, col += val] [WHERE ...];
  SELECT [DISTINCT] {* | col, ... | agg(col) AS name} FROM t [, t] [WHERE ...] [ORDER BY col [ASC|DESC]] [LIMIT n];
  LOAD 'file' INTO t;
  BEGIN; COMMIT; ABORT; ROLLBACK;
  SHOW TABLES;
  SHOW INDEX FROM t;
  DESC t;
  SET output_file = {0|1};
  HELP;
Types: INT, BIGINT, FLOAT, CHAR(n), DATETIME.";

/// Result type for database operations that may include query results.
#[derive(Debug)]
pub enum QueryResult {
    /// Query returned rows
    Rows {
        schema: Vec<String>,
        rows: Vec<common::Row>,
    },
    /// DML operation affected N rows
    Count { affected: u64 },
    /// DDL or other operation with no result
    Empty,
    /// Freeform text output (`HELP`, `SHOW TABLES`, `SHOW INDEX`, `DESC`)
    Text(String),
}

/// Everything that reset() replaces wholesale. Kept apart from `catalog` so
/// a `CREATE TABLE`/`CREATE INDEX` only has to take this write lock, not the
/// catalog's, when it registers a freshly opened heap file or index.
struct Resources {
    pool: Arc<BufferPoolManager>,
    txn_mgr: Arc<TransactionManager>,
    tables: HashMap<TableId, TableHandle>,
}

/// Async database wrapper for multi-threaded server use.
///
/// This is the main entry point for executing SQL statements. Resources are
/// wrapped in `Arc`/`RwLock` for safe concurrent access; all I/O is
/// performed in `spawn_blocking` to avoid blocking the async runtime.
pub struct Database {
    data_dir: Arc<PathBuf>,
    catalog_path: Arc<PathBuf>,
    log_path: Arc<PathBuf>,
    buffer_pages: usize,
    page_size: usize,
    log_buffer_bytes: usize,
    lock_max_attempts: u32,
    catalog: Arc<RwLock<Catalog>>,
    resources: Arc<RwLock<Resources>>,
}

impl Database {
    /// Create a new async database instance.
    ///
    /// Creates the data directory if it doesn't exist, loads the catalog,
    /// opens every table's heap file and indexes, runs crash recovery over
    /// the write-ahead log, and opens the buffer pool. All I/O is performed
    /// in `spawn_blocking`.
    pub async fn new(
        data_dir: &Path,
        catalog_file: &str,
        wal_file: &str,
        buffer_pages: usize,
    ) -> Result<Self> {
        let data_dir_owned = data_dir.to_path_buf();
        let catalog_file_owned = catalog_file.to_string();
        let wal_file_owned = wal_file.to_string();
        let config = Config::default();
        let page_size = config.page_size;
        let log_buffer_bytes = config.log_buffer_bytes;
        let lock_max_attempts = config.lock_max_attempt;

        let (catalog, catalog_path, log_path, pool, txn_mgr, tables) =
            tokio::task::spawn_blocking(move || {
                fs::create_dir_all(&data_dir_owned).with_context(|| {
                    format!(
                        "failed to create data directory {}",
                        data_dir_owned.display()
                    )
                })?;

                let catalog_path = data_dir_owned.join(&catalog_file_owned);
                let log_path = data_dir_owned.join(&wal_file_owned);
                let catalog = Catalog::load(&catalog_path).map_err(anyhow::Error::from)?;

                let disk = Arc::new(DiskManager::new(log_path.as_path()));
                let wal = Arc::new(LogManager::new(disk.clone(), log_buffer_bytes));
                let pool = Arc::new(
                    BufferPoolManager::new(data_dir_owned.as_path(), page_size, buffer_pages, disk, Some(wal.clone()))
                        .map_err(anyhow::Error::from)?,
                );
                let lock_manager = Arc::new(LockManager::new(lock_max_attempts));
                let txn_mgr = Arc::new(TransactionManager::new(lock_manager, wal.clone(), pool.clone()));

                let tables = open_table_handles(&catalog, pool.clone()).map_err(anyhow::Error::from)?;

                let max_txn = wal
                    .replay()
                    .map_err(anyhow::Error::from)?
                    .iter()
                    .map(|frame| frame.record.txn_id().0)
                    .max()
                    .unwrap_or(0);
                txn_mgr.set_next_txn_id(max_txn + 1);
                Recovery::new(pool.clone(), wal.clone(), &tables)
                    .run()
                    .map_err(anyhow::Error::from)?;

                Ok::<_, anyhow::Error>((catalog, catalog_path, log_path, pool, txn_mgr, tables))
            })
            .await??;

        Ok(Self {
            data_dir: Arc::new(data_dir.to_path_buf()),
            catalog_path: Arc::new(catalog_path),
            log_path: Arc::new(log_path),
            buffer_pages,
            page_size,
            log_buffer_bytes,
            lock_max_attempts,
            catalog: Arc::new(RwLock::new(catalog)),
            resources: Arc::new(RwLock::new(Resources {
                pool,
                txn_mgr,
                tables,
            })),
        })
    }

    /// Execute a SQL statement and return results.
    ///
    /// This is the main entry point for SQL execution. Handles DDL
    /// (CREATE/DROP TABLE/INDEX) directly and delegates DML/queries to the
    /// planner and executor.
    pub async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let statements = parse_sql(sql).map_err(anyhow::Error::from)?;

        if statements.is_empty() {
            return Ok(QueryResult::Empty);
        }

        if statements.len() > 1 {
            anyhow::bail!("multiple statements not supported yet");
        }

        let stmt = statements.into_iter().next().unwrap();
        self.execute_statement(stmt).await
    }

    /// Execute a single parsed statement.
    async fn execute_statement(&self, stmt: Statement) -> Result<QueryResult> {
        match stmt {
            Statement::CreateTable {
                name,
                columns,
                primary_key,
            } => self.execute_create_table(name, columns, primary_key).await,

            Statement::DropTable { name } => self.execute_drop_table(name).await,

            Statement::CreateIndex {
                name,
                table,
                column,
            } => self.execute_create_index(name, table, column).await,

            Statement::DropIndex { name } => self.execute_drop_index(name).await,

            Statement::Explain { query, analyze } => self.execute_explain(*query, analyze).await,

            Statement::Load { path, table } => self.execute_load(path, table).await,

            Statement::ShowTables => self.execute_show_tables().await,

            Statement::ShowIndex { table } => self.execute_show_index(table).await,

            Statement::Describe { table } => self.execute_describe(table).await,

            Statement::SetOutputFile(_) => Ok(QueryResult::Empty),

            Statement::Help => Ok(QueryResult::Text(HELP_TEXT.to_string())),

            // A bare `Database::execute` call has no session to hold a
            // transaction open across statements, so `BEGIN`/`COMMIT`/
            // `ABORT` are acknowledged no-ops here; real explicit
            // transactions that span multiple statements go through
            // `Session`, which intercepts `TxnControl` itself.
            Statement::TxnControl(_) => Ok(QueryResult::Empty),

            other => self.execute_query_or_dml(other).await,
        }
    }

    /// Execute CREATE TABLE statement. A `PRIMARY KEY` clause has no
    /// dedicated catalog concept of its own; it is mapped onto an implicit
    /// unique B+tree index named `pk_<table>`, since every index this
    /// engine can build is a unique B+tree.
    async fn execute_create_table(
        &self,
        name: String,
        columns: Vec<parser::ColumnDef>,
        primary_key: Option<Vec<String>>,
    ) -> Result<QueryResult> {
        let catalog_columns: Vec<Column> = columns
            .iter()
            .map(|col| {
                let ty = map_sql_type(&col.ty)?;
                Ok(Column::new(col.name.clone(), ty))
            })
            .collect::<Result<Vec<_>>>()?;

        let catalog = self.catalog.clone();
        let catalog_path = self.catalog_path.clone();
        let resources = self.resources.clone();

        tokio::task::spawn_blocking(move || {
            let mut catalog_w = catalog.blocking_write();

            let table_id = catalog_w
                .create_table(&name, catalog_columns)
                .map_err(anyhow::Error::from)?;

            if let Some(pk_names) = primary_key {
                let pk_cols: Vec<&str> = pk_names.iter().map(String::as_str).collect();
                catalog_w
                    .create_index(&name, &format!("pk_{name}"), &pk_cols, IndexKind::BTree, true)
                    .map_err(anyhow::Error::from)?;
            }

            catalog_w.save(&catalog_path).map_err(anyhow::Error::from)?;

            let table_meta = catalog_w.table_by_id(table_id).map_err(anyhow::Error::from)?;
            let schema_types = table_meta.schema.column_types();
            let indexes: Vec<IndexMeta> = table_meta.indexes().to_vec();

            let mut resources_w = resources.blocking_write();
            let pool = resources_w.pool.clone();
            let heap = Arc::new(HeapFile::create(pool.clone(), table_id, schema_types).map_err(anyhow::Error::from)?);
            let index_handles = open_index_handles(&indexes, pool).map_err(anyhow::Error::from)?;
            resources_w
                .tables
                .insert(table_id, TableHandle::new(heap, index_handles));

            Ok(QueryResult::Empty)
        })
        .await?
    }

    /// Execute DROP TABLE statement.
    async fn execute_drop_table(&self, name: String) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        let catalog_path = self.catalog_path.clone();
        let data_dir = self.data_dir.clone();
        let resources = self.resources.clone();

        tokio::task::spawn_blocking(move || {
            let mut catalog_w = catalog.blocking_write();

            let table_id = catalog_w.table(&name).map_err(anyhow::Error::from)?.id;
            let index_ids: Vec<common::IndexId> = catalog_w
                .table(&name)
                .map_err(anyhow::Error::from)?
                .indexes()
                .iter()
                .map(|idx| idx.id)
                .collect();
            catalog_w.drop_table(&name).map_err(anyhow::Error::from)?;
            catalog_w.save(&catalog_path).map_err(anyhow::Error::from)?;
            drop(catalog_w);

            let mut resources_w = resources.blocking_write();
            resources_w.tables.remove(&table_id);
            drop(resources_w);

            let table_path = data_dir.join(common::FileTag::Table(table_id).file_name());
            if table_path.exists() {
                fs::remove_file(&table_path).ok();
            }
            for index_id in index_ids {
                let index_path = data_dir.join(common::FileTag::Index(index_id).file_name());
                if index_path.exists() {
                    fs::remove_file(&index_path).ok();
                }
            }

            Ok(QueryResult::Empty)
        })
        .await?
    }

    /// Execute CREATE INDEX statement. Every index this engine supports is
    /// a unique B+tree (DESIGN.md records this as a deliberate
    /// simplification - there is no SQL surface for a non-unique one).
    /// Existing rows are backfilled into the new index before it is
    /// registered for live writes.
    async fn execute_create_index(
        &self,
        name: String,
        table: String,
        column: String,
    ) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        let catalog_path = self.catalog_path.clone();
        let resources = self.resources.clone();

        tokio::task::spawn_blocking(move || {
            let mut catalog_w = catalog.blocking_write();

            let table_id = catalog_w.table(&table).map_err(anyhow::Error::from)?.id;
            catalog_w
                .create_index(&table, &name, &[column.as_str()], IndexKind::BTree, true)
                .map_err(anyhow::Error::from)?;
            catalog_w.save(&catalog_path).map_err(anyhow::Error::from)?;

            let index_meta = catalog_w
                .table(&table)
                .map_err(anyhow::Error::from)?
                .index(&name)
                .map_err(anyhow::Error::from)?
                .clone();
            drop(catalog_w);

            let mut resources_w = resources.blocking_write();
            let pool = resources_w.pool.clone();
            let btree = btree::BTreeIndex::create(pool, index_meta.id).map_err(anyhow::Error::from)?;

            let handle = resources_w
                .tables
                .get(&table_id)
                .ok_or_else(|| anyhow::anyhow!("table '{}' is not open", table))?;
            for item in handle.heap.scan() {
                let (rid, row) = item.map_err(anyhow::Error::from)?;
                let key: Vec<Value> = index_meta
                    .columns
                    .iter()
                    .map(|&c| row.values[c as usize].clone())
                    .collect();
                btree.insert(key, rid, common::Lsn::INVALID).map_err(anyhow::Error::from)?;
            }

            let table_handle = resources_w
                .tables
                .get_mut(&table_id)
                .ok_or_else(|| anyhow::anyhow!("table '{}' is not open", table))?;
            table_handle
                .indexes
                .push(IndexHandle::new_unique(Arc::new(btree), index_meta.columns.clone()));

            Ok(QueryResult::Empty)
        })
        .await?
    }

    /// Execute DROP INDEX statement.
    async fn execute_drop_index(&self, name: String) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        let catalog_path = self.catalog_path.clone();
        let resources = self.resources.clone();

        tokio::task::spawn_blocking(move || {
            let mut catalog_w = catalog.blocking_write();

            let (table_id, table_name) = catalog_w
                .tables()
                .find(|table| table.index(&name).is_ok())
                .map(|table| (table.id, table.name.clone()))
                .ok_or_else(|| anyhow::anyhow!("index '{}' not found", name))?;
            let index_id = catalog_w
                .table(&table_name)
                .map_err(anyhow::Error::from)?
                .index(&name)
                .map_err(anyhow::Error::from)?
                .id;

            catalog_w
                .drop_index(&table_name, &name)
                .map_err(anyhow::Error::from)?;
            catalog_w.save(&catalog_path).map_err(anyhow::Error::from)?;
            drop(catalog_w);

            let mut resources_w = resources.blocking_write();
            if let Some(handle) = resources_w.tables.get_mut(&table_id) {
                handle.indexes.retain(|idx| idx.index.index_id() != index_id);
            }

            Ok(QueryResult::Empty)
        })
        .await?
    }

    /// Execute EXPLAIN or EXPLAIN ANALYZE statement.
    async fn execute_explain(&self, query: Statement, analyze: bool) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        let resources = self.resources.clone();

        tokio::task::spawn_blocking(move || {
            let catalog_r = catalog.blocking_read();
            let mut planning_ctx = PlanningContext::new(&catalog_r);
            let plan = Planner::plan(query, &mut planning_ctx).map_err(anyhow::Error::from)?;

            if !analyze {
                let description = planner::explain_physical(&plan);
                return Ok(QueryResult::Rows {
                    schema: vec!["Explain".to_string()],
                    rows: vec![common::Row::new(vec![Value::Char(description)])],
                });
            }

            let plan_description = planner::explain_physical(&plan);
            let resources_r = resources.blocking_read();
            let txn = resources_r.txn_mgr.begin().map_err(anyhow::Error::from)?;

            let outcome = (|| -> anyhow::Result<(usize, String)> {
                let mut ctx = ExecutionContext::new(
                    &catalog_r,
                    &resources_r.tables,
                    &resources_r.txn_mgr,
                    &txn,
                );
                let mut executor = build_executor(plan, &catalog_r).map_err(anyhow::Error::from)?;
                executor.open(&mut ctx).map_err(anyhow::Error::from)?;

                let mut row_count = 0;
                while executor.next(&mut ctx).map_err(anyhow::Error::from)?.is_some() {
                    row_count += 1;
                }
                executor.close(&mut ctx).map_err(anyhow::Error::from)?;

                Ok((row_count, format_explain_analyze(executor.as_ref())))
            })();

            match outcome {
                Ok((row_count, stats)) => {
                    resources_r.txn_mgr.commit(&txn).map_err(anyhow::Error::from)?;
                    let mut output = String::new();
                    output.push_str("EXPLAIN ANALYZE:\n");
                    output.push_str(&plan_description);
                    output.push_str("\n\nExecution Statistics:\n");
                    output.push_str(&stats);
                    output.push_str(&format!("\nTotal rows: {row_count}"));

                    Ok(QueryResult::Rows {
                        schema: vec!["Explain".to_string()],
                        rows: vec![common::Row::new(vec![Value::Char(output)])],
                    })
                }
                Err(err) => {
                    resources_r.txn_mgr.abort(&txn, &resources_r.tables).ok();
                    Err(err)
                }
            }
        })
        .await?
    }

    /// Execute LOAD, bulk-inserting every row of a CSV file into a table
    /// under one transaction. The header row is ignored; fields are
    /// comma-separated and parsed per the table's column types; a row
    /// whose field count does not match the table's column count is an
    /// error. Every row goes through `TransactionManager::insert`, the
    /// same path a single-row `INSERT` uses, so unique-index conflicts and
    /// index maintenance behave identically; this forgoes the pinned-page
    /// fast path spec.md's storage module describes for LOAD, a
    /// deliberate simplification recorded in DESIGN.md.
    async fn execute_load(&self, path: String, table: String) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        let resources = self.resources.clone();

        tokio::task::spawn_blocking(move || {
            let catalog_r = catalog.blocking_read();
            let table_meta = catalog_r.table(&table).map_err(anyhow::Error::from)?;
            let table_id = table_meta.id;
            let column_types = table_meta.schema.column_types();
            drop(catalog_r);

            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read LOAD file '{}'", path))?;

            let resources_r = resources.blocking_read();
            let txn = resources_r.txn_mgr.begin().map_err(anyhow::Error::from)?;
            let handle = resources_r
                .tables
                .get(&table_id)
                .ok_or_else(|| anyhow::anyhow!("table '{}' is not open", table))?;

            let outcome = (|| -> anyhow::Result<u64> {
                let mut loaded = 0u64;
                for (line_no, line) in contents.lines().enumerate().skip(1) {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let fields: Vec<&str> = line.split(',').collect();
                    if fields.len() != column_types.len() {
                        anyhow::bail!(
                            "LOAD line {}: {} field(s), table '{}' has {} column(s)",
                            line_no + 1,
                            fields.len(),
                            table,
                            column_types.len()
                        );
                    }
                    let values = fields
                        .iter()
                        .zip(column_types.iter())
                        .map(|(raw, ty)| parse_csv_field(raw, ty))
                        .collect::<Result<Vec<_>>>()?;
                    resources_r
                        .txn_mgr
                        .insert(&txn, table_id, handle, values)
                        .map_err(anyhow::Error::from)?;
                    loaded += 1;
                }
                Ok(loaded)
            })();

            match outcome {
                Ok(count) => {
                    resources_r.txn_mgr.commit(&txn).map_err(anyhow::Error::from)?;
                    Ok(QueryResult::Count { affected: count })
                }
                Err(err) => {
                    resources_r.txn_mgr.abort(&txn, &resources_r.tables).ok();
                    Err(err)
                }
            }
        })
        .await?
    }

    /// Execute SHOW TABLES.
    async fn execute_show_tables(&self) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || {
            let catalog_r = catalog.blocking_read();
            let mut names: Vec<&str> = catalog_r.tables().map(|t| t.name.as_str()).collect();
            names.sort_unstable();
            let text = if names.is_empty() {
                "(no tables)".to_string()
            } else {
                names.join("\n")
            };
            Ok(QueryResult::Text(text))
        })
        .await?
    }

    /// Execute SHOW INDEX FROM t.
    async fn execute_show_index(&self, table: String) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || {
            let catalog_r = catalog.blocking_read();
            let table_meta = catalog_r.table(&table).map_err(anyhow::Error::from)?;
            if table_meta.indexes().is_empty() {
                return Ok(QueryResult::Text("(no indexes)".to_string()));
            }
            let lines: Vec<String> = table_meta
                .indexes()
                .iter()
                .map(|idx| {
                    let cols: Vec<&str> = idx
                        .columns
                        .iter()
                        .map(|&c| table_meta.schema.columns[c as usize].name.as_str())
                        .collect();
                    format!(
                        "{} ({}){}",
                        idx.name,
                        cols.join(", "),
                        if idx.unique { " UNIQUE" } else { "" }
                    )
                })
                .collect();
            Ok(QueryResult::Text(lines.join("\n")))
        })
        .await?
    }

    /// Execute DESC/DESCRIBE t.
    async fn execute_describe(&self, table: String) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || {
            let catalog_r = catalog.blocking_read();
            let table_meta = catalog_r.table(&table).map_err(anyhow::Error::from)?;
            let lines: Vec<String> = table_meta
                .schema
                .columns
                .iter()
                .map(|col| format!("{} {}", col.name, col.ty.name()))
                .collect();
            Ok(QueryResult::Text(lines.join("\n")))
        })
        .await?
    }

    /// Execute a query or DML statement (SELECT, INSERT, UPDATE, DELETE),
    /// under its own transaction that commits on success and aborts on
    /// error.
    async fn execute_query_or_dml(&self, stmt: Statement) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        let resources = self.resources.clone();

        tokio::task::spawn_blocking(move || {
            let catalog_r = catalog.blocking_read();
            let mut planning_ctx = PlanningContext::new(&catalog_r);
            let plan = Planner::plan(stmt, &mut planning_ctx).map_err(anyhow::Error::from)?;

            let resources_r = resources.blocking_read();
            let txn = resources_r.txn_mgr.begin().map_err(anyhow::Error::from)?;

            let result = (|| -> anyhow::Result<QueryResult> {
                let mut ctx = ExecutionContext::new(
                    &catalog_r,
                    &resources_r.tables,
                    &resources_r.txn_mgr,
                    &txn,
                );
                match plan {
                    PhysicalPlan::Insert { .. }
                    | PhysicalPlan::Update { .. }
                    | PhysicalPlan::Delete { .. } => {
                        let count = execute_dml(plan, &mut ctx).map_err(anyhow::Error::from)?;
                        Ok(QueryResult::Count { affected: count })
                    }
                    ref query_plan => {
                        let schema = infer_schema(query_plan);
                        let rows = execute_query(plan, &mut ctx).map_err(anyhow::Error::from)?;
                        Ok(QueryResult::Rows { schema, rows })
                    }
                }
            })();

            match result {
                Ok(value) => {
                    resources_r.txn_mgr.commit(&txn).map_err(anyhow::Error::from)?;
                    Ok(value)
                }
                Err(err) => {
                    resources_r.txn_mgr.abort(&txn, &resources_r.tables).ok();
                    Err(err)
                }
            }
        })
        .await?
    }

    /// Reset the database by removing every table/index file and the WAL,
    /// then reinitializing an empty catalog and a fresh engine stack.
    pub async fn reset(&self) -> Result<()> {
        let data_dir = self.data_dir.clone();
        let catalog_path = self.catalog_path.clone();
        let log_path = self.log_path.clone();
        let catalog = self.catalog.clone();
        let resources = self.resources.clone();
        let buffer_pages = self.buffer_pages;
        let page_size = self.page_size;
        let log_buffer_bytes = self.log_buffer_bytes;
        let lock_max_attempts = self.lock_max_attempts;

        tokio::task::spawn_blocking(move || {
            {
                let mut catalog_w = catalog.blocking_write();
                let mut resources_w = resources.blocking_write();
                *catalog_w = Catalog::new();
                resources_w.tables.clear();
            }

            for entry in fs::read_dir(&*data_dir)
                .with_context(|| format!("failed to read data directory {}", data_dir.display()))?
                .flatten()
            {
                let path = entry.path();
                if path.is_file() {
                    fs::remove_file(&path).ok();
                }
            }

            let disk = Arc::new(DiskManager::new(log_path.as_path()));
            let wal = Arc::new(LogManager::new(disk.clone(), log_buffer_bytes));
            let pool = Arc::new(
                BufferPoolManager::new(data_dir.as_path(), page_size, buffer_pages, disk, Some(wal.clone()))
                    .map_err(anyhow::Error::from)?,
            );
            let lock_manager = Arc::new(LockManager::new(lock_max_attempts));
            let txn_mgr = Arc::new(TransactionManager::new(lock_manager, wal, pool.clone()));

            let mut catalog_w = catalog.blocking_write();
            *catalog_w = Catalog::load(&catalog_path).map_err(anyhow::Error::from)?;
            drop(catalog_w);

            let mut resources_w = resources.blocking_write();
            *resources_w = Resources {
                pool,
                txn_mgr,
                tables: HashMap::new(),
            };

            Ok(())
        })
        .await?
    }

    /// Get a clone of the catalog Arc for async access.
    ///
    /// Use this to read catalog metadata in async contexts. For synchronous
    /// access within `spawn_blocking`, use `catalog.blocking_read()`.
    pub fn catalog(&self) -> Arc<RwLock<Catalog>> {
        self.catalog.clone()
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Begin an explicit transaction that outlives a single `execute` call.
    /// Used by `Session` once a `BEGIN` statement has been seen.
    async fn begin_explicit_txn(&self) -> Result<Arc<txn::Transaction>> {
        let resources = self.resources.clone();
        tokio::task::spawn_blocking(move || {
            let resources_r = resources.blocking_read();
            resources_r.txn_mgr.begin().map_err(anyhow::Error::from)
        })
        .await?
    }

    /// Commit a transaction previously opened with `begin_explicit_txn`.
    async fn commit_explicit_txn(&self, txn: Arc<txn::Transaction>) -> Result<()> {
        let resources = self.resources.clone();
        tokio::task::spawn_blocking(move || {
            let resources_r = resources.blocking_read();
            resources_r.txn_mgr.commit(&txn).map_err(anyhow::Error::from)
        })
        .await?
    }

    /// Abort a transaction previously opened with `begin_explicit_txn`.
    async fn abort_explicit_txn(&self, txn: Arc<txn::Transaction>) -> Result<()> {
        let resources = self.resources.clone();
        tokio::task::spawn_blocking(move || {
            let resources_r = resources.blocking_read();
            resources_r
                .txn_mgr
                .abort(&txn, &resources_r.tables)
                .map_err(anyhow::Error::from)
        })
        .await?
    }

    /// Plan and execute a query or DML statement against a caller-supplied
    /// transaction instead of opening/committing one of its own. Used by
    /// `Session` once a `BEGIN` is outstanding, so every statement up to
    /// the matching `COMMIT`/`ABORT` shares one transaction.
    async fn execute_in_open_txn(&self, stmt: Statement, txn: Arc<txn::Transaction>) -> Result<QueryResult> {
        let catalog = self.catalog.clone();
        let resources = self.resources.clone();

        tokio::task::spawn_blocking(move || {
            let catalog_r = catalog.blocking_read();
            let mut planning_ctx = PlanningContext::new(&catalog_r);
            let plan = Planner::plan(stmt, &mut planning_ctx).map_err(anyhow::Error::from)?;

            let resources_r = resources.blocking_read();
            let mut ctx = ExecutionContext::new(&catalog_r, &resources_r.tables, &resources_r.txn_mgr, &txn);
            match plan {
                PhysicalPlan::Insert { .. } | PhysicalPlan::Update { .. } | PhysicalPlan::Delete { .. } => {
                    let count = execute_dml(plan, &mut ctx).map_err(anyhow::Error::from)?;
                    Ok(QueryResult::Count { affected: count })
                }
                ref query_plan => {
                    let schema = infer_schema(query_plan);
                    let rows = execute_query(plan, &mut ctx).map_err(anyhow::Error::from)?;
                    Ok(QueryResult::Rows { schema, rows })
                }
            }
        })
        .await?
    }
}

/// A client session's SQL entry point. Plain `Database::execute` treats
/// every statement as its own transaction (DDL and meta-statements
/// included) with no state surviving the call, which is fine until a
/// client sends `BEGIN`: that needs the statements up to the matching
/// `COMMIT`/`ABORT`/`ROLLBACK` to share one transaction. `Session` is the
/// thing that remembers which transaction, if any, is currently open for
/// one client connection; the REPL and TCP server each hold one per
/// connection instead of calling `Database::execute` directly.
pub struct Session {
    db: Arc<Database>,
    txn: Option<Arc<txn::Transaction>>,
}

impl Session {
    pub fn new(db: Arc<Database>) -> Self {
        Session { db, txn: None }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// True while a `BEGIN` is outstanding (no matching `COMMIT`/`ABORT`
    /// has run yet).
    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    pub async fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        let statements = parse_sql(sql).map_err(anyhow::Error::from)?;
        if statements.is_empty() {
            return Ok(QueryResult::Empty);
        }
        if statements.len() > 1 {
            anyhow::bail!("multiple statements not supported yet");
        }
        let stmt = statements.into_iter().next().unwrap();

        match stmt {
            Statement::TxnControl(TxnControl::Begin) => {
                if self.txn.is_some() {
                    anyhow::bail!("a transaction is already open");
                }
                self.txn = Some(self.db.begin_explicit_txn().await?);
                Ok(QueryResult::Empty)
            }
            Statement::TxnControl(TxnControl::Commit) => {
                let txn = self
                    .txn
                    .take()
                    .ok_or_else(|| anyhow::anyhow!("no transaction is open"))?;
                self.db.commit_explicit_txn(txn).await?;
                Ok(QueryResult::Empty)
            }
            Statement::TxnControl(TxnControl::Abort) => {
                let txn = self
                    .txn
                    .take()
                    .ok_or_else(|| anyhow::anyhow!("no transaction is open"))?;
                self.db.abort_explicit_txn(txn).await?;
                Ok(QueryResult::Empty)
            }
            // DDL and the meta-statements (LOAD, SHOW TABLES, ...) have no
            // explicit-transaction story of their own here; they always
            // run and commit on their own, open session transaction or
            // not, the same simplification `execute_create_index`'s
            // backfill already makes for concurrent writers.
            other if self.txn.is_none() => self.db.execute_statement(other).await,
            other => {
                let txn = self.txn.clone().unwrap();
                let result = self.db.execute_in_open_txn(other, txn.clone()).await;
                if result.is_err() {
                    self.txn.take();
                    self.db.abort_explicit_txn(txn).await.ok();
                }
                result
            }
        }
    }
}

/// Parse one CSV field of a LOAD file into a `Value` of the given column
/// type (spec.md §6's CSV load format).
fn parse_csv_field(raw: &str, ty: &types::SqlType) -> Result<Value> {
    let trimmed = raw.trim();
    match ty {
        types::SqlType::Int => trimmed
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| anyhow::anyhow!("invalid INT value '{}'", trimmed)),
        types::SqlType::BigInt => trimmed
            .parse::<i64>()
            .map(Value::BigInt)
            .map_err(|_| anyhow::anyhow!("invalid BIGINT value '{}'", trimmed)),
        types::SqlType::Float => trimmed
            .parse::<f32>()
            .map(Value::Float)
            .map_err(|_| anyhow::anyhow!("invalid FLOAT value '{}'", trimmed)),
        types::SqlType::Char(n) => {
            if trimmed.len() > *n as usize {
                anyhow::bail!("CHAR value '{}' exceeds column length {}", trimmed, n);
            }
            Ok(Value::Char(trimmed.to_string()))
        }
        types::SqlType::DateTime => {
            types::validate_datetime(trimmed).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            Ok(Value::DateTime(trimmed.to_string()))
        }
    }
}

/// Open every catalog table's heap file and indexes, producing the
/// `TableHandle` map a freshly started (or just-reset) `Database` serves
/// queries from.
fn open_table_handles(
    catalog: &Catalog,
    pool: Arc<BufferPoolManager>,
) -> common::DbResult<HashMap<TableId, TableHandle>> {
    let mut tables = HashMap::new();
    for table in catalog.tables() {
        let schema_types = table.schema.column_types();
        let heap = Arc::new(HeapFile::open(pool.clone(), table.id, schema_types)?);
        let index_handles = open_index_handles(table.indexes(), pool.clone())?;
        tables.insert(table.id, TableHandle::new(heap, index_handles));
    }
    Ok(tables)
}

/// Open the B+tree backing each `IndexMeta`, producing the `IndexHandle`s a
/// `TableHandle` is built from.
fn open_index_handles(
    indexes: &[IndexMeta],
    pool: Arc<BufferPoolManager>,
) -> common::DbResult<Vec<IndexHandle>> {
    indexes
        .iter()
        .map(|idx| {
            let index = Arc::new(btree::BTreeIndex::open(pool.clone(), idx.id)?);
            Ok(if idx.unique {
                IndexHandle::new_unique(index, idx.columns.clone())
            } else {
                IndexHandle::new(index, idx.columns.clone())
            })
        })
        .collect()
}

/// Map a parser SQL type string to the internal `SqlType`.
fn map_sql_type(raw: &str) -> Result<types::SqlType> {
    let trimmed = raw.trim();
    let upper = trimmed.to_uppercase();
    match upper.as_str() {
        "INT" | "INTEGER" => Ok(types::SqlType::Int),
        "BIGINT" => Ok(types::SqlType::BigInt),
        "FLOAT" | "DOUBLE" => Ok(types::SqlType::Float),
        "DATETIME" => Ok(types::SqlType::DateTime),
        other => {
            if let Some(inner) = other.strip_prefix("CHAR(").and_then(|s| s.strip_suffix(')')) {
                let len: u16 = inner
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid CHAR length in '{}'", raw))?;
                Ok(types::SqlType::Char(len))
            } else {
                Err(anyhow::anyhow!("unsupported SQL type '{}'", other))
            }
        }
    }
}

/// Infer the output schema from a physical plan.
fn infer_schema(plan: &PhysicalPlan) -> Vec<String> {
    match plan {
        PhysicalPlan::SeqScan { schema, .. } => schema.clone(),
        PhysicalPlan::IndexScan { schema, .. } => schema.clone(),
        PhysicalPlan::Filter { input, .. } => infer_schema(input),
        PhysicalPlan::Project { columns, .. } => {
            columns.iter().map(|(name, _)| name.clone()).collect()
        }
        PhysicalPlan::Sort { input, .. } => infer_schema(input),
        PhysicalPlan::Limit { input, .. } => infer_schema(input),
        PhysicalPlan::Aggregate { func, .. } => {
            let label = match func {
                planner::PlanAggregateFunc::Count => "count",
                planner::PlanAggregateFunc::Sum => "sum",
                planner::PlanAggregateFunc::Min => "min",
                planner::PlanAggregateFunc::Max => "max",
            };
            vec![label.to_string()]
        }
        PhysicalPlan::NestedLoopJoin { schema, .. } => schema.clone(),
        PhysicalPlan::Insert { .. } | PhysicalPlan::Update { .. } | PhysicalPlan::Delete { .. } => {
            vec!["count".to_string()]
        }
    }
}
