//! SQL script execution for snapshot testing.
//!
//! Provides utilities to execute multi-statement SQL scripts and capture
//! pretty-printed output suitable for use with the `insta` snapshot testing
//! framework. Mirrors `database::Database`'s statement dispatch (DDL handled
//! directly, everything else planned and executed under its own
//! transaction) but synchronously, against a [`TestContext`].

use crate::context::TestContext;
use catalog::{Column, IndexKind, IndexMeta};
use common::{
    pretty::{self, TableStyleKind},
    DbResult, RecordBatch, Value,
};
use executor::{build_executor, execute_dml, execute_query, format_explain_analyze, ExecutionContext};
use parser::{parse_sql, Statement, TxnControl};
use planner::{explain_physical, PhysicalPlan, Planner, PlanningContext};
use storage::HeapFile;
use std::sync::Arc;
use txn::{IndexHandle, TableHandle, Transaction};
use types::SqlType;

/// Execute a SQL script and return pretty-printed output.
///
/// Creates a fresh isolated test environment, parses and executes each
/// statement in the script, and returns output suitable for snapshot
/// testing.
///
/// # Example
///
/// ```no_run
/// use testsupport::prelude::*;
///
/// let output = run_sql_script(r#"
///     CREATE TABLE users (id INT, name CHAR(32), age INT);
///     INSERT INTO users VALUES (1, 'Alice', 30);
///     INSERT INTO users VALUES (2, 'Bob', 25);
///     SELECT * FROM users WHERE age > 25;
/// "#).unwrap();
///
/// insta::assert_snapshot!(output);
/// ```
pub fn run_sql_script(sql: &str) -> DbResult<String> {
    let mut ctx = TestContext::new()?;
    run_sql_script_with_context(sql, &mut ctx)
}

/// Execute a SQL script using a specific test context.
///
/// This is useful when you need a pre-configured catalog or want to run
/// multiple scripts against the same database state.
///
/// # Example
///
/// ```no_run
/// use testsupport::prelude::*;
///
/// let mut ctx = TestContext::new().unwrap();
///
/// let output1 = run_sql_script_with_context(r#"
///     CREATE TABLE users (id INT, name CHAR(32));
/// "#, &mut ctx).unwrap();
///
/// let output2 = run_sql_script_with_context(r#"
///     INSERT INTO users VALUES (1, 'Alice');
///     SELECT * FROM users;
/// "#, &mut ctx).unwrap();
/// ```
pub fn run_sql_script_with_context(sql: &str, ctx: &mut TestContext) -> DbResult<String> {
    let mut output = String::new();

    let statements = parse_sql(sql)?;
    let mut open_txn: Option<Arc<Transaction>> = None;

    for stmt in statements {
        let result = execute_statement(stmt, ctx, &mut open_txn);
        match result {
            Ok(stmt_output) => {
                if !stmt_output.is_empty() {
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    output.push_str(&stmt_output);
                }
            }
            Err(e) => {
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&format!("Error: {}", e));
            }
        }
    }

    Ok(output)
}

/// Dispatch one statement. `open_txn` mirrors `database::Session`'s
/// per-connection state: once `BEGIN` has run, later statements in the
/// same script share that transaction until the matching
/// `COMMIT`/`ABORT`/`ROLLBACK` instead of each getting its own.
fn execute_statement(
    stmt: Statement,
    ctx: &mut TestContext,
    open_txn: &mut Option<Arc<Transaction>>,
) -> DbResult<String> {
    match stmt {
        Statement::CreateTable {
            name,
            columns,
            primary_key,
        } => execute_create_table(ctx, name, columns, primary_key),
        Statement::DropTable { name } => execute_drop_table(ctx, name),
        Statement::CreateIndex { name, table, column } => {
            execute_create_index(ctx, name, table, column)
        }
        Statement::DropIndex { name } => execute_drop_index(ctx, name),
        Statement::Explain { query, analyze } => execute_explain(ctx, *query, analyze),
        Statement::Load { path, table } => execute_load(ctx, path, table),
        Statement::ShowTables => execute_show_tables(ctx),
        Statement::ShowIndex { table } => execute_show_index(ctx, table),
        Statement::Describe { table } => execute_describe(ctx, table),
        Statement::SetOutputFile(_) => Ok(String::new()),
        Statement::Help => Ok(String::new()),
        Statement::TxnControl(TxnControl::Begin) => {
            if open_txn.is_some() {
                return Err(common::DbError::Executor("a transaction is already open".into()));
            }
            *open_txn = Some(ctx.begin()?);
            Ok("BEGIN.".to_string())
        }
        Statement::TxnControl(TxnControl::Commit) => {
            let txn = open_txn
                .take()
                .ok_or_else(|| common::DbError::Executor("no transaction is open".into()))?;
            ctx.commit(&txn)?;
            Ok("COMMIT.".to_string())
        }
        Statement::TxnControl(TxnControl::Abort) => {
            let txn = open_txn
                .take()
                .ok_or_else(|| common::DbError::Executor("no transaction is open".into()))?;
            ctx.abort(&txn)?;
            Ok("ROLLBACK.".to_string())
        }
        other => match open_txn.clone() {
            Some(txn) => {
                let result = execute_in_open_txn(ctx, other, &txn);
                if result.is_err() {
                    open_txn.take();
                    ctx.abort(&txn).ok();
                }
                result
            }
            None => execute_query_or_dml(ctx, other),
        },
    }
}

/// Run a query/DML statement against a caller-supplied transaction instead
/// of opening/committing one of its own (used once `BEGIN` has run).
fn execute_in_open_txn(ctx: &mut TestContext, stmt: Statement, txn: &Transaction) -> DbResult<String> {
    let mut planning_ctx = PlanningContext::new(ctx.catalog());
    let plan = Planner::plan(stmt, &mut planning_ctx)?;

    let mut exec_ctx: ExecutionContext<'_> = ctx.execution_context(txn);
    match plan {
        PhysicalPlan::Insert { .. } | PhysicalPlan::Update { .. } | PhysicalPlan::Delete { .. } => {
            let count = execute_dml(plan, &mut exec_ctx)?;
            Ok(format!("{} row(s) affected.", count))
        }
        ref query_plan => {
            let schema = infer_schema(query_plan);
            let rows = execute_query(plan, &mut exec_ctx)?;
            let batch = RecordBatch { columns: schema, rows };
            Ok(pretty::render_record_batch(&batch, TableStyleKind::Modern))
        }
    }
}

fn execute_create_table(
    ctx: &mut TestContext,
    name: String,
    columns: Vec<parser::ColumnDef>,
    primary_key: Option<Vec<String>>,
) -> DbResult<String> {
    let catalog_columns: Vec<Column> = columns
        .iter()
        .map(|col| Ok(Column::new(col.name.clone(), map_sql_type(&col.ty)?)))
        .collect::<DbResult<Vec<_>>>()?;

    let table_id = ctx.catalog_mut().create_table(&name, catalog_columns)?;

    if let Some(pk_names) = primary_key {
        let pk_cols: Vec<&str> = pk_names.iter().map(String::as_str).collect();
        ctx.catalog_mut()
            .create_index(&name, &format!("pk_{name}"), &pk_cols, IndexKind::BTree, true)?;
    }

    let table_meta = ctx.catalog().table_by_id(table_id)?;
    let schema_types = table_meta.schema.column_types();
    let indexes: Vec<IndexMeta> = table_meta.indexes().to_vec();

    let pool = ctx.pool();
    let heap = Arc::new(HeapFile::create(pool.clone(), table_id, schema_types)?);
    let index_handles = open_index_handles(&indexes, pool)?;
    ctx.register_table(table_id, TableHandle::new(heap, index_handles));

    Ok(format!("Created table '{}' (id = {}).", name, table_id.0))
}

fn execute_drop_table(ctx: &mut TestContext, name: String) -> DbResult<String> {
    let table_id = ctx.catalog().table(&name)?.id;
    ctx.catalog_mut().drop_table(&name)?;
    ctx.remove_table(table_id);
    Ok(format!("Dropped table '{}'.", name))
}

fn execute_create_index(
    ctx: &mut TestContext,
    name: String,
    table: String,
    column: String,
) -> DbResult<String> {
    let table_id = ctx.catalog().table(&table)?.id;
    ctx.catalog_mut()
        .create_index(&table, &name, &[column.as_str()], IndexKind::BTree, true)?;

    let index_meta = ctx.catalog().table(&table)?.index(&name)?.clone();

    let pool = ctx.pool();
    let btree = btree::BTreeIndex::create(pool, index_meta.id)?;

    {
        let handle = ctx
            .tables()
            .get(&table_id)
            .ok_or_else(|| common::DbError::TableNotFound(table.clone()))?;
        for item in handle.heap.scan() {
            let (rid, row) = item?;
            let key: Vec<Value> = index_meta
                .columns
                .iter()
                .map(|&c| row.values[c as usize].clone())
                .collect();
            btree.insert(key, rid, common::Lsn::INVALID)?;
        }
    }

    let table_handle = ctx
        .table_handle_mut(table_id)
        .ok_or_else(|| common::DbError::TableNotFound(table.clone()))?;
    table_handle
        .indexes
        .push(IndexHandle::new_unique(Arc::new(btree), index_meta.columns.clone()));

    Ok(format!("Created index '{}' on '{}'.", name, table))
}

fn execute_drop_index(ctx: &mut TestContext, name: String) -> DbResult<String> {
    let (table_id, table_name) = ctx
        .catalog()
        .tables()
        .find(|table| table.index(&name).is_ok())
        .map(|table| (table.id, table.name.clone()))
        .ok_or_else(|| common::DbError::Catalog(format!("index '{}' not found", name)))?;
    let index_id = ctx.catalog().table(&table_name)?.index(&name)?.id;

    ctx.catalog_mut().drop_index(&table_name, &name)?;
    if let Some(handle) = ctx.table_handle_mut(table_id) {
        handle.indexes.retain(|idx| idx.index.index_id() != index_id);
    }

    Ok(format!("Dropped index '{}' on '{}'.", name, table_name))
}

fn execute_explain(ctx: &mut TestContext, query: Statement, analyze: bool) -> DbResult<String> {
    let mut planning_ctx = PlanningContext::new(ctx.catalog());
    let plan = Planner::plan(query, &mut planning_ctx)?;

    if !analyze {
        let mut out = String::new();
        out.push_str("EXPLAIN:\n");
        out.push_str(&explain_physical(&plan));
        return Ok(out);
    }

    let plan_description = explain_physical(&plan);
    let txn = ctx.begin()?;

    let outcome = (|| -> DbResult<(usize, String)> {
        let mut exec_ctx = ctx.execution_context(&txn);
        let mut executor = build_executor(plan, ctx.catalog())?;
        executor.open(&mut exec_ctx)?;

        let mut row_count = 0;
        while executor.next(&mut exec_ctx)?.is_some() {
            row_count += 1;
        }
        executor.close(&mut exec_ctx)?;

        Ok((row_count, format_explain_analyze(executor.as_ref())))
    })();

    match outcome {
        Ok((row_count, stats)) => {
            ctx.commit(&txn)?;
            let mut out = String::new();
            out.push_str("EXPLAIN ANALYZE:\n");
            out.push_str(&plan_description);
            out.push_str("\n\nExecution Statistics:\n");
            out.push_str(&stats);
            out.push_str(&format!("\nTotal rows: {row_count}"));
            Ok(out)
        }
        Err(err) => {
            ctx.abort(&txn).ok();
            Err(err)
        }
    }
}

/// Mirrors `database::Database::execute_load`: bulk-inserts a CSV file's
/// rows under one transaction via the same `TransactionManager::insert`
/// path a single-row `INSERT` uses.
fn execute_load(ctx: &mut TestContext, path: String, table: String) -> DbResult<String> {
    let table_meta = ctx.catalog().table(&table)?;
    let table_id = table_meta.id;
    let column_types = table_meta.schema.column_types();

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| common::DbError::Executor(format!("failed to read LOAD file '{}': {}", path, e)))?;

    let txn = ctx.begin()?;
    let outcome = (|| -> DbResult<u64> {
        let mut loaded = 0u64;
        for (line_no, line) in contents.lines().enumerate().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != column_types.len() {
                return Err(common::DbError::Executor(format!(
                    "LOAD line {}: {} field(s), table '{}' has {} column(s)",
                    line_no + 1,
                    fields.len(),
                    table,
                    column_types.len()
                )));
            }
            let values = fields
                .iter()
                .zip(column_types.iter())
                .map(|(raw, ty)| parse_csv_field(raw, ty))
                .collect::<DbResult<Vec<_>>>()?;
            ctx.insert(&txn, table_id, values)?;
            loaded += 1;
        }
        Ok(loaded)
    })();

    match outcome {
        Ok(count) => {
            ctx.commit(&txn)?;
            Ok(format!("{} row(s) affected.", count))
        }
        Err(err) => {
            ctx.abort(&txn).ok();
            Err(err)
        }
    }
}

fn execute_show_tables(ctx: &mut TestContext) -> DbResult<String> {
    let mut names: Vec<&str> = ctx.catalog().tables().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    Ok(if names.is_empty() {
        "(no tables)".to_string()
    } else {
        names.join("\n")
    })
}

fn execute_show_index(ctx: &mut TestContext, table: String) -> DbResult<String> {
    let table_meta = ctx.catalog().table(&table)?;
    if table_meta.indexes().is_empty() {
        return Ok("(no indexes)".to_string());
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
    Ok(lines.join("\n"))
}

fn execute_describe(ctx: &mut TestContext, table: String) -> DbResult<String> {
    let table_meta = ctx.catalog().table(&table)?;
    let lines: Vec<String> = table_meta
        .schema
        .columns
        .iter()
        .map(|col| format!("{} {}", col.name, col.ty.name()))
        .collect();
    Ok(lines.join("\n"))
}

/// Parse one CSV field of a LOAD file into a `Value` of the given column
/// type (spec.md §6's CSV load format).
fn parse_csv_field(raw: &str, ty: &SqlType) -> DbResult<Value> {
    let trimmed = raw.trim();
    match ty {
        SqlType::Int => trimmed
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| common::DbError::Executor(format!("invalid INT value '{}'", trimmed))),
        SqlType::BigInt => trimmed
            .parse::<i64>()
            .map(Value::BigInt)
            .map_err(|_| common::DbError::Executor(format!("invalid BIGINT value '{}'", trimmed))),
        SqlType::Float => trimmed
            .parse::<f32>()
            .map(Value::Float)
            .map_err(|_| common::DbError::Executor(format!("invalid FLOAT value '{}'", trimmed))),
        SqlType::Char(n) => {
            if trimmed.len() > *n as usize {
                return Err(common::DbError::StringOverflow {
                    max: *n as usize,
                    actual: trimmed.len(),
                });
            }
            Ok(Value::Char(trimmed.to_string()))
        }
        SqlType::DateTime => {
            types::validate_datetime(trimmed)?;
            Ok(Value::DateTime(trimmed.to_string()))
        }
    }
}

fn execute_query_or_dml(ctx: &mut TestContext, stmt: Statement) -> DbResult<String> {
    let mut planning_ctx = PlanningContext::new(ctx.catalog());
    let plan = Planner::plan(stmt, &mut planning_ctx)?;

    let txn = ctx.begin()?;

    let result = (|| -> DbResult<String> {
        let mut exec_ctx: ExecutionContext<'_> = ctx.execution_context(&txn);
        match plan {
            PhysicalPlan::Insert { .. } | PhysicalPlan::Update { .. } | PhysicalPlan::Delete { .. } => {
                let count = execute_dml(plan, &mut exec_ctx)?;
                Ok(format!("{} row(s) affected.", count))
            }
            ref query_plan => {
                let schema = infer_schema(query_plan);
                let rows = execute_query(plan, &mut exec_ctx)?;
                let batch = RecordBatch { columns: schema, rows };
                Ok(pretty::render_record_batch(&batch, TableStyleKind::Modern))
            }
        }
    })();

    match result {
        Ok(value) => {
            ctx.commit(&txn)?;
            Ok(value)
        }
        Err(err) => {
            ctx.abort(&txn).ok();
            Err(err)
        }
    }
}

fn open_index_handles(indexes: &[IndexMeta], pool: Arc<buffer::BufferPoolManager>) -> DbResult<Vec<IndexHandle>> {
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

fn map_sql_type(raw: &str) -> DbResult<SqlType> {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "INT" | "INTEGER" => Ok(SqlType::Int),
        "BIGINT" => Ok(SqlType::BigInt),
        "FLOAT" | "DOUBLE" => Ok(SqlType::Float),
        "DATETIME" => Ok(SqlType::DateTime),
        other => {
            if let Some(inner) = other.strip_prefix("CHAR(").and_then(|s| s.strip_suffix(')')) {
                let len: u16 = inner
                    .trim()
                    .parse()
                    .map_err(|_| common::DbError::Parser(format!("invalid CHAR length in '{}'", raw)))?;
                Ok(SqlType::Char(len))
            } else {
                Err(common::DbError::Parser(format!("unsupported SQL type '{}'", other)))
            }
        }
    }
}

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
