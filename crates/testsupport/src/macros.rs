//! Test setup macros for reducing boilerplate across the SQL database test suite.
//!
//! This module provides declarative macros that simplify common test patterns:
//! - Database context setup with tables and schemas
//! - Buffer pool setup for low-level storage tests
//! - Write-ahead log setup for durability tests
//! - Row construction

/// Creates a test database context with a table and schema.
///
/// This macro simplifies the common pattern of creating a `TestContext` with
/// a catalog and one or more tables already open.
///
/// # Syntax
///
/// ```text
/// test_db!(context_var, table: "table_name", cols: ["col1" => Type1, "col2" => Type2, ...])
/// test_db!(context_var, table: "table_name", cols: ["col1" => Type1, ...], pk: ["col1"])
/// ```
///
/// # Examples
///
/// ```
/// use testsupport::test_db;
/// use types::SqlType;
///
/// test_db!(mut ctx, table: "users", cols: ["id" => SqlType::Int, "name" => SqlType::Char(32)]);
/// let txn = ctx.begin().unwrap();
/// let _exec_ctx = ctx.execution_context(&txn);
/// ctx.commit(&txn).unwrap();
/// ```
///
/// ```
/// use testsupport::test_db;
/// use types::SqlType;
///
/// test_db!(mut ctx, table: "users",
///          cols: ["id" => SqlType::Int, "name" => SqlType::Char(32)],
///          pk: ["id"]);
/// ```
#[macro_export]
macro_rules! test_db {
    (mut $ctx:ident, table: $name:expr, cols: [$($col:expr => $typ:expr),+ $(,)?], pk: [$($pk_col:expr),+ $(,)?]) => {
        let mut _catalog = ::catalog::Catalog::new();
        _catalog.create_table(
            $name,
            vec![$(::catalog::Column::new($col, $typ)),+],
        ).unwrap();
        _catalog.create_index(
            $name,
            &format!("pk_{}", $name),
            &[$($pk_col),+],
            ::catalog::IndexKind::BTree,
            true,
        ).unwrap();
        let mut $ctx = $crate::context::TestContext::with_catalog(_catalog).unwrap();
    };

    ($ctx:ident, table: $name:expr, cols: [$($col:expr => $typ:expr),+ $(,)?], pk: [$($pk_col:expr),+ $(,)?]) => {
        let mut _catalog = ::catalog::Catalog::new();
        _catalog.create_table(
            $name,
            vec![$(::catalog::Column::new($col, $typ)),+],
        ).unwrap();
        _catalog.create_index(
            $name,
            &format!("pk_{}", $name),
            &[$($pk_col),+],
            ::catalog::IndexKind::BTree,
            true,
        ).unwrap();
        let $ctx = $crate::context::TestContext::with_catalog(_catalog).unwrap();
    };

    (mut $ctx:ident, table: $name:expr, cols: [$($col:expr => $typ:expr),+ $(,)?]) => {
        let mut _catalog = ::catalog::Catalog::new();
        _catalog.create_table(
            $name,
            vec![$(::catalog::Column::new($col, $typ)),+],
        ).unwrap();
        let mut $ctx = $crate::context::TestContext::with_catalog(_catalog).unwrap();
    };

    ($ctx:ident, table: $name:expr, cols: [$($col:expr => $typ:expr),+ $(,)?]) => {
        let mut _catalog = ::catalog::Catalog::new();
        _catalog.create_table(
            $name,
            vec![$(::catalog::Column::new($col, $typ)),+],
        ).unwrap();
        let $ctx = $crate::context::TestContext::with_catalog(_catalog).unwrap();
    };

    (mut $ctx:ident, tables: [$(($name:expr, [$($col:expr => $typ:expr),+ $(,)?])),+ $(,)?]) => {
        let mut _catalog = ::catalog::Catalog::new();
        $(
            _catalog.create_table(
                $name,
                vec![$(::catalog::Column::new($col, $typ)),+],
            ).unwrap();
        )+
        let mut $ctx = $crate::context::TestContext::with_catalog(_catalog).unwrap();
    };

    ($ctx:ident, tables: [$(($name:expr, [$($col:expr => $typ:expr),+ $(,)?])),+ $(,)?]) => {
        let mut _catalog = ::catalog::Catalog::new();
        $(
            _catalog.create_table(
                $name,
                vec![$(::catalog::Column::new($col, $typ)),+],
            ).unwrap();
        )+
        let $ctx = $crate::context::TestContext::with_catalog(_catalog).unwrap();
    };
}

/// Creates a standalone buffer pool and a table tag for low-level storage tests.
///
/// # Syntax
///
/// ```text
/// test_pool!(pool_var, tag_var)
/// test_pool!(pool_var, tag_var, capacity: 5)
/// ```
///
/// # Examples
///
/// ```
/// use testsupport::test_pool;
///
/// test_pool!(pool, tag);
///
/// let (pid, guard) = pool.new_page(tag).unwrap();
/// drop(guard);
/// let _guard = pool.fetch_page(tag, pid).unwrap();
/// ```
#[macro_export]
macro_rules! test_pool {
    ($pool:ident, $tag:ident) => {
        $crate::test_pool!($pool, $tag, capacity: 10);
    };

    ($pool:ident, $tag:ident, capacity: $cap:expr) => {
        let _dir = ::tempfile::tempdir().unwrap();
        let _disk = ::std::sync::Arc::new(::disk::DiskManager::new(_dir.path().join("test.wal")));
        let $pool = ::buffer::BufferPoolManager::new(_dir.path(), 4096, $cap, _disk, None).unwrap();
        let $tag = ::common::FileTag::Table(::common::TableId(1));
    };
}

/// Creates a standalone write-ahead log for durability tests.
///
/// # Syntax
///
/// ```text
/// test_wal!(wal_var)
/// ```
///
/// # Examples
///
/// ```
/// use testsupport::test_wal;
/// use wal::LogRecord;
/// use common::{TableId, Lsn};
/// use types::Value;
///
/// test_wal!(wal);
///
/// let lsn = wal.append(
///     LogRecord::Insert {
///         txn: common::TxnId(1),
///         table: TableId(1),
///         rid: common::RecordId { page_id: common::PageId(0), slot: 0 },
///         row: vec![Value::Int(1), Value::Char("Alice".into())],
///     },
///     Lsn::INVALID,
/// ).unwrap();
/// ```
#[macro_export]
macro_rules! test_wal {
    ($wal:ident) => {
        let _dir = ::tempfile::tempdir().unwrap();
        let _disk = ::std::sync::Arc::new(::disk::DiskManager::new(_dir.path().join("test.wal")));
        let $wal = ::wal::LogManager::new(_disk, 1 << 16);
    };
}

/// Creates a Row with typed values.
///
/// # Syntax
///
/// ```text
/// row![Value1, Value2, ...]    // Mixed values
/// row![int: 1, 2, 3]           // All integers
/// row![char: "alice", "bob"]   // All CHAR values
/// ```
///
/// # Examples
///
/// ```
/// use testsupport::row;
/// use types::Value;
///
/// let r = row![Value::Int(1), Value::Char("Alice".into())];
/// assert_eq!(r.values.len(), 2);
/// ```
///
/// ```
/// use testsupport::row;
///
/// let r = row![int: 1, 2, 3];
/// assert_eq!(r.values.len(), 3);
/// ```
///
/// ```
/// use testsupport::row;
///
/// let r = row![char: "alice", "bob", "charlie"];
/// assert_eq!(r.values.len(), 3);
/// ```
#[macro_export]
macro_rules! row {
    [$($val:expr),+ $(,)?] => {
        ::common::Row::new(vec![$($val),+])
    };

    [int: $($val:expr),+ $(,)?] => {
        ::common::Row::new(vec![$(::types::Value::Int($val)),+])
    };

    [char: $($val:expr),+ $(,)?] => {
        ::common::Row::new(vec![$(::types::Value::Char($val.to_string())),+])
    };
}
