
pub mod pretty;

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io, path::PathBuf, time::Duration};
use thiserror::Error;
use types::{TypeError, Value};

/// Identifier for a column within a table schema.
pub type ColumnId = u16;

/// Logical identifier for a page in the storage layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub u64);

/// Logical identifier for a table registered in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub u64);

/// Logical identifier for an index registered in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexId(pub u64);

/// Monotonically increasing log sequence number. `0` means "no LSN yet".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Lsn(pub u64);

impl Lsn {
    pub const INVALID: Lsn = Lsn(0);
}

/// Monotonically increasing transaction identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxnId(pub u64);

/// Which on-disk file a page belongs to. The buffer pool keys frames by
/// `(FileTag, PageId)` so table heaps and B+tree indexes share one pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileTag {
    Table(TableId),
    Index(IndexId),
}

impl FileTag {
    /// Relative file name within the data directory.
    pub fn file_name(&self) -> String {
        match self {
            FileTag::Table(t) => format!("table_{}.tbl", t.0),
            FileTag::Index(i) => format!("index_{}.idx", i.0),
        }
    }
}

/// Fully-qualified identifier for a record within a page (spec.md §3 RID).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    /// The sentinel RID representing the gap *after* the last key in a
    /// B+tree leaf chain (spec.md §4.6).
    pub const GAP_END: RecordId = RecordId {
        page_id: PageId(u64::MAX),
        slot: u16::MAX,
    };
}

/// Positional row representation backed by `types::Value`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
    #[serde(skip)]
    #[serde(default)]
    rid: Option<RecordId>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, rid: None }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self::new(values)
    }

    pub fn with_rid(mut self, rid: RecordId) -> Self {
        self.rid = Some(rid);
        self
    }

    pub fn set_rid(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// Named projection of a row keyed by column name.
pub type RowMap = HashMap<String, Value>;

/// Rectangular result set carrying column labels and rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Canonical error type shared across database subsystems.
///
/// The named variants mirror spec.md §7's error table one-for-one; the
/// free-text variants (`Parser`/`Planner`/`Executor`/`Catalog`/`Storage`/
/// `Wal`/`Constraint`) are the ambient bucket the lineage already used for
/// errors that don't need a structured payload. `Io` fulfils the spec's
/// "UnixError" kind: any underlying syscall failure from the disk layer.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database '{0}' already exists")]
    DatabaseExists(String),
    #[error("database '{0}' not found")]
    DatabaseNotFound(String),
    #[error("table '{0}' already exists")]
    TableExists(String),
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("index '{0}' already exists")]
    IndexExists(String),
    #[error("index '{0}' not found")]
    IndexNotFound(String),
    #[error("column '{0}' not found")]
    ColumnNotFound(String),
    #[error("expected {expected} values, got {actual}")]
    InvalidValueCount { expected: usize, actual: usize },
    #[error("incompatible type: cannot convert {from} to {to}")]
    IncompatibleType { from: String, to: String },
    #[error("string of length {actual} exceeds CHAR({max})")]
    StringOverflow { max: usize, actual: usize },
    #[error("value out of range: {0}")]
    ResultOutOfRange(String),
    #[error("invalid datetime: {0}")]
    DateTimeFormat(String),
    #[error("B+tree index entry not found")]
    IndexEntryNotFound,
    #[error("buffer pool full: no evictable frame available")]
    BufferPoolFull,
    #[error("file already exists: {0}")]
    FileExists(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("file is still open: {0}")]
    FileNotClosed(String),
    #[error("file is not open: {0}")]
    FileNotOpen(String),
    #[error("transaction aborted: {0}")]
    TransactionAbort(AbortReason),
    #[error("parse: {0}")]
    Parser(String),
    #[error("plan: {0}")]
    Planner(String),
    #[error("exec: {0}")]
    Executor(String),
    #[error("catalog: {0}")]
    Catalog(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("wal: {0}")]
    Wal(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Why the transaction manager aborted a transaction (spec.md §7/§5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    DeadlockPrevention,
    UpgradeConflict,
    LockOnShrinking,
    CommitAborted,
    NestLoopJoinFileFailure,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AbortReason::DeadlockPrevention => "DEADLOCK-PREVENTION",
            AbortReason::UpgradeConflict => "UPGRADE-CONFLICT",
            AbortReason::LockOnShrinking => "LOCK-ON-SHRINKING",
            AbortReason::CommitAborted => "COMMIT-ABORTED",
            AbortReason::NestLoopJoinFileFailure => "NESTLOOPJOIN-FILE-FAILURE",
        };
        write!(f, "{s}")
    }
}

impl From<TypeError> for DbError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::StringOverflow { max, actual } => DbError::StringOverflow { max, actual },
            TypeError::ResultOutOfRange(msg) => DbError::ResultOutOfRange(msg),
            TypeError::IncompatibleType { from, to } => DbError::IncompatibleType {
                from: from.to_string(),
                to: to.to_string(),
            },
            TypeError::DateTimeFormat(msg) => DbError::DateTimeFormat(msg),
            TypeError::Encoding(msg) => DbError::Storage(msg),
        }
    }
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the database components (spec.md §6
/// Configuration, SPEC_FULL.md §3).
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .page_size(8192)
///     .buffer_pool_pages(512)
///     .wal_enabled(true)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory where table data, catalog metadata, and the WAL file live.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Fixed-size page allocation in bytes.
    #[builder(default = 4096)]
    pub page_size: usize,
    /// Number of pages the buffer pool keeps resident.
    #[builder(default = 256)]
    pub buffer_pool_pages: usize,
    /// Controls whether the write-ahead log is enabled.
    #[builder(default = true)]
    pub wal_enabled: bool,
    /// Size in bytes of each of the log manager's two swap buffers.
    #[builder(default = 65536)]
    pub log_buffer_bytes: usize,
    /// Bound on the lock manager's retry-wait loop (~50us per attempt).
    #[builder(default = 200)]
    pub lock_max_attempt: u32,
    /// Number of pinned leaf pages the bulk-load index cache may hold
    /// before flushing, per spec.md §4.4's LOAD path.
    #[builder(default = 64)]
    pub load_index_cache_pages: usize,
    /// Hash join partition count; fixed at 256 (2^8) per spec.md §4.8.
    #[builder(default = 256)]
    pub partition_count: usize,
    /// Process-wide toggle for diagnostic logging.
    #[builder(default = true)]
    pub logging_enabled: bool,
    /// Process-wide toggle for mirroring results to `output.txt`.
    #[builder(default = false)]
    pub output_file_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            page_size: 4096,
            buffer_pool_pages: 256,
            wal_enabled: true,
            log_buffer_bytes: 65536,
            lock_max_attempt: 200,
            load_index_cache_pages: 64,
            partition_count: 256,
            logging_enabled: true,
            output_file_enabled: false,
        }
    }
}

/// Execution statistics collected during query execution for EXPLAIN ANALYZE.
#[derive(Clone, Debug, Default)]
pub struct ExecutionStats {
    pub open_time: Duration,
    pub total_next_time: Duration,
    pub close_time: Duration,
    pub rows_produced: u64,
    pub rows_filtered: u64,
    pub pages_scanned: u64,
}

impl ExecutionStats {
    pub fn total_time(&self) -> Duration {
        self.open_time + self.total_next_time + self.close_time
    }

    pub fn format_duration(d: Duration) -> String {
        let micros = d.as_micros();
        if micros < 1000 {
            format!("{micros}µs")
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1000.0)
        } else {
            format!("{:.3}s", micros as f64 / 1_000_000.0)
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        AbortReason, Config, DbError, DbResult, ExecutionStats, FileTag, Lsn, RecordBatch,
        RecordId, Row, RowMap, TxnId,
    };
    pub use types::{SqlType, Value};
}
