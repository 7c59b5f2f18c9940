//! Write-Ahead Log manager and crash recovery primitives.
//!
//! Every change to table or index pages is first appended to the log as a
//! [`LogFrame`] before the corresponding page is allowed to reach disk (the
//! WAL-obedience rule enforced by `buffer::BufferPoolManager`). Frames carry
//! an LSN, a per-transaction previous-LSN link, and the logical operation,
//! so recovery can redo committed work and undo the rest (spec.md §4.5).
//!
//! The log itself is a single append-only file (shared with all tables)
//! accessed through [`disk::DiskManager`]. Appends land in an in-memory
//! buffer; a background thread swaps it out and calls `fsync` roughly every
//! 30ms, or immediately when [`LogManager::force_flush`] is asked to wait
//! for a specific LSN (the WAL-obedience rule on the buffer pool's eviction
//! path).

#[cfg(test)]
mod tests;

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};
use common::{DbError, DbResult, Lsn, RecordId, TableId, TxnId};
use disk::DiskManager;
use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use types::Value;

fn bincode_config() -> impl Config {
    config::legacy()
}

/// The logical operation carried by a [`LogFrame`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LogRecord {
    Begin {
        txn: TxnId,
    },
    Commit {
        txn: TxnId,
    },
    Abort {
        txn: TxnId,
    },
    Insert {
        txn: TxnId,
        table: TableId,
        rid: RecordId,
        row: Vec<Value>,
    },
    Delete {
        txn: TxnId,
        table: TableId,
        rid: RecordId,
        row: Vec<Value>,
    },
    Update {
        txn: TxnId,
        table: TableId,
        rid: RecordId,
        old_row: Vec<Value>,
        new_row: Vec<Value>,
    },
}

impl LogRecord {
    pub fn txn_id(&self) -> TxnId {
        match self {
            LogRecord::Begin { txn }
            | LogRecord::Commit { txn }
            | LogRecord::Abort { txn }
            | LogRecord::Insert { txn, .. }
            | LogRecord::Delete { txn, .. }
            | LogRecord::Update { txn, .. } => *txn,
        }
    }
}

/// A log record together with its assigned LSN and the previous LSN written
/// by the same transaction (`Lsn::INVALID` if this is that transaction's
/// first record).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogFrame {
    pub lsn: Lsn,
    pub prev_lsn: Lsn,
    pub record: LogRecord,
}

struct State {
    active: Vec<u8>,
    last_lsn: Lsn,
}

struct Inner {
    disk: Arc<DiskManager>,
    state: Mutex<State>,
    flushed: Condvar,
    global_lsn: AtomicU64,
    persist_lsn: AtomicI64,
    need_flush: AtomicBool,
    shutdown: AtomicBool,
    buffer_bytes: usize,
}

/// Owns the shared log buffer and its background flush thread.
pub struct LogManager {
    inner: Arc<Inner>,
    flush_thread: Option<JoinHandle<()>>,
}

impl LogManager {
    pub fn new(disk: Arc<DiskManager>, buffer_bytes: usize) -> Self {
        let inner = Arc::new(Inner {
            disk,
            state: Mutex::new(State {
                active: Vec::with_capacity(buffer_bytes),
                last_lsn: Lsn::INVALID,
            }),
            flushed: Condvar::new(),
            global_lsn: AtomicU64::new(0),
            persist_lsn: AtomicI64::new(-1),
            need_flush: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            buffer_bytes,
        });

        let thread_inner = inner.clone();
        let flush_thread = std::thread::Builder::new()
            .name("wal-flush".into())
            .spawn(move || run_flush_loop(thread_inner))
            .expect("spawn wal flush thread");

        Self {
            inner,
            flush_thread: Some(flush_thread),
        }
    }

    /// Append a record to the in-memory buffer and return its assigned LSN.
    /// `prev_lsn` should be the transaction's own last LSN (or
    /// `Lsn::INVALID` for its first record).
    pub fn append(&self, record: LogRecord, prev_lsn: Lsn) -> DbResult<Lsn> {
        let lsn = Lsn(self.inner.global_lsn.fetch_add(1, Ordering::SeqCst));
        let frame = LogFrame {
            lsn,
            prev_lsn,
            record,
        };
        let bytes = encode_to_vec(&frame, bincode_config())
            .map_err(|e| DbError::Wal(format!("serialize log frame failed: {e}")))?;
        let framed_len = bytes.len() + 4;

        let mut state = self.inner.state.lock();
        while state.active.len() + framed_len > self.inner.buffer_bytes && !state.active.is_empty() {
            self.inner.need_flush.store(true, Ordering::SeqCst);
            self.inner.flushed.notify_all();
            self.inner.flushed.wait_for(&mut state, Duration::from_millis(30));
        }
        state.active.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        state.active.extend_from_slice(&bytes);
        state.last_lsn = lsn;
        trace!("wal append lsn={} prev={}", lsn.0, prev_lsn.0);
        Ok(lsn)
    }

    /// Block until every record up to and including `lsn` is durable.
    pub fn force_flush(&self, lsn: Lsn) -> DbResult<()> {
        if lsn == Lsn::INVALID {
            return Ok(());
        }
        if self.inner.persist_lsn.load(Ordering::SeqCst) >= lsn.0 as i64 {
            return Ok(());
        }
        let mut state = self.inner.state.lock();
        self.inner.need_flush.store(true, Ordering::SeqCst);
        self.inner.flushed.notify_all();
        while self.inner.persist_lsn.load(Ordering::SeqCst) < lsn.0 as i64 {
            self.inner.flushed.wait_for(&mut state, Duration::from_millis(50));
        }
        Ok(())
    }

    pub fn persist_lsn(&self) -> Option<Lsn> {
        let v = self.inner.persist_lsn.load(Ordering::SeqCst);
        if v < 0 { None } else { Some(Lsn(v as u64)) }
    }

    /// Restore the LSN counters after recovery has scanned the existing log.
    pub fn set_next_lsn(&self, next: Lsn) {
        self.inner.global_lsn.store(next.0, Ordering::SeqCst);
        self.inner
            .persist_lsn
            .store(next.0 as i64 - 1, Ordering::SeqCst);
    }

    /// Read every frame currently durable on disk, in log order.
    pub fn replay(&self) -> DbResult<Vec<LogFrame>> {
        read_all_frames(&self.inner.disk)
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.flushed.notify_all();
        if let Some(handle) = self.flush_thread.take() {
            let _ = handle.join();
        }
    }
}

fn run_flush_loop(inner: Arc<Inner>) {
    loop {
        {
            let mut state = inner.state.lock();
            if !inner.need_flush.load(Ordering::SeqCst) && !inner.shutdown.load(Ordering::SeqCst) {
                inner.flushed.wait_for(&mut state, Duration::from_millis(30));
            }
        }
        if let Err(e) = flush_once(&inner) {
            debug!("wal flush failed: {e}");
        }
        if inner.shutdown.load(Ordering::SeqCst) {
            let _ = flush_once(&inner);
            return;
        }
    }
}

fn flush_once(inner: &Arc<Inner>) -> DbResult<()> {
    let (bytes, last_lsn) = {
        let mut state = inner.state.lock();
        if state.active.is_empty() {
            inner.need_flush.store(false, Ordering::SeqCst);
            return Ok(());
        }
        let bytes = std::mem::take(&mut state.active);
        (bytes, state.last_lsn)
    };
    inner.disk.write_log(&bytes)?;
    inner.persist_lsn.store(last_lsn.0 as i64, Ordering::SeqCst);
    inner.need_flush.store(false, Ordering::SeqCst);
    inner.flushed.notify_all();
    Ok(())
}

/// Read and decode every frame in the shared log file, stopping at the
/// first truncated/partial trailing frame (the tail of a torn write).
fn read_all_frames(disk: &DiskManager) -> DbResult<Vec<LogFrame>> {
    let total = disk.log_size()?;
    let mut frames = Vec::new();
    let mut offset = 0u64;
    while offset + 4 <= total {
        let len_bytes = disk.read_log(offset, 4)?;
        if len_bytes.len() < 4 {
            break;
        }
        let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as u64;
        if offset + 4 + len > total {
            break;
        }
        let body = disk.read_log(offset + 4, len as usize)?;
        let (frame, _): (LogFrame, usize) = decode_from_slice(&body, bincode_config())
            .map_err(|e| DbError::Wal(format!("deserialize log frame failed: {e}")))?;
        frames.push(frame);
        offset += 4 + len;
    }
    Ok(frames)
}
