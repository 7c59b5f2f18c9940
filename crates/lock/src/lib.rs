//! Multi-granularity lock manager: strict two-phase locking over tables,
//! records, and B+tree index gaps (spec.md §4.7).
//!
//! Each lockable object ([`LockDataId`]) owns a FIFO [`LockRequestQueue`]
//! behind its own mutex; a global table maps object to queue so unrelated
//! objects never contend on one lock. Acquisition does not block on a
//! condition variable: a request spins with a bounded number of attempts,
//! sleeping briefly between them, and gives up by aborting the *requesting*
//! transaction with [`AbortReason::DeadlockPrevention`] rather than building
//! a wait-for graph (the same trade-off the engine this was learned from
//! makes — true deadlock detection is future work, not a gap introduced
//! here).
//!
//! Two-phase locking itself (growing/shrinking phase, released-on-commit
//! lock sets) is not this crate's job: `lock` is a bare lock table keyed by
//! [`common::TxnId`], and `txn::Transaction` is the one that refuses new
//! lock requests once it has entered its shrinking phase and releases
//! everything it holds at commit/abort.

#[cfg(test)]
mod tests;

use common::{AbortReason, DbError, DbResult, IndexId, RecordId, TableId, TxnId};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// The five lock modes of the multi-granularity hierarchy, ordered loosely
/// weakest-to-strongest (`S` and `IX` are incomparable; both are weaker than
/// `SIX`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    IntentionShared,
    IntentionExclusive,
    Shared,
    SharedIntentionExclusive,
    Exclusive,
}

use LockMode::*;

impl LockMode {
    fn rank(self) -> u8 {
        match self {
            IntentionShared => 0,
            IntentionExclusive => 1,
            Shared => 2,
            SharedIntentionExclusive => 3,
            Exclusive => 4,
        }
    }
}

/// Can a request for `requested` be granted while `held` is already granted
/// to some other transaction on the same object?
fn is_compatible(held: LockMode, requested: LockMode) -> bool {
    match requested {
        IntentionShared => held != Exclusive,
        IntentionExclusive => matches!(held, IntentionShared | IntentionExclusive),
        Shared => matches!(held, IntentionShared | Shared),
        SharedIntentionExclusive => matches!(held, IntentionShared),
        Exclusive => false,
    }
}

/// The lattice join of two modes held/requested by the *same* transaction:
/// the weakest mode that subsumes both. Used to compute what a transaction's
/// lock should become when it already holds one mode and asks for another.
fn combine(a: LockMode, b: LockMode) -> LockMode {
    if a == b {
        return a;
    }
    let (lo, hi) = if a.rank() < b.rank() { (a, b) } else { (b, a) };
    match (lo, hi) {
        (IntentionShared, other) => other,
        (IntentionExclusive, Shared) => SharedIntentionExclusive,
        (IntentionExclusive, SharedIntentionExclusive) => SharedIntentionExclusive,
        (IntentionExclusive, Exclusive) => Exclusive,
        (Shared, SharedIntentionExclusive) => SharedIntentionExclusive,
        (Shared, Exclusive) => Exclusive,
        (SharedIntentionExclusive, Exclusive) => Exclusive,
        _ => unreachable!("combine is commutative and total over the five modes"),
    }
}

/// A lockable object: a whole table, a single record, or the gap preceding
/// a key in a B+tree index (used for phantom protection, spec.md §4.7).
/// `RecordId::GAP_END` names the gap after the last key in the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockDataId {
    Table(TableId),
    Record(TableId, RecordId),
    Gap(IndexId, RecordId),
}

struct LockRequest {
    txn: TxnId,
    mode: LockMode,
    granted: bool,
}

#[derive(Default)]
struct LockRequestQueue {
    requests: Vec<LockRequest>,
    /// At most one transaction may be mid-upgrade on this queue at a time.
    upgrading: bool,
}

impl LockRequestQueue {
    fn find(&self, txn: TxnId) -> Option<&LockRequest> {
        self.requests.iter().find(|r| r.txn == txn)
    }

    fn find_mut(&mut self, txn: TxnId) -> Option<&mut LockRequest> {
        self.requests.iter_mut().find(|r| r.txn == txn)
    }

    /// Would `txn`'s current (possibly still-pending) request be compatible
    /// with every other transaction's currently granted request?
    fn compatible_for(&self, txn: TxnId) -> bool {
        let Some(mode) = self.find(txn).map(|r| r.mode) else {
            return true;
        };
        self.requests
            .iter()
            .all(|r| r.txn == txn || !r.granted || is_compatible(r.mode, mode))
    }
}

fn abort(reason: AbortReason) -> DbError {
    DbError::TransactionAbort(reason)
}

/// Table-wide lock manager. One instance is shared by every transaction in
/// the engine, paralleling `txn::TransactionManager`'s singleton WAL and
/// buffer pool.
pub struct LockManager {
    table: Mutex<HashMap<LockDataId, Arc<Mutex<LockRequestQueue>>>>,
    max_attempts: u32,
    retry_interval: Duration,
}

impl LockManager {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            max_attempts,
            retry_interval: Duration::from_micros(50),
        }
    }

    fn queue_for(&self, id: LockDataId) -> Arc<Mutex<LockRequestQueue>> {
        self.table
            .lock()
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(LockRequestQueue::default())))
            .clone()
    }

    /// Spin-wait (bounded) until `txn`'s request on `queue` is compatible
    /// with every other granted request, or give up.
    fn wait_until_grantable(&self, queue: &Arc<Mutex<LockRequestQueue>>, txn: TxnId) -> bool {
        for attempt in 0..=self.max_attempts {
            if queue.lock().compatible_for(txn) {
                return true;
            }
            if attempt == self.max_attempts {
                return false;
            }
            std::thread::sleep(self.retry_interval);
        }
        false
    }

    /// Acquire `mode` on `id` for `txn`, blocking (with bounded retries)
    /// until compatible. Idempotent: asking for a mode already covered by
    /// what `txn` holds is a no-op. Asking for a stronger mode upgrades the
    /// existing request in place.
    pub fn acquire(&self, txn: TxnId, id: LockDataId, mode: LockMode) -> DbResult<()> {
        let queue_arc = self.queue_for(id);

        let existing = queue_arc.lock().find(txn).map(|r| r.mode);

        match existing {
            None => {
                queue_arc.lock().requests.push(LockRequest {
                    txn,
                    mode,
                    granted: false,
                });
            }
            Some(held) => {
                let combined = combine(held, mode);
                if combined == held {
                    return Ok(());
                }
                let mut queue = queue_arc.lock();
                if queue.upgrading {
                    return Err(abort(AbortReason::UpgradeConflict));
                }
                queue.upgrading = true;
                if let Some(r) = queue.find_mut(txn) {
                    r.mode = combined;
                    r.granted = false;
                }
            }
        }

        let granted = self.wait_until_grantable(&queue_arc, txn);
        let mut queue = queue_arc.lock();
        queue.upgrading = false;
        if !granted {
            queue.requests.retain(|r| r.txn != txn || r.granted);
            return Err(abort(AbortReason::DeadlockPrevention));
        }
        if let Some(r) = queue.find_mut(txn) {
            r.granted = true;
        }
        Ok(())
    }

    pub fn acquire_table(&self, txn: TxnId, table: TableId, mode: LockMode) -> DbResult<()> {
        self.acquire(txn, LockDataId::Table(table), mode)
    }

    pub fn acquire_record(
        &self,
        txn: TxnId,
        table: TableId,
        rid: RecordId,
        mode: LockMode,
    ) -> DbResult<()> {
        debug_assert!(matches!(mode, Shared | Exclusive));
        self.acquire(txn, LockDataId::Record(table, rid), mode)
    }

    /// Shared lock on the gap preceding `rid` in `index` (spec.md §4.7's
    /// phantom protection for range scans and next-key inserts).
    pub fn acquire_gap(&self, txn: TxnId, index: IndexId, rid: RecordId) -> DbResult<()> {
        self.acquire(txn, LockDataId::Gap(index, rid), Shared)
    }

    /// Phantom check on the insert path: a key landing in a gap a concurrent
    /// range scan already holds `Shared` on must wait for that scan's
    /// transaction to end before the insert proceeds (spec.md §8 scenario 5).
    /// Requesting `Exclusive` on the same gap object reuses `acquire`'s
    /// bounded-retry wait — `Shared` and `Exclusive` are incompatible, so the
    /// inserter blocks (up to `max_attempts` retries) while the scan holds
    /// the gap, and is granted once it releases, or aborts with
    /// `DeadlockPrevention` if the retry budget runs out first.
    pub fn try_lock_in_gap(&self, txn: TxnId, index: IndexId, rid: RecordId) -> DbResult<()> {
        self.acquire(txn, LockDataId::Gap(index, rid), Exclusive)
    }

    /// Release every lock `txn` holds, across every object. Called once,
    /// from `txn::Transaction::commit`/`abort`, on the shrinking-phase
    /// transition.
    pub fn release_all(&self, txn: TxnId) {
        let queues: Vec<_> = self.table.lock().values().cloned().collect();
        for queue_arc in queues {
            let mut queue = queue_arc.lock();
            let had = queue.find(txn).is_some();
            queue.requests.retain(|r| r.txn != txn);
            if had {
                queue.upgrading = false;
            }
        }
    }
}
