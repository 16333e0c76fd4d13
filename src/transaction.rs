//! Transaction table
//!
//! Queued command lines are stored per transaction identifier. Every
//! connection gets its own identifier, so queues of different connections
//! never alias each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Identifier of one connection's transaction bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Open transactions and their queued raw command lines
#[derive(Debug, Default)]
pub struct TransactionTable {
    next_id: AtomicU64,
    queues: Mutex<HashMap<TransactionId, Vec<String>>>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh identifier; ids are never reused.
    pub fn allocate_id(&self) -> TransactionId {
        TransactionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Open a transaction with an empty queue, dropping anything queued under `id` before.
    pub async fn begin(&self, id: TransactionId) {
        let mut queues = self.queues.lock().await;
        queues.insert(id, Vec::new());
    }

    /// Append a raw line; returns `false` when `id` has no open transaction.
    pub async fn enqueue(&self, id: TransactionId, line: String) -> bool {
        let mut queues = self.queues.lock().await;
        match queues.get_mut(&id) {
            Some(queue) => {
                queue.push(line);
                true
            }
            None => false,
        }
    }

    /// Detach the whole queue so it can be replayed exactly once.
    pub async fn take(&self, id: TransactionId) -> Option<Vec<String>> {
        let mut queues = self.queues.lock().await;
        queues.remove(&id)
    }

    /// Drop an open transaction without running it, returning how many lines were lost.
    pub async fn discard(&self, id: TransactionId) -> Option<usize> {
        self.take(id).await.map(|queue| queue.len())
    }

    /// Number of currently open transactions
    pub async fn open_count(&self) -> usize {
        self.queues.lock().await.len()
    }
}
