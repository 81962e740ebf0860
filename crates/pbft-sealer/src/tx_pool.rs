use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::sealing_block::Transaction;

/// Narrow, synchronous, read-oriented accessor onto the transaction pool.
///
/// Kept intentionally small: ordering and eviction are the pool's own
/// concern, the sealer only ever asks for "the next `limit` transactions"
/// and "is there anything to seal at all".
pub trait TxPool: Send + Sync {
    /// Up to `limit` candidates, in the pool's own priority order.
    fn best_txns(&self, limit: u64) -> Vec<Transaction>;

    fn is_empty(&self) -> bool;
}

/// In-memory test double. Not part of the production surface.
#[derive(Default)]
pub struct VecTxPool {
    queue: Mutex<VecDeque<Transaction>>,
}

impl VecTxPool {
    pub fn new(txns: impl IntoIterator<Item = Transaction>) -> Self {
        Self { queue: Mutex::new(txns.into_iter().collect()) }
    }
}

impl TxPool for VecTxPool {
    fn best_txns(&self, limit: u64) -> Vec<Transaction> {
        self.queue.lock().iter().take(limit as usize).cloned().collect()
    }

    fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
