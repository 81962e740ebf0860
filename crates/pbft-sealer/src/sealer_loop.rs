use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::chain_view::ChainView;
use crate::engine_handle::EngineHandle;
use crate::facade::SealStrategy;
use crate::sealing_block::SealingBlock;
use crate::sync_view::SyncView;
use crate::tx_pool::TxPool;

/// Paired wait condition: `signalled` wakes the loop when it may be worth
/// re-checking `should_seal`; `block_signalled` wakes it specifically after
/// a `SealingBlock` reset. Modeled as two condvars over their own mutex
/// each, per the literal concurrency model in the sealer's specification.
#[derive(Default)]
struct WaitState {
    running: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn wait<'a, T>(condvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    condvar.wait(guard).unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The worker that, while running, waits for "should seal?" to become
/// true, assembles a block respecting the current cap, submits it to the
/// engine, and recycles the buffer.
///
/// `SealingBlock` is owned exclusively by this loop; it is never touched by
/// event handlers.
pub struct SealerLoop<C, S, E, P, Strat> {
    chain: Arc<C>,
    sync: Arc<S>,
    engine: Arc<E>,
    pool: Arc<P>,
    strategy: Arc<Strat>,
    wait: Mutex<WaitState>,
    signalled: Condvar,
    block: Mutex<SealingBlock>,
    block_signalled: Condvar,
}

impl<C, S, E, P, Strat> SealerLoop<C, S, E, P, Strat>
where
    C: ChainView,
    S: SyncView,
    E: EngineHandle,
    P: TxPool,
    Strat: SealStrategy,
{
    pub fn new(chain: Arc<C>, sync: Arc<S>, engine: Arc<E>, pool: Arc<P>, strategy: Arc<Strat>) -> Self {
        Self {
            chain,
            sync,
            engine,
            pool,
            strategy,
            wait: Mutex::new(WaitState { running: false }),
            signalled: Condvar::new(),
            block: Mutex::new(SealingBlock::new()),
            block_signalled: Condvar::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.wait).running
    }

    /// Readiness independent of the running flag: pool nonempty, not
    /// syncing, engine ready, and the strategy's extra predicate.
    fn ready_to_seal(&self) -> bool {
        !self.pool.is_empty() && !self.sync.is_syncing() && self.engine.should_seal() && self.strategy.should_seal_extra()
    }

    /// The generic base predicate (node running, pool nonempty, not
    /// syncing) AND the engine's own readiness.
    pub fn should_seal(&self) -> bool {
        self.is_running() && self.ready_to_seal()
    }

    pub fn set_running(&self, running: bool) {
        lock(&self.wait).running = running;
        self.signalled.notify_all();
    }

    /// Blocks until either the loop is stopped or a sealing attempt is
    /// worth making. The only suspension point in the loop: event handlers
    /// never block on it.
    pub fn wait_until_actionable(&self) {
        let mut guard = lock(&self.wait);
        while guard.running && !self.ready_to_seal() {
            guard = wait(&self.signalled, guard);
        }
    }

    fn reset_and_signal(&self, block: &mut SealingBlock) {
        block.reset();
        self.signalled.notify_all();
        self.block_signalled.notify_all();
    }

    /// One iteration of the dispatch loop: if `should_seal`, assemble a
    /// block under the current cap and submit it. Assembly is
    /// idempotent-by-reset: a dropped candidate is never retransmitted,
    /// only regenerated.
    pub fn run_once(&self) {
        if !self.should_seal() {
            return;
        }

        let mut block = lock(&self.block);

        let parent = self.chain.head();
        block.populate_from_parent(parent);

        let cap = self.strategy.max_block_can_seal();
        let txns = self.pool.best_txns(cap);
        block.fill(txns);

        let ceiling = self.engine.max_block_transactions();
        if block.transaction_count() > ceiling {
            debug!(
                tx_count = block.transaction_count(),
                ceiling, "dropped candidate: transaction count over ceiling"
            );
            self.reset_and_signal(&mut block);
            return;
        }

        block.calculate_transaction_root();
        self.strategy.hook_after_handle_block(&mut block);

        let block_number = block.header().map(|h| h.number).unwrap_or_default();
        match self.engine.generate_prepare(&block) {
            Ok(()) => {
                info!(block_number, tx_count = block.transaction_count(), "generated seal");
            }
            Err(err) => {
                // Submission failure: logged and retried next tick, never
                // fatal.
                warn!(%err, "engine unavailable, will retry");
                return;
            }
        }

        if self.engine.should_reset(&block) {
            self.reset_and_signal(&mut block);
        }
    }
}

#[cfg(test)]
#[path = "sealer_loop_test.rs"]
mod sealer_loop_test;
