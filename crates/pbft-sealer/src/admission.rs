//! The adaptive admission-control loop: the feedback controller that keeps
//! blocks as large as possible without causing a PBFT view-change.
//!
//! `AdmissionController` exposes only message-style operations
//! (`record_timeout`, `record_commit`, `snapshot_cap`) -- no field of
//! [`AdmissionState`] is mutated directly from outside this module.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::chain_view::ChainView;
use crate::config::SealerConfig;
use crate::engine_handle::EngineHandle;
use crate::error::SealerError;
use crate::sync_view::SyncView;

/// `1 ≤ max_block_can_seal ≤ engine.max_block_transactions()` bracketed by
/// the estimators below. See module docs for the state machine this
/// implements.
#[derive(Debug, Clone, Copy)]
struct AdmissionState {
    max_block_can_seal: u64,
    last_timeout_tx: u64,
    max_no_timeout_tx: u64,
    timeout_count: u64,
    last_block_number: u64,
}

/// Maintains the adaptive per-block transaction cap `max_block_can_seal`.
///
/// Reacts to `on_timeout` and `on_commit_block` engine events. When
/// `enable_dynamic_block_size` is `false` the controller is inert: the cap
/// tracks the engine ceiling and no event mutates any estimator
/// (invariant 4 / property P7).
pub struct AdmissionController<C, S, E> {
    state: RwLock<AdmissionState>,
    chain: Arc<C>,
    sync: Arc<S>,
    engine: Arc<E>,
    config: SealerConfig,
}

impl<C, S, E> AdmissionController<C, S, E>
where
    C: ChainView,
    S: SyncView,
    E: EngineHandle,
{
    /// Validates `config` (§7: configuration errors are rejected at
    /// construction and are fatal only at startup) before seeding state.
    pub fn new(
        chain: Arc<C>,
        sync: Arc<S>,
        engine: Arc<E>,
        config: SealerConfig,
    ) -> Result<Self, SealerError> {
        let config = config.validate()?;
        let ceiling = engine.max_block_transactions();
        Ok(Self {
            state: RwLock::new(AdmissionState {
                max_block_can_seal: ceiling.max(1),
                last_timeout_tx: 0,
                max_no_timeout_tx: 0,
                timeout_count: 0,
                last_block_number: chain.number(),
            }),
            chain,
            sync,
            engine,
            config,
        })
    }

    /// §4.4: re-seeds `lastBlockNumber` from `ChainView.number()` at facade
    /// `start()`, not just at construction, so a chain that advanced between
    /// the two does not leave the stale-event guard comparing against a
    /// long-out-of-date baseline.
    pub fn resync_last_block_number(&self) {
        self.state.write().last_block_number = self.chain.number();
    }

    /// The cap the `SealerLoop` should assemble the next block under. Read
    /// under a shared lock; this is the hot path called once per sealing
    /// attempt.
    ///
    /// When dynamic sizing is disabled the controller is inert (invariant 4):
    /// this always reflects the engine's *current* ceiling rather than the
    /// value cached at construction, so a live ceiling change is honored
    /// immediately and invariant 1 (`1 ≤ max_block_can_seal ≤ ceiling`) never
    /// drifts stale.
    pub fn snapshot_cap(&self) -> u64 {
        if !self.config.enable_dynamic_block_size {
            return self.engine.max_block_transactions().max(1);
        }
        self.state.read().max_block_can_seal
    }

    /// §4.3.1: decrease `max_block_can_seal` to half when the engine's
    /// view-change timer expires on a block carrying `sealing_tx_number`
    /// transactions (0 if the engine had no pending proposal).
    pub fn record_timeout(&self, sealing_tx_number: u64) {
        if !self.config.enable_dynamic_block_size {
            return;
        }

        let mut state = self.state.write();
        let ceiling = self.engine.max_block_transactions();

        // Fix the case that the engine's ceiling has been lowered through
        // live reconfiguration while max_block_can_seal remains high.
        if state.max_block_can_seal >= ceiling {
            state.max_block_can_seal = ceiling;
        }

        // SyncView is the source of truth for lastBlockNumber on this
        // branch; ChainView is used instead on the onCommitBlock happy
        // path (§4.3.2 step 4). The two can diverge -- that split is
        // preserved deliberately, not reconciled.
        if self.sync.is_syncing() {
            state.last_block_number = self.sync.status().highest_known_number;
        }

        state.timeout_count += 1;

        // Keep last_timeout_tx as the tightest known upper bound on "safe",
        // but never let it fall at or below max_no_timeout_tx (invariant 2).
        // The `sealing_tx_number > max_no_timeout_tx` guard is deliberate:
        // it precludes tightening into (0, max_no_timeout_tx], and is
        // pinned by a scenario test below -- do not relax it.
        if sealing_tx_number > 0
            && (state.last_timeout_tx == 0
                || (state.last_timeout_tx > sealing_tx_number
                    && sealing_tx_number > state.max_no_timeout_tx))
        {
            state.last_timeout_tx = sealing_tx_number;
        }

        let before = state.max_block_can_seal;
        if state.max_block_can_seal > 2 {
            state.max_block_can_seal /= 2;
        }

        info!(
            from = before,
            to = state.max_block_can_seal,
            timeout_count = state.timeout_count,
            last_timeout_tx = state.last_timeout_tx,
            "decreased max_block_can_seal to half for PBFT timeout"
        );
    }

    /// §4.3.2: increase `max_block_can_seal` when a block commits without
    /// a timeout.
    pub fn record_commit(&self, block_number: u64, sealing_tx_number: u64, change_cycle: u32) {
        if !self.config.enable_dynamic_block_size {
            return;
        }

        let mut state = self.state.write();
        let ceiling = self.engine.max_block_transactions();

        if state.max_block_can_seal >= ceiling {
            state.max_block_can_seal = ceiling;
        }

        // No credit given for a commit that required view changes: it
        // effectively timed out. ChainView is not consulted on this
        // branch, SyncView is -- the divergent-source split from
        // record_timeout, preserved literally (see that method's comment).
        if self.sync.is_syncing() || change_cycle > 0 {
            state.last_block_number = self.sync.status().highest_known_number;
            return;
        }

        if block_number <= state.last_block_number {
            return; // stale event
        }
        state.last_block_number = self.chain.number();

        // Recent timeouts must be paid off by clean commits before any
        // growth is allowed.
        if state.timeout_count > 0 {
            state.timeout_count -= 1;
            return;
        }

        if sealing_tx_number > 0
            && (state.max_no_timeout_tx == 0 || state.max_no_timeout_tx < sealing_tx_number)
        {
            state.max_no_timeout_tx = sealing_tx_number;
            info!(max_no_timeout_tx = state.max_no_timeout_tx, "increased max_no_timeout_tx");
        }

        if state.max_block_can_seal >= ceiling {
            state.max_block_can_seal = ceiling;
            return;
        }

        if state.last_timeout_tx <= state.max_no_timeout_tx {
            Self::attempt_increase_timeout_tx(&mut state, ceiling);
        }

        if state.last_timeout_tx != 0 && state.max_block_can_seal >= state.last_timeout_tx {
            return; // already at the empirical safe boundary
        }

        Self::grow_max_block_can_seal(&mut state, ceiling, self.config.block_size_increase_ratio);
    }

    /// §4.3.3: when commits succeed at sizes at or above the old
    /// `last_timeout_tx`, that estimate was pessimistic; nudge it upward so
    /// growth can resume.
    fn attempt_increase_timeout_tx(state: &mut AdmissionState, ceiling: u64) {
        let before = state.last_timeout_tx;

        if state.last_timeout_tx >= ceiling {
            state.last_timeout_tx = ceiling;
            return;
        }
        if state.max_no_timeout_tx == ceiling {
            state.last_timeout_tx = state.max_no_timeout_tx;
            return;
        }
        if (state.max_no_timeout_tx as f64) * 0.1 > 1.0 {
            state.last_timeout_tx = ((state.max_no_timeout_tx as f64) * 1.1).floor() as u64;
        } else {
            state.last_timeout_tx *= 2;
        }
        if state.last_timeout_tx >= ceiling {
            state.last_timeout_tx = ceiling;
        }

        info!(from = before, to = state.last_timeout_tx, "attempted increase of last_timeout_tx");
    }

    /// §4.3.4: grow the cap, bracketed by the proven-safe floor
    /// (`max_no_timeout_tx`) and the tightest known timeout ceiling
    /// (`last_timeout_tx`), and never past the engine's hard ceiling.
    fn grow_max_block_can_seal(state: &mut AdmissionState, ceiling: u64, increase_ratio: f64) {
        let before = state.max_block_can_seal;

        // In case of no increase when max_block_can_seal is small enough
        // that the ratio alone would round to zero.
        if increase_ratio * (state.max_block_can_seal as f64) > 1.0 {
            state.max_block_can_seal += (increase_ratio * (state.max_block_can_seal as f64)) as u64;
        } else {
            state.max_block_can_seal += 1;
        }

        if state.last_timeout_tx > 0 && state.max_block_can_seal > state.last_timeout_tx {
            state.max_block_can_seal = state.last_timeout_tx;
        }
        // Growth must not regress below the proven-safe level.
        if state.max_no_timeout_tx > 0 && state.max_block_can_seal < state.max_no_timeout_tx {
            state.max_block_can_seal = state.max_no_timeout_tx;
        }
        if state.max_block_can_seal > ceiling {
            state.max_block_can_seal = ceiling;
        }

        info!(from = before, to = state.max_block_can_seal, "grew max_block_can_seal");
    }
}

#[cfg(test)]
#[path = "admission_test.rs"]
mod admission_test;
