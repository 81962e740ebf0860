#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;

struct FakeChain {
    number: AtomicU64,
}

impl ChainView for FakeChain {
    fn number(&self) -> u64 {
        self.number.load(Ordering::SeqCst)
    }

    fn block_by_number(&self, number: u64) -> Option<crate::chain_view::BlockHeader> {
        Some(crate::chain_view::BlockHeader { number, parent_hash: [0; 32], hash: [0; 32] })
    }
}

struct FakeSync {
    syncing: AtomicU64,
    highest_known_number: AtomicU64,
}

impl SyncView for FakeSync {
    fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst) != 0
    }

    fn status(&self) -> crate::sync_view::SyncStatus {
        crate::sync_view::SyncStatus {
            highest_known_number: self.highest_known_number.load(Ordering::SeqCst),
        }
    }
}

struct FakeEngine {
    ceiling: AtomicU64,
}

impl EngineHandle for FakeEngine {
    fn max_block_transactions(&self) -> u64 {
        self.ceiling.load(Ordering::SeqCst)
    }

    fn should_seal(&self) -> bool {
        true
    }

    fn generate_prepare(
        &self,
        _block: &crate::sealing_block::SealingBlock,
    ) -> Result<(), crate::error::SealerError> {
        Ok(())
    }

    fn should_reset(&self, _block: &crate::sealing_block::SealingBlock) -> bool {
        false
    }

    fn on_timeout(&self, _callback: Box<dyn Fn(u64) + Send + Sync>) {}
    fn on_commit_block(&self, _callback: Box<dyn Fn(u64, u64, u32) + Send + Sync>) {}

    fn start(&self) {}
    fn stop(&self) {}
}

type Harness = (AdmissionController<FakeChain, FakeSync, FakeEngine>, Arc<FakeChain>, Arc<FakeSync>, Arc<FakeEngine>);

fn harness(ceiling: u64, ratio: f64) -> Harness {
    let chain = Arc::new(FakeChain { number: AtomicU64::new(0) });
    let sync = Arc::new(FakeSync { syncing: AtomicU64::new(0), highest_known_number: AtomicU64::new(0) });
    let engine = Arc::new(FakeEngine { ceiling: AtomicU64::new(ceiling) });
    let config = SealerConfig { enable_dynamic_block_size: true, block_size_increase_ratio: ratio };
    let controller = AdmissionController::new(chain.clone(), sync.clone(), engine.clone(), config).unwrap();
    (controller, chain, sync, engine)
}

/// Scenario 1: halving chain.
#[test]
fn halving_chain() {
    let (controller, ..) = harness(1000, 0.1);
    assert_eq!(controller.snapshot_cap(), 1000);

    controller.record_timeout(500);
    assert_eq!(controller.snapshot_cap(), 500);
    assert_eq!(controller.state.read().last_timeout_tx, 500);
    assert_eq!(controller.state.read().timeout_count, 1);

    controller.record_timeout(250);
    assert_eq!(controller.snapshot_cap(), 250);
    assert_eq!(controller.state.read().last_timeout_tx, 250);
    assert_eq!(controller.state.read().timeout_count, 2);
}

/// Scenarios 2 and 3: penalty burn followed by growth. `timeoutCount`
/// reached 2 in scenario 1, so it takes two clean commits purely to pay
/// that off (each returns immediately per step 5 of `onCommitBlock`)
/// before a third commit can touch any estimator.
#[test]
fn penalty_burn_then_growth() {
    let (controller, chain, ..) = harness(1000, 0.1);
    controller.record_timeout(500);
    controller.record_timeout(250);

    chain.number.store(100, Ordering::SeqCst);
    controller.record_commit(100, 250, 0);
    assert_eq!(controller.state.read().timeout_count, 1);
    assert_eq!(controller.snapshot_cap(), 250);

    chain.number.store(101, Ordering::SeqCst);
    controller.record_commit(101, 250, 0);
    assert_eq!(controller.state.read().timeout_count, 0);
    assert_eq!(controller.snapshot_cap(), 250);
    assert_eq!(controller.state.read().max_no_timeout_tx, 0);

    chain.number.store(102, Ordering::SeqCst);
    controller.record_commit(102, 250, 0);
    assert_eq!(controller.state.read().max_no_timeout_tx, 250);
    assert_eq!(controller.state.read().last_timeout_tx, 275);
    assert_eq!(controller.snapshot_cap(), 275);
}

/// Scenario 4: a commit that followed a view change earns no growth, and
/// rebases `last_block_number` from SyncView rather than ChainView.
#[test]
fn view_changed_commit_grants_no_growth() {
    let (controller, _chain, sync, _engine) = harness(1000, 0.1);
    sync.highest_known_number.store(999, Ordering::SeqCst);

    let before = controller.snapshot_cap();
    controller.record_commit(102, 275, 1);
    assert_eq!(controller.snapshot_cap(), before);
    assert_eq!(controller.state.read().last_block_number, 999);
}

/// Scenario 5: the engine lowers its ceiling mid-flight; the next event
/// re-clamps before doing anything else.
#[test]
fn ceiling_race_reclamps() {
    let (controller, chain, _sync, engine) = harness(1000, 0.1);
    chain.number.store(1, Ordering::SeqCst);
    controller.record_commit(1, 10, 0); // no timeouts pending, grows slightly
    engine.ceiling.store(5, Ordering::SeqCst);
    controller.record_timeout(0);
    assert!(controller.snapshot_cap() <= 5);
}

/// Property P1: the cap never leaves [1, ceiling].
#[test]
fn cap_stays_in_bounds_under_mixed_events() {
    let (controller, chain, _sync, _engine) = harness(64, 0.1);
    for i in 0..50u64 {
        if i % 3 == 0 {
            controller.record_timeout(i);
        } else {
            chain.number.store(i, Ordering::SeqCst);
            controller.record_commit(i, i, 0);
        }
        let cap = controller.snapshot_cap();
        assert!((1..=64).contains(&cap), "cap {cap} out of bounds at iteration {i}");
    }
}

/// Property P2: once both estimators are known, max_no_timeout_tx never
/// exceeds last_timeout_tx.
#[test]
fn estimators_stay_ordered() {
    let (controller, chain, _sync, _engine) = harness(1000, 0.1);
    controller.record_timeout(500);
    for n in 1..=600u64 {
        chain.number.store(n, Ordering::SeqCst);
        controller.record_commit(n, n, 0);
    }
    let state = *controller.state.read();
    if state.max_no_timeout_tx > 0 && state.last_timeout_tx > 0 {
        assert!(state.max_no_timeout_tx <= state.last_timeout_tx);
    }
}

/// The `sealing_tx_number > max_no_timeout_tx` guard on the timeout
/// estimator update is load-bearing for invariant 2: pin it so a future
/// change cannot silently relax it into unsafe territory.
#[test]
fn timeout_estimator_never_drops_at_or_below_no_timeout_floor() {
    let (controller, chain, _sync, _engine) = harness(1000, 0.1);
    controller.record_timeout(500); // last_timeout_tx := 500 (first-ever timeout, unconditional)

    chain.number.store(1, Ordering::SeqCst);
    controller.record_commit(1, 300, 0); // pays off the one pending timeout, no estimator update yet
    chain.number.store(2, Ordering::SeqCst);
    controller.record_commit(2, 300, 0); // max_no_timeout_tx := 300
    assert_eq!(controller.state.read().max_no_timeout_tx, 300);
    assert_eq!(controller.state.read().last_timeout_tx, 500);

    controller.record_timeout(200); // 200 <= max_no_timeout_tx, must NOT move last_timeout_tx below it
    assert_eq!(controller.state.read().last_timeout_tx, 500);
}

/// Property P7: a disabled controller never mutates state.
#[test]
fn dormant_when_disabled() {
    let chain = Arc::new(FakeChain { number: AtomicU64::new(0) });
    let sync = Arc::new(FakeSync { syncing: AtomicU64::new(0), highest_known_number: AtomicU64::new(0) });
    let engine = Arc::new(FakeEngine { ceiling: AtomicU64::new(1000) });
    let config = SealerConfig { enable_dynamic_block_size: false, block_size_increase_ratio: 0.1 };
    let controller = AdmissionController::new(chain, sync, engine, config).unwrap();

    let before = controller.snapshot_cap();
    controller.record_timeout(500);
    controller.record_commit(1, 500, 0);
    assert_eq!(controller.snapshot_cap(), before);
}

/// Invariants 1 and 4: a disabled controller's cap must track a live
/// ceiling change, not the value cached at construction -- otherwise it
/// can sit above a since-lowered ceiling.
#[test]
fn dormant_controller_tracks_live_ceiling_changes() {
    let chain = Arc::new(FakeChain { number: AtomicU64::new(0) });
    let sync = Arc::new(FakeSync { syncing: AtomicU64::new(0), highest_known_number: AtomicU64::new(0) });
    let engine = Arc::new(FakeEngine { ceiling: AtomicU64::new(1000) });
    let config = SealerConfig { enable_dynamic_block_size: false, block_size_increase_ratio: 0.1 };
    let controller = AdmissionController::new(chain, sync, engine.clone(), config).unwrap();

    assert_eq!(controller.snapshot_cap(), 1000);

    engine.ceiling.store(42, Ordering::SeqCst);
    assert_eq!(controller.snapshot_cap(), 42);

    engine.ceiling.store(5000, Ordering::SeqCst);
    assert_eq!(controller.snapshot_cap(), 5000);
}

/// §7: an out-of-range ratio is rejected at construction, not silently
/// accepted and used forever.
#[test]
fn invalid_config_rejected_at_construction() {
    let chain = Arc::new(FakeChain { number: AtomicU64::new(0) });
    let sync = Arc::new(FakeSync { syncing: AtomicU64::new(0), highest_known_number: AtomicU64::new(0) });
    let engine = Arc::new(FakeEngine { ceiling: AtomicU64::new(1000) });
    let config = SealerConfig { enable_dynamic_block_size: true, block_size_increase_ratio: 0.0 };
    assert!(AdmissionController::new(chain, sync, engine, config).is_err());
}
