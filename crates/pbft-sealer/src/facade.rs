use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::admission::AdmissionController;
use crate::chain_view::ChainView;
use crate::config::SealerConfig;
use crate::engine_handle::EngineHandle;
use crate::error::SealerError;
use crate::sealer_loop::SealerLoop;
use crate::sealing_block::SealingBlock;
use crate::sync_view::SyncView;
use crate::tx_pool::TxPool;

/// The capability set a PBFT-specific sealer supplies to the generic
/// `SealerLoop`, in place of the source's base-class/derived-class split.
pub trait SealStrategy: Send + Sync {
    /// Extra readiness beyond the generic base predicate; PBFT composes
    /// this with the engine's own `should_seal`.
    fn should_seal_extra(&self) -> bool {
        true
    }

    /// The current admission-control cap to assemble under.
    fn max_block_can_seal(&self) -> u64;

    /// Extension point for subclass-style behavior (e.g. appending a
    /// system transaction); default is a no-op.
    fn hook_after_handle_block(&self, _block: &mut SealingBlock) {}
}

/// A `SealStrategy` backed directly by an [`AdmissionController`].
pub struct PbftSealStrategy<C, S, E> {
    admission: Arc<AdmissionController<C, S, E>>,
}

impl<C, S, E> PbftSealStrategy<C, S, E> {
    pub fn new(admission: Arc<AdmissionController<C, S, E>>) -> Self {
        Self { admission }
    }
}

impl<C, S, E> SealStrategy for PbftSealStrategy<C, S, E>
where
    C: ChainView,
    S: SyncView,
    E: EngineHandle,
{
    fn max_block_can_seal(&self) -> u64 {
        self.admission.snapshot_cap()
    }
}

type PbftSealerLoop<C, S, E, P> = SealerLoop<C, S, E, P, PbftSealStrategy<C, S, E>>;

/// Lifecycle (start/stop), wiring of event callbacks, and the public
/// "should seal?" predicate composed with the engine's own readiness.
pub struct SealerFacade<C, S, E, P> {
    engine: Arc<E>,
    admission: Arc<AdmissionController<C, S, E>>,
    inner: Arc<PbftSealerLoop<C, S, E, P>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    enable_dynamic_block_size: bool,
}

impl<C, S, E, P> SealerFacade<C, S, E, P>
where
    C: ChainView + 'static,
    S: SyncView + 'static,
    E: EngineHandle + 'static,
    P: TxPool + 'static,
{
    /// Fails if `config` doesn't validate (§7): out-of-range configuration
    /// is rejected here, at construction, and nowhere else.
    pub fn new(
        chain: Arc<C>,
        sync: Arc<S>,
        engine: Arc<E>,
        pool: Arc<P>,
        config: SealerConfig,
    ) -> Result<Self, SealerError> {
        let enable_dynamic_block_size = config.enable_dynamic_block_size;
        let admission =
            Arc::new(AdmissionController::new(chain.clone(), sync.clone(), engine.clone(), config)?);
        let strategy = Arc::new(PbftSealStrategy::new(admission.clone()));
        let inner = Arc::new(SealerLoop::new(chain, sync, engine.clone(), pool, strategy));
        Ok(Self { engine, admission, inner, worker: Mutex::new(None), enable_dynamic_block_size })
    }

    /// Wires `on_timeout`/`on_commit_block` (only if dynamic block size is
    /// enabled), records `last_block_number := chain.number()`, starts the
    /// engine, then starts the loop on a dedicated worker thread.
    pub fn start(&self)
    where
        C: Send + Sync,
    {
        if self.enable_dynamic_block_size {
            let admission = self.admission.clone();
            self.engine.on_timeout(Box::new(move |sealing_tx_number| {
                admission.record_timeout(sealing_tx_number);
            }));

            let admission = self.admission.clone();
            self.engine.on_commit_block(Box::new(move |block_number, sealing_tx_number, change_cycle| {
                admission.record_commit(block_number, sealing_tx_number, change_cycle);
            }));
        }
        self.admission.resync_last_block_number();

        self.engine.start();
        self.inner.set_running(true);

        let inner = self.inner.clone();
        let handle = std::thread::spawn(move || {
            while inner.is_running() {
                inner.wait_until_actionable();
                if !inner.is_running() {
                    break;
                }
                inner.run_once();
            }
        });
        *self.worker.lock() = Some(handle);
    }

    /// Stops the loop first, then the engine. Cancellation is cooperative:
    /// the loop exits after the current assembly completes, never mid
    /// submission.
    pub fn stop(&self) {
        self.inner.set_running(false);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        self.engine.stop();
    }

    pub fn should_seal(&self) -> bool {
        self.inner.should_seal()
    }

    pub fn max_block_can_seal(&self) -> u64 {
        self.admission.snapshot_cap()
    }

    pub fn admission(&self) -> &Arc<AdmissionController<C, S, E>> {
        &self.admission
    }
}
