use crate::sealing_block::SealingBlock;

/// Adapter onto the PBFT engine: drives the prepare/commit protocol, hands
/// back timeout and commit events, and publishes the hard per-block
/// transaction ceiling. The three-phase voting protocol itself is entirely
/// out of scope here -- this is only the seam the admission controller and
/// sealer loop need.
pub trait EngineHandle: Send + Sync {
    /// Current hard ceiling. May change at any time (e.g. via a live
    /// sysconfig reconfiguration), so callers must re-read rather than
    /// cache it across a sealing attempt.
    fn max_block_transactions(&self) -> u64;

    /// Engine-side readiness: this node is the current primary / within its
    /// sealing window.
    fn should_seal(&self) -> bool;

    /// Submits a candidate block. Fire-and-forget: the engine's response
    /// flows back asynchronously via `on_timeout`/`on_commit_block`.
    fn generate_prepare(&self, block: &SealingBlock) -> Result<(), crate::error::SealerError>;

    /// Synchronous post-submission hint: the engine has already decided
    /// this candidate must be regenerated.
    fn should_reset(&self, block: &SealingBlock) -> bool;

    /// Registers a callback fired when the engine's view-change timer
    /// expires on a block carrying the given transaction count (possibly 0
    /// if no proposal was pending).
    fn on_timeout(&self, callback: Box<dyn Fn(u64) + Send + Sync>);

    /// Registers a callback fired when a block commits:
    /// `(block_number, sealing_tx_number, change_cycle)`. `change_cycle > 0`
    /// means the commit followed one or more view changes.
    fn on_commit_block(&self, callback: Box<dyn Fn(u64, u64, u32) + Send + Sync>);

    fn start(&self);
    fn stop(&self);
}
