/// Errors surfaced across the sealer's public boundary.
///
/// Recoverable admission-control conditions (oversized candidate, stale
/// commit, syncing rebase) are handled inline as control flow and never
/// become a variant here -- only genuinely fatal or host-reported failures
/// are.
#[derive(thiserror::Error, Debug)]
pub enum SealerError {
    #[error("invalid sealer config: field `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),
}
