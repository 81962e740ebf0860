use serde::Deserialize;

use crate::error::SealerError;

/// Host-supplied configuration for the admission controller.
///
/// Loading this from YAML/TOML/env is the host's job (inherited from a base
/// node config loader); this crate only validates it once at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SealerConfig {
    /// Master switch. When `false`, [`crate::admission::AdmissionController`]
    /// is bypassed entirely and the cap tracks the engine ceiling.
    pub enable_dynamic_block_size: bool,
    /// Growth rate applied to `max_block_can_seal` on each clean commit,
    /// in `(0, 1]`.
    pub block_size_increase_ratio: f64,
}

impl Default for SealerConfig {
    fn default() -> Self {
        Self {
            enable_dynamic_block_size: true,
            block_size_increase_ratio: 0.1,
        }
    }
}

impl SealerConfig {
    /// Validates the configuration, rejecting it at construction time.
    ///
    /// This is the only place `SealerConfig` can fail: once a sealer has
    /// started, configuration errors cannot occur again.
    pub fn validate(self) -> Result<Self, SealerError> {
        if !(self.block_size_increase_ratio > 0.0 && self.block_size_increase_ratio <= 1.0) {
            return Err(SealerError::InvalidConfig {
                field: "block_size_increase_ratio",
                reason: format!(
                    "must be in (0, 1], got {}",
                    self.block_size_increase_ratio
                ),
            });
        }
        Ok(self)
    }
}
