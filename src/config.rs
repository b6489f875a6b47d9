//! Simulation parameters and construction-time validation.

use thiserror::Error;

/// Errors produced while validating a [`BpuConfig`].
///
/// These are the only failures the simulator can report: once a predictor
/// has been built, eviction and stack wraparound are ordinary policy
/// behavior, never errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("direction misprediction rate must be at most 100, got {0}")]
    RateOutOfRange(u8),

    #[error("BTB capacity must be nonzero")]
    ZeroBtbCapacity,

    #[error("BTB associativity must be nonzero")]
    ZeroBtbAssoc,

    #[error("BTB associativity {assoc} does not evenly divide capacity {capacity}")]
    AssocDoesNotDivideCapacity { capacity: usize, assoc: usize },

    #[error("BTB set count {0} is not a power of two")]
    SetCountNotPowerOfTwo(usize),

    #[error("BTB tag width must be nonzero and below the address width, got {0}")]
    TagBitsOutOfRange(u32),

    #[error("RAS capacity must be nonzero")]
    ZeroRasCapacity,
}

/// Parameters for a [`Bpu`](crate::sim::Bpu) instance.
///
/// The defaults mirror the simulator's historical command-line defaults:
/// a 1024-entry 4-way BTB with 12-bit tags, a 10-entry RAS, and a 20%
/// direction misprediction rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BpuConfig {
    /// Probability (in percent) of flipping the direction prediction for a
    /// control-flow instruction.
    pub mispredict_rate: u8,

    /// Total number of BTB entries.
    pub btb_capacity: usize,

    /// Number of entries per BTB set (1 = direct-mapped).
    pub btb_assoc: usize,

    /// Width of a BTB tag in bits.
    pub tag_bits: u32,

    /// Number of RAS entries.
    pub ras_capacity: usize,
}

impl Default for BpuConfig {
    fn default() -> Self {
        Self {
            mispredict_rate: 20,
            btb_capacity: 1024,
            btb_assoc: 4,
            tag_bits: 12,
            ras_capacity: 10,
        }
    }
}

impl BpuConfig {
    /// Number of BTB sets implied by this configuration.
    pub fn num_sets(&self) -> usize {
        self.btb_capacity / self.btb_assoc
    }

    /// Check the configuration, failing fast on any shape the predictor
    /// cannot represent.
    ///
    /// The set count must be a power of two because set selection uses a
    /// mask over the instruction address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mispredict_rate > 100 {
            return Err(ConfigError::RateOutOfRange(self.mispredict_rate));
        }
        if self.btb_capacity == 0 {
            return Err(ConfigError::ZeroBtbCapacity);
        }
        if self.btb_assoc == 0 {
            return Err(ConfigError::ZeroBtbAssoc);
        }
        if self.btb_capacity % self.btb_assoc != 0 {
            return Err(ConfigError::AssocDoesNotDivideCapacity {
                capacity: self.btb_capacity,
                assoc: self.btb_assoc,
            });
        }
        if !self.num_sets().is_power_of_two() {
            return Err(ConfigError::SetCountNotPowerOfTwo(self.num_sets()));
        }
        if self.tag_bits == 0 || self.tag_bits >= usize::BITS {
            return Err(ConfigError::TagBitsOutOfRange(self.tag_bits));
        }
        if self.ras_capacity == 0 {
            return Err(ConfigError::ZeroRasCapacity);
        }
        Ok(())
    }
}
