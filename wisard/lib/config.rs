use serde::{Deserialize, Serialize};

use crate::error::{Result, WisardError};

/// Widest tuple a RAM may be addressed with.
pub const MAX_ADDRESS_SIZE: u16 = 32;

/// Hyperparameters of a [`Wisard`](crate::wisard::Wisard).
///
/// Every field except `address_size` has a default, so a host can send a
/// partial JSON object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WisardConfig {
    /// Number of input bits feeding each RAM.
    pub address_size: u16,
    /// A RAM votes only when its counter is strictly above this value.
    pub bleach: u64,
    /// Seed of the tuple mapping. Drawn at random when absent.
    pub seed: Option<u64>,
    /// Fixes the input width up front instead of on the first call.
    pub input_size: Option<usize>,
    /// Weight used by rules that don't set one.
    pub rule_weight: u64,
    /// Whether rules that don't say otherwise skip the all-zero address.
    pub ignore_zero_address: bool,
    /// Fraction of the RAMs written by one rule that must fire for its
    /// discriminator to be a candidate in `classify_with_rules`.
    pub rule_coverage: f64,
}

impl Default for WisardConfig {
    fn default() -> Self {
        WisardConfig {
            address_size: 4,
            bleach: 0,
            seed: None,
            input_size: None,
            rule_weight: 1,
            ignore_zero_address: false,
            rule_coverage: 1.0,
        }
    }
}

impl WisardConfig {
    pub fn with_address_size(address_size: u16) -> Self {
        WisardConfig {
            address_size,
            ..WisardConfig::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.address_size == 0 || self.address_size > MAX_ADDRESS_SIZE {
            return Err(WisardError::Config(format!(
                "address size must be between 1 and {}, got {}",
                MAX_ADDRESS_SIZE, self.address_size
            )));
        }
        if self.input_size == Some(0) {
            return Err(WisardError::Config(String::from(
                "input size can't be zero",
            )));
        }
        if self.rule_weight == 0 {
            return Err(WisardError::Config(String::from(
                "default rule weight must be positive",
            )));
        }
        if !(0.0..=1.0).contains(&self.rule_coverage) {
            return Err(WisardError::Config(format!(
                "rule coverage must be within [0, 1], got {}",
                self.rule_coverage
            )));
        }
        Ok(())
    }
}
