use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, WisardError};

/// Counter table addressed by `address_size` bits.
///
/// Logically it holds `2^address_size` counters starting at zero; only the
/// ones that were ever written are stored.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Ram {
    address_size: u16,
    counters: HashMap<u64, u64>,
}

impl Ram {
    pub fn new(address_size: u16) -> Ram {
        Ram {
            address_size,
            counters: HashMap::new(),
        }
    }

    pub fn address_size(&self) -> u16 {
        self.address_size
    }

    /// Number of addressable counters.
    pub fn size(&self) -> u64 {
        1u64 << self.address_size
    }

    pub fn get(&self, address: u64) -> u64 {
        self.counters.get(&address).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, address: u64, amount: u64) -> Result<()> {
        if address >= self.size() {
            return Err(WisardError::Shape(format!(
                "address {} out of a {}-bit RAM",
                address, self.address_size
            )));
        }
        let counter = self.counters.entry(address).or_insert(0);
        *counter = counter.saturating_add(amount);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.counters.values().all(|&c| c == 0)
    }

    /// Sum of every counter, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.counters
            .values()
            .fold(0u64, |total, &c| total.saturating_add(c))
    }

    /// Non-zero counters, in address order.
    pub fn entries(&self) -> BTreeMap<u64, u64> {
        self.counters
            .iter()
            .filter(|(_, c)| **c > 0)
            .map(|(&a, &c)| (a, c))
            .collect()
    }
}
