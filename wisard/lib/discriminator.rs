use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::addresser::Addresser;
use crate::error::{Result, WisardError};
use crate::ram::Ram;

/// The RAMs standing for one label, aligned with the addresser's tuples.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Discriminator {
    label: String,
    h_rams: Vec<Ram>,
    times_trained: u64,
    rules_applied: u64,
    // RAM indices written by each applied rule
    rule_footprints: Vec<Vec<usize>>,
}

impl Discriminator {
    pub fn new(label: String, addresser: &Addresser) -> Discriminator {
        Discriminator {
            label,
            h_rams: addresser
                .tuples()
                .iter()
                .map(|tuple| Ram::new(tuple.len() as u16))
                .collect(),
            times_trained: 0,
            rules_applied: 0,
            rule_footprints: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn rams(&self) -> &[Ram] {
        &self.h_rams
    }

    pub fn times_trained(&self) -> u64 {
        self.times_trained
    }

    pub fn rules_applied(&self) -> u64 {
        self.rules_applied
    }

    pub fn rule_footprints(&self) -> &[Vec<usize>] {
        &self.rule_footprints
    }

    /// Writes one sample, given as one address per RAM.
    pub fn train(&mut self, addresses: &[u64]) -> Result<()> {
        if addresses.len() != self.h_rams.len() {
            return Err(WisardError::Shape(format!(
                "expected {} addresses, got {}",
                self.h_rams.len(),
                addresses.len()
            )));
        }
        for (ram, &address) in self.h_rams.iter_mut().zip(addresses) {
            ram.increment(address, 1)?;
        }
        self.times_trained += 1;
        Ok(())
    }

    /// Adds `weight` at `(ram, address)` for every compiled write of a rule.
    pub fn inject(&mut self, writes: &[(usize, u64)], weight: u64) -> Result<()> {
        for &(ram, address) in writes {
            match self.h_rams.get(ram) {
                Some(r) if address < r.size() => {}
                _ => {
                    return Err(WisardError::Shape(format!(
                        "no address {} in RAM {}",
                        address, ram
                    )))
                }
            }
        }
        for &(ram, address) in writes {
            self.h_rams[ram].increment(address, weight)?;
        }
        let mut footprint: Vec<usize> = writes.iter().map(|&(ram, _)| ram).collect();
        footprint.sort_unstable();
        footprint.dedup();
        if !footprint.is_empty() {
            self.rule_footprints.push(footprint);
        }
        self.rules_applied += 1;
        Ok(())
    }

    /// Number of RAMs whose counter at the given address is above `bleach`.
    pub fn classify(&self, addresses: &[u64], bleach: u64) -> u64 {
        self.h_rams
            .iter()
            .zip(addresses)
            .filter(|(ram, address)| ram.get(**address) > bleach)
            .count() as u64
    }

    /// Whether some applied rule holds for the sample: at least
    /// `ceil(coverage * n)` of the `n` RAMs that rule wrote into fire.
    /// A discriminator without rules always qualifies.
    pub fn satisfies_rules(&self, addresses: &[u64], bleach: u64, coverage: f64) -> bool {
        if self.rule_footprints.is_empty() {
            return true;
        }
        self.rule_footprints.iter().any(|footprint| {
            let hits = footprint
                .iter()
                .filter(|&&r| self.h_rams[r].get(addresses[r]) > bleach)
                .count();
            hits as f64 >= (coverage * footprint.len() as f64).ceil()
        })
    }

    pub fn rams_info(&self) -> Vec<BTreeMap<u64, u64>> {
        self.h_rams.iter().map(|ram| ram.entries()).collect()
    }

    /// Sum of every counter, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.h_rams
            .iter()
            .fold(0u64, |total, ram| total.saturating_add(ram.total()))
    }
}
