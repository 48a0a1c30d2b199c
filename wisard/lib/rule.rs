use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::addresser::Addresser;
use crate::error::{Result, WisardError};

/// A disjunction of bit assignments over some input positions, pointing at
/// a label.
///
/// Each row of `rule_values` assigns one bit to every position in
/// `variable_indexes` (same order); the rule holds when any row does.
/// `weight` and `ignore_zero_address` fall back to the model's config when
/// left unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rule {
    label: String,
    variable_indexes: Vec<usize>,
    rule_values: Vec<Vec<u8>>,
    weight: Option<u64>,
    ignore_zero_address: Option<bool>,
}

impl Rule {
    pub fn new<L: Into<String>>(
        label: L,
        variable_indexes: Vec<usize>,
        rule_values: Vec<Vec<u8>>,
    ) -> Rule {
        Rule {
            label: label.into(),
            variable_indexes,
            rule_values,
            weight: None,
            ignore_zero_address: None,
        }
    }

    pub fn weight(mut self, weight: u64) -> Rule {
        self.weight = Some(weight);
        self
    }

    pub fn ignore_zero_address(mut self, ignore: bool) -> Rule {
        self.ignore_zero_address = Some(ignore);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn variable_indexes(&self) -> &[usize] {
        &self.variable_indexes
    }

    pub fn rule_values(&self) -> &[Vec<u8>] {
        &self.rule_values
    }

    pub fn weight_or(&self, default: u64) -> u64 {
        self.weight.unwrap_or(default)
    }

    pub fn ignore_zero_address_or(&self, default: bool) -> bool {
        self.ignore_zero_address.unwrap_or(default)
    }

    /// Smallest input able to hold every constrained position.
    pub fn min_input_size(&self) -> usize {
        self.variable_indexes
            .iter()
            .max()
            .map(|&i| i + 1)
            .unwrap_or(0)
    }

    /// Checks that don't depend on the model.
    pub fn validate(&self) -> Result<()> {
        if self.variable_indexes.is_empty() {
            return Err(WisardError::Config(String::from(
                "a rule needs at least one variable",
            )));
        }
        if self.rule_values.is_empty() {
            return Err(WisardError::Config(String::from(
                "a rule needs at least one row of values",
            )));
        }
        if self.weight == Some(0) {
            return Err(WisardError::Config(String::from(
                "rule weight must be positive",
            )));
        }

        let mut seen = HashMap::with_capacity(self.variable_indexes.len());
        for (column, &index) in self.variable_indexes.iter().enumerate() {
            if let Some(first) = seen.insert(index, column) {
                return Err(WisardError::Config(format!(
                    "variable index {} is listed twice (columns {} and {})",
                    index, first, column
                )));
            }
        }

        for (r, row) in self.rule_values.iter().enumerate() {
            if row.len() != self.variable_indexes.len() {
                return Err(WisardError::Shape(format!(
                    "rule row {} has {} values for {} variables",
                    r,
                    row.len(),
                    self.variable_indexes.len()
                )));
            }
        }
        Ok(())
    }
}

/// Turns `rule` into the `(ram, address)` pairs it writes.
///
/// For every RAM whose tuple shares positions with the rule, each row fixes
/// those bits and every combination of the tuple's remaining bits is
/// enumerated, giving `2^free` addresses per row. RAMs sharing nothing with
/// the rule are left alone. An address reached by several rows appears once
/// per row.
pub fn compile(
    rule: &Rule,
    addresser: &Addresser,
    ignore_zero_address: bool,
) -> Result<Vec<(usize, u64)>> {
    rule.validate()?;
    if let Some(&index) = rule
        .variable_indexes
        .iter()
        .find(|&&i| i >= addresser.input_size())
    {
        return Err(WisardError::Shape(format!(
            "variable index {} is outside an input of {} bits",
            index,
            addresser.input_size()
        )));
    }

    let columns: HashMap<usize, usize> = rule
        .variable_indexes
        .iter()
        .enumerate()
        .map(|(column, &index)| (index, column))
        .collect();

    let mut writes = Vec::new();
    for (t, tuple) in addresser.tuples().iter().enumerate() {
        let width = tuple.len();
        let mut fixed = Vec::new();
        let mut free = Vec::new();
        for (b, position) in tuple.iter().enumerate() {
            let shift = width - 1 - b;
            match columns.get(position) {
                Some(&column) => fixed.push((shift, column)),
                None => free.push(shift),
            }
        }
        if fixed.is_empty() {
            continue;
        }

        for row in &rule.rule_values {
            let base = fixed
                .iter()
                .filter(|&&(_, column)| row[column] != 0)
                .fold(0u64, |address, &(shift, _)| address | 1 << shift);

            for combination in 0..(1u64 << free.len()) {
                let address = free
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| combination >> j & 1 == 1)
                    .fold(base, |address, (_, &shift)| address | 1 << shift);
                if ignore_zero_address && address == 0 {
                    continue;
                }
                writes.push((t, address));
            }
        }
    }

    debug!(
        "rule for label {} compiled into {} writes",
        rule.label,
        writes.len()
    );
    Ok(writes)
}
