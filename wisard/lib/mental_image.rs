use serde::{Deserialize, Serialize};

use crate::addresser::Addresser;
use crate::discriminator::Discriminator;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MentalImage {
    pub label: String,
    /// One score in `[0, 1]` per input position.
    pub image: Vec<f64>,
}

/// Relevance of every input position for `disc`.
///
/// A position's score is the share of its RAM's total count sitting on
/// addresses where that position's bit is 1. Empty RAMs score 0.
pub fn reconstruct(disc: &Discriminator, addresser: &Addresser) -> MentalImage {
    let mut image = vec![0.0; addresser.input_size()];

    for (tuple, ram) in addresser.tuples().iter().zip(disc.rams()) {
        // counters may sit at u64::MAX, so sum in u128
        let entries = ram.entries();
        let total: u128 = entries.values().map(|&c| c as u128).sum();
        if total == 0 {
            continue;
        }
        let width = tuple.len();
        let mut ones = vec![0u128; width];
        for (address, count) in entries {
            for (b, sum) in ones.iter_mut().enumerate() {
                if address >> (width - 1 - b) & 1 == 1 {
                    *sum += count as u128;
                }
            }
        }
        for (&position, sum) in tuple.iter().zip(ones) {
            image[position] = sum as f64 / total as f64;
        }
    }

    MentalImage {
        label: disc.label().to_string(),
        image,
    }
}
