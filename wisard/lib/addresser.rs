use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::MAX_ADDRESS_SIZE;
use crate::error::{Result, WisardError};

/// Pseudo-random partition of the input bits into tuples.
///
/// Positions `0..input_size` are shuffled once and cut into chunks of
/// `address_size`. When the input size isn't a multiple of the address size
/// the last tuple is shorter and addresses a smaller RAM. Addresses are built
/// big-endian: the first position of a tuple is its most significant bit.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Addresser {
    input_size: usize,
    address_size: u16,
    tuples: Vec<Vec<usize>>,
    // position -> (tuple, bit offset inside the tuple)
    lookup: Vec<(usize, usize)>,
}

impl Addresser {
    pub fn new(input_size: usize, address_size: u16, seed: u64) -> Result<Addresser> {
        if address_size == 0 || address_size > MAX_ADDRESS_SIZE {
            return Err(WisardError::Config(format!(
                "address size must be between 1 and {}, got {}",
                MAX_ADDRESS_SIZE, address_size
            )));
        }
        if input_size == 0 {
            return Err(WisardError::Shape(String::from(
                "can't build a mapping over an empty input",
            )));
        }

        let mut mapping = (0..input_size).collect::<Vec<usize>>();
        mapping.shuffle(&mut StdRng::seed_from_u64(seed));

        let tuples: Vec<Vec<usize>> = mapping
            .chunks(address_size as usize)
            .map(|chunk| chunk.to_vec())
            .collect();

        let mut lookup = vec![(0, 0); input_size];
        for (t, tuple) in tuples.iter().enumerate() {
            for (b, &position) in tuple.iter().enumerate() {
                lookup[position] = (t, b);
            }
        }

        Ok(Addresser {
            input_size,
            address_size,
            tuples,
            lookup,
        })
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn address_size(&self) -> u16 {
        self.address_size
    }

    pub fn num_tuples(&self) -> usize {
        self.tuples.len()
    }

    /// Input positions of the `index`-th tuple.
    ///
    /// # Panics
    ///
    /// If `index` isn't below [`num_tuples`](Addresser::num_tuples).
    pub fn tuple(&self, index: usize) -> &[usize] {
        &self.tuples[index]
    }

    pub fn tuples(&self) -> &[Vec<usize>] {
        &self.tuples
    }

    /// The tuple holding `position` and the bit offset of the position in it.
    pub fn locate(&self, position: usize) -> Option<(usize, usize)> {
        self.lookup.get(position).copied()
    }

    /// Flattened mapping, tuple after tuple.
    pub fn mapping(&self) -> Vec<usize> {
        self.tuples.iter().flatten().copied().collect()
    }

    pub fn check_width(&self, sample: &[u8]) -> Result<()> {
        if sample.len() != self.input_size {
            return Err(WisardError::Shape(format!(
                "expected {} input bits, got {}",
                self.input_size,
                sample.len()
            )));
        }
        Ok(())
    }

    /// Address the `tuple_index`-th RAM sees for `sample`.
    pub fn address_of(&self, tuple_index: usize, sample: &[u8]) -> Result<u64> {
        self.check_width(sample)?;
        let tuple = self.tuples.get(tuple_index).ok_or_else(|| {
            WisardError::Shape(format!(
                "tuple {} out of {}",
                tuple_index,
                self.tuples.len()
            ))
        })?;
        Ok(tuple_address(tuple, sample))
    }

    /// One address per tuple. The sample width must already be checked.
    pub(crate) fn addresses(&self, sample: &[u8]) -> Vec<u64> {
        self.tuples
            .iter()
            .map(|tuple| tuple_address(tuple, sample))
            .collect()
    }
}

fn tuple_address(tuple: &[usize], sample: &[u8]) -> u64 {
    address_from_bits(tuple.iter().map(|&p| sample[p] != 0))
}

/// Big-endian concatenation of `bits`.
pub fn address_from_bits<I>(bits: I) -> u64
where
    I: IntoIterator<Item = bool>,
{
    bits.into_iter()
        .fold(0u64, |address, bit| (address << 1) | bit as u64)
}

#[cfg(test)]
mod addresser_tests {
    use super::*;

    #[test]
    fn test_partition_covers_input() {
        let addresser = Addresser::new(10, 4, 42).unwrap();
        assert_eq!(addresser.num_tuples(), 3);
        assert_eq!(addresser.tuple(0).len(), 4);
        assert_eq!(addresser.tuple(1).len(), 4);
        // the remainder ends up in a short last tuple
        assert_eq!(addresser.tuple(2).len(), 2);

        let mut positions = addresser.mapping();
        positions.sort_unstable();
        assert_eq!(positions, (0..10).collect::<Vec<usize>>());
    }

    #[test]
    fn test_same_seed_same_mapping() {
        let a = Addresser::new(64, 8, 7).unwrap();
        let b = Addresser::new(64, 8, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_locate() {
        let addresser = Addresser::new(9, 2, 3).unwrap();
        for position in 0..9 {
            let (t, b) = addresser.locate(position).unwrap();
            assert_eq!(addresser.tuple(t)[b], position);
        }
        assert_eq!(addresser.locate(9), None);
    }

    #[test]
    fn test_address_is_big_endian() {
        assert_eq!(address_from_bits(vec![true, false, true, true]), 0b1011);
        assert_eq!(address_from_bits(vec![false, false]), 0);
        assert_eq!(address_from_bits(Vec::new()), 0);

        let addresser = Addresser::new(4, 4, 0).unwrap();
        let tuple = addresser.tuple(0).to_vec();
        let mut sample = vec![0u8; 4];
        sample[tuple[0]] = 1;
        assert_eq!(addresser.address_of(0, &sample), Ok(0b1000));
        sample[tuple[3]] = 1;
        assert_eq!(addresser.addresses(&sample), vec![0b1001]);
    }

    #[test]
    fn test_bad_parameters() {
        assert!(matches!(
            Addresser::new(8, 0, 0),
            Err(WisardError::Config(_))
        ));
        assert!(matches!(
            Addresser::new(0, 4, 0),
            Err(WisardError::Shape(_))
        ));
    }

    #[test]
    fn test_check_width() {
        let addresser = Addresser::new(5, 4, 0).unwrap();
        assert!(addresser.check_width(&[0, 1, 0, 1, 1]).is_ok());
        assert!(addresser.check_width(&[0, 1, 0, 1]).is_err());
    }

    #[test]
    fn test_address_of_checks_its_arguments() {
        let addresser = Addresser::new(5, 4, 0).unwrap();
        assert_eq!(addresser.num_tuples(), 2);
        assert!(addresser.address_of(1, &[0, 1, 0, 1, 1]).is_ok());
        assert!(matches!(
            addresser.address_of(2, &[0, 1, 0, 1, 1]),
            Err(WisardError::Shape(_))
        ));
        assert!(matches!(
            addresser.address_of(0, &[0, 1]),
            Err(WisardError::Shape(_))
        ));
    }
}
