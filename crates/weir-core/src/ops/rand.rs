//! Random permutation of a dataset.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataset::{Data, LazyDataset};

/// Shuffles the dataset through a permutation drawn when the operator is
/// applied.
///
/// The permutation is captured in the produced dataset, so re-accessing any
/// index is consistent across calls. A seeded shuffle is fully
/// deterministic; without a seed the permutation comes from OS entropy.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShuffleOp {
    seed: Option<u64>,
}

impl ShuffleOp {
    /// Creates a new, entropy-seeded [`ShuffleOp`].
    #[must_use]
    pub const fn new() -> Self {
        Self { seed: None }
    }

    /// Fixes the permutation seed.
    #[must_use]
    pub const fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    /// Applies the shuffle to `data`.
    pub fn apply(&self, data: &Data) -> Data {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut table: Vec<usize> = (0..data.len()).collect();
        table.shuffle(&mut rng);
        Data::new(LazyDataset::remapped(data.clone(), table))
    }
}

#[cfg(test)]
mod test {
    use super::ShuffleOp;
    use crate::testutil::{numbered, numbers_of};

    #[test]
    fn shuffle_is_a_permutation() {
        let shuffled = ShuffleOp::new().apply(&numbered(50));
        let mut numbers = numbers_of(&shuffled);
        numbers.sort_unstable();
        assert_eq!(numbers, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn seeded_shuffle_is_deterministic() {
        let data = numbered(30);
        let a = ShuffleOp::with_seed(7).apply(&data);
        let b = ShuffleOp::with_seed(7).apply(&data);
        assert_eq!(numbers_of(&a), numbers_of(&b));
    }

    #[test]
    fn reaccess_is_consistent() {
        let shuffled = ShuffleOp::new().apply(&numbered(20));
        let first = numbers_of(&shuffled);
        let second = numbers_of(&shuffled);
        assert_eq!(first, second);
    }
}
