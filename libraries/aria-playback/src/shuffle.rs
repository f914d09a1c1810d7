//! Shuffle algorithms for queue randomization

use rand::seq::SliceRandom;
use rand::Rng;

/// Uniform random permutation (Fisher-Yates)
///
/// Each element has equal probability of landing at any position.
pub fn shuffle_in_place<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    if items.len() > 1 {
        items.shuffle(rng);
    }
}

/// Uniform random index into a list of `len` items
///
/// Every index is eligible, including the one currently playing, so the
/// same track can come up twice in a row.
pub fn random_index<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Option<usize> {
    (len > 0).then(|| rng.gen_range(0..len))
}
