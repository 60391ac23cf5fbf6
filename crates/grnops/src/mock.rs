//! Deterministic placeholder network.
//!
//! Used whenever a slot has no real inference tool available. The output is
//! a pure function of the gene labels and the seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::matrix::AdjacencyMatrix;

pub const DEFAULT_MOCK_SEED: u64 = 42;

/// Fraction of entries forced to zero.
pub const MOCK_SPARSITY: f64 = 0.95;

/// Uniform `[0, 1)` weights drawn row-major; anything above `1 - sparsity`
/// is dropped and the diagonal is zeroed (no self-loops).
pub fn mock_adjacency(labels: Vec<String>, seed: u64) -> AdjacencyMatrix {
    let n = labels.len();
    let keep_below = 1.0 - MOCK_SPARSITY;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut values = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let v: f64 = rng.gen();
            values.push(if i == j || v > keep_below { 0.0 } else { v });
        }
    }

    AdjacencyMatrix { labels, values }
}
