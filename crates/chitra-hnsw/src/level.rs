//! Random layer assignment for new nodes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Hard cap on sampled layers to keep pathological draws bounded.
pub const MAX_LAYER: usize = 16;

/// Samples node layers from an exponential distribution with decay
/// `1 / ln(m)`, so higher layers are exponentially rarer.
///
/// The generator is owned and explicitly seedable, making index builds
/// reproducible when a seed is supplied.
#[derive(Debug)]
pub struct LevelSampler {
    ml: f64,
    rng: StdRng,
}

impl LevelSampler {
    /// Create a sampler seeded from OS entropy.
    pub fn new(m: usize) -> Self {
        Self {
            ml: 1.0 / (m as f64).ln(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a deterministically seeded sampler.
    pub fn with_seed(m: usize, seed: u64) -> Self {
        Self {
            ml: 1.0 / (m as f64).ln(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sample the maximum layer for a new node.
    pub fn sample(&mut self) -> usize {
        let uniform: f64 = self.rng.gen();
        let level = (-uniform.ln() * self.ml).floor() as usize;
        level.min(MAX_LAYER)
    }
}
