//! Seedable noise source for the truth simulation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform noise with a reproducible seed.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: StdRng,
}

impl NoiseSource {
    /// `None` seeds from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Random value in [-1, 1]
    #[inline]
    pub fn rand_noise(&mut self) -> f64 {
        self.rng.gen_range(-1.0..=1.0)
    }

    /// Random value in [-limit, limit]
    #[inline]
    pub fn uniform(&mut self, limit: f64) -> f64 {
        limit * self.rand_noise()
    }

    /// `value * (1 + U(-limit, limit))`
    #[inline]
    pub fn scale(&mut self, value: f64, limit: f64) -> f64 {
        value * (1.0 + self.uniform(limit))
    }
}
