//! Noise bursts that seed a string's delay line.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// A source of independent samples uniformly distributed in `[-1, 1)`.
///
/// Each voice owns one, so the same seed always reproduces the same pluck.
#[derive(Debug, Clone)]
pub struct Excitation {
    rng: StdRng,
}

impl Excitation {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Overwrites `buffer` with a fresh burst.
    pub fn fill(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.rng.gen_range(-1.0..1.0);
        }
    }
}

impl Default for Excitation {
    fn default() -> Self {
        Self::from_entropy()
    }
}
