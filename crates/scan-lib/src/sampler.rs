//! Statistical sampling of the discovered fleet
//!
//! Sample mode trades accuracy for runtime: a uniform
//! without-replacement subset gets real metric calls and the caller
//! scales its aggregates by the extrapolation factor. Seeding is
//! optional; seeded runs are reproducible, unseeded runs draw from
//! entropy.

use crate::models::ResourceDescriptor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Outcome of sample selection
#[derive(Debug, Clone)]
pub struct SampleSelection {
    /// Chosen resources, in their original discovery order
    pub selected: Vec<ResourceDescriptor>,
    /// |resources| / |selected|, 1.0 when nothing was excluded
    pub extrapolation_factor: f64,
}

/// Uniform without-replacement sampler
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    /// Seeded sampler for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Entropy-seeded sampler for production runs
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Choose `sample_size` resources uniformly without replacement.
    ///
    /// Fleets no larger than the sample size are returned whole with a
    /// factor of 1.0, degrading sample mode to full-equivalent
    /// behavior.
    pub fn select(
        &mut self,
        resources: &[ResourceDescriptor],
        sample_size: usize,
    ) -> SampleSelection {
        let population = resources.len();

        if population == 0 || sample_size >= population {
            return SampleSelection {
                selected: resources.to_vec(),
                extrapolation_factor: 1.0,
            };
        }

        // Partial Fisher-Yates over indices: the first `sample_size`
        // positions end up holding a uniform without-replacement draw.
        let mut indices: Vec<usize> = (0..population).collect();
        for i in 0..sample_size {
            let j = self.rng.gen_range(i..population);
            indices.swap(i, j);
        }

        let mut chosen = indices[..sample_size].to_vec();
        chosen.sort_unstable();

        let selected: Vec<ResourceDescriptor> =
            chosen.iter().map(|&i| resources[i].clone()).collect();
        let factor = population as f64 / selected.len() as f64;

        debug!(
            population,
            sampled = selected.len(),
            factor,
            "Sample selection complete"
        );

        SampleSelection {
            selected,
            extrapolation_factor: factor,
        }
    }
}
