//! Bootstrap resampling and parameter perturbation.
//!
//! Two primitives drive the Monte Carlo trials:
//! - `block_bootstrap_sample`: resample the price history in contiguous
//!   blocks to preserve short-range temporal correlation, then re-sort the
//!   concatenation chronologically.
//! - `parameter_noise_injection`: jitter a `(short, long)` window pair with
//!   Gaussian noise proportional to each window's size.
//!
//! Every call constructs its own seeded `StdRng`, so the same seed yields
//! bit-identical output regardless of thread scheduling.
//!
//! The final chronological sort deliberately destroys block contiguity:
//! downstream strategy evaluation is a plain chronological walk, so block
//! identity carries no meaning past this point.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::config::RobustnessConfig;
use crate::domain::PriceBar;

/// Produces resampled price series and parameter perturbations.
#[derive(Debug, Clone)]
pub struct BootstrapSampler {
    block_size: usize,
    min_data_fraction: f64,
    noise_std: f64,
}

impl Default for BootstrapSampler {
    fn default() -> Self {
        Self::from_config(&RobustnessConfig::default())
    }
}

impl BootstrapSampler {
    pub fn new(block_size: usize, min_data_fraction: f64, noise_std: f64) -> Self {
        Self {
            block_size: block_size.max(1),
            min_data_fraction: min_data_fraction.clamp(0.1, 1.0),
            noise_std: noise_std.max(0.0),
        }
    }

    pub fn from_config(config: &RobustnessConfig) -> Self {
        Self::new(
            config.bootstrap_block_size,
            config.min_data_fraction,
            config.noise_std,
        )
    }

    /// Draw one bootstrap resample of `series`.
    ///
    /// Series shorter than the block size fall back to a simple bootstrap
    /// (independent rows with replacement). Otherwise contiguous blocks are
    /// drawn with replacement, topped up with single rows until the resample
    /// holds at least `min_data_fraction` of the original, and finally
    /// re-sorted by date.
    ///
    /// Deterministic: equal seeds produce bit-identical output. Never returns
    /// an empty series for non-empty input.
    pub fn block_bootstrap_sample(&self, series: &[PriceBar], seed: u64) -> Vec<PriceBar> {
        let n = series.len();
        if n == 0 {
            return Vec::new();
        }

        let mut rng = StdRng::seed_from_u64(seed);

        if n < self.block_size {
            return self.simple_bootstrap(series, &mut rng);
        }

        let min_periods = (n as f64 * self.min_data_fraction).floor() as usize;
        let n_blocks = (min_periods / self.block_size).max(1);

        let mut resampled = Vec::with_capacity(min_periods + self.block_size);
        for _ in 0..n_blocks {
            let start = if n > self.block_size {
                rng.gen_range(0..n - self.block_size)
            } else {
                0
            };
            resampled.extend_from_slice(&series[start..start + self.block_size]);
        }

        // Top up with independently drawn rows until the size floor is met.
        while resampled.len() < min_periods {
            resampled.push(series[rng.gen_range(0..n)].clone());
        }

        resampled.sort_by(|a, b| a.date.cmp(&b.date));
        resampled
    }

    /// Simple bootstrap for series shorter than one block: sorted independent
    /// draws with replacement, sized at `max(min_data_fraction, 0.8)` of the
    /// original (at least one row).
    fn simple_bootstrap(&self, series: &[PriceBar], rng: &mut StdRng) -> Vec<PriceBar> {
        let n = series.len();
        let n_samples = ((n as f64 * self.min_data_fraction.max(0.8)).floor() as usize).max(1);

        let mut indices: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n)).collect();
        indices.sort_unstable();

        indices.into_iter().map(|i| series[i].clone()).collect()
    }

    /// Jitter a `(short, long)` window pair with Gaussian noise scaled to
    /// each window.
    ///
    /// Invariants on the output: `short' >= 2` and `long' > short'`.
    pub fn parameter_noise_injection(
        &self,
        short: u32,
        long: u32,
        rng: &mut StdRng,
    ) -> (u32, u32) {
        let noisy_short = short as f64 + self.draw_noise(short as f64, rng);
        let short_out = noisy_short.round().max(2.0) as u32;

        let noisy_long = long as f64 + self.draw_noise(long as f64, rng);
        let long_out = noisy_long.round().max(short_out as f64 + 1.0) as u32;

        (short_out, long_out)
    }

    /// One draw from Normal(0, value * noise_std); zero when the scale
    /// degenerates.
    fn draw_noise(&self, value: f64, rng: &mut StdRng) -> f64 {
        let sd = value * self.noise_std;
        if sd <= 0.0 {
            return 0.0;
        }
        Normal::new(0.0, sd).map_or(0.0, |dist| dist.sample(rng))
    }
}
