//! Duration distributions and classification draws.
//!
//! Every random value in a run comes from one [DurationSampler] so that a seed
//! fully determines the patient sequence and its outcomes.

use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp1, StandardNormal};

/// Shortest inter-arrival gap; keeps arrivals strictly increasing in time.
pub const MIN_EXPONENTIAL_MINUTES: f64 = 0.01;
/// Shortest service duration.
pub const MIN_LOGNORMAL_MINUTES: f64 = 0.5;
/// Log-normal sigma used for all service stages.
pub const DEFAULT_LOGNORMAL_SHAPE: f64 = 0.6;

/// Source of durations (minutes) and yes/no classification draws.
pub trait DurationSampler: Send + Sync + std::fmt::Debug {
    /// Exponentially distributed duration with the given mean.
    fn exponential(&mut self, mean: f64) -> f64;

    /// Log-normally distributed duration whose mean equals `mean`.
    fn lognormal(&mut self, mean: f64) -> f64;

    /// `true` with probability `p`.
    fn chance(&mut self, p: f64) -> bool;
}

/// Seeded, reproducible [DurationSampler].
#[derive(Debug, Clone)]
pub struct RandomStream {
    rng: StdRng,
}

impl RandomStream {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Log-normal draw with an explicit sigma. The location is chosen so the
    /// distribution mean is `mean`: `mu = ln(mean) - sigma^2 / 2`.
    pub fn lognormal_with_shape(&mut self, mean: f64, shape: f64) -> f64 {
        let mu = mean.ln() - 0.5 * shape * shape;
        let z: f64 = self.rng.sample(StandardNormal);
        (mu + shape * z).exp().max(MIN_LOGNORMAL_MINUTES)
    }
}

impl DurationSampler for RandomStream {
    fn exponential(&mut self, mean: f64) -> f64 {
        let draw: f64 = self.rng.sample(Exp1);
        (draw * mean).max(MIN_EXPONENTIAL_MINUTES)
    }

    fn lognormal(&mut self, mean: f64) -> f64 {
        self.lognormal_with_shape(mean, DEFAULT_LOGNORMAL_SHAPE)
    }

    fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }
}

/// World resource wrapping the run's sampler.
#[derive(Debug, Resource)]
pub struct RandomSource(pub Box<dyn DurationSampler>);

impl RandomSource {
    pub fn new(sampler: Box<dyn DurationSampler>) -> Self {
        Self(sampler)
    }

    pub fn seeded(seed: u64) -> Self {
        Self(Box::new(RandomStream::new(seed)))
    }

    pub fn sampler(&mut self) -> &mut dyn DurationSampler {
        self.0.as_mut()
    }
}
