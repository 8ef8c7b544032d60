//! Run configuration: horizon, arrival mix, service means and capacities.
//!
//! All durations are simulation minutes. Defaults describe a three-week run of
//! a mid-sized department (two warm-up days, ten arrivals per hour).

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::clock::MINUTES_PER_DAY;
use crate::error::ConfigurationError;
use crate::pool::PoolKind;

/// Smallest accepted census spacing. Finer sampling adds events without
/// changing utilization estimates, and very small steps stop advancing `now`.
pub const MIN_CENSUS_INTERVAL_MINUTES: f64 = 0.1;

/// Fixed staffing and space of the department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCapacities {
    pub fast_capacity: usize,
    pub main_beds: usize,
    pub main_providers: usize,
    pub lab_techs: usize,
}

impl Default for ResourceCapacities {
    fn default() -> Self {
        Self {
            fast_capacity: 1,
            main_beds: 15,
            main_providers: 5,
            lab_techs: 2,
        }
    }
}

impl ResourceCapacities {
    pub fn get(&self, kind: PoolKind) -> usize {
        match kind {
            PoolKind::FastTrack => self.fast_capacity,
            PoolKind::Beds => self.main_beds,
            PoolKind::Providers => self.main_providers,
            PoolKind::Lab => self.lab_techs,
        }
    }
}

/// Parameters for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated horizon; no event at or beyond it is processed.
    pub horizon_minutes: f64,
    /// Statistics are only recorded for events at or after this time.
    pub warmup_minutes: f64,
    pub arrival_rate_per_hour: f64,
    /// Probability an arrival is streamed to fast-track.
    pub p_fast: f64,
    /// Probability a main-stream patient needs lab work.
    pub p_lab: f64,
    /// Probability a main-stream patient is admitted.
    pub p_admit: f64,
    pub fast_service_mean: f64,
    pub main_initial_mean: f64,
    pub lab_mean: f64,
    pub review_mean: f64,
    pub boarding_mean: f64,
    /// Maximum queueing time before a patient leaves without being seen.
    /// `None` disables abandonment.
    pub lwbs_wait_cap_minutes: Option<f64>,
    /// Estimated fast-track wait above which patients overflow to main beds.
    pub overflow_threshold_minutes: f64,
    /// Spacing of census samples; at least [MIN_CENSUS_INTERVAL_MINUTES].
    pub census_interval_minutes: f64,
    pub capacities: ResourceCapacities,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            horizon_minutes: 21.0 * MINUTES_PER_DAY,
            warmup_minutes: 2.0 * MINUTES_PER_DAY,
            arrival_rate_per_hour: 10.0,
            p_fast: 0.52,
            p_lab: 0.4,
            p_admit: 0.3,
            fast_service_mean: 15.0,
            main_initial_mean: 30.0,
            lab_mean: 30.0,
            review_mean: 15.0,
            boarding_mean: 120.0,
            lwbs_wait_cap_minutes: Some(240.0),
            overflow_threshold_minutes: 30.0,
            census_interval_minutes: 1.0,
            capacities: ResourceCapacities::default(),
            seed: 88,
        }
    }
}

impl SimulationConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set horizon and warm-up in whole days.
    pub fn with_days(mut self, sim_days: f64, warmup_days: f64) -> Self {
        self.horizon_minutes = sim_days * MINUTES_PER_DAY;
        self.warmup_minutes = warmup_days * MINUTES_PER_DAY;
        self
    }

    pub fn with_horizon_minutes(mut self, horizon_minutes: f64, warmup_minutes: f64) -> Self {
        self.horizon_minutes = horizon_minutes;
        self.warmup_minutes = warmup_minutes;
        self
    }

    pub fn with_arrival_rate(mut self, per_hour: f64) -> Self {
        self.arrival_rate_per_hour = per_hour;
        self
    }

    pub fn with_capacities(mut self, capacities: ResourceCapacities) -> Self {
        self.capacities = capacities;
        self
    }

    pub fn with_lwbs_cap(mut self, minutes: f64) -> Self {
        self.lwbs_wait_cap_minutes = Some(minutes);
        self
    }

    /// Patients wait indefinitely for fast-track slots and beds.
    pub fn without_lwbs(mut self) -> Self {
        self.lwbs_wait_cap_minutes = None;
        self
    }

    pub fn with_overflow_threshold(mut self, minutes: f64) -> Self {
        self.overflow_threshold_minutes = minutes;
        self
    }

    /// Mean inter-arrival gap in minutes, or `None` when nobody arrives.
    pub fn mean_interarrival_minutes(&self) -> Option<f64> {
        let per_minute = self.arrival_rate_per_hour / 60.0;
        (per_minute > 0.0).then(|| 1.0 / per_minute)
    }

    /// Reject invalid values instead of clamping them.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for kind in PoolKind::ALL {
            let value = self.capacities.get(kind);
            if value == 0 {
                return Err(ConfigurationError::NonPositiveCapacity { pool: kind, value });
            }
        }

        at_least("horizon_minutes", self.horizon_minutes, f64::MIN_POSITIVE)?;
        at_least("warmup_minutes", self.warmup_minutes, 0.0)?;
        if self.warmup_minutes > self.horizon_minutes {
            return Err(ConfigurationError::WarmupBeyondHorizon {
                warmup_minutes: self.warmup_minutes,
                horizon_minutes: self.horizon_minutes,
            });
        }

        at_least("arrival_rate_per_hour", self.arrival_rate_per_hour, 0.0)?;
        probability("p_fast", self.p_fast)?;
        probability("p_lab", self.p_lab)?;
        probability("p_admit", self.p_admit)?;

        // Log-normal means must be strictly positive: the location is ln(mean).
        at_least("fast_service_mean", self.fast_service_mean, f64::MIN_POSITIVE)?;
        at_least("main_initial_mean", self.main_initial_mean, f64::MIN_POSITIVE)?;
        at_least("lab_mean", self.lab_mean, f64::MIN_POSITIVE)?;
        at_least("review_mean", self.review_mean, f64::MIN_POSITIVE)?;
        at_least("boarding_mean", self.boarding_mean, f64::MIN_POSITIVE)?;

        if let Some(cap) = self.lwbs_wait_cap_minutes {
            at_least("lwbs_wait_cap_minutes", cap, f64::MIN_POSITIVE)?;
        }
        at_least(
            "overflow_threshold_minutes",
            self.overflow_threshold_minutes,
            0.0,
        )?;
        at_least(
            "census_interval_minutes",
            self.census_interval_minutes,
            MIN_CENSUS_INTERVAL_MINUTES,
        )?;
        Ok(())
    }
}

fn at_least(field: &'static str, value: f64, min: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= min {
        Ok(())
    } else {
        Err(ConfigurationError::OutOfRange { field, value, min })
    }
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidProbability { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.horizon_minutes, 30_240.0);
        assert_eq!(config.warmup_minutes, 2_880.0);
        assert_eq!(config.mean_interarrival_minutes(), Some(6.0));
    }

    #[test]
    fn zero_capacity_fails_fast() {
        let config = SimulationConfig::default().with_capacities(ResourceCapacities {
            main_providers: 0,
            ..Default::default()
        });
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::NonPositiveCapacity {
                pool: PoolKind::Providers,
                value: 0
            })
        );
    }

    #[test]
    fn probabilities_outside_unit_interval_fail() {
        let config = SimulationConfig {
            p_admit: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidProbability { field: "p_admit", .. })
        ));

        let config = SimulationConfig {
            p_fast: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_rates_and_means_fail() {
        let config = SimulationConfig::default().with_arrival_rate(-1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::OutOfRange {
                field: "arrival_rate_per_hour",
                ..
            })
        ));

        let config = SimulationConfig {
            lab_mean: -5.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::OutOfRange { field: "lab_mean", .. })
        ));
    }

    #[test]
    fn warmup_must_fit_in_horizon() {
        let config = SimulationConfig::default().with_horizon_minutes(100.0, 200.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::WarmupBeyondHorizon { .. })
        ));
        let config = SimulationConfig::default().with_horizon_minutes(100.0, 100.0);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn census_interval_below_minimum_fails() {
        for interval in [1e-300, 0.0, 0.05] {
            let config = SimulationConfig {
                census_interval_minutes: interval,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigurationError::OutOfRange {
                    field: "census_interval_minutes",
                    ..
                })
            ));
        }
        let config = SimulationConfig {
            census_interval_minutes: MIN_CENSUS_INTERVAL_MINUTES,
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_arrival_rate_has_no_interarrival_mean() {
        let config = SimulationConfig::default().with_arrival_rate(0.0);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.mean_interarrival_minutes(), None);
    }

    #[test]
    fn lwbs_cap_must_be_positive_when_present() {
        let config = SimulationConfig::default().with_lwbs_cap(0.0);
        assert!(config.validate().is_err());
        let config = SimulationConfig::default().without_lwbs();
        assert_eq!(config.validate(), Ok(()));
    }
}
