//! Outcome collection: waits, lengths of stay, boarding, occupancy samples.
//!
//! Every write is gated on the time of the event being recorded, never on the
//! patient's arrival time. A patient who arrived during warm-up but leaves
//! after it is counted; one who leaves before the cutoff never is.
//! Collections are append-only.

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::pool::PoolKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Resource)]
pub struct SimStats {
    /// Events before this time are not recorded.
    pub warmup_minutes: f64,

    /// Arrival to fast-track slot grant.
    pub waits_fast: Vec<f64>,
    /// Arrival to first provider grant on the main track (overflow included).
    pub waits_main: Vec<f64>,
    /// Length of stay of fast-track completions (overflow discharges included).
    pub los_fast: Vec<f64>,
    pub los_main_dc: Vec<f64>,
    pub los_main_admit: Vec<f64>,
    pub boarding_times: Vec<f64>,

    pub n_fast: u64,
    pub n_main_dc: u64,
    pub n_main_admit: u64,
    pub n_lwbs: u64,
    pub n_overflow: u64,

    pub fast_busy_samples: Vec<usize>,
    pub beds_busy_samples: Vec<usize>,
    pub prov_busy_samples: Vec<usize>,
    pub lab_busy_samples: Vec<usize>,
}

impl SimStats {
    pub fn new(warmup_minutes: f64) -> Self {
        Self {
            warmup_minutes,
            ..Default::default()
        }
    }

    pub fn is_recording(&self, now: f64) -> bool {
        now >= self.warmup_minutes
    }

    pub fn record_fast_wait(&mut self, now: f64, wait: f64) {
        if self.is_recording(now) {
            self.waits_fast.push(wait);
        }
    }

    pub fn record_main_wait(&mut self, now: f64, wait: f64) {
        if self.is_recording(now) {
            self.waits_main.push(wait);
        }
    }

    /// A fast-track episode finished, either in a fast-track slot or as an
    /// overflow patient discharged from a main bed.
    pub fn record_fast_completion(&mut self, now: f64, length_of_stay: f64) {
        if self.is_recording(now) {
            self.n_fast += 1;
            self.los_fast.push(length_of_stay);
        }
    }

    pub fn record_main_discharge(&mut self, now: f64, length_of_stay: f64) {
        if self.is_recording(now) {
            self.n_main_dc += 1;
            self.los_main_dc.push(length_of_stay);
        }
    }

    pub fn record_admission(&mut self, now: f64, length_of_stay: f64, boarded: f64) {
        if self.is_recording(now) {
            self.n_main_admit += 1;
            self.los_main_admit.push(length_of_stay);
            self.boarding_times.push(boarded);
        }
    }

    pub fn record_lwbs(&mut self, now: f64) {
        if self.is_recording(now) {
            self.n_lwbs += 1;
        }
    }

    pub fn record_overflow(&mut self, now: f64) {
        if self.is_recording(now) {
            self.n_overflow += 1;
        }
    }

    /// Append one occupancy sample per pool, ordered as [PoolKind::ALL].
    pub fn record_census(&mut self, now: f64, occupancy: [usize; 4]) {
        if !self.is_recording(now) {
            return;
        }
        for (kind, holders) in PoolKind::ALL.into_iter().zip(occupancy) {
            self.busy_samples_mut(kind).push(holders);
        }
    }

    pub fn busy_samples(&self, kind: PoolKind) -> &[usize] {
        match kind {
            PoolKind::FastTrack => &self.fast_busy_samples,
            PoolKind::Beds => &self.beds_busy_samples,
            PoolKind::Providers => &self.prov_busy_samples,
            PoolKind::Lab => &self.lab_busy_samples,
        }
    }

    fn busy_samples_mut(&mut self, kind: PoolKind) -> &mut Vec<usize> {
        match kind {
            PoolKind::FastTrack => &mut self.fast_busy_samples,
            PoolKind::Beds => &mut self.beds_busy_samples,
            PoolKind::Providers => &mut self.prov_busy_samples,
            PoolKind::Lab => &mut self.lab_busy_samples,
        }
    }

    /// Patients who reached a terminal state inside the recorded window.
    pub fn total_outcomes(&self) -> u64 {
        self.n_fast + self.n_main_dc + self.n_main_admit + self.n_lwbs
    }

    /// True when nothing at all was recorded.
    pub fn is_empty(&self) -> bool {
        self.total_outcomes() == 0
            && self.n_overflow == 0
            && self.waits_fast.is_empty()
            && self.waits_main.is_empty()
            && self.los_fast.is_empty()
            && self.los_main_dc.is_empty()
            && self.los_main_admit.is_empty()
            && self.boarding_times.is_empty()
            && PoolKind::ALL
                .into_iter()
                .all(|kind| self.busy_samples(kind).is_empty())
    }
}
