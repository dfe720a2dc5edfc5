//! Day/night modulation and stochastic noise on top of baseline unit states.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::scenario::UnitState;

/// Shape of the natural variation applied every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariationParams {
    /// Workload multiplier at the daily peak.
    pub workload_peak: f64,
    /// Workload multiplier at the nightly trough.
    pub workload_trough: f64,
    /// Ambient multiplier at the daily peak.
    pub ambient_peak: f64,
    /// Ambient multiplier at the nightly trough.
    pub ambient_trough: f64,
    /// First hour of the lunchtime dip (inclusive).
    pub lunch_start_hour: u8,
    /// Last hour of the lunchtime dip (inclusive).
    pub lunch_end_hour: u8,
    /// Workload multiplier applied during the lunchtime dip.
    pub lunch_factor: f64,
    /// Half-width of the uniform workload noise (percentage points).
    pub workload_noise: f64,
    /// Per-unit, per-tick probability of a workload spike.
    pub spike_probability: f64,
    /// Smallest spike (percentage points).
    pub spike_min: f64,
    /// Largest spike (percentage points).
    pub spike_max: f64,
    /// Lower workload clamp (percent).
    pub workload_min: f64,
    /// Upper workload clamp (percent).
    pub workload_max: f64,
    /// Half-width of the uniform ambient noise (°C).
    pub ambient_noise: f64,
}

impl Default for VariationParams {
    fn default() -> Self {
        Self {
            workload_peak: 1.2,
            workload_trough: 0.7,
            ambient_peak: 1.1,
            ambient_trough: 0.9,
            lunch_start_hour: 12,
            lunch_end_hour: 13,
            lunch_factor: 0.8,
            workload_noise: 5.0,
            spike_probability: 0.02,
            spike_min: 15.0,
            spike_max: 30.0,
            workload_min: 5.0,
            workload_max: 100.0,
            ambient_noise: 1.0,
        }
    }
}

/// Day/night multiplier for `hour`: `trough` at 02:00, `peak` at 14:00.
pub fn diurnal_multiplier(hour: u8, peak: f64, trough: f64) -> f64 {
    let wave = (PI * (f64::from(hour) - 8.0) / 12.0).sin();
    trough + (1.0 + wave) / 2.0 * (peak - trough)
}

/// Stateful variation layer with its own simulated-hour clock.
///
/// Workload is clamped to the configured band; ambient is left unclamped.
#[derive(Debug, Clone)]
pub struct VariationModel {
    params: VariationParams,
    hour: u8,
    rng: StdRng,
}

impl VariationModel {
    /// Creates a model whose clock starts at `start_hour` (taken mod 24).
    pub fn new(params: VariationParams, start_hour: u8, seed: u64) -> Self {
        Self {
            params,
            hour: start_hour % 24,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Simulated hour the next call will use.
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Workload and ambient multipliers for `hour`.
    pub fn multipliers(&self, hour: u8) -> (f64, f64) {
        let p = &self.params;
        let mut workload = diurnal_multiplier(hour, p.workload_peak, p.workload_trough);
        if (p.lunch_start_hour..=p.lunch_end_hour).contains(&hour) {
            workload *= p.lunch_factor;
        }
        let ambient = diurnal_multiplier(hour, p.ambient_peak, p.ambient_trough);
        (workload, ambient)
    }

    /// Returns a varied copy of `baseline` and advances the clock by one hour.
    pub fn apply(&mut self, baseline: &[UnitState]) -> Vec<UnitState> {
        let (workload_mult, ambient_mult) = self.multipliers(self.hour);
        let p = self.params.clone();

        let varied = baseline
            .iter()
            .map(|state| {
                let mut workload = state.workload_percent * workload_mult
                    + symmetric(&mut self.rng, p.workload_noise);
                if self.rng.random_bool(p.spike_probability.clamp(0.0, 1.0)) {
                    workload += uniform(&mut self.rng, p.spike_min, p.spike_max);
                }
                let ambient =
                    state.ambient_temp_c * ambient_mult + symmetric(&mut self.rng, p.ambient_noise);

                UnitState {
                    workload_percent: workload.clamp(p.workload_min, p.workload_max),
                    ambient_temp_c: ambient,
                    ..*state
                }
            })
            .collect();

        self.hour = (self.hour + 1) % 24;
        varied
    }
}

/// Uniform draw in `[-half_width, half_width]`.
fn symmetric(rng: &mut StdRng, half_width: f64) -> f64 {
    uniform(rng, -half_width, half_width)
}

/// Uniform draw in `[lo, hi]`, tolerating an empty band.
fn uniform(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    rng.random_range(lo..=hi)
}
