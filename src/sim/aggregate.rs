//! Datacenter-wide reduction of per-unit physics results.

use std::fmt;

use serde::Serialize;

use super::physics::{CoolingStrategy, UnitResult};
use crate::scenario::UnitState;

/// Hours in a billing day.
const HOURS_PER_DAY: f64 = 24.0;

/// Datacenter snapshot for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedMetrics {
    /// Sum of server draw (kW).
    pub total_server_power_kw: f64,
    /// Sum of cooling draw (kW).
    pub total_cooling_power_kw: f64,
    /// Facility PUE: total facility power over total server power.
    pub average_pue: f64,
    /// Hottest outlet across units (°C).
    pub max_outlet_temp_c: f64,
    /// Facility power priced over a full day (USD).
    pub total_daily_cost_usd: f64,
    /// Strategy of the unit furthest above its target outlet.
    pub cooling_strategy: CoolingStrategy,
    /// Sum of delivered compute.
    pub total_compute_output: f64,
    /// Outlet temperature per unit, in batch order.
    pub individual_outlet_temps: Vec<f64>,
    /// Workload per unit, in batch order.
    pub individual_workloads: Vec<f64>,
}

impl AggregatedMetrics {
    /// Server plus cooling draw (kW).
    pub fn total_power_kw(&self) -> f64 {
        self.total_server_power_kw + self.total_cooling_power_kw
    }

    /// Mean outlet temperature across units (°C).
    pub fn mean_outlet_temp_c(&self) -> f64 {
        if self.individual_outlet_temps.is_empty() {
            return 0.0;
        }
        self.individual_outlet_temps.iter().sum::<f64>() / self.individual_outlet_temps.len() as f64
    }
}

impl fmt::Display for AggregatedMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "server={:>7.2} kW  cooling={:>7.2} kW | PUE={:.3}  max={:>5.2}°C | \
             cost=${:>8.2}/day  compute={:>9.1} | {}",
            self.total_server_power_kw,
            self.total_cooling_power_kw,
            self.average_pue,
            self.max_outlet_temp_c,
            self.total_daily_cost_usd,
            self.total_compute_output,
            self.cooling_strategy,
        )
    }
}

/// Reduces a batch of unit results into [`AggregatedMetrics`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    cost_per_kwh_usd: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(0.12)
    }
}

impl Aggregator {
    /// Creates an aggregator pricing energy at `cost_per_kwh_usd`.
    pub fn new(cost_per_kwh_usd: f64) -> Self {
        Self { cost_per_kwh_usd }
    }

    /// Aggregates `results` (with the states that produced them).
    ///
    /// Returns `None` for an empty batch.
    pub fn aggregate(&self, results: &[UnitResult], states: &[UnitState]) -> Option<AggregatedMetrics> {
        let first = results.first()?;

        let mut server_w = 0.0;
        let mut cooling_w = 0.0;
        let mut compute = 0.0;
        let mut max_outlet = f64::NEG_INFINITY;
        let mut worst = first;
        for r in results {
            server_w += r.server_power_w;
            cooling_w += r.cooling_power_w;
            compute += r.compute_output;
            max_outlet = max_outlet.max(r.outlet_temp_c);
            // strict comparison keeps the first unit on ties
            if r.temp_deviation_c > worst.temp_deviation_c {
                worst = r;
            }
        }

        let facility_w = server_w + cooling_w;
        let average_pue = if server_w > 0.0 {
            facility_w / server_w
        } else {
            0.0
        };

        Some(AggregatedMetrics {
            total_server_power_kw: server_w / 1000.0,
            total_cooling_power_kw: cooling_w / 1000.0,
            average_pue,
            max_outlet_temp_c: max_outlet,
            total_daily_cost_usd: facility_w / 1000.0 * self.cost_per_kwh_usd * HOURS_PER_DAY,
            cooling_strategy: worst.cooling_strategy,
            total_compute_output: compute,
            individual_outlet_temps: results.iter().map(|r| r.outlet_temp_c).collect(),
            individual_workloads: states.iter().map(|s| s.workload_percent).collect(),
        })
    }
}
