//! Closed-form power/thermal model of a single unit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scenario::UnitState;

/// Named constants and thresholds of the physics model.
///
/// Every field is overridable from the `[physics]` config section; the
/// defaults describe a 1U server with a dedicated cooling share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsParams {
    /// Server draw at 100 % workload (W).
    pub server_max_power_w: f64,
    /// Server draw at 0 % workload (W).
    pub server_idle_power_w: f64,
    /// Outlet temperature rise per watt of server power (°C/W).
    pub heat_dissipation_c_per_w: f64,
    /// Cooling draw with no load and ideal conditions (W).
    pub cooling_base_power_w: f64,
    /// Cooling watts spent per watt of heat removed.
    pub cooling_efficiency_factor: f64,
    /// Extra cooling watts per °C of ambient above ideal.
    pub ambient_impact_w_per_c: f64,
    /// Ambient temperature above which cooling strains (°C).
    pub ideal_ambient_temp_c: f64,
    /// Inlet temperature below which cooling must work harder (°C).
    pub ideal_inlet_temp_c: f64,
    /// Extra cooling watts per °C of requested inlet below ideal.
    pub inlet_impact_w_per_c: f64,
    /// Realized inlet rise per °C of ambient above ideal.
    pub ambient_strain_factor: f64,
    /// Realized inlet rise at full server power (°C).
    pub workload_strain_c: f64,
    /// Outlet temperature the facility aims for (°C).
    pub target_outlet_temp_c: f64,
    /// Compute output at 100 % workload with no throttling.
    pub max_compute_output: f64,
    /// Outlet temperature where thermal throttling starts (°C).
    pub throttle_threshold_c: f64,
    /// Throttled fraction per °C above the threshold.
    pub throttle_rate_per_c: f64,
    /// Deviation above which the unit is critical (°C).
    pub critical_deviation_c: f64,
    /// Deviation above which the unit is in warning (°C).
    pub warning_deviation_c: f64,
    /// PUE above which an efficiency alert is raised.
    pub pue_alert_threshold: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            server_max_power_w: 1440.0,
            server_idle_power_w: 210.0,
            heat_dissipation_c_per_w: 0.0117,
            cooling_base_power_w: 400.0,
            cooling_efficiency_factor: 0.42,
            ambient_impact_w_per_c: 15.0,
            ideal_ambient_temp_c: 20.0,
            ideal_inlet_temp_c: 25.0,
            inlet_impact_w_per_c: 25.0,
            ambient_strain_factor: 0.1,
            workload_strain_c: 0.5,
            target_outlet_temp_c: 35.0,
            max_compute_output: 10_000.0,
            throttle_threshold_c: 38.0,
            throttle_rate_per_c: 0.10,
            critical_deviation_c: 2.0,
            warning_deviation_c: 0.5,
            pue_alert_threshold: 1.8,
        }
    }
}

/// Recommended cooling action, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoolingStrategy {
    /// Within target; keep monitoring.
    Stable,
    /// Thermally fine but spending too much on cooling.
    EfficiencyAlert,
    /// Outlet slightly above target.
    Warning,
    /// Outlet well above target.
    Critical,
}

impl CoolingStrategy {
    /// Machine-readable name, matching the serialized form.
    pub fn code(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::EfficiencyAlert => "efficiency_alert",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Human-readable recommendation.
    pub fn label(self) -> &'static str {
        match self {
            Self::Stable => "STABLE: Monitor",
            Self::EfficiencyAlert => "EFFICIENCY ALERT: Optimize Cooling",
            Self::Warning => "WARNING: Increase Cooling",
            Self::Critical => "CRITICAL: Boost All Cooling",
        }
    }
}

impl fmt::Display for CoolingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Physics output for one unit and one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitResult {
    /// Inlet temperature actually achieved (°C).
    pub actual_inlet_temp_c: f64,
    /// Server exhaust temperature (°C).
    pub outlet_temp_c: f64,
    /// `outlet_temp_c - target_outlet_temp_c`.
    pub temp_deviation_c: f64,
    /// Recommended cooling action.
    pub cooling_strategy: CoolingStrategy,
    /// Server electrical draw (W).
    pub server_power_w: f64,
    /// Cooling electrical draw (W).
    pub cooling_power_w: f64,
    /// Unit-level power usage effectiveness (0 when server power is 0).
    pub pue: f64,
    /// Delivered compute after thermal throttling.
    pub compute_output: f64,
}

/// Stateless unit physics with fixed constants.
#[derive(Debug, Clone, Default)]
pub struct PhysicsEngine {
    params: PhysicsParams,
}

impl PhysicsEngine {
    /// Creates an engine with the given constants.
    pub fn new(params: PhysicsParams) -> Self {
        Self { params }
    }

    /// Returns the engine constants.
    pub fn params(&self) -> &PhysicsParams {
        &self.params
    }

    /// Computes the power/thermal outcome of one unit state.
    ///
    /// `inlet_temp_c` is treated as the operator's *target*; the realized
    /// inlet is pushed up by hot ambient air and by server load.
    pub fn compute(&self, state: &UnitState) -> UnitResult {
        let p = &self.params;
        let workload_fraction = state.workload_percent / 100.0;

        let server_power_w = p.server_idle_power_w
            + workload_fraction * (p.server_max_power_w - p.server_idle_power_w);
        let heat_generated_w = server_power_w;

        let ambient_excess_c = (state.ambient_temp_c - p.ideal_ambient_temp_c).max(0.0);
        let inlet_shortfall_c = (p.ideal_inlet_temp_c - state.inlet_temp_c).max(0.0);
        let cooling_power_w = p.cooling_base_power_w
            + heat_generated_w * p.cooling_efficiency_factor
            + ambient_excess_c * p.ambient_impact_w_per_c
            + inlet_shortfall_c * p.inlet_impact_w_per_c;

        let power_fraction = if p.server_max_power_w > 0.0 {
            server_power_w / p.server_max_power_w
        } else {
            0.0
        };
        let actual_inlet_temp_c = state.inlet_temp_c
            + ambient_excess_c * p.ambient_strain_factor
            + power_fraction * p.workload_strain_c;

        let outlet_temp_c = actual_inlet_temp_c + server_power_w * p.heat_dissipation_c_per_w;

        let pue = if server_power_w > 0.0 {
            (server_power_w + cooling_power_w) / server_power_w
        } else {
            0.0
        };

        let temp_deviation_c = outlet_temp_c - p.target_outlet_temp_c;
        let cooling_strategy = self.strategy(temp_deviation_c, pue);

        let base_compute = workload_fraction * p.max_compute_output;
        let throttling = if outlet_temp_c > p.throttle_threshold_c {
            ((outlet_temp_c - p.throttle_threshold_c) * p.throttle_rate_per_c).min(1.0)
        } else {
            0.0
        };
        let compute_output = base_compute * (1.0 - throttling);

        UnitResult {
            actual_inlet_temp_c,
            outlet_temp_c,
            temp_deviation_c,
            cooling_strategy,
            server_power_w,
            cooling_power_w,
            pue,
            compute_output,
        }
    }

    /// Deviation thresholds take precedence over the PUE threshold.
    fn strategy(&self, temp_deviation_c: f64, pue: f64) -> CoolingStrategy {
        let p = &self.params;
        if temp_deviation_c > p.critical_deviation_c {
            CoolingStrategy::Critical
        } else if temp_deviation_c > p.warning_deviation_c {
            CoolingStrategy::Warning
        } else if pue > p.pue_alert_threshold {
            CoolingStrategy::EfficiencyAlert
        } else {
            CoolingStrategy::Stable
        }
    }
}
