//! TOML-based twin configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::analytics::AnalyticsParams;
use crate::optimizer::Profile;
use crate::sim::bridge::BridgeThresholds;
use crate::sim::overrides::{Override, Overrides};
use crate::sim::physics::PhysicsParams;
use crate::sim::variation::VariationParams;

/// Top-level configuration parsed from TOML.
///
/// Every section has defaults matching the baseline preset. Load from TOML
/// with [`TwinConfig::from_toml_file`] or start from [`TwinConfig::baseline`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwinConfig {
    /// Catalog, pacing and global parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Physics constants and strategy thresholds.
    #[serde(default)]
    pub physics: PhysicsParams,
    /// Diurnal curves and noise.
    #[serde(default)]
    pub variation: VariationParams,
    /// Rolling window and online learners.
    #[serde(default)]
    pub analytics: AnalyticsParams,
    /// Surrogate models and search settings.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Operator overrides in effect at startup.
    #[serde(default)]
    pub overrides: Overrides,
    /// Rack health thresholds for the live bridge.
    #[serde(default)]
    pub bridge: BridgeThresholds,
}

/// Catalog, pacing and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Path of the scenario catalog (JSON).
    pub catalog: String,
    /// Master random seed; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// Wall-clock spacing between ticks in milliseconds (0 = as fast as possible).
    pub tick_interval_ms: u64,
    /// Ticks to run (0 = until interrupted).
    pub ticks: u64,
    /// Simulated hour of the first tick; current UTC hour when absent.
    pub start_hour: Option<u8>,
    /// Electricity price (USD per kWh).
    pub cost_per_kwh_usd: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            catalog: "data/datacenter_full_state_list.json".to_string(),
            seed: None,
            tick_interval_ms: 0,
            ticks: 48,
            start_hour: None,
            cost_per_kwh_usd: 0.12,
        }
    }
}

/// Surrogate model locations and search settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    pub cost_model: String,
    pub compute_model: String,
    /// Candidates sampled per query.
    pub samples: usize,
    /// Profile used by suggestions when none is given.
    pub profile: Profile,
    /// Profile applied automatically before every tick.
    pub auto_pilot: Option<Profile>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cost_model: "models/optimizer_cost.json".to_string(),
            compute_model: "models/optimizer_compute.json".to_string(),
            samples: 1000,
            profile: Profile::Balanced,
            auto_pilot: None,
        }
    }
}

/// A single invalid or unreadable configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl TwinConfig {
    /// Default datacenter: recorded scenarios with natural variation only.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Hot day under heavy load: ambient pinned at 40 °C, workload at 90 %.
    pub fn heatwave() -> Self {
        Self {
            overrides: Overrides {
                ambient: Override::set(40.0),
                workload: Override::set(90.0),
                ..Overrides::default()
            },
            ..Self::default()
        }
    }

    /// Sustainable auto-pilot retunes inlet and workload every tick.
    pub fn eco() -> Self {
        Self {
            optimizer: OptimizerConfig {
                profile: Profile::Sustainable,
                auto_pilot: Some(Profile::Sustainable),
                ..OptimizerConfig::default()
            },
            ..Self::default()
        }
    }

    /// Names accepted by [`TwinConfig::from_preset`].
    pub const PRESETS: &[&str] = &["baseline", "heatwave", "eco"];

    /// Builds a preset by name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the name is not in [`TwinConfig::PRESETS`].
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "heatwave" => Ok(Self::heatwave()),
            "eco" => Ok(Self::eco()),
            _ => Err(ConfigError::new(
                "preset",
                format!("unknown preset \"{name}\", available: {}", Self::PRESETS.join(", ")),
            )),
        }
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML text. Unknown keys are rejected.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on malformed TOML or unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Checks every section and returns all violations found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::new(field, message));
            }
        };

        let s = &self.simulation;
        check(!s.catalog.trim().is_empty(), "simulation.catalog", "must not be empty");
        check(
            s.start_hour.is_none_or(|h| h < 24),
            "simulation.start_hour",
            "must be in [0, 23]",
        );
        check(s.cost_per_kwh_usd >= 0.0, "simulation.cost_per_kwh_usd", "must be >= 0");

        let p = &self.physics;
        check(p.server_idle_power_w >= 0.0, "physics.server_idle_power_w", "must be >= 0");
        check(
            p.server_max_power_w > p.server_idle_power_w,
            "physics.server_max_power_w",
            "must be > physics.server_idle_power_w",
        );
        check(
            p.heat_dissipation_c_per_w >= 0.0,
            "physics.heat_dissipation_c_per_w",
            "must be >= 0",
        );
        check(p.max_compute_output >= 0.0, "physics.max_compute_output", "must be >= 0");
        check(p.throttle_rate_per_c >= 0.0, "physics.throttle_rate_per_c", "must be >= 0");
        check(
            p.critical_deviation_c > p.warning_deviation_c,
            "physics.critical_deviation_c",
            "must be > physics.warning_deviation_c",
        );

        let v = &self.variation;
        check(
            v.workload_min <= v.workload_max,
            "variation.workload_min",
            "must be <= variation.workload_max",
        );
        check(
            (0.0..=1.0).contains(&v.spike_probability),
            "variation.spike_probability",
            "must be in [0.0, 1.0]",
        );
        check(
            v.spike_min <= v.spike_max,
            "variation.spike_min",
            "must be <= variation.spike_max",
        );
        check(
            v.workload_noise >= 0.0 && v.ambient_noise >= 0.0,
            "variation.workload_noise",
            "noise bands must be >= 0",
        );
        check(
            v.lunch_start_hour <= v.lunch_end_hour && v.lunch_end_hour < 24,
            "variation.lunch_start_hour",
            "lunch window must be ordered and within [0, 23]",
        );

        let a = &self.analytics;
        check(a.min_history >= 3, "analytics.min_history", "must be >= 3");
        check(
            a.window_capacity >= a.min_history,
            "analytics.window_capacity",
            "must be >= analytics.min_history",
        );
        check(a.forecast_steps > 0, "analytics.forecast_steps", "must be > 0");
        check(a.isolation_trees > 0, "analytics.isolation_trees", "must be > 0");
        check(a.isolation_subsample >= 2, "analytics.isolation_subsample", "must be >= 2");
        check(
            a.contamination > 0.0 && a.contamination <= 0.5,
            "analytics.contamination",
            "must be in (0.0, 0.5]",
        );

        let o = &self.optimizer;
        check(!o.cost_model.trim().is_empty(), "optimizer.cost_model", "must not be empty");
        check(
            !o.compute_model.trim().is_empty(),
            "optimizer.compute_model",
            "must not be empty",
        );
        check(o.samples > 0, "optimizer.samples", "must be > 0");

        let ov = &self.overrides;
        check(
            !ov.workload.enabled || (0.0..=100.0).contains(&ov.workload.value),
            "overrides.workload.value",
            "must be in [0, 100]",
        );
        check(ov.workload_jitter >= 0.0, "overrides.workload_jitter", "must be >= 0");

        let b = &self.bridge;
        check(
            b.warning_c < b.critical_c,
            "bridge.warning_c",
            "must be < bridge.critical_c",
        );

        errors
    }
}
