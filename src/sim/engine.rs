//! Twin orchestrator: runs one full plan-to-insight cycle per tick.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::debug;

use super::aggregate::{AggregatedMetrics, Aggregator};
use super::bridge::{BridgeThresholds, RackStatus, rack_statuses};
use super::overrides::{Override, Overrides};
use super::physics::{PhysicsEngine, UnitResult};
use super::variation::VariationModel;
use crate::analytics::Analytics;
use crate::config::TwinConfig;
use crate::forecast::Forecasts;
use crate::optimizer::{Profile, SettingsOptimizer, Suggestion};
use crate::scenario::{PlanGenerator, ScenarioStore, UnitState};

/// Seed offsets keep the random sources uncorrelated under one master seed.
const PLAN_SEED_OFFSET: u64 = 0;
const VARIATION_SEED_OFFSET: u64 = 17;
const OVERRIDE_SEED_OFFSET: u64 = 31;
const SEARCH_SEED_OFFSET: u64 = 57;

/// Ambient assumed before the first tick (°C).
pub const INITIAL_AMBIENT_C: f64 = 25.0;

/// Everything one tick emits to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Zero-based tick sequence number.
    pub tick: u64,
    /// Simulated hour the variation model used.
    pub hour: u8,
    pub metrics: AggregatedMetrics,
    /// Forecasts by canonical metric name; empty while history is short.
    pub forecasts: Forecasts,
    /// Raw outlier verdict for this tick.
    pub anomaly: bool,
    /// Outlier verdict shown to operators; never raised while an override is active.
    pub anomaly_alert: bool,
    /// Live bridge payload.
    pub racks: Vec<RackStatus>,
}

/// Current UTC hour of day.
pub fn current_utc_hour() -> u8 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_secs() / 3600 % 24) as u8)
        .unwrap_or(0)
}

/// The datacenter twin.
///
/// Owns every stage explicitly. The optimizer is shared read-only, so
/// suggestion queries from other threads never touch the rolling history.
pub struct Twin {
    store: ScenarioStore,
    planner: PlanGenerator,
    variation: VariationModel,
    physics: PhysicsEngine,
    aggregator: Aggregator,
    analytics: Analytics,
    optimizer: Arc<SettingsOptimizer>,
    overrides: Overrides,
    bridge: BridgeThresholds,
    suggest_samples: usize,
    override_rng: StdRng,
    search_rng: StdRng,
    current_ambient: f64,
    ticks: u64,
}

impl Twin {
    /// Builds a twin from its catalog, optimizer and configuration.
    ///
    /// # Arguments
    ///
    /// * `store` - Loaded scenario catalog
    /// * `optimizer` - Shared settings optimizer (may be unavailable)
    /// * `config` - Physics, variation, analytics, override and bridge settings
    /// * `seed` - Master seed every random source is derived from
    pub fn new(
        store: ScenarioStore,
        optimizer: Arc<SettingsOptimizer>,
        config: &TwinConfig,
        seed: u64,
    ) -> Self {
        let start_hour = config.simulation.start_hour.unwrap_or_else(current_utc_hour);
        Self {
            planner: PlanGenerator::for_store(&store, seed.wrapping_add(PLAN_SEED_OFFSET)),
            variation: VariationModel::new(
                config.variation.clone(),
                start_hour,
                seed.wrapping_add(VARIATION_SEED_OFFSET),
            ),
            physics: PhysicsEngine::new(config.physics.clone()),
            aggregator: Aggregator::new(config.simulation.cost_per_kwh_usd),
            analytics: Analytics::new(&config.analytics),
            optimizer,
            overrides: config.overrides.clone(),
            bridge: config.bridge.clone(),
            suggest_samples: config.optimizer.samples,
            override_rng: StdRng::seed_from_u64(seed.wrapping_add(OVERRIDE_SEED_OFFSET)),
            search_rng: StdRng::seed_from_u64(seed.wrapping_add(SEARCH_SEED_OFFSET)),
            current_ambient: INITIAL_AMBIENT_C,
            ticks: 0,
            store,
        }
    }

    /// Runs one tick.
    ///
    /// Returns `None` when the batch is empty (no unit has any record).
    pub fn tick(&mut self) -> Option<TickReport> {
        let tick = self.ticks;
        self.ticks += 1;

        // 1-2. Plan and baseline
        let plan = self.planner.generate();
        let baseline: Vec<UnitState> = self.store.resolve(&plan).iter().map(|r| r.payload).collect();

        // 3. Natural variation
        let hour = self.variation.hour();
        let mut batch = self.variation.apply(&baseline);

        // 4. Operator overrides
        self.overrides.apply(&mut batch, &mut self.override_rng);
        self.track_ambient(&batch);

        // 5-6. Physics and aggregation
        let results: Vec<UnitResult> = batch.iter().map(|s| self.physics.compute(s)).collect();
        let Some(metrics) = self.aggregator.aggregate(&results, &batch) else {
            debug!(tick, "empty batch, nothing emitted");
            return None;
        };

        // 7. Learners
        let insights = self.analytics.update(metrics.clone());

        // 8. Downstream payload
        let racks = rack_statuses(&results, &self.bridge);
        debug!(
            tick,
            hour,
            units = results.len(),
            pue = metrics.average_pue,
            max_outlet_c = metrics.max_outlet_temp_c,
            anomaly = insights.anomaly,
            "tick complete"
        );

        Some(TickReport {
            tick,
            hour,
            anomaly_alert: insights.anomaly && !self.overrides.any_active(),
            anomaly: insights.anomaly,
            forecasts: insights.forecasts,
            metrics,
            racks,
        })
    }

    fn track_ambient(&mut self, batch: &[UnitState]) {
        if let Some(ambient) = self.overrides.ambient.active() {
            self.current_ambient = ambient;
        } else if !batch.is_empty() {
            self.current_ambient =
                batch.iter().map(|s| s.ambient_temp_c).sum::<f64>() / batch.len() as f64;
        }
    }

    /// Queries the optimizer at the current ambient.
    pub fn suggest(&mut self, profile: Profile) -> Suggestion {
        self.optimizer.find_best_settings(
            self.current_ambient,
            profile,
            self.suggest_samples,
            &mut self.search_rng,
        )
    }

    /// Queries the optimizer and applies a found suggestion as inlet and
    /// workload overrides for subsequent ticks.
    pub fn auto_optimize(&mut self, profile: Profile) -> Suggestion {
        let suggestion = self.suggest(profile);
        if let Suggestion::Found {
            inlet_c,
            workload_percent,
            ..
        } = suggestion
        {
            self.overrides.inlet = Override::set(f64::from(inlet_c));
            self.overrides.workload = Override::set(f64::from(workload_percent));
        }
        suggestion
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Overrides are read fresh on every tick.
    pub fn overrides_mut(&mut self) -> &mut Overrides {
        &mut self.overrides
    }

    /// Ambient used by optimizer queries (°C).
    pub fn current_ambient(&self) -> f64 {
        self.current_ambient
    }

    pub fn optimizer(&self) -> &Arc<SettingsOptimizer> {
        &self.optimizer
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    pub fn store(&self) -> &ScenarioStore {
        &self.store
    }

    /// Ticks run so far, including empty ones.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
