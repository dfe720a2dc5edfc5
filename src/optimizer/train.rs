//! Offline training of the optimizer surrogates from synthetic physics runs.

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

use super::forest::{ForestParams, RegressionForest};
use super::{Features, ModelError};
use crate::scenario::UnitState;
use crate::sim::physics::PhysicsEngine;

/// Sampling grid and model shape for a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainParams {
    pub samples: usize,
    pub ambient_c: (f64, f64),
    pub inlet_c: (f64, f64),
    pub workload_percent: (f64, f64),
    pub cost_per_kwh_usd: f64,
    pub forest: ForestParams,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            samples: 20_000,
            ambient_c: (10.0, 45.0),
            inlet_c: (15.0, 30.0),
            workload_percent: (0.0, 100.0),
            cost_per_kwh_usd: 0.12,
            forest: ForestParams::default(),
        }
    }
}

/// Feature rows with both physics targets.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub features: Vec<Features>,
    pub cost_per_day: Vec<f64>,
    pub compute_output: Vec<f64>,
}

/// Daily cost of one unit's facility draw.
pub fn daily_cost(server_w: f64, cooling_w: f64, cost_per_kwh_usd: f64) -> f64 {
    (server_w + cooling_w) / 1000.0 * cost_per_kwh_usd * 24.0
}

/// Runs the engine on uniformly sampled `(ambient, inlet, workload)` points.
pub fn sample_physics(engine: &PhysicsEngine, params: &TrainParams, seed: u64) -> TrainingSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut set = TrainingSet::default();
    for _ in 0..params.samples {
        let state = UnitState {
            ambient_temp_c: draw(&mut rng, params.ambient_c),
            inlet_temp_c: draw(&mut rng, params.inlet_c),
            workload_percent: draw(&mut rng, params.workload_percent),
        };
        let r = engine.compute(&state);
        set.features
            .push([state.ambient_temp_c, state.inlet_temp_c, state.workload_percent]);
        set.cost_per_day
            .push(daily_cost(r.server_power_w, r.cooling_power_w, params.cost_per_kwh_usd));
        set.compute_output.push(r.compute_output);
    }
    set
}

fn draw(rng: &mut StdRng, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo { rng.random_range(lo..=hi) } else { lo }
}

/// The trained cost and compute forests.
#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub cost: RegressionForest,
    pub compute: RegressionForest,
}

/// Samples the engine and fits both forests.
///
/// # Errors
///
/// Returns `ModelError::EmptyTrainingSet` when `params.samples` is zero.
pub fn train(engine: &PhysicsEngine, params: &TrainParams) -> Result<TrainedModels, ModelError> {
    info!(samples = params.samples, trees = params.forest.trees, "sampling physics engine");
    let set = sample_physics(engine, params, params.forest.seed);

    info!("fitting cost model");
    let cost = RegressionForest::fit(&set.features, &set.cost_per_day, &params.forest)?;
    info!("fitting compute model");
    let compute = RegressionForest::fit(&set.features, &set.compute_output, &params.forest)?;

    Ok(TrainedModels { cost, compute })
}
