//! Settings optimizer tests: reward ordering, trained models, twin queries.

mod common;

use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::StdRng};

use dc_twin::optimizer::forest::ForestParams;
use dc_twin::optimizer::train::{TrainParams, train};
use dc_twin::optimizer::{Features, Profile, Regressor, SettingsOptimizer, Suggestion};
use dc_twin::sim::engine::Twin;
use dc_twin::sim::physics::PhysicsEngine;

fn cost(x: &Features) -> f64 {
    3.0 + 0.04 * x[2] + 0.08 * (30.0 - x[1]) + 0.02 * x[0]
}

fn compute(x: &Features) -> f64 {
    x[2] * 95.0 - (x[0] - 20.0).max(0.0) * 10.0
}

#[test]
fn rewards_are_profile_monotonic() {
    let mut rng = StdRng::seed_from_u64(6);
    let candidates: Vec<Features> = (0..200)
        .map(|_| [28.0, rng.random_range(15.0..=30.0), rng.random_range(20.0..=100.0)])
        .collect();
    let costs = cost.predict_batch(&candidates);
    let computes = compute.predict_batch(&candidates);

    for i in 0..candidates.len() {
        for j in 0..candidates.len() {
            let greedy = Profile::Greedy.reward(costs[i], computes[i])
                > Profile::Greedy.reward(costs[j], computes[j]);
            assert_eq!(greedy, computes[i] > computes[j]);

            let frugal = Profile::Sustainable.reward(costs[i], computes[i])
                > Profile::Sustainable.reward(costs[j], computes[j]);
            assert_eq!(frugal, costs[i] < costs[j]);
        }
    }
}

#[test]
fn balanced_sits_between_greedy_and_sustainable() {
    let opt = SettingsOptimizer::with_models(cost, compute);
    let pick = |profile| match opt.find_best_settings(30.0, profile, 2000, &mut StdRng::seed_from_u64(12)) {
        Suggestion::Found { workload_percent, .. } => workload_percent,
        other => panic!("expected a candidate, got {other:?}"),
    };
    let greedy = pick(Profile::Greedy);
    let balanced = pick(Profile::Balanced);
    let sustainable = pick(Profile::Sustainable);
    assert!(greedy >= balanced);
    assert!(balanced >= sustainable);
    assert!(greedy > sustainable);
}

#[test]
fn trained_models_round_trip_through_disk() {
    let params = TrainParams {
        samples: 1_500,
        forest: ForestParams {
            trees: 6,
            max_depth: 8,
            ..ForestParams::default()
        },
        ..TrainParams::default()
    };
    let models = train(&PhysicsEngine::default(), &params).expect("train");

    let dir = tempfile::tempdir().expect("tempdir");
    let cost_path = dir.path().join("optimizer_cost.json");
    let compute_path = dir.path().join("optimizer_compute.json");
    models.cost.save(&cost_path).expect("save cost");
    models.compute.save(&compute_path).expect("save compute");

    let opt = SettingsOptimizer::try_load(&cost_path, &compute_path).expect("load");
    assert!(opt.is_ready());

    let mut rng = StdRng::seed_from_u64(1);
    match opt.find_best_settings(35.0, Profile::Greedy, 500, &mut rng) {
        Suggestion::Found {
            inlet_c,
            workload_percent,
            reward,
        } => {
            assert!((15..=30).contains(&inlet_c));
            assert!((20..=100).contains(&workload_percent));
            assert!(reward > 0.0);
        }
        other => panic!("expected a candidate, got {other:?}"),
    }
}

#[test]
fn one_missing_model_makes_optimizer_unavailable() {
    let models = train(
        &PhysicsEngine::default(),
        &TrainParams {
            samples: 200,
            forest: ForestParams {
                trees: 2,
                max_depth: 4,
                ..ForestParams::default()
            },
            ..TrainParams::default()
        },
    )
    .expect("train");
    let dir = tempfile::tempdir().expect("tempdir");
    let cost_path = dir.path().join("optimizer_cost.json");
    models.cost.save(&cost_path).expect("save");

    let opt = SettingsOptimizer::load(&cost_path, &dir.path().join("optimizer_compute.json"));
    assert!(!opt.is_ready());
}

#[test]
fn twin_queries_at_tracked_ambient() {
    let ambient_seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = Arc::clone(&ambient_seen);
    let cost_probe = move |x: &Features| {
        if let Ok(mut seen) = log.lock() {
            seen.push(x[0]);
        }
        cost(x)
    };
    let opt = SettingsOptimizer::with_models(cost_probe, compute);

    let mut cfg = dc_twin::config::TwinConfig::heatwave();
    cfg.simulation.start_hour = Some(10);
    cfg.optimizer.samples = 50;
    let mut twin = Twin::new(common::store(), Arc::new(opt), &cfg, 4);
    twin.tick();

    assert!(matches!(twin.suggest(Profile::Balanced), Suggestion::Found { .. }));
    let seen = ambient_seen.lock().expect("lock");
    assert_eq!(seen.len(), 50);
    assert!(seen.iter().all(|a| *a == 40.0));
}
