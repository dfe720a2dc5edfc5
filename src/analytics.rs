//! Online analytics: rolling window plus the anomaly and forecast learners.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anomaly::{AnomalyScorer, IsolationParams};
use crate::forecast::{Forecaster, Forecasts};
use crate::history::HistoryWindow;
use crate::sim::aggregate::AggregatedMetrics;

/// Why an online model could not be fit. Never escapes the learners.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FitError {
    #[error("need at least {needed} observations, got {got}")]
    Insufficient { needed: usize, got: usize },
    #[error("series is constant")]
    Degenerate,
    #[error("non-finite value in data or fit")]
    NonFinite,
}

/// Window and learner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsParams {
    pub window_capacity: usize,
    /// Window length below which both learners stay silent.
    pub min_history: usize,
    pub forecast_steps: usize,
    pub isolation_trees: usize,
    pub isolation_subsample: usize,
    pub contamination: f64,
    pub model_seed: u64,
}

impl Default for AnalyticsParams {
    fn default() -> Self {
        Self {
            window_capacity: 200,
            min_history: 20,
            forecast_steps: 30,
            isolation_trees: 100,
            isolation_subsample: 256,
            contamination: 0.05,
            model_seed: 42,
        }
    }
}

/// Learner outputs for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Insights {
    pub anomaly: bool,
    pub forecasts: Forecasts,
}

/// Sole writer of the history window.
#[derive(Debug, Clone)]
pub struct Analytics {
    window: HistoryWindow,
    scorer: AnomalyScorer,
    forecaster: Forecaster,
}

impl Analytics {
    pub fn new(params: &AnalyticsParams) -> Self {
        let isolation = IsolationParams {
            trees: params.isolation_trees,
            subsample: params.isolation_subsample,
            contamination: params.contamination,
            seed: params.model_seed,
        };
        Self {
            window: HistoryWindow::new(params.window_capacity),
            scorer: AnomalyScorer::new(isolation, params.min_history),
            forecaster: Forecaster::new(params.min_history, params.forecast_steps),
        }
    }

    /// Read-only view of the window.
    pub fn window(&self) -> &HistoryWindow {
        &self.window
    }

    /// Appends `metrics`, refits both learners and returns their outputs.
    pub fn update(&mut self, metrics: AggregatedMetrics) -> Insights {
        self.window.push(metrics);
        Insights {
            anomaly: self.scorer.score(&self.window),
            forecasts: self.forecaster.forecast(&self.window),
        }
    }
}
