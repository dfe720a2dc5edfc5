//! Per-metric AR(1) forecasting over the rolling metrics window.

use std::collections::BTreeMap;

use tracing::debug;

use crate::analytics::FitError;
use crate::history::{FORECAST_METRICS, HistoryWindow, Metric};

/// Largest allowed magnitude of the autoregressive coefficient.
const MAX_PHI: f64 = 0.999;

/// Forecast sequences keyed by canonical metric name.
pub type Forecasts = BTreeMap<String, Vec<f64>>;

/// A fitted first-order autoregressive model `x[t] = c + phi * x[t-1] + e`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ar1 {
    pub intercept: f64,
    pub phi: f64,
    last: f64,
    nobs: usize,
}

impl Ar1 {
    /// Fits by conditional least squares on consecutive pairs.
    ///
    /// # Errors
    ///
    /// * `FitError::Insufficient` - fewer than three observations
    /// * `FitError::Degenerate` - the series is constant
    /// * `FitError::NonFinite` - the series or the fit contains NaN or infinity
    pub fn fit(series: &[f64]) -> Result<Self, FitError> {
        let n = series.len();
        if n < 3 {
            return Err(FitError::Insufficient { needed: 3, got: n });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }
        let (lo, hi) = series
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
            return Err(FitError::Degenerate);
        }

        let x = &series[..n - 1];
        let y = &series[1..];
        let m = x.len() as f64;
        let mean_x = x.iter().sum::<f64>() / m;
        let mean_y = y.iter().sum::<f64>() / m;
        let (cov, var) = x.iter().zip(y).fold((0.0, 0.0), |(cov, var), (&xi, &yi)| {
            let dx = xi - mean_x;
            (cov + dx * (yi - mean_y), var + dx * dx)
        });

        let phi = if var > 0.0 {
            (cov / var).clamp(-MAX_PHI, MAX_PHI)
        } else {
            0.0
        };
        let intercept = mean_y - phi * mean_x;
        if !phi.is_finite() || !intercept.is_finite() {
            return Err(FitError::NonFinite);
        }

        Ok(Self {
            intercept,
            phi,
            last: series[n - 1],
            nobs: n,
        })
    }

    /// In-sample observation count.
    pub fn nobs(&self) -> usize {
        self.nobs
    }

    /// Long-run mean the forecast converges to.
    pub fn mean(&self) -> f64 {
        self.intercept / (1.0 - self.phi)
    }

    /// Predictions for observations `nobs .. nobs + steps`.
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        let mut prev = self.last;
        (0..steps)
            .map(|_| {
                prev = self.intercept + self.phi * prev;
                prev
            })
            .collect()
    }
}

/// Fits one [`Ar1`] per tracked metric and forecasts a fixed horizon.
#[derive(Debug, Clone)]
pub struct Forecaster {
    min_history: usize,
    steps: usize,
}

impl Forecaster {
    pub fn new(min_history: usize, steps: usize) -> Self {
        Self { min_history, steps }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Forecasts every tracked metric from the current window.
    ///
    /// Empty below the minimum history; a metric whose fit fails is omitted.
    pub fn forecast(&self, window: &HistoryWindow) -> Forecasts {
        let mut out = Forecasts::new();
        if window.len() < self.min_history {
            return out;
        }

        for metric in FORECAST_METRICS {
            match self.forecast_metric(window, metric) {
                Ok(values) => {
                    out.insert(metric.name().to_string(), values);
                }
                Err(err) => debug!(metric = %metric, error = %err, "forecast skipped"),
            }
        }
        out
    }

    fn forecast_metric(&self, window: &HistoryWindow, metric: Metric) -> Result<Vec<f64>, FitError> {
        let model = Ar1::fit(&window.series(metric))?;
        let values = model.forecast(self.steps);
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }
        Ok(values)
    }
}
