//! Isolation-forest outlier scoring over the rolling metrics window.
//!
//! The forest is refit from scratch on the whole window every tick with a
//! fixed seed, so the verdict for the newest point depends only on what the
//! window currently holds.

use rand::seq::index;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::analytics::FitError;
use crate::history::{ANOMALY_FEATURES, HistoryWindow};

/// Euler–Mascheroni constant, used by the harmonic-number approximation.
const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Forest shape and decision parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationParams {
    pub trees: usize,
    pub subsample: usize,
    /// Expected share of outliers; sets the decision threshold.
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            trees: 100,
            subsample: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(rows: &[&[f64]], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        if depth >= max_depth || rows.len() <= 1 {
            return Node::Leaf { size: rows.len() };
        }

        let width = rows[0].len();
        let splittable: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|f| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                    (lo.min(r[f]), hi.max(r[f]))
                });
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();
        if splittable.is_empty() {
            return Node::Leaf { size: rows.len() };
        }

        let (feature, lo, hi) = splittable[rng.random_range(0..splittable.len())];
        let threshold = rng.random_range(lo..hi);
        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) = rows.iter().partition(|r| r[feature] < threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Node::build(&left, depth + 1, max_depth, rng)),
            right: Box::new(Node::build(&right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, point: &[f64], depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if point[*feature] < *threshold {
                    left.path_length(point, depth + 1)
                } else {
                    right.path_length(point, depth + 1)
                }
            }
        }
    }
}

/// A fitted isolation forest with its decision threshold.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    normalizer: f64,
    threshold: f64,
    width: usize,
}

impl IsolationForest {
    /// Fits a forest on `rows` (row-major, equal widths).
    ///
    /// # Errors
    ///
    /// `FitError::Insufficient` for fewer than two rows, `FitError::NonFinite`
    /// when a value is NaN or infinite or rows differ in width.
    pub fn fit(rows: &[Vec<f64>], params: &IsolationParams) -> Result<Self, FitError> {
        if rows.len() < 2 {
            return Err(FitError::Insufficient {
                needed: 2,
                got: rows.len(),
            });
        }
        let width = rows[0].len();
        if width == 0 || rows.iter().any(|r| r.len() != width || r.iter().any(|v| !v.is_finite())) {
            return Err(FitError::NonFinite);
        }

        let subsample = params.subsample.clamp(2, rows.len());
        let max_depth = (subsample as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.trees.max(1))
            .map(|_| {
                let picked: Vec<&[f64]> = index::sample(&mut rng, rows.len(), subsample)
                    .into_iter()
                    .map(|i| rows[i].as_slice())
                    .collect();
                Node::build(&picked, 0, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            normalizer: average_path_length(subsample),
            threshold: f64::INFINITY,
            width,
        };

        let mut scores: Vec<f64> = rows.iter().map(|r| forest.score(r)).collect();
        scores.sort_by(f64::total_cmp);
        forest.threshold = quantile(&scores, 1.0 - params.contamination.clamp(0.0, 0.5));
        Ok(forest)
    }

    /// Anomaly score in `(0, 1]`; higher is more isolated.
    pub fn score(&self, point: &[f64]) -> f64 {
        let mean_depth = self
            .trees
            .iter()
            .map(|t| t.path_length(point, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_depth / self.normalizer)
    }

    /// Score above which a point counts as an outlier.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// True when `point` scores strictly above the threshold.
    pub fn is_outlier(&self, point: &[f64]) -> bool {
        point.len() == self.width && self.score(point) > self.threshold
    }
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let Some(&last) = sorted.last() else {
        return f64::NAN;
    };
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if hi >= sorted.len() {
        return last;
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Flags the newest window entry when it is an outlier against the whole window.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    params: IsolationParams,
    min_history: usize,
    last_score: Option<f64>,
}

impl AnomalyScorer {
    pub fn new(params: IsolationParams, min_history: usize) -> Self {
        Self {
            params,
            min_history,
            last_score: None,
        }
    }

    /// Score of the newest point from the latest successful fit.
    pub fn last_score(&self) -> Option<f64> {
        self.last_score
    }

    /// Refits on `window` and scores its newest entry.
    ///
    /// Below the minimum history this is always `false` and nothing is fit.
    /// Fit failures are logged and reported as `false`.
    pub fn score(&mut self, window: &HistoryWindow) -> bool {
        self.last_score = None;
        if window.len() < self.min_history {
            return false;
        }

        let rows = window.features(&ANOMALY_FEATURES);
        let forest = match IsolationForest::fit(&rows, &self.params) {
            Ok(forest) => forest,
            Err(err) => {
                warn!(error = %err, "anomaly model fit failed");
                return false;
            }
        };

        let Some(latest) = rows.last() else {
            return false;
        };
        let score = forest.score(latest);
        self.last_score = Some(score);
        let anomalous = score > forest.threshold();
        debug!(score, threshold = forest.threshold(), anomalous, "anomaly scored");
        anomalous
    }
}
