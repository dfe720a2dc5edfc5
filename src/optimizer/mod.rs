//! Settings search over offline-trained surrogates of the physics engine.
//!
//! Two regressors predict daily cost and compute output from
//! `[ambient_temp_c, inlet_temp_c, workload_percent]`. A query samples random
//! candidate settings at the current ambient and keeps the one with the best
//! profile reward. The search is stochastic; pass a seeded rng for
//! reproducible answers.

pub mod forest;
pub mod train;

use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use forest::{ForestParams, RegressionForest};

/// Model input: `[ambient_temp_c, inlet_temp_c, workload_percent]`.
pub type Features = [f64; 3];

/// Something that maps a feature row to one scalar.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &Features) -> f64;

    fn predict_batch(&self, rows: &[Features]) -> Vec<f64> {
        rows.iter().map(|r| self.predict(r)).collect()
    }
}

impl<F> Regressor for F
where
    F: Fn(&Features) -> f64 + Send + Sync,
{
    fn predict(&self, features: &Features) -> f64 {
        self(features)
    }
}

/// Failure to obtain or produce an optimizer model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file not found: {path}")]
    NotFound { path: String },
    #[error("failed to access model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode model file {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode model file {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("model file {path} contains no trees")]
    EmptyModel { path: String },
    #[error("training set is empty or misaligned")]
    EmptyTrainingSet,
}

impl ModelError {
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.display().to_string();
        if source.kind() == io::ErrorKind::NotFound {
            ModelError::NotFound { path }
        } else {
            ModelError::Io { path, source }
        }
    }

    /// Write-side serde failures; I/O errors surfaced through serde stay I/O.
    pub(crate) fn from_encode(path: &Path, source: serde_json::Error) -> Self {
        if source.is_io() {
            ModelError::from_io(path, source.into())
        } else {
            ModelError::Encode {
                path: path.display().to_string(),
                source,
            }
        }
    }
}

/// Reward weighting used to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Maximize compute output.
    Greedy,
    /// Minimize cost.
    Sustainable,
    /// Compute per unit of cost.
    #[default]
    Balanced,
}

impl Profile {
    pub fn reward(self, cost: f64, compute: f64) -> f64 {
        match self {
            Profile::Greedy => compute,
            Profile::Sustainable => 1.0 / (cost + 1.0),
            Profile::Balanced => compute / (cost + 1.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Greedy => "greedy",
            Profile::Sustainable => "sustainable",
            Profile::Balanced => "balanced",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown profile '{0}' (expected greedy, sustainable or balanced)")]
pub struct ParseProfileError(String);

impl FromStr for Profile {
    type Err = ParseProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greedy" => Ok(Profile::Greedy),
            "sustainable" => Ok(Profile::Sustainable),
            "balanced" => Ok(Profile::Balanced),
            _ => Err(ParseProfileError(s.to_string())),
        }
    }
}

/// Candidate bounds sampled by the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSpace {
    pub inlet_c: (f64, f64),
    pub workload_percent: (f64, f64),
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            inlet_c: (15.0, 30.0),
            workload_percent: (20.0, 100.0),
        }
    }
}

/// Result of a settings query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Suggestion {
    /// Models are not loaded.
    NotReady,
    /// No candidate had a finite reward.
    NoCandidate,
    /// Best sampled candidate, settings truncated to integers.
    Found {
        inlet_c: i32,
        workload_percent: i32,
        reward: f64,
    },
}

struct Models {
    cost: Box<dyn Regressor>,
    compute: Box<dyn Regressor>,
}

/// Read-only after construction; safe to share across threads.
pub struct SettingsOptimizer {
    models: Option<Models>,
    space: SearchSpace,
}

impl fmt::Debug for SettingsOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsOptimizer")
            .field("ready", &self.is_ready())
            .field("space", &self.space)
            .finish()
    }
}

impl SettingsOptimizer {
    /// An optimizer without models; every query is `NotReady`.
    pub fn unavailable() -> Self {
        Self {
            models: None,
            space: SearchSpace::default(),
        }
    }

    /// An optimizer over injected regressors.
    pub fn with_models(cost: impl Regressor + 'static, compute: impl Regressor + 'static) -> Self {
        Self {
            models: Some(Models {
                cost: Box::new(cost),
                compute: Box::new(compute),
            }),
            space: SearchSpace::default(),
        }
    }

    /// Replaces the candidate bounds.
    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.space = space;
        self
    }

    /// Loads both forests.
    ///
    /// # Errors
    ///
    /// Returns the first model that fails to load.
    pub fn try_load(cost_path: &Path, compute_path: &Path) -> Result<Self, ModelError> {
        let cost = RegressionForest::load(cost_path)?;
        let compute = RegressionForest::load(compute_path)?;
        Ok(Self::with_models(cost, compute))
    }

    /// Loads both forests, degrading to [`SettingsOptimizer::unavailable`].
    pub fn load(cost_path: &Path, compute_path: &Path) -> Self {
        match Self::try_load(cost_path, compute_path) {
            Ok(optimizer) => {
                info!(
                    cost = %cost_path.display(),
                    compute = %compute_path.display(),
                    "optimizer models loaded"
                );
                optimizer
            }
            Err(err) => {
                warn!(error = %err, "optimizer unavailable");
                Self::unavailable()
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.models.is_some()
    }

    /// Samples `num_samples` candidates at `current_ambient` and returns the
    /// best one under `profile`.
    pub fn find_best_settings<R: Rng + ?Sized>(
        &self,
        current_ambient: f64,
        profile: Profile,
        num_samples: usize,
        rng: &mut R,
    ) -> Suggestion {
        let Some(models) = &self.models else {
            return Suggestion::NotReady;
        };

        let candidates: Vec<Features> = (0..num_samples)
            .map(|_| {
                [
                    current_ambient,
                    sample(rng, self.space.inlet_c),
                    sample(rng, self.space.workload_percent),
                ]
            })
            .collect();
        let costs = models.cost.predict_batch(&candidates);
        let computes = models.compute.predict_batch(&candidates);

        let best = candidates
            .iter()
            .zip(costs.iter().zip(&computes))
            .map(|(c, (&cost, &compute))| (c, profile.reward(cost, compute)))
            .filter(|(_, reward)| reward.is_finite())
            .fold(None, |best: Option<(&Features, f64)>, (c, reward)| match best {
                Some((_, top)) if top >= reward => best,
                _ => Some((c, reward)),
            });

        match best {
            Some((c, reward)) => Suggestion::Found {
                inlet_c: c[1].trunc() as i32,
                workload_percent: c[2].trunc() as i32,
                reward,
            },
            None => Suggestion::NoCandidate,
        }
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo { rng.random_range(lo..=hi) } else { lo }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    /// Cost grows with workload and with colder inlet; compute tracks workload.
    fn stub() -> SettingsOptimizer {
        SettingsOptimizer::with_models(
            |x: &Features| 2.0 + x[2] * 0.05 + (30.0 - x[1]) * 0.1,
            |x: &Features| x[2] * 100.0,
        )
    }

    #[test]
    fn parses_profiles() {
        assert_eq!("greedy".parse::<Profile>(), Ok(Profile::Greedy));
        assert_eq!(" Sustainable ".parse::<Profile>(), Ok(Profile::Sustainable));
        assert_eq!("balanced".parse::<Profile>(), Ok(Profile::Balanced));
        assert!("fastest".parse::<Profile>().is_err());
        assert_eq!(Profile::default(), Profile::Balanced);
    }

    #[test]
    fn rewards() {
        assert_eq!(Profile::Greedy.reward(9.0, 500.0), 500.0);
        assert_eq!(Profile::Sustainable.reward(9.0, 500.0), 0.1);
        assert_eq!(Profile::Balanced.reward(9.0, 500.0), 50.0);
    }

    #[test]
    fn unavailable_is_not_ready() {
        let opt = SettingsOptimizer::unavailable();
        assert!(!opt.is_ready());
        let s = opt.find_best_settings(25.0, Profile::Balanced, 100, &mut StdRng::seed_from_u64(1));
        assert_eq!(s, Suggestion::NotReady);
    }

    #[test]
    fn missing_files_degrade() {
        let dir = tempfile::tempdir().expect("tempdir");
        let opt = SettingsOptimizer::load(&dir.path().join("a.json"), &dir.path().join("b.json"));
        assert!(!opt.is_ready());
    }

    #[test]
    fn zero_samples_is_no_candidate() {
        let s = stub().find_best_settings(25.0, Profile::Greedy, 0, &mut StdRng::seed_from_u64(1));
        assert_eq!(s, Suggestion::NoCandidate);
    }

    #[test]
    fn non_finite_predictions_are_skipped() {
        let opt = SettingsOptimizer::with_models(|_: &Features| f64::NAN, |_: &Features| 1.0);
        let s = opt.find_best_settings(25.0, Profile::Balanced, 50, &mut StdRng::seed_from_u64(1));
        assert_eq!(s, Suggestion::NoCandidate);
    }

    #[test]
    fn greedy_pushes_workload_up_sustainable_pulls_it_down() {
        let opt = stub();
        let Suggestion::Found { workload_percent: greedy, .. } =
            opt.find_best_settings(30.0, Profile::Greedy, 1000, &mut StdRng::seed_from_u64(4))
        else {
            panic!("expected a candidate");
        };
        let Suggestion::Found {
            workload_percent: frugal,
            inlet_c,
            ..
        } = opt.find_best_settings(30.0, Profile::Sustainable, 1000, &mut StdRng::seed_from_u64(4))
        else {
            panic!("expected a candidate");
        };
        assert!(greedy >= 98);
        assert!(frugal <= 30);
        assert!(inlet_c >= 27);
    }

    #[test]
    fn seeded_search_is_reproducible() {
        let opt = stub();
        let a = opt.find_best_settings(22.0, Profile::Balanced, 200, &mut StdRng::seed_from_u64(8));
        let b = opt.find_best_settings(22.0, Profile::Balanced, 200, &mut StdRng::seed_from_u64(8));
        assert_eq!(a, b);
    }

    #[test]
    fn suggestions_stay_in_bounds() {
        let opt = stub();
        let mut rng = StdRng::seed_from_u64(2);
        for profile in [Profile::Greedy, Profile::Sustainable, Profile::Balanced] {
            if let Suggestion::Found {
                inlet_c,
                workload_percent,
                ..
            } = opt.find_best_settings(35.0, profile, 300, &mut rng)
            {
                assert!((15..=30).contains(&inlet_c));
                assert!((20..=100).contains(&workload_percent));
            } else {
                panic!("expected a candidate for {profile}");
            }
        }
    }
}
