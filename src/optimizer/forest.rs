//! Bootstrap-aggregated regression trees, the model family the optimizer is
//! trained with offline. Models persist as JSON.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::{Features, ModelError, Regressor};

/// Forest shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub trees: usize,
    pub max_depth: usize,
    /// Nodes with fewer samples become leaves.
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: 30,
            max_depth: 10,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART regression tree stored as a flat node list; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct Split {
    feature: usize,
    threshold: f64,
}

impl RegressionTree {
    /// Fits a tree on the rows listed in `sample` (indices may repeat).
    fn fit(rows: &[Features], targets: &[f64], sample: Vec<usize>, params: &ForestParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(rows, targets, sample, 0, params);
        tree
    }

    fn grow(
        &mut self,
        rows: &[Features],
        targets: &[f64],
        sample: Vec<usize>,
        depth: usize,
        params: &ForestParams,
    ) -> usize {
        let mean = sample.iter().map(|&i| targets[i]).sum::<f64>() / sample.len().max(1) as f64;
        let slot = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: mean });

        if depth >= params.max_depth || sample.len() < params.min_samples_split.max(2) {
            return slot;
        }
        let Some(split) = best_split(rows, targets, &sample) else {
            return slot;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .into_iter()
            .partition(|&i| rows[i][split.feature] <= split.threshold);
        let left = self.grow(rows, targets, left, depth + 1, params);
        let right = self.grow(rows, targets, right, depth + 1, params);
        self.nodes[slot] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        slot
    }

    pub fn predict(&self, features: &Features) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes.get(at) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    at = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => return f64::NAN,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Exhaustive variance-reduction split over every feature.
///
/// Maximizes `sum_l^2 / n_l + sum_r^2 / n_r`, which minimizes the summed
/// squared error of the two children.
fn best_split(rows: &[Features], targets: &[f64], sample: &[usize]) -> Option<Split> {
    let n = sample.len();
    let total: f64 = sample.iter().map(|&i| targets[i]).sum();
    let parent = total * total / n as f64;
    let mut best_gain = parent + 1e-9 * (1.0 + parent.abs());
    let mut best = None;

    let mut order = sample.to_vec();
    for feature in 0..rows.first().map_or(0, |r| r.len()) {
        order.sort_unstable_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

        let mut sum_left = 0.0;
        for k in 1..n {
            sum_left += targets[order[k - 1]];
            let lo = rows[order[k - 1]][feature];
            let hi = rows[order[k]][feature];
            if lo == hi {
                continue;
            }
            let sum_right = total - sum_left;
            let gain = sum_left * sum_left / k as f64 + sum_right * sum_right / (n - k) as f64;
            if gain > best_gain {
                best_gain = gain;
                let mid = lo + (hi - lo) / 2.0;
                let threshold = if mid < hi { mid } else { lo };
                best = Some(Split { feature, threshold });
            }
        }
    }
    best
}

/// Mean of bootstrapped [`RegressionTree`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionForest {
    trees: Vec<RegressionTree>,
}

impl RegressionForest {
    /// Fits `params.trees` trees, each on a bootstrap resample of the data.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::EmptyTrainingSet` when there is nothing to fit or
    /// `rows` and `targets` differ in length.
    pub fn fit(rows: &[Features], targets: &[f64], params: &ForestParams) -> Result<Self, ModelError> {
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = rows.len();
        let trees = (0..params.trees.max(1))
            .map(|_| {
                let sample = (0..n).map(|_| rng.random_range(0..n)).collect();
                RegressionTree::fit(rows, targets, sample, params)
            })
            .collect();
        Ok(Self { trees })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Reads a forest written by [`RegressionForest::save`].
    ///
    /// # Errors
    ///
    /// `ModelError::NotFound` when the file is missing, otherwise I/O or
    /// decode errors.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path).map_err(|source| ModelError::from_io(path, source))?;
        let forest: Self = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            ModelError::Decode {
                path: path.display().to_string(),
                source,
            }
        })?;
        if forest.trees.is_empty() {
            return Err(ModelError::EmptyModel {
                path: path.display().to_string(),
            });
        }
        Ok(forest)
    }

    /// Writes the forest as JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created or written.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ModelError::from_io(path, source))?;
        }
        let file = File::create(path).map_err(|source| ModelError::from_io(path, source))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .map_err(|source| ModelError::from_encode(path, source))?;
        writer.flush().map_err(|source| ModelError::from_io(path, source))
    }
}

impl Regressor for RegressionForest {
    fn predict(&self, features: &Features) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        self.trees.iter().map(|t| t.predict(features)).sum::<f64>() / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_tree_learns_a_step() {
        let rows: Vec<Features> = (0..40).map(|i| [f64::from(i), 0.0, 0.0]).collect();
        let targets: Vec<f64> = (0..40).map(|i| if i < 20 { 1.0 } else { 5.0 }).collect();
        let params = ForestParams {
            max_depth: 1,
            ..ForestParams::default()
        };
        let tree = RegressionTree::fit(&rows, &targets, (0..40).collect(), &params);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict(&[3.0, 0.0, 0.0]), 1.0);
        assert_eq!(tree.predict(&[30.0, 0.0, 0.0]), 5.0);
        assert_eq!(tree.predict(&[19.5, 9.0, 9.0]), 1.0);
        assert_eq!(tree.predict(&[19.6, 9.0, 9.0]), 5.0);
    }

    #[test]
    fn constant_targets_make_a_leaf() {
        let rows: Vec<Features> = (0..10).map(|i| [f64::from(i), 1.0, 2.0]).collect();
        let tree = RegressionTree::fit(&rows, &[7.0; 10], (0..10).collect(), &ForestParams::default());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[100.0, 0.0, 0.0]), 7.0);
    }

    #[test]
    fn forest_predictions_stay_in_target_range() {
        let rows: Vec<Features> = (0..200)
            .map(|i| {
                let x = f64::from(i);
                [x, (x * 0.37).sin(), 100.0 - x]
            })
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| 2.0 * r[0] + 10.0 * r[1]).collect();
        let forest = RegressionForest::fit(&rows, &targets, &ForestParams {
            trees: 8,
            ..ForestParams::default()
        })
        .expect("fit");
        let (lo, hi) = targets
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)));
        for r in &rows {
            let p = forest.predict(r);
            assert!(p >= lo && p <= hi);
        }
    }

    #[test]
    fn rejects_mismatched_training_data() {
        let err = RegressionForest::fit(&[[0.0; 3]], &[], &ForestParams::default());
        assert!(matches!(err, Err(ModelError::EmptyTrainingSet)));
    }

    #[test]
    fn persists_as_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("models").join("m.json");
        let rows: Vec<Features> = (0..30).map(|i| [f64::from(i), 1.0, 1.0]).collect();
        let targets: Vec<f64> = (0..30).map(f64::from).collect();
        let forest = RegressionForest::fit(&rows, &targets, &ForestParams {
            trees: 3,
            ..ForestParams::default()
        })
        .expect("fit");
        forest.save(&path).expect("save");
        let loaded = RegressionForest::load(&path).expect("load");
        assert_eq!(loaded.tree_count(), 3);
        for r in &rows {
            assert!((loaded.predict(r) - forest.predict(r)).abs() < 1e-9);
        }
    }

    #[test]
    fn write_failures_are_not_reported_as_decode_errors() {
        let path = Path::new("models/cost.json");
        let disk_full = serde_json::Error::io(std::io::Error::other("disk full"));
        let io = ModelError::from_encode(path, disk_full);
        assert!(matches!(io, ModelError::Io { .. }), "{io:?}");

        let ser = <serde_json::Error as serde::ser::Error>::custom("unsupported value");
        let encode = ModelError::from_encode(path, ser);
        assert!(matches!(encode, ModelError::Encode { .. }), "{encode:?}");
        assert!(encode.to_string().starts_with("failed to encode model file"));
    }

    #[test]
    fn save_into_a_directory_path_fails_as_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let forest = RegressionForest::fit(
            &[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            &[1.0, 2.0],
            &ForestParams::default(),
        )
        .expect("fit");
        let err = forest.save(dir.path()).expect_err("a directory is not a file");
        assert!(matches!(err, ModelError::Io { .. } | ModelError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = RegressionForest::load(&dir.path().join("absent.json"));
        assert!(matches!(err, Err(ModelError::NotFound { .. })));
    }
}
