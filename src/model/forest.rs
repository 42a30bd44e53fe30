use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::features::encoder::{FeatureRow, N_FEATURES};

use super::tree::{DecisionTree, TreeParams};

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl From<&ModelConfig> for ForestParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            seed: config.seed,
            max_depth: (config.max_depth > 0).then_some(config.max_depth),
            min_samples_split: config.min_samples_split,
        }
    }
}

/// Bagged ensemble of decision trees with per-split feature subsampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Mean impurity decrease per feature, summing to 1 (or all zero).
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit on the given rows. Deterministic for a fixed seed: tree `i` draws
    /// its bootstrap sample and feature subsets from `seed + i`.
    pub fn fit(rows: &[FeatureRow], labels: &[bool], params: ForestParams) -> Self {
        let n = rows.len();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            max_features: ((N_FEATURES as f64).sqrt() as usize).max(1),
        };

        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = [0.0; N_FEATURES];

        for i in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let (tree, tree_importances) =
                DecisionTree::fit(rows, labels, bootstrap, tree_params, &mut rng);

            let sum: f64 = tree_importances.iter().sum();
            if sum > 0.0 {
                for (acc, imp) in importances.iter_mut().zip(tree_importances) {
                    *acc += imp / sum;
                }
            }
            trees.push(tree);
        }

        let sum: f64 = importances.iter().sum();
        let feature_importances = importances
            .iter()
            .map(|imp| if sum > 0.0 { imp / sum } else { 0.0 })
            .collect();

        Self {
            trees,
            feature_importances,
        }
    }

    /// Fraction of trees voting fraud.
    pub fn predict_proba(&self, row: &FeatureRow) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let votes = self.trees.iter().filter(|t| t.predict(row)).count();
        votes as f64 / self.trees.len() as f64
    }

    /// Majority vote; an even split is legitimate.
    pub fn predict(&self, row: &FeatureRow) -> bool {
        self.predict_proba(row) > 0.5
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.feature_importances.len() != N_FEATURES {
            return Err(format!(
                "forest reports {} feature importances, expected {}",
                self.feature_importances.len(),
                N_FEATURES
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n_estimators: usize) -> ForestParams {
        ForestParams {
            n_estimators,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
        }
    }

    /// Fraud iff value > 2, with the other columns as noise.
    fn dataset() -> (Vec<FeatureRow>, Vec<bool>) {
        let rows: Vec<FeatureRow> = (0..40)
            .map(|i| {
                let value = (i % 10) as f64 * 0.5;
                [value, (i * 7919 % 300_000) as f64, 0.0, (i % 5) as f64, (i % 3) as f64, (i % 24) as f64]
            })
            .collect();
        let labels = rows.iter().map(|r| r[0] > 2.0).collect();
        (rows, labels)
    }

    #[test]
    fn test_fits_separable_data() {
        let (rows, labels) = dataset();
        let forest = RandomForest::fit(&rows, &labels, params(25));
        let correct = rows
            .iter()
            .zip(&labels)
            .filter(|(row, &label)| forest.predict(row) == label)
            .count();
        assert!(correct >= 38, "only {} of 40 correct", correct);
        assert_eq!(forest.n_estimators(), 25);
        forest.validate().unwrap();
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (rows, labels) = dataset();
        let a = RandomForest::fit(&rows, &labels, params(10));
        let b = RandomForest::fit(&rows, &labels, params(10));
        assert_eq!(a, b);
    }

    #[test]
    fn test_importances_are_normalized() {
        let (rows, labels) = dataset();
        let forest = RandomForest::fit(&rows, &labels, params(10));
        let sum: f64 = forest.feature_importances().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(forest.feature_importances()[2], 0.0); // constant column
    }

    #[test]
    fn test_single_class_gives_constant_prediction() {
        let rows = vec![[1.0, 2.0, 0.0, 0.0, 0.0, 3.0]; 4];
        let labels = vec![false; 4];
        let forest = RandomForest::fit(&rows, &labels, params(3));
        assert!(!forest.predict(&rows[0]));
        assert!(forest.feature_importances().iter().all(|&i| i == 0.0));
    }
}
