use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};
use crate::features::encoder::FeatureRow;

use super::forest::{ForestParams, RandomForest};

/// One train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K-fold splitter that keeps the class proportions of every fold close to the
/// whole set. Each class's indices are shuffled once with the seeded RNG and
/// dealt round-robin across folds.
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    pub fn split(&self, labels: &[bool]) -> Result<Vec<Fold>> {
        if labels.is_empty() {
            return Err(RiskError::EmptyTrainingSet);
        }

        let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for (i, &label) in labels.iter().enumerate() {
            by_class[label as usize].push(i);
        }

        for (class, members) in ["legitimate", "fraud"].into_iter().zip(&by_class) {
            if members.len() < self.n_splits {
                tracing::warn!(class, count = members.len(), folds = self.n_splits, "Cannot stratify labels");
                return Err(RiskError::DegenerateLabelSet {
                    class,
                    count: members.len(),
                });
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut fold_of = vec![0usize; labels.len()];
        let mut offset = 0;
        for members in by_class.iter_mut() {
            members.shuffle(&mut rng);
            for (j, &idx) in members.iter().enumerate() {
                fold_of[idx] = (offset + j) % self.n_splits;
            }
            offset += members.len();
        }

        let folds = (0..self.n_splits)
            .map(|k| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&i| fold_of[i] == k);
                Fold { train, test }
            })
            .collect();
        Ok(folds)
    }
}

/// F1 of the fraud class. Zero when there are no true positives.
pub fn f1_score(truth: &[bool], predicted: &[bool]) -> f64 {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&t, &p) in truth.iter().zip(predicted) {
        match (t, p) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    if tp == 0 {
        return 0.0;
    }
    let precision = tp as f64 / (tp + fp) as f64;
    let recall = tp as f64 / (tp + fn_) as f64;
    2.0 * precision * recall / (precision + recall)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub fold_scores: Vec<f64>,
    pub mean_f1: f64,
    /// Population standard deviation across folds.
    pub std_f1: f64,
}

impl CrossValidationReport {
    pub fn from_scores(fold_scores: Vec<f64>) -> Self {
        let n = fold_scores.len().max(1) as f64;
        let mean_f1 = fold_scores.iter().sum::<f64>() / n;
        let variance = fold_scores.iter().map(|s| (s - mean_f1).powi(2)).sum::<f64>() / n;
        Self {
            fold_scores,
            mean_f1,
            std_f1: variance.sqrt(),
        }
    }
}

/// Fit and score a fresh forest on every fold.
pub fn cross_validate(
    rows: &[FeatureRow],
    labels: &[bool],
    n_splits: usize,
    params: ForestParams,
) -> Result<CrossValidationReport> {
    let folds = StratifiedKFold::new(n_splits, params.seed).split(labels)?;

    let mut scores = Vec::with_capacity(folds.len());
    for (k, fold) in folds.iter().enumerate() {
        let train_rows: Vec<FeatureRow> = fold.train.iter().map(|&i| rows[i]).collect();
        let train_labels: Vec<bool> = fold.train.iter().map(|&i| labels[i]).collect();
        let forest = RandomForest::fit(&train_rows, &train_labels, params);

        let truth: Vec<bool> = fold.test.iter().map(|&i| labels[i]).collect();
        let predicted: Vec<bool> = fold.test.iter().map(|&i| forest.predict(&rows[i])).collect();
        let score = f1_score(&truth, &predicted);

        tracing::info!(fold = k + 1, test_rows = fold.test.len(), f1 = score, "Cross-validation fold scored");
        scores.push(score);
    }

    Ok(CrossValidationReport::from_scores(scores))
}
