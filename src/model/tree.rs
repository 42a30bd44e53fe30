use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::features::encoder::{FeatureRow, N_FEATURES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        fraud: bool,
    },
    /// Rows with `row[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Candidate features drawn at each split.
    pub max_features: usize,
}

/// A CART classification tree using Gini impurity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct Builder<'a> {
    rows: &'a [FeatureRow],
    labels: &'a [bool],
    params: TreeParams,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
    /// Unnormalized weighted impurity decrease per feature.
    importances: [f64; N_FEATURES],
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted Gini of the two children.
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree over `samples`, which index into `rows` and may repeat (bootstrap).
    /// Returns the tree and its unnormalized impurity-decrease importances.
    pub fn fit(
        rows: &[FeatureRow],
        labels: &[bool],
        samples: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> (Self, [f64; N_FEATURES]) {
        let mut builder = Builder {
            rows,
            labels,
            params,
            rng,
            nodes: Vec::new(),
            importances: [0.0; N_FEATURES],
        };
        builder.grow(samples, 0);
        (Self { nodes: builder.nodes }, builder.importances)
    }

    pub fn predict(&self, row: &FeatureRow) -> bool {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { fraud } => return fraud,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Structural check for trees read back from disk: every split must name
    /// a known feature and point forward to existing nodes.
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                threshold,
            } = *node
            {
                if feature >= N_FEATURES {
                    return Err(format!(
                        "node {} splits on feature {} but rows have {} features",
                        idx, feature, N_FEATURES
                    ));
                }
                if threshold.is_nan() {
                    return Err(format!("node {} has a NaN threshold", idx));
                }
                for child in [left, right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", idx, child));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Builder<'_> {
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let fraud = samples.iter().filter(|&&s| self.labels[s]).count();
        let total = samples.len();
        // Ties resolve to legitimate
        self.nodes.push(Node::Leaf {
            fraud: fraud * 2 > total,
        });

        let pure = fraud == 0 || fraud == total;
        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if pure || depth_reached || total < self.params.min_samples_split {
            return idx;
        }

        let Some(split) = self.best_split(&samples) else {
            return idx;
        };

        let parent_impurity = gini(fraud, total);
        self.importances[split.feature] += total as f64 * (parent_impurity - split.impurity);

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| self.rows[s][split.feature] <= split.threshold);

        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    /// Search a random subset of features for the split with the lowest child impurity.
    /// Constant features do not count towards the subset, so a split is found
    /// whenever any feature varies.
    fn best_split(&mut self, samples: &[usize]) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..N_FEATURES).collect();
        features.shuffle(&mut *self.rng);

        let mut best: Option<SplitCandidate> = None;
        let mut evaluated = 0;
        for feature in features {
            if evaluated >= self.params.max_features {
                break;
            }
            if let Some(candidate) = self.best_split_on(feature, samples) {
                evaluated += 1;
                if best.as_ref().map_or(true, |b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_split_on(&self, feature: usize, samples: &[usize]) -> Option<SplitCandidate> {
        let mut points: Vec<(f64, bool)> = samples
            .iter()
            .map(|&s| (self.rows[s][feature], self.labels[s]))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total = points.len();
        let total_fraud = points.iter().filter(|p| p.1).count();
        let mut left_fraud = 0;
        let mut best: Option<SplitCandidate> = None;

        for i in 1..total {
            if points[i - 1].1 {
                left_fraud += 1;
            }
            let (lo, hi) = (points[i - 1].0, points[i].0);
            if lo == hi {
                continue;
            }
            let right_fraud = total_fraud - left_fraud;
            let impurity = (i as f64 * gini(left_fraud, i)
                + (total - i) as f64 * gini(right_fraud, total - i))
                / total as f64;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(fraud: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = fraud as f64 / total as f64;
    2.0 * p * (1.0 - p)
}
