//! Gradient-boosted regression trees.
//!
//! A native squared-error booster: each round fits a depth-limited
//! regression tree to the current residuals and adds it with shrinkage.
//! Split quality and leaf values follow the usual second-order formulation
//! (for squared error the per-row hessian is 1, so `min_child_weight` acts
//! as a row count and `lambda` shrinks leaf values). Row subsampling, when
//! enabled, draws from the engine's deterministic legacy generator so runs
//! remain reproducible.

use std::ops::Range;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use stepwise_linalg::matrix::DataMatrix;

use super::RegressionModel;
use crate::selection::mcpt::ParkMillerRng;

/// Boosting hyperparameters for the squared-error objective.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradientBoostConfig {
    /// Number of boosting rounds (trees).
    pub n_rounds: usize,
    /// Shrinkage applied to every tree's contribution.
    pub learning_rate: f64,
    /// Maximum tree depth; 0 means a single leaf per tree.
    pub max_depth: usize,
    /// Minimum row count on each side of a split.
    pub min_child_weight: f64,
    /// L2 regularization on leaf values.
    pub lambda: f64,
    /// Fraction of training rows drawn per round; 1 uses every row.
    pub subsample: f64,
}

impl Default for GradientBoostConfig {
    fn default() -> Self {
        Self {
            n_rounds: 500,
            learning_rate: 0.01,
            max_depth: 4,
            min_child_weight: 10.0,
            lambda: 2.0,
            subsample: 0.8,
        }
    }
}

#[derive(Clone, Debug)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        slot: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug)]
struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

impl Tree {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = self.root;
        loop {
            match &self.nodes[node] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    slot,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*slot] < *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Gradient-boosted-trees model. `has_coefficients` is false; per-feature
/// split gains are exposed through [`GradientBoostModel::feature_importance`]
/// instead.
#[derive(Clone, Debug, Default)]
pub struct GradientBoostModel {
    config: GradientBoostConfig,
    base_prediction: f64,
    trees: Vec<Tree>,
    importance: Vec<f64>,
    fitted: bool,
}

impl GradientBoostModel {
    pub fn new(config: GradientBoostConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GradientBoostConfig {
        &self.config
    }

    /// Total split gain attributed to each fitted feature, in the order the
    /// feature indices were passed to `fit`. Empty before the first fit.
    pub fn feature_importance(&self) -> &[f64] {
        &self.importance
    }

    fn round_rows(&self, n_train: usize, round: usize) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n_train).collect();
        }
        let mut rng = ParkMillerRng::new(17 * (round as i32 + 1) + 11);
        let sampled: Vec<usize> = (0..n_train)
            .filter(|_| rng.next_unit() < self.config.subsample)
            .collect();
        if sampled.is_empty() {
            (0..n_train).collect()
        } else {
            sampled
        }
    }

    /// Grows one tree on `rows` (train-local indices) and returns its arena
    /// index structure. `columns` holds one slice per feature slot.
    fn grow(
        &mut self,
        tree: &mut Tree,
        rows: Vec<usize>,
        depth: usize,
        columns: &[Vec<f64>],
        residuals: &[f64],
    ) -> usize {
        let count = rows.len() as f64;
        let sum: f64 = rows.iter().map(|&r| residuals[r]).sum();
        let leaf_value = sum / (count + self.config.lambda);

        if depth < self.config.max_depth && count >= 2.0 * self.config.min_child_weight {
            if let Some(split) = self.best_split(&rows, columns, residuals, sum, count) {
                let (slot, threshold, gain, left_rows, right_rows) = split;
                self.importance[slot] += gain;
                let left = self.grow(tree, left_rows, depth + 1, columns, residuals);
                let right = self.grow(tree, right_rows, depth + 1, columns, residuals);
                tree.nodes.push(Node::Split {
                    slot,
                    threshold,
                    left,
                    right,
                });
                return tree.nodes.len() - 1;
            }
        }

        tree.nodes.push(Node::Leaf { value: leaf_value });
        tree.nodes.len() - 1
    }

    #[allow(clippy::type_complexity)]
    fn best_split(
        &self,
        rows: &[usize],
        columns: &[Vec<f64>],
        residuals: &[f64],
        total_sum: f64,
        total_count: f64,
    ) -> Option<(usize, f64, f64, Vec<usize>, Vec<usize>)> {
        if rows.len() < 2 {
            return None;
        }
        let parent_score = total_sum * total_sum / (total_count + self.config.lambda);
        let mut best: Option<(usize, f64, f64)> = None;

        for (slot, column) in columns.iter().enumerate() {
            let mut order: Vec<usize> = rows.to_vec();
            order.sort_by(|&a, &b| {
                column[a]
                    .partial_cmp(&column[b])
                    .unwrap_or(core::cmp::Ordering::Equal)
            });

            let mut left_sum = 0.0;
            let mut left_count = 0.0;
            for window in 0..order.len() - 1 {
                left_sum += residuals[order[window]];
                left_count += 1.0;
                let here = column[order[window]];
                let next = column[order[window + 1]];
                if here == next {
                    continue;
                }
                let right_sum = total_sum - left_sum;
                let right_count = total_count - left_count;
                if left_count < self.config.min_child_weight
                    || right_count < self.config.min_child_weight
                {
                    continue;
                }
                let gain = left_sum * left_sum / (left_count + self.config.lambda)
                    + right_sum * right_sum / (right_count + self.config.lambda)
                    - parent_score;
                if gain > 0.0 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((slot, 0.5 * (here + next), gain));
                }
            }
        }

        best.map(|(slot, threshold, gain)| {
            let (left_rows, right_rows) = rows
                .iter()
                .copied()
                .partition(|&r| columns[slot][r] < threshold);
            (slot, threshold, gain, left_rows, right_rows)
        })
    }
}

impl RegressionModel for GradientBoostModel {
    fn fit(
        &mut self,
        x: &DataMatrix,
        y: &[f64],
        indices: &[usize],
        exclude: Range<usize>,
    ) -> Result<()> {
        ensure!(!indices.is_empty(), "no features selected for training");
        ensure!(
            x.rows() == y.len(),
            "target has {} rows but the matrix has {}",
            y.len(),
            x.rows()
        );
        let train_rows: Vec<usize> = (0..y.len()).filter(|r| !exclude.contains(r)).collect();
        ensure!(!train_rows.is_empty(), "no training rows left after exclusion");

        let n_train = train_rows.len();
        let n_slots = indices.len();
        let columns: Vec<Vec<f64>> = indices
            .iter()
            .map(|&idx| train_rows.iter().map(|&r| x.get(r, idx)).collect())
            .collect();
        let targets: Vec<f64> = train_rows.iter().map(|&r| y[r]).collect();

        self.base_prediction = targets.iter().sum::<f64>() / n_train as f64;
        self.trees = Vec::with_capacity(self.config.n_rounds);
        self.importance = vec![0.0; n_slots];

        let mut predictions = vec![self.base_prediction; n_train];
        let mut row_buffer = vec![0.0; n_slots];
        for round in 0..self.config.n_rounds {
            let rows = self.round_rows(n_train, round);
            let residuals: Vec<f64> = (0..n_train).map(|r| targets[r] - predictions[r]).collect();

            let mut tree = Tree {
                nodes: Vec::new(),
                root: 0,
            };
            tree.root = self.grow(&mut tree, rows, 0, &columns, &residuals);
            for r in 0..n_train {
                for (slot, column) in columns.iter().enumerate() {
                    row_buffer[slot] = column[r];
                }
                predictions[r] += self.config.learning_rate * tree.predict_row(&row_buffer);
            }
            self.trees.push(tree);
        }

        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &DataMatrix, indices: &[usize], range: Range<usize>) -> Result<Vec<f64>> {
        ensure!(self.fitted, "model has not been fitted");
        ensure!(range.end <= x.rows(), "prediction range exceeds data rows");
        let mut row_buffer = vec![0.0; indices.len()];
        let mut predictions = Vec::with_capacity(range.len());
        for row in range {
            for (slot, &idx) in indices.iter().enumerate() {
                row_buffer[slot] = x.get(row, idx);
            }
            let boosted: f64 = self
                .trees
                .iter()
                .map(|tree| tree.predict_row(&row_buffer))
                .sum();
            predictions.push(self.base_prediction + self.config.learning_rate * boosted);
        }
        Ok(predictions)
    }

    fn clone_unfitted(&self) -> Box<dyn RegressionModel> {
        Box::new(Self::new(self.config.clone()))
    }

    fn has_coefficients(&self) -> bool {
        false
    }

    fn coefficients(&mut self, _x: &DataMatrix, _y: &[f64], _indices: &[usize]) -> Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn kind(&self) -> &'static str {
        "gradient-boost"
    }
}
