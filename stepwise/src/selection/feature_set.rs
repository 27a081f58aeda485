use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A candidate subset of predictor columns with its cross-validated score.
///
/// Indices are strictly ascending; the sorted vector doubles as the
/// deduplication key of the step search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub indices: Vec<usize>,
    /// Cross-validated criterion, higher is better.
    pub cv_score: f64,
    pub model_p_value: Option<f64>,
    pub change_p_value: Option<f64>,
}

impl FeatureSet {
    pub fn new(indices: Vec<usize>, cv_score: f64) -> Self {
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        Self {
            indices,
            cv_score,
            model_p_value: None,
            change_p_value: None,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Beam ordering: higher score first; exact ties fall back to the
    /// natural order of the index vectors so the winner is independent of
    /// task scheduling.
    pub fn beam_ordering(&self, other: &Self) -> Ordering {
        other
            .cv_score
            .partial_cmp(&self.cv_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.indices.cmp(&other.indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_score_descending() {
        let mut sets = vec![
            FeatureSet::new(vec![2], 0.4),
            FeatureSet::new(vec![0], 0.9),
            FeatureSet::new(vec![1], 0.7),
        ];
        sets.sort_by(FeatureSet::beam_ordering);
        let order: Vec<usize> = sets.iter().map(|s| s.indices[0]).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn exact_ties_break_on_indices() {
        let mut sets = vec![
            FeatureSet::new(vec![0, 3], 0.5),
            FeatureSet::new(vec![0, 1], 0.5),
            FeatureSet::new(vec![0, 2], 0.5),
        ];
        sets.sort_by(FeatureSet::beam_ordering);
        assert_eq!(sets[0].indices, vec![0, 1]);
        assert_eq!(sets[2].indices, vec![0, 3]);
    }
}
