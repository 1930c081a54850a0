//! Label/score admission policy.
//!
//! Predictions are scanned once, in analyzer order. A required label at or
//! above `min_score` sets the verdict to keep; an excluded label at or above
//! `min_score` sets it to drop. The last rule that fires wins, so the same
//! predictions in a different order can flip the verdict. With no label
//! rules configured every frame is kept.

use serde::{Deserialize, Serialize};
use vfs_frame_model::Prediction;

/// Required/excluded label rules with a shared score floor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelPolicy {
    /// Minimum score for a prediction to trigger a rule.
    pub min_score: f64,

    /// Labels that keep the frame.
    pub required_labels: Vec<String>,

    /// Labels that drop the frame.
    pub excluded_labels: Vec<String>,
}

impl LabelPolicy {
    /// Whether no label rules are configured.
    pub fn is_passthrough(&self) -> bool {
        self.required_labels.is_empty() && self.excluded_labels.is_empty()
    }

    /// Evaluate the policy against one frame's predictions.
    pub fn should_keep(&self, predictions: &[Prediction]) -> bool {
        should_keep(
            predictions,
            self.min_score,
            &self.required_labels,
            &self.excluded_labels,
        )
    }
}

/// Decide whether a frame with these predictions is kept.
pub fn should_keep(
    predictions: &[Prediction],
    min_score: f64,
    required_labels: &[String],
    excluded_labels: &[String],
) -> bool {
    if required_labels.is_empty() && excluded_labels.is_empty() {
        return true;
    }

    let mut verdict = false;
    for p in predictions {
        if p.score < min_score {
            continue;
        }
        if required_labels.iter().any(|l| *l == p.label) {
            tracing::trace!(index = p.index, label = %p.label, score = p.score, "Required label matched");
            verdict = true;
        }
        if excluded_labels.iter().any(|l| *l == p.label) {
            tracing::trace!(index = p.index, label = %p.label, score = p.score, "Excluded label matched");
            verdict = false;
        }
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(index: usize, label: &str, score: f64) -> Prediction {
        Prediction::new(index, label, score)
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_passthrough_keeps_everything() {
        assert!(should_keep(&[], 0.9, &[], &[]));
        assert!(should_keep(&[pred(0, "dog", 0.1)], 0.9, &[], &[]));
    }

    #[test]
    fn test_no_rule_fired_drops() {
        let preds = [pred(0, "bird", 0.9)];
        assert!(!should_keep(&preds, 0.5, &labels(&["cat"]), &[]));
        assert!(!should_keep(&[], 0.5, &labels(&["cat"]), &[]));
    }

    #[test]
    fn test_score_floor_is_inclusive() {
        let preds = [pred(0, "cat", 0.5)];
        assert!(should_keep(&preds, 0.5, &labels(&["cat"]), &[]));
        assert!(!should_keep(&preds, 0.51, &labels(&["cat"]), &[]));
    }

    #[test]
    fn test_later_exclusion_overrides_keep() {
        let required = labels(&["cat"]);
        let excluded = labels(&["dog"]);
        let cat_then_dog = [pred(0, "cat", 0.9), pred(1, "dog", 0.9)];
        let dog_then_cat = [pred(0, "dog", 0.9), pred(1, "cat", 0.9)];

        assert!(!should_keep(&cat_then_dog, 0.5, &required, &excluded));
        assert!(should_keep(&dog_then_cat, 0.5, &required, &excluded));
    }

    #[test]
    fn test_low_score_exclusion_ignored() {
        let preds = [pred(0, "cat", 0.9), pred(1, "dog", 0.2)];
        assert!(should_keep(&preds, 0.5, &labels(&["cat"]), &labels(&["dog"])));
    }

    #[test]
    fn test_only_exclusions_never_keep() {
        let policy = LabelPolicy {
            min_score: 0.0,
            required_labels: vec![],
            excluded_labels: labels(&["dog"]),
        };
        assert!(!policy.is_passthrough());
        assert!(!policy.should_keep(&[pred(0, "cat", 1.0)]));
    }
}
