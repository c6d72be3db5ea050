use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Evaluation of a fitted attrition model.
///
/// Everything except `train_accuracy` is measured on the held-out split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` when the held-out split contains a single class.
    pub roc_auc: Option<f64>,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[u64; 2]; 2],
    /// Sorted by descending importance.
    pub feature_importance: Vec<FeatureImportance>,
    pub train_rows: usize,
    pub test_rows: usize,
}

pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    hits as f64 / y_true.len() as f64
}

pub fn confusion_matrix(y_true: &[u8], y_pred: &[u8]) -> [[u64; 2]; 2] {
    let mut matrix = [[0u64; 2]; 2];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        matrix[usize::from(t == 1)][usize::from(p == 1)] += 1;
    }
    matrix
}

/// Precision, recall and F1 of the positive class; 0.0 wherever a ratio is undefined.
pub fn precision_recall_f1(confusion: &[[u64; 2]; 2]) -> (f64, f64, f64) {
    let tp = confusion[1][1] as f64;
    let fp = confusion[0][1] as f64;
    let fn_ = confusion[1][0] as f64;
    let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = ratio(2.0 * precision * recall, precision + recall);
    (precision, recall, f1)
}

/// Area under the ROC curve via the rank-sum statistic, with tied scores
/// sharing their average rank.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut pos_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; the tie group spans start+1..=end.
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            if y_true[idx] == 1 {
                pos_rank_sum += avg_rank;
            }
        }
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Pairs features with importances, highest first. Ties keep feature order.
pub fn rank_importances(features: &[String], importances: &[f64]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = features
        .iter()
        .zip(importances)
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_confusion_and_scores() {
        let y_true = [1, 1, 1, 0, 0, 0, 0];
        let y_pred = [1, 0, 0, 1, 0, 0, 0];
        let cm = confusion_matrix(&y_true, &y_pred);
        assert_eq!(cm, [[3, 1], [2, 1]]);

        let (precision, recall, f1) = precision_recall_f1(&cm);
        assert!((precision - 0.5).abs() < EPS);
        assert!((recall - 1.0 / 3.0).abs() < EPS);
        assert!((f1 - 0.4).abs() < EPS);
        assert!((accuracy(&y_true, &y_pred) - 4.0 / 7.0).abs() < EPS);
    }

    #[test]
    fn test_no_positive_predictions_score_zero() {
        let cm = confusion_matrix(&[1, 0], &[0, 0]);
        assert_eq!(precision_recall_f1(&cm), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let y = [0, 0, 1, 1];
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
    }

    #[test]
    fn test_roc_auc_with_ties() {
        let y = [0, 1, 0, 1];
        let auc = roc_auc(&y, &[0.5, 0.5, 0.2, 0.9]).expect("two classes");
        assert!((auc - 0.875).abs() < EPS);
    }

    #[test]
    fn test_roc_auc_single_class_is_none() {
        assert_eq!(roc_auc(&[1, 1], &[0.3, 0.7]), None);
    }

    #[test]
    fn test_rank_importances_descending() {
        let features = vec!["Age".to_owned(), "Income".to_owned(), "Tenure".to_owned()];
        let ranked = rank_importances(&features, &[0.2, 0.5, 0.3]);
        let names: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(names, vec!["Income", "Tenure", "Age"]);
    }
}
