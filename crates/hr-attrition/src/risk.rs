use hr_core::core::ValidationError;
use serde::{Deserialize, Serialize};

use crate::model::{label_of, DECISION_THRESHOLD};

/// How at-risk rows are picked from a probability column.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum RiskSelection {
    /// The `n` highest probabilities; `n` is clamped to `[1, rows]`.
    TopN(usize),
    /// Every row with probability at or above the cutoff.
    Threshold(f64),
}

impl RiskSelection {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Self::Threshold(cutoff) if !(0.0..=1.0).contains(&cutoff) => {
                Err(ValidationError::InvalidThreshold(cutoff))
            }
            _ => Ok(()),
        }
    }

    /// Human-readable criteria, as written into report summaries.
    pub fn describe(&self) -> String {
        match self {
            Self::TopN(n) => format!("Top {n} employees by attrition probability"),
            Self::Threshold(cutoff) => format!("Attrition probability >= {cutoff:.2}"),
        }
    }
}

/// A source row with its predicted risk.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    /// Position of the row in the scored table.
    pub index: usize,
    pub probability: f64,
    pub label: u8,
}

/// Picks rows by `selection`, highest probability first. Equal probabilities
/// keep their input order.
pub fn select_at_risk(
    probabilities: &[f64],
    selection: RiskSelection,
) -> Result<Vec<ScoredRow>, ValidationError> {
    selection.validate()?;

    let mut rows: Vec<ScoredRow> = probabilities
        .iter()
        .enumerate()
        .map(|(index, &probability)| ScoredRow {
            index,
            probability,
            label: label_of(probability),
        })
        .collect();
    rows.sort_by(|a, b| b.probability.total_cmp(&a.probability));

    match selection {
        RiskSelection::TopN(n) => {
            let n = n.clamp(1, rows.len().max(1));
            rows.truncate(n);
        }
        RiskSelection::Threshold(cutoff) => rows.retain(|r| r.probability >= cutoff),
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// RiskSummary
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskBuckets {
    /// `[0, 0.25]`
    pub low: usize,
    /// `(0.25, 0.5]`
    pub medium: usize,
    /// `(0.5, 0.75]`
    pub high: usize,
    /// `(0.75, 1]`
    pub very_high: usize,
}

impl RiskBuckets {
    fn add(&mut self, probability: f64) {
        if probability <= 0.25 {
            self.low += 1;
        } else if probability <= 0.5 {
            self.medium += 1;
        } else if probability <= 0.75 {
            self.high += 1;
        } else {
            self.very_high += 1;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Distribution of predicted risk over a set of rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub total: usize,
    pub mean_probability: f64,
    /// Rows at or above the decision threshold.
    pub predicted_attrition: usize,
    pub attrition_percent: f64,
    /// `None` for an empty input.
    pub quartiles: Option<Quartiles>,
    pub buckets: RiskBuckets,
}

impl RiskSummary {
    pub fn from_probabilities(probabilities: &[f64]) -> Self {
        let total = probabilities.len();
        if total == 0 {
            return Self::default();
        }

        let mut buckets = RiskBuckets::default();
        let mut predicted = 0;
        for &p in probabilities {
            buckets.add(p);
            if p >= DECISION_THRESHOLD {
                predicted += 1;
            }
        }

        let mut sorted = probabilities.to_vec();
        sorted.sort_by(f64::total_cmp);
        let quartiles = Quartiles {
            min: sorted[0],
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max: sorted[total - 1],
        };

        Self {
            total,
            mean_probability: probabilities.iter().sum::<f64>() / total as f64,
            predicted_attrition: predicted,
            attrition_percent: predicted as f64 * 100.0 / total as f64,
            quartiles: Some(quartiles),
            buckets,
        }
    }

    pub fn from_rows(rows: &[ScoredRow]) -> Self {
        let probabilities: Vec<f64> = rows.iter().map(|r| r.probability).collect();
        Self::from_probabilities(&probabilities)
    }
}

/// Linear-interpolated quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
