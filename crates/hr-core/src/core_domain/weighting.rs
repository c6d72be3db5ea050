use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Candidate, ValidationError};

// ---------------------------------------------------------------------------
// Weights: user-supplied metric importance, not yet normalized
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct Weights(BTreeMap<String, f64>);

impl Weights {
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self, ValidationError> {
        for (metric, &value) in &weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidWeight {
                    metric: metric.clone(),
                    value,
                });
            }
        }
        Ok(Self(weights))
    }

    pub fn from_pairs<S, I>(pairs: I) -> Result<Self, ValidationError>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, f64)>,
    {
        Self::new(pairs.into_iter().map(|(m, w)| (m.into(), w)).collect())
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.0.get(metric).copied()
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.0.contains_key(metric)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl TryFrom<BTreeMap<String, f64>> for Weights {
    type Error = ValidationError;

    fn try_from(value: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Weights> for BTreeMap<String, f64> {
    fn from(value: Weights) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalized weight per metric; values sum to 1 over the metrics it was built for.
pub type NormalizedWeights = BTreeMap<String, f64>;

/// Every metric gets `1 / metrics.len()`.
pub fn equal_weights<S: AsRef<str>>(metrics: &[S]) -> NormalizedWeights {
    if metrics.is_empty() {
        return NormalizedWeights::new();
    }
    let share = 1.0 / metrics.len() as f64;
    metrics
        .iter()
        .map(|m| (m.as_ref().to_owned(), share))
        .collect()
}

/// Rescales `weights` over `metrics` so they sum to 1.
///
/// A metric with no supplied weight counts as 0. When the total is 0 every
/// metric gets an equal share.
pub fn normalize_weights<S: AsRef<str>>(weights: &Weights, metrics: &[S]) -> NormalizedWeights {
    let total: f64 = metrics
        .iter()
        .map(|m| weights.get(m.as_ref()).unwrap_or(0.0))
        .sum();
    if total == 0.0 {
        return equal_weights(metrics);
    }
    metrics
        .iter()
        .map(|m| {
            let w = weights.get(m.as_ref()).unwrap_or(0.0);
            (m.as_ref().to_owned(), w / total)
        })
        .collect()
}

/// Normalizes `weights` for a metric set, falling back to equal weights over
/// the whole set when no supplied weight names one of its metrics.
pub(crate) fn weights_for_metrics<S: AsRef<str>>(
    weights: Option<&Weights>,
    metrics: &[S],
) -> NormalizedWeights {
    let Some(weights) = weights else {
        return equal_weights(metrics);
    };
    let supplied: Vec<&str> = metrics
        .iter()
        .map(AsRef::as_ref)
        .filter(|m| weights.contains(m))
        .collect();
    if supplied.is_empty() {
        return equal_weights(metrics);
    }
    let total: f64 = supplied.iter().filter_map(|m| weights.get(m)).sum();
    if total == 0.0 {
        return equal_weights(metrics);
    }
    metrics
        .iter()
        .map(|m| {
            let w = weights.get(m.as_ref()).unwrap_or(0.0);
            (m.as_ref().to_owned(), w / total)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// compute_weighted_score: pure, no side effects
// ---------------------------------------------------------------------------

/// Single weighted score for a candidate.
///
/// Without per-metric scores the candidate's overall score is used (0.0 when
/// that is missing too). Supplied weights are restricted to the metrics the
/// candidate actually has; if none overlap, each metric is weighted equally.
pub fn compute_weighted_score(candidate: &Candidate, weights: Option<&Weights>) -> f64 {
    if candidate.scores.is_empty() {
        return candidate.overall_or_zero();
    }

    let metrics: Vec<&str> = candidate.scores.metrics().collect();
    let normalized = match weights {
        None => equal_weights(&metrics),
        Some(weights) => {
            let supplied: Vec<&str> = metrics
                .iter()
                .copied()
                .filter(|m| weights.contains(m))
                .collect();
            if supplied.is_empty() {
                equal_weights(&metrics)
            } else {
                normalize_weights(weights, &supplied)
            }
        }
    };

    metrics
        .iter()
        .map(|m| candidate.scores.value(m) * normalized.get(*m).copied().unwrap_or(0.0))
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
