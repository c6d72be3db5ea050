use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Sparse per-metric ratings for one candidate.
///
/// Keys are metric names. A key may be present with no usable value (the
/// rating was recorded as blank or non-numeric); every read treats such a
/// metric, and any metric that is absent altogether, as 0.0.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreCard(BTreeMap<String, Option<f64>>);

impl ScoreCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a rating. Non-finite values are stored as absent.
    pub fn insert(&mut self, metric: impl Into<String>, value: f64) {
        self.0.insert(metric.into(), Some(value).filter(|v| v.is_finite()));
    }

    pub fn set(&mut self, metric: impl Into<String>, value: Option<f64>) {
        self.0
            .insert(metric.into(), value.filter(|v| v.is_finite()));
    }

    pub fn remove(&mut self, metric: &str) -> Option<f64> {
        self.0.remove(metric).flatten()
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.0.get(metric).copied().flatten()
    }

    /// Rating for `metric`, 0.0 when missing.
    pub fn value(&self, metric: &str) -> f64 {
        self.get(metric).unwrap_or(0.0)
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.0.contains_key(metric)
    }

    /// Metric names in sorted order.
    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ScoreCard {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut card = Self::new();
        for (metric, value) in iter {
            card.insert(metric, value);
        }
        card
    }
}

impl<'de> Deserialize<'de> for ScoreCard {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
        let card = raw
            .unwrap_or_default()
            .into_iter()
            .map(|(metric, value)| (metric, coerce_rating(&value)))
            .collect();
        Ok(Self(card))
    }
}

fn coerce_rating(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
