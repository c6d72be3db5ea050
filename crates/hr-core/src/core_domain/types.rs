use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{ScoreCard, ValidationError};

// ---------------------------------------------------------------------------
// String-based identity newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype!(CandidateId);

impl CandidateId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// SessionId: database row id of a persisted interview session
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(i64);

impl SessionId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Baseline interview metrics
// ---------------------------------------------------------------------------

/// Scoring dimensions every interview session carries before custom metrics.
pub const FIXED_METRICS: [&str; 5] = [
    "Communication",
    "Technical Skills",
    "Projects",
    "Problem Solving",
    "Cultural Fit",
];

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub experience_years: f64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub scores: ScoreCard,
    /// Single overall score, used when no per-metric scores exist.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(name: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            id: CandidateId::generate(),
            name: name.into(),
            position: position.into(),
            experience_years: 0.0,
            email: None,
            phone: None,
            notes: String::new(),
            scores: ScoreCard::default(),
            score: None,
            feedback: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = CandidateId::new(id);
        self
    }

    pub fn with_score(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.scores.insert(metric, value);
        self
    }

    pub fn with_overall(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_experience(mut self, years: f64) -> Self {
        self.experience_years = years;
        self
    }

    /// Overall score as a finite number, 0.0 when absent.
    pub fn overall_or_zero(&self) -> f64 {
        self.score.filter(|s| s.is_finite()).unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.experience_years.is_finite() || self.experience_years < 0.0 {
            return Err(ValidationError::InvalidExperience(self.experience_years));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_builder() {
        let c = Candidate::new("Alice", "Backend Engineer")
            .with_id("R1")
            .with_score("Communication", 8.0)
            .with_experience(3.5);

        assert_eq!(c.id.as_str(), "R1");
        assert_eq!(c.position, "Backend Engineer");
        assert_eq!(c.scores.get("Communication"), Some(8.0));
        assert_eq!(c.experience_years, 3.5);
        assert!(c.score.is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Candidate::new("A", "Dev");
        let b = Candidate::new("B", "Dev");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_overall_or_zero() {
        let c = Candidate::new("A", "Dev");
        assert_eq!(c.overall_or_zero(), 0.0);
        assert_eq!(c.clone().with_overall(7.5).overall_or_zero(), 7.5);
        assert_eq!(c.with_overall(f64::NAN).overall_or_zero(), 0.0);
    }

    #[test]
    fn test_validate_rejects_negative_experience() {
        let c = Candidate::new("A", "Dev").with_experience(-2.0);
        assert_eq!(
            c.validate(),
            Err(ValidationError::InvalidExperience(-2.0))
        );
    }

    #[test]
    fn test_deserialize_minimal_candidate() {
        let json = r#"{"id": "c-1", "name": "Bob", "scores": {"Projects": "7.5", "Fit": "n/a"}}"#;
        let c: Candidate = serde_json::from_str(json).expect("valid candidate");

        assert_eq!(c.id, CandidateId::new("c-1"));
        assert_eq!(c.scores.get("Projects"), Some(7.5));
        assert_eq!(c.scores.get("Fit"), None);
        assert!(c.scores.contains("Fit"));
        assert_eq!(c.notes, "");
    }

    #[test]
    fn test_display_impls() {
        assert_eq!(CandidateId::new("R-7").to_string(), "R-7");
        assert_eq!(SessionId::new(42).to_string(), "42");
    }
}
