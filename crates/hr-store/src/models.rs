use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use hr_core::core::SessionId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of the session listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub date: NaiveDate,
    pub interviewer: String,
    pub created_at: DateTime<Utc>,
    pub candidate_count: u32,
}

/// Metrics recorded for one model training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Absent when the held-out split contained a single class.
    pub roc_auc: Option<f64>,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[u64; 2]; 2],
    pub feature_importance: BTreeMap<String, f64>,
    pub notes: String,
    pub dataset_size: u64,
    pub training_params: serde_json::Value,
}
