use std::path::PathBuf;

use crate::core::CandidateId;

// ---------------------------------------------------------------------------
// ValidationError: rejected input, raised before any work begins
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("features not found in dataset: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),
    #[error("target column '{0}' not found in dataset")]
    MissingTarget(String),
    #[error("dataset has no rows")]
    EmptyDataset,
    #[error("no feature columns available for training")]
    NoFeatures,
    #[error("test fraction must be between 0 and 1 (exclusive), got {0}")]
    InvalidTestFraction(f64),
    #[error("target column '{0}' holds a single class")]
    SingleClass(String),
    #[error("class {label} has {count} row(s); at least 2 are needed to stratify")]
    ClassTooSmall { label: u8, count: usize },
    #[error("split of {rows} rows at fraction {fraction} leaves an empty partition")]
    EmptyPartition { rows: usize, fraction: f64 },
    #[error("weight for metric '{metric}' must be a finite non-negative number, got {value}")]
    InvalidWeight { metric: String, value: f64 },
    #[error("experience years must be a finite non-negative number, got {0}")]
    InvalidExperience(f64),
    #[error("probability threshold must be between 0 and 1, got {0}")]
    InvalidThreshold(f64),
}

// ---------------------------------------------------------------------------
// NotTrainedError: model used before it was fitted
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("model must be trained before {operation}")]
pub struct NotTrainedError {
    pub operation: &'static str,
}

impl NotTrainedError {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

// ---------------------------------------------------------------------------
// ExportError: failure producing a derived file
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode export: {0}")]
    Encode(String),
    #[error("nothing to export: {0}")]
    Empty(String),
}

// ---------------------------------------------------------------------------
// SessionError: interview session state machine violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("no active interview session")]
    NoActiveSession,
    #[error("candidate {0} already exists in this session")]
    DuplicateCandidate(CandidateId),
    #[error("candidate {0} not found in this session")]
    UnknownCandidate(CandidateId),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
