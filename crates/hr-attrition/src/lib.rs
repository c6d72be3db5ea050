pub mod artifact;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod features;
pub mod forest;
pub mod metrics;
pub mod model;
pub mod predictor;
pub mod report;
pub mod risk;
pub mod split;
pub mod trainer;

pub use artifact::{ModelMetadata, ModelPaths, ARTIFACT_FILE_NAME, METADATA_FILE_NAME};
pub use dataset::{Cell, Column, EmployeeTable};
pub use error::AttritionError;
pub use forest::ForestParams;
pub use metrics::{FeatureImportance, ModelMetrics};
pub use model::{binarize_target, AttritionModel, DECISION_THRESHOLD};
pub use predictor::{predict, PredictionKind, Predictions, Predictor};
pub use report::{ReportPaths, RiskReport};
pub use risk::{select_at_risk, RiskSelection, RiskSummary, ScoredRow};
pub use trainer::{train, TrainingConfig, TrainingOutcome};
