use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::artifact::{ModelMetadata, ModelPaths, ARTIFACT_FORMAT_VERSION};
use crate::dataset::EmployeeTable;
use crate::error::AttritionError;
use crate::forest::ForestParams;
use crate::metrics::ModelMetrics;
use crate::model::AttritionModel;

pub const DEFAULT_TARGET: &str = "Attrition";
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// What to train on and how.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub target: String,
    /// Explicit feature list; every numeric column but the target when `None`.
    pub features: Option<Vec<String>>,
    pub test_fraction: f64,
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_owned(),
            features: None,
            test_fraction: DEFAULT_TEST_FRACTION,
            forest: ForestParams::default(),
        }
    }
}

/// A freshly trained model together with the sidecar describing it.
#[derive(Clone, Debug)]
pub struct TrainingOutcome {
    pub run_id: Uuid,
    pub model: AttritionModel,
    pub metrics: ModelMetrics,
    pub metadata: ModelMetadata,
}

impl TrainingOutcome {
    /// Writes the artifact and the metadata sidecar into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<ModelPaths, AttritionError> {
        let paths = ModelPaths::in_dir(dir);
        self.model.save(&paths.artifact)?;
        self.metadata.save(&paths.metadata)?;
        info!(
            run_id = %self.run_id,
            artifact = %paths.artifact.display(),
            metadata = %paths.metadata.display(),
            "training outcome saved"
        );
        Ok(paths)
    }
}

/// Fits a new model on `table`. Nothing is returned unless the fit succeeded.
pub fn train(
    table: &EmployeeTable,
    config: &TrainingConfig,
) -> Result<TrainingOutcome, AttritionError> {
    let mut model = AttritionModel::new(config.forest);
    let metrics = model
        .fit(
            table,
            &config.target,
            config.features.as_deref(),
            config.test_fraction,
        )?
        .clone();

    let features = model.feature_columns().to_vec();
    let metadata = ModelMetadata {
        n_features: features.len(),
        features,
        target: config.target.clone(),
        timestamp: model.trained_at().unwrap_or_else(chrono::Utc::now),
        test_size: config.test_fraction,
        n_samples: table.n_rows(),
        train_rows: metrics.train_rows,
        test_rows: metrics.test_rows,
        format_version: ARTIFACT_FORMAT_VERSION,
    };

    Ok(TrainingOutcome {
        run_id: Uuid::new_v4(),
        model,
        metrics,
        metadata,
    })
}
