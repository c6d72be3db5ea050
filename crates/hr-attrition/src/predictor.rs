use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::artifact::{ModelMetadata, ModelPaths};
use crate::dataset::EmployeeTable;
use crate::error::AttritionError;
use crate::model::AttritionModel;
use crate::trainer::TrainingOutcome;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PredictionKind {
    #[default]
    Labels,
    Probabilities,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predictions {
    /// 1 = predicted to leave.
    Labels(Vec<u8>),
    /// Probability of leaving.
    Probabilities(Vec<f64>),
}

impl Predictions {
    pub fn len(&self) -> usize {
        match self {
            Self::Labels(v) => v.len(),
            Self::Probabilities(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs `model` over `table`, aligning columns to the training-time order.
pub fn predict(
    model: &AttritionModel,
    table: &EmployeeTable,
    kind: PredictionKind,
) -> Result<Predictions, AttritionError> {
    Ok(match kind {
        PredictionKind::Labels => Predictions::Labels(model.predict(table)?),
        PredictionKind::Probabilities => {
            Predictions::Probabilities(model.positive_probabilities(table)?)
        }
    })
}

// ---------------------------------------------------------------------------
// Predictor: a loaded model plus where it came from
// ---------------------------------------------------------------------------

/// A model held for repeated inference.
///
/// The model is read once. [`Predictor::is_stale`] compares the loaded
/// training timestamp with the metadata currently on disk.
#[derive(Clone, Debug)]
pub struct Predictor {
    model: AttritionModel,
    metadata: Option<ModelMetadata>,
    paths: ModelPaths,
}

impl Predictor {
    /// Loads the artifact (required) and metadata sidecar (optional) from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, AttritionError> {
        let paths = ModelPaths::in_dir(dir);
        let model = AttritionModel::load(&paths.artifact)?;
        let metadata = ModelMetadata::load_optional(&paths.metadata)?;

        match &metadata {
            Some(meta) if meta.features != model.feature_columns() => warn!(
                metadata = ?meta.features,
                model = ?model.feature_columns(),
                "metadata feature list differs from the artifact, using the artifact order"
            ),
            Some(_) => {}
            None => debug!(path = %paths.metadata.display(), "no metadata sidecar"),
        }
        info!(
            artifact = %paths.artifact.display(),
            features = model.feature_columns().len(),
            "predictor loaded"
        );
        Ok(Self {
            model,
            metadata,
            paths,
        })
    }

    /// Wraps a model that was just trained and saved to `dir`.
    pub fn from_outcome(outcome: TrainingOutcome, dir: impl AsRef<Path>) -> Self {
        Self {
            model: outcome.model,
            metadata: Some(outcome.metadata),
            paths: ModelPaths::in_dir(dir),
        }
    }

    pub fn model(&self) -> &AttritionModel {
        &self.model
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    /// Features the model expects, in training order.
    pub fn features(&self) -> &[String] {
        self.model.feature_columns()
    }

    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .as_ref()
            .map(|m| m.timestamp)
            .or_else(|| self.model.trained_at())
    }

    /// True when the metadata on disk records a newer training than the one loaded.
    pub fn is_stale(&self) -> Result<bool, AttritionError> {
        let on_disk = ModelMetadata::load_optional(&self.paths.metadata)?;
        Ok(match (on_disk, self.trained_at()) {
            (Some(disk), Some(loaded)) => disk.timestamp > loaded,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }

    pub fn predict(
        &self,
        table: &EmployeeTable,
        kind: PredictionKind,
    ) -> Result<Predictions, AttritionError> {
        predict(&self.model, table, kind)
    }

    pub fn probabilities(&self, table: &EmployeeTable) -> Result<Vec<f64>, AttritionError> {
        self.model.positive_probabilities(table)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use hr_core::core::NotTrainedError;
    use tempfile::TempDir;

    use super::*;
    use crate::dataset::Column;
    use crate::forest::ForestParams;
    use crate::trainer::{train, TrainingConfig};

    fn table() -> EmployeeTable {
        let n = 50;
        let satisfaction: Vec<f64> = (0..n).map(|i| (i % 4 + 1) as f64).collect();
        let income: Vec<f64> = (0..n).map(|i| 2000.0 + (i * 150) as f64).collect();
        let attrition: Vec<f64> = (0..n)
            .map(|i| if i % 4 == 0 && i < 30 { 1.0 } else { 0.0 })
            .collect();
        EmployeeTable::new(vec![
            Column::numeric("JobSatisfaction", satisfaction),
            Column::numeric("MonthlyIncome", income),
            Column::numeric("Attrition", attrition),
        ])
        .expect("table")
    }

    fn outcome() -> TrainingOutcome {
        let config = TrainingConfig {
            forest: ForestParams {
                n_estimators: 15,
                ..ForestParams::default()
            },
            ..TrainingConfig::default()
        };
        train(&table(), &config).expect("train")
    }

    #[test]
    fn test_predict_kinds() {
        let outcome = outcome();
        let table = table();

        let Predictions::Labels(labels) =
            predict(&outcome.model, &table, PredictionKind::Labels).expect("labels")
        else {
            panic!("expected labels");
        };
        let Predictions::Probabilities(proba) =
            predict(&outcome.model, &table, PredictionKind::Probabilities).expect("proba")
        else {
            panic!("expected probabilities");
        };
        assert_eq!(labels.len(), 50);
        assert_eq!(proba.len(), 50);
        for (label, p) in labels.iter().zip(&proba) {
            assert_eq!(*label, u8::from(*p >= 0.5));
        }
    }

    #[test]
    fn test_predict_untrained() {
        let err = predict(&AttritionModel::default(), &table(), PredictionKind::Labels).unwrap_err();
        assert!(matches!(
            err,
            AttritionError::NotTrained(NotTrainedError {
                operation: "making predictions"
            })
        ));
    }

    #[test]
    fn test_load_from_saved_directory() {
        let dir = TempDir::new().expect("temp dir");
        let outcome = outcome();
        outcome.save(dir.path()).expect("save");

        let predictor = Predictor::load(dir.path()).expect("load");
        assert_eq!(predictor.features(), ["JobSatisfaction", "MonthlyIncome"]);
        assert_eq!(predictor.metadata(), Some(&outcome.metadata));
        assert_eq!(predictor.trained_at(), Some(outcome.metadata.timestamp));
        assert!(!predictor.is_stale().expect("freshness"));

        let from_disk = predictor.probabilities(&table()).expect("proba");
        let fresh = outcome.model.positive_probabilities(&table()).expect("proba");
        assert_eq!(from_disk, fresh);
    }

    #[test]
    fn test_load_without_metadata() {
        let dir = TempDir::new().expect("temp dir");
        let outcome = outcome();
        outcome
            .model
            .save(ModelPaths::in_dir(dir.path()).artifact)
            .expect("save artifact");

        let predictor = Predictor::load(dir.path()).expect("load");
        assert!(predictor.metadata().is_none());
        assert_eq!(predictor.trained_at(), outcome.model.trained_at());
        assert!(!predictor.is_stale().expect("freshness"));
    }

    #[test]
    fn test_load_missing_artifact() {
        let dir = TempDir::new().expect("temp dir");
        assert!(matches!(
            Predictor::load(dir.path()).unwrap_err(),
            AttritionError::Io { .. }
        ));
    }

    #[test]
    fn test_newer_metadata_marks_stale() {
        let dir = TempDir::new().expect("temp dir");
        let outcome = outcome();
        let paths = outcome.save(dir.path()).expect("save");
        let predictor = Predictor::from_outcome(outcome.clone(), dir.path());
        assert!(!predictor.is_stale().expect("fresh"));

        let mut newer = outcome.metadata.clone();
        newer.timestamp += Duration::seconds(5);
        newer.save(&paths.metadata).expect("overwrite metadata");
        assert!(predictor.is_stale().expect("stale"));
    }
}
