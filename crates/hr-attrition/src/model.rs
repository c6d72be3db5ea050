use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hr_core::core::{NotTrainedError, ValidationError};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::{write_json_file, ARTIFACT_FORMAT_VERSION};
use crate::dataset::{Cell, Column, EmployeeTable};
use crate::encoding::LabelEncoder;
use crate::error::AttritionError;
use crate::features::{align_features, column_means, fill_missing, fit_encoders, select_features};
use crate::forest::{ForestParams, RandomForest};
use crate::metrics::{
    accuracy, confusion_matrix, precision_recall_f1, rank_importances, roc_auc,
    FeatureImportance, ModelMetrics,
};
use crate::split::{stratified_split, validate_test_fraction};

/// Positive-class probability at or above which a row is labelled as leaving.
pub const DECISION_THRESHOLD: f64 = 0.5;

pub(crate) fn label_of(probability: f64) -> u8 {
    u8::from(probability >= DECISION_THRESHOLD)
}

/// Binary label of each row: text targets are positive when they read
/// "yes" in any case, numeric targets when they equal 1. Missing is negative.
pub fn binarize_target(column: &Column) -> Vec<u8> {
    let numeric = column.is_numeric();
    column
        .cells()
        .iter()
        .map(|cell| match cell {
            Cell::Number(v) if numeric => u8::from(*v == 1.0),
            Cell::Missing => 0,
            other => u8::from(
                other
                    .category()
                    .is_some_and(|c| c.trim().eq_ignore_ascii_case("yes")),
            ),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// AttritionModel
// ---------------------------------------------------------------------------

/// Everything produced by a successful fit. Present as a whole or not at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct FittedState {
    target: String,
    feature_columns: Vec<String>,
    encoders: BTreeMap<String, LabelEncoder>,
    /// Training-time column means, used to fill missing inputs.
    fill_values: Vec<f64>,
    forest: RandomForest,
    metrics: ModelMetrics,
    trained_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttritionModel {
    params: ForestParams,
    fitted: Option<FittedState>,
}

#[derive(Serialize)]
struct ArtifactOut<'a> {
    format_version: u32,
    #[serde(flatten)]
    model: &'a AttritionModel,
}

#[derive(Deserialize)]
struct ArtifactVersion {
    format_version: u32,
}

#[derive(Deserialize)]
struct ArtifactIn {
    #[serde(flatten)]
    model: AttritionModel,
}

impl Default for AttritionModel {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl AttritionModel {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    fn require_fitted(&self, operation: &'static str) -> Result<&FittedState, NotTrainedError> {
        self.fitted
            .as_ref()
            .ok_or_else(|| NotTrainedError::new(operation))
    }

    /// Training-time feature order; empty before the model is fitted.
    pub fn feature_columns(&self) -> &[String] {
        self.fitted
            .as_ref()
            .map(|f| f.feature_columns.as_slice())
            .unwrap_or_default()
    }

    pub fn target(&self) -> Option<&str> {
        self.fitted.as_ref().map(|f| f.target.as_str())
    }

    pub fn metrics(&self) -> Option<&ModelMetrics> {
        self.fitted.as_ref().map(|f| &f.metrics)
    }

    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.fitted.as_ref().map(|f| f.trained_at)
    }

    pub fn encoders(&self) -> Option<&BTreeMap<String, LabelEncoder>> {
        self.fitted.as_ref().map(|f| &f.encoders)
    }

    /// Trains on `table` and evaluates on a stratified held-out split.
    ///
    /// All validation happens before any fitting. On error the model keeps
    /// whatever state it had before the call.
    pub fn fit(
        &mut self,
        table: &EmployeeTable,
        target: &str,
        features: Option<&[String]>,
        test_fraction: f64,
    ) -> Result<&ModelMetrics, AttritionError> {
        if table.is_empty() {
            return Err(ValidationError::EmptyDataset.into());
        }
        let target_column = table
            .column(target)
            .ok_or_else(|| ValidationError::MissingTarget(target.to_owned()))?;
        let feature_columns = select_features(table, target, features)?;
        validate_test_fraction(test_fraction)?;

        let labels = binarize_target(target_column);
        let positives = labels.iter().filter(|&&l| l == 1).count();
        if positives == 0 || positives == labels.len() {
            return Err(ValidationError::SingleClass(target.to_owned()).into());
        }

        let encoders = fit_encoders(table, &feature_columns);
        let mut x = align_features(table, &feature_columns, &encoders, target).matrix;
        let fill_values = column_means(&x);
        fill_missing(&mut x, &fill_values);

        let split = stratified_split(&labels, test_fraction, self.params.seed)?;
        let x_train = x.select(Axis(0), &split.train);
        let x_test = x.select(Axis(0), &split.test);
        let y_train: Vec<u8> = split.train.iter().map(|&i| labels[i]).collect();
        let y_test: Vec<u8> = split.test.iter().map(|&i| labels[i]).collect();

        debug!(
            rows = table.n_rows(),
            features = feature_columns.len(),
            train_rows = y_train.len(),
            test_rows = y_test.len(),
            positives,
            "fitting attrition forest"
        );
        let forest = RandomForest::fit(x_train.view(), &y_train, self.params)?;

        let train_pred: Vec<u8> = forest
            .predict_positive(x_train.view())
            .into_iter()
            .map(label_of)
            .collect();
        let test_scores = forest.predict_positive(x_test.view());
        let test_pred: Vec<u8> = test_scores.iter().copied().map(label_of).collect();
        let confusion = confusion_matrix(&y_test, &test_pred);
        let (precision, recall, f1) = precision_recall_f1(&confusion);

        let metrics = ModelMetrics {
            train_accuracy: accuracy(&y_train, &train_pred),
            test_accuracy: accuracy(&y_test, &test_pred),
            precision,
            recall,
            f1,
            roc_auc: roc_auc(&y_test, &test_scores),
            confusion_matrix: confusion,
            feature_importance: rank_importances(&feature_columns, forest.feature_importances()),
            train_rows: y_train.len(),
            test_rows: y_test.len(),
        };

        info!(
            target_column = target,
            features = feature_columns.len(),
            test_accuracy = metrics.test_accuracy,
            roc_auc = ?metrics.roc_auc,
            "attrition model trained"
        );

        let fitted = self.fitted.insert(FittedState {
            target: target.to_owned(),
            feature_columns,
            encoders,
            fill_values,
            forest,
            metrics,
            trained_at: Utc::now(),
        });
        Ok(&fitted.metrics)
    }

    fn prepare(&self, fitted: &FittedState, table: &EmployeeTable) -> Array2<f64> {
        let aligned = align_features(
            table,
            &fitted.feature_columns,
            &fitted.encoders,
            &fitted.target,
        );
        if !aligned.synthesized.is_empty() {
            warn!(
                missing = ?aligned.synthesized,
                "input lacks model features, using zero columns"
            );
        }
        if !aligned.ignored.is_empty() {
            debug!(ignored = ?aligned.ignored, "input columns unknown to the model");
        }
        let mut x = aligned.matrix;
        fill_missing(&mut x, &fitted.fill_values);
        x
    }

    /// `N × 2` probabilities `[P(stay), P(leave)]`, rows in input order.
    pub fn predict_proba(&self, table: &EmployeeTable) -> Result<Array2<f64>, AttritionError> {
        let fitted = self.require_fitted("making predictions")?;
        let x = self.prepare(fitted, table);
        Ok(fitted.forest.predict_proba(x.view()))
    }

    /// Probability of leaving for every row.
    pub fn positive_probabilities(&self, table: &EmployeeTable) -> Result<Vec<f64>, AttritionError> {
        let fitted = self.require_fitted("making predictions")?;
        let x = self.prepare(fitted, table);
        Ok(fitted.forest.predict_positive(x.view()))
    }

    pub fn predict(&self, table: &EmployeeTable) -> Result<Vec<u8>, AttritionError> {
        Ok(self
            .positive_probabilities(table)?
            .into_iter()
            .map(label_of)
            .collect())
    }

    /// The `top_n` most important features, highest first.
    pub fn feature_importance(&self, top_n: usize) -> Result<Vec<FeatureImportance>, NotTrainedError> {
        let fitted = self.require_fitted("getting feature importance")?;
        Ok(fitted
            .metrics
            .feature_importance
            .iter()
            .take(top_n)
            .cloned()
            .collect())
    }

    /// Writes the fitted model as versioned JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf, AttritionError> {
        self.require_fitted("saving")?;
        let path = path.as_ref();
        write_json_file(
            path,
            &ArtifactOut {
                format_version: ARTIFACT_FORMAT_VERSION,
                model: self,
            },
        )?;
        info!(path = %path.display(), "model artifact saved");
        Ok(path.to_path_buf())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AttritionError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|source| AttritionError::io(path, source))?;
        let version: ArtifactVersion = serde_json::from_str(&text)?;
        if version.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(AttritionError::UnsupportedArtifactVersion {
                found: version.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }
        let artifact: ArtifactIn = serde_json::from_str(&text)?;
        debug!(
            path = %path.display(),
            trained = artifact.model.is_trained(),
            "model artifact loaded"
        );
        Ok(artifact.model)
    }
}
