use std::collections::BTreeMap;

use hr_core::core::ValidationError;
use ndarray::{Array2, Axis};

use crate::dataset::{Cell, Column, EmployeeTable};
use crate::encoding::LabelEncoder;

/// Resolves the training feature list.
///
/// Without an explicit list every numeric column except `target` is used.
/// An explicit list must name existing columns only; duplicates and the
/// target itself are dropped from it.
pub fn select_features(
    table: &EmployeeTable,
    target: &str,
    requested: Option<&[String]>,
) -> Result<Vec<String>, ValidationError> {
    let features = match requested {
        Some(requested) => {
            let missing: Vec<String> = requested
                .iter()
                .filter(|f| !table.has_column(f.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(ValidationError::MissingFeatures(missing));
            }
            let mut features: Vec<String> = Vec::with_capacity(requested.len());
            for feature in requested {
                if feature != target && !features.contains(feature) {
                    features.push(feature.clone());
                }
            }
            features
        }
        None => table
            .numeric_columns()
            .into_iter()
            .filter(|c| c != target)
            .collect(),
    };
    if features.is_empty() {
        return Err(ValidationError::NoFeatures);
    }
    Ok(features)
}

/// Fits a label encoder for every feature backed by a text column.
pub fn fit_encoders(table: &EmployeeTable, features: &[String]) -> BTreeMap<String, LabelEncoder> {
    features
        .iter()
        .filter_map(|name| table.column(name))
        .filter(|column| !column.is_numeric())
        .map(|column| (column.name().to_owned(), LabelEncoder::fit(column)))
        .collect()
}

fn numeric_values(column: &Column) -> Vec<f64> {
    column
        .cells()
        .iter()
        .map(|cell| match cell {
            Cell::Number(v) => *v,
            _ => f64::NAN,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Feature alignment
// ---------------------------------------------------------------------------

/// Feature matrix laid out in a model's training-time column order.
#[derive(Clone, Debug)]
pub struct AlignedFeatures {
    /// Rows × features, NaN where a value is missing or an unseen category.
    pub matrix: Array2<f64>,
    /// Expected features absent from the input, supplied as zero columns.
    pub synthesized: Vec<String>,
    /// Numeric input columns the model does not know about.
    pub ignored: Vec<String>,
}

/// Builds the matrix for `expected` features from `table`.
///
/// Columns with a fitted encoder are label-encoded, every other present
/// column is read numerically, and the target is never used as an input.
/// Expected features the table lacks become all-zero columns.
pub fn align_features(
    table: &EmployeeTable,
    expected: &[String],
    encoders: &BTreeMap<String, LabelEncoder>,
    target: &str,
) -> AlignedFeatures {
    let n_rows = table.n_rows();
    let mut matrix = Array2::<f64>::zeros((n_rows, expected.len()));
    let mut synthesized = Vec::new();

    for (j, feature) in expected.iter().enumerate() {
        let column = table.column(feature).filter(|_| feature != target);
        let values = match (column, encoders.get(feature)) {
            (Some(column), Some(encoder)) => encoder.transform(column),
            (Some(column), None) => numeric_values(column),
            (None, _) => {
                synthesized.push(feature.clone());
                continue;
            }
        };
        for (i, value) in values.into_iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }

    let ignored = table
        .numeric_columns()
        .into_iter()
        .filter(|c| c != target && !expected.contains(c))
        .collect();

    AlignedFeatures {
        matrix,
        synthesized,
        ignored,
    }
}

// ---------------------------------------------------------------------------
// Missing-value fill
// ---------------------------------------------------------------------------

/// Mean of the present (non-NaN) values of each column; 0.0 when a column has none.
pub fn column_means(matrix: &Array2<f64>) -> Vec<f64> {
    matrix
        .axis_iter(Axis(1))
        .map(|column| {
            let (sum, count) = column
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        })
        .collect()
}

/// Replaces NaN cells of column `j` with `fill[j]`.
pub fn fill_missing(matrix: &mut Array2<f64>, fill: &[f64]) {
    for (mut column, value) in matrix.axis_iter_mut(Axis(1)).zip(fill) {
        column.mapv_inplace(|v| if v.is_nan() { *value } else { v });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
