use std::path::PathBuf;

use hr_core::core::{ExportError, NotTrainedError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum AttritionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotTrained(#[from] NotTrainedError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported model artifact version {found} (expected {expected})")]
    UnsupportedArtifactVersion { found: u32, expected: u32 },
    #[error("malformed dataset: {0}")]
    MalformedDataset(String),
}

impl AttritionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
