use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AttritionError;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;
pub const ARTIFACT_FILE_NAME: &str = "attrition_model.v1.json";
pub const METADATA_FILE_NAME: &str = "model_metadata.json";

/// Locations of the model artifact and its metadata sidecar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelPaths {
    pub artifact: PathBuf,
    pub metadata: PathBuf,
}

impl ModelPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            artifact: dir.join(ARTIFACT_FILE_NAME),
            metadata: dir.join(METADATA_FILE_NAME),
        }
    }

    pub fn artifact_exists(&self) -> bool {
        self.artifact.is_file()
    }
}

fn default_format_version() -> u32 {
    ARTIFACT_FORMAT_VERSION
}

/// Sidecar describing how a model was trained, readable without the artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub features: Vec<String>,
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub test_size: f64,
    pub n_samples: usize,
    pub n_features: usize,
    #[serde(default)]
    pub train_rows: usize,
    #[serde(default)]
    pub test_rows: usize,
    #[serde(default = "default_format_version")]
    pub format_version: u32,
}

impl ModelMetadata {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AttritionError> {
        write_json_file(path.as_ref(), self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AttritionError> {
        read_json_file(path.as_ref())
    }

    /// Like [`ModelMetadata::load`], but a missing file is `Ok(None)`.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>, AttritionError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }
}

pub(crate) fn write_json_file<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), AttritionError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| AttritionError::io(parent, source))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|source| AttritionError::io(path, source))
}

pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, AttritionError> {
    let text = std::fs::read_to_string(path).map_err(|source| AttritionError::io(path, source))?;
    Ok(serde_json::from_str(&text)?)
}
