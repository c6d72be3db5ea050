use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub training: TrainingSection,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reads `path` when it exists; all defaults otherwise.
    pub fn from_file_or_default(path: &Path) -> Result<Self, anyhow::Error> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "data/interviews.db".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub directory: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            directory: "model".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub target: String,
    /// Explicit feature list; every numeric column but the target when absent.
    pub features: Option<Vec<String>>,
    pub test_fraction: f64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            target: "Attrition".to_owned(),
            features: None,
            test_fraction: 0.2,
            n_estimators: 200,
            max_depth: 15,
            min_samples_split: 10,
            min_samples_leaf: 4,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub mode: RiskModeConfig,
    pub top_n: usize,
    pub threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            mode: RiskModeConfig::default(),
            top_n: 20,
            threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RiskModeConfig {
    #[default]
    TopN,
    Threshold,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormatConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormatConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormatConfig {
    Json,
    #[default]
    Pretty,
    Compact,
}
