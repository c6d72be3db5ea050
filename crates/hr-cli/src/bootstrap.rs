use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use hr_attrition::{ForestParams, RiskSelection, TrainingConfig};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LogFormatConfig, RiskModeConfig};

// ---------------------------------------------------------------------------
// RuntimeConfig: fully validated runtime configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub database_path: PathBuf,
    pub model_dir: PathBuf,
    pub training: TrainingConfig,
    /// Selection used by `predict` when no flag overrides it.
    pub risk_selection: RiskSelection,
    pub log_level: String,
    pub log_format: LogFormatConfig,
}

// ---------------------------------------------------------------------------
// into_runtime: converts raw AppConfig into validated RuntimeConfig
// ---------------------------------------------------------------------------

pub fn into_runtime(config: AppConfig) -> Result<RuntimeConfig, anyhow::Error> {
    ensure!(
        !config.storage.database_path.trim().is_empty(),
        "storage.database_path must not be empty"
    );
    ensure!(
        !config.model.directory.trim().is_empty(),
        "model.directory must not be empty"
    );

    let training = &config.training;
    ensure!(
        !training.target.trim().is_empty(),
        "training.target must not be empty"
    );
    ensure!(
        training.test_fraction > 0.0 && training.test_fraction < 1.0,
        "training.test_fraction must be between 0 and 1 (exclusive), got {}",
        training.test_fraction
    );
    ensure!(
        training.n_estimators >= 1,
        "training.n_estimators must be at least 1"
    );
    ensure!(training.max_depth >= 1, "training.max_depth must be at least 1");
    ensure!(
        training.min_samples_split >= 2,
        "training.min_samples_split must be at least 2"
    );
    ensure!(
        training.min_samples_leaf >= 1,
        "training.min_samples_leaf must be at least 1"
    );
    if let Some(features) = &training.features {
        ensure!(
            !features.is_empty(),
            "training.features must list at least one column when set"
        );
    }

    ensure!(config.risk.top_n >= 1, "risk.top_n must be at least 1");
    ensure!(
        (0.0..=1.0).contains(&config.risk.threshold),
        "risk.threshold must be between 0 and 1, got {}",
        config.risk.threshold
    );
    ensure!(
        EnvFilter::try_new(&config.logging.level).is_ok(),
        "invalid logging.level: {}",
        config.logging.level
    );

    let risk_selection = match config.risk.mode {
        RiskModeConfig::TopN => RiskSelection::TopN(config.risk.top_n),
        RiskModeConfig::Threshold => RiskSelection::Threshold(config.risk.threshold),
    };

    let training = TrainingConfig {
        target: config.training.target,
        features: config.training.features,
        test_fraction: config.training.test_fraction,
        forest: ForestParams {
            n_estimators: config.training.n_estimators,
            max_depth: config.training.max_depth,
            min_samples_split: config.training.min_samples_split,
            min_samples_leaf: config.training.min_samples_leaf,
            seed: config.training.seed,
        },
    };

    Ok(RuntimeConfig {
        database_path: PathBuf::from(config.storage.database_path),
        model_dir: PathBuf::from(config.model.directory),
        training,
        risk_selection,
        log_level: config.logging.level,
        log_format: config.logging.format,
    })
}

/// Strict check behind `hr validate`: the file must exist, parse and convert.
pub fn validate_file(path: &Path) -> Result<RuntimeConfig, anyhow::Error> {
    let config = AppConfig::from_file(path).context("error reading config")?;
    into_runtime(config).context("config invalid")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;

    fn expect_error(config: AppConfig, needle: &str) {
        match into_runtime(config) {
            Err(e) => assert!(
                e.to_string().contains(needle),
                "error {e:?} should mention {needle}"
            ),
            Ok(_) => panic!("expected error mentioning {needle}"),
        }
    }

    #[test]
    fn test_validate_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");

        let missing = validate_file(&dir.path().join("hr.toml")).unwrap_err();
        assert!(format!("{missing:#}").contains("error reading config"));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[training]\ntest_fraction = 1.5\n").expect("write");
        let invalid = validate_file(&bad).unwrap_err();
        assert!(format!("{invalid:#}").contains("training.test_fraction"));

        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[risk]\nmode = \"threshold\"\nthreshold = 0.7\n").expect("write");
        let runtime = validate_file(&good).expect("valid file");
        assert_eq!(runtime.risk_selection, RiskSelection::Threshold(0.7));
    }

    #[test]
    fn test_valid_config_conversion() {
        let runtime = into_runtime(AppConfig::default()).expect("defaults should convert");

        assert_eq!(runtime.database_path, PathBuf::from("data/interviews.db"));
        assert_eq!(runtime.model_dir, PathBuf::from("model"));
        assert_eq!(runtime.training, TrainingConfig::default());
        assert_eq!(runtime.risk_selection, RiskSelection::TopN(20));
        assert_eq!(runtime.log_level, "info");
        assert_eq!(runtime.log_format, LogFormatConfig::Pretty);
    }

    #[test]
    fn test_threshold_mode() {
        let mut config = AppConfig::default();
        config.risk = RiskConfig {
            mode: RiskModeConfig::Threshold,
            top_n: 5,
            threshold: 0.8,
        };
        let runtime = into_runtime(config).expect("threshold config should convert");
        assert_eq!(runtime.risk_selection, RiskSelection::Threshold(0.8));
    }

    #[test]
    fn test_test_fraction_out_of_range() {
        for fraction in [0.0, 1.0, -0.2, 1.5] {
            let mut config = AppConfig::default();
            config.training.test_fraction = fraction;
            expect_error(config, "training.test_fraction");
        }
    }

    #[test]
    fn test_forest_bounds() {
        let mut config = AppConfig::default();
        config.training.n_estimators = 0;
        expect_error(config, "training.n_estimators");

        let mut config = AppConfig::default();
        config.training.min_samples_split = 1;
        expect_error(config, "training.min_samples_split");

        let mut config = AppConfig::default();
        config.training.min_samples_leaf = 0;
        expect_error(config, "training.min_samples_leaf");
    }

    #[test]
    fn test_risk_bounds() {
        let mut config = AppConfig::default();
        config.risk.top_n = 0;
        expect_error(config, "risk.top_n");

        let mut config = AppConfig::default();
        config.risk.threshold = 1.2;
        expect_error(config, "risk.threshold");
    }

    #[test]
    fn test_empty_paths_rejected() {
        let mut config = AppConfig::default();
        config.storage.database_path = " ".to_owned();
        expect_error(config, "storage.database_path");

        let mut config = AppConfig::default();
        config.model.directory = String::new();
        expect_error(config, "model.directory");
    }

    #[test]
    fn test_empty_feature_list_rejected() {
        let mut config = AppConfig::default();
        config.training.features = Some(Vec::new());
        expect_error(config, "training.features");
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.logging.level = "hr=loud".to_owned();
        expect_error(config, "invalid logging.level");
    }
}
