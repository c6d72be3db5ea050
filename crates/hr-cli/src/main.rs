use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use hr_attrition::{PredictionKind, RiskSelection};
use hr_cli::bootstrap::{self, RuntimeConfig};
use hr_cli::commands::{self, ExportFormat, PredictOptions};
use hr_cli::config::AppConfig;
use hr_cli::context::AppContext;
use hr_cli::{logging, shell};
use tracing::debug;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "hr", about = "HR analytics: attrition risk and interview scoring")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = "hr.toml", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Validate configuration file and exit.
    Validate,
    /// Train the attrition model on an employee dataset (CSV or JSON).
    Train {
        #[arg(long)]
        data: PathBuf,
        /// Target column; overrides `training.target`.
        #[arg(long)]
        target: Option<String>,
        /// Comma-separated feature columns; overrides `training.features`.
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,
        /// Held-out fraction; overrides `training.test_fraction`.
        #[arg(long)]
        test_fraction: Option<f64>,
        /// Free-text note stored with the training run.
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Score employees with the trained model and list those most at risk.
    Predict {
        #[arg(long)]
        data: PathBuf,
        /// Show the N highest-risk employees.
        #[arg(long, conflicts_with = "threshold")]
        top_n: Option<usize>,
        /// Show employees at or above this probability.
        #[arg(long)]
        threshold: Option<f64>,
        /// Print one raw prediction per row instead of a selection.
        #[arg(long, value_enum)]
        raw: Option<RawKind>,
        /// Write results and summary CSVs into this directory.
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Rank the candidates of a saved interview session.
    Rank {
        /// Session name.
        session: String,
        /// Metric weight as METRIC=WEIGHT; repeatable.
        #[arg(short, long = "weight", value_parser = commands::parse_weight)]
        weights: Vec<(String, f64)>,
    },
    /// Manage saved interview sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
    /// Inspect recorded training runs.
    Runs {
        #[command(subcommand)]
        action: RunsCommand,
    },
    /// Interactive interview session shell.
    Interview,
}

#[derive(Subcommand)]
enum SessionsCommand {
    List,
    Show {
        name: String,
    },
    Export {
        name: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
enum RunsCommand {
    List,
    Latest,
    Delete { run_id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum RawKind {
    Labels,
    Probabilities,
}

impl From<RawKind> for PredictionKind {
    fn from(kind: RawKind) -> Self {
        match kind {
            RawKind::Labels => PredictionKind::Labels,
            RawKind::Probabilities => PredictionKind::Probabilities,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = if let Command::Validate = cli.command {
        run_validate(&cli.config)
    } else {
        run(cli)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("Error: {e:#}").red());
            ExitCode::FAILURE
        }
    }
}

fn run_validate(path: &Path) -> Result<(), anyhow::Error> {
    bootstrap::validate_file(path)?;
    println!("Config valid: {}", path.display());
    Ok(())
}

fn apply_training_overrides(
    runtime: &mut RuntimeConfig,
    target: Option<String>,
    features: Vec<String>,
    test_fraction: Option<f64>,
) {
    if let Some(target) = target {
        runtime.training.target = target;
    }
    if !features.is_empty() {
        runtime.training.features = Some(features);
    }
    if let Some(fraction) = test_fraction {
        runtime.training.test_fraction = fraction;
    }
}

fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let config = AppConfig::from_file_or_default(&cli.config)?;
    let mut runtime = bootstrap::into_runtime(config)?;
    logging::init_logging(&runtime.log_level, runtime.log_format)?;
    debug!(config = %cli.config.display(), "configuration loaded");

    if let Command::Train {
        target,
        features,
        test_fraction,
        ..
    } = &cli.command
    {
        apply_training_overrides(
            &mut runtime,
            target.clone(),
            features.clone(),
            *test_fraction,
        );
    }

    let mut ctx = AppContext::open(runtime)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Validate => {}
        Command::Train { data, notes, .. } => {
            commands::run_train(&mut ctx, &data, &notes, &mut out)?;
        }
        Command::Predict {
            data,
            top_n,
            threshold,
            raw,
            export_dir,
        } => {
            let selection = match (top_n, threshold) {
                (Some(n), _) => Some(RiskSelection::TopN(n)),
                (None, Some(cutoff)) => Some(RiskSelection::Threshold(cutoff)),
                (None, None) => None,
            };
            let options = PredictOptions {
                selection,
                raw: raw.map(PredictionKind::from),
                export_dir,
            };
            commands::run_predict(&mut ctx, &data, &options, &mut out)?;
        }
        Command::Rank { session, weights } => {
            commands::run_rank(&ctx, &session, &weights, &mut out)?;
        }
        Command::Sessions { action } => match action {
            SessionsCommand::List => commands::run_sessions_list(&ctx, &mut out)?,
            SessionsCommand::Show { name } => commands::run_sessions_show(&ctx, &name, &mut out)?,
            SessionsCommand::Export { name, out: path, format } => {
                commands::run_sessions_export(&ctx, &name, format, &path, &mut out)?;
            }
            SessionsCommand::Delete { name } => {
                commands::run_sessions_delete(&ctx, &name, &mut out)?;
            }
        },
        Command::Runs { action } => match action {
            RunsCommand::List => commands::run_runs_list(&ctx, &mut out)?,
            RunsCommand::Latest => commands::run_runs_latest(&ctx, &mut out)?,
            RunsCommand::Delete { run_id } => {
                commands::run_runs_delete(&ctx, &run_id, &mut out)?;
            }
        },
        Command::Interview => {
            drop(out);
            shell::run_shell(&mut ctx, io::stdin().lock(), io::stdout())?;
            return Ok(());
        }
    }
    out.flush()?;
    Ok(())
}
