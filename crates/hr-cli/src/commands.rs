use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use hr_attrition::report::{label_text, IDENTITY_COLUMNS};
use hr_attrition::{
    select_at_risk, EmployeeTable, PredictionKind, Predictions, RiskReport, RiskSelection,
    RiskSummary, TrainingOutcome,
};
use hr_core::core::{InterviewSession, RankedTable, Weights};
use hr_store::{export_session_csv, export_session_json, InterviewStore, TrainingRun};
use uuid::Uuid;

use crate::context::AppContext;

pub fn load_table(path: &Path) -> Result<EmployeeTable, anyhow::Error> {
    EmployeeTable::load(path).with_context(|| format!("loading dataset {}", path.display()))
}

/// Parses a `metric=weight` pair. The metric may contain spaces.
pub fn parse_weight(raw: &str) -> Result<(String, f64), String> {
    let (metric, weight) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected METRIC=WEIGHT, got '{raw}'"))?;
    let metric = metric.trim();
    if metric.is_empty() {
        return Err(format!("missing metric name in '{raw}'"));
    }
    let weight: f64 = weight
        .trim()
        .parse()
        .map_err(|_| format!("weight in '{raw}' is not a number"))?;
    Ok((metric.to_owned(), weight))
}

/// `None` for an empty list, so ranking falls back to equal weights.
pub fn build_weights(pairs: &[(String, f64)]) -> Result<Option<Weights>, anyhow::Error> {
    if pairs.is_empty() {
        return Ok(None);
    }
    Ok(Some(Weights::from_pairs(pairs.iter().cloned())?))
}

// ---------------------------------------------------------------------------
// train
// ---------------------------------------------------------------------------

pub fn run_train(
    ctx: &mut AppContext,
    data: &Path,
    notes: &str,
    out: &mut impl Write,
) -> Result<TrainingOutcome, anyhow::Error> {
    let table = load_table(data)?;
    let outcome = ctx.train(&table, notes)?;
    let metrics = &outcome.metrics;

    writeln!(out, "{}", "Model trained".bright_green().bold())?;
    writeln!(out, "  run id          {}", outcome.run_id)?;
    writeln!(
        out,
        "  rows            {} train / {} test",
        metrics.train_rows, metrics.test_rows
    )?;
    writeln!(out, "  train accuracy  {:.3}", metrics.train_accuracy)?;
    writeln!(out, "  test accuracy   {:.3}", metrics.test_accuracy)?;
    writeln!(out, "  precision       {:.3}", metrics.precision)?;
    writeln!(out, "  recall          {:.3}", metrics.recall)?;
    writeln!(out, "  f1              {:.3}", metrics.f1)?;
    match metrics.roc_auc {
        Some(auc) => writeln!(out, "  roc auc         {auc:.3}")?,
        None => writeln!(out, "  roc auc         n/a (single class in test split)")?,
    }
    let [[tn, fp], [fn_, tp]] = metrics.confusion_matrix;
    writeln!(out, "  confusion       tn={tn} fp={fp} fn={fn_} tp={tp}")?;
    writeln!(out, "{}", "Top features".bold())?;
    for item in metrics.feature_importance.iter().take(10) {
        writeln!(out, "  {:<28} {:.4}", item.feature, item.importance)?;
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// predict
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct PredictOptions {
    /// Overrides the configured selection.
    pub selection: Option<RiskSelection>,
    /// Print one raw prediction per row instead of a risk selection.
    pub raw: Option<PredictionKind>,
    /// Write the results and summary CSVs here.
    pub export_dir: Option<PathBuf>,
}

pub fn run_predict(
    ctx: &mut AppContext,
    data: &Path,
    options: &PredictOptions,
    out: &mut impl Write,
) -> Result<(), anyhow::Error> {
    let table = load_table(data)?;
    let selection = options.selection.unwrap_or(ctx.runtime.risk_selection);
    let predictor = ctx.predictor()?;

    if let Some(kind) = options.raw {
        match predictor.predict(&table, kind)? {
            Predictions::Labels(labels) => {
                for label in labels {
                    writeln!(out, "{label}")?;
                }
            }
            Predictions::Probabilities(probabilities) => {
                for p in probabilities {
                    writeln!(out, "{p:.6}")?;
                }
            }
        }
        return Ok(());
    }

    let probabilities = predictor.probabilities(&table)?;
    let summary = RiskSummary::from_probabilities(&probabilities);
    let rows = select_at_risk(&probabilities, selection)?;

    writeln!(out, "{}", selection.describe().bold())?;
    let identity: Vec<&str> = IDENTITY_COLUMNS
        .into_iter()
        .filter(|c| table.has_column(c))
        .take(3)
        .collect();
    for row in &rows {
        let who: Vec<String> = identity
            .iter()
            .map(|c| {
                table
                    .cell(row.index, c)
                    .map(ToString::to_string)
                    .unwrap_or_default()
            })
            .collect();
        let label = if row.label == 1 {
            label_text(row.label).red().to_string()
        } else {
            label_text(row.label).green().to_string()
        };
        writeln!(
            out,
            "  #{:<5} {:<40} {:>6.1}%  {}",
            row.index,
            who.join(" | "),
            row.probability * 100.0,
            label
        )?;
    }
    if rows.is_empty() {
        writeln!(out, "{}", "No employees match the selected criteria".yellow())?;
    }
    write_summary(&summary, out)?;

    if let Some(dir) = &options.export_dir {
        let report = RiskReport::new(&table, selection, rows, summary);
        match report.export(dir) {
            Ok(paths) => {
                writeln!(out, "Results written to {}", paths.results.display())?;
                writeln!(out, "Summary written to {}", paths.summary.display())?;
            }
            Err(e) => writeln!(out, "{}", format!("Export failed: {e}").yellow())?,
        }
    }
    Ok(())
}

fn write_summary(summary: &RiskSummary, out: &mut impl Write) -> Result<(), anyhow::Error> {
    writeln!(out, "{}", "Risk summary".bold())?;
    writeln!(out, "  employees            {}", summary.total)?;
    writeln!(
        out,
        "  average risk         {:.1}%",
        summary.mean_probability * 100.0
    )?;
    writeln!(
        out,
        "  predicted attrition  {} ({:.1}%)",
        summary.predicted_attrition, summary.attrition_percent
    )?;
    if let Some(q) = summary.quartiles {
        writeln!(
            out,
            "  min/q1/median/q3/max {:.3} / {:.3} / {:.3} / {:.3} / {:.3}",
            q.min, q.q1, q.median, q.q3, q.max
        )?;
    }
    let b = summary.buckets;
    writeln!(
        out,
        "  buckets              low {} | medium {} | high {} | very high {}",
        b.low, b.medium, b.high, b.very_high
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// rank / sessions
// ---------------------------------------------------------------------------

pub fn write_ranking(ranked: &RankedTable, out: &mut impl Write) -> Result<(), anyhow::Error> {
    if ranked.is_empty() {
        writeln!(out, "{}", "No candidates to rank".yellow())?;
        return Ok(());
    }
    let mut header = format!("{:<5} {:<24} {:<20} {:>8}", "Rank", "Name", "Position", "Score");
    for metric in &ranked.metrics {
        header.push_str(&format!(" {metric:>12}"));
    }
    writeln!(out, "{}", header.bold())?;
    for row in &ranked.rows {
        let mut line = format!(
            "{:<5} {:<24} {:<20} {:>8.2}",
            row.rank, row.candidate.name, row.candidate.position, row.weighted_score
        );
        for metric in &ranked.metrics {
            match row.metric_values.get(metric).copied().flatten() {
                Some(v) => line.push_str(&format!(" {v:>12.1}")),
                None => line.push_str(&format!(" {:>12}", "-")),
            }
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn find_session(ctx: &AppContext, name: &str) -> Result<InterviewSession, anyhow::Error> {
    ctx.store()
        .find_session_by_name(name)?
        .with_context(|| format!("no session named '{name}'"))
}

pub fn run_rank(
    ctx: &AppContext,
    session_name: &str,
    weights: &[(String, f64)],
    out: &mut impl Write,
) -> Result<RankedTable, anyhow::Error> {
    let session = find_session(ctx, session_name)?;
    let weights = build_weights(weights)?;
    let ranked = session.rank(weights.as_ref());
    write_ranking(&ranked, out)?;
    Ok(ranked)
}

pub fn run_sessions_list(ctx: &AppContext, out: &mut impl Write) -> Result<(), anyhow::Error> {
    let sessions = ctx.store().list_sessions()?;
    if sessions.is_empty() {
        writeln!(out, "No saved sessions")?;
        return Ok(());
    }
    for s in sessions {
        writeln!(
            out,
            "{:>4}  {:<28} {}  {:<20} {} candidate(s)",
            s.id,
            s.name.bold(),
            s.date,
            s.interviewer,
            s.candidate_count
        )?;
    }
    Ok(())
}

pub fn write_session(session: &InterviewSession, out: &mut impl Write) -> Result<(), anyhow::Error> {
    writeln!(out, "{}", session.name.bold())?;
    writeln!(out, "  date         {}", session.date)?;
    writeln!(out, "  interviewer  {}", session.interviewer)?;
    if !session.notes.is_empty() {
        writeln!(out, "  notes        {}", session.notes)?;
    }
    writeln!(out, "  metrics      {}", session.all_metrics().join(", "))?;
    writeln!(out, "  candidates   {}", session.candidates.len())?;
    for c in &session.candidates {
        let overall = c
            .score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_owned());
        writeln!(
            out,
            "    {:<38} {:<24} {:<20} overall {}",
            c.id.as_str().dimmed(),
            c.name,
            c.position,
            overall
        )?;
    }
    Ok(())
}

pub fn run_sessions_show(
    ctx: &AppContext,
    name: &str,
    out: &mut impl Write,
) -> Result<(), anyhow::Error> {
    let session = find_session(ctx, name)?;
    write_session(&session, out)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

/// Export failures are reported on `out`, never returned.
pub fn export_session(
    session: &InterviewSession,
    format: ExportFormat,
    path: &Path,
    out: &mut impl Write,
) -> Result<Option<PathBuf>, anyhow::Error> {
    let result = match format {
        ExportFormat::Csv => export_session_csv(session, path),
        ExportFormat::Json => export_session_json(session, path),
    };
    match result {
        Ok(written) => {
            writeln!(out, "Exported '{}' to {}", session.name, written.display())?;
            Ok(Some(written))
        }
        Err(e) => {
            writeln!(out, "{}", format!("Export failed: {e}").yellow())?;
            Ok(None)
        }
    }
}

pub fn run_sessions_export(
    ctx: &AppContext,
    name: &str,
    format: ExportFormat,
    path: &Path,
    out: &mut impl Write,
) -> Result<Option<PathBuf>, anyhow::Error> {
    let session = find_session(ctx, name)?;
    export_session(&session, format, path, out)
}

pub fn run_sessions_delete(
    ctx: &AppContext,
    name: &str,
    out: &mut impl Write,
) -> Result<bool, anyhow::Error> {
    let Some(id) = ctx.store().find_session_by_name(name)?.and_then(|s| s.id) else {
        writeln!(out, "No session named '{name}'")?;
        return Ok(false);
    };
    let deleted = ctx.store().delete_session(id)?;
    writeln!(out, "Deleted session '{name}'")?;
    Ok(deleted)
}

// ---------------------------------------------------------------------------
// runs
// ---------------------------------------------------------------------------

fn write_run(run: &TrainingRun, out: &mut impl Write) -> Result<(), anyhow::Error> {
    let auc = run
        .roc_auc
        .map(|v| format!("{v:.3}"))
        .unwrap_or_else(|| "n/a".to_owned());
    writeln!(
        out,
        "{}  {}  acc {:.3}  f1 {:.3}  auc {}  rows {}  {}",
        run.run_id.to_string().dimmed(),
        run.timestamp.format("%Y-%m-%d %H:%M:%S"),
        run.test_accuracy,
        run.f1_score,
        auc,
        run.dataset_size,
        run.notes
    )?;
    Ok(())
}

pub fn run_runs_list(ctx: &AppContext, out: &mut impl Write) -> Result<(), anyhow::Error> {
    let runs = ctx.store().list_training_runs()?;
    if runs.is_empty() {
        writeln!(out, "No training runs recorded")?;
    }
    for run in &runs {
        write_run(run, out)?;
    }
    Ok(())
}

pub fn run_runs_latest(ctx: &AppContext, out: &mut impl Write) -> Result<(), anyhow::Error> {
    match ctx.store().latest_training_run()? {
        Some(run) => write_run(&run, out),
        None => {
            writeln!(out, "No training runs recorded")?;
            Ok(())
        }
    }
}

pub fn run_runs_delete(
    ctx: &AppContext,
    run_id: &Uuid,
    out: &mut impl Write,
) -> Result<bool, anyhow::Error> {
    let deleted = ctx.store().delete_training_run(run_id)?;
    if deleted {
        writeln!(out, "Deleted run {run_id}")?;
    } else {
        writeln!(out, "No run {run_id}")?;
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weight() {
        assert_eq!(
            parse_weight("Technical Skills=0.75"),
            Ok(("Technical Skills".to_owned(), 0.75))
        );
        assert_eq!(parse_weight(" Projects = 2 "), Ok(("Projects".to_owned(), 2.0)));
        assert!(parse_weight("Projects").is_err());
        assert!(parse_weight("=1").is_err());
        assert!(parse_weight("Projects=high").is_err());
    }

    #[test]
    fn test_build_weights() {
        assert!(build_weights(&[]).expect("empty").is_none());
        let weights = build_weights(&[("Communication".to_owned(), 0.25)])
            .expect("valid")
            .expect("present");
        assert_eq!(weights.get("Communication"), Some(0.25));
        assert!(build_weights(&[("Communication".to_owned(), -1.0)]).is_err());
    }
}
