mod common;

use common::*;
use hr_attrition::{PredictionKind, RiskSelection};
use hr_cli::commands::{self, ExportFormat, PredictOptions};
use hr_store::InterviewStore;

// ---------------------------------------------------------------------------
// Training and prediction
// ---------------------------------------------------------------------------

#[test]
fn test_train_then_predict_top_n() {
    let mut app = TestApp::new();
    let data = app.employees();

    let mut out = Vec::new();
    let outcome =
        commands::run_train(&mut app.ctx, &data, "initial fit", &mut out).expect("training");
    let printed = output(out);
    assert!(printed.contains("Model trained"));
    assert!(printed.contains(&outcome.run_id.to_string()));
    assert_eq!(outcome.metrics.train_rows + outcome.metrics.test_rows, EMPLOYEE_ROWS);
    assert!(app.path().join("model").join("attrition_model.v1.json").exists());
    assert!(app.path().join("model").join("model_metadata.json").exists());

    let mut out = Vec::new();
    let options = PredictOptions {
        selection: Some(RiskSelection::TopN(5)),
        ..PredictOptions::default()
    };
    commands::run_predict(&mut app.ctx, &data, &options, &mut out).expect("prediction");
    let printed = output(out);
    assert!(printed.contains("Top 5 employees by attrition probability"));
    assert!(printed.contains("Risk summary"));
    assert!(printed.contains(&format!("employees            {EMPLOYEE_ROWS}")));
}

#[test]
fn test_predict_raw_probabilities_one_per_row() {
    let mut app = TestApp::new();
    let data = app.employees();
    commands::run_train(&mut app.ctx, &data, "", &mut Vec::new()).expect("training");

    let mut out = Vec::new();
    let options = PredictOptions {
        raw: Some(PredictionKind::Probabilities),
        ..PredictOptions::default()
    };
    commands::run_predict(&mut app.ctx, &data, &options, &mut out).expect("prediction");
    let printed = output(out);
    let values: Vec<f64> = printed
        .lines()
        .map(|l| l.trim().parse().expect("probability"))
        .collect();
    assert_eq!(values.len(), EMPLOYEE_ROWS);
    assert!(values.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn test_predict_without_model_fails() {
    let mut app = TestApp::new();
    let data = app.employees();

    let err = commands::run_predict(&mut app.ctx, &data, &PredictOptions::default(), &mut Vec::new())
        .expect_err("no model yet");
    assert!(format!("{err:#}").contains("run `hr train` first"));
}

#[test]
fn test_predict_rejects_invalid_threshold() {
    let mut app = TestApp::new();
    let data = app.employees();
    commands::run_train(&mut app.ctx, &data, "", &mut Vec::new()).expect("training");

    let options = PredictOptions {
        selection: Some(RiskSelection::Threshold(1.5)),
        ..PredictOptions::default()
    };
    assert!(commands::run_predict(&mut app.ctx, &data, &options, &mut Vec::new()).is_err());
}

#[test]
fn test_predict_export_writes_report() {
    let mut app = TestApp::new();
    let data = app.employees();
    commands::run_train(&mut app.ctx, &data, "", &mut Vec::new()).expect("training");

    let export_dir = app.path().join("reports");
    let options = PredictOptions {
        selection: Some(RiskSelection::Threshold(0.0)),
        export_dir: Some(export_dir.clone()),
        ..PredictOptions::default()
    };
    let mut out = Vec::new();
    commands::run_predict(&mut app.ctx, &data, &options, &mut out).expect("prediction");
    assert!(output(out).contains("Results written to"));

    let mut files: Vec<String> = std::fs::read_dir(&export_dir)
        .expect("export dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files.len(), 2);
    assert!(files[0].starts_with("attrition_risk_"));
    assert!(files[1].ends_with("_summary.csv"));

    let results = std::fs::read_to_string(export_dir.join(&files[0])).expect("results csv");
    let mut lines = results.lines();
    let header = lines.next().expect("header");
    assert!(header.starts_with("EmployeeNumber,Department,JobRole,MonthlyIncome,YearsAtCompany,Age"));
    assert!(header.ends_with("pred_attrition_prob,pred_attrition_label"));
    assert_eq!(lines.count(), EMPLOYEE_ROWS);
}

#[test]
fn test_predict_export_failure_is_not_fatal() {
    let mut app = TestApp::new();
    let data = app.employees();
    commands::run_train(&mut app.ctx, &data, "", &mut Vec::new()).expect("training");

    let blocker = app.path().join("blocker");
    std::fs::write(&blocker, "not a directory").expect("write blocker");
    let options = PredictOptions {
        selection: Some(RiskSelection::TopN(3)),
        export_dir: Some(blocker.join("reports")),
        ..PredictOptions::default()
    };
    let mut out = Vec::new();
    commands::run_predict(&mut app.ctx, &data, &options, &mut out).expect("prediction still ok");
    assert!(output(out).contains("Export failed"));
}

// ---------------------------------------------------------------------------
// Training runs
// ---------------------------------------------------------------------------

#[test]
fn test_training_run_is_recorded() {
    let mut app = TestApp::new();
    let data = app.employees();
    let outcome =
        commands::run_train(&mut app.ctx, &data, "baseline", &mut Vec::new()).expect("training");

    let latest = app
        .ctx
        .store()
        .latest_training_run()
        .expect("query")
        .expect("recorded run");
    assert_eq!(latest.run_id, outcome.run_id);
    assert_eq!(latest.notes, "baseline");
    assert_eq!(latest.dataset_size, EMPLOYEE_ROWS as u64);
    assert_eq!(latest.test_accuracy, outcome.metrics.test_accuracy);
    assert_eq!(latest.training_params["target"], "Attrition");
    assert!(!latest.feature_importance.is_empty());

    let mut out = Vec::new();
    commands::run_runs_list(&app.ctx, &mut out).expect("list runs");
    assert!(output(out).contains("baseline"));
}

#[test]
fn test_runs_delete() {
    let mut app = TestApp::new();
    let data = app.employees();
    let outcome = commands::run_train(&mut app.ctx, &data, "", &mut Vec::new()).expect("training");

    assert!(commands::run_runs_delete(&app.ctx, &outcome.run_id, &mut Vec::new()).expect("delete"));
    assert!(!commands::run_runs_delete(&app.ctx, &outcome.run_id, &mut Vec::new()).expect("delete"));

    let mut out = Vec::new();
    commands::run_runs_latest(&app.ctx, &mut out).expect("latest");
    assert!(output(out).contains("No training runs recorded"));
}

#[test]
fn test_retrain_elsewhere_refreshes_cached_model() {
    let mut app = TestApp::new();
    let data = app.employees();
    commands::run_train(&mut app.ctx, &data, "first", &mut Vec::new()).expect("training");
    let first = app
        .ctx
        .predictor()
        .expect("cached model")
        .trained_at()
        .expect("timestamp");

    let mut other = app.reopen();
    std::thread::sleep(std::time::Duration::from_millis(10));
    commands::run_train(&mut other, &data, "second", &mut Vec::new()).expect("retraining");

    let refreshed = app
        .ctx
        .predictor()
        .expect("reloaded model")
        .trained_at()
        .expect("timestamp");
    assert!(refreshed > first);
    assert_eq!(app.ctx.store().list_training_runs().expect("runs").len(), 2);
}

// ---------------------------------------------------------------------------
// Interview sessions
// ---------------------------------------------------------------------------

#[test]
fn test_rank_saved_session_with_weights() {
    let app = TestApp::new();
    app.ctx
        .store()
        .save_session(&sample_session())
        .expect("save session");

    let ranked = commands::run_rank(&app.ctx, SESSION_NAME, &[], &mut Vec::new()).expect("rank");
    let names: Vec<&str> = ranked.rows.iter().map(|r| r.candidate.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Chen", "Bob"]);

    let mut out = Vec::new();
    let ranked = commands::run_rank(
        &app.ctx,
        SESSION_NAME,
        &[("Communication".to_owned(), 1.0)],
        &mut out,
    )
    .expect("rank");
    assert_eq!(ranked.top().expect("top").candidate.name, "Bob");
    assert!(output(out).contains("Leadership"));
}

#[test]
fn test_rank_unknown_session_fails() {
    let app = TestApp::new();
    let err = commands::run_rank(&app.ctx, "nope", &[], &mut Vec::new()).expect_err("missing");
    assert!(err.to_string().contains("no session named 'nope'"));
}

#[test]
fn test_sessions_export_and_delete() {
    let app = TestApp::new();
    app.ctx
        .store()
        .save_session(&sample_session())
        .expect("save session");

    let mut out = Vec::new();
    commands::run_sessions_list(&app.ctx, &mut out).expect("list");
    assert!(output(out).contains("3 candidate(s)"));

    let json_path = app.path().join("exports").join("q3.json");
    let written = commands::run_sessions_export(
        &app.ctx,
        SESSION_NAME,
        ExportFormat::Json,
        &json_path,
        &mut Vec::new(),
    )
    .expect("export")
    .expect("written");
    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(written).expect("read json"))
            .expect("valid json");
    assert_eq!(exported["name"], SESSION_NAME);
    assert_eq!(exported["candidates"].as_array().expect("candidates").len(), 3);

    assert!(commands::run_sessions_delete(&app.ctx, SESSION_NAME, &mut Vec::new()).expect("delete"));
    let mut out = Vec::new();
    assert!(!commands::run_sessions_delete(&app.ctx, SESSION_NAME, &mut out).expect("delete"));
    assert!(output(out).contains("No session named"));
}

#[test]
fn test_session_export_failure_is_not_fatal() {
    let app = TestApp::new();
    app.ctx
        .store()
        .save_session(&sample_session())
        .expect("save session");

    let blocker = app.path().join("blocker");
    std::fs::write(&blocker, "file").expect("write blocker");
    let mut out = Vec::new();
    let written = commands::run_sessions_export(
        &app.ctx,
        SESSION_NAME,
        ExportFormat::Csv,
        &blocker.join("q3.csv"),
        &mut out,
    )
    .expect("non-fatal");
    assert!(written.is_none());
    assert!(output(out).contains("Export failed"));
}
