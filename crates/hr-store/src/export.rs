use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use hr_core::core::{Candidate, ExportError, InterviewSession};
use serde::Serialize;

const BASE_COLUMNS: [&str; 10] = [
    "id",
    "name",
    "email",
    "position",
    "experience_years",
    "phone",
    "notes",
    "added_at",
    "score",
    "feedback",
];

/// Header of the flat roster export: base columns, then one per declared custom metric.
pub fn session_csv_header(session: &InterviewSession) -> Vec<String> {
    BASE_COLUMNS
        .iter()
        .map(|c| (*c).to_owned())
        .chain(session.custom_metrics.iter().cloned())
        .collect()
}

fn candidate_row(candidate: &Candidate, custom_metrics: &[String]) -> Vec<String> {
    let mut row = vec![
        candidate.id.to_string(),
        candidate.name.clone(),
        candidate.email.clone().unwrap_or_default(),
        candidate.position.clone(),
        candidate.experience_years.to_string(),
        candidate.phone.clone().unwrap_or_default(),
        candidate.notes.clone(),
        candidate.created_at.to_rfc3339(),
        candidate.score.map(|s| s.to_string()).unwrap_or_default(),
        candidate.feedback.clone().unwrap_or_default(),
    ];
    row.extend(custom_metrics.iter().map(|metric| {
        candidate
            .scores
            .get(metric)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }));
    row
}

/// Writes one row per candidate. Missing values become empty cells.
pub fn write_session_csv<W: Write>(
    session: &InterviewSession,
    writer: W,
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(session_csv_header(session))
        .map_err(encode_error)?;
    for candidate in &session.candidates {
        csv_writer
            .write_record(candidate_row(candidate, &session.custom_metrics))
            .map_err(encode_error)?;
    }
    csv_writer
        .flush()
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    Ok(())
}

/// Writes the roster CSV to `path`, creating parent directories.
pub fn export_session_csv(
    session: &InterviewSession,
    path: impl AsRef<Path>,
) -> Result<PathBuf, ExportError> {
    let path = path.as_ref();
    let file = create_file(path)?;
    write_session_csv(session, file)?;
    tracing::info!(
        path = %path.display(),
        candidates = session.candidates.len(),
        "session exported as csv"
    );
    Ok(path.to_path_buf())
}

#[derive(Serialize)]
struct SessionJson<'a> {
    #[serde(flatten)]
    session: &'a InterviewSession,
    metrics: Vec<String>,
}

/// Pretty JSON document of the full session, including its resolved metric list.
pub fn export_session_json(
    session: &InterviewSession,
    path: impl AsRef<Path>,
) -> Result<PathBuf, ExportError> {
    let path = path.as_ref();
    let doc = SessionJson {
        session,
        metrics: session.all_metrics(),
    };
    let json =
        serde_json::to_string_pretty(&doc).map_err(|err| ExportError::Encode(err.to_string()))?;
    let mut file = create_file(path)?;
    file.write_all(json.as_bytes())
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(path = %path.display(), "session exported as json");
    Ok(path.to_path_buf())
}

fn create_file(path: &Path) -> Result<File, ExportError> {
    let io_error = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    File::create(path).map_err(io_error)
}

fn encode_error(err: csv::Error) -> ExportError {
    ExportError::Encode(err.to_string())
}
