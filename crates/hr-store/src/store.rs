use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use hr_core::core::{Candidate, CandidateId, InterviewSession, ScoreCard, SessionId};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{SessionSummary, TrainingRun};

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    date TEXT NOT NULL,
    interviewer TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    custom_metrics TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_sessions_name ON sessions(name);

CREATE TABLE IF NOT EXISTS candidates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    candidate_id TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT,
    position TEXT NOT NULL DEFAULT '',
    phone TEXT,
    experience_years REAL NOT NULL DEFAULT 0,
    notes TEXT NOT NULL DEFAULT '',
    scores TEXT,
    score REAL,
    feedback TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_candidates_session ON candidates(session_id);

CREATE TABLE IF NOT EXISTS model_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT UNIQUE NOT NULL,
    timestamp TEXT NOT NULL,
    accuracy REAL,
    precision REAL,
    recall REAL,
    f1_score REAL,
    roc_auc REAL,
    train_accuracy REAL,
    test_accuracy REAL,
    confusion_matrix TEXT NOT NULL,
    feature_importance TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    dataset_size INTEGER NOT NULL DEFAULT 0,
    training_params TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
"#;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("schema still missing after reinitialization during {operation}: {source}")]
    SchemaRecoveryFailed {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("session {0} does not exist")]
    UnknownSession(SessionId),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub trait InterviewStore {
    /// Creates any missing tables. Safe to call repeatedly.
    fn init(&self) -> Result<(), StoreError>;
    /// Inserts a new session, or replaces the stored copy when `session.id` is set.
    fn save_session(&self, session: &InterviewSession) -> Result<SessionId, StoreError>;
    fn load_session(&self, id: SessionId) -> Result<Option<InterviewSession>, StoreError>;
    fn find_session_by_name(&self, name: &str) -> Result<Option<InterviewSession>, StoreError>;
    /// All sessions, newest first.
    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError>;
    fn delete_session(&self, id: SessionId) -> Result<bool, StoreError>;
    fn delete_candidate(
        &self,
        session_id: SessionId,
        candidate_id: &CandidateId,
    ) -> Result<bool, StoreError>;
    fn record_training_run(&self, run: &TrainingRun) -> Result<(), StoreError>;
    /// All training runs, newest first.
    fn list_training_runs(&self) -> Result<Vec<TrainingRun>, StoreError>;
    fn latest_training_run(&self) -> Result<Option<TrainingRun>, StoreError>;
    fn delete_training_run(&self, run_id: &Uuid) -> Result<bool, StoreError>;
}

/// Single-file SQLite store.
///
/// Every operation opens its own connection and drops it before returning.
/// Writers in other processes are not coordinated beyond SQLite's own locking.
pub struct SqliteInterviewStore {
    path: PathBuf,
}

impl SqliteInterviewStore {
    /// Opens (creating if needed) the database file and ensures the schema exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { path };
        store.init()?;
        info!(path = %store.path.display(), "interview store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Runs `op`, reinitializing the schema and retrying once if a table is missing.
    fn with_schema<T>(
        &self,
        operation: &'static str,
        op: impl Fn(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.connect()?;
        match op(&mut conn) {
            Err(StoreError::Database(err)) if is_missing_table(&err) => {
                warn!(operation, error = %err, "schema missing, reinitializing");
                initialize_schema(&conn)?;
                op(&mut conn).map_err(|retry_err| match retry_err {
                    StoreError::Database(source) => {
                        StoreError::SchemaRecoveryFailed { operation, source }
                    }
                    other => other,
                })
            }
            result => result,
        }
    }
}

impl InterviewStore for SqliteInterviewStore {
    fn init(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        initialize_schema(&conn)
    }

    fn save_session(&self, session: &InterviewSession) -> Result<SessionId, StoreError> {
        let custom_metrics = serde_json::to_string(&session.custom_metrics)?;
        let id = self.with_schema("save_session", |conn| {
            let tx = conn.transaction()?;
            let session_id = match session.id {
                Some(id) => {
                    let updated = tx.execute(
                        "UPDATE sessions
                         SET name = ?1, date = ?2, interviewer = ?3, notes = ?4,
                             created_at = ?5, custom_metrics = ?6
                         WHERE id = ?7",
                        params![
                            session.name.as_str(),
                            session.date.to_string(),
                            session.interviewer.as_str(),
                            session.notes.as_str(),
                            session.created_at.to_rfc3339(),
                            custom_metrics.as_str(),
                            id.value(),
                        ],
                    )?;
                    if updated == 0 {
                        return Err(StoreError::UnknownSession(id));
                    }
                    tx.execute(
                        "DELETE FROM candidates WHERE session_id = ?1",
                        params![id.value()],
                    )?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO sessions (name, date, interviewer, notes, created_at, custom_metrics)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            session.name.as_str(),
                            session.date.to_string(),
                            session.interviewer.as_str(),
                            session.notes.as_str(),
                            session.created_at.to_rfc3339(),
                            custom_metrics.as_str(),
                        ],
                    )?;
                    SessionId::new(tx.last_insert_rowid())
                }
            };

            for candidate in &session.candidates {
                insert_candidate(&tx, session_id, candidate)?;
            }
            tx.commit()?;
            Ok(session_id)
        })?;

        debug!(
            session_id = %id,
            candidates = session.candidates.len(),
            "session saved"
        );
        Ok(id)
    }

    fn load_session(&self, id: SessionId) -> Result<Option<InterviewSession>, StoreError> {
        self.with_schema("load_session", |conn| load_session_with(conn, id))
    }

    fn find_session_by_name(&self, name: &str) -> Result<Option<InterviewSession>, StoreError> {
        self.with_schema("find_session_by_name", |conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM sessions
                     WHERE name = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1",
                    params![name],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            match id {
                Some(id) => load_session_with(conn, SessionId::new(id)),
                None => Ok(None),
            }
        })
    }

    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        self.with_schema("list_sessions", |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.name, s.date, s.interviewer, s.created_at, COUNT(c.id)
                 FROM sessions s
                 LEFT JOIN candidates c ON c.session_id = s.id
                 GROUP BY s.id
                 ORDER BY s.created_at DESC, s.id DESC",
            )?;

            let rows = stmt.query_map([], |row| {
                let date: String = row.get(2)?;
                let created_at: String = row.get(4)?;
                Ok(SessionSummary {
                    id: SessionId::new(row.get(0)?),
                    name: row.get(1)?,
                    date: parse_date(2, &date)?,
                    interviewer: row.get(3)?,
                    created_at: parse_datetime_utc(4, &created_at)?,
                    candidate_count: row.get(5)?,
                })
            })?;

            let sessions = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
    }

    fn delete_session(&self, id: SessionId) -> Result<bool, StoreError> {
        let deleted = self.with_schema("delete_session", |conn| {
            let n = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.value()])?;
            Ok(n > 0)
        })?;
        if deleted {
            info!(session_id = %id, "session deleted");
        }
        Ok(deleted)
    }

    fn delete_candidate(
        &self,
        session_id: SessionId,
        candidate_id: &CandidateId,
    ) -> Result<bool, StoreError> {
        self.with_schema("delete_candidate", |conn| {
            let n = conn.execute(
                "DELETE FROM candidates WHERE session_id = ?1 AND candidate_id = ?2",
                params![session_id.value(), candidate_id.as_str()],
            )?;
            Ok(n > 0)
        })
    }

    fn record_training_run(&self, run: &TrainingRun) -> Result<(), StoreError> {
        let confusion = serde_json::to_string(&run.confusion_matrix)?;
        let importance = serde_json::to_string(&run.feature_importance)?;
        let params_json = serde_json::to_string(&run.training_params)?;
        let dataset_size = i64::try_from(run.dataset_size).unwrap_or(i64::MAX);

        self.with_schema("record_training_run", |conn| {
            conn.execute(
                "INSERT INTO model_runs (
                     run_id, timestamp, accuracy, precision, recall, f1_score, roc_auc,
                     train_accuracy, test_accuracy, confusion_matrix, feature_importance,
                     notes, dataset_size, training_params, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(run_id) DO UPDATE SET
                     timestamp = excluded.timestamp,
                     accuracy = excluded.accuracy,
                     precision = excluded.precision,
                     recall = excluded.recall,
                     f1_score = excluded.f1_score,
                     roc_auc = excluded.roc_auc,
                     train_accuracy = excluded.train_accuracy,
                     test_accuracy = excluded.test_accuracy,
                     confusion_matrix = excluded.confusion_matrix,
                     feature_importance = excluded.feature_importance,
                     notes = excluded.notes,
                     dataset_size = excluded.dataset_size,
                     training_params = excluded.training_params",
                params![
                    run.run_id.to_string(),
                    run.timestamp.to_rfc3339(),
                    run.test_accuracy,
                    run.precision,
                    run.recall,
                    run.f1_score,
                    run.roc_auc,
                    run.train_accuracy,
                    run.test_accuracy,
                    confusion.as_str(),
                    importance.as_str(),
                    run.notes.as_str(),
                    dataset_size,
                    params_json.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    fn list_training_runs(&self) -> Result<Vec<TrainingRun>, StoreError> {
        self.with_schema("list_training_runs", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TRAINING_RUN_COLUMNS} FROM model_runs ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([], training_run_from_row)?;
            let runs = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(runs)
        })
    }

    fn latest_training_run(&self) -> Result<Option<TrainingRun>, StoreError> {
        self.with_schema("latest_training_run", |conn| {
            let run = conn
                .query_row(
                    &format!(
                        "SELECT {TRAINING_RUN_COLUMNS} FROM model_runs
                         ORDER BY created_at DESC, id DESC
                         LIMIT 1"
                    ),
                    [],
                    training_run_from_row,
                )
                .optional()?;
            Ok(run)
        })
    }

    fn delete_training_run(&self, run_id: &Uuid) -> Result<bool, StoreError> {
        self.with_schema("delete_training_run", |conn| {
            let n = conn.execute(
                "DELETE FROM model_runs WHERE run_id = ?1",
                params![run_id.to_string()],
            )?;
            Ok(n > 0)
        })
    }
}

fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    conn.execute_batch(SCHEMA_SQL)?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("no such table"))
}

fn insert_candidate(
    conn: &Connection,
    session_id: SessionId,
    candidate: &Candidate,
) -> Result<(), StoreError> {
    let scores = if candidate.scores.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&candidate.scores)?)
    };
    conn.execute(
        "INSERT INTO candidates (
             session_id, candidate_id, name, email, position, phone, experience_years,
             notes, scores, score, feedback, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            session_id.value(),
            candidate.id.as_str(),
            candidate.name.as_str(),
            candidate.email.as_deref(),
            candidate.position.as_str(),
            candidate.phone.as_deref(),
            candidate.experience_years,
            candidate.notes.as_str(),
            scores,
            candidate.score,
            candidate.feedback.as_deref(),
            candidate.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn load_session_with(
    conn: &Connection,
    id: SessionId,
) -> Result<Option<InterviewSession>, StoreError> {
    let session = conn
        .query_row(
            "SELECT id, name, date, interviewer, notes, created_at, custom_metrics
             FROM sessions
             WHERE id = ?1",
            params![id.value()],
            |row| {
                let date: String = row.get(2)?;
                let created_at: String = row.get(5)?;
                let custom_metrics: String = row.get(6)?;
                Ok(InterviewSession {
                    id: Some(SessionId::new(row.get(0)?)),
                    name: row.get(1)?,
                    date: parse_date(2, &date)?,
                    interviewer: row.get(3)?,
                    notes: row.get(4)?,
                    custom_metrics: parse_json(6, "custom metrics", &custom_metrics)?,
                    created_at: parse_datetime_utc(5, &created_at)?,
                    candidates: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut session) = session else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT candidate_id, name, email, position, phone, experience_years,
                notes, scores, score, feedback, created_at
         FROM candidates
         WHERE session_id = ?1
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![id.value()], |row| {
        let scores: Option<String> = row.get(7)?;
        let created_at: String = row.get(10)?;
        Ok(Candidate {
            id: CandidateId::new(row.get::<_, String>(0)?),
            name: row.get(1)?,
            email: row.get(2)?,
            position: row.get(3)?,
            phone: row.get(4)?,
            experience_years: row.get(5)?,
            notes: row.get(6)?,
            scores: match scores {
                Some(text) => parse_json::<ScoreCard>(7, "scores", &text)?,
                None => ScoreCard::default(),
            },
            score: row.get(8)?,
            feedback: row.get(9)?,
            created_at: parse_datetime_utc(10, &created_at)?,
        })
    })?;
    session.candidates = rows.collect::<Result<Vec<_>, _>>()?;

    Ok(Some(session))
}

const TRAINING_RUN_COLUMNS: &str = "run_id, timestamp, train_accuracy, test_accuracy, precision, \
     recall, f1_score, roc_auc, confusion_matrix, feature_importance, notes, dataset_size, \
     training_params";

fn training_run_from_row(row: &Row<'_>) -> rusqlite::Result<TrainingRun> {
    let run_id: String = row.get(0)?;
    let timestamp: String = row.get(1)?;
    let confusion: String = row.get(8)?;
    let importance: String = row.get(9)?;
    let dataset_size: i64 = row.get(11)?;
    let params_json: String = row.get(12)?;

    Ok(TrainingRun {
        run_id: parse_uuid(0, &run_id)?,
        timestamp: parse_datetime_utc(1, &timestamp)?,
        train_accuracy: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
        test_accuracy: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
        precision: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        recall: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        f1_score: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
        roc_auc: row.get(7)?,
        confusion_matrix: parse_json(8, "confusion matrix", &confusion)?,
        feature_importance: parse_json(9, "feature importance", &importance)?,
        notes: row.get(10)?,
        dataset_size: u64::try_from(dataset_size).unwrap_or(0),
        training_params: parse_json(12, "training params", &params_json)?,
    })
}

fn parse_uuid(column: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| sql_text_parse_error(column, "uuid", value))
}

fn parse_date(column: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    value
        .parse::<NaiveDate>()
        .map_err(|_| sql_text_parse_error(column, "date", value))
}

fn parse_datetime_utc(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| sql_text_parse_error(column, "datetime", value))
}

fn parse_json<T: serde::de::DeserializeOwned>(
    column: usize,
    field: &'static str,
    value: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(value).map_err(|_| sql_text_parse_error(column, field, value))
}

fn sql_text_parse_error(column: usize, field: &'static str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        Box::new(IoError::new(
            ErrorKind::InvalidData,
            format!("invalid {field}: {value}"),
        )),
    )
}
