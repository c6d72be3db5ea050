use std::collections::BTreeMap;

use anyhow::Context;
use chrono::NaiveDate;
use hr_attrition::{train, EmployeeTable, Predictor, TrainingOutcome};
use hr_core::core::{InterviewSession, SessionState};
use hr_store::{InterviewStore, SqliteInterviewStore, TrainingRun};
use tracing::{debug, info, warn};

use crate::bootstrap::RuntimeConfig;

/// Everything a command needs: validated config, the store, the cached
/// model and the interview session being edited.
pub struct AppContext {
    pub runtime: RuntimeConfig,
    store: SqliteInterviewStore,
    predictor: Option<Predictor>,
    session: SessionState,
}

impl AppContext {
    /// Opens the store and makes sure its schema exists.
    pub fn open(runtime: RuntimeConfig) -> Result<Self, anyhow::Error> {
        let store = SqliteInterviewStore::open(&runtime.database_path).with_context(|| {
            format!("opening store at {}", runtime.database_path.display())
        })?;
        Ok(Self {
            runtime,
            store,
            predictor: None,
            session: SessionState::default(),
        })
    }

    pub fn store(&self) -> &SqliteInterviewStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Model
    // -----------------------------------------------------------------------

    /// The cached model, loading it on first use and reloading when a newer
    /// training has been written to the model directory since.
    pub fn predictor(&mut self) -> Result<&Predictor, anyhow::Error> {
        let stale = match &self.predictor {
            Some(p) => p.is_stale().unwrap_or_else(|e| {
                warn!(error = %e, "could not check model freshness, keeping cached model");
                false
            }),
            None => true,
        };
        if stale {
            let dir = &self.runtime.model_dir;
            let loaded = Predictor::load(dir).with_context(|| {
                format!(
                    "no usable model in {} (run `hr train` first)",
                    dir.display()
                )
            })?;
            debug!(trained_at = ?loaded.trained_at(), "model cache refreshed");
            self.predictor = Some(loaded);
        }
        self.predictor
            .as_ref()
            .context("model cache unexpectedly empty")
    }

    pub fn cached_predictor(&self) -> Option<&Predictor> {
        self.predictor.as_ref()
    }

    /// Trains on `table`, persists the artifact and metadata, records the run
    /// in the store and replaces the cached model.
    pub fn train(
        &mut self,
        table: &EmployeeTable,
        notes: &str,
    ) -> Result<TrainingOutcome, anyhow::Error> {
        let outcome = train(table, &self.runtime.training)?;
        let paths = outcome.save(&self.runtime.model_dir)?;

        let run = training_run(&outcome, &self.runtime, table.n_rows(), notes)?;
        self.store.record_training_run(&run)?;
        info!(
            run_id = %outcome.run_id,
            artifact = %paths.artifact.display(),
            "training run recorded"
        );

        self.predictor = Some(Predictor::from_outcome(
            outcome.clone(),
            &self.runtime.model_dir,
        ));
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Interview session
    // -----------------------------------------------------------------------

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Starts a new unsaved session and makes it active.
    pub fn create_session(
        &mut self,
        name: &str,
        date: NaiveDate,
        interviewer: &str,
        custom_metrics: Vec<String>,
    ) {
        let session =
            InterviewSession::new(name, date, interviewer).with_custom_metrics(custom_metrics);
        if let Some(previous) = self.session.activate(session) {
            debug!(session = %previous.name, "replaced active session");
        }
        info!(session = name, "session created");
    }

    /// Loads the newest session called `name`. `Ok(false)` when there is none.
    pub fn open_session(&mut self, name: &str) -> Result<bool, anyhow::Error> {
        match self.store.find_session_by_name(name)? {
            Some(session) => {
                self.session.activate(session);
                info!(session = name, "session opened");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Persists a snapshot of the active session.
    pub fn save_session(&mut self) -> Result<InterviewSession, anyhow::Error> {
        let session = self.session.active_mut()?;
        let id = self.store.save_session(session)?;
        session.id = Some(id);
        info!(session = %session.name, id = %id, "session saved");
        Ok(session.clone())
    }

    pub fn close_session(&mut self) -> Option<InterviewSession> {
        self.session.close()
    }

    /// Deletes the active session from the store (if saved) and closes it.
    pub fn delete_session(&mut self) -> Result<InterviewSession, anyhow::Error> {
        let session = self.session.active()?;
        if let Some(id) = session.id {
            self.store.delete_session(id)?;
        }
        self.session
            .close()
            .context("active session vanished while deleting")
    }
}

/// Store record of a finished training.
pub fn training_run(
    outcome: &TrainingOutcome,
    runtime: &RuntimeConfig,
    dataset_size: usize,
    notes: &str,
) -> Result<TrainingRun, anyhow::Error> {
    let metrics = &outcome.metrics;
    let feature_importance: BTreeMap<String, f64> = metrics
        .feature_importance
        .iter()
        .map(|f| (f.feature.clone(), f.importance))
        .collect();
    Ok(TrainingRun {
        run_id: outcome.run_id,
        timestamp: outcome.metadata.timestamp,
        train_accuracy: metrics.train_accuracy,
        test_accuracy: metrics.test_accuracy,
        precision: metrics.precision,
        recall: metrics.recall,
        f1_score: metrics.f1,
        roc_auc: metrics.roc_auc,
        confusion_matrix: metrics.confusion_matrix,
        feature_importance,
        notes: notes.to_owned(),
        dataset_size: dataset_size as u64,
        training_params: serde_json::to_value(&runtime.training)?,
    })
}
