use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    rank_candidates, Candidate, CandidateId, RankedTable, SessionError, SessionId, Weights,
    FIXED_METRICS,
};

// ---------------------------------------------------------------------------
// InterviewSession: a roster of candidates scored by one interviewer
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    /// Set once the session has been persisted; saving with an id replaces the stored copy.
    pub id: Option<SessionId>,
    pub name: String,
    pub date: NaiveDate,
    pub interviewer: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub custom_metrics: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl InterviewSession {
    pub fn new(name: impl Into<String>, date: NaiveDate, interviewer: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            date,
            interviewer: interviewer.into(),
            notes: String::new(),
            custom_metrics: Vec::new(),
            created_at: Utc::now(),
            candidates: Vec::new(),
        }
    }

    pub fn with_custom_metrics<S: Into<String>>(mut self, metrics: impl IntoIterator<Item = S>) -> Self {
        self.custom_metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    /// Fixed metrics followed by custom metrics, first occurrence wins.
    pub fn all_metrics(&self) -> Vec<String> {
        let mut metrics: Vec<String> = Vec::with_capacity(FIXED_METRICS.len() + self.custom_metrics.len());
        let names = FIXED_METRICS
            .iter()
            .copied()
            .chain(self.custom_metrics.iter().map(String::as_str));
        for name in names {
            if !metrics.iter().any(|m| m == name) {
                metrics.push(name.to_owned());
            }
        }
        metrics
    }

    pub fn candidate(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.id == id)
    }

    fn candidate_mut(&mut self, id: &CandidateId) -> Result<&mut Candidate, SessionError> {
        self.candidates
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| SessionError::UnknownCandidate(id.clone()))
    }

    pub fn add_candidate(&mut self, candidate: Candidate) -> Result<(), SessionError> {
        candidate.validate()?;
        if self.candidate(&candidate.id).is_some() {
            return Err(SessionError::DuplicateCandidate(candidate.id));
        }
        self.candidates.push(candidate);
        Ok(())
    }

    pub fn update_score(
        &mut self,
        id: &CandidateId,
        metric: impl Into<String>,
        value: f64,
    ) -> Result<(), SessionError> {
        self.candidate_mut(id)?.scores.insert(metric, value);
        Ok(())
    }

    pub fn set_overall(
        &mut self,
        id: &CandidateId,
        score: Option<f64>,
        feedback: Option<String>,
    ) -> Result<(), SessionError> {
        let candidate = self.candidate_mut(id)?;
        candidate.score = score;
        candidate.feedback = feedback;
        Ok(())
    }

    pub fn remove_candidate(&mut self, id: &CandidateId) -> Result<Candidate, SessionError> {
        let idx = self
            .candidates
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| SessionError::UnknownCandidate(id.clone()))?;
        Ok(self.candidates.remove(idx))
    }

    pub fn rank(&self, weights: Option<&Weights>) -> RankedTable {
        rank_candidates(&self.candidates, weights)
    }
}

// ---------------------------------------------------------------------------
// SessionState: NoSession <-> Active
// ---------------------------------------------------------------------------

/// The interview session currently being edited, if any.
///
/// Roster edits only touch this in-memory copy; persisting is a separate,
/// explicit save of the whole snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SessionState {
    #[default]
    NoSession,
    Active(InterviewSession),
}

impl SessionState {
    /// Makes `session` the active one, returning whatever was active before.
    pub fn activate(&mut self, session: InterviewSession) -> Option<InterviewSession> {
        match std::mem::replace(self, Self::Active(session)) {
            Self::Active(previous) => Some(previous),
            Self::NoSession => None,
        }
    }

    pub fn close(&mut self) -> Option<InterviewSession> {
        match std::mem::take(self) {
            Self::Active(previous) => Some(previous),
            Self::NoSession => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn active(&self) -> Result<&InterviewSession, SessionError> {
        match self {
            Self::Active(session) => Ok(session),
            Self::NoSession => Err(SessionError::NoActiveSession),
        }
    }

    pub fn active_mut(&mut self) -> Result<&mut InterviewSession, SessionError> {
        match self {
            Self::Active(session) => Ok(session),
            Self::NoSession => Err(SessionError::NoActiveSession),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
