//! Wires one grading event through scheduling, persistence, the review log,
//! and the session queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::scheduler::{schedule, Grade};
use crate::session::{compose_session, MemorySessionStore, ReviewSession, SessionStore};
use crate::store::progress::WordScheduleState;
use crate::store::records::{ReviewRecord, TodaysProgress};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session {session_id} does not belong to user {user_id}")]
    SessionOwnership { session_id: String, user_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The card a session is currently showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCard {
    pub word_id: String,
    pub remaining: usize,
}

/// What one grading event did to the graded word.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub word_id: String,
    pub grade: Grade,
    pub is_new: bool,
    pub easiness: f64,
    pub interval: f64,
    pub next_due: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOutcome {
    pub review: ReviewSummary,
    pub next_card: Option<QueueCard>,
    pub remaining: usize,
}

/// Grading front door: owns the progress store and the session registry.
///
/// Grading events for the same (learner, word) pair must not run
/// concurrently; each call reads a state snapshot and writes a full
/// replacement, so two in-flight calls would lose one update.
pub struct ReviewEngine {
    store: Arc<Store>,
    sessions: Box<dyn SessionStore>,
}

impl ReviewEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_session_store(store, Box::new(MemorySessionStore::new()))
    }

    pub fn with_session_store(store: Arc<Store>, sessions: Box<dyn SessionStore>) -> Self {
        Self { store, sessions }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Compose and register a new review session for a learner.
    pub fn start_session<R: Rng + ?Sized>(
        &self,
        user_id: &str,
        goal_remaining: u32,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<ReviewSession, EngineError> {
        let session = compose_session(&self.store, user_id, goal_remaining, now, rng)?;
        self.sessions.put(session.clone())?;
        tracing::info!(
            user_id,
            session_id = %session.id,
            queue_len = session.queue.len(),
            "Review session created"
        );
        Ok(session)
    }

    pub fn current_card(&self, session_id: &str) -> Result<Option<QueueCard>, EngineError> {
        let session = self.require_session(session_id)?;
        Ok(session.current_word().map(|word_id| QueueCard {
            word_id: word_id.to_string(),
            remaining: session.remaining(),
        }))
    }

    /// Apply one grading event: schedule, persist, log, requeue.
    pub fn grade_card(
        &self,
        session_id: &str,
        user_id: &str,
        word_id: &str,
        grade: Grade,
        latency_ms: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<GradeOutcome, EngineError> {
        let mut session = self.require_session(session_id)?;
        if session.user_id != user_id {
            return Err(EngineError::SessionOwnership {
                session_id: session_id.to_string(),
                user_id: user_id.to_string(),
            });
        }

        let prior = self
            .store
            .get_or_create_schedule_state(user_id, word_id, now)?;
        let is_new = prior.schedule.repetitions == 0;

        let (updated, next_due) = schedule(Some(&prior.schedule), grade, now);
        self.store.set_schedule_state(&WordScheduleState {
            user_id: user_id.to_string(),
            word_id: word_id.to_string(),
            schedule: updated.clone(),
            updated_at: now,
        })?;

        self.store.create_record(&ReviewRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            word_id: word_id.to_string(),
            grade,
            latency_ms,
            is_new,
            easiness: updated.easiness,
            interval: updated.interval,
            created_at: now,
        })?;

        session.apply_grade(word_id, grade);
        let next_card = session.current_word().map(|next_id| QueueCard {
            word_id: next_id.to_string(),
            remaining: session.remaining(),
        });
        let remaining = session.remaining();
        self.sessions.put(session)?;

        tracing::debug!(
            user_id,
            word_id,
            grade = %grade,
            easiness = updated.easiness,
            interval = updated.interval,
            next_due = %next_due,
            "Card graded"
        );

        Ok(GradeOutcome {
            review: ReviewSummary {
                word_id: word_id.to_string(),
                grade,
                is_new,
                easiness: updated.easiness,
                interval: updated.interval,
                next_due,
            },
            next_card,
            remaining,
        })
    }

    pub fn todays_progress(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TodaysProgress, EngineError> {
        Ok(self.store.get_todays_progress(user_id, now)?)
    }

    /// Drop a session from the registry, returning it if it was active.
    pub fn end_session(&self, session_id: &str) -> Result<Option<ReviewSession>, EngineError> {
        Ok(self.sessions.remove(session_id)?)
    }

    fn require_session(&self, session_id: &str) -> Result<ReviewSession, EngineError> {
        self.sessions
            .get(session_id)?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }
}
