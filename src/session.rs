//! Review-session queues: composition, grade-driven requeueing, and the
//! session registry seam.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    DEFAULT_DAILY_WORDS, DUE_REVIEW_SHARE, MAX_SESSION_BATCH, MIN_SESSION_BATCH, NEW_WORD_SHARE,
    REQUEUE_OFFSET_BARELY, REQUEUE_OFFSET_NOT, STRUGGLING_SHARE, UNFAMILIAR_SHARE,
};
use crate::scheduler::Grade;
use crate::store::{Store, StoreError};

/// How a session queue was filled, tier by tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionComposition {
    pub unfamiliar: usize,
    pub struggling: usize,
    pub due_review: usize,
    #[serde(rename = "new")]
    pub new_words: usize,
}

/// One learner's active review queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSession {
    pub id: String,
    pub user_id: String,
    pub queue: VecDeque<String>,
    pub seen: HashSet<String>,
    pub queue_ids: HashSet<String>,
    pub composition: SessionComposition,
    pub created_at: DateTime<Utc>,
}

impl ReviewSession {
    pub fn current_word(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Take the graded card out of the queue and reinsert it according to
    /// the grade: "barely" comes back two positions ahead, "not" next but
    /// one, "recognize" leaves the session (its due instant is in the
    /// future and belongs to a later session's due query).
    pub fn apply_grade(&mut self, word_id: &str, grade: Grade) {
        if self.current_word() == Some(word_id) {
            self.queue.pop_front();
        } else if let Some(position) = self.queue.iter().position(|queued| queued == word_id) {
            self.queue.remove(position);
        }
        self.seen.insert(word_id.to_string());
        self.queue_ids.remove(word_id);

        let offset = match grade {
            Grade::Recognize => return,
            Grade::Barely => REQUEUE_OFFSET_BARELY,
            Grade::Not => REQUEUE_OFFSET_NOT,
        };
        let insert_at = offset.min(self.queue.len());
        self.queue.insert(insert_at, word_id.to_string());
        self.queue_ids.insert(word_id.to_string());
    }
}

/// Registry of active sessions, keyed by session id.
///
/// Injected into the engine so deployments can swap the backing map; the
/// engine never assumes a process-wide global.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Result<Option<ReviewSession>, StoreError>;
    fn put(&self, session: ReviewSession) -> Result<(), StoreError>;
    fn remove(&self, session_id: &str) -> Result<Option<ReviewSession>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, ReviewSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str) -> Result<Option<ReviewSession>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(sessions.get(session_id).cloned())
    }

    fn put(&self, session: ReviewSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<Option<ReviewSession>, StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(sessions.remove(session_id))
    }
}

/// Build a session queue for a learner: unfamiliar words first, then
/// struggling words, due reviews, and unseen words, each capped by its
/// share of the batch, deduplicated in that priority order, then shuffled.
pub fn compose_session<R: Rng + ?Sized>(
    store: &Store,
    user_id: &str,
    goal_remaining: u32,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<ReviewSession, StoreError> {
    let goal = if goal_remaining > 0 {
        goal_remaining
    } else {
        DEFAULT_DAILY_WORDS
    };
    let batch_size = (goal as usize).clamp(MIN_SESSION_BATCH, MAX_SESSION_BATCH);

    let unfamiliar_pool = store.get_unfamiliar_word_ids(user_id)?;
    let struggling_pool = store.get_struggling_states(user_id, usize::MAX)?;
    let due_pool = store.get_due_states(user_id, now, usize::MAX)?;
    let unseen_pool = store.get_unseen_word_ids(user_id, usize::MAX)?;

    let composition = plan_composition(
        batch_size,
        unfamiliar_pool.len(),
        struggling_pool.len(),
        due_pool.len(),
        unseen_pool.len(),
    );

    let mut picked = HashSet::new();
    let mut queue_words = Vec::with_capacity(batch_size);
    fill_tier(
        &mut queue_words,
        &mut picked,
        unfamiliar_pool.into_iter(),
        composition.unfamiliar,
    );
    fill_tier(
        &mut queue_words,
        &mut picked,
        struggling_pool.into_iter().map(|s| s.word_id),
        composition.struggling,
    );
    fill_tier(
        &mut queue_words,
        &mut picked,
        due_pool.into_iter().map(|s| s.word_id),
        composition.due_review,
    );
    fill_tier(
        &mut queue_words,
        &mut picked,
        unseen_pool.into_iter(),
        composition.new_words,
    );

    // Mix card types so tiers don't arrive in blocks.
    queue_words.shuffle(rng);

    Ok(ReviewSession {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        queue_ids: queue_words.iter().cloned().collect(),
        queue: queue_words.into(),
        seen: HashSet::new(),
        composition,
        created_at: now,
    })
}

fn plan_composition(
    batch_size: usize,
    unfamiliar_count: usize,
    struggling_count: usize,
    due_count: usize,
    unseen_count: usize,
) -> SessionComposition {
    let target = |share: f64| (batch_size as f64 * share) as usize;
    let mut composition = SessionComposition {
        unfamiliar: target(UNFAMILIAR_SHARE).min(unfamiliar_count),
        struggling: target(STRUGGLING_SHARE).min(struggling_count),
        due_review: target(DUE_REVIEW_SHARE).min(due_count),
        new_words: target(NEW_WORD_SHARE).min(unseen_count),
    };

    // Hand leftover capacity back, highest-priority tier first.
    let mut remaining = batch_size.saturating_sub(
        composition.unfamiliar + composition.struggling + composition.due_review
            + composition.new_words,
    );
    for (tier, available) in [
        (&mut composition.unfamiliar, unfamiliar_count),
        (&mut composition.struggling, struggling_count),
        (&mut composition.due_review, due_count),
        (&mut composition.new_words, unseen_count),
    ] {
        if remaining == 0 {
            break;
        }
        let extra = remaining.min(available - *tier);
        *tier += extra;
        remaining -= extra;
    }

    composition
}

fn fill_tier<I>(
    queue_words: &mut Vec<String>,
    picked: &mut HashSet<String>,
    pool: I,
    target: usize,
) where
    I: Iterator<Item = String>,
{
    let mut taken = 0;
    for word_id in pool {
        if taken >= target {
            break;
        }
        if picked.insert(word_id.clone()) {
            queue_words.push(word_id);
            taken += 1;
        }
    }
}
