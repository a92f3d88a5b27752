pub mod keys;
pub mod progress;
pub mod records;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use self::progress::WordScheduleState;
use self::records::ReviewRecord;

/// In-memory progress and review-history store.
///
/// Holds one schedule state per (learner, word) pair, the append-only review
/// log, the registered vocabulary, and per-learner unfamiliar-word flags.
/// Reads hand out clones; writes replace whole values, so callers must not
/// run two grading events for the same (learner, word) pair concurrently.
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreInner {
    /// Registered vocabulary, in registration order.
    word_order: Vec<String>,
    word_ids: HashSet<String>,
    /// Keyed by [`keys::schedule_state_key`].
    schedule_states: BTreeMap<String, WordScheduleState>,
    /// Per-user word ids flagged for extra practice.
    unfamiliar: BTreeMap<String, BTreeSet<String>>,
    records: Vec<ReviewRecord>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_word(&self, word_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        if !inner.word_ids.insert(word_id.to_string()) {
            return Ok(false);
        }
        inner.word_order.push(word_id.to_string());
        Ok(true)
    }

    pub fn register_words<I, S>(&self, word_ids: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for word_id in word_ids {
            if self.register_word(word_id.as_ref())? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn contains_word(&self, word_id: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.word_ids.contains(word_id))
    }

    pub fn word_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.word_order.len())
    }

    /// Full store contents as JSON, for backup or test fixtures.
    pub fn export_snapshot(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&*self.read()?)?)
    }

    /// Replace the store contents with a previously exported snapshot.
    pub fn import_snapshot(&self, snapshot: &str) -> Result<(), StoreError> {
        let parsed: StoreInner = serde_json::from_str(snapshot)?;
        *self.write()? = parsed;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreInner>, StoreError> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreInner>, StoreError> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}
