use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{STRUGGLING_EASINESS_THRESHOLD, STRUGGLING_INTERVAL_THRESHOLD};
use crate::scheduler::{Grade, ScheduleState};
use crate::store::keys;
use crate::store::{Store, StoreError};

/// A learner's scheduling record for one word.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordScheduleState {
    pub user_id: String,
    pub word_id: String,
    pub schedule: ScheduleState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStateStats {
    pub tracked: u64,
    pub due: u64,
    pub struggling: u64,
}

/// A word the learner keeps getting wrong or that never left short intervals.
pub(crate) fn is_struggling(schedule: &ScheduleState) -> bool {
    schedule.last_grade == Some(Grade::Not)
        || schedule.easiness < STRUGGLING_EASINESS_THRESHOLD
        || (schedule.interval < STRUGGLING_INTERVAL_THRESHOLD && schedule.repetitions > 0)
}

fn is_due(schedule: &ScheduleState, now: DateTime<Utc>) -> bool {
    schedule.next_due <= now && schedule.repetitions > 0
}

impl Store {
    pub fn get_schedule_state(
        &self,
        user_id: &str,
        word_id: &str,
    ) -> Result<Option<WordScheduleState>, StoreError> {
        let key = keys::schedule_state_key(user_id, word_id);
        Ok(self.read()?.schedule_states.get(&key).cloned())
    }

    pub fn set_schedule_state(&self, state: &WordScheduleState) -> Result<(), StoreError> {
        let key = keys::schedule_state_key(&state.user_id, &state.word_id);
        self.write()?.schedule_states.insert(key, state.clone());
        Ok(())
    }

    /// Fetch the record for a (learner, word) pair, synthesizing and storing
    /// a never-reviewed one if absent. The word must be registered.
    pub fn get_or_create_schedule_state(
        &self,
        user_id: &str,
        word_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WordScheduleState, StoreError> {
        if !self.contains_word(word_id)? {
            return Err(StoreError::NotFound {
                entity: "word".to_string(),
                key: word_id.to_string(),
            });
        }

        if let Some(existing) = self.get_schedule_state(user_id, word_id)? {
            return Ok(existing);
        }

        let state = WordScheduleState {
            user_id: user_id.to_string(),
            word_id: word_id.to_string(),
            schedule: ScheduleState::new(now),
            updated_at: now,
        };
        self.set_schedule_state(&state)?;
        Ok(state)
    }

    pub fn delete_schedule_state(&self, user_id: &str, word_id: &str) -> Result<(), StoreError> {
        let key = keys::schedule_state_key(user_id, word_id);
        self.write()?.schedule_states.remove(&key);
        Ok(())
    }

    /// Overwrite the record with never-reviewed defaults. Used when a learner
    /// flags a word as unfamiliar again after making progress on it.
    pub fn reset_schedule_state(
        &self,
        user_id: &str,
        word_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WordScheduleState, StoreError> {
        if !self.contains_word(word_id)? {
            return Err(StoreError::NotFound {
                entity: "word".to_string(),
                key: word_id.to_string(),
            });
        }

        let state = WordScheduleState {
            user_id: user_id.to_string(),
            word_id: word_id.to_string(),
            schedule: ScheduleState::new(now),
            updated_at: now,
        };
        self.set_schedule_state(&state)?;
        Ok(state)
    }

    /// Started words whose due instant has passed, ascending by `next_due`.
    pub fn get_due_states(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WordScheduleState>, StoreError> {
        let mut due = self.scan_user_states(user_id, |s| is_due(&s.schedule, now))?;
        due.sort_by_key(|s| s.schedule.next_due);
        due.truncate(limit);
        Ok(due)
    }

    /// Struggling words, ascending by `next_due`.
    pub fn get_struggling_states(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<WordScheduleState>, StoreError> {
        let mut struggling = self.scan_user_states(user_id, |s| is_struggling(&s.schedule))?;
        struggling.sort_by_key(|s| s.schedule.next_due);
        struggling.truncate(limit);
        Ok(struggling)
    }

    /// Registered words this learner has no record for, in registration order.
    pub fn get_unseen_word_ids(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.read()?;
        let unseen = inner
            .word_order
            .iter()
            .filter(|word_id| {
                let key = keys::schedule_state_key(user_id, word_id);
                !inner.schedule_states.contains_key(&key)
            })
            .take(limit)
            .cloned()
            .collect();
        Ok(unseen)
    }

    pub fn get_schedule_state_stats(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduleStateStats, StoreError> {
        let mut stats = ScheduleStateStats::default();
        for state in self.scan_user_states(user_id, |_| true)? {
            stats.tracked += 1;
            if is_due(&state.schedule, now) {
                stats.due += 1;
            }
            if is_struggling(&state.schedule) {
                stats.struggling += 1;
            }
        }
        Ok(stats)
    }

    pub fn mark_unfamiliar(&self, user_id: &str, word_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        Ok(inner
            .unfamiliar
            .entry(user_id.to_string())
            .or_default()
            .insert(word_id.to_string()))
    }

    pub fn clear_unfamiliar(&self, user_id: &str, word_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        Ok(inner
            .unfamiliar
            .get_mut(user_id)
            .map(|words| words.remove(word_id))
            .unwrap_or(false))
    }

    /// Flagged words that exist in the vocabulary, in flag-set order.
    pub fn get_unfamiliar_word_ids(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.read()?;
        let Some(flagged) = inner.unfamiliar.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(flagged
            .iter()
            .filter(|word_id| inner.word_ids.contains(*word_id))
            .cloned()
            .collect())
    }

    fn scan_user_states<F>(
        &self,
        user_id: &str,
        mut keep: F,
    ) -> Result<Vec<WordScheduleState>, StoreError>
    where
        F: FnMut(&WordScheduleState) -> bool,
    {
        let prefix = keys::schedule_state_prefix(user_id);
        let inner = self.read()?;
        Ok(inner
            .schedule_states
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, state)| state)
            .filter(|state| keep(state))
            .cloned()
            .collect())
    }
}
