use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::scheduler::Grade;
use crate::store::{Store, StoreError};

/// One review attempt, appended per grading event and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: String,
    pub user_id: String,
    pub word_id: String,
    pub grade: Grade,
    pub latency_ms: Option<i64>,
    /// Whether the word had zero repetitions going into this review.
    pub is_new: bool,
    /// Easiness after the grading event.
    pub easiness: f64,
    /// Interval (days) after the grading event.
    pub interval: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaysProgress {
    pub total: u64,
    pub new_cards: u64,
    pub review_cards: u64,
}

impl Store {
    pub fn create_record(&self, record: &ReviewRecord) -> Result<(), StoreError> {
        self.write()?.records.push(record.clone());
        Ok(())
    }

    /// A learner's records, newest first.
    pub fn list_user_records(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ReviewRecord>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .records
            .iter()
            .rev()
            .filter(|record| record.user_id == user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Review counts for the UTC calendar date of `now`.
    pub fn get_todays_progress(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TodaysProgress, StoreError> {
        let today = now.date_naive();
        let inner = self.read()?;

        let mut progress = TodaysProgress::default();
        for record in inner
            .records
            .iter()
            .filter(|r| r.user_id == user_id && r.created_at.date_naive() == today)
        {
            progress.total += 1;
            if record.is_new {
                progress.new_cards += 1;
            }
        }
        progress.review_cards = progress.total - progress.new_cards;
        Ok(progress)
    }

    /// Distinct words the learner reviewed on the UTC calendar date of `now`,
    /// in first-review order.
    pub fn get_words_reviewed_on(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let today = now.date_naive();
        let inner = self.read()?;

        let mut seen = HashSet::new();
        let mut word_ids = Vec::new();
        for record in inner
            .records
            .iter()
            .filter(|r| r.user_id == user_id && r.created_at.date_naive() == today)
        {
            if seen.insert(record.word_id.clone()) {
                word_ids.push(record.word_id.clone());
            }
        }
        Ok(word_ids)
    }

    pub fn count_records_since(&self, since: DateTime<Utc>) -> Result<usize, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .records
            .iter()
            .filter(|record| record.created_at >= since)
            .count())
    }
}
