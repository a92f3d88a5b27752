//! Enhanced SM-2 scheduling: one pure transition per grading event.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{INITIAL_EASINESS, MIN_EASINESS};

const EASINESS_GAIN: f64 = 0.1;
const BARELY_EASINESS_PENALTY: f64 = 0.15;
const NOT_EASINESS_PENALTY: f64 = 0.25;
const MIN_GROWTH_INTERVAL_DAYS: f64 = 1.0;
const BARELY_FIRST_INTERVAL_DAYS: f64 = 0.2;
const BARELY_REPEAT_INTERVAL_DAYS: f64 = 0.1;
const BARELY_FIRST_MINUTES: i64 = 30;
const BARELY_REPEAT_MINUTES: i64 = 10;
const NOT_FIRST_MINUTES: i64 = 3;
const NOT_AFTER_BARELY_MINUTES: i64 = 2;
const NOT_AFTER_NOT_MINUTES: i64 = 1;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Learner-reported recall quality for one card in one review.
///
/// The lowercase labels are the wire protocol the grading UI posts; they are
/// a closed set and must not be extended or renamed without updating every
/// consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    /// Confident recall.
    Recognize,
    /// Hesitant recall; the word needs same-day reinforcement.
    Barely,
    /// Failed recall; the word is requeued near-immediately.
    Not,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Recognize => "recognize",
            Grade::Barely => "barely",
            Grade::Not => "not",
        }
    }

    /// SM-2 quality score backing the easiness update.
    pub fn quality(&self) -> u8 {
        match self {
            Grade::Recognize => 5,
            Grade::Barely => 3,
            Grade::Not => 1,
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown grade label: {0}")]
pub struct ParseGradeError(String);

impl std::str::FromStr for Grade {
    type Err = ParseGradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recognize" => Ok(Grade::Recognize),
            "barely" => Ok(Grade::Barely),
            "not" => Ok(Grade::Not),
            other => Err(ParseGradeError(other.to_string())),
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-(learner, word) scheduling state.
///
/// `last_grade` is `None` only for a synthesized never-reviewed record; after
/// the first grading event it always carries the most recent grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleState {
    pub easiness: f64,
    /// Gap to the next scheduled exposure, in fractional days.
    pub interval: f64,
    /// Consecutive "recognize" grades since the last reset by "not".
    pub repetitions: u32,
    pub next_due: DateTime<Utc>,
    pub last_grade: Option<Grade>,
}

impl ScheduleState {
    /// State synthesized for a word the learner has never reviewed.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            easiness: INITIAL_EASINESS,
            interval: 0.0,
            repetitions: 0,
            next_due: now,
            last_grade: None,
        }
    }
}

/// Apply one grading event and return the replacement state plus its due
/// instant.
///
/// Pure: `now` is the caller's clock reading, nothing else is consulted, and
/// the prior state is only borrowed. A missing prior state is the designed
/// new-word path, not an error. Callers must serialize grading events for
/// the same (learner, word) pair; two in-flight calls would race on the
/// read-modify-write against their shared snapshot.
pub fn schedule(
    prior: Option<&ScheduleState>,
    grade: Grade,
    now: DateTime<Utc>,
) -> (ScheduleState, DateTime<Utc>) {
    let prior = prior.cloned().unwrap_or_else(|| ScheduleState::new(now));
    let last_grade = prior.last_grade;
    let mut easiness = prior.easiness;
    let mut interval = prior.interval;
    let mut repetitions = prior.repetitions;

    let next_due = match grade {
        Grade::Recognize => {
            repetitions += 1;

            // A comeback from a weak grade gets gentler intervals until the
            // streak stabilizes at four repetitions.
            let recovering = matches!(last_grade, Some(Grade::Barely) | Some(Grade::Not));
            interval = if recovering && repetitions <= 3 {
                match repetitions {
                    1 => 0.5, // 12 hours
                    2 => 1.5,
                    _ => 3.0,
                }
            } else {
                match repetitions {
                    1 => 1.0,
                    2 => 3.0,
                    3 => 7.0,
                    // Multiplicative growth uses the easiness from before
                    // this update.
                    _ => (interval * easiness).max(MIN_GROWTH_INTERVAL_DAYS),
                }
            };

            let q = f64::from(grade.quality());
            easiness += EASINESS_GAIN - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
            // Uncapped growth can exceed chrono's range; saturate rather
            // than panic.
            now.checked_add_signed(fractional_days(interval))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        }
        Grade::Barely => {
            // Never resets the streak, never advances it either.
            repetitions = repetitions.max(1);

            let due = if last_grade == Some(Grade::Barely) {
                interval = BARELY_REPEAT_INTERVAL_DAYS;
                now + Duration::minutes(BARELY_REPEAT_MINUTES)
            } else {
                interval = BARELY_FIRST_INTERVAL_DAYS;
                now + Duration::minutes(BARELY_FIRST_MINUTES)
            };

            easiness -= BARELY_EASINESS_PENALTY;
            due
        }
        Grade::Not => {
            // Full reset: the word progresses as if new from here on.
            repetitions = 0;
            interval = 0.0;

            let minutes = match last_grade {
                Some(Grade::Not) => NOT_AFTER_NOT_MINUTES,
                Some(Grade::Barely) => NOT_AFTER_BARELY_MINUTES,
                _ => NOT_FIRST_MINUTES,
            };

            easiness -= NOT_EASINESS_PENALTY;
            now + Duration::minutes(minutes)
        }
    };

    let updated = ScheduleState {
        easiness: round4(easiness.max(MIN_EASINESS)),
        interval,
        repetitions,
        next_due,
        last_grade: Some(grade),
    };

    (updated, next_due)
}

fn fractional_days(days: f64) -> Duration {
    Duration::milliseconds((days * MILLIS_PER_DAY).round() as i64)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn new_word_recognized_starts_one_day_interval() {
        let now = at_epoch();
        let (state, next_due) = schedule(None, Grade::Recognize, now);

        assert_eq!(state.repetitions, 1);
        assert_eq!(state.interval, 1.0);
        assert_eq!(next_due, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert!((state.easiness - 2.6).abs() < 1e-9);
        assert_eq!(state.last_grade, Some(Grade::Recognize));
    }

    #[test]
    fn stable_streak_walks_one_three_seven() {
        let now = at_epoch();
        let (first, _) = schedule(None, Grade::Recognize, now);
        let (second, _) = schedule(Some(&first), Grade::Recognize, now);
        let (third, _) = schedule(Some(&second), Grade::Recognize, now);

        assert_eq!(second.interval, 3.0);
        assert_eq!(third.interval, 7.0);
    }

    #[test]
    fn fourth_repetition_grows_multiplicatively() {
        let now = at_epoch();
        let state = ScheduleState {
            easiness: 2.5,
            interval: 7.0,
            repetitions: 3,
            next_due: now,
            last_grade: Some(Grade::Recognize),
        };

        let (updated, _) = schedule(Some(&state), Grade::Recognize, now);

        assert_eq!(updated.repetitions, 4);
        assert_eq!(updated.interval, 17.5); // 7.0 * 2.5, pre-update easiness
        assert!((updated.easiness - 2.6).abs() < 1e-9);
    }

    #[test]
    fn first_failure_requeues_in_three_minutes() {
        let now = at_epoch();
        let (state, next_due) = schedule(None, Grade::Not, now);

        assert_eq!(state.repetitions, 0);
        assert_eq!(state.interval, 0.0);
        assert_eq!(next_due, Utc.with_ymd_and_hms(2024, 1, 1, 0, 3, 0).unwrap());
        assert!((state.easiness - 2.25).abs() < 1e-9);
    }

    #[test]
    fn consecutive_failures_tighten_to_one_minute() {
        let now = at_epoch();
        let state = ScheduleState {
            easiness: 2.25,
            interval: 0.0,
            repetitions: 0,
            next_due: now,
            last_grade: Some(Grade::Not),
        };

        let (updated, next_due) = schedule(Some(&state), Grade::Not, now);

        assert_eq!(next_due, Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap());
        assert!((updated.easiness - 2.0).abs() < 1e-9);
    }

    #[test]
    fn failure_after_barely_requeues_in_two_minutes() {
        let now = at_epoch();
        let state = ScheduleState {
            easiness: 2.35,
            interval: 0.2,
            repetitions: 1,
            next_due: now,
            last_grade: Some(Grade::Barely),
        };

        let (_, next_due) = schedule(Some(&state), Grade::Not, now);

        assert_eq!(next_due, Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 0).unwrap());
    }

    #[test]
    fn first_barely_gives_thirty_minutes() {
        let now = at_epoch();
        let state = ScheduleState {
            easiness: 2.5,
            interval: 1.0,
            repetitions: 1,
            next_due: now,
            last_grade: Some(Grade::Recognize),
        };

        let (updated, next_due) = schedule(Some(&state), Grade::Barely, now);

        assert_eq!(updated.repetitions, 1);
        assert_eq!(updated.interval, 0.2);
        assert_eq!(next_due, Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap());
        assert!((updated.easiness - 2.35).abs() < 1e-9);
    }

    #[test]
    fn second_consecutive_barely_gives_ten_minutes() {
        let now = at_epoch();
        let state = ScheduleState {
            easiness: 2.35,
            interval: 0.2,
            repetitions: 1,
            next_due: now,
            last_grade: Some(Grade::Barely),
        };

        let (updated, next_due) = schedule(Some(&state), Grade::Barely, now);

        assert_eq!(updated.interval, 0.1);
        assert_eq!(next_due, Utc.with_ymd_and_hms(2024, 1, 1, 0, 10, 0).unwrap());
    }

    #[test]
    fn barely_lifts_repetitions_to_one_on_new_word() {
        let now = at_epoch();
        let (state, next_due) = schedule(None, Grade::Barely, now);

        assert_eq!(state.repetitions, 1);
        assert_eq!(state.interval, 0.2);
        // No prior grade, so the first-barely offset applies.
        assert_eq!(next_due, Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap());
    }

    #[test]
    fn recovery_after_failure_uses_twelve_hour_interval() {
        let now = at_epoch();
        let state = ScheduleState {
            easiness: 2.25,
            interval: 0.0,
            repetitions: 0,
            next_due: now,
            last_grade: Some(Grade::Not),
        };

        let (updated, next_due) = schedule(Some(&state), Grade::Recognize, now);

        assert_eq!(updated.repetitions, 1);
        assert_eq!(updated.interval, 0.5);
        assert_eq!(next_due, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn recovery_walks_half_one_and_a_half_three() {
        let now = at_epoch();
        let mut state = ScheduleState {
            easiness: 2.0,
            interval: 0.0,
            repetitions: 0,
            next_due: now,
            last_grade: Some(Grade::Not),
        };

        let mut intervals = Vec::new();
        for _ in 0..3 {
            // Re-enter recovery before each step so the gentle tier applies.
            state.last_grade = Some(Grade::Barely);
            let (updated, _) = schedule(Some(&state), Grade::Recognize, now);
            intervals.push(updated.interval);
            state = updated;
        }

        assert_eq!(intervals, vec![0.5, 1.5, 3.0]);
    }

    #[test]
    fn recovery_past_three_repetitions_grows_normally() {
        let now = at_epoch();
        let state = ScheduleState {
            easiness: 2.0,
            interval: 3.0,
            repetitions: 3,
            next_due: now,
            last_grade: Some(Grade::Barely),
        };

        let (updated, _) = schedule(Some(&state), Grade::Recognize, now);

        // The gentle tiers only cover repetitions 1-3; rep 4 grows with the
        // full pre-update easiness.
        assert_eq!(updated.repetitions, 4);
        assert_eq!(updated.interval, 6.0);
    }

    #[test]
    fn easiness_never_drops_below_floor() {
        let now = at_epoch();
        let mut state: Option<ScheduleState> = None;
        for _ in 0..20 {
            let (updated, _) = schedule(state.as_ref(), Grade::Not, now);
            assert!(updated.easiness >= MIN_EASINESS);
            state = Some(updated);
        }
        assert_eq!(state.unwrap().easiness, MIN_EASINESS);
    }

    #[test]
    fn easiness_growth_is_uncapped() {
        let now = at_epoch();
        let mut state: Option<ScheduleState> = None;
        for _ in 0..40 {
            let (updated, _) = schedule(state.as_ref(), Grade::Recognize, now);
            state = Some(updated);
        }
        assert!(state.unwrap().easiness > 6.0);
    }

    #[test]
    fn easiness_is_rounded_to_four_decimals() {
        let now = at_epoch();
        let state = ScheduleState {
            easiness: 2.123_456,
            interval: 1.0,
            repetitions: 1,
            next_due: now,
            last_grade: Some(Grade::Recognize),
        };

        let (updated, _) = schedule(Some(&state), Grade::Barely, now);

        assert_eq!(updated.easiness, 1.9735);
    }

    #[test]
    fn schedule_is_deterministic() {
        let now = at_epoch();
        let state = ScheduleState {
            easiness: 2.4,
            interval: 5.0,
            repetitions: 4,
            next_due: now,
            last_grade: Some(Grade::Recognize),
        };

        let a = schedule(Some(&state), Grade::Barely, now);
        let b = schedule(Some(&state), Grade::Barely, now);

        assert_eq!(a, b);
    }

    #[test]
    fn grade_labels_round_trip() {
        for grade in [Grade::Recognize, Grade::Barely, Grade::Not] {
            let parsed: Grade = grade.as_str().parse().unwrap();
            assert_eq!(parsed, grade);
            let json = serde_json::to_string(&grade).unwrap();
            assert_eq!(json, format!("\"{}\"", grade.as_str()));
        }
        assert!("easy".parse::<Grade>().is_err());
    }
}
