/// Easiness factor assigned to a never-reviewed word.
pub const INITIAL_EASINESS: f64 = 2.5;

/// Hard floor for the easiness factor; no grade sequence goes below it.
pub const MIN_EASINESS: f64 = 1.3;

/// Easiness below which a word counts as struggling for session composition.
pub const STRUGGLING_EASINESS_THRESHOLD: f64 = 1.7;

/// Interval (days) below which a started word counts as struggling.
pub const STRUGGLING_INTERVAL_THRESHOLD: f64 = 1.0;

/// Default session goal when the caller has no remaining daily target.
pub const DEFAULT_DAILY_WORDS: u32 = 20;

/// Smallest queue a new review session is built with.
pub const MIN_SESSION_BATCH: usize = 10;

/// Largest queue a new review session is built with.
pub const MAX_SESSION_BATCH: usize = 100;

/// Share of a session reserved for words the learner marked unfamiliar.
pub const UNFAMILIAR_SHARE: f64 = 0.25;

/// Share of a session reserved for struggling words.
pub const STRUGGLING_SHARE: f64 = 0.30;

/// Share of a session reserved for due reviews.
pub const DUE_REVIEW_SHARE: f64 = 0.30;

/// Share of a session reserved for unseen words.
pub const NEW_WORD_SHARE: f64 = 0.15;

/// Queue positions ahead of which a "barely" card is reinserted.
pub const REQUEUE_OFFSET_BARELY: usize = 2;

/// Queue positions ahead of which a "not" card is reinserted.
pub const REQUEUE_OFFSET_NOT: usize = 1;
