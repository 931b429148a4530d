//! Word practice tracking
//!
//! This module provides:
//! - Per-word practice records with a sliding window of recall times
//! - Mastery scoring (accuracy, attempt volume, recall speed)
//! - Priority-weighted selection of the next words to practice

pub mod mastery;
pub mod models;
pub mod scheduler;
pub mod store;

pub use mastery::{calculate_mastery, MasteryLevel, MasteryResult};
pub use models::{AttemptSnapshot, LengthCategory, WordPracticeRecord, MAX_INPUT_TIMES};
pub use scheduler::{calculate_priority, select_words, weighted_sample, MAX_RANDOM_WORDS};
pub use store::{PracticeRecordStore, SharedRecords};
