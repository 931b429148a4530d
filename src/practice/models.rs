//! Data models for word practice tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of recall durations kept per word
pub const MAX_INPUT_TIMES: usize = 20;

/// Practice statistics for a single vocabulary word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPracticeRecord {
    pub word: String,
    pub translation: String,
    #[serde(default)]
    pub correct_count: u32,
    #[serde(default)]
    pub total_attempts: u32,
    /// Recall durations in seconds, oldest first
    #[serde(default)]
    pub input_times: Vec<f64>,
    #[serde(default)]
    pub last_practiced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Remote document id
    pub id: String,
}

impl WordPracticeRecord {
    pub fn new(word: String, translation: String, id: String) -> Self {
        Self {
            word,
            translation,
            correct_count: 0,
            total_attempts: 0,
            input_times: Vec::new(),
            last_practiced_at: None,
            created_at: Utc::now(),
            id,
        }
    }

    /// Record a correct recall that took `input_time` seconds
    pub fn push_correct(&mut self, input_time: f64, at: DateTime<Utc>) {
        self.total_attempts += 1;
        self.correct_count += 1;
        self.input_times.push(input_time);
        if self.input_times.len() > MAX_INPUT_TIMES {
            let excess = self.input_times.len() - MAX_INPUT_TIMES;
            self.input_times.drain(..excess);
        }
        self.last_practiced_at = Some(at);
    }

    /// Record a failed recall (hint revealed)
    pub fn push_incorrect(&mut self, at: DateTime<Utc>) {
        self.total_attempts += 1;
        self.last_practiced_at = Some(at);
    }

    /// Clear counters and timings, keeping the word itself
    pub fn reset(&mut self) {
        self.correct_count = 0;
        self.total_attempts = 0;
        self.input_times.clear();
        self.last_practiced_at = None;
    }

    pub fn average_input_time(&self) -> Option<f64> {
        average(&self.input_times)
    }

    pub fn length_category(&self) -> LengthCategory {
        LengthCategory::of(&self.word)
    }

    /// Snapshot of the fields mirrored to the remote store
    pub fn attempt_snapshot(&self) -> AttemptSnapshot {
        AttemptSnapshot {
            correct_count: self.correct_count,
            total_attempts: self.total_attempts,
            input_times: self.input_times.clone(),
        }
    }

    /// Overwrite counters and timings with a snapshot not yet written remotely
    pub fn apply_attempt_snapshot(&mut self, snapshot: &AttemptSnapshot) {
        self.correct_count = snapshot.correct_count;
        self.total_attempts = snapshot.total_attempts;
        self.input_times = snapshot.input_times.clone();
    }
}

/// Counter and timing fields written to the remote store for an attempt
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSnapshot {
    pub correct_count: u32,
    pub total_attempts: u32,
    pub input_times: Vec<f64>,
}

/// Word length band used to compare typing speed across similar words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthCategory {
    /// Up to 5 characters
    Short,
    /// 6 to 10 characters
    Medium,
    /// More than 10 characters
    Long,
}

impl LengthCategory {
    pub fn of(word: &str) -> Self {
        match word.chars().count() {
            0..=5 => Self::Short,
            6..=10 => Self::Medium,
            _ => Self::Long,
        }
    }
}

pub(crate) fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
