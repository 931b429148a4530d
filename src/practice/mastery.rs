//! Mastery scoring
//!
//! A word's mastery is a weighted blend of three components, each in [0, 1]:
//! - Accuracy: correct answers over attempts (dominant term)
//! - Confidence: attempt volume, saturating at `CONFIDENCE_SATURATION`
//! - Speed: recall time relative to similar words (0.5 when unknown)
//!
//! The blend is then multiplied by a certainty factor that grows with attempt
//! volume, from `MIN_CERTAINTY` with no history to 1.0 at saturation. This is
//! an addition on top of the plain weighted sum: without it a single correct
//! answer scores 70 and lands in `Proficient`. The damped value is scaled to
//! 0-100 and bucketed into five equal-width levels.

use serde::{Deserialize, Serialize};

use super::models::WordPracticeRecord;

const ACCURACY_WEIGHT: f64 = 0.6;
const CONFIDENCE_WEIGHT: f64 = 0.25;
const SPEED_WEIGHT: f64 = 0.15;

/// Attempt count at which the confidence component is maxed out
const CONFIDENCE_SATURATION: u32 = 10;

/// Share of the blend kept at zero confidence
const MIN_CERTAINTY: f64 = 0.5;

/// Speed component used when there is no timing data to compare
const NEUTRAL_SPEED: f64 = 0.5;

/// Width of one mastery level in score points
const LEVEL_WIDTH: u8 = 20;

/// Discrete mastery band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MasteryLevel {
    New,
    Learning,
    Familiar,
    Proficient,
    Mastered,
}

impl MasteryLevel {
    pub fn from_score(score: u8) -> Self {
        match (score / LEVEL_WIDTH).min(4) {
            0 => Self::New,
            1 => Self::Learning,
            2 => Self::Familiar,
            3 => Self::Proficient,
            _ => Self::Mastered,
        }
    }

    /// Level as 0-4 for display
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Familiar => "familiar",
            Self::Proficient => "proficient",
            Self::Mastered => "mastered",
        }
    }
}

/// Result of scoring a word
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryResult {
    /// 0-100
    pub score: u8,
    pub level: MasteryLevel,
    pub accuracy: f64,
    pub confidence: f64,
    pub speed: f64,
}

impl MasteryResult {
    fn unpracticed() -> Self {
        Self {
            score: 0,
            level: MasteryLevel::New,
            accuracy: 0.0,
            confidence: 0.0,
            speed: NEUTRAL_SPEED,
        }
    }
}

/// Score a word's practice record
///
/// # Arguments
/// * `record` - The word's practice statistics
/// * `speed_reference` - Average recall time of comparable words, if known
pub fn calculate_mastery(record: &WordPracticeRecord, speed_reference: Option<f64>) -> MasteryResult {
    if record.total_attempts == 0 {
        return MasteryResult::unpracticed();
    }

    let accuracy = accuracy(record.correct_count, record.total_attempts);
    let confidence = confidence(record.total_attempts);
    let speed = speed(record.average_input_time(), speed_reference);

    let blended = ACCURACY_WEIGHT * accuracy + CONFIDENCE_WEIGHT * confidence + SPEED_WEIGHT * speed;
    let certainty = MIN_CERTAINTY + (1.0 - MIN_CERTAINTY) * confidence;
    let score = (blended * certainty * 100.0).round().clamp(0.0, 100.0) as u8;

    MasteryResult {
        score,
        level: MasteryLevel::from_score(score),
        accuracy,
        confidence,
        speed,
    }
}

fn accuracy(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (correct.min(total) as f64 / total as f64).clamp(0.0, 1.0)
}

fn confidence(total: u32) -> f64 {
    total.min(CONFIDENCE_SATURATION) as f64 / CONFIDENCE_SATURATION as f64
}

/// r / (1 + r) where r = reference / average: 0.5 at parity, approaching 1
/// for much faster recall and 0 for much slower recall.
fn speed(average: Option<f64>, reference: Option<f64>) -> f64 {
    match (average, reference) {
        (Some(avg), Some(reference)) if avg > 0.0 && reference > 0.0 => {
            let ratio = reference / avg;
            if ratio.is_finite() {
                ratio / (1.0 + ratio)
            } else {
                NEUTRAL_SPEED
            }
        }
        _ => NEUTRAL_SPEED,
    }
}
