//! Practice priority and weighted word selection
//!
//! Priority = base(mastery) * staleness(last practiced) + new-word bonus.
//! Words are drawn by roulette-wheel selection without replacement, so
//! low-mastery and stale words come up more often but every word can.

use chrono::{DateTime, Utc};
use rand::Rng;

use super::mastery::calculate_mastery;
use super::models::WordPracticeRecord;
use super::store::PracticeRecordStore;

/// Default number of words per practice round
pub const MAX_RANDOM_WORDS: usize = 5;

/// Priority of a fully mastered word before staleness
const MIN_BASE_PRIORITY: f64 = 0.1;

/// Hours after which a word counts as fully stale
const STALENESS_SATURATION_HOURS: f64 = 24.0 * 7.0;

/// Extra multiplier reached at full staleness
const MAX_STALENESS_BOOST: f64 = 2.0;

/// Added for words that were never attempted
const NEW_WORD_BONUS: f64 = 1.0;

/// Scheduling weight of a word
pub fn calculate_priority(
    mastery_score: u8,
    last_practiced_at: Option<DateTime<Utc>>,
    total_attempts: u32,
    now: DateTime<Utc>,
) -> f64 {
    let mastery = mastery_score.min(100) as f64;
    let base = MIN_BASE_PRIORITY + (1.0 - MIN_BASE_PRIORITY) * (100.0 - mastery) / 100.0;

    let staleness = match last_practiced_at {
        Some(at) => {
            let hours = (now - at).num_seconds().max(0) as f64 / 3600.0;
            1.0 + MAX_STALENESS_BOOST * (hours / STALENESS_SATURATION_HOURS).min(1.0)
        }
        None => 1.0 + MAX_STALENESS_BOOST,
    };

    let bonus = if total_attempts == 0 { NEW_WORD_BONUS } else { 0.0 };

    base * staleness + bonus
}

/// Priority of a record, scored against the store's speed baseline
pub fn record_priority(store: &PracticeRecordStore, record: &WordPracticeRecord, now: DateTime<Utc>) -> f64 {
    let mastery = calculate_mastery(record, store.speed_reference(&record.word));
    calculate_priority(
        mastery.score,
        record.last_practiced_at,
        record.total_attempts,
        now,
    )
}

/// Pick up to `max` items without replacement, biased by weight.
///
/// Weights that are negative or not finite count as zero. When every
/// remaining weight is zero the round falls back to a uniform pick.
pub fn weighted_sample<T, R: Rng + ?Sized>(candidates: Vec<(T, f64)>, max: usize, rng: &mut R) -> Vec<T> {
    let mut available: Vec<(T, f64)> = candidates
        .into_iter()
        .map(|(item, weight)| {
            let weight = if weight.is_finite() && weight > 0.0 { weight } else { 0.0 };
            (item, weight)
        })
        .collect();

    let rounds = max.min(available.len());
    let mut selected = Vec::with_capacity(rounds);

    for _ in 0..rounds {
        let total: f64 = available.iter().map(|(_, weight)| weight).sum();

        let index = if total > 0.0 {
            let mut remaining = rng.gen::<f64>() * total;
            let mut chosen = available.len() - 1;
            for (i, (_, weight)) in available.iter().enumerate() {
                remaining -= weight;
                if remaining <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            rng.gen_range(0..available.len())
        };

        let (item, _) = available.remove(index);
        selected.push(item);
    }

    selected
}

/// Choose the next `(word, translation)` pairs to practice
pub fn select_words<R: Rng + ?Sized>(
    store: &PracticeRecordStore,
    max: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<(String, String)> {
    let candidates = store
        .records()
        .map(|record| {
            (
                (record.word.clone(), record.translation.clone()),
                record_priority(store, record, now),
            )
        })
        .collect();

    weighted_sample(candidates, max, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_priority_decreases_with_mastery() {
        let now = Utc::now();
        let last = Some(now - Duration::hours(5));
        let mut previous = f64::INFINITY;
        for score in 0..=100u8 {
            let priority = calculate_priority(score, last, 3, now);
            assert!(priority < previous);
            previous = priority;
        }
    }

    #[test]
    fn test_priority_grows_with_staleness_then_saturates() {
        let now = Utc::now();
        let fresh = calculate_priority(50, Some(now), 4, now);
        let day = calculate_priority(50, Some(now - Duration::days(1)), 4, now);
        let week = calculate_priority(50, Some(now - Duration::days(7)), 4, now);
        let month = calculate_priority(50, Some(now - Duration::days(30)), 4, now);

        assert!(fresh < day);
        assert!(day < week);
        assert_eq!(week, month);
    }

    #[test]
    fn test_new_words_outrank_stale_low_mastery_words() {
        let now = Utc::now();
        let new_word = calculate_priority(0, None, 0, now);
        let stale = calculate_priority(0, Some(now - Duration::days(365)), 6, now);

        assert!(new_word >= stale);
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        let picked: Vec<&str> = weighted_sample(Vec::new(), 5, &mut rng());
        assert!(picked.is_empty());
    }

    #[test]
    fn test_sample_size_and_no_duplicates() {
        let candidates: Vec<(usize, f64)> = (0..8).map(|i| (i, (i + 1) as f64)).collect();

        let picked = weighted_sample(candidates.clone(), 5, &mut rng());
        assert_eq!(picked.len(), 5);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 5);

        let all = weighted_sample(candidates, 20, &mut rng());
        assert_eq!(all.len(), 8);
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let candidates = vec![("a", 0.0), ("b", 0.0), ("c", f64::NAN), ("d", -3.0)];
        let picked = weighted_sample(candidates, 4, &mut rng());

        assert_eq!(picked.len(), 4);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_selection_is_biased_towards_high_priority() {
        let mut rng = rng();
        let mut heavy = 0;
        let trials = 2000;
        for _ in 0..trials {
            let picked = weighted_sample(vec![("heavy", 50.0), ("light", 1.0)], 1, &mut rng);
            if picked[0] == "heavy" {
                heavy += 1;
            }
        }

        // Expected ~98%; leave a wide margin
        assert!(heavy > trials * 9 / 10);
    }

    #[test]
    fn test_select_words_from_store() {
        let mut store = PracticeRecordStore::new();
        store.add("sol", "sun", "1");
        store.add("luna", "moon", "2");
        store.add("agua", "water", "3");
        for _ in 0..10 {
            store.record_correct("sol", 1.0);
        }

        let picked = select_words(&store, 2, Utc::now(), &mut rng());
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0].0, picked[1].0);
        for (word, translation) in &picked {
            assert_eq!(store.get(word).unwrap().translation, *translation);
        }

        let empty = PracticeRecordStore::new();
        assert!(select_words(&empty, 5, Utc::now(), &mut rng()).is_empty());
    }

    #[test]
    fn test_practiced_word_is_picked_less_often() {
        let mut store = PracticeRecordStore::new();
        store.add("sol", "sun", "1");
        store.add("luna", "moon", "2");
        for _ in 0..10 {
            store.record_correct("sol", 1.0);
        }
        store.record_incorrect("luna");

        let mut rng = rng();
        let now = Utc::now();
        let mut luna_first = 0;
        for _ in 0..1000 {
            if select_words(&store, 1, now, &mut rng)[0].0 == "luna" {
                luna_first += 1;
            }
        }
        assert!(luna_first > 500);
    }
}
