//! In-memory table of per-word practice records
//!
//! The store performs no I/O. Every applied mutation bumps a version
//! counter that is published on a watch channel, so views and the sync
//! layer can react to changes without polling the records themselves.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;

use super::models::{average, LengthCategory, WordPracticeRecord};

/// Type alias for a store shared between the session, views and sync tasks
pub type SharedRecords = Arc<Mutex<PracticeRecordStore>>;

/// Practice records keyed by word
#[derive(Debug)]
pub struct PracticeRecordStore {
    records: BTreeMap<String, WordPracticeRecord>,
    version: u64,
    changes: watch::Sender<u64>,
}

impl Default for PracticeRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PracticeRecordStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            records: BTreeMap::new(),
            version: 0,
            changes,
        }
    }

    pub fn shared(self) -> SharedRecords {
        Arc::new(Mutex::new(self))
    }

    fn touch(&mut self) {
        self.version += 1;
        self.changes.send_replace(self.version);
    }

    /// Current change counter
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Receiver that observes every change to the store
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    // ==================== Mutations ====================

    /// Replace all records, e.g. after a full remote load
    pub fn set_all(&mut self, records: Vec<WordPracticeRecord>) {
        self.records = records
            .into_iter()
            .map(|record| (record.word.clone(), record))
            .collect();
        self.touch();
    }

    pub fn add(&mut self, word: &str, translation: &str, id: &str) {
        self.records.insert(
            word.to_string(),
            WordPracticeRecord::new(word.to_string(), translation.to_string(), id.to_string()),
        );
        self.touch();
    }

    pub fn delete(&mut self, word: &str) -> bool {
        let removed = self.records.remove(word).is_some();
        if removed {
            self.touch();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.touch();
    }

    /// Record a correct recall. Returns false if the word is unknown.
    ///
    /// Durations that are not positive finite numbers still count as an
    /// attempt but are left out of the timing window.
    pub fn record_correct(&mut self, word: &str, input_time_seconds: f64) -> bool {
        let Some(record) = self.records.get_mut(word) else {
            return false;
        };
        let now = Utc::now();
        if input_time_seconds.is_finite() && input_time_seconds > 0.0 {
            record.push_correct(input_time_seconds, now);
        } else {
            log::debug!(
                "Ignoring invalid input time {} for word '{}'",
                input_time_seconds,
                word
            );
            record.total_attempts += 1;
            record.correct_count += 1;
            record.last_practiced_at = Some(now);
        }
        self.touch();
        true
    }

    /// Record a failed recall. Returns false if the word is unknown.
    pub fn record_incorrect(&mut self, word: &str) -> bool {
        let Some(record) = self.records.get_mut(word) else {
            return false;
        };
        record.push_incorrect(Utc::now());
        self.touch();
        true
    }

    pub fn update_translation(&mut self, word: &str, translation: &str) -> bool {
        let Some(record) = self.records.get_mut(word) else {
            return false;
        };
        record.translation = translation.to_string();
        self.touch();
        true
    }

    pub fn reset(&mut self, word: &str) -> bool {
        let Some(record) = self.records.get_mut(word) else {
            return false;
        };
        record.reset();
        self.touch();
        true
    }

    pub fn reset_all(&mut self) {
        for record in self.records.values_mut() {
            record.reset();
        }
        self.touch();
    }

    // ==================== Reads ====================

    pub fn get(&self, word: &str) -> Option<&WordPracticeRecord> {
        self.records.get(word)
    }

    pub fn records(&self) -> impl Iterator<Item = &WordPracticeRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn word_id(&self, word: &str) -> Option<&str> {
        self.records.get(word).map(|r| r.id.as_str())
    }

    /// All `(word, translation)` pairs in key order
    pub fn translations(&self) -> Vec<(String, String)> {
        self.records
            .values()
            .map(|r| (r.word.clone(), r.translation.clone()))
            .collect()
    }

    pub fn total_attempts(&self, word: &str) -> u32 {
        self.records.get(word).map_or(0, |r| r.total_attempts)
    }

    pub fn correct_count(&self, word: &str) -> u32 {
        self.records.get(word).map_or(0, |r| r.correct_count)
    }

    pub fn input_times(&self, word: &str) -> &[f64] {
        self.records
            .get(word)
            .map_or(&[][..], |r| r.input_times.as_slice())
    }

    pub fn average_input_time(&self, word: &str) -> Option<f64> {
        average(self.input_times(word))
    }

    /// Average over every recorded input time of every word
    pub fn overall_average_input_time(&self) -> Option<f64> {
        let all: Vec<f64> = self
            .records
            .values()
            .flat_map(|r| r.input_times.iter().copied())
            .collect();
        average(&all)
    }

    pub fn average_input_time_by_length_category(&self, category: LengthCategory) -> Option<f64> {
        let times: Vec<f64> = self
            .records
            .values()
            .filter(|r| r.length_category() == category)
            .flat_map(|r| r.input_times.iter().copied())
            .collect();
        average(&times)
    }

    /// Baseline recall time to compare a word against: its length band's
    /// average, or the overall average when the band has no timings.
    pub fn speed_reference(&self, word: &str) -> Option<f64> {
        self.average_input_time_by_length_category(LengthCategory::of(word))
            .or_else(|| self.overall_average_input_time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(words: &[(&str, &str)]) -> PracticeRecordStore {
        let mut store = PracticeRecordStore::new();
        for (i, (word, translation)) in words.iter().enumerate() {
            store.add(word, translation, &format!("id-{}", i));
        }
        store
    }

    #[test]
    fn test_record_correct_updates_counters() {
        let mut store = store_with(&[("hola", "hello")]);

        assert!(store.record_correct("hola", 2.0));

        assert_eq!(store.correct_count("hola"), 1);
        assert_eq!(store.total_attempts("hola"), 1);
        assert_eq!(store.input_times("hola"), &[2.0]);
        assert!(store.get("hola").unwrap().last_practiced_at.is_some());
    }

    #[test]
    fn test_twenty_one_correct_attempts_keep_twenty_times() {
        let mut store = store_with(&[("hola", "hello")]);
        for i in 0..21 {
            store.record_correct("hola", 100.0 + i as f64);
        }

        let times = store.input_times("hola");
        assert_eq!(times.len(), 20);
        assert!(!times.contains(&100.0));
        assert_eq!(times[0], 101.0);
        assert_eq!(store.total_attempts("hola"), 21);
    }

    #[test]
    fn test_unknown_word_is_noop() {
        let mut store = store_with(&[("hola", "hello")]);
        let before = store.version();

        assert!(!store.record_correct("adios", 1.0));
        assert!(!store.record_incorrect("adios"));
        assert!(!store.update_translation("adios", "bye"));
        assert!(!store.reset("adios"));
        assert!(!store.delete("adios"));

        assert_eq!(store.version(), before);
        assert_eq!(store.total_attempts("adios"), 0);
        assert_eq!(store.correct_count("adios"), 0);
        assert!(store.input_times("adios").is_empty());
        assert_eq!(store.average_input_time("adios"), None);
    }

    #[test]
    fn test_invalid_input_time_counts_attempt_only() {
        let mut store = store_with(&[("hola", "hello")]);
        store.record_correct("hola", f64::NAN);
        store.record_correct("hola", -1.0);

        assert_eq!(store.correct_count("hola"), 2);
        assert!(store.input_times("hola").is_empty());
    }

    #[test]
    fn test_averages() {
        let mut store = store_with(&[("sol", "sun"), ("luna", "moon"), ("mariposa", "butterfly")]);
        store.record_correct("sol", 1.0);
        store.record_correct("sol", 3.0);
        store.record_correct("luna", 5.0);
        store.record_correct("mariposa", 8.0);

        assert_eq!(store.average_input_time("sol"), Some(2.0));
        assert_eq!(store.overall_average_input_time(), Some(17.0 / 4.0));
        assert_eq!(
            store.average_input_time_by_length_category(LengthCategory::Short),
            Some(3.0)
        );
        assert_eq!(
            store.average_input_time_by_length_category(LengthCategory::Medium),
            Some(8.0)
        );
        assert_eq!(store.average_input_time_by_length_category(LengthCategory::Long), None);
    }

    #[test]
    fn test_speed_reference_falls_back_to_overall() {
        let mut store = store_with(&[("sol", "sun"), ("electrodomestico", "appliance")]);
        store.record_correct("sol", 2.0);

        assert_eq!(store.speed_reference("sol"), Some(2.0));
        assert_eq!(store.speed_reference("electrodomestico"), Some(2.0));

        let empty = PracticeRecordStore::new();
        assert_eq!(empty.speed_reference("sol"), None);
    }

    #[test]
    fn test_reset_and_reset_all() {
        let mut store = store_with(&[("sol", "sun"), ("luna", "moon")]);
        store.record_correct("sol", 1.0);
        store.record_incorrect("luna");

        assert!(store.reset("sol"));
        assert_eq!(store.total_attempts("sol"), 0);
        assert_eq!(store.total_attempts("luna"), 1);

        store.reset_all();
        assert_eq!(store.total_attempts("luna"), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_set_all_replaces_contents() {
        let mut store = store_with(&[("sol", "sun")]);
        store.set_all(vec![WordPracticeRecord::new(
            "agua".to_string(),
            "water".to_string(),
            "doc-1".to_string(),
        )]);

        assert!(store.get("sol").is_none());
        assert_eq!(store.word_id("agua"), Some("doc-1"));
        assert_eq!(store.translations(), vec![("agua".to_string(), "water".to_string())]);
    }

    #[test]
    fn test_subscribers_see_changes() {
        let mut store = store_with(&[("sol", "sun")]);
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.record_incorrect("sol");

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), store.version());
    }
}
