use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-character attempt/error tallies plus a histogram of what was typed
/// instead when the character was missed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharErrorStats {
    pub attempts: u32,
    pub errors: u32,
    #[serde(default)]
    pub incorrect_replacements: HashMap<char, u32>,
}

impl CharErrorStats {
    pub fn miss_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.errors as f64 / self.attempts as f64
        }
    }
}

/// Aggregate per-character mistake statistics for one practice run.
///
/// State only ever grows; `reset` is an explicit action taken when the
/// user starts a new practice run, never automatic. Serializable because
/// it doubles as the practice-generator request body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrequencyMap {
    entries: HashMap<char, CharErrorStats>,
}

impl ErrorFrequencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one processed keystroke against its expected character.
    pub fn record(&mut self, expected: char, actual: char) {
        let entry = self.entries.entry(expected).or_default();
        entry.attempts += 1;
        if expected != actual {
            entry.errors += 1;
            *entry.incorrect_replacements.entry(actual).or_insert(0) += 1;
        }
        debug_assert!(entry.errors <= entry.attempts);
    }

    pub fn get(&self, c: char) -> Option<&CharErrorStats> {
        self.entries.get(&c)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_attempts(&self) -> u32 {
        self.entries.values().map(|s| s.attempts).sum()
    }

    pub fn total_errors(&self) -> u32 {
        self.entries.values().map(|s| s.errors).sum()
    }

    /// Top-N characters by miss rate, ties broken by raw error count.
    /// Characters never missed are excluded.
    pub fn top_problem_chars(&self, n: usize) -> Vec<(char, &CharErrorStats)> {
        let mut ranked: Vec<(char, &CharErrorStats)> = self
            .entries
            .iter()
            .filter(|(_, s)| s.errors > 0)
            .map(|(c, s)| (*c, s))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.miss_rate()
                .partial_cmp(&a.1.miss_rate())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.errors.cmp(&a.1.errors))
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(n);
        ranked
    }

    /// Explicit new-practice-run reset.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
