use crate::session::{Outcome, Session};
use itertools::Itertools;
use std::collections::HashMap;
use std::time::SystemTime;

/// Substitute typing rate (chars per millisecond) used for the remaining-time
/// estimate before any character has been typed.
const EPSILON_CHARS_PER_MS: f64 = 1e-6;

/// Snapshot of derived metrics for one session at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stats {
    pub wpm: f64,
    pub accuracy: f64,
    pub elapsed_secs: f64,
    /// Errors per typed character, 0.0..=1.0 scale.
    pub error_rate: f64,
    pub current_streak: usize,
    pub longest_streak: usize,
    pub keystrokes_per_minute: f64,
    pub chars_per_second: f64,
    pub estimated_remaining_secs: f64,
}

/// Compute live statistics for a session.
///
/// Pure function of the session and the supplied clock: it never mutates
/// the session, so the tick loop can poll it while the keystroke processor
/// owns the writes. All rate metrics are zero before the first keystroke.
pub fn compute_stats(session: &Session, now: SystemTime) -> Stats {
    let started = match session.started_at {
        Some(t) => t,
        None => return Stats::default(),
    };

    let end = session.finished_at.unwrap_or(now);
    let elapsed_secs = end
        .duration_since(started)
        .unwrap_or_default()
        .as_secs_f64();
    let elapsed_mins = elapsed_secs / 60.0;

    let pos = session.cursor_pos as f64;
    let word_count = pos / 5.0;

    let wpm = if elapsed_mins > 0.0 {
        (word_count / elapsed_mins).round()
    } else {
        0.0
    };

    let attempts = session.cursor_pos.max(1) as f64;
    let accuracy = ((1.0 - session.error_count as f64 / attempts) * 100.0)
        .round()
        .max(0.0);
    let error_rate = session.error_count as f64 / attempts;

    let (current_streak, longest_streak) = streaks(session);

    let keystrokes_per_minute = if elapsed_mins > 0.0 {
        (pos / elapsed_mins).round()
    } else {
        0.0
    };

    let chars_per_second = if elapsed_secs > 0.0 {
        (pos / elapsed_secs * 10.0).round() / 10.0
    } else {
        0.0
    };

    let estimated_remaining_secs = {
        let elapsed_ms = (elapsed_secs * 1000.0).max(1.0);
        let chars_per_ms = if session.cursor_pos == 0 {
            EPSILON_CHARS_PER_MS
        } else {
            pos / elapsed_ms
        };
        let remaining = session.remaining_chars() as f64;
        (remaining / chars_per_ms / 1000.0).round().max(0.0)
    };

    Stats {
        wpm,
        accuracy,
        elapsed_secs,
        error_rate,
        current_streak,
        longest_streak,
        keystrokes_per_minute,
        chars_per_second,
        estimated_remaining_secs,
    }
}

/// Current streak (consecutive correct entries walking back from the
/// cursor) and longest streak anywhere in the typed prefix.
fn streaks(session: &Session) -> (usize, usize) {
    let typed = &session.typed;

    let current = typed
        .iter()
        .rev()
        .take_while(|t| t.outcome == Outcome::Correct)
        .count();

    let mut longest = 0usize;
    let mut run = 0usize;
    for t in typed {
        if t.outcome == Outcome::Correct {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    (current, longest)
}

/// Per-second cumulative WPM series for the results chart.
///
/// Buckets correct keystrokes into whole-second intervals from the session
/// start and yields `(second, wpm-so-far)` points.
pub fn wpm_points(session: &Session) -> Vec<(f64, f64)> {
    let started = match session.started_at {
        Some(t) => t,
        None => return Vec::new(),
    };

    let per_second: Vec<(f64, f64)> = session
        .typed
        .iter()
        .filter(|t| t.outcome == Outcome::Correct)
        .fold(HashMap::new(), |mut map: HashMap<u64, f64>, t| {
            let secs = t
                .timestamp
                .duration_since(started)
                .unwrap_or_default()
                .as_secs_f64();
            // the opening keystroke lands in bucket 1
            let bucket = secs.ceil().max(1.0) as u64;
            *map.entry(bucket).or_insert(0.0) += 1.0;
            map
        })
        .into_iter()
        .map(|(k, v)| (k as f64, v))
        .sorted_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .collect();

    let mut correct_so_far = 0.0;
    per_second
        .into_iter()
        .map(|(t, count)| {
            correct_so_far += count;
            (t, (60.0 / t) * correct_so_far / 5.0)
        })
        .collect()
}

/// Standard deviation of correct keystrokes per whole second; a rough
/// consistency measure shown on the results screen.
pub fn pace_std_dev(session: &Session) -> f64 {
    let started = match session.started_at {
        Some(t) => t,
        None => return 0.0,
    };

    let mut buckets: HashMap<u64, f64> = HashMap::new();
    for t in session.typed.iter().filter(|t| t.outcome == Outcome::Correct) {
        let secs = t
            .timestamp
            .duration_since(started)
            .unwrap_or_default()
            .as_secs_f64();
        *buckets.entry(secs.ceil().max(1.0) as u64).or_insert(0.0) += 1.0;
    }

    let counts: Vec<f64> = buckets.into_values().collect();
    std_dev(&counts).unwrap_or(0.0)
}

fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

fn std_dev(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let variance = data.iter().map(|v| (m - v) * (m - v)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}
