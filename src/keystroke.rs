use crate::error_freq::ErrorFrequencyMap;
use crate::session::{ErrorEvent, MismatchPolicy, Outcome, Session, TypedChar};
use std::time::SystemTime;

/// What a single call to [`apply`] did to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Character matched and the cursor advanced.
    Advanced,
    /// Character matched, the cursor advanced, and the session just
    /// finished. Emitted exactly once per session.
    Completed,
    /// Mismatch under block-on-error: recorded, input discarded, cursor
    /// unchanged.
    Rejected,
    /// Mismatch under advance-on-error: recorded at the cursor position,
    /// cursor advanced anyway.
    AdvancedWithError,
    /// Input did not qualify (control character) or the session was
    /// already complete. The session was not touched.
    Ignored,
}

impl Applied {
    pub fn completed(self) -> bool {
        self == Applied::Completed
    }
}

/// Apply one input character to the session.
///
/// Control characters never mutate the session; a complete session is a
/// terminal state and further input is a no-op. Every processed character,
/// correct or not, is reported to the error-frequency aggregator.
pub fn apply(session: &mut Session, input: char, freq: &mut ErrorFrequencyMap) -> Applied {
    apply_at(session, input, freq, SystemTime::now())
}

/// [`apply`] with an explicit clock, so tests control timestamps.
pub fn apply_at(
    session: &mut Session,
    input: char,
    freq: &mut ErrorFrequencyMap,
    now: SystemTime,
) -> Applied {
    if input.is_control() {
        return Applied::Ignored;
    }

    let expected = match session.expected_char(session.cursor_pos) {
        Some(c) => c,
        None => return Applied::Ignored, // already complete
    };

    if session.started_at.is_none() {
        session.started_at = Some(now);
    }

    freq.record(expected, input);

    let result = if input == expected {
        session.typed.push(TypedChar {
            char: input,
            outcome: Outcome::Correct,
            timestamp: now,
        });
        session.cursor_pos += 1;
        finish_if_done(session, now)
    } else {
        session.error_count += 1;
        session.error_events.push(ErrorEvent {
            index: session.cursor_pos,
            expected,
            actual: input,
        });

        match session.policy {
            MismatchPolicy::Block => Applied::Rejected,
            MismatchPolicy::Advance => {
                session.typed.push(TypedChar {
                    char: input,
                    outcome: Outcome::Incorrect,
                    timestamp: now,
                });
                session.cursor_pos += 1;
                match finish_if_done(session, now) {
                    Applied::Completed => Applied::Completed,
                    _ => Applied::AdvancedWithError,
                }
            }
        }
    };

    session.debug_check_invariants();
    result
}

fn finish_if_done(session: &mut Session, now: SystemTime) -> Applied {
    if session.is_complete() && session.finished_at.is_none() {
        session.finished_at = Some(now);
        Applied::Completed
    } else {
        Applied::Advanced
    }
}

/// Decompose multi-character input (paste, IME commit) into single-character
/// applications. Returns the result of the last processed character, or
/// `Ignored` for an empty string.
pub fn apply_str(session: &mut Session, input: &str, freq: &mut ErrorFrequencyMap) -> Applied {
    let mut last = Applied::Ignored;
    for c in input.chars() {
        let applied = apply(session, c, freq);
        if applied != Applied::Ignored {
            last = applied;
        }
        if applied == Applied::Completed {
            break;
        }
    }
    last
}
