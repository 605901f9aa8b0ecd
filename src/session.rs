use std::time::SystemTime;

/// Outcome of a single accepted keystroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// One accepted keystroke, stored at its target-text index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TypedChar {
    pub char: char,
    pub outcome: Outcome,
    pub timestamp: SystemTime,
}

/// One recorded mismatch, in chronological order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorEvent {
    pub index: usize,
    pub expected: char,
    pub actual: char,
}

/// How the keystroke processor treats a mismatch.
///
/// `Block` rejects the incorrect character and keeps the cursor in place
/// until the expected character is typed. `Advance` records the incorrect
/// character at the cursor position and moves on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MismatchPolicy {
    #[default]
    Block,
    Advance,
}

/// Mutable state for one in-progress attempt at a fixed target text.
///
/// Mutated only by the keystroke processor; everything else reads it.
/// Replaced wholesale when the progression controller advances to the
/// next lesson or resets.
#[derive(Clone, Debug)]
pub struct Session {
    target: Vec<char>,
    pub typed: Vec<TypedChar>,
    pub cursor_pos: usize,
    pub error_count: usize,
    pub error_events: Vec<ErrorEvent>,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
    pub policy: MismatchPolicy,
}

impl Session {
    pub fn new(target_text: &str, policy: MismatchPolicy) -> Self {
        Self {
            target: target_text.chars().collect(),
            typed: Vec::new(),
            cursor_pos: 0,
            error_count: 0,
            error_events: Vec::new(),
            started_at: None,
            finished_at: None,
            policy,
        }
    }

    pub fn target_len(&self) -> usize {
        self.target.len()
    }

    pub fn target_text(&self) -> String {
        self.target.iter().collect()
    }

    /// Expected character at `idx`, or None past the end of the target.
    pub fn expected_char(&self, idx: usize) -> Option<char> {
        self.target.get(idx).copied()
    }

    pub fn remaining_chars(&self) -> usize {
        self.target.len().saturating_sub(self.cursor_pos)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor_pos >= self.target.len()
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Invariants from the data model; violations are logic defects, so
    /// they fail loudly in debug/test builds.
    pub(crate) fn debug_check_invariants(&self) {
        debug_assert!(
            self.cursor_pos <= self.target.len(),
            "cursor {} past target length {}",
            self.cursor_pos,
            self.target.len()
        );
        debug_assert_eq!(
            self.error_count,
            self.error_events.len(),
            "error_count diverged from error_events"
        );
        debug_assert!(
            self.typed.len() <= self.target.len(),
            "typed more entries than target has characters"
        );
    }
}
