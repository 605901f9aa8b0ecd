use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Result of asking the limiter for one request slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Slots left in the current window after this decision.
    pub remaining: u32,
    /// Time until the current window resets.
    pub resets_in: Duration,
}

/// Fixed-window request limiter for the generator endpoints.
///
/// One instance is created at process start and injected wherever it is
/// needed; counters persist for the process lifetime and are cleared only
/// by an explicit [`reset`](Self::reset). An over-limit decision must not
/// be retried within the window.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    window: Duration,
    limit: u32,
    windows: HashMap<String, (SystemTime, u32)>,
}

impl FixedWindowRateLimiter {
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            window,
            limit,
            windows: HashMap::new(),
        }
    }

    /// Default quota for generator endpoints: 50 requests per 15 minutes.
    pub fn for_generators() -> Self {
        Self::new(Duration::from_secs(15 * 60), 50)
    }

    pub fn check(&mut self, client_id: &str) -> RateLimitDecision {
        self.check_at(client_id, SystemTime::now())
    }

    /// [`check`](Self::check) with an injected clock for tests.
    pub fn check_at(&mut self, client_id: &str, now: SystemTime) -> RateLimitDecision {
        let entry = self
            .windows
            .entry(client_id.to_string())
            .or_insert((now, 0));

        let window_end = entry.0 + self.window;
        if now >= window_end {
            *entry = (now, 0);
        }

        let resets_in = (entry.0 + self.window)
            .duration_since(now)
            .unwrap_or_default();

        if entry.1 < self.limit {
            entry.1 += 1;
            RateLimitDecision {
                allowed: true,
                remaining: self.limit - entry.1,
                resets_in,
            }
        } else {
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                resets_in,
            }
        }
    }

    /// Explicit reset of all counters.
    pub fn reset(&mut self) {
        self.windows.clear();
    }
}
