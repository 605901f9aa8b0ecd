use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Everything the main loop reacts to.
#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    Key(KeyEvent),
    Paste(String),
    Resize,
    Tick,
}

/// Where events come from: the terminal in production, a channel in tests.
pub trait EventSource {
    /// The next event, or `None` once `timeout` has elapsed.
    fn next_event(&self, timeout: Duration) -> Option<AppEvent>;
}

/// Polls the terminal directly. The main loop is the only consumer, so
/// there is no reader thread to shut down on exit.
pub struct CrosstermEventSource;

impl EventSource for CrosstermEventSource {
    fn next_event(&self, timeout: Duration) -> Option<AppEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining).unwrap_or(false) {
                return None;
            }
            match event::read() {
                // key-up events show up on some terminals; only presses count
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    return Some(AppEvent::Key(key));
                }
                Ok(CtEvent::Paste(text)) => return Some(AppEvent::Paste(text)),
                Ok(CtEvent::Resize(_, _)) => return Some(AppEvent::Resize),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Replays queued events, for driving the app without a terminal.
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn next_event(&self, timeout: Duration) -> Option<AppEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Turns a quiet event source into a steady tick, which drives the live
/// stats refresh and the plan-fetch poll.
pub struct Runner<E: EventSource> {
    source: E,
    tick_rate: Duration,
}

impl<E: EventSource> Runner<E> {
    pub fn new(source: E, tick_rate: Duration) -> Self {
        Self { source, tick_rate }
    }

    /// Blocks for at most one tick interval.
    pub fn step(&self) -> AppEvent {
        self.source
            .next_event(self.tick_rate)
            .unwrap_or(AppEvent::Tick)
    }
}
