//! Deadline bookkeeping for reconnects and the typing debounce.
//!
//! Nothing here sleeps. Callers pass the current `Instant` and act on the
//! returned decisions.

use std::time::{Duration, Instant};

/// Fixed-interval reconnect with no attempt cap.
#[derive(Debug)]
pub struct ReconnectPolicy {
    delay: Duration,
    next_attempt: Option<Instant>,
    attempts: u64,
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_attempt: None,
            attempts: 0,
        }
    }

    pub fn schedule(&mut self, now: Instant) -> Instant {
        let at = now + self.delay;
        self.next_attempt = Some(at);
        at
    }

    /// Consumes the pending attempt when it is due.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.next_attempt {
            Some(at) if now >= at => {
                self.next_attempt = None;
                self.attempts += 1;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.next_attempt = None;
    }

    pub fn reset(&mut self) {
        self.next_attempt = None;
        self.attempts = 0;
    }

    pub fn next_attempt(&self) -> Option<Instant> {
        self.next_attempt
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

/// Tracks whether the local user is currently signalling "typing".
#[derive(Debug)]
pub struct TypingDebounce {
    idle: Duration,
    deadline: Option<Instant>,
}

impl TypingDebounce {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            deadline: None,
        }
    }

    /// Records a keystroke. Returns true when an indicator should be sent.
    pub fn keystroke(&mut self, now: Instant) -> bool {
        let starting = !self.is_typing(now);
        self.deadline = Some(now + self.idle);
        starting
    }

    pub fn is_typing(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now < deadline)
    }

    /// Clears the flag once the idle window has passed.
    pub fn expire(&mut self, now: Instant) {
        if self.deadline.is_some_and(|deadline| now >= deadline) {
            self.deadline = None;
        }
    }

    pub fn reset(&mut self) {
        self.deadline = None;
    }
}
