// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebounceTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Scheduled {
        ticket: DebounceTicket,
        deadline: Instant,
    },
}

/// Cancel-and-reschedule save timer. Holds no task; the caller sleeps until
/// the deadline and then asks whether its ticket is still the live one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
    issued: u64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
            issued: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self.state, DebounceState::Scheduled { .. })
    }

    /// Restarts the timer. Any earlier ticket becomes stale.
    pub fn schedule(&mut self, now: Instant) -> (DebounceTicket, Instant) {
        self.issued += 1;
        let ticket = DebounceTicket(self.issued);
        let deadline = now + self.delay;
        self.state = DebounceState::Scheduled { ticket, deadline };
        (ticket, deadline)
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }

    /// Consumes the schedule if `ticket` is still current.
    pub fn fire(&mut self, ticket: DebounceTicket) -> bool {
        match self.state {
            DebounceState::Scheduled { ticket: live, .. } if live == ticket => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::{DebounceState, Debouncer};
    use std::time::Duration;
    use tokio::time::Instant;

    #[test]
    fn rescheduling_supersedes_the_previous_ticket() {
        let mut debouncer = Debouncer::new(Duration::from_millis(250));
        let now = Instant::now();

        let (first, _) = debouncer.schedule(now);
        let (second, deadline) = debouncer.schedule(now + Duration::from_millis(100));
        assert_eq!(deadline, now + Duration::from_millis(350));

        assert!(!debouncer.fire(first));
        assert!(debouncer.is_scheduled());
        assert!(debouncer.fire(second));
        assert_eq!(debouncer.state(), DebounceState::Idle);
        assert!(!debouncer.fire(second));
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut debouncer = Debouncer::default();
        let (ticket, _) = debouncer.schedule(Instant::now());
        debouncer.cancel();
        assert!(!debouncer.is_scheduled());
        assert!(!debouncer.fire(ticket));
    }
}
