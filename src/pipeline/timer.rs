//! One-shot timer slots owned by the coordinator.
//!
//! A slot holds at most one deadline. Scheduling replaces whatever was
//! pending, so each purpose (debounce, buffer, restart) can never have two
//! live timers.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimerSlot {
    deadline: Option<Instant>,
}

impl TimerSlot {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Cancel any pending deadline and arm a new one `after` from now.
    pub fn schedule(&mut self, after: Duration) {
        self.cancel();
        self.deadline = Some(Instant::now() + after);
    }

    /// Disarm. Returns whether a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm if the deadline has passed. Returns whether it fired.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if d <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn wait(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_deadline() {
        let mut slot = TimerSlot::new();
        slot.schedule(Duration::from_secs(2));
        let first = slot.deadline();
        tokio::time::advance(Duration::from_secs(1)).await;
        slot.schedule(Duration::from_secs(2));
        assert!(slot.deadline() > first);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once() {
        let mut slot = TimerSlot::new();
        slot.schedule(Duration::from_millis(500));
        assert!(!slot.take_if_due(Instant::now()));
        wait(slot.deadline()).await;
        assert!(slot.take_if_due(Instant::now()));
        assert!(!slot.take_if_due(Instant::now()));
        assert!(!slot.is_armed());
    }

    #[test]
    fn cancel_reports_pending() {
        let mut slot = TimerSlot::new();
        assert!(!slot.cancel());
    }
}
