//! Restart-on-event debouncer.
//!
//! Used to coalesce redraws during continuous terminal resizing: every new
//! event pushes the deadline out, and the action fires once after the
//! events stop. This is the only timing/coalescing policy in the core.

use std::time::{Duration, Instant};

/// Fires once, `delay` after the most recent trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    /// Note an event. Restarts the delay window from now.
    pub fn trigger(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    /// True while a fire is scheduled.
    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Check whether the window has elapsed. Returns true exactly once per
    /// quiet period; triggering again schedules a new fire.
    pub fn poll_ready(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_delay() {
        let mut d = Debouncer::new(Duration::from_millis(50));
        assert!(!d.pending());

        d.trigger();
        let start = Instant::now();
        assert!(d.pending());
        assert!(!d.poll_ready(start));
        assert!(d.poll_ready(start + Duration::from_millis(60)));

        // fires only once per quiet period
        assert!(!d.poll_ready(start + Duration::from_millis(120)));
        assert!(!d.pending());
    }

    #[test]
    fn test_new_event_restarts_window() {
        let mut d = Debouncer::new(Duration::from_millis(50));

        d.trigger();
        std::thread::sleep(Duration::from_millis(30));
        d.trigger();

        // 30ms after the first trigger but only just after the second:
        // the restarted window must not have fired yet
        assert!(!d.poll_ready(Instant::now()));
        assert!(d.poll_ready(Instant::now() + Duration::from_millis(60)));
    }
}
