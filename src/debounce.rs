use std::time::{Duration, Instant};

/// A delayed value that is replaced, and its timer restarted, on every
/// `schedule`. Polled from the frame loop; nothing runs on its own.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Cancels whatever was pending and starts a fresh window at `now`.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.window));
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Time left until the pending value fires, zero if overdue.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline().map(|at| at.saturating_duration_since(now))
    }

    /// Hands out the pending value once its window has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = matches!(self.pending, Some((_, at)) if now >= at);
        if due {
            self.cancel()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    #[test]
    fn fires_after_quiet_window() {
        let start = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        d.schedule("wid", start);

        assert_eq!(d.poll(start + Duration::from_millis(299)), None);
        assert_eq!(d.poll(start + WINDOW), Some("wid"));
        assert!(!d.is_pending());
        assert_eq!(d.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn each_keystroke_restarts_the_window() {
        let start = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        d.schedule("w", start);
        d.schedule("wi", start + Duration::from_millis(200));
        d.schedule("wid", start + Duration::from_millis(400));

        assert_eq!(d.poll(start + Duration::from_millis(600)), None);
        assert_eq!(
            d.remaining(start + Duration::from_millis(600)),
            Some(Duration::from_millis(100))
        );
        assert_eq!(d.poll(start + Duration::from_millis(700)), Some("wid"));
    }

    #[test]
    fn cancel_drops_pending_value() {
        let start = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        d.schedule(1, start);
        assert_eq!(d.cancel(), Some(1));
        assert_eq!(d.poll(start + WINDOW), None);
        assert_eq!(d.deadline(), None);
    }
}
