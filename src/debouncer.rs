use std::time::{Duration, Instant};

/// A cancellable delayed action: holds the latest scheduled value and
/// releases it once `delay` has passed without another `schedule` call.
///
/// Time is passed in explicitly so callers (and tests) control the clock.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    /// The duration to wait after the last event before triggering
    delay: Duration,
    /// The value waiting to be committed and its deadline
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    /// Create a new debouncer with the specified delay in milliseconds
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `value` for `now + delay`, replacing anything already pending
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Take the pending value if its deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Get the time remaining before the action will trigger
    /// Returns None if no action is pending
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, deadline)| deadline.saturating_duration_since(now))
    }

    /// Cancel any pending action, returning the value that was waiting
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn pending_value(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value)
    }

    /// Check if there's a pending action
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(300);
        debouncer.schedule("abc", start);

        assert_eq!(debouncer.poll(start + Duration::from_millis(299)), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(300)), Some("abc"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + Duration::from_millis(900)), None);
    }

    #[test]
    fn test_new_event_restarts_timer() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(300);
        debouncer.schedule("a", start);
        debouncer.schedule("al", start + Duration::from_millis(200));

        // 300ms after the first keystroke but only 100ms after the second
        assert_eq!(debouncer.poll(start + Duration::from_millis(300)), None);
        assert_eq!(
            debouncer.time_remaining(start + Duration::from_millis(300)),
            Some(Duration::from_millis(200))
        );
        assert_eq!(debouncer.poll(start + Duration::from_millis(500)), Some("al"));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(300);
        debouncer.schedule(1, start);
        assert_eq!(debouncer.pending_value(), Some(&1));
        assert_eq!(debouncer.cancel(), Some(1));
        assert_eq!(debouncer.poll(start + Duration::from_secs(1)), None);
        assert_eq!(debouncer.time_remaining(start), None);
    }
}
