//! Debounce policy for MODIFIED notifications.
//!
//! Editors and `cp` often emit two MODIFIED notifications 1-5 ms apart for
//! a single save, and the file can still be empty at the first one. Other
//! times the kernel coalesces them into one. The policy: the first MODIFIED
//! outside the window starts a logical update whose signal fires after the
//! population delay; a MODIFIED inside the window is the second half of the
//! pair and only pushes that pending fire out, so the signal always follows
//! the last write of the pair.

use std::time::Duration;

use tokio::time::Instant;

/// Outcome of a MODIFIED notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifiedDecision {
    /// New logical update, fire scheduled. `flushed` means an older fire
    /// was still pending and must be emitted right away.
    Accepted { flushed: bool },
    /// Duplicate; the pending fire was moved to `now + population_delay`.
    Deferred,
    /// Duplicate of an update whose signal already fired.
    Dropped,
}

/// Per-watcher debounce state. Owned by the detector loop only.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    population_delay: Duration,
    last_accepted: Option<Instant>,
    pending_fire: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration, population_delay: Duration) -> Self {
        Self {
            window,
            population_delay,
            last_accepted: None,
            pending_fire: None,
        }
    }

    /// Record a MODIFIED notification observed at `now`.
    pub fn on_modified(&mut self, now: Instant) -> ModifiedDecision {
        let is_duplicate = self
            .last_accepted
            .is_some_and(|last| now.saturating_duration_since(last) < self.window);

        if is_duplicate {
            return match self.pending_fire {
                Some(_) => {
                    self.pending_fire = Some(now + self.population_delay);
                    ModifiedDecision::Deferred
                }
                None => ModifiedDecision::Dropped,
            };
        }

        self.last_accepted = Some(now);
        let flushed = self
            .pending_fire
            .replace(now + self.population_delay)
            .is_some();
        ModifiedDecision::Accepted { flushed }
    }

    /// When the pending fire is due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending_fire
    }

    /// Consume the pending fire if it is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.pending_fire {
            Some(deadline) if deadline <= now => {
                self.pending_fire = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(50);
    const DELAY: Duration = Duration::from_millis(20);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Feed MODIFIED offsets (ms) and count signals, firing every deadline
    /// that falls due before the next notification.
    fn count_signals(offsets: &[u64]) -> usize {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW, DELAY);
        let mut fired = 0;

        for &offset in offsets {
            let now = t0 + ms(offset);
            if debouncer.take_due(now) {
                fired += 1;
            }
            if let ModifiedDecision::Accepted { flushed: true } = debouncer.on_modified(now) {
                fired += 1;
            }
        }
        if let Some(deadline) = debouncer.deadline()
            && debouncer.take_due(deadline)
        {
            fired += 1;
        }
        fired
    }

    #[test]
    fn test_first_modified_is_accepted() {
        let mut debouncer = Debouncer::new(WINDOW, DELAY);
        let t0 = Instant::now();
        assert_eq!(
            debouncer.on_modified(t0),
            ModifiedDecision::Accepted { flushed: false }
        );
        assert_eq!(debouncer.deadline(), Some(t0 + DELAY));
    }

    #[test]
    fn test_pair_inside_window_fires_once_after_second() {
        let mut debouncer = Debouncer::new(WINDOW, DELAY);
        let t0 = Instant::now();

        debouncer.on_modified(t0);
        assert_eq!(debouncer.on_modified(t0 + ms(10)), ModifiedDecision::Deferred);
        assert_eq!(debouncer.deadline(), Some(t0 + ms(30)));

        assert!(!debouncer.take_due(t0 + ms(29)));
        assert!(debouncer.take_due(t0 + ms(30)));
        assert!(debouncer.deadline().is_none());
    }

    #[test]
    fn test_duplicate_after_fire_is_dropped() {
        let mut debouncer = Debouncer::new(WINDOW, DELAY);
        let t0 = Instant::now();

        debouncer.on_modified(t0);
        assert!(debouncer.take_due(t0 + ms(20)));
        assert_eq!(debouncer.on_modified(t0 + ms(40)), ModifiedDecision::Dropped);
        assert!(debouncer.deadline().is_none());
    }

    #[test]
    fn test_pairs_inside_window_yield_one_signal() {
        assert_eq!(count_signals(&[0, 1]), 1);
        assert_eq!(count_signals(&[0, 10]), 1);
        assert_eq!(count_signals(&[0, 49]), 1);
        assert_eq!(count_signals(&[100, 102]), 1);
    }

    #[test]
    fn test_pairs_at_or_beyond_window_yield_two_signals() {
        assert_eq!(count_signals(&[0, 50]), 2);
        assert_eq!(count_signals(&[0, 51]), 2);
        assert_eq!(count_signals(&[0, 500]), 2);
    }

    #[test]
    fn test_window_measured_from_last_accepted() {
        // 0 accepted, 30 duplicate, 60 is 60ms after the accepted one.
        assert_eq!(count_signals(&[0, 30, 60]), 2);
    }

    #[test]
    fn test_accept_while_pending_flushes_older_fire() {
        // Population delay longer than the window.
        let mut debouncer = Debouncer::new(ms(10), ms(100));
        let t0 = Instant::now();

        debouncer.on_modified(t0);
        assert_eq!(
            debouncer.on_modified(t0 + ms(20)),
            ModifiedDecision::Accepted { flushed: true }
        );
        assert_eq!(debouncer.deadline(), Some(t0 + ms(120)));
    }
}
