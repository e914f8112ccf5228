//! Repeating timers for the UI loop.

use std::time::{Duration, Instant};

/// A repeating timer polled from the synchronous event loop.
///
/// The loop calls [`Ticker::due`] on every iteration; it returns `true` at
/// most once per period. A paused ticker never fires.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    last: Instant,
    paused: bool,
}

impl Ticker {
    /// A ticker whose first firing is one period from now.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Instant::now(),
            paused: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a period has elapsed; restarts the period when it has.
    pub fn due(&mut self) -> bool {
        self.due_at(Instant::now())
    }

    fn due_at(&mut self, now: Instant) -> bool {
        if self.paused || now.duration_since(self.last) < self.period {
            return false;
        }
        self.last = now;
        true
    }

    /// Restart the period, e.g. after a manual refresh.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume firing; the next firing is one period from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.reset();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_per_period() {
        let mut ticker = Ticker::new(Duration::from_secs(10));
        let start = ticker.last;

        assert!(!ticker.due_at(start + Duration::from_secs(5)));
        assert!(ticker.due_at(start + Duration::from_secs(10)));
        assert!(!ticker.due_at(start + Duration::from_secs(15)));
        assert!(ticker.due_at(start + Duration::from_secs(21)));
    }

    #[test]
    fn test_paused_ticker_never_fires() {
        let mut ticker = Ticker::new(Duration::from_millis(1));
        ticker.pause();
        let later = ticker.last + Duration::from_secs(60);
        assert!(!ticker.due_at(later));
        assert!(ticker.is_paused());

        ticker.resume();
        assert!(!ticker.is_paused());
        assert!(ticker.due_at(ticker.last + Duration::from_millis(1)));
    }
}
