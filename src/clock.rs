//! Clock abstraction used to stamp lifecycle transitions.
//!
//! Timestamps on products and keys are informational only; no rule depends
//! on them, but tests pin them through [`MockClock`].

use chrono::{DateTime, Utc};

/// Source of the current time for lifecycle stamps.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared, manually advanced clock for deterministic tests.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
pub struct MockClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self::new(
            DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        )
    }

    /// Move the clock forward. Takes `&self` so a clock shared behind an
    /// `Arc` can still be advanced.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += duration;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn mock_clock_is_frozen() {
        let clock = MockClock::from_rfc3339("2025-03-01T08:30:00Z");
        assert_eq!(clock.now_utc(), clock.now_utc());
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-03-01T08:30:00+00:00");
    }

    #[test]
    fn mock_clock_advances_through_shared_handle() {
        let clock = Arc::new(MockClock::from_rfc3339("2025-03-01T08:30:00Z"));
        let shared: Arc<dyn Clock> = clock.clone();

        clock.advance(chrono::Duration::minutes(90));
        assert_eq!(shared.now_utc().to_rfc3339(), "2025-03-01T10:00:00+00:00");
    }
}
