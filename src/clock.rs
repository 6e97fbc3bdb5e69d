//! Time source for the progress tracker.
//!
//! Streaks and exam countdowns depend on the local calendar date, so the
//! tracker reads time through [`Clock`] instead of calling `chrono` directly.

use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::{Arc, Mutex};

pub trait Clock: Send + Sync {
    /// Current local calendar date.
    fn today(&self) -> NaiveDate;

    /// Current time as Unix epoch milliseconds.
    fn now_millis(&self) -> i64;
}

/// Wall clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Start at noon on `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_hms_opt(12, 0, 0).unwrap_or_default())
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }

    fn current(&self) -> NaiveDateTime {
        self.now.lock().map(|g| *g).unwrap_or_default()
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        self.current().date()
    }

    fn now_millis(&self) -> i64 {
        self.current().and_utc().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let clock = ManualClock::at_date(date);
        let handle = clock.clone();

        handle.advance(chrono::Duration::days(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn test_manual_clock_millis() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let clock = ManualClock::new(date.and_hms_opt(0, 0, 1).unwrap());
        assert_eq!(clock.now_millis(), 1000);
    }
}
