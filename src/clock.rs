//! Wall-clock abstraction so time-dependent logic stays deterministic in
//! tests.
//!
//! Every derivation and command computes against an injected [`Clock`]
//! rather than calling `Utc::now()` directly. Production code uses
//! [`SystemClock`]; tests drive a [`ManualClock`].

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock. May jump under NTP adjustment, which is why all
/// elapsed-time arithmetic downstream clamps negative intervals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock. Time stands still until a test advances it.
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write().unwrap() = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write().unwrap();
        *guard += by;
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::milliseconds((secs * 1000.0).round() as i64));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}
