//! Time source.
//!
//! Code crash if there is a physical inconsistency (unrecoverable state).

use chrono::{DateTime, Utc};

/// Interface for time operations.
pub trait Clock: Send + Sync {
    /// Get the current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Get the current Unix timestamp in seconds.
    fn timestamp(&self) -> u64 {
        u64::try_from(self.now().timestamp()).expect("system time before Unix epoch")
    }
}

/// System clock using the OS time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

#[cfg(test)]
impl FixedClock {
    pub fn new(timestamp: i64) -> Self {
        Self {
            instant: DateTime::from_timestamp(timestamp, 0).expect("timestamp out of range"),
        }
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}
