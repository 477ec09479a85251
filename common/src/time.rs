//! Time utilities and constants.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Timing constants.
pub mod constants {
    use super::Duration;

    /// Age after which a rate snapshot is eligible for refresh (1 hour).
    pub fn rate_staleness_window() -> Duration {
        Duration::hours(1)
    }

    /// Upstream rate request timeout (15 seconds).
    pub fn rate_request_timeout() -> Duration {
        Duration::seconds(15)
    }
}

/// A timestamp, always UTC.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Milliseconds since the Unix epoch.
pub fn to_epoch_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

/// Timestamp from milliseconds since the Unix epoch. `0` and negative
/// values mean "never" and map to `None`.
pub fn from_epoch_millis(millis: i64) -> Option<Timestamp> {
    if millis <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}

/// Whole minutes elapsed between `then` and `now`, clamped at zero.
pub fn minutes_between(then: Timestamp, now: Timestamp) -> i64 {
    (now - then).num_minutes().max(0)
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
