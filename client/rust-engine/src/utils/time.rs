use chrono::{DateTime, Utc};
use std::time::Duration;

/// Wall-clock distance to a deadline, clamped to zero once it has passed.
pub fn until_deadline(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}
