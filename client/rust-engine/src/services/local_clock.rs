use std::time::Duration;

use tokio::time::Instant;

/// Deadline-anchored countdown.
///
/// Remaining time is recomputed from the fixed deadline on every query,
/// never decremented, so missed or delayed ticks (process suspension,
/// backgrounding) cannot drift the result. Expiry is reported exactly once;
/// only a full session reload creates a fresh clock.
#[derive(Debug)]
pub struct LocalClock {
    deadline: Instant,
    total: Duration,
    expiry_fired: bool,
}

impl LocalClock {
    pub fn from_remaining(remaining: Duration) -> Self {
        Self {
            deadline: Instant::now() + remaining,
            total: remaining,
            expiry_fired: false,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining().as_secs().min(u64::from(u32::MAX)) as u32
    }

    /// Seconds the clock was created with, for elapsed/total displays.
    pub fn total_seconds(&self) -> u32 {
        self.total.as_secs().min(u64::from(u32::MAX)) as u32
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.total_seconds().saturating_sub(self.remaining_seconds())
    }

    /// True exactly once, on the first query at or after the deadline.
    pub fn poll_expiry(&mut self) -> bool {
        if self.expiry_fired || !self.remaining().is_zero() {
            return false;
        }
        self.expiry_fired = true;
        true
    }

    pub fn has_expired(&self) -> bool {
        self.expiry_fired
    }
}
