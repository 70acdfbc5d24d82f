use crate::models::RemainingTime;

/// What a reconciliation poll means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Cosmetic correction of the displayed remaining time. The local
    /// deadline stays authoritative for firing expiry, since the polled value is
    /// already slightly stale by the time it arrives.
    Corrected,
    /// The server closed the attempt itself (missed client tick,
    /// another device, clock skew). Absorbed into the terminal state
    /// without issuing a second submission.
    Closed,
}

/// Tracks the skew between the server's authoritative remaining time and
/// the locally computed one, so the countdown display follows the server
/// between polls without touching expiry arithmetic.
#[derive(Debug, Default)]
pub struct ServerTimeSync {
    skew_seconds: i64,
}

impl ServerTimeSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, response: &RemainingTime, local_remaining: u32) -> SyncOutcome {
        if response.auto_submitted {
            return SyncOutcome::Closed;
        }
        self.skew_seconds = i64::from(response.remaining_seconds) - i64::from(local_remaining);
        SyncOutcome::Corrected
    }

    /// The display value for a locally computed remaining time.
    pub fn corrected(&self, local_remaining: u32) -> u32 {
        let display = i64::from(local_remaining) + self.skew_seconds;
        display.clamp(0, i64::from(u32::MAX)) as u32
    }
}
