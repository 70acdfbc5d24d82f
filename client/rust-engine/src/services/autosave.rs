use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::services::answer_buffer::PendingAnswer;

/// Persistence indicator surfaced to the UI: a transient "saving…" /
/// "save failed, retrying" hint, never a blocking error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveState {
    Saved,
    Pending,
    Saving,
    Failed,
}

/// Coalesces bursts of answer edits into single flushes.
///
/// Pure debounce: every edit re-arms the quiet-period window, so a burst of
/// typing produces one flush after the last keystroke. At most one flush is
/// in flight at a time; the deadline is withheld while one is running and
/// re-surfaces afterwards, so edits made during a flight land in the next
/// cycle. Does no IO of its own; the session loop owns the actual network
/// call.
#[derive(Debug)]
pub struct AutosavePublisher {
    window: Duration,
    deadline: Option<Instant>,
    in_flight: Option<Vec<PendingAnswer>>,
    state: SaveState,
    disabled: bool,
}

impl AutosavePublisher {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            in_flight: None,
            state: SaveState::Saved,
            disabled: false,
        }
    }

    /// Re-arms the debounce window. Called on every buffer edit, including
    /// edits made while a flush is in flight.
    pub fn note_edit(&mut self) {
        if self.disabled {
            return;
        }
        self.deadline = Some(Instant::now() + self.window);
        if self.state != SaveState::Saving {
            self.state = SaveState::Pending;
        }
    }

    /// The instant the next flush is due, if one is due at all. Withheld
    /// while a flush is in flight so the loop never runs two concurrently.
    pub fn flush_deadline(&self) -> Option<Instant> {
        if self.disabled || self.in_flight.is_some() {
            return None;
        }
        self.deadline
    }

    pub fn begin_flush(&mut self, batch: Vec<PendingAnswer>) {
        self.deadline = None;
        self.in_flight = Some(batch);
        self.state = SaveState::Saving;
    }

    /// Completes the in-flight flush and hands back its batch so the caller
    /// can acknowledge the buffer on success. A failure leaves the entries
    /// dirty and does not reschedule by itself; the next edit or the next
    /// cycle retries.
    pub fn complete_flush(&mut self, ok: bool) -> Vec<PendingAnswer> {
        let batch = self.in_flight.take().unwrap_or_default();
        self.state = if ok {
            if self.deadline.is_some() {
                SaveState::Pending
            } else {
                SaveState::Saved
            }
        } else {
            SaveState::Failed
        };
        batch
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Drops any pending window, e.g. when the session enters Submitting
    /// and the gate takes over the final flush.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Stops all future autosaves. Set once the remote submission is
    /// observed closed to writes.
    pub fn disable(&mut self) {
        self.disabled = true;
        self.deadline = None;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn state(&self) -> SaveState {
        self.state
    }
}
