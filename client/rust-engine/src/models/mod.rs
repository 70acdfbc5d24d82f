use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client-side mirror of one learner's timed attempt at a variant.
///
/// `deadline_at` is set by the server when the attempt is started and is
/// never mutated locally; only a full reload picks up a redefined deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub variant_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub status: AttemptStatus,
    pub submission: Option<Submission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted,
    Active,
    Submitted,
    Graded,
    Expired,
}

impl Attempt {
    /// An attempt is closed once the server will no longer accept answer
    /// writes for it, either via its own status or the submission's.
    pub fn is_closed(&self) -> bool {
        if !matches!(self.status, AttemptStatus::NotStarted | AttemptStatus::Active) {
            return true;
        }
        self.submission
            .as_ref()
            .is_some_and(|s| s.status != SubmissionStatus::InProgress)
    }
}

/// The persisted record of answers tied to an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub answers: Vec<SavedAnswer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    InProgress,
    Submitted,
    Graded,
}

/// An answer as stored in the remote submission record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedAnswer {
    pub task_number: u32,
    pub value: String,
}

/// One answer upsert sent to the remote submission record, keyed by task
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPatch {
    pub task_number: u32,
    pub value: String,
}

/// Immutable descriptor of one task in the assigned variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_number: u32,
    pub answer_type: AnswerType,
    pub max_points: u32,
    pub prompt: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    SingleChoice,
    MultiChoice,
    ShortText,
    LongText,
    Numeric,
}

/// Authoritative remaining-time payload polled from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemainingTime {
    pub remaining_seconds: u32,
    pub auto_submitted: bool,
}

pub mod timer;
