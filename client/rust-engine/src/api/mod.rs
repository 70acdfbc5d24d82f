use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AnswerPatch, Attempt, RemainingTime, TaskDescriptor};

pub mod http;

pub use http::HttpExamApi;

/// Errors from remote exam-service operations.
///
/// Variants hold plain data so outcomes can be cloned and replayed to every
/// caller of an already-settled submission.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The submission record is no longer `in_progress`; the server rejects
    /// further answer writes.
    #[error("submission is closed to further writes")]
    SubmissionClosed,

    #[error("API error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

impl ApiError {
    /// Returns `true` if retrying the same call cannot succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            ApiError::NotFound(_) | ApiError::SubmissionClosed => true,
            ApiError::Status { status, .. } => (400..500).contains(status),
            ApiError::Timeout | ApiError::Network(_) => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// The remote collaborator owning attempts, variants and submission records.
///
/// All writes to the shared submission record go through this trait, routed
/// exclusively via the autosave publisher or the submission gate.
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// Fails with [`ApiError::NotFound`] if the attempt does not exist or
    /// does not belong to the caller.
    async fn get_attempt(&self, attempt_id: &str) -> ApiResult<Attempt>;

    /// Idempotent: starting an already-started attempt returns the existing
    /// `started_at`/`deadline_at` rather than resetting them.
    async fn start_attempt(&self, attempt_id: &str) -> ApiResult<Attempt>;

    async fn get_variant_tasks(&self, variant_id: &str) -> ApiResult<Vec<TaskDescriptor>>;

    /// Polled periodically for reconciliation while the session is active.
    async fn get_remaining_time(&self, attempt_id: &str) -> ApiResult<RemainingTime>;

    /// Upsert semantics keyed by task number.
    async fn patch_answers(&self, submission_id: &str, answers: &[AnswerPatch]) -> ApiResult<()>;

    async fn submit_attempt(&self, submission_id: &str) -> ApiResult<()>;

    /// Used for the auto-submit-on-expiry path, where the client may not
    /// hold a definitive submission handle yet.
    async fn force_submit_attempt(&self, attempt_id: &str) -> ApiResult<()>;
}
