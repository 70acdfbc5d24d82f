use thiserror::Error;

use crate::api::ApiError;

/// Fatal errors raised while loading a session.
///
/// None of these are recoverable in place: the session cannot exist without
/// its attempt and variant data, so the caller surfaces them and gives up.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("attempt {0} could not be retrieved")]
    AttemptUnavailable(String),

    #[error("variant {0} tasks could not be retrieved")]
    VariantUnavailable(String),

    #[error("attempt {0} has no deadline after activation")]
    MissingDeadline(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors from the terminal submission call.
///
/// Cloneable so an already-settled outcome can be replayed to every later
/// `submit` caller without a second network request.
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("submission request failed: {0}")]
    Api(#[from] ApiError),

    /// The session never reached a submittable state (view-only reload).
    #[error("session is not in a submittable state")]
    NotActive,

    /// The session loop shut down before the outcome was known.
    #[error("session closed before the submission settled")]
    Shutdown,
}
