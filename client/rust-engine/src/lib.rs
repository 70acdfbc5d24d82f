#![allow(dead_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use api::{ApiError, ExamApi, HttpExamApi};
pub use config::Config;
pub use error::{LoadError, SubmitError};
pub use services::autosave::SaveState;
pub use services::session_controller::{ExamSession, Lifecycle, SessionSnapshot, TaskIndicator};
pub use services::submission_gate::{SubmitMode, SubmitOutcome};
pub use services::task_catalog::TaskCatalog;
