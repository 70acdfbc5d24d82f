#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use examhall_engine::api::{ApiError, ApiResult, ExamApi};
use examhall_engine::models::{
    AnswerPatch, AnswerType, Attempt, AttemptStatus, RemainingTime, SavedAnswer, Submission,
    SubmissionStatus, TaskDescriptor,
};
use examhall_engine::Config;

/// In-memory exam service with failure toggles, artificial latency and
/// call recording, shared by the session integration tests.
pub struct MockExamApi {
    pub attempt: Mutex<Attempt>,
    pub tasks: Mutex<Vec<TaskDescriptor>>,
    pub remaining: Mutex<RemainingTime>,

    pub attempt_missing: AtomicBool,
    pub fail_patch: AtomicBool,
    pub patch_closed: AtomicBool,
    pub fail_submit: AtomicBool,
    pub fail_sync: AtomicBool,

    pub patch_delay: Mutex<Option<Duration>>,
    pub submit_delay: Mutex<Option<Duration>>,

    /// Every patch_answers body, in call order (recorded even for calls
    /// that then fail).
    pub patch_calls: Mutex<Vec<Vec<AnswerPatch>>>,
    pub start_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub force_submit_calls: AtomicUsize,
    pub sync_calls: AtomicUsize,

    /// Coarse event log for ordering assertions.
    pub log: Mutex<Vec<String>>,
}

/// Installs a log subscriber once, so `RUST_LOG=examhall_engine=debug`
/// works under `cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

impl MockExamApi {
    pub fn new(attempt: Attempt, tasks: Vec<TaskDescriptor>) -> Arc<Self> {
        init_tracing();
        Arc::new(Self {
            attempt: Mutex::new(attempt),
            tasks: Mutex::new(tasks),
            remaining: Mutex::new(RemainingTime {
                remaining_seconds: 0,
                auto_submitted: false,
            }),
            attempt_missing: AtomicBool::new(false),
            fail_patch: AtomicBool::new(false),
            patch_closed: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            fail_sync: AtomicBool::new(false),
            patch_delay: Mutex::new(None),
            submit_delay: Mutex::new(None),
            patch_calls: Mutex::new(Vec::new()),
            start_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            force_submit_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn set_remaining(&self, remaining_seconds: u32, auto_submitted: bool) {
        *self.remaining.lock().unwrap() = RemainingTime {
            remaining_seconds,
            auto_submitted,
        };
    }

    pub fn terminal_submission_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst) + self.force_submit_calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, event: &str) {
        self.log.lock().unwrap().push(event.to_string());
    }
}

#[async_trait]
impl ExamApi for MockExamApi {
    async fn get_attempt(&self, attempt_id: &str) -> ApiResult<Attempt> {
        if self.attempt_missing.load(Ordering::SeqCst) {
            return Err(ApiError::NotFound(format!("attempt {}", attempt_id)));
        }
        Ok(self.attempt.lock().unwrap().clone())
    }

    async fn start_attempt(&self, _attempt_id: &str) -> ApiResult<Attempt> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let mut attempt = self.attempt.lock().unwrap();
        // Idempotent: an already-started attempt keeps its deadline.
        if attempt.started_at.is_none() {
            let now = Utc::now();
            attempt.started_at = Some(now);
            attempt.deadline_at = Some(now + chrono::Duration::seconds(1800));
            attempt.status = AttemptStatus::Active;
        }
        Ok(attempt.clone())
    }

    async fn get_variant_tasks(&self, _variant_id: &str) -> ApiResult<Vec<TaskDescriptor>> {
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn get_remaining_time(&self, _attempt_id: &str) -> ApiResult<RemainingTime> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sync.load(Ordering::SeqCst) {
            return Err(ApiError::Network("mock sync outage".to_string()));
        }
        Ok(self.remaining.lock().unwrap().clone())
    }

    async fn patch_answers(&self, _submission_id: &str, answers: &[AnswerPatch]) -> ApiResult<()> {
        self.record("patch");
        self.patch_calls.lock().unwrap().push(answers.to_vec());

        let delay = *self.patch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.patch_closed.load(Ordering::SeqCst) {
            self.record("patch_rejected");
            return Err(ApiError::SubmissionClosed);
        }
        if self.fail_patch.load(Ordering::SeqCst) {
            self.record("patch_failed");
            return Err(ApiError::Network("mock patch outage".to_string()));
        }

        self.record("patch_done");
        Ok(())
    }

    async fn submit_attempt(&self, _submission_id: &str) -> ApiResult<()> {
        self.record("submit");
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ApiError::Network("mock submit outage".to_string()));
        }
        self.record("submit_done");
        Ok(())
    }

    async fn force_submit_attempt(&self, _attempt_id: &str) -> ApiResult<()> {
        self.record("force_submit");
        self.force_submit_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ApiError::Network("mock submit outage".to_string()));
        }
        self.record("force_submit_done");
        Ok(())
    }
}

pub fn sample_tasks(count: u32) -> Vec<TaskDescriptor> {
    (1..=count)
        .map(|task_number| TaskDescriptor {
            task_number,
            answer_type: AnswerType::ShortText,
            max_points: 1,
            prompt: format!("Task {}", task_number),
            config: serde_json::Value::Null,
        })
        .collect()
}

/// A started attempt with an open submission and a deadline the given
/// number of seconds in the future.
pub fn active_attempt(deadline_secs: i64) -> Attempt {
    let now = Utc::now();
    Attempt {
        id: "attempt-1".to_string(),
        variant_id: "variant-1".to_string(),
        started_at: Some(now),
        deadline_at: Some(now + chrono::Duration::seconds(deadline_secs)),
        status: AttemptStatus::Active,
        submission: Some(Submission {
            id: "submission-1".to_string(),
            status: SubmissionStatus::InProgress,
            answers: Vec::new(),
        }),
    }
}

pub fn unstarted_attempt() -> Attempt {
    Attempt {
        id: "attempt-1".to_string(),
        variant_id: "variant-1".to_string(),
        started_at: None,
        deadline_at: None,
        status: AttemptStatus::NotStarted,
        submission: Some(Submission {
            id: "submission-1".to_string(),
            status: SubmissionStatus::InProgress,
            answers: Vec::new(),
        }),
    }
}

pub fn attempt_with_saved_answers(deadline_secs: i64, answers: Vec<SavedAnswer>) -> Attempt {
    let mut attempt = active_attempt(deadline_secs);
    attempt.submission.as_mut().unwrap().answers = answers;
    attempt
}

pub fn test_config() -> Config {
    Config {
        api_base_url: "http://mock.invalid".to_string(),
        api_timeout_secs: 5,
        autosave_debounce_ms: 3000,
        tick_interval_ms: 1000,
        sync_interval_secs: 60,
    }
}

/// Lets the session loop drain its queues between steps of a paused-time
/// test.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
