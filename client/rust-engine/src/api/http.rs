use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::api::{ApiError, ApiResult, ExamApi};
use crate::config::Config;
use crate::metrics::track_api_operation;
use crate::models::{AnswerPatch, Attempt, RemainingTime, TaskDescriptor};
use async_trait::async_trait;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Identifies this engine instance on every call, so the server can tell
/// multi-device activity on the same attempt apart.
const CLIENT_SESSION_HEADER: &str = "x-client-session";
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// HTTP implementation of [`ExamApi`] against the exam service.
pub struct HttpExamApi {
    base_url: String,
    client: Client,
    client_session_id: String,
}

impl HttpExamApi {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base_url.into(),
            client,
            client_session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let timeout = if config.api_timeout_secs > 0 {
            config.api_timeout_secs
        } else {
            DEFAULT_TIMEOUT_SECS
        };
        Self::new(config.api_base_url.clone(), timeout)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> ApiResult<T> {
        let response = self
            .client
            .get(&url)
            .header(CLIENT_SESSION_HEADER, &self.client_session_id)
            .send()
            .await
            .map_err(map_transport_error)?;

        parse_response(response).await
    }
}

#[derive(Serialize)]
struct PatchAnswersRequest<'a> {
    answers: &'a [AnswerPatch],
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn get_attempt(&self, attempt_id: &str) -> ApiResult<Attempt> {
        let url = format!("{}/api/v1/attempts/{}", self.base_url, attempt_id);
        tracing::debug!("Fetching attempt: {}", attempt_id);
        track_api_operation("get_attempt", self.get_json(url)).await
    }

    async fn start_attempt(&self, attempt_id: &str) -> ApiResult<Attempt> {
        let url = format!("{}/api/v1/attempts/{}/start", self.base_url, attempt_id);
        tracing::info!("Starting attempt: {}", attempt_id);

        track_api_operation("start_attempt", async {
            let response = self
                .client
                .post(&url)
                .header(CLIENT_SESSION_HEADER, &self.client_session_id)
                .send()
                .await
                .map_err(map_transport_error)?;

            parse_response(response).await
        })
        .await
    }

    async fn get_variant_tasks(&self, variant_id: &str) -> ApiResult<Vec<TaskDescriptor>> {
        let url = format!("{}/api/v1/variants/{}/tasks", self.base_url, variant_id);
        tracing::debug!("Fetching variant tasks: {}", variant_id);
        track_api_operation("get_variant_tasks", self.get_json(url)).await
    }

    async fn get_remaining_time(&self, attempt_id: &str) -> ApiResult<RemainingTime> {
        let url = format!(
            "{}/api/v1/attempts/{}/remaining-time",
            self.base_url, attempt_id
        );
        track_api_operation("get_remaining_time", self.get_json(url)).await
    }

    async fn patch_answers(&self, submission_id: &str, answers: &[AnswerPatch]) -> ApiResult<()> {
        let url = format!(
            "{}/api/v1/submissions/{}/answers",
            self.base_url, submission_id
        );
        tracing::debug!(
            "Patching {} answer(s) for submission {}",
            answers.len(),
            submission_id
        );

        track_api_operation("patch_answers", async {
            let response = self
                .client
                .patch(&url)
                .header(CLIENT_SESSION_HEADER, &self.client_session_id)
                .json(&PatchAnswersRequest { answers })
                .send()
                .await
                .map_err(map_transport_error)?;

            check_status(response).await.map(|_| ())
        })
        .await
    }

    async fn submit_attempt(&self, submission_id: &str) -> ApiResult<()> {
        let url = format!(
            "{}/api/v1/submissions/{}/submit",
            self.base_url, submission_id
        );
        tracing::info!("Submitting submission: {}", submission_id);

        track_api_operation("submit_attempt", async {
            let response = self
                .client
                .post(&url)
                .header(CLIENT_SESSION_HEADER, &self.client_session_id)
                .header(IDEMPOTENCY_KEY_HEADER, format!("submit:{}", submission_id))
                .send()
                .await
                .map_err(map_transport_error)?;

            check_status(response).await.map(|_| ())
        })
        .await
    }

    async fn force_submit_attempt(&self, attempt_id: &str) -> ApiResult<()> {
        let url = format!(
            "{}/api/v1/attempts/{}/force-submit",
            self.base_url, attempt_id
        );
        tracing::info!("Force-submitting attempt: {}", attempt_id);

        track_api_operation("force_submit_attempt", async {
            let response = self
                .client
                .post(&url)
                .header(CLIENT_SESSION_HEADER, &self.client_session_id)
                .header(IDEMPOTENCY_KEY_HEADER, format!("submit:{}", attempt_id))
                .send()
                .await
                .map_err(map_transport_error)?;

            check_status(response).await.map(|_| ())
        })
        .await
    }
}

fn map_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match status.as_u16() {
        404 => Err(ApiError::NotFound(message)),
        409 => Err(ApiError::SubmissionClosed),
        code => Err(ApiError::Status {
            status: code,
            message,
        }),
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> ApiResult<T> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Network(format!("failed to parse response: {}", e)))
}
