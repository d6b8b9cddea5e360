use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{ClientError, Result};
use crate::service::GenerationService;
use crate::types::{
    ApiErrorResponse, ContinueGenerateRequest, ContinueGenerateResponse, InitialGenerateRequest,
    InitialGenerateResponse,
};

const INITIAL_PATH: &str = "generate/initial";
const CONTINUE_PATH: &str = "generate/continue";
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 60000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// `None` waits indefinitely for the service to answer.
    pub request_timeout: Option<Duration>,
    /// Transport retries for rate limits and 5xx responses. 0 disables retrying.
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            api_key: None,
            request_timeout: None,
            max_retries: 0,
        }
    }
}

/// HTTP client for the template generation service.
#[derive(Clone)]
pub struct GenerationClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: normalize_base_url(base_url.into()),
            api_key: None,
            max_retries: 0,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "generation service base url is empty".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: normalize_base_url(config.base_url.clone()),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn with_retry<T, F, Fut>(&self, operation: F, operation_name: &str) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && retries < self.max_retries => {
                    let wait_ms = retry_wait_ms(&e, backoff_ms);

                    warn!(
                        "{} failed ({}), retrying in {}ms (attempt {}/{})",
                        operation_name,
                        e,
                        wait_ms,
                        retries + 1,
                        self.max_retries
                    );

                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    retries += 1;
                    backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                }
                Err(e) => {
                    if retries > 0 {
                        error!("{} failed after {} retries: {}", operation_name, retries, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .json(body);

        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            warn!(retry_after = ?retry_after, "Rate limited by generation service");
            return Err(ClientError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(parsed) => parsed.error.message,
                Err(_) => body,
            };
            error!(status = status.as_u16(), message = %message, "Generation service error");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait]
impl GenerationService for GenerationClient {
    async fn initial_generate(
        &self,
        request: &InitialGenerateRequest,
    ) -> Result<InitialGenerateResponse> {
        debug!(
            document_len = request.input_document.len(),
            domain_hint = %request.domain_hint,
            "Sending initial generation request"
        );

        self.with_retry(
            || self.post_json(INITIAL_PATH, request),
            "initial_generate",
        )
        .await
    }

    async fn continue_generate(
        &self,
        request: &ContinueGenerateRequest,
    ) -> Result<ContinueGenerateResponse> {
        debug!(
            last_processed_unit = request.last_processed_unit,
            previous_artifact_id = %request.previous_artifact_id,
            "Sending continuation request"
        );

        self.with_retry(
            || self.post_json(CONTINUE_PATH, request),
            "continue_generate",
        )
        .await
    }
}

/// Delay before the next attempt, honouring `Retry-After` and capped at
/// `MAX_BACKOFF_MS`.
fn retry_wait_ms(error: &ClientError, backoff_ms: u64) -> u64 {
    match error {
        ClientError::RateLimited {
            retry_after: Some(secs),
        } => secs.saturating_mul(1000),
        _ => backoff_ms,
    }
    .min(MAX_BACKOFF_MS)
}
