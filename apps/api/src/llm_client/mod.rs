/// LLM Client — the single point of entry for all Gemini API calls.
///
/// ARCHITECTURAL RULE: No other module may call the generation API directly.
/// The pipeline only sees the `Generator` trait.
///
/// Decoding is pinned (temperature 0, fixed output ceiling) so identical prompts
/// give reproducible evaluations. There is no retry or backoff here: a 429 is
/// reported to the caller as `RateLimited` and retry policy belongs upstream.
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::evaluation::models::{
    ErrorKind, Evaluation, EvaluationResult, EMPTY_EVALUATION_PLACEHOLDER,
};
use crate::evaluation::prompts::EvaluationPrompt;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const TEMPERATURE: f32 = 0.0;
/// Large enough for a multi-section report.
const MAX_OUTPUT_TOKENS: u32 = 4000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("GEMINI_API_KEY is set but empty")]
    MissingCredential,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited (status 429): {0}")]
    RateLimited(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::MissingCredential | LlmError::ClientBuild(_) => {
                ErrorKind::ConfigurationError
            }
            LlmError::Timeout(_) => ErrorKind::Timeout,
            LlmError::RateLimited(_) => ErrorKind::RateLimited,
            LlmError::Http(_) | LlmError::Api { .. } | LlmError::Parse(_) => {
                ErrorKind::TransportFailure
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
pub struct Part {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, if it is non-blank.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// Turns a prompt into an evaluation. Never fails: transport problems come
/// back as `EvaluationResult::Failure`.
///
/// Carried in the pipeline as `Arc<dyn Generator>` so tests can substitute a fake.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &EvaluationPrompt) -> EvaluationResult;

    /// Model identifier, for logs and report metadata.
    fn model(&self) -> &str;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Fails when the credential is blank; the caller is expected to abort startup.
    pub fn new(
        api_key: String,
        model: String,
        api_base: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingCredential);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LlmError::ClientBuild)?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            api_base.trim_end_matches('/'),
            model
        );

        Ok(Self {
            client,
            api_key,
            model,
            endpoint,
            timeout,
        })
    }

    /// Makes one request to `generateContent`. `Ok(None)` means the backend
    /// answered successfully without usable text.
    pub async fn call(&self, prompt: &str) -> Result<Option<String>, LlmError> {
        let request_body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Gemini API returned {}: {}", status, body);
            return Err(LlmError::RateLimited(error_message(body)));
        }

        if !status.is_success() {
            warn!("Gemini API returned {}: {}", status, body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_message(body),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Gemini call succeeded: prompt_tokens={:?}, output_tokens={:?}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(parsed.text().map(str::to_string))
    }

    fn classify(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Http(error)
        }
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &EvaluationPrompt) -> EvaluationResult {
        match self.call(&prompt.text).await {
            Ok(text) => {
                let degraded = text.is_none();
                if degraded {
                    warn!("Gemini returned no usable text; using placeholder evaluation");
                }
                EvaluationResult::Success(Evaluation {
                    text: text.unwrap_or_else(|| EMPTY_EVALUATION_PLACEHOLDER.to_string()),
                    model: self.model.clone(),
                    rubric_version: prompt.rubric_version.to_string(),
                    generated_at: Utc::now(),
                    degraded,
                })
            }
            Err(e) => {
                warn!("Gemini call failed ({}): {e}", e.kind().code());
                EvaluationResult::failure(e.kind(), e.to_string())
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Pulls `error.message` out of a Gemini error body, falling back to the raw body.
fn error_message(body: String) -> String {
    serde_json::from_str::<GeminiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}
