//! Identification client: one multimodal `generateContent` call per image.
//!
//! Provides an `IdentificationBackend` trait so the session and tests can
//! swap the remote model out, and `GeminiClient`, which talks to the Gemini
//! REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::encoder::ImagePayload;
use crate::prompt::IDENTIFY_PROMPT;

// ============================================================================
// IdentificationBackend trait
// ============================================================================

/// Abstraction over the remote model.
#[async_trait]
pub trait IdentificationBackend: Send + Sync {
    /// Send the fixed prompt and one inline image; return the model's raw text.
    async fn generate(&self, payload: &ImagePayload) -> Result<String, GeminiError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error / config types
// ============================================================================

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Missing model name")]
    MissingModel,
}

/// Explicit client configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Zero means no client-side timeout.
    pub timeout_seconds: u64,
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: &'a ImagePayload,
    },
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// ============================================================================
// GeminiClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        if config.api_key.trim().is_empty() {
            return Err(GeminiError::MissingApiKey);
        }
        if config.model.trim().is_empty() {
            return Err(GeminiError::MissingModel);
        }

        let mut builder = Client::builder();
        if config.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_seconds));
        }
        let client = builder.build()?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate_once(&self, payload: &ImagePayload) -> Result<String, GeminiError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: IDENTIFY_PROMPT,
                    },
                    Part::InlineData {
                        inline_data: payload,
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(GeminiError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;
        body.into_text().ok_or(GeminiError::EmptyResponse)
    }
}

#[async_trait]
impl IdentificationBackend for GeminiClient {
    async fn generate(&self, payload: &ImagePayload) -> Result<String, GeminiError> {
        tracing::debug!(
            model = %self.config.model,
            mime_type = %payload.mime_type,
            "Sending generateContent request"
        );
        self.generate_once(payload).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================
