//! Groq Provider
//!
//! Adapter for Groq's OpenAI-compatible Chat Completions API. Text only;
//! vision requests are refused so the fallback manager moves on to a
//! vision-capable family.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    GenerationOutput, GenerationProvider, GenerationRequest, ProviderConfig, ProviderFamily,
    parse_retry_after, with_rate_limit_retry,
};
use crate::types::{BoardError, ErrorCategory, ErrorClassifier, LlmError, Result};

const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Groq API provider with secure API key handling
pub struct GroqProvider {
    name: String,
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GroqProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqProvider")
            .field("name", &self.name)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl GroqProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BoardError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: config.name,
            api_key: config.api_key,
            api_base,
            model,
            client,
        })
    }

    fn build_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content:
                        "You are a content formatter for a college notice board. Always respond with valid JSON."
                            .to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.2,
            max_tokens: Some(2048),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }

    /// One network round trip; the rate-limit retry loop wraps this.
    async fn send_once(&self, prompt: &str) -> Result<GenerationOutput> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(prompt);

        debug!(provider = %self.name, model = %self.model, "Sending request to Groq API");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                BoardError::Llm(ErrorClassifier::classify(
                    &format!("Groq request failed: {}", e),
                    &self.name,
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_header = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();

            let mut err =
                ErrorClassifier::classify_http_status(status.as_u16(), &body, &self.name);
            if err.retry_after.is_none() {
                err.retry_after = retry_header.or_else(|| parse_retry_after(&body));
            }
            warn!(provider = %self.name, status = %status, category = %err.category, "Groq API error");
            return Err(BoardError::Llm(err));
        }

        let response_body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BoardError::LlmApi(format!("Failed to parse Groq response: {}", e)))?;

        let text = response_body
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BoardError::LlmApi("No content in Groq response".to_string()))?;

        Ok(GenerationOutput {
            text,
            model: self.model.clone(),
        })
    }
}

#[async_trait]
impl GenerationProvider for GroqProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        if request.image.is_some() {
            return Err(BoardError::Llm(LlmError::with_provider(
                ErrorCategory::Unavailable,
                "image input not supported by this provider",
                &self.name,
            )));
        }

        with_rate_limit_retry(&self.name, || self.send_once(&request.prompt)).await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ProviderFamily {
        ProviderFamily::Groq
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
