//! Google Gemini Provider
//!
//! Adapter for the Gemini `generateContent` API. Serves both plain text
//! generation and vision requests (inline image data), which makes it the
//! preferred family for image analysis.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    GenerationOutput, GenerationProvider, GenerationRequest, ProviderConfig, ProviderFamily,
    parse_retry_after, with_rate_limit_retry,
};
use crate::types::{BoardError, ErrorClassifier, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini API provider with secure API key handling
pub struct GeminiProvider {
    name: String,
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("name", &self.name)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiProvider {
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

    fn build_request(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let mut parts = vec![Part {
            text: Some(request.prompt.clone()),
            inline_data: None,
        }];

        if let Some(image) = &request.image {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data_base64.clone(),
                }),
            });
        }

        GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 2048,
            },
        }
    }

    /// One network round trip; the rate-limit retry loop wraps this.
    async fn send_once(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let body = self.build_request(request);

        debug!(provider = %self.name, model = %self.model, "Sending request to Gemini API");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                BoardError::Llm(ErrorClassifier::classify(
                    &format!("Gemini request failed: {}", e),
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
            // The explicit retry-after wins over the category default: header
            // first, then the RetryInfo detail embedded in the error body
            if err.retry_after.is_none() {
                err.retry_after = retry_header.or_else(|| parse_retry_after(&body));
            }
            warn!(provider = %self.name, status = %status, category = %err.category, "Gemini API error");
            return Err(BoardError::Llm(err));
        }

        let response_body: GenerateContentResponse = response.json().await.map_err(|e| {
            BoardError::LlmApi(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text = response_body
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BoardError::LlmApi("No content in Gemini response".to_string()))?;

        Ok(GenerationOutput {
            text,
            model: self.model.clone(),
        })
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        with_rate_limit_retry(&self.name, || self.send_once(request)).await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ProviderFamily {
        ProviderFamily::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_vision(&self) -> bool {
        true
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}
