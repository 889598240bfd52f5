//! Gemini `generateContent` REST client with credential rotation.
//!
//! Credentials are tried in order. Each attempt has its own timeout, so a
//! hung key never blocks the next one for longer than that. The first
//! success wins; if every key fails the caller gets `Exhausted`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use inmo_core::config::GatewayConfig;

use crate::error::GatewayError;
use crate::CompletionGateway;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
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
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

// =============================================================================
// GeminiGateway
// =============================================================================

/// Gemini REST gateway.
pub struct GeminiGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl GeminiGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Other(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            model = %config.model,
            credentials = usable_keys(&config.api_keys).count(),
            "Gemini gateway configured"
        );
        Ok(Self { client, config })
    }

    /// `{endpoint}{model}:generateContent`, tolerating a missing trailing slash.
    pub fn url(&self) -> String {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        format!("{}/{}:generateContent", endpoint, self.config.model)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.max(1))
    }

    async fn attempt(&self, key: &str, prompt: &str) -> Result<String, GatewayError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
            },
        };

        let response = self
            .client
            .post(self.url())
            .query(&[("key", key)])
            .timeout(self.timeout())
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Other(format!("Invalid response body: {}", e)))?;

        parsed
            .into_text()
            .ok_or_else(|| GatewayError::Other("Response contained no text".to_string()))
    }
}

#[async_trait]
impl CompletionGateway for GeminiGateway {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let keys: Vec<&str> = usable_keys(&self.config.api_keys).collect();
        if keys.is_empty() {
            return Err(GatewayError::NoCredentials);
        }

        let mut last = None;
        for (index, key) in keys.iter().enumerate() {
            match self.attempt(key, prompt).await {
                Ok(text) => {
                    debug!(credential = index + 1, chars = text.len(), "Completion succeeded");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(
                        credential = index + 1,
                        kind = %e.kind(),
                        error = %e,
                        "Completion attempt failed; trying next credential"
                    );
                    last = Some(e);
                }
            }
        }

        Err(GatewayError::Exhausted {
            attempts: keys.len(),
            last: Box::new(last.unwrap_or(GatewayError::NoCredentials)),
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("config", &self.config)
            .finish()
    }
}

fn usable_keys(keys: &[String]) -> impl Iterator<Item = &str> {
    keys.iter().map(|k| k.trim()).filter(|k| !k.is_empty())
}

fn classify_transport(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() || err.is_connect() {
        GatewayError::Transient(err.to_string())
    } else {
        GatewayError::Other(err.to_string())
    }
}
