//! OpenAI-compatible adapter implementation.

use super::{AdapterCapabilities, AdapterError, ProviderAdapter};
use crate::types::{
    CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse, Usage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter for OpenAI and OpenAI-compatible APIs.
///
/// - Chat completion via POST /v1/chat/completions with Bearer token
/// - Embeddings via POST /v1/embeddings
pub struct OpenAiAdapter {
    /// Unique adapter ID, matching the configured provider id
    id: String,
    /// Human-readable name
    name: String,
    /// Base URL (e.g., "https://api.openai.com")
    base_url: String,
    /// API key for Bearer authentication
    api_key: String,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
}

impl OpenAiAdapter {
    pub fn new(
        id: String,
        name: String,
        base_url: String,
        api_key: String,
        client: Arc<Client>,
    ) -> Self {
        Self {
            id,
            name,
            base_url,
            api_key,
            client,
        }
    }
}

/// OpenAI chat completion request wire format
#[derive(Debug, Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbedding>,
    #[serde(default)]
    usage: Option<WireUsage2>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedding {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct WireUsage2 {
    prompt_tokens: u32,
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            embeddings: true,
            vision: true,
        }
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, AdapterError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let wire = WireChatRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: &m.role,
                    content: &m.content,
                    name: m.name.as_deref(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
            stop: request.stop.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&wire)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, REQUEST_TIMEOUT.as_millis() as u64))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdapterError::Upstream {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::InvalidResponse(format!("Failed to read body: {}", e)))?;

        let parsed: WireChatResponse = serde_json::from_str(&body).map_err(|e| {
            AdapterError::InvalidResponse(format!("Failed to parse chat response: {}", e))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AdapterError::InvalidResponse("response has no choices".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            provider_id: self.id.clone(),
            model_id: model.to_string(),
            latency_ms: 0,
        })
    }

    async fn embed(
        &self,
        model: &str,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, AdapterError> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let wire = WireEmbeddingRequest {
            model,
            input: &request.input,
        };

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&wire)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, REQUEST_TIMEOUT.as_millis() as u64))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdapterError::Upstream {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::InvalidResponse(format!("Failed to read body: {}", e)))?;

        let parsed: WireEmbeddingResponse = serde_json::from_str(&body).map_err(|e| {
            AdapterError::InvalidResponse(format!("Failed to parse embeddings response: {}", e))
        })?;

        if parsed.data.is_empty() {
            return Err(AdapterError::InvalidResponse(
                "embeddings response has no data".to_string(),
            ));
        }

        Ok(EmbeddingResponse {
            embeddings: parsed.data.into_iter().map(|d| d.embedding).collect(),
            usage: Usage {
                prompt_tokens: parsed.usage.map(|u| u.prompt_tokens).unwrap_or_default(),
                completion_tokens: 0,
            },
            provider_id: self.id.clone(),
            model_id: model.to_string(),
            latency_ms: 0,
        })
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        let url = format!("{}/v1/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, 5000))?;

        if !response.status().is_success() {
            return Err(AdapterError::Upstream {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            });
        }
        Ok(())
    }
}
