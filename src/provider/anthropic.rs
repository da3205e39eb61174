//! Anthropic adapter implementation.
//!
//! Translates between the unified schema and the Anthropic Messages API:
//! system messages move to the top-level `system` field, usage comes back
//! as `input_tokens`/`output_tokens`.

use super::{AdapterCapabilities, AdapterError, ProviderAdapter};
use crate::types::{ChatMessage, CompletionRequest, CompletionResponse, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Adapter for the Anthropic Messages API.
///
/// - Completion via POST /v1/messages with x-api-key header
pub struct AnthropicAdapter {
    /// Unique adapter ID, matching the configured provider id
    id: String,
    /// Human-readable name
    name: String,
    /// Base URL (e.g., "https://api.anthropic.com")
    base_url: String,
    /// API key for x-api-key authentication
    api_key: String,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
}

impl AnthropicAdapter {
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

    /// Extract the system message from the unified message list
    fn extract_system_message(messages: &[ChatMessage]) -> Option<String> {
        messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone())
    }

    fn translate_request<'a>(&self, model: &'a str, request: &'a CompletionRequest) -> WireRequest<'a> {
        let system = Self::extract_system_message(&request.messages);
        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| WireMessage {
                role: &m.role,
                content: &m.content,
            })
            .collect();

        WireRequest {
            model,
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            top_p: request.top_p,
            stop_sequences: request.stop.as_deref(),
        }
    }
}

/// Anthropic request wire format
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireContent>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            embeddings: false,
            vision: true,
        }
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, AdapterError> {
        let url = format!("{}/v1/messages", self.base_url);
        let wire = self.translate_request(model, request);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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

        let parsed: WireResponse = serde_json::from_str(&body).map_err(|e| {
            AdapterError::InvalidResponse(format!("Failed to parse messages response: {}", e))
        })?;

        let content = parsed
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage: Usage {
                prompt_tokens: parsed.usage.input_tokens,
                completion_tokens: parsed.usage.output_tokens,
            },
            provider_id: self.id.clone(),
            model_id: model.to_string(),
            latency_ms: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn system_message_moves_to_top_level() {
        let adapter = AnthropicAdapter::new(
            "anthropic".to_string(),
            "Anthropic".to_string(),
            "https://api.anthropic.com".to_string(),
            "key".to_string(),
            Arc::new(Client::new()),
        );
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system("be terse"),
                ChatMessage::user("hello"),
            ],
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: None,
        };
        let wire = adapter.translate_request("claude-sonnet", &request);
        assert_eq!(wire.system.as_deref(), Some("be terse"));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
        assert_eq!(wire.max_tokens, DEFAULT_MAX_TOKENS);
    }
}
