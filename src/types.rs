//! Task descriptors and the provider-agnostic request/response schema.
//!
//! Every external call produces one immutable [`TaskDescriptor`] plus a
//! unified request; adapters translate these to and from vendor wire
//! formats so the rest of the crate never sees provider-specific shapes.

use crate::error::OrchestrationError;
use serde::{Deserialize, Serialize};

/// Kind of work the caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Text completion over a message list
    Chat,
    /// Text embedding
    Embed,
    /// Completion with image inputs
    Vision,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Chat => write!(f, "chat"),
            TaskType::Embed => write!(f, "embed"),
            TaskType::Vision => write!(f, "vision"),
        }
    }
}

/// Caller's assessment of how demanding the request is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

/// Minimum model tier acceptable for this request.
///
/// Ordering matters: a `Premium` model satisfies a `Draft` requirement,
/// never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityRequirement {
    Draft,
    #[default]
    Standard,
    Premium,
}

impl std::fmt::Display for QualityRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityRequirement::Draft => write!(f, "draft"),
            QualityRequirement::Standard => write!(f, "standard"),
            QualityRequirement::Premium => write!(f, "premium"),
        }
    }
}

/// Immutable routing input, created once per external call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_type: TaskType,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub quality: QualityRequirement,
    pub organization_id: String,
    pub user_id: String,
    /// Hard cap on output tokens for this call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per-call cost ceiling in USD, tighter than the org's limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_ceiling: Option<f64>,
}

impl TaskDescriptor {
    /// Validate the descriptor before any dispatch.
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        if self.organization_id.trim().is_empty() {
            return Err(OrchestrationError::InvalidRequest {
                reason: "organization_id must not be empty".to_string(),
            });
        }
        if self.user_id.trim().is_empty() {
            return Err(OrchestrationError::InvalidRequest {
                reason: "user_id must not be empty".to_string(),
            });
        }
        if let Some(ceiling) = self.cost_ceiling {
            if !ceiling.is_finite() || ceiling <= 0.0 {
                return Err(OrchestrationError::InvalidRequest {
                    reason: "cost_ceiling must be a positive amount".to_string(),
                });
            }
        }
        if self.max_tokens == Some(0) {
            return Err(OrchestrationError::InvalidRequest {
                reason: "max_tokens must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            name: None,
        }
    }
}

/// Provider-agnostic completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        if self.messages.is_empty() {
            return Err(OrchestrationError::InvalidRequest {
                reason: "messages must not be empty".to_string(),
            });
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(OrchestrationError::InvalidRequest {
                    reason: format!("temperature {} outside [0.0, 2.0]", t),
                });
            }
        }
        Ok(())
    }

    /// Total characters across message contents, the basis of the token
    /// estimation heuristic.
    pub fn content_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Normalized completion result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: Usage,
    pub provider_id: String,
    pub model_id: String,
    pub latency_ms: u64,
}

/// Provider-agnostic embedding request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub input: Vec<String>,
}

impl EmbeddingRequest {
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        if self.input.is_empty() || self.input.iter().all(|s| s.is_empty()) {
            return Err(OrchestrationError::InvalidRequest {
                reason: "embedding input must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn content_chars(&self) -> usize {
        self.input.iter().map(|s| s.len()).sum()
    }
}

/// Normalized embedding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub usage: Usage,
    pub provider_id: String,
    pub model_id: String,
    pub latency_ms: u64,
}

/// Request payload flowing through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Complete(CompletionRequest),
    Embed(EmbeddingRequest),
}

impl RequestPayload {
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        match self {
            RequestPayload::Complete(r) => r.validate(),
            RequestPayload::Embed(r) => r.validate(),
        }
    }

    pub fn content_chars(&self) -> usize {
        match self {
            RequestPayload::Complete(r) => r.content_chars(),
            RequestPayload::Embed(r) => r.content_chars(),
        }
    }
}

/// Response payload produced by dispatch or a cache hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Completion(CompletionResponse),
    Embedding(EmbeddingResponse),
}

impl ResponsePayload {
    pub fn usage(&self) -> Usage {
        match self {
            ResponsePayload::Completion(r) => r.usage,
            ResponsePayload::Embedding(r) => r.usage,
        }
    }

    pub fn provider_id(&self) -> &str {
        match self {
            ResponsePayload::Completion(r) => &r.provider_id,
            ResponsePayload::Embedding(r) => &r.provider_id,
        }
    }

    pub fn model_id(&self) -> &str {
        match self {
            ResponsePayload::Completion(r) => &r.model_id,
            ResponsePayload::Embedding(r) => &r.model_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_task() -> TaskDescriptor {
        TaskDescriptor {
            task_type: TaskType::Chat,
            complexity: Complexity::Medium,
            quality: QualityRequirement::Standard,
            organization_id: "org-1".to_string(),
            user_id: "user-1".to_string(),
            max_tokens: None,
            cost_ceiling: None,
        }
    }

    #[test]
    fn valid_descriptor_passes() {
        assert!(valid_task().validate().is_ok());
    }

    #[test]
    fn empty_organization_rejected() {
        let task = TaskDescriptor {
            organization_id: "  ".to_string(),
            ..valid_task()
        };
        assert!(matches!(
            task.validate(),
            Err(OrchestrationError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn negative_cost_ceiling_rejected() {
        let task = TaskDescriptor {
            cost_ceiling: Some(-0.5),
            ..valid_task()
        };
        assert!(task.validate().is_err());
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let task = TaskDescriptor {
            max_tokens: Some(0),
            ..valid_task()
        };
        assert!(task.validate().is_err());
    }

    #[test]
    fn empty_messages_rejected() {
        let request = CompletionRequest {
            messages: vec![],
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let request = CompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            temperature: Some(3.5),
            max_tokens: None,
            top_p: None,
            stop: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn quality_ordering_draft_below_premium() {
        assert!(QualityRequirement::Draft < QualityRequirement::Standard);
        assert!(QualityRequirement::Standard < QualityRequirement::Premium);
    }

    #[test]
    fn content_chars_sums_messages() {
        let request = CompletionRequest {
            messages: vec![ChatMessage::system("abc"), ChatMessage::user("defgh")],
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: None,
        };
        assert_eq!(request.content_chars(), 8);
    }
}
