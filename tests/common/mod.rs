//! Shared test utilities for switchboard integration tests.
//!
//! Provides scripted mock adapters, provider/config builders, and service
//! constructors to reduce duplication across test files.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchboard::config::{
    ModelConfig, OrchestratorConfig, ProviderConfig, ProviderKind,
};
use switchboard::provider::{AdapterCapabilities, AdapterError, ProviderAdapter};
use switchboard::service::AiService;
use switchboard::types::{
    ChatMessage, Complexity, CompletionRequest, CompletionResponse, EmbeddingRequest,
    EmbeddingResponse, QualityRequirement, TaskDescriptor, TaskType, Usage,
};

/// Scripted step for a mock adapter call.
pub enum MockStep {
    /// Respond with the given content
    Ok(&'static str),
    /// Fail with a network error
    NetworkError,
    /// Fail with an upstream 500
    UpstreamError,
    /// Sleep this long before responding (for deadline tests)
    Slow(Duration, &'static str),
}

/// Mock adapter that pops scripted steps; once the script is exhausted it
/// keeps answering with its default content.
pub struct MockAdapter {
    id: String,
    default_content: &'static str,
    script: Mutex<VecDeque<MockStep>>,
    calls: AtomicU32,
    supports_embeddings: bool,
}

impl MockAdapter {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            default_content: "mock response",
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
            supports_embeddings: true,
        })
    }

    pub fn with_script(id: &str, steps: Vec<MockStep>) -> Arc<Self> {
        let adapter = Self::new(id);
        adapter.script.lock().unwrap().extend(steps);
        adapter
    }

    /// Total adapter invocations (complete + embed).
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn run_step(&self) -> Result<String, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            None => Ok(self.default_content.to_string()),
            Some(MockStep::Ok(content)) => Ok(content.to_string()),
            Some(MockStep::NetworkError) => {
                Err(AdapterError::Network("connection refused".to_string()))
            }
            Some(MockStep::UpstreamError) => Err(AdapterError::Upstream {
                status: 500,
                message: "internal error".to_string(),
            }),
            Some(MockStep::Slow(delay, content)) => {
                tokio::time::sleep(delay).await;
                Ok(content.to_string())
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            embeddings: self.supports_embeddings,
            vision: false,
        }
    }

    async fn complete(
        &self,
        model: &str,
        _request: &CompletionRequest,
    ) -> Result<CompletionResponse, AdapterError> {
        let content = self.run_step().await?;
        Ok(CompletionResponse {
            content,
            usage: Usage {
                prompt_tokens: 100,
                completion_tokens: 50,
            },
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
        self.run_step().await?;
        Ok(EmbeddingResponse {
            embeddings: request.input.iter().map(|_| vec![0.1, 0.2, 0.3]).collect(),
            usage: Usage {
                prompt_tokens: 20,
                completion_tokens: 0,
            },
            provider_id: self.id.clone(),
            model_id: model.to_string(),
            latency_ms: 0,
        })
    }
}

/// A standard chat model config.
pub fn chat_model(id: &str) -> ModelConfig {
    ModelConfig {
        id: id.to_string(),
        tier: QualityRequirement::Standard,
        context_length: 8192,
        max_output_tokens: None,
        supports_chat: true,
        supports_vision: false,
        supports_embeddings: true,
        input_cost_per_million: 1.0,
        output_cost_per_million: 2.0,
    }
}

/// A custom-kind provider served by a mock adapter.
pub fn mock_provider(id: &str, models: Vec<ModelConfig>) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        kind: ProviderKind::Custom,
        base_url: String::new(),
        api_key: None,
        enabled: true,
        max_concurrency: 4,
        avg_latency_hint_ms: 100,
        models,
    }
}

/// Config with the given providers, fast breaker timings, and caching off
/// so repeated requests always reach the router. Cache behavior is
/// exercised separately with caching re-enabled.
pub fn test_config(providers: Vec<ProviderConfig>) -> OrchestratorConfig {
    let mut config = OrchestratorConfig {
        providers,
        ..Default::default()
    };
    config.breaker.failure_threshold = 3;
    config.breaker.recovery_timeout_ms = 50;
    config.breaker.max_recovery_timeout_ms = 200;
    config.routing.request_timeout_ms = 2_000;
    config.cache.enabled = false;
    config
}

/// Service wired from config plus mock adapters.
pub fn make_service(
    config: OrchestratorConfig,
    adapters: Vec<Arc<MockAdapter>>,
) -> AiService {
    let adapters: Vec<Arc<dyn ProviderAdapter>> = adapters
        .into_iter()
        .map(|a| a as Arc<dyn ProviderAdapter>)
        .collect();
    AiService::new(config, adapters).unwrap()
}

/// A chat task for the default test organization.
pub fn chat_task() -> TaskDescriptor {
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

/// An embed task for the default test organization.
pub fn embed_task() -> TaskDescriptor {
    TaskDescriptor {
        task_type: TaskType::Embed,
        ..chat_task()
    }
}

/// A one-message completion request.
pub fn chat_request(content: &str) -> CompletionRequest {
    CompletionRequest {
        messages: vec![ChatMessage::user(content)],
        temperature: None,
        max_tokens: None,
        top_p: None,
        stop: None,
    }
}
