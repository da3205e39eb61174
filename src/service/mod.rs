//! Root facade wiring the pipeline, router, and shared state together.
//!
//! [`AiService`] is the single entry point consumed by the host
//! application's handlers. It owns the live configuration behind a
//! swappable snapshot: every call clones the current `Arc` once at entry
//! and uses that snapshot throughout, so an in-flight request never sees
//! a partially-applied update.
//!
//! Cancellation: dropping the future returned by [`AiService::complete`]
//! or [`AiService::embed`] aborts the in-flight adapter call. The cost
//! commit runs only after a response was observed, so a cancelled call is
//! never billed.

use crate::breaker::CircuitBreaker;
use crate::cache::ResponseCache;
use crate::config::{ConfigError, OrchestratorConfig, ProviderConfig, ProviderKind};
use crate::cost::CostGuard;
use crate::error::OrchestrationError;
use crate::experiment::{ExperimentManager, Variant, VariantMetrics, WinnerReport};
use crate::metrics::{HealthMetrics, MetricsCollector};
use crate::pipeline::{
    CachingStage, CostControlStage, LoggingStage, Middleware, MonitoringStage, Pipeline,
    RateLimitStage, RequestContext,
};
use crate::provider::{AnthropicAdapter, OpenAiAdapter, ProviderAdapter};
use crate::registry::ModelRegistry;
use crate::router::Router;
use crate::types::{
    CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse, RequestPayload,
    ResponsePayload, TaskDescriptor, TaskType,
};
use dashmap::DashMap;
use reqwest::Client;
use std::sync::{Arc, RwLock};

/// The AI provider orchestration service.
///
/// # Examples
///
/// ```no_run
/// use switchboard::config::OrchestratorConfig;
/// use switchboard::service::AiService;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OrchestratorConfig::load(Some(std::path::Path::new(
///     "switchboard.toml",
/// )))?;
/// let service = AiService::new(config, vec![])?;
/// # Ok(())
/// # }
/// ```
pub struct AiService {
    config: RwLock<Arc<OrchestratorConfig>>,
    registry: Arc<ModelRegistry>,
    experiments: Arc<ExperimentManager>,
    cache: Arc<ResponseCache>,
    guard: Arc<CostGuard>,
    pipeline: Pipeline,
    router: Router,
    collector: MetricsCollector,
    /// Adapters supplied by the host, keyed by provider id. Consulted
    /// before the built-in http adapters so tests and embedded backends
    /// can take over any provider id.
    custom_adapters: DashMap<String, Arc<dyn ProviderAdapter>>,
    http_client: Arc<Client>,
}

impl AiService {
    /// Build the service from a validated configuration and any
    /// host-supplied adapters.
    ///
    /// Adapters for `openai` and `anthropic` provider kinds are
    /// constructed from configuration; `custom` providers must have a
    /// matching adapter (by id) in `adapters`.
    pub fn new(
        config: OrchestratorConfig,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
    ) -> Result<Self, OrchestrationError> {
        config.validate()?;

        let custom_adapters: DashMap<String, Arc<dyn ProviderAdapter>> = DashMap::new();
        for adapter in adapters {
            custom_adapters.insert(adapter.id().to_string(), adapter);
        }

        let http_client = Arc::new(Client::new());
        let registry = Arc::new(ModelRegistry::new());
        for provider in &config.providers {
            let adapter = build_adapter(provider, &custom_adapters, &http_client)?;
            registry
                .register(provider, adapter)
                .map_err(|e| ConfigError::invalid("providers", e.to_string()))?;
        }

        let breaker = Arc::new(CircuitBreaker::new());
        let guard = Arc::new(CostGuard::new());
        let cache = Arc::new(ResponseCache::new());
        let experiments = Arc::new(ExperimentManager::new());

        let stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(LoggingStage),
            Arc::new(RateLimitStage::new()),
            Arc::new(CostControlStage::new(
                Arc::clone(&guard),
                Arc::clone(&registry),
            )),
            Arc::new(CachingStage::new(Arc::clone(&cache))),
            Arc::new(MonitoringStage::new(Arc::clone(&experiments))),
        ];

        let router = Router::new(
            Arc::clone(&registry),
            Arc::clone(&breaker),
            Arc::clone(&guard),
        );
        let collector = MetricsCollector::new(
            Arc::clone(&registry),
            Arc::clone(&breaker),
            Arc::clone(&cache),
            Arc::clone(&guard),
        );

        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            registry,
            experiments,
            cache,
            guard,
            pipeline: Pipeline::new(stages),
            router,
            collector,
            custom_adapters,
            http_client,
        })
    }

    /// Current configuration snapshot.
    pub fn get_configuration(&self) -> Arc<OrchestratorConfig> {
        Arc::clone(&self.config.read().expect("config lock poisoned"))
    }

    /// Validate a proposed configuration without applying it.
    pub fn validate_configuration(config: &OrchestratorConfig) -> Result<(), ConfigError> {
        config.validate()
    }

    /// Atomically replace the configuration.
    ///
    /// Validation happens before the swap; on any error the previous
    /// configuration remains active (apply is all-or-nothing). In-flight
    /// requests keep the snapshot they started with.
    pub fn update_configuration(
        &self,
        config: OrchestratorConfig,
    ) -> Result<(), OrchestrationError> {
        config.validate()?;

        // Register adapters for providers the registry doesn't know yet,
        // so the reload below finds every configured id.
        for provider in &config.providers {
            if self.registry.descriptor(&provider.id).is_none() {
                let adapter = build_adapter(provider, &self.custom_adapters, &self.http_client)?;
                self.registry
                    .register(provider, adapter)
                    .map_err(|e| ConfigError::invalid("providers", e.to_string()))?;
            }
        }
        self.registry
            .reload(&config.providers)
            .map_err(|e| ConfigError::invalid("providers", e.to_string()))?;

        let mut current = self.config.write().expect("config lock poisoned");
        *current = Arc::new(config);
        tracing::info!("configuration updated");
        Ok(())
    }

    /// Register an adapter for a `custom` provider at runtime.
    ///
    /// Takes effect for providers added in a subsequent
    /// `update_configuration` call.
    pub fn register_adapter(&self, adapter: Arc<dyn ProviderAdapter>) {
        self.custom_adapters
            .insert(adapter.id().to_string(), adapter);
    }

    /// Route a completion request to the best available provider.
    pub async fn complete(
        &self,
        task: TaskDescriptor,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, OrchestrationError> {
        if task.task_type == TaskType::Embed {
            return Err(OrchestrationError::InvalidRequest {
                reason: "embed task type requires the embed operation".to_string(),
            });
        }
        task.validate()?;
        request.validate()?;

        let mut ctx = self.context(task, RequestPayload::Complete(request));
        match self.pipeline.execute(&mut ctx, &self.router).await? {
            ResponsePayload::Completion(response) => Ok(response),
            ResponsePayload::Embedding(_) => Err(OrchestrationError::InvalidRequest {
                reason: "embedding response for completion request".to_string(),
            }),
        }
    }

    /// Route an embedding request to the best available provider.
    pub async fn embed(
        &self,
        task: TaskDescriptor,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, OrchestrationError> {
        if task.task_type != TaskType::Embed {
            return Err(OrchestrationError::InvalidRequest {
                reason: "embed operation requires the embed task type".to_string(),
            });
        }
        task.validate()?;
        request.validate()?;

        let mut ctx = self.context(task, RequestPayload::Embed(request));
        match self.pipeline.execute(&mut ctx, &self.router).await? {
            ResponsePayload::Embedding(response) => Ok(response),
            ResponsePayload::Completion(_) => Err(OrchestrationError::InvalidRequest {
                reason: "completion response for embedding request".to_string(),
            }),
        }
    }

    fn context(&self, task: TaskDescriptor, payload: RequestPayload) -> RequestContext {
        let config = self.get_configuration();
        let variant = self.assign_variant(&config, &task);
        RequestContext::new(config, task, payload, variant)
    }

    /// Assign the caller to the first enabled experiment's variant.
    ///
    /// One routing experiment runs at a time; assignment is keyed by user
    /// so a user's traffic stays in one arm across organizations.
    fn assign_variant(
        &self,
        config: &OrchestratorConfig,
        task: &TaskDescriptor,
    ) -> Option<Variant> {
        config
            .experiments
            .iter()
            .find(|e| e.enabled)
            .and_then(|experiment| self.experiments.assign(experiment, &task.user_id))
    }

    /// Health snapshot across providers, circuits, cache, and budgets.
    pub fn health_metrics(&self) -> HealthMetrics {
        self.collector.snapshot()
    }

    /// Aggregated metrics per variant of one A/B test.
    pub fn variant_metrics(&self, test_id: &str) -> Vec<VariantMetrics> {
        self.experiments.variant_metrics(test_id)
    }

    /// Leading variant of one A/B test with significance confidence.
    pub fn experiment_winner(&self, test_id: &str) -> Option<WinnerReport> {
        self.experiments.winner(test_id)
    }

    /// Access to the experiment manager for satisfaction feedback and
    /// out-of-band assignment queries.
    pub fn experiments(&self) -> Arc<ExperimentManager> {
        Arc::clone(&self.experiments)
    }

    /// Probe every provider adapter concurrently, returning reachability
    /// per provider id.
    pub async fn probe_providers(
        &self,
    ) -> Vec<(String, Result<(), crate::provider::AdapterError>)> {
        self.registry.probe_health().await
    }

    /// Drop every cached response.
    pub fn purge_cache(&self) {
        self.cache.purge();
    }

    /// Drop expired cache entries and closed budget windows.
    pub fn run_maintenance(&self) {
        self.cache.purge_expired();
        self.guard.purge_expired();
    }
}

fn build_adapter(
    provider: &ProviderConfig,
    custom: &DashMap<String, Arc<dyn ProviderAdapter>>,
    client: &Arc<Client>,
) -> Result<Arc<dyn ProviderAdapter>, OrchestrationError> {
    // Host-supplied adapters take precedence for any kind
    if let Some(adapter) = custom.get(&provider.id) {
        return Ok(Arc::clone(adapter.value()));
    }
    match provider.kind {
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiAdapter::new(
            provider.id.clone(),
            provider.id.clone(),
            provider.base_url.clone(),
            provider.api_key.clone().unwrap_or_default(),
            Arc::clone(client),
        ))),
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicAdapter::new(
            provider.id.clone(),
            provider.id.clone(),
            provider.base_url.clone(),
            provider.api_key.clone().unwrap_or_default(),
            Arc::clone(client),
        ))),
        ProviderKind::Custom => Err(OrchestrationError::Configuration(ConfigError::invalid(
            format!("providers.{}", provider.id),
            "no adapter registered for custom provider",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, RoutingConfig};
    use crate::types::QualityRequirement;

    fn openai_provider() -> ProviderConfig {
        ProviderConfig {
            id: "openai-primary".to_string(),
            kind: ProviderKind::OpenAi,
            base_url: "https://api.openai.com".to_string(),
            api_key: Some("sk-test".to_string()),
            enabled: true,
            max_concurrency: 4,
            avg_latency_hint_ms: 300,
            models: vec![ModelConfig {
                id: "gpt-4o-mini".to_string(),
                tier: QualityRequirement::Standard,
                context_length: 128_000,
                max_output_tokens: None,
                supports_chat: true,
                supports_vision: false,
                supports_embeddings: true,
                input_cost_per_million: 0.15,
                output_cost_per_million: 0.60,
            }],
        }
    }

    #[test]
    fn builds_http_adapters_from_config() {
        let config = OrchestratorConfig {
            providers: vec![openai_provider()],
            ..Default::default()
        };
        let service = AiService::new(config, vec![]).unwrap();
        assert_eq!(service.registry.provider_count(), 1);
    }

    #[test]
    fn custom_provider_without_adapter_rejected() {
        let config = OrchestratorConfig {
            providers: vec![ProviderConfig {
                kind: ProviderKind::Custom,
                ..openai_provider()
            }],
            ..Default::default()
        };
        let result = AiService::new(config, vec![]);
        assert!(matches!(
            result,
            Err(OrchestrationError::Configuration(_))
        ));
    }

    #[test]
    fn invalid_config_rejected_at_build() {
        let config = OrchestratorConfig {
            routing: RoutingConfig {
                request_timeout_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(AiService::new(config, vec![]).is_err());
    }

    #[test]
    fn invalid_update_keeps_previous_config() {
        let service = AiService::new(OrchestratorConfig::default(), vec![]).unwrap();
        let before = service.get_configuration();

        let bad = OrchestratorConfig {
            routing: RoutingConfig {
                request_timeout_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(service.update_configuration(bad).is_err());
        assert_eq!(*service.get_configuration(), *before);
    }

    #[test]
    fn update_swaps_snapshot_atomically() {
        let service = AiService::new(OrchestratorConfig::default(), vec![]).unwrap();
        let old_snapshot = service.get_configuration();

        let mut updated = OrchestratorConfig::default();
        updated.routing.request_timeout_ms = 1234;
        service.update_configuration(updated).unwrap();

        // The old snapshot is untouched; new reads see the new value
        assert_eq!(old_snapshot.routing.request_timeout_ms, 30_000);
        assert_eq!(
            service.get_configuration().routing.request_timeout_ms,
            1234
        );
    }
}
