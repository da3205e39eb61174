//! Model Registry module.
//!
//! Thread-safe catalogue of (provider, model) pairs with capability and
//! pricing metadata, loaded from configuration at startup and refreshed by
//! an explicit reload. The registry couples each provider's descriptor
//! with its adapter and admission semaphore; effectively read-only at
//! request time apart from the atomic runtime counters.

mod error;
mod model;

pub use error::RegistryError;
pub use model::{ModelEntry, ModelPricing, ProviderDescriptor, ProviderView};

use crate::config::ProviderConfig;
use crate::provider::{AdapterError, ProviderAdapter};
use crate::types::{TaskDescriptor, TaskType};
use dashmap::DashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// A registered provider: descriptor, adapter, admission semaphore, models.
struct ProviderEntry {
    descriptor: Arc<ProviderDescriptor>,
    adapter: Arc<dyn ProviderAdapter>,
    admission: Arc<Semaphore>,
    models: Vec<ModelEntry>,
}

/// One dispatchable (provider, model) candidate.
///
/// A point-in-time snapshot handed to the router; runtime counters are
/// read through the shared descriptor, not copied.
#[derive(Clone)]
pub struct Candidate {
    pub entry: ModelEntry,
    pub descriptor: Arc<ProviderDescriptor>,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub admission: Arc<Semaphore>,
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("provider_id", &self.entry.provider_id)
            .field("model_id", &self.entry.model_id)
            .finish()
    }
}

impl Candidate {
    pub fn provider_id(&self) -> &str {
        &self.entry.provider_id
    }

    pub fn model_id(&self) -> &str {
        &self.entry.model_id
    }

    pub fn avg_latency_ms(&self) -> u32 {
        self.descriptor.avg_latency_ms.load(Ordering::Relaxed)
    }
}

/// The Model Registry stores all known providers and their models.
///
/// # Examples
///
/// ```no_run
/// use switchboard::registry::ModelRegistry;
///
/// let registry = ModelRegistry::new();
/// assert_eq!(registry.provider_count(), 0);
/// ```
pub struct ModelRegistry {
    providers: DashMap<String, ProviderEntry>,
}

impl ModelRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
        }
    }

    /// Register a provider from its configuration and adapter.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateProvider` if the ID is taken.
    pub fn register(
        &self,
        config: &ProviderConfig,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<(), RegistryError> {
        if self.providers.contains_key(&config.id) {
            return Err(RegistryError::DuplicateProvider(config.id.clone()));
        }

        let entry = ProviderEntry {
            descriptor: Arc::new(ProviderDescriptor::new(
                config.id.clone(),
                config.enabled,
                config.max_concurrency,
                config.avg_latency_hint_ms,
            )),
            adapter,
            admission: Arc::new(Semaphore::new(config.max_concurrency as usize)),
            models: config
                .models
                .iter()
                .map(|m| ModelEntry::from_config(&config.id, m))
                .collect(),
        };
        self.providers.insert(config.id.clone(), entry);
        Ok(())
    }

    /// Remove a provider.
    pub fn remove(&self, id: &str) -> Result<(), RegistryError> {
        self.providers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::ProviderNotFound(id.to_string()))
    }

    /// Replace the catalogue from a new configuration, keeping each
    /// surviving provider's adapter and runtime counters.
    ///
    /// Providers no longer configured are dropped; newly configured
    /// providers must already have an adapter registered or the reload
    /// fails without applying anything.
    pub fn reload(&self, providers: &[ProviderConfig]) -> Result<(), RegistryError> {
        for config in providers {
            if !self.providers.contains_key(&config.id) {
                return Err(RegistryError::AdapterMissing(config.id.clone()));
            }
        }

        let keep: std::collections::HashSet<&str> =
            providers.iter().map(|p| p.id.as_str()).collect();
        self.providers.retain(|id, _| keep.contains(id.as_str()));

        for config in providers {
            if let Some(mut entry) = self.providers.get_mut(&config.id) {
                let old = &entry.descriptor;
                let descriptor = ProviderDescriptor::new(
                    config.id.clone(),
                    config.enabled,
                    config.max_concurrency,
                    old.avg_latency_ms.load(Ordering::Relaxed),
                );
                descriptor.total_requests.store(
                    old.total_requests.load(Ordering::Relaxed),
                    Ordering::Relaxed,
                );
                entry.descriptor = Arc::new(descriptor);
                entry.admission = Arc::new(Semaphore::new(config.max_concurrency as usize));
                entry.models = config
                    .models
                    .iter()
                    .map(|m| ModelEntry::from_config(&config.id, m))
                    .collect();
            }
        }
        Ok(())
    }

    /// All candidates able to serve the given task.
    ///
    /// Filters by enablement, task capability, quality tier, and context
    /// length. Circuit and budget filtering belong to the router.
    pub fn candidates_for(&self, task: &TaskDescriptor, estimated_tokens: u32) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for entry in self.providers.iter() {
            if !entry.descriptor.enabled {
                continue;
            }
            for model in &entry.models {
                let capable = match task.task_type {
                    TaskType::Chat => model.supports_chat,
                    TaskType::Vision => model.supports_chat && model.supports_vision,
                    TaskType::Embed => model.supports_embeddings,
                };
                if !capable {
                    continue;
                }
                if model.tier < task.quality {
                    continue;
                }
                if estimated_tokens > model.context_length {
                    continue;
                }
                candidates.push(Candidate {
                    entry: model.clone(),
                    descriptor: Arc::clone(&entry.descriptor),
                    adapter: Arc::clone(&entry.adapter),
                    admission: Arc::clone(&entry.admission),
                });
            }
        }
        candidates
    }

    /// Probe every registered adapter concurrently.
    ///
    /// Used by explicit reload/maintenance flows, never on the request
    /// path; the circuit breaker handles request-time health.
    pub async fn probe_health(&self) -> Vec<(String, Result<(), AdapterError>)> {
        let adapters: Vec<(String, Arc<dyn ProviderAdapter>)> = self
            .providers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.adapter)))
            .collect();
        let probes = adapters.into_iter().map(|(id, adapter)| async move {
            let result = adapter.health_check().await;
            if let Err(error) = &result {
                tracing::warn!(provider = %id, %error, "health probe failed");
            }
            (id, result)
        });
        let mut results = futures::future::join_all(probes).await;
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// Shared descriptor for one provider.
    pub fn descriptor(&self, id: &str) -> Option<Arc<ProviderDescriptor>> {
        self.providers
            .get(id)
            .map(|entry| Arc::clone(&entry.descriptor))
    }

    /// Serializable snapshot of every provider, for observability.
    pub fn provider_views(&self) -> Vec<ProviderView> {
        let mut views: Vec<ProviderView> = self
            .providers
            .iter()
            .map(|entry| {
                let d = &entry.descriptor;
                ProviderView {
                    id: d.id.clone(),
                    enabled: d.enabled,
                    max_concurrency: d.max_concurrency,
                    pending_requests: d.pending_requests.load(Ordering::SeqCst),
                    total_requests: d.total_requests.load(Ordering::SeqCst),
                    avg_latency_ms: d.avg_latency_ms.load(Ordering::SeqCst),
                    model_count: entry.models.len(),
                }
            })
            .collect();
        views.sort_by(|a, b| a.id.cmp(&b.id));
        views
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, ProviderKind};
    use crate::provider::{AdapterCapabilities, AdapterError};
    use crate::types::{
        Complexity, CompletionRequest, CompletionResponse, QualityRequirement, Usage,
    };
    use async_trait::async_trait;

    struct NullAdapter {
        id: String,
    }

    #[async_trait]
    impl ProviderAdapter for NullAdapter {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            &self.id
        }

        fn capabilities(&self) -> AdapterCapabilities {
            AdapterCapabilities::default()
        }

        async fn complete(
            &self,
            model: &str,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, AdapterError> {
            Ok(CompletionResponse {
                content: "ok".to_string(),
                usage: Usage::default(),
                provider_id: self.id.clone(),
                model_id: model.to_string(),
                latency_ms: 0,
            })
        }
    }

    fn model(id: &str, tier: QualityRequirement) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            tier,
            context_length: 8192,
            max_output_tokens: None,
            supports_chat: true,
            supports_vision: false,
            supports_embeddings: false,
            input_cost_per_million: 1.0,
            output_cost_per_million: 2.0,
        }
    }

    fn provider(id: &str, models: Vec<ModelConfig>) -> ProviderConfig {
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

    fn register(registry: &ModelRegistry, config: &ProviderConfig) {
        let adapter = Arc::new(NullAdapter {
            id: config.id.clone(),
        });
        registry.register(config, adapter).unwrap();
    }

    fn chat_task(quality: QualityRequirement) -> TaskDescriptor {
        TaskDescriptor {
            task_type: TaskType::Chat,
            complexity: Complexity::Medium,
            quality,
            organization_id: "org".to_string(),
            user_id: "user".to_string(),
            max_tokens: None,
            cost_ceiling: None,
        }
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = ModelRegistry::new();
        let config = provider("p1", vec![model("m1", QualityRequirement::Standard)]);
        register(&registry, &config);
        let again = registry.register(
            &config,
            Arc::new(NullAdapter {
                id: "p1".to_string(),
            }),
        );
        assert_eq!(again, Err(RegistryError::DuplicateProvider("p1".to_string())));
    }

    #[test]
    fn filters_by_quality_tier() {
        let registry = ModelRegistry::new();
        register(
            &registry,
            &provider(
                "p1",
                vec![
                    model("draft-model", QualityRequirement::Draft),
                    model("premium-model", QualityRequirement::Premium),
                ],
            ),
        );

        let candidates = registry.candidates_for(&chat_task(QualityRequirement::Premium), 100);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].model_id(), "premium-model");

        let candidates = registry.candidates_for(&chat_task(QualityRequirement::Draft), 100);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn filters_by_context_length() {
        let registry = ModelRegistry::new();
        register(
            &registry,
            &provider("p1", vec![model("m1", QualityRequirement::Standard)]),
        );
        assert_eq!(
            registry
                .candidates_for(&chat_task(QualityRequirement::Standard), 100_000)
                .len(),
            0
        );
    }

    #[test]
    fn filters_embed_tasks_by_capability() {
        let registry = ModelRegistry::new();
        let mut embed_model = model("embedder", QualityRequirement::Standard);
        embed_model.supports_chat = false;
        embed_model.supports_embeddings = true;
        register(
            &registry,
            &provider(
                "p1",
                vec![embed_model, model("chat-model", QualityRequirement::Standard)],
            ),
        );

        let task = TaskDescriptor {
            task_type: TaskType::Embed,
            ..chat_task(QualityRequirement::Draft)
        };
        let candidates = registry.candidates_for(&task, 100);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].model_id(), "embedder");

        let candidates = registry.candidates_for(&chat_task(QualityRequirement::Draft), 100);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].model_id(), "chat-model");
    }

    #[test]
    fn disabled_provider_yields_no_candidates() {
        let registry = ModelRegistry::new();
        let mut config = provider("p1", vec![model("m1", QualityRequirement::Standard)]);
        config.enabled = false;
        register(&registry, &config);
        assert!(registry
            .candidates_for(&chat_task(QualityRequirement::Draft), 100)
            .is_empty());
    }

    #[test]
    fn reload_keeps_counters_and_drops_removed() {
        let registry = ModelRegistry::new();
        register(
            &registry,
            &provider("p1", vec![model("m1", QualityRequirement::Standard)]),
        );
        register(
            &registry,
            &provider("p2", vec![model("m2", QualityRequirement::Standard)]),
        );
        registry.descriptor("p1").unwrap().record_latency(80);

        let mut updated = provider("p1", vec![model("m1", QualityRequirement::Premium)]);
        updated.max_concurrency = 2;
        registry.reload(&[updated]).unwrap();

        assert_eq!(registry.provider_count(), 1);
        let descriptor = registry.descriptor("p1").unwrap();
        assert_eq!(descriptor.total_requests.load(Ordering::Relaxed), 1);
        assert_eq!(descriptor.max_concurrency, 2);
    }

    #[test]
    fn reload_rejects_unknown_provider() {
        let registry = ModelRegistry::new();
        let result = registry.reload(&[provider("ghost", vec![])]);
        assert_eq!(
            result,
            Err(RegistryError::AdapterMissing("ghost".to_string()))
        );
    }
}
