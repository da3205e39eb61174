//! Provider adapter abstraction layer.
//!
//! This module provides the [`ProviderAdapter`] trait that normalizes one
//! backend's request/response shape into the unified schema, plus concrete
//! adapters for OpenAI-compatible and Anthropic APIs. The router never
//! sees a vendor wire format; translation lives entirely in the adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod anthropic;
pub mod error;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use error::AdapterError;
pub use openai::OpenAiAdapter;

use crate::types::{CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse};

/// Operations an adapter implementation can perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    /// Supports the embeddings operation.
    pub embeddings: bool,
    /// Accepts image content in messages.
    pub vision: bool,
}

/// Unified interface for all AI provider backends.
///
/// Encapsulates backend-specific HTTP protocols, response parsing, and
/// error mapping. Enables uniform routing without type branching.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as
/// `Arc<dyn ProviderAdapter>`.
///
/// # Cancellation Safety
///
/// All async methods are cancellation-safe. Dropping a future aborts any
/// in-flight HTTP request.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    /// Unique identifier for this adapter instance; must match the
    /// provider id in configuration.
    fn id(&self) -> &str;

    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Operations this adapter supports.
    fn capabilities(&self) -> AdapterCapabilities;

    /// Execute a completion request against the given model.
    ///
    /// # Returns
    ///
    /// - `Ok(CompletionResponse)` on success; `provider_id` and
    ///   `latency_ms` are filled in by the router
    /// - `Err(AdapterError::Upstream)` if the backend returned 4xx/5xx
    /// - `Err(AdapterError::Network)` if the connection failed
    /// - `Err(AdapterError::Timeout)` if the request exceeded its deadline
    /// - `Err(AdapterError::InvalidResponse)` on an unparseable body
    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, AdapterError>;

    /// Generate embeddings for input text.
    ///
    /// Default implementation returns `Unsupported`. Override in adapters
    /// whose backend exposes an embeddings endpoint.
    async fn embed(
        &self,
        _model: &str,
        _request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, AdapterError> {
        Err(AdapterError::Unsupported("embeddings"))
    }

    /// Check backend reachability.
    ///
    /// Used by explicit registry reloads, never on the request path.
    async fn health_check(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}
