//! Switchboard - AI provider orchestration layer
//!
//! This library routes logical "complete this prompt" / "embed this text"
//! requests to one of several interchangeable AI backends, enforcing cost
//! and reliability guarantees and falling back gracefully when a backend
//! misbehaves.
//!
//! The single entry point is [`service::AiService`]; everything else is
//! the machinery behind it: the [`registry`] of (provider, model) pairs,
//! the [`router`] walking the fallback chain, the [`breaker`] isolating
//! failing providers, the [`cost`] guard enforcing budgets, the response
//! [`cache`], and the middleware [`pipeline`] tying them together.

pub mod breaker;
pub mod cache;
pub mod config;
pub mod cost;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod router;
pub mod service;
pub mod types;

pub use error::{AttemptFailure, FailureReason, OrchestrationError};
pub use service::AiService;
pub use types::{
    ChatMessage, CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse,
    TaskDescriptor, TaskType,
};
