//! Middleware pipeline wrapped around the dispatch call.
//!
//! Stages compose in registration order for `before` and reverse order
//! for `after` (onion model). A stage's `before` may short-circuit with a
//! ready response (cache hit), in which case the dispatcher is never
//! invoked but every `after` hook still runs: cache hits are logged and
//! monitored without being re-billed, because the cost commit is gated on
//! a dispatch having completed.

use crate::config::OrchestratorConfig;
use crate::cost::estimate_input_tokens;
use crate::error::OrchestrationError;
use crate::experiment::Variant;
use crate::types::{RequestPayload, ResponsePayload, TaskDescriptor};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedSemaphorePermit;
use uuid::Uuid;

pub mod caching;
pub mod cost_control;
pub mod logging;
pub mod monitoring;
pub mod rate_limit;

pub use caching::CachingStage;
pub use cost_control::CostControlStage;
pub use logging::LoggingStage;
pub use monitoring::MonitoringStage;
pub use rate_limit::RateLimitStage;

/// What dispatch did for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchOutcome {
    /// No adapter call completed (cache hit, rejection, or failure
    /// before any candidate succeeded)
    #[default]
    NotDispatched,
    /// A response was observed from a provider
    Completed,
    /// Every candidate failed
    Failed,
}

/// Mutable state owned by the pipeline for the duration of one call.
pub struct RequestContext {
    pub request_id: Uuid,
    /// Config snapshot taken at call entry; never refreshed mid-call
    pub config: Arc<OrchestratorConfig>,
    pub task: TaskDescriptor,
    pub payload: RequestPayload,
    pub fingerprint: String,
    /// Heuristic input token count for candidate filtering and costing
    pub estimated_input_tokens: u32,
    /// Representative pre-dispatch cost estimate, USD
    pub estimated_cost: f64,
    /// True cost as priced from the provider's reported usage
    pub actual_cost: Option<f64>,
    pub outcome: DispatchOutcome,
    pub served_from_cache: bool,
    /// Variant this caller is assigned to, if an experiment is active
    pub variant: Option<Variant>,
    /// Held while the org's admission permit is claimed
    pub rate_permit: Option<OwnedSemaphorePermit>,
    pub started_at: Instant,
}

impl RequestContext {
    pub fn new(
        config: Arc<OrchestratorConfig>,
        task: TaskDescriptor,
        payload: RequestPayload,
        variant: Option<Variant>,
    ) -> Self {
        let fingerprint = crate::cache::fingerprint(&task, &payload);
        let estimated_input_tokens = estimate_input_tokens(payload.content_chars());
        Self {
            request_id: Uuid::new_v4(),
            config,
            task,
            payload,
            fingerprint,
            estimated_input_tokens,
            estimated_cost: 0.0,
            actual_cost: None,
            outcome: DispatchOutcome::default(),
            served_from_cache: false,
            variant,
            rate_permit: None,
            started_at: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// One pipeline stage.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stage name for logging.
    fn name(&self) -> &str;

    /// Pre-dispatch hook. Returning `Ok(Some(response))` short-circuits
    /// the pipeline; returning an error terminates the call.
    async fn before(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Option<ResponsePayload>, OrchestrationError>;

    /// Post-dispatch hook, run in reverse registration order. Always runs
    /// once the stage chain started, whatever the outcome.
    async fn after(&self, ctx: &mut RequestContext, response: Option<&ResponsePayload>);
}

/// The dispatch call the pipeline wraps.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<ResponsePayload, OrchestrationError>;
}

/// Ordered, composable stage chain.
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stages }
    }

    /// Run the full onion: befores in order, dispatch, afters in reverse.
    pub async fn execute(
        &self,
        ctx: &mut RequestContext,
        dispatcher: &dyn Dispatcher,
    ) -> Result<ResponsePayload, OrchestrationError> {
        let mut response: Option<ResponsePayload> = None;
        let mut error: Option<OrchestrationError> = None;

        for stage in &self.stages {
            match stage.before(ctx).await {
                Ok(None) => continue,
                Ok(Some(ready)) => {
                    tracing::debug!(
                        request_id = %ctx.request_id,
                        stage = stage.name(),
                        "pipeline short-circuit"
                    );
                    response = Some(ready);
                    break;
                }
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }

        if response.is_none() && error.is_none() {
            match dispatcher.dispatch(ctx).await {
                Ok(r) => response = Some(r),
                Err(e) => error = Some(e),
            }
        }

        for stage in self.stages.iter().rev() {
            stage.after(ctx, response.as_ref()).await;
        }

        match (response, error) {
            (Some(r), _) => Ok(r),
            (None, Some(e)) => Err(e),
            (None, None) => Err(OrchestrationError::AllProvidersFailed { trail: vec![] }),
        }
    }
}
