//! Structured request logging stage (outermost).

use super::{DispatchOutcome, Middleware, RequestContext};
use crate::error::OrchestrationError;
use crate::logging::truncate_content;
use crate::types::{RequestPayload, ResponsePayload};
use async_trait::async_trait;

/// Logs request entry and exit with structured fields.
///
/// Message content is only logged when `logging.enable_content_logging`
/// is set, and always truncated.
pub struct LoggingStage;

#[async_trait]
impl Middleware for LoggingStage {
    fn name(&self) -> &str {
        "logging"
    }

    async fn before(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Option<ResponsePayload>, OrchestrationError> {
        tracing::info!(
            request_id = %ctx.request_id,
            organization = %ctx.task.organization_id,
            task_type = %ctx.task.task_type,
            quality = %ctx.task.quality,
            estimated_tokens = ctx.estimated_input_tokens,
            "request received"
        );

        if ctx.config.logging.enable_content_logging {
            if let RequestPayload::Complete(request) = &ctx.payload {
                if let Some(last) = request.messages.last() {
                    tracing::debug!(
                        request_id = %ctx.request_id,
                        prompt = truncate_content(&last.content, 200),
                        "request content"
                    );
                }
            }
        }
        Ok(None)
    }

    async fn after(&self, ctx: &mut RequestContext, response: Option<&ResponsePayload>) {
        match (ctx.outcome, response) {
            (_, Some(response)) => {
                tracing::info!(
                    request_id = %ctx.request_id,
                    organization = %ctx.task.organization_id,
                    provider = response.provider_id(),
                    model = response.model_id(),
                    latency_ms = ctx.elapsed_ms(),
                    cache_hit = ctx.served_from_cache,
                    total_tokens = response.usage().total_tokens(),
                    "request completed"
                );
            }
            (DispatchOutcome::Failed, None) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    organization = %ctx.task.organization_id,
                    latency_ms = ctx.elapsed_ms(),
                    "request failed on all candidates"
                );
            }
            _ => {
                tracing::info!(
                    request_id = %ctx.request_id,
                    organization = %ctx.task.organization_id,
                    latency_ms = ctx.elapsed_ms(),
                    "request rejected before dispatch"
                );
            }
        }
    }
}
