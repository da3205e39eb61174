//! Metrics emission and experiment attribution stage (innermost).

use super::{DispatchOutcome, Middleware, RequestContext};
use crate::error::OrchestrationError;
use crate::experiment::{ExperimentManager, VariantOutcome};
use crate::types::ResponsePayload;
use async_trait::async_trait;
use std::sync::Arc;

/// Emits per-request metrics and attributes outcomes to A/B variants.
///
/// Innermost stage: its `after` sees the response first, so latency and
/// provider labels reflect the dispatch itself.
pub struct MonitoringStage {
    experiments: Arc<ExperimentManager>,
}

impl MonitoringStage {
    pub fn new(experiments: Arc<ExperimentManager>) -> Self {
        Self { experiments }
    }
}

#[async_trait]
impl Middleware for MonitoringStage {
    fn name(&self) -> &str {
        "monitoring"
    }

    async fn before(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Option<ResponsePayload>, OrchestrationError> {
        metrics::counter!(
            "switchboard_requests_total",
            "task_type" => ctx.task.task_type.to_string()
        )
        .increment(1);
        Ok(None)
    }

    async fn after(&self, ctx: &mut RequestContext, response: Option<&ResponsePayload>) {
        let latency_ms = ctx.elapsed_ms();
        let success = response.is_some();

        match response {
            Some(response) => {
                metrics::histogram!(
                    "switchboard_request_duration_ms",
                    "provider" => response.provider_id().to_string()
                )
                .record(latency_ms as f64);
                metrics::counter!(
                    "switchboard_tokens_total",
                    "provider" => response.provider_id().to_string(),
                    "type" => "prompt"
                )
                .increment(response.usage().prompt_tokens as u64);
                metrics::counter!(
                    "switchboard_tokens_total",
                    "provider" => response.provider_id().to_string(),
                    "type" => "completion"
                )
                .increment(response.usage().completion_tokens as u64);
            }
            None => {
                metrics::counter!(
                    "switchboard_request_failures_total",
                    "task_type" => ctx.task.task_type.to_string()
                )
                .increment(1);
            }
        }

        if let Some(variant) = &ctx.variant {
            // Cache hits count as successes with zero marginal cost
            let cost_usd = if ctx.outcome == DispatchOutcome::Completed {
                ctx.actual_cost.unwrap_or(ctx.estimated_cost)
            } else {
                0.0
            };
            self.experiments.record_outcome(
                &variant.test_id,
                &variant.variant_id,
                VariantOutcome {
                    success,
                    latency_ms,
                    cost_usd,
                    satisfaction: None,
                },
            );
        }
    }
}
