//! Budget check and commit stage.

use super::{DispatchOutcome, Middleware, RequestContext};
use crate::cost::{estimate_output_tokens, CostGuard};
use crate::error::OrchestrationError;
use crate::registry::ModelRegistry;
use crate::types::ResponsePayload;
use async_trait::async_trait;
use std::sync::Arc;

/// Pre-authorizes the request against the organization's budget and
/// commits the true cost after a response was observed.
///
/// The pre-dispatch check uses the cheapest capable candidate as the
/// representative estimate; the router re-authorizes each candidate with
/// its own pricing before dispatching to it. The commit in `after` is the
/// only ledger write, so cache hits and failed calls are never billed.
pub struct CostControlStage {
    guard: Arc<CostGuard>,
    registry: Arc<ModelRegistry>,
}

impl CostControlStage {
    pub fn new(guard: Arc<CostGuard>, registry: Arc<ModelRegistry>) -> Self {
        Self { guard, registry }
    }
}

#[async_trait]
impl Middleware for CostControlStage {
    fn name(&self) -> &str {
        "cost_control"
    }

    async fn before(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Option<ResponsePayload>, OrchestrationError> {
        if !ctx.config.cost.enabled {
            return Ok(None);
        }

        let input_tokens = ctx.estimated_input_tokens;
        let output_tokens =
            estimate_output_tokens(input_tokens, ctx.task.complexity, ctx.task.max_tokens);

        // Cheapest capable candidate as the representative estimate
        let estimate = self
            .registry
            .candidates_for(&ctx.task, input_tokens)
            .iter()
            .map(|c| c.entry.pricing.cost(input_tokens, output_tokens))
            .fold(None::<f64>, |min, cost| match min {
                Some(current) if current <= cost => Some(current),
                _ => Some(cost),
            })
            .unwrap_or(0.0);
        ctx.estimated_cost = estimate;

        if let Some(ceiling) = ctx.task.cost_ceiling {
            if estimate > ceiling {
                return Err(OrchestrationError::CostLimitExceeded {
                    organization_id: ctx.task.organization_id.clone(),
                    reason: format!(
                        "Estimated cost ${:.4} exceeds request cost ceiling ${:.4}",
                        estimate, ceiling
                    ),
                });
            }
        }

        match self
            .guard
            .authorize(&ctx.task.organization_id, estimate, &ctx.config.cost)
        {
            crate::cost::Authorization::Approved => Ok(None),
            crate::cost::Authorization::Rejected { reason } => {
                Err(OrchestrationError::CostLimitExceeded {
                    organization_id: ctx.task.organization_id.clone(),
                    reason,
                })
            }
        }
    }

    async fn after(&self, ctx: &mut RequestContext, _response: Option<&ResponsePayload>) {
        if ctx.outcome != DispatchOutcome::Completed {
            return;
        }
        let cost = ctx.actual_cost.unwrap_or(ctx.estimated_cost);
        self.guard.commit(&ctx.task.organization_id, cost);
    }
}
