//! Per-organization admission stage.

use super::{Middleware, RequestContext};
use crate::error::OrchestrationError;
use crate::types::ResponsePayload;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounds concurrent in-flight requests per organization.
///
/// A permit is claimed in `before` and released in `after`; organizations
/// at their cap are refused immediately rather than queued.
pub struct RateLimitStage {
    permits: DashMap<String, Arc<Semaphore>>,
}

impl RateLimitStage {
    pub fn new() -> Self {
        Self {
            permits: DashMap::new(),
        }
    }

    fn semaphore_for(&self, organization_id: &str, capacity: u32) -> Arc<Semaphore> {
        // The semaphore is sized at first use; a mid-flight capacity change
        // applies to organizations seen after the next service restart.
        self.permits
            .entry(organization_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(capacity as usize)))
            .clone()
    }
}

impl Default for RateLimitStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for RateLimitStage {
    fn name(&self) -> &str {
        "rate_limit"
    }

    async fn before(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Option<ResponsePayload>, OrchestrationError> {
        if !ctx.config.rate_limit.enabled {
            return Ok(None);
        }
        let semaphore = self.semaphore_for(
            &ctx.task.organization_id,
            ctx.config.rate_limit.max_in_flight_per_org,
        );
        match semaphore.try_acquire_owned() {
            Ok(permit) => {
                ctx.rate_permit = Some(permit);
                Ok(None)
            }
            Err(_) => {
                metrics::counter!("switchboard_rate_limited_total").increment(1);
                tracing::warn!(
                    request_id = %ctx.request_id,
                    organization = %ctx.task.organization_id,
                    "organization at in-flight cap"
                );
                Err(OrchestrationError::RateLimited {
                    organization_id: ctx.task.organization_id.clone(),
                })
            }
        }
    }

    async fn after(&self, ctx: &mut RequestContext, _response: Option<&ResponsePayload>) {
        // Dropping the permit releases the slot
        ctx.rate_permit.take();
    }
}
