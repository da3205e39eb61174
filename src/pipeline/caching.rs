//! Response cache stage.

use super::{DispatchOutcome, Middleware, RequestContext};
use crate::cache::ResponseCache;
use crate::error::OrchestrationError;
use crate::types::ResponsePayload;
use async_trait::async_trait;
use std::sync::Arc;

/// Serves repeated normalized requests from the cache and populates it
/// after successful dispatches.
pub struct CachingStage {
    cache: Arc<ResponseCache>,
}

impl CachingStage {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Middleware for CachingStage {
    fn name(&self) -> &str {
        "caching"
    }

    async fn before(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Option<ResponsePayload>, OrchestrationError> {
        if !ctx.config.cache.enabled {
            return Ok(None);
        }
        if let Some(hit) = self.cache.get(&ctx.fingerprint) {
            ctx.served_from_cache = true;
            tracing::debug!(
                request_id = %ctx.request_id,
                fingerprint = %ctx.fingerprint,
                "cache hit"
            );
            return Ok(Some(hit));
        }
        Ok(None)
    }

    async fn after(&self, ctx: &mut RequestContext, response: Option<&ResponsePayload>) {
        if ctx.served_from_cache || ctx.outcome != DispatchOutcome::Completed {
            return;
        }
        if let Some(response) = response {
            self.cache
                .insert(ctx.fingerprint.clone(), response.clone(), &ctx.config.cache);
        }
    }
}
