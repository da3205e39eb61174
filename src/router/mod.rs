//! Router and fallback engine.
//!
//! Builds an ordered candidate list from the registry and walks it
//! sequentially: circuit check, per-candidate budget authorization,
//! admission, then a single dispatch under deadline. First success wins;
//! every skipped or failed candidate leaves a normalized entry in the
//! trail, and an exhausted list fails with the full trail attached.
//! There is never more than one live provider call per logical request.

pub mod scoring;

pub use scoring::{score_candidate, ScoringWeights};

use crate::breaker::CircuitBreaker;
use crate::cost::{estimate_output_tokens, CostGuard};
use crate::error::{AttemptFailure, FailureReason, OrchestrationError};
use crate::pipeline::{DispatchOutcome, Dispatcher, RequestContext};
use crate::provider::AdapterError;
use crate::registry::{Candidate, ModelRegistry};
use crate::types::{RequestPayload, ResponsePayload};
use async_trait::async_trait;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Selects candidates and walks the fallback chain for each call.
pub struct Router {
    registry: Arc<ModelRegistry>,
    breaker: Arc<CircuitBreaker>,
    guard: Arc<CostGuard>,
}

impl Router {
    pub fn new(
        registry: Arc<ModelRegistry>,
        breaker: Arc<CircuitBreaker>,
        guard: Arc<CostGuard>,
    ) -> Self {
        Self {
            registry,
            breaker,
            guard,
        }
    }

    /// Order candidates by composite score, best first.
    fn rank(&self, ctx: &RequestContext, candidates: Vec<Candidate>) -> Vec<(Candidate, f64)> {
        let weights = ctx.config.routing.cost_optimization.weights();
        let input_tokens = ctx.estimated_input_tokens;
        let output_tokens =
            estimate_output_tokens(input_tokens, ctx.task.complexity, ctx.task.max_tokens);

        let estimates: Vec<f64> = candidates
            .iter()
            .map(|c| c.entry.pricing.cost(input_tokens, output_tokens))
            .collect();
        let cheapest = estimates.iter().copied().fold(f64::INFINITY, f64::min);
        let cheapest = if cheapest.is_finite() { cheapest } else { 0.0 };

        let preferred = ctx
            .variant
            .as_ref()
            .and_then(|v| v.preferred_provider.as_deref());

        let mut ranked: Vec<(Candidate, f64, u32)> = candidates
            .into_iter()
            .zip(estimates)
            .map(|(candidate, estimate)| {
                let bonus = if preferred == Some(candidate.provider_id()) {
                    ctx.config.routing.variant_preference_bonus
                } else {
                    0
                };
                let score = score_candidate(
                    estimate,
                    cheapest,
                    candidate.avg_latency_ms(),
                    &weights,
                    bonus,
                );
                (candidate, estimate, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.2.cmp(&a.2));
        ranked
            .into_iter()
            .map(|(candidate, estimate, _)| (candidate, estimate))
            .collect()
    }

    /// One adapter call for whichever operation the payload carries.
    async fn call_adapter(
        candidate: &Candidate,
        payload: &RequestPayload,
    ) -> Result<ResponsePayload, AdapterError> {
        match payload {
            RequestPayload::Complete(request) => candidate
                .adapter
                .complete(candidate.model_id(), request)
                .await
                .map(ResponsePayload::Completion),
            RequestPayload::Embed(request) => candidate
                .adapter
                .embed(candidate.model_id(), request)
                .await
                .map(ResponsePayload::Embedding),
        }
    }

    async fn try_candidate(
        &self,
        ctx: &RequestContext,
        candidate: &Candidate,
        estimate: f64,
        trail: &mut Vec<AttemptFailure>,
    ) -> Option<ResponsePayload> {
        let provider_id = candidate.provider_id().to_string();
        let model_id = candidate.model_id().to_string();

        if !self.breaker.allow(&provider_id) {
            trail.push(AttemptFailure {
                provider_id,
                model_id,
                reason: FailureReason::CircuitOpen,
                message: "circuit open, provider skipped".to_string(),
            });
            return None;
        }

        // Per-candidate budget check with this candidate's pricing
        let ceiling_violation = ctx
            .task
            .cost_ceiling
            .map(|ceiling| estimate > ceiling)
            .unwrap_or(false);
        if ceiling_violation
            || !self
                .guard
                .authorize(&ctx.task.organization_id, estimate, &ctx.config.cost)
                .approved()
        {
            self.breaker.release_trial(&provider_id);
            trail.push(AttemptFailure {
                provider_id,
                model_id,
                reason: FailureReason::CostRejected,
                message: format!("estimated cost ${:.4} rejected by budget", estimate),
            });
            return None;
        }

        // Admission: never queue behind a saturated provider
        let permit = match candidate.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.breaker.release_trial(&provider_id);
                trail.push(AttemptFailure {
                    provider_id,
                    model_id,
                    reason: FailureReason::Saturated,
                    message: "provider at concurrency cap".to_string(),
                });
                return None;
            }
        };

        let timeout = Duration::from_millis(ctx.config.routing.request_timeout_ms);
        let started = Instant::now();
        candidate
            .descriptor
            .pending_requests
            .fetch_add(1, Ordering::Relaxed);

        let result = tokio::time::timeout(timeout, Self::call_adapter(candidate, &ctx.payload)).await;

        candidate
            .descriptor
            .pending_requests
            .fetch_sub(1, Ordering::Relaxed);
        drop(permit);

        let latency_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(Ok(mut response)) => {
                self.breaker.record_success(&provider_id);
                candidate.descriptor.record_latency(latency_ms);
                match &mut response {
                    ResponsePayload::Completion(r) => r.latency_ms = latency_ms,
                    ResponsePayload::Embedding(r) => r.latency_ms = latency_ms,
                }
                tracing::debug!(
                    request_id = %ctx.request_id,
                    provider = %provider_id,
                    model = %model_id,
                    latency_ms,
                    "dispatch succeeded"
                );
                Some(response)
            }
            Ok(Err(error)) => {
                self.breaker.record_failure(&provider_id, &ctx.config.breaker);
                tracing::warn!(
                    request_id = %ctx.request_id,
                    provider = %provider_id,
                    error = %error,
                    "dispatch failed, trying next candidate"
                );
                trail.push(AttemptFailure::from_adapter_error(
                    &provider_id,
                    &model_id,
                    &error,
                ));
                None
            }
            Err(_) => {
                // Deadline exceeded: treated identically to an adapter failure
                self.breaker.record_failure(&provider_id, &ctx.config.breaker);
                tracing::warn!(
                    request_id = %ctx.request_id,
                    provider = %provider_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "dispatch timed out, trying next candidate"
                );
                trail.push(AttemptFailure {
                    provider_id,
                    model_id,
                    reason: FailureReason::Timeout,
                    message: format!("timed out after {}ms", timeout.as_millis()),
                });
                None
            }
        }
    }
}

#[async_trait]
impl Dispatcher for Router {
    async fn dispatch(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<ResponsePayload, OrchestrationError> {
        let candidates = self
            .registry
            .candidates_for(&ctx.task, ctx.estimated_input_tokens);
        if candidates.is_empty() {
            return Err(OrchestrationError::NoCandidates {
                task_type: ctx.task.task_type.to_string(),
                quality: ctx.task.quality.to_string(),
            });
        }

        let ranked = self.rank(ctx, candidates);
        let mut trail: Vec<AttemptFailure> = Vec::new();

        for (candidate, estimate) in &ranked {
            if let Some(response) = self.try_candidate(ctx, candidate, *estimate, &mut trail).await
            {
                if !trail.is_empty() {
                    metrics::counter!(
                        "switchboard_fallbacks_total",
                        "provider" => candidate.provider_id().to_string()
                    )
                    .increment(1);
                }
                ctx.outcome = DispatchOutcome::Completed;
                ctx.actual_cost = Some(candidate.entry.pricing.cost(
                    response.usage().prompt_tokens,
                    response.usage().completion_tokens,
                ));
                return Ok(response);
            }
        }

        ctx.outcome = DispatchOutcome::Failed;
        let error = OrchestrationError::AllProvidersFailed { trail };
        if error.is_all_circuits_open() {
            tracing::error!(
                request_id = %ctx.request_id,
                "all providers unavailable: every circuit open"
            );
        }
        Err(error)
    }
}
