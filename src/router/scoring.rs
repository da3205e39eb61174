//! Scoring function for candidate ordering.

use crate::config::CostOptimization;

/// Weights for scoring candidates. Must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    /// Weight for relative cost (0-100)
    pub cost: u32,
    /// Weight for average latency (0-100)
    pub latency: u32,
}

impl ScoringWeights {
    /// Validate that weights sum to 100
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.cost + self.latency;
        if sum != 100 {
            Err(format!("Scoring weights must sum to 100, got {}", sum))
        } else {
            Ok(())
        }
    }
}

impl CostOptimization {
    /// Weight profile for this optimization setting.
    pub fn weights(&self) -> ScoringWeights {
        match self {
            CostOptimization::Cost => ScoringWeights {
                cost: 70,
                latency: 30,
            },
            CostOptimization::Speed => ScoringWeights {
                cost: 30,
                latency: 70,
            },
            CostOptimization::Balanced => ScoringWeights {
                cost: 50,
                latency: 50,
            },
        }
    }
}

/// Score a candidate based on its estimated cost, the cheapest estimate
/// among all candidates, its rolling latency, and an optional variant
/// preference bonus.
///
/// Returns a score where higher is better; the weighted component is
/// 0-100 and the preference bonus is added on top.
pub fn score_candidate(
    estimated_cost: f64,
    cheapest_cost: f64,
    avg_latency_ms: u32,
    weights: &ScoringWeights,
    preference_bonus: u32,
) -> u32 {
    // Cost score: cheapest candidate gets 100, others scale down
    let cost_score = if estimated_cost <= 0.0 {
        100
    } else if cheapest_cost <= 0.0 {
        0
    } else {
        ((cheapest_cost / estimated_cost) * 100.0).min(100.0) as u32
    };

    // Latency score: 0ms=100, 100ms=90, 500ms=50, 1000ms=0
    let latency_score = 100 - (avg_latency_ms / 10).min(100);

    (cost_score * weights.cost + latency_score * weights.latency) / 100 + preference_bonus
}
