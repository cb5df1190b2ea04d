// Fusion of per-judge verdicts into one Verdict.
//
// Weights are the static per-judge weights, renormalized over the judges that
// actually produced a result. Normalizing before multiplying means a sole
// surviving judge gets a weight of exactly 1.0 and its scores pass through
// unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::strategy::Strategy;
use super::{CategoryVerdict, Verdict};
use crate::error::{EngineError, JudgeError, JudgeFailure};
use crate::judges::traits::{Evidence, JudgeVerdict};
use crate::taxonomy::{Category, Taxonomy};

/// Confidence multiplier when fewer than half of the selected judges succeeded.
const PARTIAL_FAILURE_PENALTY: f64 = 0.8;

/// What one selected judge produced for one request.
#[derive(Debug, Clone)]
pub struct JudgeOutcome {
    pub judge: String,
    pub weight: f64,
    pub result: Result<JudgeVerdict, JudgeError>,
    /// Wall-clock time the judge took, including failed and timed-out calls
    pub seconds: f64,
}

/// Per-request fusion inputs beyond the outcomes themselves.
#[derive(Debug, Clone, Copy)]
pub struct FusionParams {
    pub strategy: Strategy,
    pub toxic_threshold: f64,
    pub include_reasoning: bool,
}

#[derive(Clone)]
pub struct Aggregator {
    taxonomy: Arc<Taxonomy>,
}

impl Aggregator {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    /// Fuse outcomes in selection order into a verdict.
    ///
    /// `processing_time_seconds` is left at zero for the caller to fill in.
    pub fn fuse(&self, outcomes: Vec<JudgeOutcome>, params: FusionParams) -> Result<Verdict, EngineError> {
        let selected = outcomes.len();
        let per_judge_seconds: BTreeMap<String, f64> = outcomes
            .iter()
            .map(|outcome| (outcome.judge.clone(), outcome.seconds))
            .collect();
        let mut succeeded: Vec<(String, f64, JudgeVerdict)> = Vec::with_capacity(selected);
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(verdict) => succeeded.push((outcome.judge, outcome.weight, verdict)),
                Err(e) => failures.push(JudgeFailure::new(outcome.judge, &e)),
            }
        }

        if succeeded.is_empty() {
            return Err(EngineError::AllJudgesFailed { failures });
        }

        let weights = normalized_weights(succeeded.iter().map(|(_, w, _)| *w));

        let score = weighted_sum(succeeded.iter().zip(&weights).map(|((_, _, v), w)| (v.score, *w)))
            .clamp(0.0, 1.0);

        let mut confidence =
            weighted_sum(succeeded.iter().zip(&weights).map(|((_, _, v), w)| (v.confidence, *w)));
        if succeeded.len() * 2 < selected {
            confidence *= PARTIAL_FAILURE_PENALTY;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let mut categories = Vec::new();
        let mut primary: Option<(Category, f64)> = None;

        for category in Category::ALL {
            let fused = weighted_sum(
                succeeded
                    .iter()
                    .zip(&weights)
                    .map(|((_, _, v), w)| (v.category_score(category), *w)),
            )
            .clamp(0.0, 1.0);
            if fused <= 0.0 {
                continue;
            }

            // Confidence among the judges that saw this category
            let reporters: Vec<(f64, f64)> = succeeded
                .iter()
                .zip(&weights)
                .filter(|((_, _, v), _)| v.category_score(category) > 0.0)
                .map(|((_, _, v), w)| (v.confidence, *w))
                .collect();
            let reporter_weights = normalized_weights(reporters.iter().map(|(_, w)| *w));
            let category_confidence = weighted_sum(
                reporters
                    .iter()
                    .zip(&reporter_weights)
                    .map(|((c, _), w)| (*c, *w)),
            );

            let severity = fused * self.taxonomy.weight(category);
            match primary {
                Some((_, best)) if severity <= best => {}
                _ => primary = Some((category, severity)),
            }

            categories.push(CategoryVerdict {
                name: category,
                score: fused,
                confidence: category_confidence.clamp(0.0, 1.0),
            });
        }

        // Stable sort keeps taxonomy order among equal scores
        categories.sort_by(|a, b| b.score.total_cmp(&a.score));

        let judges_used: Vec<String> = succeeded.iter().map(|(name, _, _)| name.clone()).collect();
        let per_judge_scores: BTreeMap<String, f64> = succeeded
            .iter()
            .map(|(name, _, v)| (name.clone(), v.score))
            .collect();

        let reasoning = params.include_reasoning.then(|| {
            succeeded
                .iter()
                .filter_map(|(name, _, v)| v.evidence.clone().map(|e| (name.clone(), e)))
                .collect::<BTreeMap<String, Evidence>>()
        });

        debug!(
            score,
            confidence,
            judges = judges_used.len(),
            failures = failures.len(),
            "Fused judge verdicts"
        );

        Ok(Verdict {
            is_toxic: score >= params.toxic_threshold,
            toxicity_score: score,
            primary_category: primary.map(|(category, _)| category),
            categories,
            confidence,
            judges_used,
            per_judge_scores,
            per_judge_seconds,
            processing_time_seconds: 0.0,
            strategy: params.strategy,
            failures,
            reasoning,
        })
    }
}

/// Scale weights to sum to 1. All-zero (or empty) weights become equal shares.
fn normalized_weights(weights: impl Iterator<Item = f64>) -> Vec<f64> {
    let weights: Vec<f64> = weights.map(|w| w.max(0.0)).collect();
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.iter().map(|w| w / total).collect()
    } else {
        let share = 1.0 / weights.len().max(1) as f64;
        vec![share; weights.len()]
    }
}

fn weighted_sum(pairs: impl Iterator<Item = (f64, f64)>) -> f64 {
    pairs.map(|(value, weight)| value * weight).sum()
}
