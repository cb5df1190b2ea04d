// Scoring engine: the one entry point the request layer talks to.
//
// score() validates the request, asks the selector for a plan, runs the
// planned judges (in parallel, or as a cascade with early exit) under a
// request-level deadline, and hands the outcomes to the aggregator.

pub mod aggregate;
pub mod registry;
pub mod strategy;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{EngineError, JudgeError, JudgeFailure};
use crate::judges::traits::Evidence;
use crate::judges::Judge;
use crate::taxonomy::{Category, Taxonomy};
use aggregate::{Aggregator, FusionParams, JudgeOutcome};
use registry::{JudgeInfo, JudgePanel};
use strategy::{Plan, RunMode, Strategy, StrategySelector};

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreOptions {
    /// Toxic threshold override for this request, within [0, 1]
    pub threshold: Option<f64>,
    /// Attach each judge's evidence to the verdict
    pub include_reasoning: bool,
}

/// One fused category in a verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryVerdict {
    pub name: Category,
    pub score: f64,
    pub confidence: f64,
}

/// The engine's answer for one text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_toxic: bool,
    pub toxicity_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_category: Option<Category>,
    /// Highest score first
    pub categories: Vec<CategoryVerdict>,
    pub confidence: f64,
    /// Judges that produced a result, in invocation order
    pub judges_used: Vec<String>,
    pub per_judge_scores: BTreeMap<String, f64>,
    /// Time spent in each invoked judge, failed ones included
    pub per_judge_seconds: BTreeMap<String, f64>,
    pub processing_time_seconds: f64,
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<JudgeFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<BTreeMap<String, Evidence>>,
}

/// Engine-wide knobs, fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub toxic_threshold: f64,
    pub cascade_threshold: f64,
    pub deadline: Duration,
    pub require_embedding: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            toxic_threshold: 0.3,
            cascade_threshold: 0.2,
            deadline: Duration::from_secs(10),
            require_embedding: false,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            toxic_threshold: config.toxic_threshold,
            cascade_threshold: config.cascade_threshold,
            deadline: config.deadline,
            require_embedding: config.require_embedding,
        }
    }
}

pub struct ScoringEngine {
    taxonomy: Arc<Taxonomy>,
    panel: JudgePanel,
    selector: StrategySelector,
    aggregator: Aggregator,
    toxic_threshold: f64,
    deadline: Duration,
}

impl ScoringEngine {
    pub fn new(taxonomy: Arc<Taxonomy>, panel: JudgePanel, settings: EngineSettings) -> Self {
        Self {
            taxonomy: Arc::clone(&taxonomy),
            panel,
            selector: StrategySelector::new(settings.cascade_threshold, settings.require_embedding),
            aggregator: Aggregator::new(taxonomy),
            toxic_threshold: settings.toxic_threshold,
            deadline: settings.deadline,
        }
    }

    /// Load the taxonomy and every available judge from configuration.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let taxonomy = Arc::new(config.load_taxonomy()?);
        let panel = JudgePanel::from_config(config, Arc::clone(&taxonomy)).await?;

        let ready: Vec<&str> = std::iter::once(panel.lexical())
            .chain(panel.embedding())
            .chain(panel.remotes())
            .map(|judge| judge.name())
            .collect();
        info!(
            judges = ?ready,
            excluded = panel.excluded().len(),
            "Scoring engine ready"
        );

        Ok(Self::new(taxonomy, panel, EngineSettings::from_config(config)))
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Introspection: every judge and whether it can run.
    pub fn judges(&self) -> Vec<JudgeInfo> {
        self.panel.describe()
    }

    /// Like `score`, with the strategy given by name.
    pub async fn score_named(
        &self,
        text: &str,
        strategy: &str,
        options: &ScoreOptions,
    ) -> Result<Verdict, EngineError> {
        let strategy: Strategy = strategy.parse()?;
        self.score(text, strategy, options).await
    }

    pub async fn score(
        &self,
        text: &str,
        strategy: Strategy,
        options: &ScoreOptions,
    ) -> Result<Verdict, EngineError> {
        let started = Instant::now();

        let toxic_threshold = match options.threshold {
            Some(t) if !(0.0..=1.0).contains(&t) => {
                return Err(EngineError::InvalidOption(format!(
                    "threshold must be between 0.0 and 1.0, got {t}"
                )));
            }
            Some(t) => t,
            None => self.toxic_threshold,
        };

        if text.trim().is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let plan = self.selector.select(strategy, &self.panel)?;
        debug!(strategy = %strategy, judges = ?plan.judge_names(), "Selected judges");

        // A deadline too far out to represent means no deadline
        let deadline = started.checked_add(self.deadline);
        let outcomes = match plan.mode {
            RunMode::Parallel => self.run_parallel(&plan, text, deadline).await,
            RunMode::Cascade { escalate_above } => {
                self.run_cascade(&plan, text, deadline, escalate_above).await
            }
        };

        let mut verdict = self.aggregator.fuse(
            outcomes,
            FusionParams {
                strategy,
                toxic_threshold,
                include_reasoning: options.include_reasoning,
            },
        )?;
        verdict.processing_time_seconds = started.elapsed().as_secs_f64();

        info!(
            strategy = %strategy,
            score = verdict.toxicity_score,
            toxic = verdict.is_toxic,
            judges = ?verdict.judges_used,
            failures = verdict.failures.len(),
            elapsed_ms = (verdict.processing_time_seconds * 1000.0) as u64,
            "Scored text"
        );

        Ok(verdict)
    }

    async fn run_parallel(
        &self,
        plan: &Plan<'_>,
        text: &str,
        deadline: Option<Instant>,
    ) -> Vec<JudgeOutcome> {
        join_all(
            plan.judges
                .iter()
                .map(|judge| self.run_judge(judge, text, deadline)),
        )
        .await
    }

    /// Run judges in order, continuing only while each one scores above the
    /// escalation threshold.
    async fn run_cascade(
        &self,
        plan: &Plan<'_>,
        text: &str,
        deadline: Option<Instant>,
        escalate_above: f64,
    ) -> Vec<JudgeOutcome> {
        let mut outcomes = Vec::with_capacity(plan.judges.len());
        for judge in &plan.judges {
            let outcome = self.run_judge(judge, text, deadline).await;
            let escalate = matches!(&outcome.result, Ok(v) if v.score > escalate_above);
            outcomes.push(outcome);
            if !escalate {
                break;
            }
        }
        outcomes
    }

    async fn run_judge(&self, judge: &Judge, text: &str, deadline: Option<Instant>) -> JudgeOutcome {
        let started = Instant::now();
        let result = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, judge.evaluate(text)).await {
                Ok(result) => result,
                Err(_) => Err(JudgeError::Timeout(self.deadline)),
            },
            None => judge.evaluate(text).await,
        };
        let seconds = started.elapsed().as_secs_f64();
        debug!(judge = judge.name(), ok = result.is_ok(), seconds, "Judge finished");

        if let Err(JudgeError::Internal(reason)) = &result {
            error!(judge = judge.name(), reason = %reason, "Local judge failed");
        }

        JudgeOutcome {
            judge: judge.name().to_string(),
            weight: judge.weight(),
            result,
            seconds,
        }
    }
}
