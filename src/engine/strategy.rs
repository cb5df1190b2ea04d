// Strategies and the selector that turns one into a run plan.
//
// A strategy is a fixed latency/accuracy trade-off. The selector only looks at
// which judges the panel actually has; it never hands back a judge it knows
// cannot run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::registry::JudgePanel;
use crate::error::EngineError;
use crate::judges::remote::UseCase;
use crate::judges::{Judge, EMBEDDING};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Fast,
    Cascade,
    Balanced,
    Accurate,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Fast,
        Strategy::Cascade,
        Strategy::Balanced,
        Strategy::Accurate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Fast => "fast",
            Strategy::Cascade => "cascade",
            Strategy::Balanced => "balanced",
            Strategy::Accurate => "accurate",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Strategy::Fast => "Keyword matching only",
            Strategy::Cascade => "Keyword matching, escalating to embeddings when something looks off",
            Strategy::Balanced => "Keywords, embeddings and the cheapest remote judge in parallel",
            Strategy::Accurate => "Every available judge in parallel",
        }
    }

    /// Rough expected latency, for display.
    pub fn latency_hint(&self) -> &'static str {
        match self {
            Strategy::Fast => "<1ms",
            Strategy::Cascade => "1-100ms",
            Strategy::Balanced => "0.5-2s",
            Strategy::Accurate => "1-5s",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == key)
            .ok_or_else(|| EngineError::InvalidStrategy(s.to_string()))
    }
}

/// How the selected judges are invoked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunMode {
    /// All judges at once; wait for every one to settle or hit the deadline.
    Parallel,
    /// One at a time; stop after the first judge unless its score exceeds
    /// `escalate_above`.
    Cascade { escalate_above: f64 },
}

/// Judges to invoke for one request, in invocation order.
pub struct Plan<'a> {
    pub judges: Vec<&'a Judge>,
    pub mode: RunMode,
}

impl Plan<'_> {
    pub fn judge_names(&self) -> Vec<&str> {
        self.judges.iter().map(|j| j.name()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct StrategySelector {
    cascade_threshold: f64,
    require_embedding: bool,
}

impl StrategySelector {
    pub fn new(cascade_threshold: f64, require_embedding: bool) -> Self {
        Self {
            cascade_threshold,
            require_embedding,
        }
    }

    pub fn select<'a>(
        &self,
        strategy: Strategy,
        panel: &'a JudgePanel,
    ) -> Result<Plan<'a>, EngineError> {
        let lexical = panel.lexical();

        if strategy == Strategy::Fast {
            return Ok(Plan {
                judges: vec![lexical],
                mode: RunMode::Parallel,
            });
        }

        let mut judges = vec![lexical];
        match panel.embedding() {
            Some(embedding) => judges.push(embedding),
            None if self.require_embedding => {
                return Err(EngineError::ModelUnavailable(
                    panel
                        .exclusion_reason(EMBEDDING)
                        .unwrap_or_else(|| "embedding judge not loaded".to_string()),
                ));
            }
            None => {}
        }

        let mode = match strategy {
            Strategy::Cascade => RunMode::Cascade {
                escalate_above: self.cascade_threshold,
            },
            Strategy::Balanced => {
                judges.extend(cheapest_remote(panel));
                RunMode::Parallel
            }
            Strategy::Accurate => {
                judges.extend(panel.remotes());
                RunMode::Parallel
            }
            Strategy::Fast => RunMode::Parallel,
        };

        Ok(Plan { judges, mode })
    }
}

/// Lowest cost rank wins; ties prefer screening judges, then name order.
fn cheapest_remote(panel: &JudgePanel) -> Option<&Judge> {
    panel
        .remotes()
        .min_by(|a, b| cost_key(a).cmp(&cost_key(b)).then_with(|| a.name().cmp(b.name())))
}

fn cost_key(judge: &Judge) -> (u8, UseCase) {
    match judge {
        Judge::Remote(remote) => (remote.profile().cost_rank, remote.profile().use_case),
        _ => (u8::MAX, UseCase::Contextual),
    }
}
