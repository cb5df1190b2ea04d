// Judge output types and the swap-ready backend traits.
//
// Every judge, local or remote, reports a JudgeVerdict of the same shape so the
// aggregator can treat them uniformly. The two traits here are the seams where
// external collaborators plug in: TextEncoder for the embedding model and
// RemoteClient for hosted moderation/LLM services. Tests substitute fakes at
// both seams.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::taxonomy::Category;

/// A single category score reported by one judge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: Category,
    pub score: f64,
}

/// Supporting material behind a verdict (matched keywords, model reasoning).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evidence {
    /// Literal strings that triggered the verdict, if the judge exposes them
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched: Vec<String>,
    /// Free-text justification from an LLM judge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Raw remote payload, kept for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// The output of one judge for one input text.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    /// Overall toxicity from 0.0 (benign) to 1.0 (very toxic)
    pub score: f64,
    /// Categories with a positive score, in taxonomy order
    pub categories: Vec<CategoryScore>,
    /// How sure the judge is of its own verdict, 0.0 to 1.0
    pub confidence: f64,
    pub evidence: Option<Evidence>,
}

impl JudgeVerdict {
    /// Build a verdict, clamping scores into [0, 1], dropping zero-score
    /// categories, and ordering the rest by taxonomy order.
    ///
    /// If a category appears more than once, the highest score wins.
    pub fn new(score: f64, categories: Vec<CategoryScore>, confidence: f64) -> Self {
        let mut merged: Vec<CategoryScore> = Vec::with_capacity(categories.len());
        for entry in categories {
            let score = clamp_unit(entry.score);
            if score <= 0.0 {
                continue;
            }
            match merged.iter_mut().find(|c| c.category == entry.category) {
                Some(existing) => existing.score = existing.score.max(score),
                None => merged.push(CategoryScore {
                    category: entry.category,
                    score,
                }),
            }
        }
        merged.sort_by_key(|c| c.category);

        Self {
            score: clamp_unit(score),
            categories: merged,
            confidence: clamp_unit(confidence),
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Score this judge gave a category, or 0.0 if it did not report it.
    pub fn category_score(&self, category: Category) -> f64 {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.score)
            .unwrap_or(0.0)
    }
}

/// Clamp into [0, 1], mapping NaN to 0.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Turns text into dense vectors. The embedding judge only relies on this contract.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Encode each text into a vector, preserving input order.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
}

/// A hosted toxicity service. Implementations must be async because every
/// provider is an HTTP API.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Ask the service for a verdict on a single text.
    async fn judge(&self, text: &str) -> Result<JudgeVerdict>;
}
