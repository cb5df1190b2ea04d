// Embedding judge: semantic similarity to per-category reference phrases.
//
// Keyword matching misses paraphrases ("この世から消えてほしい" never contains
// "死ね"). This judge embeds the input and compares it against embeddings of
// each category's keywords, precomputed once at construction. The encoder is a
// black box behind TextEncoder; only its output vectors are used here.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error};

use super::onnx::cosine_similarity;
use super::traits::{CategoryScore, Evidence, JudgeVerdict, TextEncoder};
use crate::error::JudgeError;
use crate::output::truncate_chars;
use crate::taxonomy::{Category, Taxonomy};

/// Reference vectors for one category.
struct CategoryReference {
    category: Category,
    weight: f64,
    phrases: Vec<String>,
    vectors: Vec<Vec<f64>>,
}

pub struct EmbeddingJudge {
    encoder: Arc<dyn TextEncoder>,
    references: Vec<CategoryReference>,
    similarity_threshold: f64,
    weight: f64,
}

impl EmbeddingJudge {
    /// Encode every category's reference phrases and build the judge.
    ///
    /// Fails if the encoder cannot produce the reference vectors, which the
    /// caller treats as the model being unavailable.
    pub async fn build(
        encoder: Arc<dyn TextEncoder>,
        taxonomy: &Taxonomy,
        similarity_threshold: f64,
        weight: f64,
    ) -> Result<Self> {
        let phrases: Vec<String> = taxonomy
            .iter()
            .flat_map(|(_, spec)| spec.keywords.iter().cloned())
            .collect();

        let mut vectors = encoder
            .encode(&phrases)
            .await
            .context("Failed to encode category reference phrases")?
            .into_iter();
        if vectors.len() != phrases.len() {
            anyhow::bail!(
                "Encoder returned {} vectors for {} reference phrases",
                vectors.len(),
                phrases.len()
            );
        }

        let references = taxonomy
            .iter()
            .map(|(category, spec)| CategoryReference {
                category,
                weight: spec.weight,
                phrases: spec.keywords.clone(),
                vectors: vectors.by_ref().take(spec.keywords.len()).collect(),
            })
            .collect();

        debug!(phrases = phrases.len(), "Embedding judge reference vectors ready");

        Ok(Self {
            encoder,
            references,
            similarity_threshold,
            weight,
        })
    }

    /// Fusion weight of this judge.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub async fn evaluate(&self, text: &str) -> std::result::Result<JudgeVerdict, JudgeError> {
        let embedding = self
            .encoder
            .encode(&[text.to_string()])
            .await
            .map_err(|e| {
                error!(error = %e, "Embedding inference failed");
                JudgeError::Internal(format!("{e:#}"))
            })?
            .into_iter()
            .next()
            .ok_or_else(|| JudgeError::Internal("encoder returned no vector".to_string()))?;

        let mut categories = Vec::new();
        let mut closest = Vec::new();
        let mut overall = 0.0_f64;

        for reference in &self.references {
            let Some((phrase, similarity)) = reference.closest(&embedding) else {
                continue;
            };
            if similarity < self.similarity_threshold {
                continue;
            }
            let score = similarity * reference.weight;
            overall = overall.max(score);
            categories.push(CategoryScore {
                category: reference.category,
                score,
            });
            closest.push(phrase.to_string());
        }

        let confidence = confidence(overall, !categories.is_empty());

        debug!(
            score = overall,
            confidence,
            categories = categories.len(),
            text_preview = %truncate_chars(text, 50),
            "Embedding judge scored text"
        );

        let verdict = JudgeVerdict::new(overall, categories, confidence);
        Ok(if closest.is_empty() {
            verdict
        } else {
            verdict.with_evidence(Evidence {
                matched: closest,
                ..Evidence::default()
            })
        })
    }
}

impl CategoryReference {
    /// The most similar reference phrase and its similarity.
    fn closest(&self, embedding: &[f64]) -> Option<(&str, f64)> {
        self.phrases
            .iter()
            .zip(&self.vectors)
            .map(|(phrase, vector)| (phrase.as_str(), cosine_similarity(embedding, vector)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Confidence tiers: strong matches are trusted more than weak ones, and a
/// miss from a similarity model says little.
fn confidence(score: f64, has_matches: bool) -> f64 {
    match (has_matches, score) {
        (true, s) if s >= 0.7 => 0.9,
        (true, s) if s >= 0.3 => 0.7,
        (true, _) => 0.5,
        (false, _) => 0.3,
    }
}
