// Lexical judge: keyword matching against the category taxonomy.
//
// Pure computation over the immutable taxonomy, so it never fails at request
// time and never suspends. A single hit in a high-severity category is meant to
// dominate the verdict, which is why the score curve steepens with the
// category's severity weight.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::traits::{CategoryScore, Evidence, JudgeVerdict};
use crate::normalize::normalize_text;
use crate::output::truncate_chars;
use crate::taxonomy::Taxonomy;

/// Share of the overall score taken by the single worst category.
const MAX_SHARE: f64 = 0.8;

/// Confidence when nothing matched: clean text is an easy call.
const CLEAN_CONFIDENCE: f64 = 0.9;

/// Texts shorter than this (in characters) with a match are unambiguous.
const SHORT_TEXT_CHARS: usize = 10;

pub struct LexicalJudge {
    taxonomy: Arc<Taxonomy>,
    weight: f64,
}

impl LexicalJudge {
    pub fn new(taxonomy: Arc<Taxonomy>, weight: f64) -> Self {
        Self { taxonomy, weight }
    }

    /// Fusion weight of this judge.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Score a text by keyword matches.
    pub fn evaluate(&self, text: &str) -> JudgeVerdict {
        let normalized = normalize_text(text);

        let mut categories = Vec::new();
        let mut weighted_scores = Vec::new();
        let mut all_matches = BTreeSet::new();
        let mut total_matches = 0usize;

        for (category, spec) in self.taxonomy.iter() {
            let matches = match_keywords(&normalized, &spec.keywords, self.taxonomy.intensifiers());
            if matches.is_empty() {
                continue;
            }

            let score = category_score(spec.weight, matches.len());
            categories.push(CategoryScore { category, score });
            weighted_scores.push(score * spec.weight);
            total_matches += matches.len();
            all_matches.extend(matches);
        }

        let overall = overall_score(&weighted_scores);
        let confidence = confidence(total_matches, text.chars().count());

        debug!(
            score = overall,
            confidence,
            matches = total_matches,
            text_preview = %truncate_chars(text, 50),
            "Lexical judge scored text"
        );

        let verdict = JudgeVerdict::new(overall, categories, confidence);
        if all_matches.is_empty() {
            verdict
        } else {
            verdict.with_evidence(Evidence {
                matched: all_matches.into_iter().collect(),
                ..Evidence::default()
            })
        }
    }
}

/// Collect the distinct keyword hits in already-normalized text.
///
/// Each direct hit also yields an "intensified" entry when an intensifier sits
/// right before the keyword, either adjacent or separated by one space.
fn match_keywords(text: &str, keywords: &[String], intensifiers: &[String]) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for keyword in keywords {
        if !text.contains(keyword.as_str()) {
            continue;
        }
        found.insert(keyword.clone());

        for intensifier in intensifiers {
            for candidate in [
                format!("{intensifier}{keyword}"),
                format!("{intensifier} {keyword}"),
            ] {
                if text.contains(candidate.as_str()) {
                    found.insert(candidate);
                }
            }
        }
    }
    found
}

/// Per-category score from the number of distinct matches.
///
/// The curve depends on the category's severity weight: ordinary categories
/// go 0.4 / 0.6 / 0.8, weight >= 0.8 goes 0.6 / 0.8 / 1.0, and weight >= 1.0
/// goes 0.8 / 1.0.
pub fn category_score(weight: f64, distinct_matches: usize) -> f64 {
    match (distinct_matches, weight) {
        (0, _) => 0.0,
        (1, w) if w >= 1.0 => 0.8,
        (_, w) if w >= 1.0 => 1.0,
        (1, w) if w >= 0.8 => 0.6,
        (2, w) if w >= 0.8 => 0.8,
        (_, w) if w >= 0.8 => 1.0,
        (1, _) => 0.4,
        (2, _) => 0.6,
        _ => 0.8,
    }
}

/// Blend the worst weighted category score with the mean over matched categories.
///
/// Computed as `max - 0.2 * (max - mean)`, which equals `0.8 * max + 0.2 * mean`
/// but returns `max` exactly when only one category matched.
fn overall_score(weighted_scores: &[f64]) -> f64 {
    if weighted_scores.is_empty() {
        return 0.0;
    }
    let max = weighted_scores.iter().copied().fold(0.0_f64, f64::max);
    let mean = weighted_scores.iter().sum::<f64>() / weighted_scores.len() as f64;
    (max - (1.0 - MAX_SHARE) * (max - mean)).clamp(0.0, 1.0)
}

/// Confidence from keyword density.
fn confidence(distinct_matches: usize, text_chars: usize) -> f64 {
    if distinct_matches == 0 {
        return CLEAN_CONFIDENCE;
    }
    if text_chars < SHORT_TEXT_CHARS {
        return 1.0;
    }
    // Matches per 10 characters, capped so the bonus never exceeds 0.3
    let density = distinct_matches as f64 / (text_chars as f64 / 10.0).max(1.0);
    (0.7 + 0.3 * density.min(1.0)).min(1.0)
}
