// Google Perspective API client.
//
// Perspective scores text against a fixed set of moderation attributes. It's
// free to use but rate-limited to ~1 QPS, so every call goes through the
// shared RateLimiter. Attributes are folded into the category taxonomy here;
// the rest of the engine never sees attribute names.
//
// API docs: https://developers.perspectiveapi.com/s/about-the-api-methods

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rate_limiter::RateLimiter;
use super::remote::read_json;
use super::traits::{CategoryScore, Evidence, JudgeVerdict, RemoteClient};
use crate::output::truncate_chars;
use crate::taxonomy::Category;

const ANALYZE_URL: &str = "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze";

/// Categories scoring at or below this are treated as noise.
const CATEGORY_FLOOR: f64 = 0.2;

/// Which Perspective attributes feed each category.
const ATTRIBUTE_MAP: &[(Category, &[&str])] = &[
    (Category::SevereToxicity, &["SEVERE_TOXICITY"]),
    (Category::HateSpeech, &["IDENTITY_ATTACK", "INSULT"]),
    (Category::Violence, &["THREAT"]),
    (Category::MildToxicity, &["PROFANITY"]),
];

pub struct PerspectiveClient {
    client: Client,
    api_key: String,
    languages: Vec<String>,
    rate_limiter: RateLimiter,
}

impl PerspectiveClient {
    pub fn new(api_key: String, languages: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            languages,
            // Perspective free tier: 1 query per second
            rate_limiter: RateLimiter::new(1.0),
        }
    }
}

#[async_trait]
impl RemoteClient for PerspectiveClient {
    async fn judge(&self, text: &str) -> Result<JudgeVerdict> {
        let waited = self.rate_limiter.acquire().await;
        if !waited.is_zero() {
            debug!(waited = ?waited, "Perspective rate limit delay");
        }

        let request = PerspectiveRequest {
            comment: Comment {
                text: text.to_string(),
            },
            requested_attributes: RequestedAttributes {
                toxicity: AttributeConfig {},
                severe_toxicity: AttributeConfig {},
                identity_attack: AttributeConfig {},
                insult: AttributeConfig {},
                profanity: AttributeConfig {},
                threat: AttributeConfig {},
            },
            languages: self.languages.clone(),
            do_not_store: true,
        };

        let response = self
            .client
            .post(ANALYZE_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("Failed to call Perspective API")?;

        let result: PerspectiveResponse = read_json(response, "Perspective API").await?;

        let scores: HashMap<String, f64> = result
            .attribute_scores
            .into_iter()
            .map(|(name, score)| (name, score.summary_score.value))
            .collect();

        let verdict = interpret(&scores);

        debug!(
            score = verdict.score,
            confidence = verdict.confidence,
            attributes = scores.len(),
            text_preview = %truncate_chars(text, 50),
            "Perspective scored text"
        );

        Ok(verdict)
    }
}

/// Turn raw attribute scores into a verdict.
pub fn interpret(scores: &HashMap<String, f64>) -> JudgeVerdict {
    let mut categories = Vec::new();
    for (category, attributes) in ATTRIBUTE_MAP {
        let values: Vec<f64> = attributes
            .iter()
            .filter_map(|name| scores.get(*name).copied())
            .collect();
        if values.is_empty() {
            continue;
        }
        let score = values.iter().sum::<f64>() / values.len() as f64;
        if score > CATEGORY_FLOOR {
            categories.push(CategoryScore {
                category: *category,
                score,
            });
        }
    }

    let overall = scores
        .get("TOXICITY")
        .copied()
        .unwrap_or_else(|| scores.values().copied().fold(0.0_f64, f64::max));

    let confidence = if scores.is_empty() {
        0.5
    } else {
        // Attributes that agree with the headline score mean a clearer call
        let variance = scores
            .values()
            .map(|s| (s - overall).powi(2))
            .sum::<f64>()
            / scores.len() as f64;
        (1.0 - variance).clamp(0.5, 1.0)
    };

    let mut attributes: Vec<String> = scores
        .iter()
        .map(|(name, value)| format!("{name}={value:.3}"))
        .collect();
    attributes.sort();

    JudgeVerdict::new(overall, categories, confidence).with_evidence(Evidence {
        raw: Some(attributes.join(" ")),
        ..Evidence::default()
    })
}

// --- Perspective API request/response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PerspectiveRequest {
    comment: Comment,
    requested_attributes: RequestedAttributes,
    languages: Vec<String>,
    do_not_store: bool,
}

#[derive(Serialize)]
struct Comment {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RequestedAttributes {
    toxicity: AttributeConfig,
    severe_toxicity: AttributeConfig,
    identity_attack: AttributeConfig,
    insult: AttributeConfig,
    profanity: AttributeConfig,
    threat: AttributeConfig,
}

#[derive(Serialize)]
struct AttributeConfig {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerspectiveResponse {
    #[serde(default)]
    attribute_scores: HashMap<String, AttributeScore>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeScore {
    summary_score: SummaryScore,
}

#[derive(Deserialize)]
struct SummaryScore {
    value: f64,
}
