// Anthropic Messages API client.
//
// Claude answers in a short line-oriented format rather than JSON:
//
//   総合スコア: 0.85
//   カテゴリ: 重度の毒性、ヘイトスピーチ
//   理由: ...
//   検出語句: 死ね
//
// Category scores are not asked for; they are derived from the total score.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::remote::read_json;
use super::traits::{CategoryScore, Evidence, JudgeVerdict, RemoteClient};
use crate::output::truncate_chars;
use crate::taxonomy::Category;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 200;

/// Answers that mean "no category" / "nothing detected".
const NONE_MARKERS: &[&str] = &["なし", "無し", "none", "該当なし"];

/// Below this total, an unlabelled answer gets no inferred category.
const INFER_FLOOR: f64 = 0.3;

pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
    parser: AnswerParser,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            api_key,
            model,
            parser: AnswerParser::new()?,
        })
    }
}

#[async_trait]
impl RemoteClient for ClaudeClient {
    async fn judge(&self, text: &str) -> Result<JudgeVerdict> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            messages: vec![UserMessage {
                role: "user",
                content: build_prompt(text),
            }],
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .context("Failed to call Anthropic API")?;

        let result: MessagesResponse = read_json(response, "Anthropic API").await?;
        let answer = result
            .content
            .into_iter()
            .find(|c| c.content_type == "text")
            .map(|c| c.text)
            .context("Anthropic response had no text content")?;

        let verdict = self.parser.parse(&answer)?;

        debug!(
            score = verdict.score,
            categories = verdict.categories.len(),
            model = %self.model,
            text_preview = %truncate_chars(text, 50),
            "Claude scored text"
        );

        Ok(verdict)
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        r#"あなたは日本語の毒性検知の専門家です。

以下の日本語テキストの毒性を分析してください。
0.0（完全に安全）から1.0（非常に有害）のスコアと、該当するカテゴリを判定してください。

カテゴリ:
- 重度の毒性: 死ね、殺す等の生命を脅かす表現
- ヘイトスピーチ: きもい、クズ等の侮辱的表現
- 暴力的表現: 暴力を示唆する表現
- 性的な内容: 性的な表現
- 差別的表現: 差別を含む表現
- 軽度の毒性: バカ、アホ等の軽い悪口

テキスト: "{text}"

以下の形式で回答してください：
総合スコア: [0.0-1.0の数値]
カテゴリ: [該当するカテゴリ名（日本語、複数可）]
理由: [判定理由を簡潔に]
検出語句: [毒性のある具体的な語句（カンマ区切り）]"#
    )
}

/// Parser for the line-oriented answer format.
pub struct AnswerParser {
    field: Regex,
    number: Regex,
    separator: Regex,
}

impl AnswerParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            field: Regex::new(r"^\s*(総合スコア|カテゴリ|理由|検出語句)\s*[:：]\s*(.*?)\s*$")
                .context("invalid field pattern")?,
            number: Regex::new(r"\d+(?:\.\d+)?").context("invalid number pattern")?,
            separator: Regex::new(r"[,、，]").context("invalid separator pattern")?,
        })
    }

    pub fn parse(&self, answer: &str) -> Result<JudgeVerdict> {
        let mut total: Option<f64> = None;
        let mut labels: Vec<String> = Vec::new();
        let mut reason: Option<String> = None;
        let mut detected: Vec<String> = Vec::new();

        for line in answer.lines() {
            let Some(caps) = self.field.captures(line) else {
                continue;
            };
            let value = caps.get(2).map_or("", |m| m.as_str());
            match caps.get(1).map_or("", |m| m.as_str()) {
                "総合スコア" => {
                    total = self
                        .number
                        .find(value)
                        .and_then(|m| m.as_str().parse::<f64>().ok());
                }
                "カテゴリ" => labels = self.split_list(value),
                "理由" if !value.is_empty() => reason = Some(value.to_string()),
                "検出語句" => detected = self.split_list(value),
                _ => {}
            }
        }

        let total = total
            .context("Claude answer had no 総合スコア line")?
            .clamp(0.0, 1.0);

        let mut categories: Vec<CategoryScore> = labels
            .iter()
            .filter_map(|label| match Category::from_label(label) {
                Some(category) => Some(category),
                None => {
                    debug!(label = %label, "Ignoring unknown category from Claude");
                    None
                }
            })
            .map(|category| CategoryScore {
                category,
                score: total * category_share(category),
            })
            .collect();

        if labels.is_empty() && total >= INFER_FLOOR {
            let category = infer_category(total);
            categories.push(CategoryScore {
                category,
                score: total * category_share(category),
            });
        }

        let confidence = if total > 0.0 { 0.9 } else { 0.95 };

        let verdict = JudgeVerdict::new(total, categories, confidence);
        if reason.is_none() && detected.is_empty() {
            return Ok(verdict);
        }
        Ok(verdict.with_evidence(Evidence {
            matched: detected,
            reasoning: reason,
            raw: None,
        }))
    }

    /// Split a comma list, treating the "none" markers as empty.
    fn split_list(&self, value: &str) -> Vec<String> {
        if is_none_marker(value) {
            return Vec::new();
        }
        self.separator
            .split(value)
            .map(str::trim)
            .filter(|item| !item.is_empty() && !is_none_marker(item))
            .map(str::to_string)
            .collect()
    }
}

fn is_none_marker(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value.is_empty() || NONE_MARKERS.contains(&value.as_str())
}

/// Fraction of the total score attributed to a named category.
fn category_share(category: Category) -> f64 {
    match category {
        Category::SevereToxicity | Category::HateSpeech => 0.8,
        _ => 0.6,
    }
}

/// Pick a category for a toxic answer that didn't name one.
fn infer_category(total: f64) -> Category {
    if total >= 0.8 {
        Category::SevereToxicity
    } else if total >= 0.5 {
        Category::HateSpeech
    } else {
        Category::MildToxicity
    }
}

// --- Messages API request/response types ---

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<UserMessage>,
}

#[derive(Serialize)]
struct UserMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}
