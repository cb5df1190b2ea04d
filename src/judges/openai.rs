// OpenAI Chat Completions client in JSON mode.
//
// The model is asked for a fixed JSON object and only the categories it marks
// as detected are kept. Anything that doesn't parse is a failure, not a zero.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::remote::read_json;
use super::traits::{CategoryScore, Evidence, JudgeVerdict, RemoteClient};
use crate::output::truncate_chars;
use crate::taxonomy::Category;

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = r#"あなたは日本語の毒性検知の専門家です。
与えられたテキストを分析し、以下の形式のJSONオブジェクトだけを返してください。

{
    "toxicity_score": 0.0-1.0の数値（全体的な毒性スコア）,
    "confidence": 0.0-1.0の数値（判定の確信度）,
    "categories": [
        {"name": "カテゴリ名", "score": 0.0-1.0の数値, "detected": true/false}
    ],
    "reasoning": "判定理由の簡潔な説明"
}

カテゴリ:
- severe_toxicity: 重度の毒性（死ね、殺す等）
- hate_speech: ヘイトスピーチ（きもい、クズ等）
- violence: 暴力的表現
- sexual: 性的な内容
- discrimination: 差別的表現
- mild_toxicity: 軽度の毒性（バカ、アホ等）

文脈を考慮し、教育的・説明的な文脈では毒性を低く評価してください。"#;

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl RemoteClient for OpenAiClient {
    async fn judge(&self, text: &str) -> Result<JudgeVerdict> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("以下のテキストの毒性を分析してください:\n\n{text}"),
                },
            ],
            temperature: 0.1,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to call OpenAI API")?;

        let result: ChatResponse = read_json(response, "OpenAI API").await?;
        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("OpenAI response had no message content")?;

        let verdict = parse_content(&content)?;

        debug!(
            score = verdict.score,
            confidence = verdict.confidence,
            model = %self.model,
            text_preview = %truncate_chars(text, 50),
            "OpenAI scored text"
        );

        Ok(verdict)
    }
}

/// Parse the model's JSON answer into a verdict.
pub fn parse_content(content: &str) -> Result<JudgeVerdict> {
    let answer: ToxicityAnswer =
        serde_json::from_str(content).context("OpenAI answer was not the expected JSON")?;

    let categories = answer
        .categories
        .iter()
        .filter(|c| c.detected)
        .filter_map(|c| match Category::from_label(&c.name) {
            Some(category) => Some(CategoryScore {
                category,
                score: c.score,
            }),
            None => {
                debug!(name = %c.name, "Ignoring unknown category from OpenAI");
                None
            }
        })
        .collect();

    let verdict = JudgeVerdict::new(
        answer.toxicity_score,
        categories,
        answer.confidence.unwrap_or(0.5),
    );

    Ok(match answer.reasoning.filter(|r| !r.trim().is_empty()) {
        Some(reasoning) => verdict.with_evidence(Evidence {
            reasoning: Some(reasoning),
            ..Evidence::default()
        }),
        None => verdict,
    })
}

// --- Chat Completions request/response types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// The JSON object the system prompt asks for.
#[derive(Deserialize)]
struct ToxicityAnswer {
    toxicity_score: f64,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    categories: Vec<AnswerCategory>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Deserialize)]
struct AnswerCategory {
    name: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    detected: bool,
}
