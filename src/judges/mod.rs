// Toxicity judges: independent backends that each score a text on their own.
//
// Lexical and embedding judges run locally; remote judges wrap hosted
// moderation/LLM services behind the RemoteClient trait. The engine sees all
// of them through the `Judge` enum and never touches variant internals.

pub mod claude;
pub mod download;
pub mod embedding;
pub mod lexical;
pub mod onnx;
pub mod openai;
pub mod perspective;
pub mod rate_limiter;
pub mod remote;
pub mod traits;

use serde::Serialize;

use crate::error::JudgeError;
use embedding::EmbeddingJudge;
use lexical::LexicalJudge;
use remote::RemoteJudge;
use traits::JudgeVerdict;

pub const LEXICAL: &str = "lexical";
pub const EMBEDDING: &str = "embedding";

/// Broad family of a judge, for introspection and strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgeKind {
    Lexical,
    Embedding,
    Remote,
}

impl JudgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JudgeKind::Lexical => "lexical",
            JudgeKind::Embedding => "embedding",
            JudgeKind::Remote => "remote",
        }
    }
}

pub enum Judge {
    Lexical(LexicalJudge),
    Embedding(EmbeddingJudge),
    Remote(RemoteJudge),
}

impl Judge {
    pub fn name(&self) -> &str {
        match self {
            Judge::Lexical(_) => LEXICAL,
            Judge::Embedding(_) => EMBEDDING,
            Judge::Remote(judge) => judge.name(),
        }
    }

    pub fn kind(&self) -> JudgeKind {
        match self {
            Judge::Lexical(_) => JudgeKind::Lexical,
            Judge::Embedding(_) => JudgeKind::Embedding,
            Judge::Remote(_) => JudgeKind::Remote,
        }
    }

    /// Static fusion weight.
    pub fn weight(&self) -> f64 {
        match self {
            Judge::Lexical(judge) => judge.weight(),
            Judge::Embedding(judge) => judge.weight(),
            Judge::Remote(judge) => judge.profile().weight,
        }
    }

    pub async fn evaluate(&self, text: &str) -> Result<JudgeVerdict, JudgeError> {
        match self {
            Judge::Lexical(judge) => Ok(judge.evaluate(text)),
            Judge::Embedding(judge) => judge.evaluate(text).await,
            Judge::Remote(judge) => judge.evaluate(text).await,
        }
    }
}
