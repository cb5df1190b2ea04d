// The judge panel: every judge that loaded at startup, plus a record of the
// ones that didn't and why.
//
// Built once and immutable afterwards. Credentials decide which remote judges
// exist at all; a missing key is an expected exclusion, not an error.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info};

use crate::config::Config;
use crate::error::JudgeError;
use crate::judges::claude::ClaudeClient;
use crate::judges::download::{embedding_files_present, embedding_model_dir};
use crate::judges::embedding::EmbeddingJudge;
use crate::judges::lexical::LexicalJudge;
use crate::judges::onnx::SentenceEncoder;
use crate::judges::openai::OpenAiClient;
use crate::judges::perspective::PerspectiveClient;
use crate::judges::remote::{require_credential, RemoteJudge, RemoteProfile, UseCase};
use crate::judges::traits::RemoteClient;
use crate::judges::{Judge, JudgeKind, EMBEDDING};
use crate::taxonomy::Taxonomy;

/// A judge that was left out of the panel at startup.
#[derive(Debug, Clone)]
pub struct ExcludedJudge {
    pub name: String,
    pub kind: JudgeKind,
    pub weight: f64,
    pub error: JudgeError,
}

pub struct JudgePanel {
    lexical: Judge,
    embedding: Option<Judge>,
    remotes: Vec<Judge>,
    excluded: Vec<ExcludedJudge>,
}

impl JudgePanel {
    /// A panel with only the lexical judge. Add the rest with the `with_*` methods.
    pub fn new(lexical: LexicalJudge) -> Self {
        Self {
            lexical: Judge::Lexical(lexical),
            embedding: None,
            remotes: Vec::new(),
            excluded: Vec::new(),
        }
    }

    pub fn with_embedding(mut self, judge: EmbeddingJudge) -> Self {
        self.embedding = Some(Judge::Embedding(judge));
        self
    }

    pub fn with_remote(mut self, judge: RemoteJudge) -> Self {
        self.remotes.push(Judge::Remote(judge));
        self
    }

    pub fn with_excluded(mut self, excluded: ExcludedJudge) -> Self {
        self.excluded.push(excluded);
        self
    }

    /// Load every judge the configuration allows.
    ///
    /// Only the taxonomy is mandatory. A missing embedding model or API key
    /// shrinks the panel instead of failing startup.
    pub async fn from_config(config: &Config, taxonomy: Arc<Taxonomy>) -> Result<Self> {
        let mut panel = Self::new(LexicalJudge::new(
            Arc::clone(&taxonomy),
            config.weights.lexical,
        ));

        match load_embedding(config, &taxonomy).await {
            Ok(judge) => {
                info!("Embedding judge loaded");
                panel = panel.with_embedding(judge);
            }
            Err(e) => {
                error!(error = %e, "Embedding judge unavailable, continuing without it");
                panel = panel.with_excluded(ExcludedJudge {
                    name: EMBEDDING.to_string(),
                    kind: JudgeKind::Embedding,
                    weight: config.weights.embedding,
                    error: JudgeError::ModelUnavailable(format!("{e:#}")),
                });
            }
        }

        let remotes: [(&str, f64, u8, UseCase, Result<Arc<dyn RemoteClient>, JudgeError>); 3] = [
            (
                "perspective",
                config.weights.perspective,
                0,
                UseCase::Screening,
                require_credential("PERSPECTIVE_API_KEY", &config.perspective_api_key).map(
                    |key| {
                        Arc::new(PerspectiveClient::new(key, config.perspective_languages.clone()))
                            as Arc<dyn RemoteClient>
                    },
                ),
            ),
            (
                "openai",
                config.weights.openai,
                1,
                UseCase::Contextual,
                require_credential("OPENAI_API_KEY", &config.openai_api_key).map(|key| {
                    Arc::new(OpenAiClient::new(key, config.openai_model.clone()))
                        as Arc<dyn RemoteClient>
                }),
            ),
            (
                "claude",
                config.weights.claude,
                2,
                UseCase::Contextual,
                require_credential("ANTHROPIC_API_KEY", &config.anthropic_api_key).and_then(
                    |key| {
                        ClaudeClient::new(key, config.claude_model.clone())
                            .map(|client| Arc::new(client) as Arc<dyn RemoteClient>)
                            .map_err(|e| JudgeError::Internal(format!("{e:#}")))
                    },
                ),
            ),
        ];

        for (name, weight, cost_rank, use_case, client) in remotes {
            match client {
                Ok(client) => {
                    info!(judge = name, "Remote judge enabled");
                    let profile = RemoteProfile {
                        weight,
                        cost_rank,
                        use_case,
                        timeout: config.remote_timeout,
                    };
                    panel = panel.with_remote(RemoteJudge::new(name, profile, client));
                }
                Err(e) => {
                    info!(judge = name, reason = %e, "Remote judge excluded");
                    panel = panel.with_excluded(ExcludedJudge {
                        name: name.to_string(),
                        kind: JudgeKind::Remote,
                        weight,
                        error: e,
                    });
                }
            }
        }

        Ok(panel)
    }

    pub fn lexical(&self) -> &Judge {
        &self.lexical
    }

    pub fn embedding(&self) -> Option<&Judge> {
        self.embedding.as_ref()
    }

    pub fn remotes(&self) -> impl Iterator<Item = &Judge> {
        self.remotes.iter()
    }

    pub fn excluded(&self) -> &[ExcludedJudge] {
        &self.excluded
    }

    /// Why a judge was left out at startup, if it was.
    pub fn exclusion_reason(&self, name: &str) -> Option<String> {
        self.excluded
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.error.to_string())
    }

    /// Every judge, loaded or not, for display.
    pub fn describe(&self) -> Vec<JudgeInfo> {
        let loaded = std::iter::once(&self.lexical)
            .chain(self.embedding.iter())
            .chain(self.remotes.iter())
            .map(JudgeInfo::ready);
        let excluded = self.excluded.iter().map(JudgeInfo::excluded);
        loaded.chain(excluded).collect()
    }
}

async fn load_embedding(config: &Config, taxonomy: &Taxonomy) -> Result<EmbeddingJudge> {
    let model_dir = embedding_model_dir(&config.model_dir);
    if !embedding_files_present(&config.model_dir) {
        anyhow::bail!(
            "model not downloaded to {}; run `tonecheck download-model`",
            model_dir.display()
        );
    }
    let encoder = SentenceEncoder::load(&model_dir)?;
    EmbeddingJudge::build(
        Arc::new(encoder),
        taxonomy,
        config.similarity_threshold,
        config.weights.embedding,
    )
    .await
}

/// Load state of a judge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum JudgeStatus {
    Ready,
    /// No credentials configured
    Disabled(String),
    /// Failed to load
    Unavailable(String),
}

/// Introspection record for one judge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeInfo {
    pub name: String,
    pub kind: JudgeKind,
    pub weight: f64,
    pub status: JudgeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_rank: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_case: Option<UseCase>,
}

impl JudgeInfo {
    fn ready(judge: &Judge) -> Self {
        let profile = match judge {
            Judge::Remote(remote) => Some(remote.profile()),
            _ => None,
        };
        Self {
            name: judge.name().to_string(),
            kind: judge.kind(),
            weight: judge.weight(),
            status: JudgeStatus::Ready,
            timeout_seconds: profile.map(|p| p.timeout.as_secs_f64()),
            cost_rank: profile.map(|p| p.cost_rank),
            use_case: profile.map(|p| p.use_case),
        }
    }

    fn excluded(excluded: &ExcludedJudge) -> Self {
        let status = match &excluded.error {
            JudgeError::RemoteDisabled(reason) => JudgeStatus::Disabled(reason.clone()),
            other => JudgeStatus::Unavailable(other.to_string()),
        };
        Self {
            name: excluded.name.clone(),
            kind: excluded.kind,
            weight: excluded.weight,
            status,
            timeout_seconds: None,
            cost_rank: None,
            use_case: None,
        }
    }
}
