// Remote judge wrapper: timeout, failure mapping, and selection metadata
// around a RemoteClient.
//
// The concrete clients (perspective, openai, claude) only know how to talk to
// their service. Everything the engine needs to reason about them (weight,
// cost, use case, how long to wait) lives here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::traits::{JudgeVerdict, RemoteClient};
use crate::error::JudgeError;

/// What a remote judge is good at; the strategy selector uses it to break
/// cost ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    /// Fast attribute-based moderation scoring
    Screening,
    /// LLM judgment that reads context and nuance
    Contextual,
}

impl UseCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            UseCase::Screening => "screening",
            UseCase::Contextual => "contextual",
        }
    }
}

/// Static selection and fusion metadata for a remote judge.
#[derive(Debug, Clone)]
pub struct RemoteProfile {
    pub weight: f64,
    /// Lower is cheaper. The balanced strategy picks the cheapest enabled judge.
    pub cost_rank: u8,
    pub use_case: UseCase,
    /// Per-call timeout, independent of the request deadline
    pub timeout: Duration,
}

pub struct RemoteJudge {
    name: String,
    profile: RemoteProfile,
    client: Arc<dyn RemoteClient>,
}

impl RemoteJudge {
    pub fn new(name: impl Into<String>, profile: RemoteProfile, client: Arc<dyn RemoteClient>) -> Self {
        Self {
            name: name.into(),
            profile,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &RemoteProfile {
        &self.profile
    }

    /// Call the service, bounded by the per-call timeout.
    pub async fn evaluate(&self, text: &str) -> Result<JudgeVerdict, JudgeError> {
        match tokio::time::timeout(self.profile.timeout, self.client.judge(text)).await {
            Ok(Ok(verdict)) => Ok(verdict),
            Ok(Err(e)) => {
                warn!(judge = %self.name, error = %e, "Remote judge failed");
                Err(JudgeError::RemoteUnavailable(format!("{e:#}")))
            }
            Err(_) => {
                warn!(judge = %self.name, timeout = ?self.profile.timeout, "Remote judge timed out");
                Err(JudgeError::Timeout(self.profile.timeout))
            }
        }
    }
}

/// Return the configured credential, or `RemoteDisabled` if it is blank.
pub fn require_credential(env_var: &str, value: &str) -> Result<String, JudgeError> {
    let value = value.trim();
    if value.is_empty() {
        Err(JudgeError::RemoteDisabled(format!("{env_var} not set")))
    } else {
        Ok(value.to_string())
    }
}

/// Check the HTTP status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    service: &str,
) -> anyhow::Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{} returned {}: {}", service, status, body);
    }
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse {service} response"))
}
