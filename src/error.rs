// Error taxonomy for the scoring engine.
//
// Two layers: `JudgeError` describes why a single judge produced no verdict for
// one request (never fatal on its own), and `EngineError` is what the caller of
// `ScoringEngine::score` sees. Startup and adapter internals use anyhow and are
// folded into these types at the judge boundary.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Why a single judge did not contribute to a verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JudgeError {
    /// No credentials configured. Expected; the judge is excluded before invocation.
    #[error("disabled: {0}")]
    RemoteDisabled(String),

    /// Network, HTTP status, or response-parsing failure from a remote service.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// A local model failed to load.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The per-call timeout or the request deadline elapsed first.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A local judge failed at request time. Indicates a bug, not a business error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A judge failure as recorded in a verdict's diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgeFailure {
    pub judge: String,
    pub reason: String,
}

impl JudgeFailure {
    pub fn new(judge: impl Into<String>, error: &JudgeError) -> Self {
        Self {
            judge: judge.into(),
            reason: error.to_string(),
        }
    }
}

/// Errors surfaced by the scoring engine to its caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("text is empty or whitespace-only")]
    EmptyInput,

    #[error("unknown strategy '{0}' (expected one of: fast, cascade, balanced, accurate)")]
    InvalidStrategy(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("all {} selected judges failed", failures.len())]
    AllJudgesFailed { failures: Vec<JudgeFailure> },
}
