use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::judges::download::default_model_dir;
use crate::taxonomy::Taxonomy;

/// Static fusion weight per judge.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeWeights {
    pub lexical: f64,
    pub embedding: f64,
    pub perspective: f64,
    pub openai: f64,
    pub claude: f64,
}

impl Default for JudgeWeights {
    fn default() -> Self {
        Self {
            lexical: 0.2,
            embedding: 0.3,
            perspective: 0.15,
            openai: 0.15,
            claude: 0.2,
        }
    }
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Category/keyword document override (TONECHECK_KEYWORDS); built-in when unset
    pub keywords_path: Option<PathBuf>,
    /// Directory containing the embedding model files
    pub model_dir: PathBuf,
    pub toxic_threshold: f64,
    /// Lexical score the cascade must exceed before escalating
    pub cascade_threshold: f64,
    /// Minimum cosine similarity for the embedding judge to report a category
    pub similarity_threshold: f64,
    /// Request-level deadline across all judges
    pub deadline: Duration,
    /// Per-call timeout for each remote judge
    pub remote_timeout: Duration,
    /// Fail embedding strategies instead of degrading when the model is missing
    pub require_embedding: bool,
    pub batch_concurrency: usize,
    /// Verdict cache entries; 0 disables the cache
    pub cache_capacity: usize,
    pub weights: JudgeWeights,
    pub perspective_api_key: String,
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub openai_model: String,
    pub claude_model: String,
    pub perspective_languages: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keywords_path: None,
            model_dir: default_model_dir(),
            toxic_threshold: 0.3,
            cascade_threshold: 0.2,
            similarity_threshold: 0.5,
            deadline: Duration::from_secs(10),
            remote_timeout: Duration::from_secs(5),
            require_embedding: false,
            batch_concurrency: 8,
            cache_capacity: 100,
            weights: JudgeWeights::default(),
            perspective_api_key: String::new(),
            openai_api_key: String::new(),
            anthropic_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            claude_model: "claude-3-haiku-20240307".to_string(),
            perspective_languages: vec!["ja".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every knob has a default. Unset API keys disable the matching remote
    /// judge; malformed values are a startup error.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment, in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            keywords_path: get("TONECHECK_KEYWORDS").map(PathBuf::from),
            model_dir: get("TONECHECK_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            toxic_threshold: parse_or(&get, "TONECHECK_TOXIC_THRESHOLD", defaults.toxic_threshold)?,
            cascade_threshold: parse_or(
                &get,
                "TONECHECK_CASCADE_THRESHOLD",
                defaults.cascade_threshold,
            )?,
            similarity_threshold: parse_or(
                &get,
                "TONECHECK_SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            )?,
            deadline: parse_secs(&get, "TONECHECK_DEADLINE_SECS", defaults.deadline)?,
            remote_timeout: parse_secs(
                &get,
                "TONECHECK_REMOTE_TIMEOUT_SECS",
                defaults.remote_timeout,
            )?,
            require_embedding: parse_bool(&get, "TONECHECK_REQUIRE_EMBEDDING")?
                .unwrap_or(defaults.require_embedding),
            batch_concurrency: parse_or(
                &get,
                "TONECHECK_BATCH_CONCURRENCY",
                defaults.batch_concurrency,
            )?,
            cache_capacity: parse_or(&get, "TONECHECK_CACHE_CAPACITY", defaults.cache_capacity)?,
            weights: JudgeWeights {
                lexical: parse_or(&get, "TONECHECK_WEIGHT_LEXICAL", defaults.weights.lexical)?,
                embedding: parse_or(&get, "TONECHECK_WEIGHT_EMBEDDING", defaults.weights.embedding)?,
                perspective: parse_or(
                    &get,
                    "TONECHECK_WEIGHT_PERSPECTIVE",
                    defaults.weights.perspective,
                )?,
                openai: parse_or(&get, "TONECHECK_WEIGHT_OPENAI", defaults.weights.openai)?,
                claude: parse_or(&get, "TONECHECK_WEIGHT_CLAUDE", defaults.weights.claude)?,
            },
            perspective_api_key: get("PERSPECTIVE_API_KEY").unwrap_or_default(),
            openai_api_key: get("OPENAI_API_KEY").unwrap_or_default(),
            anthropic_api_key: get("ANTHROPIC_API_KEY").unwrap_or_default(),
            openai_model: get("TONECHECK_OPENAI_MODEL").unwrap_or(defaults.openai_model),
            claude_model: get("TONECHECK_CLAUDE_MODEL").unwrap_or(defaults.claude_model),
            perspective_languages: get("TONECHECK_PERSPECTIVE_LANGUAGES")
                .map(|v| {
                    v.split(',')
                        .map(|lang| lang.trim().to_string())
                        .filter(|lang| !lang.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.perspective_languages),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine can't work with.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("TONECHECK_TOXIC_THRESHOLD", self.toxic_threshold),
            ("TONECHECK_CASCADE_THRESHOLD", self.cascade_threshold),
            ("TONECHECK_SIMILARITY_THRESHOLD", self.similarity_threshold),
            ("TONECHECK_WEIGHT_LEXICAL", self.weights.lexical),
            ("TONECHECK_WEIGHT_EMBEDDING", self.weights.embedding),
            ("TONECHECK_WEIGHT_PERSPECTIVE", self.weights.perspective),
            ("TONECHECK_WEIGHT_OPENAI", self.weights.openai),
            ("TONECHECK_WEIGHT_CLAUDE", self.weights.claude),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{name} must be between 0.0 and 1.0, got {value}");
            }
        }
        if self.deadline.is_zero() {
            anyhow::bail!("TONECHECK_DEADLINE_SECS must be greater than zero");
        }
        if self.remote_timeout.is_zero() {
            anyhow::bail!("TONECHECK_REMOTE_TIMEOUT_SECS must be greater than zero");
        }
        if self.batch_concurrency == 0 {
            anyhow::bail!("TONECHECK_BATCH_CONCURRENCY must be at least 1");
        }
        if self.perspective_languages.is_empty() {
            anyhow::bail!("TONECHECK_PERSPECTIVE_LANGUAGES must name at least one language");
        }
        Ok(())
    }

    /// Load the category taxonomy: the override file if configured, else the built-in one.
    pub fn load_taxonomy(&self) -> Result<Taxonomy> {
        match &self.keywords_path {
            Some(path) => Taxonomy::from_path(path),
            None => Taxonomy::builtin(),
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}

fn parse_secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    let secs: f64 = parse_or(get, key, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("Invalid value for {key}: '{secs}' (expected seconds)"))
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => anyhow::bail!("Invalid value for {key}: '{raw}' (expected true or false)"),
    }
}
