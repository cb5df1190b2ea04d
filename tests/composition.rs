// End-to-end tests of the scoring engine with fake backends.
//
// The embedding judge runs on a keyword-driven fake encoder and remote judges
// on scripted clients, so strategy selection, cascade exits, timeouts, caching
// and batch scoring can be checked without a model or network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;

use tonecheck::batch::score_batch;
use tonecheck::cache::CachedEngine;
use tonecheck::engine::registry::{ExcludedJudge, JudgePanel, JudgeStatus};
use tonecheck::engine::strategy::Strategy;
use tonecheck::engine::{EngineSettings, ScoreOptions, ScoringEngine};
use tonecheck::error::{EngineError, JudgeError};
use tonecheck::judges::embedding::EmbeddingJudge;
use tonecheck::judges::lexical::LexicalJudge;
use tonecheck::judges::remote::{RemoteJudge, RemoteProfile, UseCase};
use tonecheck::judges::traits::{CategoryScore, JudgeVerdict, RemoteClient, TextEncoder};
use tonecheck::judges::JudgeKind;
use tonecheck::normalize::normalize_text;
use tonecheck::taxonomy::{Category, Taxonomy};

// ============================================================
// Fakes
// ============================================================

/// One axis per category: a text points along the first category whose
/// keyword it contains, and is the zero vector otherwise.
struct FakeEncoder {
    axes: Vec<Vec<String>>,
}

impl FakeEncoder {
    fn new(taxonomy: &Taxonomy) -> Self {
        Self {
            axes: taxonomy
                .iter()
                .map(|(_, spec)| spec.keywords.iter().map(|k| normalize_text(k)).collect())
                .collect(),
        }
    }
}

#[async_trait]
impl TextEncoder for FakeEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let text = normalize_text(text);
                let mut vector = vec![0.0; self.axes.len()];
                if let Some(axis) = self
                    .axes
                    .iter()
                    .position(|keywords| keywords.iter().any(|k| text.contains(k.as_str())))
                {
                    vector[axis] = 1.0;
                }
                vector
            })
            .collect())
    }
}

enum Script {
    Verdict(f64),
    Fail,
}

struct FakeRemote {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeRemote {
    fn scoring(score: f64) -> Arc<Self> {
        Arc::new(Self {
            script: Script::Verdict(score),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn slow(score: f64, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Script::Verdict(score),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            script: Script::Fail,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn judge(&self, _text: &str) -> Result<JudgeVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.script {
            Script::Verdict(score) => Ok(JudgeVerdict::new(
                score,
                vec![CategoryScore {
                    category: Category::HateSpeech,
                    score,
                }],
                0.9,
            )),
            Script::Fail => anyhow::bail!("HTTP 503 Service Unavailable"),
        }
    }
}

// ============================================================
// Builders
// ============================================================

fn taxonomy() -> Arc<Taxonomy> {
    Arc::new(Taxonomy::builtin().unwrap())
}

fn profile(cost_rank: u8, use_case: UseCase, timeout: Duration) -> RemoteProfile {
    RemoteProfile {
        weight: 0.2,
        cost_rank,
        use_case,
        timeout,
    }
}

fn remote(name: &str, cost_rank: u8, use_case: UseCase, client: Arc<FakeRemote>) -> RemoteJudge {
    RemoteJudge::new(
        name,
        profile(cost_rank, use_case, Duration::from_secs(5)),
        client,
    )
}

async fn panel_with_embedding(taxonomy: &Arc<Taxonomy>) -> JudgePanel {
    let embedding = EmbeddingJudge::build(
        Arc::new(FakeEncoder::new(taxonomy)),
        taxonomy,
        0.5,
        0.3,
    )
    .await
    .unwrap();
    JudgePanel::new(LexicalJudge::new(Arc::clone(taxonomy), 0.2)).with_embedding(embedding)
}

fn engine(taxonomy: Arc<Taxonomy>, panel: JudgePanel) -> ScoringEngine {
    ScoringEngine::new(taxonomy, panel, EngineSettings::default())
}

async fn local_engine() -> ScoringEngine {
    let taxonomy = taxonomy();
    let panel = panel_with_embedding(&taxonomy).await;
    engine(taxonomy, panel)
}

fn options() -> ScoreOptions {
    ScoreOptions::default()
}

// ============================================================
// Strategy selection
// ============================================================

#[tokio::test]
async fn cascade_stops_after_lexical_for_clean_text() {
    let engine = local_engine().await;
    let verdict = engine.score("こんにちは", Strategy::Cascade, &options()).await.unwrap();
    assert_eq!(verdict.judges_used, vec!["lexical"]);
    assert!(!verdict.is_toxic);
}

#[tokio::test]
async fn cascade_does_not_escalate_at_exactly_the_threshold() {
    // lexical scores バカ at exactly 0.2
    let engine = local_engine().await;
    let verdict = engine.score("バカ", Strategy::Cascade, &options()).await.unwrap();
    assert_eq!(verdict.judges_used, vec!["lexical"]);
}

#[tokio::test]
async fn cascade_escalates_to_embedding_above_the_threshold() {
    let engine = local_engine().await;
    let verdict = engine.score("死ね", Strategy::Cascade, &options()).await.unwrap();
    assert_eq!(verdict.judges_used, vec!["lexical", "embedding"]);
    assert!(verdict.is_toxic);
    assert_eq!(verdict.primary_category, Some(Category::SevereToxicity));
}

#[tokio::test]
async fn fast_flags_severe_keyword() {
    let engine = local_engine().await;
    let verdict = engine.score("死ね", Strategy::Fast, &options()).await.unwrap();
    assert_eq!(verdict.judges_used, vec!["lexical"]);
    assert!(verdict.is_toxic);
    assert!(verdict.toxicity_score >= 0.8);
    assert_eq!(verdict.confidence, 1.0);
    assert_eq!(verdict.primary_category, Some(Category::SevereToxicity));
    assert_eq!(verdict.strategy, Strategy::Fast);
}

#[tokio::test]
async fn fast_passes_clean_greeting() {
    let engine = local_engine().await;
    let verdict = engine.score("こんにちは", Strategy::Fast, &options()).await.unwrap();
    assert!(!verdict.is_toxic);
    assert_eq!(verdict.toxicity_score, 0.0);
    assert_eq!(verdict.confidence, 0.9);
    assert!(verdict.categories.is_empty());
    assert_eq!(verdict.primary_category, None);
    assert_eq!(verdict.judges_used, vec!["lexical"]);
    assert!(verdict.per_judge_seconds.contains_key("lexical"));
}

#[tokio::test]
async fn balanced_adds_only_the_cheapest_remote() {
    let taxonomy = taxonomy();
    let perspective = FakeRemote::scoring(0.5);
    let openai = FakeRemote::scoring(0.5);
    let panel = panel_with_embedding(&taxonomy)
        .await
        .with_remote(remote("openai", 1, UseCase::Contextual, Arc::clone(&openai)))
        .with_remote(remote("perspective", 0, UseCase::Screening, Arc::clone(&perspective)));
    let engine = engine(taxonomy, panel);

    let verdict = engine.score("バカ", Strategy::Balanced, &options()).await.unwrap();
    assert_eq!(verdict.judges_used, vec!["lexical", "embedding", "perspective"]);
    assert_eq!(perspective.calls(), 1);
    assert_eq!(openai.calls(), 0);
}

#[tokio::test]
async fn balanced_breaks_cost_ties_toward_screening() {
    let taxonomy = taxonomy();
    let panel = panel_with_embedding(&taxonomy)
        .await
        .with_remote(remote("claude", 1, UseCase::Contextual, FakeRemote::scoring(0.5)))
        .with_remote(remote("perspective", 1, UseCase::Screening, FakeRemote::scoring(0.5)));
    let engine = engine(taxonomy, panel);

    let verdict = engine.score("バカ", Strategy::Balanced, &options()).await.unwrap();
    assert_eq!(verdict.judges_used.last().map(String::as_str), Some("perspective"));
}

#[tokio::test]
async fn accurate_runs_every_enabled_judge() {
    let taxonomy = taxonomy();
    let panel = panel_with_embedding(&taxonomy)
        .await
        .with_remote(remote("perspective", 0, UseCase::Screening, FakeRemote::scoring(0.6)))
        .with_remote(remote("openai", 1, UseCase::Contextual, FakeRemote::scoring(0.7)))
        .with_remote(remote("claude", 2, UseCase::Contextual, FakeRemote::scoring(0.8)));
    let engine = engine(taxonomy, panel);

    let verdict = engine.score("バカ", Strategy::Accurate, &options()).await.unwrap();
    assert_eq!(
        verdict.judges_used,
        vec!["lexical", "embedding", "perspective", "openai", "claude"]
    );
    assert_eq!(verdict.per_judge_scores.len(), 5);
    assert!(verdict.failures.is_empty());
}

// ============================================================
// Partial failure
// ============================================================

#[tokio::test]
async fn slow_remote_times_out_without_failing_the_request() {
    let taxonomy = taxonomy();
    let slow = RemoteJudge::new(
        "openai",
        profile(1, UseCase::Contextual, Duration::from_millis(50)),
        FakeRemote::slow(0.9, Duration::from_secs(2)),
    );
    let panel = panel_with_embedding(&taxonomy).await.with_remote(slow);
    let engine = engine(taxonomy, panel);

    let verdict = engine.score("死ね", Strategy::Accurate, &options()).await.unwrap();
    assert_eq!(verdict.judges_used, vec!["lexical", "embedding"]);
    assert_eq!(verdict.failures.len(), 1);
    assert_eq!(verdict.failures[0].judge, "openai");
    assert_eq!(
        verdict.failures[0].reason,
        JudgeError::Timeout(Duration::from_millis(50)).to_string()
    );
    // timed-out judges are still timed
    assert!(verdict.per_judge_seconds["openai"] >= 0.05);
    assert_eq!(verdict.per_judge_seconds.len(), 3);
}

#[tokio::test]
async fn failing_remote_is_reported_as_unavailable() {
    let taxonomy = taxonomy();
    let panel = panel_with_embedding(&taxonomy)
        .await
        .with_remote(remote("perspective", 0, UseCase::Screening, FakeRemote::failing()));
    let engine = engine(taxonomy, panel);

    let verdict = engine.score("バカ", Strategy::Balanced, &options()).await.unwrap();
    assert!(!verdict.judges_used.contains(&"perspective".to_string()));
    assert_eq!(verdict.failures.len(), 1);
    assert!(
        verdict.failures[0].reason.starts_with("remote unavailable"),
        "{}",
        verdict.failures[0].reason
    );
}

#[tokio::test]
async fn request_deadline_cuts_off_slow_judges() {
    let taxonomy = taxonomy();
    let panel = panel_with_embedding(&taxonomy)
        .await
        .with_remote(remote(
            "claude",
            2,
            UseCase::Contextual,
            FakeRemote::slow(0.9, Duration::from_secs(3)),
        ));
    let settings = EngineSettings {
        deadline: Duration::from_millis(100),
        ..EngineSettings::default()
    };
    let engine = ScoringEngine::new(taxonomy, panel, settings);

    let verdict = engine.score("死ね", Strategy::Accurate, &options()).await.unwrap();
    assert_eq!(verdict.judges_used, vec!["lexical", "embedding"]);
    assert_eq!(
        verdict.failures[0].reason,
        JudgeError::Timeout(Duration::from_millis(100)).to_string()
    );
    assert!(verdict.processing_time_seconds < 1.0);
    assert!(verdict.per_judge_seconds["claude"] < 1.0);
}

#[tokio::test]
async fn unrepresentable_deadline_means_no_deadline() {
    let taxonomy = taxonomy();
    let panel = panel_with_embedding(&taxonomy).await;
    let settings = EngineSettings {
        deadline: Duration::MAX,
        ..EngineSettings::default()
    };
    let engine = ScoringEngine::new(taxonomy, panel, settings);

    let verdict = engine.score("死ね", Strategy::Cascade, &options()).await.unwrap();
    assert_eq!(verdict.judges_used, vec!["lexical", "embedding"]);
}

#[tokio::test]
async fn disabled_remote_is_never_invoked_but_is_listed() {
    let taxonomy = taxonomy();
    let panel = panel_with_embedding(&taxonomy)
        .await
        .with_remote(remote("perspective", 0, UseCase::Screening, FakeRemote::scoring(0.4)))
        .with_excluded(ExcludedJudge {
            name: "claude".to_string(),
            kind: JudgeKind::Remote,
            weight: 0.2,
            error: JudgeError::RemoteDisabled("ANTHROPIC_API_KEY not set".to_string()),
        });
    let engine = engine(taxonomy, panel);

    let verdict = engine.score("バカ", Strategy::Accurate, &options()).await.unwrap();
    assert!(!verdict.judges_used.contains(&"claude".to_string()));
    assert!(verdict.failures.iter().all(|f| f.judge != "claude"));

    let claude = engine
        .judges()
        .into_iter()
        .find(|info| info.name == "claude")
        .unwrap();
    assert_eq!(
        claude.status,
        JudgeStatus::Disabled("ANTHROPIC_API_KEY not set".to_string())
    );
}

#[tokio::test]
async fn lone_survivor_score_passes_through() {
    // embedding missing, both remotes fail: lexical's score is the verdict
    let taxonomy = taxonomy();
    let lexical_only = JudgePanel::new(LexicalJudge::new(Arc::clone(&taxonomy), 0.2))
        .with_remote(remote("perspective", 0, UseCase::Screening, FakeRemote::failing()))
        .with_remote(remote("openai", 1, UseCase::Contextual, FakeRemote::failing()));
    let engine = engine(taxonomy, lexical_only);

    let verdict = engine.score("死ね", Strategy::Accurate, &options()).await.unwrap();
    assert_eq!(verdict.toxicity_score, 0.8);
    assert_eq!(verdict.failures.len(), 2);
}

// ============================================================
// Request errors
// ============================================================

#[tokio::test]
async fn whitespace_only_text_is_rejected() {
    let engine = local_engine().await;
    for text in ["", "   ", "\u{3000}\u{3000}", "\n\t"] {
        let err = engine.score(text, Strategy::Fast, &options()).await.unwrap_err();
        assert_eq!(err, EngineError::EmptyInput, "text {text:?}");
    }
}

#[tokio::test]
async fn unknown_strategy_name_is_rejected() {
    let engine = local_engine().await;
    let err = engine
        .score_named("バカ", "thorough", &options())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::InvalidStrategy("thorough".to_string()));

    let ok = engine.score_named("バカ", " FAST ", &options()).await.unwrap();
    assert_eq!(ok.strategy, Strategy::Fast);
}

#[tokio::test]
async fn out_of_range_threshold_is_rejected() {
    let engine = local_engine().await;
    let options = ScoreOptions {
        threshold: Some(1.5),
        ..ScoreOptions::default()
    };
    let err = engine.score("バカ", Strategy::Fast, &options).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidOption(_)));
}

#[tokio::test]
async fn per_request_threshold_changes_the_toxic_flag() {
    let engine = local_engine().await;
    let strict = ScoreOptions {
        threshold: Some(0.1),
        ..ScoreOptions::default()
    };
    let lenient = engine.score("バカ", Strategy::Fast, &options()).await.unwrap();
    let flagged = engine.score("バカ", Strategy::Fast, &strict).await.unwrap();
    assert!(!lenient.is_toxic);
    assert!(flagged.is_toxic);
}

#[tokio::test]
async fn required_embedding_missing_fails_non_fast_strategies() {
    let taxonomy = taxonomy();
    let panel = JudgePanel::new(LexicalJudge::new(Arc::clone(&taxonomy), 0.2));
    let settings = EngineSettings {
        require_embedding: true,
        ..EngineSettings::default()
    };
    let engine = ScoringEngine::new(taxonomy, panel, settings);

    let err = engine.score("バカ", Strategy::Cascade, &options()).await.unwrap_err();
    assert!(matches!(err, EngineError::ModelUnavailable(_)));

    let fast = engine.score("バカ", Strategy::Fast, &options()).await;
    assert!(fast.is_ok());
}

#[tokio::test]
async fn missing_embedding_is_skipped_when_not_required() {
    let taxonomy = taxonomy();
    let panel = JudgePanel::new(LexicalJudge::new(Arc::clone(&taxonomy), 0.2));
    let engine = engine(taxonomy, panel);

    let verdict = engine.score("死ね", Strategy::Cascade, &options()).await.unwrap();
    assert_eq!(verdict.judges_used, vec!["lexical"]);
}

// ============================================================
// Determinism, caching and batches
// ============================================================

#[tokio::test]
async fn repeated_scoring_is_deterministic() {
    let engine = local_engine().await;
    let first = engine.score("死ね バカ", Strategy::Cascade, &options()).await.unwrap();
    let second = engine.score("死ね バカ", Strategy::Cascade, &options()).await.unwrap();
    assert_eq!(first.toxicity_score, second.toxicity_score);
    assert_eq!(first.categories, second.categories);
    assert_eq!(first.judges_used, second.judges_used);
    assert_eq!(first.confidence, second.confidence);
}

#[tokio::test]
async fn concurrent_identical_requests_share_one_computation() {
    let taxonomy = taxonomy();
    let client = FakeRemote::slow(0.6, Duration::from_millis(50));
    let panel = panel_with_embedding(&taxonomy)
        .await
        .with_remote(remote("perspective", 0, UseCase::Screening, Arc::clone(&client)));
    let scorer = CachedEngine::new(engine(taxonomy, panel), 16);

    let options = options();
    let results = join_all((0..8).map(|_| scorer.score("バカ", Strategy::Balanced, &options))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(client.calls(), 1);

    // Same normalized text hits the cache too
    scorer.score("  バカ ", Strategy::Balanced, &options).await.unwrap();
    assert_eq!(client.calls(), 1);
    assert_eq!(scorer.cache().unwrap().len().await, 1);
}

#[tokio::test]
async fn full_cache_keeps_computations_still_in_flight() {
    let taxonomy = taxonomy();
    let client = FakeRemote::slow(0.6, Duration::from_millis(50));
    let panel = panel_with_embedding(&taxonomy)
        .await
        .with_remote(remote("perspective", 0, UseCase::Screening, Arc::clone(&client)));
    let scorer = CachedEngine::new(engine(taxonomy, panel), 1);

    let texts: Vec<String> = ["死ね", "バカ", "死ね"].into_iter().map(str::to_string).collect();
    let report = score_batch(&scorer, &texts, Strategy::Balanced, &options(), 3, None).await;

    assert_eq!(report.error_count(), 0);
    // one call for 死ね, one for バカ
    assert_eq!(client.calls(), 2);
    assert_eq!(report.results[0], report.results[2]);
}

#[tokio::test]
async fn zero_capacity_disables_the_cache() {
    let taxonomy = taxonomy();
    let client = FakeRemote::scoring(0.6);
    let panel = panel_with_embedding(&taxonomy)
        .await
        .with_remote(remote("perspective", 0, UseCase::Screening, Arc::clone(&client)));
    let scorer = CachedEngine::new(engine(taxonomy, panel), 0);

    scorer.score("バカ", Strategy::Balanced, &options()).await.unwrap();
    scorer.score("バカ", Strategy::Balanced, &options()).await.unwrap();
    assert!(scorer.cache().is_none());
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn batch_keeps_input_order_and_isolates_errors() {
    let scorer = CachedEngine::new(local_engine().await, 16);
    let texts: Vec<String> = ["死ね", "   ", "こんにちは", "バカ"]
        .into_iter()
        .map(str::to_string)
        .collect();

    let report = score_batch(&scorer, &texts, Strategy::Fast, &options(), 2, None).await;

    assert_eq!(report.results.len(), 4);
    assert!(report.results[0].as_ref().unwrap().is_toxic);
    assert_eq!(report.results[1], Err(EngineError::EmptyInput));
    assert!(!report.results[2].as_ref().unwrap().is_toxic);
    assert_eq!(report.results[3].as_ref().unwrap().toxicity_score, 0.2);
    assert_eq!(report.toxic_count(), 1);
    assert_eq!(report.error_count(), 1);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"][1]["error"], EngineError::EmptyInput.to_string());
    assert_eq!(json["results"][0]["isToxic"], true);
}
