// Batch scoring: many texts, bounded concurrency, one result per text.
//
// A failed text never fails the batch. Results come back in input order so
// callers can zip them with their inputs.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::ser::Serializer;
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

use crate::cache::CachedEngine;
use crate::engine::strategy::Strategy;
use crate::engine::{ScoreOptions, Verdict};
use crate::error::EngineError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub strategy: Strategy,
    #[serde(serialize_with = "serialize_results")]
    pub results: Vec<Result<Verdict, EngineError>>,
    pub total_seconds: f64,
    pub average_seconds: f64,
    pub generated_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn toxic_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, Ok(v) if v.is_toxic))
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }
}

/// Score `texts` with at most `concurrency` requests in flight.
pub async fn score_batch(
    scorer: &CachedEngine,
    texts: &[String],
    strategy: Strategy,
    options: &ScoreOptions,
    concurrency: usize,
    progress: Option<&ProgressBar>,
) -> BatchReport {
    let started = Instant::now();

    let results: Vec<Result<Verdict, EngineError>> = stream::iter(
        texts
            .iter()
            .map(|text| scorer.score(text, strategy, options)),
    )
    .buffered(concurrency.max(1))
    .inspect(|_| {
        if let Some(pb) = progress {
            pb.inc(1);
        }
    })
    .collect()
    .await;

    let total_seconds = started.elapsed().as_secs_f64();
    let average_seconds = if texts.is_empty() {
        0.0
    } else {
        total_seconds / texts.len() as f64
    };

    let report = BatchReport {
        strategy,
        results,
        total_seconds,
        average_seconds,
        generated_at: Utc::now(),
    };

    info!(
        texts = texts.len(),
        toxic = report.toxic_count(),
        errors = report.error_count(),
        total_seconds,
        "Batch scored"
    );

    report
}

#[derive(Serialize)]
#[serde(untagged)]
enum ResultView<'a> {
    Verdict(&'a Verdict),
    Error { error: String },
}

fn serialize_results<S: Serializer>(
    results: &[Result<Verdict, EngineError>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(results.iter().map(|result| match result {
        Ok(verdict) => ResultView::Verdict(verdict),
        Err(e) => ResultView::Error {
            error: e.to_string(),
        },
    }))
}
