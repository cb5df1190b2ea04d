// Fingerprint-keyed verdict cache in front of the scoring engine.
//
// Identical requests (same normalized text, strategy and options) share one
// computation: the first caller scores, concurrent callers await the same
// cell. Failures leave the cell empty so the next caller retries. Finished
// entries are evicted oldest-first once the cache is full.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::engine::registry::JudgeInfo;
use crate::engine::strategy::Strategy;
use crate::engine::{ScoreOptions, ScoringEngine, Verdict};
use crate::error::EngineError;
use crate::normalize::normalize_text;
use crate::taxonomy::Taxonomy;

/// SHA-256 over everything that can change a verdict.
pub fn fingerprint(text: &str, strategy: Strategy, options: &ScoreOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hasher.update([0u8]);
    hasher.update(strategy.as_str().as_bytes());
    hasher.update([0u8]);
    match options.threshold {
        Some(t) => hasher.update(t.to_bits().to_be_bytes()),
        None => hasher.update(b"default"),
    }
    hasher.update([u8::from(options.include_reasoning)]);
    hex::encode(hasher.finalize())
}

#[derive(Default)]
struct Entries {
    cells: HashMap<String, Arc<OnceCell<Verdict>>>,
    // Insertion order, oldest first
    order: VecDeque<String>,
}

pub struct VerdictCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl VerdictCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.cells.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The cell for a fingerprint, created (with eviction) if missing.
    async fn cell(&self, key: &str) -> Arc<OnceCell<Verdict>> {
        let mut guard = self.entries.lock().await;
        let entries = &mut *guard;
        if let Some(cell) = entries.cells.get(key) {
            return Arc::clone(cell);
        }

        // Only finished entries are evicted. While every entry is still being
        // computed the map may run over capacity.
        while entries.cells.len() >= self.capacity {
            let cells = &entries.cells;
            let Some(position) = entries
                .order
                .iter()
                .position(|k| cells.get(k).is_some_and(|cell| cell.initialized()))
            else {
                break;
            };
            if let Some(oldest) = entries.order.remove(position) {
                entries.cells.remove(&oldest);
            }
        }

        let cell = Arc::new(OnceCell::new());
        entries.cells.insert(key.to_string(), Arc::clone(&cell));
        entries.order.push_back(key.to_string());
        cell
    }

    /// Return the cached verdict for `key`, or run `compute` once to produce it.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<Verdict, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Verdict, EngineError>>,
    {
        let cell = self.cell(key).await;
        if let Some(verdict) = cell.get() {
            debug!(fingerprint = key.get(..12).unwrap_or(key), "Verdict cache hit");
            return Ok(verdict.clone());
        }
        let result = cell.get_or_try_init(compute).await.cloned();
        if result.is_err() {
            self.forget_if_empty(key, &cell).await;
        }
        result
    }

    /// Drop a cell whose computation failed, unless someone has since filled
    /// or replaced it.
    async fn forget_if_empty(&self, key: &str, cell: &Arc<OnceCell<Verdict>>) {
        let mut entries = self.entries.lock().await;
        let stale = entries
            .cells
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            entries.cells.remove(key);
            entries.order.retain(|k| k != key);
        }
    }
}

/// A scoring engine with an optional verdict cache in front.
pub struct CachedEngine {
    engine: ScoringEngine,
    cache: Option<VerdictCache>,
}

impl CachedEngine {
    /// Wrap an engine. A capacity of 0 disables caching.
    pub fn new(engine: ScoringEngine, capacity: usize) -> Self {
        Self {
            engine,
            cache: (capacity > 0).then(|| VerdictCache::new(capacity)),
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn cache(&self) -> Option<&VerdictCache> {
        self.cache.as_ref()
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        self.engine.taxonomy()
    }

    pub fn judges(&self) -> Vec<JudgeInfo> {
        self.engine.judges()
    }

    pub async fn score(
        &self,
        text: &str,
        strategy: Strategy,
        options: &ScoreOptions,
    ) -> Result<Verdict, EngineError> {
        match &self.cache {
            Some(cache) => {
                let key = fingerprint(text, strategy, options);
                cache
                    .get_or_compute(&key, || self.engine.score(text, strategy, options))
                    .await
            }
            None => self.engine.score(text, strategy, options).await,
        }
    }
}
