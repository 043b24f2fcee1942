//! End-to-end recommendation pipeline.
//!
//! ```text
//! raw query ─► resolve ─► truncate ─► embed ─► search(top_k) ─► rerank
//! ```
//!
//! The index sits behind an [`IndexHandle`]; a rebuilt index is installed
//! with [`Recommender::install`] while requests keep running against the
//! snapshot they started with.

pub mod query;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::RENDER_VERSION;
use crate::config::Config;
use crate::error::{ArError, Result};
use crate::rerank::{Recommendation, RerankOutcome, Reranker};
use crate::search::{build_embedder, CatalogIndex, Embedder, IndexHandle, SearchHit};

pub use query::{QueryResolver, ResolvedQuery};

/// Readiness snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub ready: bool,
    pub records: usize,
    pub render_version: u32,
    pub index_render_version: Option<u32>,
    pub embedder: String,
    pub dims: usize,
    pub generator: String,
    pub fingerprint: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
}

/// Full trace of one request, for `recommend --explain-intent`.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendReport {
    pub query: String,
    pub source_url: Option<String>,
    pub retrieved: Vec<SearchHit>,
    #[serde(flatten)]
    pub outcome: RerankOutcome,
    pub elapsed_ms: u64,
}

pub struct Recommender {
    handle: IndexHandle,
    embedder: Box<dyn Embedder>,
    reranker: Reranker,
    resolver: QueryResolver,
    top_k: usize,
    memo: Option<Mutex<LruCache<String, Arc<Vec<Recommendation>>>>>,
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("embedder", &self.embedder.name())
            .field("reranker", &self.reranker)
            .field("top_k", &self.top_k)
            .field("loaded", &self.handle.is_loaded())
            .finish_non_exhaustive()
    }
}

impl Recommender {
    #[must_use]
    pub fn new(
        embedder: Box<dyn Embedder>,
        reranker: Reranker,
        resolver: QueryResolver,
        top_k: usize,
        cache_size: usize,
    ) -> Self {
        Self {
            handle: IndexHandle::new(),
            embedder,
            reranker,
            resolver,
            top_k,
            memo: NonZeroUsize::new(cache_size).map(|size| Mutex::new(LruCache::new(size))),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            build_embedder(&config.embedding)?,
            Reranker::from_config(config)?,
            QueryResolver::from_config(&config.query)?,
            config.retrieval.top_k as usize,
            config.rerank.cache_size as usize,
        ))
    }

    #[must_use]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    #[must_use]
    pub const fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    /// Install `index` after checking it was built with a compatible
    /// renderer and embedder. In-flight requests finish on the old index.
    pub fn install(&self, index: CatalogIndex) -> Result<()> {
        index.check_compatible(self.embedder.as_ref())?;
        let records = index.len();
        if self.handle.swap(index).is_some() {
            info!(records, "replaced catalog index");
        } else {
            info!(records, "installed catalog index");
        }
        if let Some(memo) = &self.memo {
            memo.lock().clear();
        }
        Ok(())
    }

    /// Recommendations for `raw_query`. Exact repeats are served from the
    /// memo when enabled.
    pub fn recommend(&self, raw_query: &str) -> Result<Vec<Recommendation>> {
        let key = memo_key(raw_query);
        if let Some(memo) = &self.memo {
            if let Some(hit) = memo.lock().get(&key) {
                debug!("memo hit");
                return Ok(hit.as_ref().clone());
            }
        }

        let recommendations = self.recommend_detailed(raw_query)?.outcome.recommendations;

        if let Some(memo) = &self.memo {
            memo.lock().put(key, Arc::new(recommendations.clone()));
        }
        Ok(recommendations)
    }

    pub fn recommend_detailed(&self, raw_query: &str) -> Result<RecommendReport> {
        let started = Instant::now();
        let resolved = self.resolver.resolve(raw_query)?;
        let index = self.handle.current()?;

        let text = self.embedder.truncate(&resolved.text);
        let vector = self.embedder.embed(&text)?;
        let hits = index.search(&vector, self.top_k)?;
        debug!(hits = hits.len(), top_k = self.top_k, "retrieved candidates");

        let candidates = hits
            .iter()
            .map(|hit| {
                index.get(&hit.record_id).cloned().ok_or_else(|| {
                    ArError::IndexCorrupted(format!("hit '{}' has no record", hit.record_id))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let outcome = self.reranker.rerank_detailed(&resolved.text, &candidates)?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            retrieved = hits.len(),
            results = outcome.recommendations.len(),
            elapsed_ms,
            "recommendation complete"
        );

        Ok(RecommendReport {
            query: resolved.text,
            source_url: resolved.source_url,
            retrieved: hits,
            outcome,
            elapsed_ms,
        })
    }

    #[must_use]
    pub fn health(&self) -> Health {
        let index = self.handle.current().ok();
        let metadata = index.as_ref().map(|index| index.metadata());
        Health {
            ready: index.is_some(),
            records: index.as_ref().map_or(0, |index| index.len()),
            render_version: RENDER_VERSION,
            index_render_version: metadata.map(|meta| meta.render_version),
            embedder: self.embedder.name().to_string(),
            dims: self.embedder.dims(),
            generator: self.reranker.generator_name().to_string(),
            fingerprint: metadata.map(|meta| meta.fingerprint.clone()),
            built_at: metadata.map(|meta| meta.built_at),
        }
    }
}

/// Case- and whitespace-insensitive memo key.
fn memo_key(raw_query: &str) -> String {
    raw_query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
