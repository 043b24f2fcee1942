//! In-memory catalog index with exact L2 nearest-neighbor search.
//!
//! Records keep their catalog insertion order; search ties resolve to the
//! earlier record. The index is immutable once built. [`IndexHandle`] lets
//! a serving process swap in a rebuilt index without readers ever seeing a
//! partial one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{self, CatalogRecord, RENDER_VERSION};
use crate::error::{ArError, Result};
use crate::search::embeddings::{l2_distance, Embedder};

/// Provenance of an index: what rendering and embedder produced its vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub render_version: u32,
    pub embedder: String,
    pub dims: usize,
    pub records: usize,
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record_id: String,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct CatalogIndex {
    records: Vec<CatalogRecord>,
    vectors: Vec<Vec<f32>>,
    positions: HashMap<String, usize>,
    metadata: IndexMetadata,
}

impl CatalogIndex {
    /// Embed every record's canonical rendering.
    ///
    /// Fails with [`ArError::IndexBuild`] naming the first record that cannot
    /// be canonicalized or embedded. Renderings over the embedder's token
    /// limit are clipped before embedding.
    pub fn build(records: Vec<CatalogRecord>, embedder: &dyn Embedder) -> Result<Self> {
        let mut positions = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            record.validate().map_err(|reason| ArError::IndexBuild {
                record: record_label(record, position),
                reason,
            })?;
            if positions.insert(record.id.clone(), position).is_some() {
                return Err(ArError::IndexBuild {
                    record: record.id.clone(),
                    reason: "duplicate id".to_string(),
                });
            }
        }

        let vectors = records
            .par_iter()
            .enumerate()
            .map(|(position, record)| {
                let rendered = catalog::render(record);
                let clipped = embedder.truncate(&rendered);
                embedder.embed(&clipped).map_err(|err| ArError::IndexBuild {
                    record: record_label(record, position),
                    reason: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if records.is_empty() {
            warn!("building an index from an empty catalog");
        }

        let metadata = IndexMetadata {
            render_version: RENDER_VERSION,
            embedder: embedder.name().to_string(),
            dims: embedder.dims(),
            records: records.len(),
            fingerprint: catalog::fingerprint(&records),
            built_at: Utc::now(),
        };
        info!(
            records = metadata.records,
            embedder = %metadata.embedder,
            dims = metadata.dims,
            "built catalog index"
        );

        Ok(Self {
            records,
            vectors,
            positions,
            metadata,
        })
    }

    /// Reassemble an index from persisted parts, checking they agree.
    pub fn from_parts(
        records: Vec<CatalogRecord>,
        vectors: Vec<Vec<f32>>,
        metadata: IndexMetadata,
    ) -> Result<Self> {
        if records.len() != vectors.len() || records.len() != metadata.records {
            return Err(ArError::IndexCorrupted(format!(
                "{} records, {} vectors, metadata says {}",
                records.len(),
                vectors.len(),
                metadata.records
            )));
        }
        if let Some(bad) = vectors.iter().position(|v| v.len() != metadata.dims) {
            return Err(ArError::IndexCorrupted(format!(
                "vector for '{}' has {} dims, expected {}",
                records[bad].id,
                vectors[bad].len(),
                metadata.dims
            )));
        }

        let mut positions = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if positions.insert(record.id.clone(), position).is_some() {
                return Err(ArError::IndexCorrupted(format!(
                    "duplicate id '{}'",
                    record.id
                )));
            }
        }

        Ok(Self {
            records,
            vectors,
            positions,
            metadata,
        })
    }

    /// Confirm this index was produced by the running rendering and embedder.
    pub fn check_compatible(&self, embedder: &dyn Embedder) -> Result<()> {
        let expected = format!(
            "render v{} / {} x{}",
            RENDER_VERSION,
            embedder.name(),
            embedder.dims()
        );
        let found = format!(
            "render v{} / {} x{}",
            self.metadata.render_version, self.metadata.embedder, self.metadata.dims
        );
        if expected != found {
            return Err(ArError::IndexVersionMismatch { expected, found });
        }
        Ok(())
    }

    /// The `k` nearest records by ascending L2 distance.
    ///
    /// Returns `min(k, len)` hits. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.metadata.dims {
            return Err(ArError::Embedding(format!(
                "query vector has {} dims, index has {}",
                query.len(),
                self.metadata.dims
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, l2_distance(query, vector)))
            .collect();

        // sort_by is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        debug!(k, hits = scored.len(), "index search");
        Ok(scored
            .into_iter()
            .map(|(position, distance)| SearchHit {
                record_id: self.records[position].id.clone(),
                distance,
            })
            .collect())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CatalogRecord> {
        self.positions.get(id).map(|&position| &self.records[position])
    }

    #[must_use]
    pub fn vector(&self, id: &str) -> Option<&[f32]> {
        self.positions
            .get(id)
            .map(|&position| self.vectors[position].as_slice())
    }

    #[must_use]
    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    #[must_use]
    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    #[must_use]
    pub const fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn record_label(record: &CatalogRecord, position: usize) -> String {
    if record.id.trim().is_empty() {
        format!("#{}", position + 1)
    } else {
        record.id.clone()
    }
}

/// Shared, swappable slot holding the serving index.
///
/// Readers take a cheap `Arc` clone and never hold the lock while working.
#[derive(Debug, Default)]
pub struct IndexHandle {
    slot: RwLock<Option<Arc<CatalogIndex>>>,
}

impl IndexHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_index(index: CatalogIndex) -> Self {
        Self {
            slot: RwLock::new(Some(Arc::new(index))),
        }
    }

    /// Current index, or [`ArError::IndexNotLoaded`].
    pub fn current(&self) -> Result<Arc<CatalogIndex>> {
        self.slot.read().clone().ok_or_else(|| {
            ArError::IndexNotLoaded("no catalog index has been loaded".to_string())
        })
    }

    /// Install a new index, returning the one it replaced.
    pub fn swap(&self, index: CatalogIndex) -> Option<Arc<CatalogIndex>> {
        let replacement = Arc::new(index);
        let previous = self.slot.write().replace(replacement);
        info!("swapped serving index");
        previous
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use crate::search::embeddings::HashEmbedder;

    fn record(id: &str, name: &str, category: Category) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            name: name.to_string(),
            url: format!("https://example.com/{id}"),
            description: format!("{name} assessment"),
            category,
            job_levels: Default::default(),
            languages: Default::default(),
            duration_minutes: Some(30),
        }
    }

    fn sample() -> Vec<CatalogRecord> {
        vec![
            record("java", "Core Java Coding Test", Category::KnowledgeSkills),
            record("sql", "SQL Server Query Writing", Category::KnowledgeSkills),
            record("team", "Teamwork and Collaboration Styles", Category::PersonalityBehavior),
        ]
    }

    #[test]
    fn build_preserves_insertion_order() {
        let index = CatalogIndex::build(sample(), &HashEmbedder::default()).unwrap();
        let ids: Vec<_> = index.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["java", "sql", "team"]);
        assert_eq!(index.metadata().render_version, RENDER_VERSION);
        assert_eq!(index.metadata().dims, 384);
    }

    #[test]
    fn build_rejects_missing_name() {
        let mut records = sample();
        records[1].name = String::new();
        let err = CatalogIndex::build(records, &HashEmbedder::default()).unwrap_err();
        match err {
            ArError::IndexBuild { record, reason } => {
                assert_eq!(record, "sql");
                assert_eq!(reason, "missing name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn search_orders_by_distance() {
        let embedder = HashEmbedder::default();
        let index = CatalogIndex::build(sample(), &embedder).unwrap();
        let query = embedder.embed("sql query writing").unwrap();
        let hits = index.search(&query, 20).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].record_id, "sql");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn search_ties_keep_insertion_order() {
        let embedder = HashEmbedder::default();
        let mut records = sample();
        let mut twin = records[0].clone();
        twin.id = "java-twin".to_string();
        records.push(twin);
        let index = CatalogIndex::build(records, &embedder).unwrap();

        let query = index.vector("java").unwrap().to_vec();
        let hits = index.search(&query, 2).unwrap();
        assert_eq!(hits[0].record_id, "java");
        assert_eq!(hits[1].record_id, "java-twin");
        assert!((hits[0].distance - hits[1].distance).abs() < f32::EPSILON);
    }

    #[test]
    fn search_rejects_wrong_dims() {
        let index = CatalogIndex::build(sample(), &HashEmbedder::default()).unwrap();
        assert!(matches!(
            index.search(&[0.0; 3], 5),
            Err(ArError::Embedding(_))
        ));
    }

    #[test]
    fn check_compatible_detects_other_embedder() {
        let index = CatalogIndex::build(sample(), &HashEmbedder::default()).unwrap();
        assert!(index.check_compatible(&HashEmbedder::default()).is_ok());
        let err = index
            .check_compatible(&HashEmbedder::new(128, 256))
            .unwrap_err();
        assert!(matches!(err, ArError::IndexVersionMismatch { .. }));
    }

    #[test]
    fn handle_reports_not_loaded_then_swaps() {
        let handle = IndexHandle::new();
        assert!(!handle.is_loaded());
        assert!(matches!(handle.current(), Err(ArError::IndexNotLoaded(_))));

        let index = CatalogIndex::build(sample(), &HashEmbedder::default()).unwrap();
        assert!(handle.swap(index).is_none());
        assert_eq!(handle.current().unwrap().len(), 3);
    }
}
