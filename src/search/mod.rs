//! Retrieval over the catalog
//!
//! ```text
//! query text ──► Embedder (hash, 384 dims) ──► CatalogIndex::search (L2, top-k)
//! ```

pub mod embeddings;
pub mod index;

pub use embeddings::{build_embedder, cosine_similarity, l2_distance, Embedder, HashEmbedder};
pub use index::{CatalogIndex, IndexHandle, IndexMetadata, SearchHit};
