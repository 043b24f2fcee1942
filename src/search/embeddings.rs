//! Hash embeddings
//!
//! FNV-1a feature hashing over unigrams and bigrams, L2-normalized.
//! No model dependencies, fully deterministic across runs and platforms.

use std::borrow::Cow;

use crate::config::EmbeddingConfig;
use crate::error::{ArError, Result};

/// Pluggable embedding backend interface.
///
/// `embed` is pure: the same text always yields the same vector. Text that
/// is empty or longer than [`Embedder::max_tokens`] is rejected, so callers
/// run [`Embedder::truncate`] first when they want to clip instead.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dims(&self) -> usize;
    fn name(&self) -> &str;
    fn max_tokens(&self) -> usize;
    fn count_tokens(&self, text: &str) -> usize;

    /// Clip `text` to the token limit, leaving shorter text untouched.
    fn truncate<'a>(&self, text: &'a str) -> Cow<'a, str>;
}

/// Build an embedder from embedding config.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let backend = config.backend.trim().to_lowercase();
    let dims = config.dims as usize;
    if dims == 0 {
        return Err(ArError::Config(
            "embedding.dims must be greater than 0".to_string(),
        ));
    }

    match backend.as_str() {
        "" | "hash" => Ok(Box::new(HashEmbedder::new(dims, config.max_tokens as usize))),
        "local" | "api" => Err(ArError::Config(format!(
            "embedding.backend={backend} is not available in this build"
        ))),
        other => Err(ArError::Config(format!(
            "unknown embedding backend: {other}"
        ))),
    }
}

/// Hash embedder using FNV-1a
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    max_tokens: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dim: 384,
            max_tokens: 256,
        }
    }
}

impl HashEmbedder {
    #[must_use]
    pub const fn new(dim: usize, max_tokens: usize) -> Self {
        Self { dim, max_tokens }
    }

    fn embed_tokens(&self, tokens: &[String]) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dim];

        for token in tokens {
            accumulate_embedding(&mut embedding, token, 1.0);
        }

        for window in tokens.windows(2) {
            let bigram = format!("{} {}", window[0], window[1]);
            accumulate_embedding(&mut embedding, &bigram, 0.5);
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(ArError::Embedding("text is empty".to_string()));
        }

        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(ArError::Embedding(
                "text has no embeddable tokens".to_string(),
            ));
        }
        if tokens.len() > self.max_tokens {
            return Err(ArError::Embedding(format!(
                "text has {} tokens, limit is {}",
                tokens.len(),
                self.max_tokens
            )));
        }

        Ok(self.embed_tokens(&tokens))
    }

    fn dims(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hash"
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn count_tokens(&self, text: &str) -> usize {
        tokenize(text).len()
    }

    fn truncate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let tokens = tokenize(text);
        if tokens.len() <= self.max_tokens {
            return Cow::Borrowed(text);
        }
        Cow::Owned(tokens[..self.max_tokens].join(" "))
    }
}

/// Euclidean distance between two vectors of equal length.
#[must_use]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Lowercased word tokens of at least two characters. `+` and `#` are kept
/// so "c++" and "c#" survive.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|token| token.len() >= 2)
        .map(ToString::to_string)
        .collect()
}

fn accumulate_embedding(embedding: &mut [f32], token: &str, weight: f32) {
    let token_hash = fnv1a_hash(token.as_bytes());

    for i in 0..embedding.len() {
        let dim_hash = fnv1a_hash_with_salt(token_hash, i as u64);
        let sign = if dim_hash & 1 == 0 { weight } else { -weight };
        let dim = ((dim_hash >> 1) as usize) % embedding.len();
        embedding[dim] += sign;
    }
}

fn fnv1a_hash_with_salt(seed: u64, salt: u64) -> u64 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..].copy_from_slice(&salt.to_le_bytes());
    fnv1a_hash(&bytes)
}

fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}
