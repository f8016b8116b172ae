//! Deterministic offline embedder based on feature hashing.
//!
//! Each lowercase alphanumeric token, and each adjacent token pair, is hashed
//! into one of `dimension` buckets with a hashed sign. The accumulated vector
//! is L2-normalized. Texts sharing vocabulary land close together under
//! Euclidean distance, which is enough for keyword-heavy claim records and
//! needs no model download.

use async_trait::async_trait;
use crc32fast::Hasher;
use rayon::prelude::*;

use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{ClaimscopeError, Result};
use crate::vector::Embedding;

/// Default dimensionality, matching common sentence-transformer models.
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

const SIGN_SEED: u32 = 0x9e37_79b9;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing text embedder.
#[derive(Debug, Clone)]
pub struct HashingTextEmbedder {
    dimension: usize,
    name: String,
}

impl HashingTextEmbedder {
    /// Create an embedder producing `dimension`-wide vectors.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(ClaimscopeError::invalid_config(
                "hashing embedder dimension must be positive",
            ));
        }
        Ok(Self {
            dimension,
            name: format!("hashing-{dimension}"),
        })
    }

    /// Embed synchronously.
    pub fn encode(&self, text: &str) -> Embedding {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            self.accumulate(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, bigram.as_bytes(), BIGRAM_WEIGHT);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let bucket = crc32fast::hash(feature) as usize % self.dimension;

        let mut sign_hasher = Hasher::new_with_initial(SIGN_SEED);
        sign_hasher.update(feature);
        let sign = if sign_hasher.finalize() & 1 == 0 {
            1.0
        } else {
            -1.0
        };

        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl TextEmbedder for HashingTextEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.encode(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.len() > 64 {
            Ok(texts.par_iter().map(|text| self.encode(text)).collect())
        } else {
            Ok(texts.iter().map(|text| self.encode(text)).collect())
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}
