//! Exact flat nearest-neighbor index.

use crate::error::{ClaimscopeError, Result};
use crate::vector::Embedding;
use crate::vector::distance::{Neighbor, distances_to_rows, select_top_k};

/// Flat index comparing a query against every stored vector.
///
/// Vectors are kept in a single row-major buffer; position `i` occupies
/// `data[i * dimension..(i + 1) * dimension]`. Positions are assigned in
/// build order and never change for the lifetime of the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from all embeddings at once.
    ///
    /// Fails with `DimensionMismatch` when the embeddings are not of uniform
    /// length. An empty input yields an empty index.
    pub fn build(embeddings: &[Embedding]) -> Result<Self> {
        let Some(first) = embeddings.first() else {
            return Ok(Self::default());
        };
        let dimension = first.len();
        if dimension == 0 {
            return Err(ClaimscopeError::consistency(
                "embeddings must have at least one dimension",
            ));
        }

        let mut data = Vec::with_capacity(dimension * embeddings.len());
        for embedding in embeddings {
            if embedding.len() != dimension {
                return Err(ClaimscopeError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            data.extend_from_slice(embedding);
        }

        Ok(Self { dimension, data })
    }

    /// Reassemble an index from its raw row-major buffer.
    pub fn from_raw_parts(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            if !data.is_empty() {
                return Err(ClaimscopeError::consistency(
                    "zero-dimension index cannot hold vectors",
                ));
            }
            return Ok(Self::default());
        }
        if data.len() % dimension != 0 {
            return Err(ClaimscopeError::consistency(format!(
                "buffer of {} floats is not a multiple of dimension {dimension}",
                data.len()
            )));
        }
        Ok(Self { dimension, data })
    }

    /// Vector dimensionality, 0 for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw row-major buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The vector stored at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len() {
            return None;
        }
        let start = position * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// The `k` nearest positions to `query` by squared Euclidean distance.
    ///
    /// Results ascend by distance with ties broken by ascending position.
    /// An empty index answers every query with an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(ClaimscopeError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let candidates = distances_to_rows(query, &self.data, self.dimension);
        Ok(select_top_k(candidates, k))
    }
}
