//! Squared Euclidean distance and top-k selection.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::error::{ClaimscopeError, Result};

/// Below this many candidates distances are computed on the calling thread.
pub const PARALLEL_THRESHOLD: usize = 1024;

/// A candidate position and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position in the corpus.
    pub position: usize,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

impl Neighbor {
    /// Ascending by distance, ties broken by ascending position.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

/// Sum of squared per-dimension differences.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(ClaimscopeError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(squared_euclidean_unchecked(a, b))
}

/// Squared Euclidean distance for slices already known to be the same length.
#[inline]
pub(crate) fn squared_euclidean_unchecked(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Distances from `query` to every `dimension`-wide row of `rows`.
///
/// `rows.len()` must be a multiple of `dimension`.
pub(crate) fn distances_to_rows(query: &[f32], rows: &[f32], dimension: usize) -> Vec<Neighbor> {
    let count = rows.len() / dimension;
    if count < PARALLEL_THRESHOLD {
        rows.chunks_exact(dimension)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_euclidean_unchecked(query, row),
            })
            .collect()
    } else {
        rows.par_chunks_exact(dimension)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_euclidean_unchecked(query, row),
            })
            .collect()
    }
}

/// Keep the `k` best candidates in rank order.
pub fn select_top_k(mut candidates: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }
    if k < candidates.len() {
        candidates.select_nth_unstable_by(k - 1, Neighbor::rank_cmp);
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(Neighbor::rank_cmp);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor(position: usize, distance: f32) -> Neighbor {
        Neighbor { position, distance }
    }

    #[test]
    fn test_squared_euclidean() {
        let d = squared_euclidean(&[1.0, 2.0, 3.0], &[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(d, 13.0);
        assert_eq!(squared_euclidean(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_squared_euclidean_rejects_mismatched_lengths() {
        let err = squared_euclidean(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            ClaimscopeError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_select_top_k_breaks_ties_by_position() {
        let candidates = vec![
            neighbor(4, 1.0),
            neighbor(1, 0.5),
            neighbor(2, 1.0),
            neighbor(0, 1.0),
            neighbor(3, 2.0),
        ];
        let top = select_top_k(candidates, 3);
        let positions: Vec<usize> = top.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![1, 0, 2]);
    }

    #[test]
    fn test_select_top_k_with_large_k_returns_everything_sorted() {
        let candidates = vec![neighbor(0, 3.0), neighbor(1, 1.0), neighbor(2, 2.0)];
        let top = select_top_k(candidates, 10);
        let positions: Vec<usize> = top.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![1, 2, 0]);
    }

    #[test]
    fn test_select_top_k_zero() {
        assert!(select_top_k(vec![neighbor(0, 1.0)], 0).is_empty());
    }

    #[test]
    fn test_parallel_and_serial_distances_agree() {
        let dimension = 4;
        let count = PARALLEL_THRESHOLD + 10;
        let rows: Vec<f32> = (0..count * dimension).map(|i| (i % 17) as f32).collect();
        let query = [1.0, 2.0, 3.0, 4.0];

        let all = distances_to_rows(&query, &rows, dimension);
        assert_eq!(all.len(), count);
        for n in all.iter().take(50) {
            let row = &rows[n.position * dimension..(n.position + 1) * dimension];
            assert_eq!(n.distance, squared_euclidean(&query, row).unwrap());
        }
    }
}
