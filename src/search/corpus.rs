//! An immutable, queryable corpus: documents, embeddings and their index.

use rayon::prelude::*;

use crate::document::Document;
use crate::error::{ClaimscopeError, Result};
use crate::filter::{FilterEvaluator, FilterSpec};
use crate::persistence::LoadedCorpus;
use crate::search::result::{SearchHit, SearchResult, SearchStrategy};
use crate::vector::distance::{PARALLEL_THRESHOLD, squared_euclidean_unchecked, select_top_k};
use crate::vector::{DocumentStore, Embedding, FlatIndex, Neighbor};

/// A document store paired with the index built over its embeddings.
///
/// Position `i` in the store and in the index refer to the same document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    store: DocumentStore,
    index: FlatIndex,
}

impl Corpus {
    /// Build a corpus and its index from scratch.
    pub fn build(documents: Vec<Document>, embeddings: Vec<Embedding>) -> Result<Self> {
        let index = FlatIndex::build(&embeddings)?;
        let store = DocumentStore::new(documents, embeddings)?;
        Ok(Self { store, index })
    }

    /// Pair an existing store and index.
    pub fn from_parts(store: DocumentStore, index: FlatIndex) -> Result<Self> {
        if store.size() != index.len() {
            return Err(ClaimscopeError::consistency(format!(
                "store holds {} documents but index holds {} vectors",
                store.size(),
                index.len()
            )));
        }
        if let Some(dimension) = store.dimension()
            && dimension != index.dimension()
        {
            return Err(ClaimscopeError::DimensionMismatch {
                expected: index.dimension(),
                actual: dimension,
            });
        }
        Ok(Self { store, index })
    }

    /// Assemble a corpus from persisted artifacts.
    pub fn from_loaded(loaded: LoadedCorpus) -> Result<Self> {
        let store = match loaded.embeddings {
            Some(embeddings) => DocumentStore::new(loaded.documents, embeddings)?,
            None => DocumentStore::documents_only(loaded.documents),
        };
        Self::from_parts(store, loaded.index)
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn size(&self) -> usize {
        self.store.size()
    }

    /// Filtered search needs the raw embeddings.
    pub fn filtering_available(&self) -> bool {
        self.store.has_embeddings() || self.store.is_empty()
    }

    /// The `k` documents nearest to `query` that satisfy `filters`.
    ///
    /// An absent or empty filter searches the whole index.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        filters: Option<&FilterSpec>,
    ) -> Result<SearchResult> {
        let evaluator = filters
            .filter(|f| !f.is_empty())
            .map(FilterEvaluator::compile)
            .transpose()?;

        if self.index.is_empty() {
            return Ok(SearchResult::empty(SearchStrategy::Index));
        }
        if query.len() != self.index.dimension() {
            return Err(ClaimscopeError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: query.len(),
            });
        }

        let Some(evaluator) = evaluator else {
            let neighbors = self.index.search(query, k)?;
            return self.collect(neighbors, SearchStrategy::Index, self.index.len());
        };

        let Some(embeddings) = self.store.embeddings() else {
            return Err(ClaimscopeError::FilteringUnavailable(
                "corpus was loaded from a legacy artifact without embeddings; \
                 re-ingest to enable filtered search"
                    .to_string(),
            ));
        };

        let positions = evaluator.matching_positions(self.store.documents());
        if positions.is_empty() {
            return Ok(SearchResult::empty(SearchStrategy::NoMatch));
        }

        let distance_at = |position: usize| Neighbor {
            position,
            distance: squared_euclidean_unchecked(query, &embeddings[position]),
        };
        let candidates: Vec<Neighbor> = if positions.len() >= PARALLEL_THRESHOLD {
            positions.par_iter().map(|&p| distance_at(p)).collect()
        } else {
            positions.iter().map(|&p| distance_at(p)).collect()
        };

        self.collect(
            select_top_k(candidates, k),
            SearchStrategy::FilteredScan,
            positions.len(),
        )
    }

    fn collect(
        &self,
        neighbors: Vec<Neighbor>,
        strategy: SearchStrategy,
        candidates_examined: usize,
    ) -> Result<SearchResult> {
        let hits = neighbors
            .into_iter()
            .map(|n| {
                Ok(SearchHit {
                    position: n.position,
                    distance: n.distance,
                    document: self.store.get(n.position)?.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchResult {
            hits,
            strategy,
            candidates_examined,
            search_time_ms: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn doc(id: &str, status: &str, date: &str) -> Document {
        Document::new(
            id,
            format!("claim {id}"),
            BTreeMap::from([
                ("status".to_string(), status.to_string()),
                ("claim_date".to_string(), date.to_string()),
            ]),
        )
    }

    fn sample() -> Corpus {
        Corpus::build(
            vec![
                doc("A_0", "Denied", "2023-01-10"),
                doc("B_0", "Approved", "2023-02-10"),
                doc("C_0", "denied", "2023-03-10"),
                doc("D_0", "Pending", "2023-04-10"),
            ],
            vec![
                vec![0.0, 0.0],
                vec![0.1, 0.0],
                vec![3.0, 0.0],
                vec![0.2, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_unfiltered_search() {
        let corpus = sample();
        let result = corpus.search(&[0.0, 0.0], 2, None).unwrap();
        assert_eq!(result.ids(), vec!["A_0", "B_0"]);
        assert_eq!(result.strategy, SearchStrategy::Index);
        assert_eq!(result.candidates_examined, 4);
    }

    #[test]
    fn test_empty_filter_equals_no_filter() {
        let corpus = sample();
        let plain = corpus.search(&[0.15, 0.0], 3, None).unwrap();
        let empty = corpus
            .search(&[0.15, 0.0], 3, Some(&FilterSpec::default()))
            .unwrap();
        assert_eq!(plain, empty);
    }

    #[test]
    fn test_filtered_scan_maps_back_to_positions() {
        let corpus = sample();
        let spec = FilterSpec::new().with_status("DENIED");
        let result = corpus.search(&[2.9, 0.0], 5, Some(&spec)).unwrap();

        assert_eq!(result.strategy, SearchStrategy::FilteredScan);
        assert_eq!(result.ids(), vec!["C_0", "A_0"]);
        assert_eq!(result.hits[0].position, 2);
        assert_eq!(result.candidates_examined, 2);
    }

    #[test]
    fn test_filter_without_matches_is_empty() {
        let corpus = sample();
        let spec = FilterSpec::new().with_status("Appealed");
        let result = corpus.search(&[0.0, 0.0], 5, Some(&spec)).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.strategy, SearchStrategy::NoMatch);
    }

    #[test]
    fn test_degraded_corpus_refuses_filters() {
        let full = sample();
        let store = DocumentStore::documents_only(full.store().documents().to_vec());
        let degraded = Corpus::from_parts(store, full.index().clone()).unwrap();
        assert!(!degraded.filtering_available());

        assert_eq!(degraded.search(&[0.0, 0.0], 1, None).unwrap().ids(), vec!["A_0"]);
        let spec = FilterSpec::new().with_status("Denied");
        assert!(matches!(
            degraded.search(&[0.0, 0.0], 1, Some(&spec)),
            Err(ClaimscopeError::FilteringUnavailable(_))
        ));
    }

    #[test]
    fn test_wrong_query_dimension() {
        assert!(matches!(
            sample().search(&[0.0, 0.0, 0.0], 1, None),
            Err(ClaimscopeError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_from_parts_checks_lengths() {
        let full = sample();
        let short = FlatIndex::build(&[vec![0.0, 0.0]]).unwrap();
        assert!(matches!(
            Corpus::from_parts(full.store().clone(), short),
            Err(ClaimscopeError::Consistency(_))
        ));
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = Corpus::build(Vec::new(), Vec::new()).unwrap();
        assert_eq!(corpus.size(), 0);
        assert!(corpus.search(&[1.0], 3, None).unwrap().is_empty());
    }
}
