//! Search result types.

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// How a result set was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Unfiltered query against the flat index.
    Index,
    /// Distances computed only for documents passing the filter.
    FilteredScan,
    /// The filter excluded every document.
    NoMatch,
}

/// One retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Position of the document in the corpus.
    pub position: usize,
    /// Squared Euclidean distance to the query; lower is closer.
    pub distance: f32,
    pub document: Document,
}

/// Ranked hits plus execution details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Hits in ascending distance order.
    pub hits: Vec<SearchHit>,
    pub strategy: SearchStrategy,
    /// Number of vectors whose distance was computed.
    pub candidates_examined: usize,
    /// Search execution time in milliseconds.
    pub search_time_ms: f64,
}

impl SearchResult {
    pub fn empty(strategy: SearchStrategy) -> Self {
        Self {
            hits: Vec::new(),
            strategy,
            candidates_examined: 0,
            search_time_ms: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Document ids in rank order.
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.document.id.as_str()).collect()
    }
}
