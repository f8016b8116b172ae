//! Query orchestration over the current corpus snapshot.

use std::sync::Arc;
use std::time::Instant;

use log::debug;
use parking_lot::RwLock;
use serde::Serialize;

use crate::document::Document;
use crate::embedding::TextEmbedder;
use crate::error::{ClaimscopeError, Result};
use crate::filter::FilterSpec;
use crate::search::corpus::Corpus;
use crate::search::result::SearchResult;
use crate::vector::Embedding;

/// Lifecycle of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    /// No corpus has been built or installed.
    Empty,
    Ready,
}

/// Routes queries to the active corpus.
///
/// Readers clone an `Arc` snapshot under a shared lock and search without
/// holding it; `install` swaps the snapshot under the exclusive lock, so a
/// query sees either the previous corpus or the new one in full.
#[derive(Debug, Default)]
pub struct SearchCoordinator {
    corpus: RwLock<Option<Arc<Corpus>>>,
}

impl SearchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CoordinatorState {
        if self.corpus.read().is_some() {
            CoordinatorState::Ready
        } else {
            CoordinatorState::Empty
        }
    }

    /// Build a corpus from documents and embeddings and make it current.
    pub fn build(&self, documents: Vec<Document>, embeddings: Vec<Embedding>) -> Result<()> {
        let corpus = Corpus::build(documents, embeddings)?;
        self.install(Arc::new(corpus));
        Ok(())
    }

    /// Make `corpus` current.
    pub fn install(&self, corpus: Arc<Corpus>) {
        debug!("installing corpus of {} documents", corpus.size());
        *self.corpus.write() = Some(corpus);
    }

    /// The current corpus.
    pub fn snapshot(&self) -> Result<Arc<Corpus>> {
        self.corpus
            .read()
            .as_ref()
            .cloned()
            .ok_or(ClaimscopeError::IndexNotReady)
    }

    /// The current corpus, if any.
    pub fn try_snapshot(&self) -> Option<Arc<Corpus>> {
        self.corpus.read().clone()
    }

    /// Search with an already embedded query.
    pub fn search_vector(
        &self,
        query: &[f32],
        k: usize,
        filters: Option<&FilterSpec>,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        let corpus = self.snapshot()?;
        let mut result = corpus.search(query, k, filters)?;
        result.search_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(result)
    }

    /// Embed `text` and search.
    ///
    /// Readiness is checked before the embedder is touched, so querying an
    /// empty coordinator never loads a model.
    pub async fn search(
        &self,
        embedder: &dyn TextEmbedder,
        text: &str,
        k: usize,
        filters: Option<&FilterSpec>,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        let corpus = self.snapshot()?;
        let query = embedder.embed(text).await?;
        let mut result = corpus.search(&query, k, filters)?;
        result.search_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "query returned {} hits ({:?}, {} candidates) in {:.2}ms",
            result.len(),
            result.strategy,
            result.candidates_examined,
            result.search_time_ms
        );
        Ok(result)
    }
}
