//! Canonical holder of documents and their embeddings.

use crate::document::Document;
use crate::error::{ClaimscopeError, Result};
use crate::vector::Embedding;

/// Documents paired by position with their raw embeddings.
///
/// Embeddings are absent only when the store was populated from a legacy
/// artifact that did not persist them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStore {
    documents: Vec<Document>,
    embeddings: Option<Vec<Embedding>>,
}

impl DocumentStore {
    /// Create a store, validating the corpus invariants.
    pub fn new(documents: Vec<Document>, embeddings: Vec<Embedding>) -> Result<Self> {
        validate(&documents, &embeddings)?;
        Ok(Self {
            documents,
            embeddings: Some(embeddings),
        })
    }

    /// Create a store that holds documents but no embeddings.
    pub fn documents_only(documents: Vec<Document>) -> Self {
        Self {
            documents,
            embeddings: None,
        }
    }

    /// Swap in a new corpus.
    ///
    /// Validation happens before anything is touched, so a rejected corpus
    /// leaves the store unchanged.
    pub fn replace(&mut self, documents: Vec<Document>, embeddings: Vec<Embedding>) -> Result<()> {
        validate(&documents, &embeddings)?;
        self.documents = documents;
        self.embeddings = Some(embeddings);
        Ok(())
    }

    /// The document at `position`.
    pub fn get(&self, position: usize) -> Result<&Document> {
        self.documents
            .get(position)
            .ok_or(ClaimscopeError::OutOfRange {
                position,
                size: self.documents.len(),
            })
    }

    /// Corpus cardinality.
    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn embeddings(&self) -> Option<&[Embedding]> {
        self.embeddings.as_deref()
    }

    /// The embedding at `position`, if embeddings are held.
    pub fn embedding(&self, position: usize) -> Option<&[f32]> {
        self.embeddings
            .as_ref()
            .and_then(|e| e.get(position))
            .map(|e| e.as_slice())
    }

    pub fn has_embeddings(&self) -> bool {
        self.embeddings.is_some()
    }

    /// Embedding dimensionality, if known.
    pub fn dimension(&self) -> Option<usize> {
        self.embeddings
            .as_ref()
            .and_then(|e| e.first())
            .map(|e| e.len())
    }
}

fn validate(documents: &[Document], embeddings: &[Embedding]) -> Result<()> {
    if documents.len() != embeddings.len() {
        return Err(ClaimscopeError::consistency(format!(
            "{} documents but {} embeddings",
            documents.len(),
            embeddings.len()
        )));
    }
    if let Some(first) = embeddings.first() {
        let expected = first.len();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(ClaimscopeError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
    }
    Ok(())
}
