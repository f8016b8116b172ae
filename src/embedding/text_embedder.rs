//! Text embedding trait for claimscope's retrieval pipeline.

use async_trait::async_trait;

use crate::error::Result;
use crate::vector::Embedding;

/// Trait for converting text to vector embeddings.
///
/// Implementations must be deterministic for a given model version: the
/// same text always maps to the same vector, and every vector has
/// [`dimension`](TextEmbedder::dimension) components.
///
/// # Custom implementation
///
/// ```
/// use async_trait::async_trait;
/// use claimscope::embedding::TextEmbedder;
/// use claimscope::error::Result;
/// use claimscope::vector::Embedding;
///
/// struct ConstantEmbedder {
///     dimension: usize,
/// }
///
/// #[async_trait]
/// impl TextEmbedder for ConstantEmbedder {
///     async fn embed(&self, _text: &str) -> Result<Embedding> {
///         Ok(vec![1.0; self.dimension])
///     }
///
///     fn dimension(&self) -> usize {
///         self.dimension
///     }
/// }
/// ```
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts in batch.
    ///
    /// The default implementation calls `embed` sequentially.
    /// Override this method for better performance with batch processing.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Get the dimension of generated embeddings.
    fn dimension(&self) -> usize;

    /// Get the name/identifier of this embedder, e.g. the model name.
    fn name(&self) -> &str {
        "unknown"
    }
}
