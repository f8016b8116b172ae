//! Text embedding support for vector search.
//!
//! The [`TextEmbedder`] trait is the seam between claimscope and whatever
//! model produces vectors. Two implementations ship with the crate:
//!
//! - [`HashingTextEmbedder`] - deterministic feature hashing, fully offline
//! - [`OpenAITextEmbedder`] - OpenAI-compatible `/embeddings` endpoint
//!
//! [`LazyEmbedder`] defers construction until the first text needs
//! embedding, so a service that only answers `health` never loads a model.
//!
//! # Usage
//!
//! ```
//! use claimscope::config::EmbedderConfig;
//! use claimscope::embedding::{TextEmbedder, build_embedder};
//!
//! # async fn example() -> claimscope::error::Result<()> {
//! let embedder = build_embedder(&EmbedderConfig::Hashing { dimension: 64 })?;
//! let vector = embedder.embed("Claim denied for missing authorization").await?;
//! assert_eq!(vector.len(), 64);
//! # Ok(())
//! # }
//! ```

pub mod hashing;
pub mod lazy;
pub mod openai_text_embedder;
pub mod text_embedder;

use std::sync::Arc;

pub use hashing::HashingTextEmbedder;
pub use lazy::LazyEmbedder;
pub use openai_text_embedder::OpenAITextEmbedder;
pub use text_embedder::TextEmbedder;

use crate::config::EmbedderConfig;
use crate::error::{ClaimscopeError, Result};

/// Construct the embedder described by `config`.
pub fn build_embedder(config: &EmbedderConfig) -> Result<Arc<dyn TextEmbedder>> {
    match config {
        EmbedderConfig::Hashing { dimension } => {
            Ok(Arc::new(HashingTextEmbedder::new(*dimension)?))
        }
        EmbedderConfig::OpenAi {
            model,
            api_key,
            base_url,
            dimension,
        } => {
            let api_key = api_key.clone().ok_or_else(|| {
                ClaimscopeError::invalid_config(format!(
                    "embedding model '{model}' requires OPENAI_API_KEY"
                ))
            })?;
            let dimension = dimension
                .or_else(|| OpenAITextEmbedder::default_dimension(model))
                .ok_or_else(|| {
                    ClaimscopeError::invalid_config(format!(
                        "dimension must be configured for embedding model '{model}'"
                    ))
                })?;
            Ok(Arc::new(OpenAITextEmbedder::with_options(
                api_key,
                model.clone(),
                base_url.clone(),
                dimension,
            )?))
        }
    }
}

/// A lazily loaded embedder for `config`.
pub fn lazy_embedder(config: &EmbedderConfig) -> LazyEmbedder {
    let owned = config.clone();
    LazyEmbedder::with_loader(config.model_name(), move || build_embedder(&owned))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_hashing() {
        let embedder = build_embedder(&EmbedderConfig::Hashing { dimension: 12 }).unwrap();
        assert_eq!(embedder.dimension(), 12);
        assert_eq!(embedder.name(), "hashing-12");
    }

    #[test]
    fn test_build_openai_without_key_fails() {
        let config = EmbedderConfig::from_model_name("text-embedding-3-small").unwrap();
        let err = build_embedder(&config).err().unwrap();
        assert!(matches!(err, ClaimscopeError::InvalidConfig(_)));
    }

    #[test]
    fn test_lazy_embedder_defers_errors() {
        let config = EmbedderConfig::from_model_name("custom-model").unwrap();
        let lazy = lazy_embedder(&config);
        assert_eq!(lazy.model(), "custom-model");
        assert!(!lazy.is_loaded());
        assert!(tokio_test::block_on(lazy.get()).is_err());
    }
}
