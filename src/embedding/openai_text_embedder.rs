//! OpenAI API-based text embedder implementation.
//!
//! Works against `https://api.openai.com/v1` or any server exposing the same
//! `/embeddings` route.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{ClaimscopeError, Result};
use crate::vector::Embedding;

/// Inputs per request. The API accepts up to 2048.
const MAX_BATCH: usize = 256;

/// Request structure for OpenAI Embeddings API.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    /// Only sent when it differs from the model default.
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

/// Response structure from OpenAI Embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI API-based text embedder.
///
/// # Examples
///
/// ```no_run
/// use claimscope::embedding::TextEmbedder;
/// use claimscope::embedding::openai_text_embedder::OpenAITextEmbedder;
///
/// # async fn example() -> claimscope::error::Result<()> {
/// let embedder = OpenAITextEmbedder::new(
///     std::env::var("OPENAI_API_KEY").unwrap_or_default(),
///     "text-embedding-3-small".to_string(),
/// )?;
///
/// let vector = embedder.embed("denied cardiology claims").await?;
/// assert_eq!(vector.len(), embedder.dimension());
/// # Ok(())
/// # }
/// ```
pub struct OpenAITextEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
}

impl OpenAITextEmbedder {
    /// Create a new OpenAI embedder using the model's default dimension.
    ///
    /// # Supported Models
    ///
    /// - `text-embedding-3-small` - 1536 dimensions
    /// - `text-embedding-3-large` - 3072 dimensions
    /// - `text-embedding-ada-002` - 1536 dimensions
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let dimension = Self::default_dimension(&model).ok_or_else(|| {
            ClaimscopeError::invalid_config(format!(
                "Unknown OpenAI embedding model: {model}. Supported models: \
                 text-embedding-3-small, text-embedding-3-large, text-embedding-ada-002"
            ))
        })?;
        Self::with_options(api_key, model, "https://api.openai.com/v1".to_string(), dimension)
    }

    /// Create an embedder with an explicit endpoint and dimension.
    pub fn with_options(
        api_key: String,
        model: String,
        base_url: String,
        dimension: usize,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ClaimscopeError::invalid_config(
                "OpenAI embedder requires an API key (set OPENAI_API_KEY)",
            ));
        }
        if dimension == 0 {
            return Err(ClaimscopeError::invalid_config(
                "embedding dimension must be positive",
            ));
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension,
        })
    }

    /// Standard embedding dimension for known models.
    pub fn default_dimension(model: &str) -> Option<usize> {
        match model {
            "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            _ => None,
        }
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let dimensions = match Self::default_dimension(&self.model) {
            Some(d) if d == self.dimension => None,
            _ => Some(self.dimension),
        };
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions,
        };

        let http_response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClaimscopeError::embedding(format!("OpenAI API request failed: {e}")))?;

        let status = http_response.status();
        let response_text = http_response.text().await.map_err(|e| {
            ClaimscopeError::embedding(format!("Failed to read response text: {e}"))
        })?;

        if !status.is_success() {
            return Err(ClaimscopeError::embedding(format!(
                "OpenAI API error (status {status}): {response_text}"
            )));
        }

        self.parse_response(&response_text, texts.len())
    }

    /// Embeddings from a response body, in input order.
    fn parse_response(&self, body: &str, expected: usize) -> Result<Vec<Embedding>> {
        let mut response: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
            ClaimscopeError::embedding(format!("Failed to parse OpenAI response: {e}"))
        })?;

        if response.data.len() != expected {
            return Err(ClaimscopeError::embedding(format!(
                "expected {expected} embeddings, got {}",
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);

        response
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() != self.dimension {
                    return Err(ClaimscopeError::DimensionMismatch {
                        expected: self.dimension,
                        actual: d.embedding.len(),
                    });
                }
                Ok(d.embedding)
            })
            .collect()
    }
}

#[async_trait]
impl TextEmbedder for OpenAITextEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.request(&[text])
            .await?
            .pop()
            .ok_or_else(|| ClaimscopeError::embedding("No embedding in response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!("embedding batch of {} texts with {}", batch.len(), self.model);
            results.extend(self.request(batch).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
