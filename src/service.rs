//! The retrieval service: one explicit context object owning the corpus,
//! its persisted artifacts, the embedder and the answer generator.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};

use crate::config::{LlmKind, Settings};
use crate::document::Document;
use crate::embedding::{LazyEmbedder, lazy_embedder};
use crate::error::{ClaimscopeError, Result};
use crate::filter::FilterSpec;
use crate::generation::{GeneratorSelection, extract_filters, select_generator};
use crate::ingest::{ClaimProcessor, ClaimRecord, load_csv};
use crate::persistence::PersistenceCodec;
use crate::search::{CoordinatorState, Corpus, SearchCoordinator, SearchHit, SearchStrategy};

/// Outcome of an ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub num_records: usize,
    pub num_chunks: usize,
    pub duration_ms: f64,
}

/// Outcome of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    /// Hits in ascending distance order; `distance` is the score.
    pub results: Vec<SearchHit>,
    /// Filter constraints that were in effect.
    pub applied_filters: BTreeMap<String, String>,
    pub strategy: SearchStrategy,
    pub search_time_ms: f64,
}

/// Service status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub ready: bool,
    pub corpus_size: usize,
    pub filtering_available: bool,
    pub embedding_model: String,
    pub embedder_loaded: bool,
}

/// A retrieved document cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub doc_id: String,
    pub claim_id: Option<String>,
    pub retrieval_score: f32,
    pub excerpt: String,
    pub metadata: BTreeMap<String, String>,
}

impl From<&SearchHit> for Source {
    fn from(hit: &SearchHit) -> Self {
        Self {
            doc_id: hit.document.id.clone(),
            claim_id: hit.document.claim_id().map(str::to_string),
            retrieval_score: hit.distance,
            excerpt: hit.document.text.clone(),
            metadata: hit.document.metadata.clone(),
        }
    }
}

/// Outcome of a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub applied_filters: BTreeMap<String, String>,
    pub llm: LlmKind,
    pub llm_model: String,
    /// The configured backend was unavailable and the mock answered.
    pub llm_fell_back: bool,
    pub embedding_model: String,
    pub latency_ms: f64,
}

/// Ingest, query and answer over one corpus.
///
/// Queries run concurrently against a snapshot. Ingests are serialized;
/// each one embeds, persists and only then swaps the new corpus in, so a
/// failed ingest leaves the previous corpus serving.
pub struct RetrievalService {
    settings: Settings,
    codec: PersistenceCodec,
    coordinator: SearchCoordinator,
    embedder: LazyEmbedder,
    processor: ClaimProcessor,
    ingest_lock: Mutex<()>,
    generator: OnceCell<GeneratorSelection>,
}

impl RetrievalService {
    pub fn new(settings: Settings, codec: PersistenceCodec, embedder: LazyEmbedder) -> Result<Self> {
        settings.validate()?;
        let processor = ClaimProcessor::from_config(&settings.chunking);
        Ok(Self {
            settings,
            codec,
            coordinator: SearchCoordinator::new(),
            embedder,
            processor,
            ingest_lock: Mutex::new(()),
            generator: OnceCell::new(),
        })
    }

    /// A service persisting under `settings.index_dir`, embedder loaded lazily.
    pub fn open(settings: Settings) -> Result<Self> {
        let codec = PersistenceCodec::open_dir(&settings.index_dir)?;
        let embedder = lazy_embedder(&settings.embedder);
        Self::new(settings, codec, embedder)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> CoordinatorState {
        self.coordinator.state()
    }

    /// Load persisted artifacts, if any.
    ///
    /// Returns `false` when nothing has been saved yet. Partial or damaged
    /// artifacts are errors.
    pub fn restore(&self) -> Result<bool> {
        if self.codec.presence().is_fresh() {
            info!("no persisted corpus found; run ingest to build one");
            return Ok(false);
        }
        let loaded = self.codec.load()?;
        if loaded.degraded() {
            warn!("restored a legacy corpus: filtered queries are unavailable until re-ingest");
        }
        let corpus = Corpus::from_loaded(loaded)?;
        info!("restored corpus of {} documents", corpus.size());
        self.coordinator.install(Arc::new(corpus));
        Ok(true)
    }

    /// Process, embed, persist and activate `records`.
    pub async fn ingest_records(&self, records: &[ClaimRecord]) -> Result<IngestSummary> {
        let _guard = self.ingest_lock.lock().await;
        let start = Instant::now();

        let documents = self.processor.process_records(records)?;
        info!(
            "processing {} records into {} chunks",
            records.len(),
            documents.len()
        );

        let embedder = self.embedder.get().await?;
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(ClaimscopeError::embedding(format!(
                "{} returned {} embeddings for {} texts",
                embedder.name(),
                embeddings.len(),
                documents.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != embedder.dimension()) {
            return Err(ClaimscopeError::DimensionMismatch {
                expected: embedder.dimension(),
                actual: bad.len(),
            });
        }

        let corpus = Corpus::build(documents, embeddings)?;
        let embeddings = corpus.store().embeddings().unwrap_or_default();
        self.codec
            .save(corpus.store().documents(), embeddings, Some(corpus.index()))?;

        let summary = IngestSummary {
            num_records: records.len(),
            num_chunks: corpus.size(),
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
        self.coordinator.install(Arc::new(corpus));
        info!(
            "ingest complete: {} records, {} chunks in {:.0}ms",
            summary.num_records, summary.num_chunks, summary.duration_ms
        );
        Ok(summary)
    }

    /// Ingest a CSV file, `settings.claims_csv` when `path` is `None`.
    pub async fn ingest_csv(&self, path: Option<&Path>) -> Result<IngestSummary> {
        let path = path.unwrap_or(self.settings.claims_csv.as_path());
        let records = load_csv(path)?;
        self.ingest_records(&records).await
    }

    /// Nearest documents to `text`, optionally filtered.
    pub async fn query(
        &self,
        text: &str,
        k: Option<usize>,
        filters: Option<&FilterSpec>,
    ) -> Result<QueryResponse> {
        if self.coordinator.state() == CoordinatorState::Empty {
            return Err(ClaimscopeError::IndexNotReady);
        }
        let k = k.unwrap_or(self.settings.default_k);
        let embedder = self.embedder.get().await?;
        let result = self
            .coordinator
            .search(embedder.as_ref(), text, k, filters)
            .await?;

        Ok(QueryResponse {
            results: result.hits,
            applied_filters: filters.map(FilterSpec::applied).unwrap_or_default(),
            strategy: result.strategy,
            search_time_ms: result.search_time_ms,
        })
    }

    pub fn health(&self) -> Health {
        let snapshot = self.coordinator.try_snapshot();
        Health {
            ready: snapshot.is_some(),
            corpus_size: snapshot.as_ref().map_or(0, |c| c.size()),
            filtering_available: snapshot.as_ref().is_some_and(|c| c.filtering_available()),
            embedding_model: self.embedder.model().to_string(),
            embedder_loaded: self.embedder.is_loaded(),
        }
    }

    /// The answer generator, selected on first use.
    pub async fn generator(&self) -> Result<&GeneratorSelection> {
        self.generator
            .get_or_try_init(|| select_generator(&self.settings.llm))
            .await
    }

    /// Answer a question: extract filters, retrieve, generate.
    pub async fn ask(&self, question: &str, k: Option<usize>) -> Result<AnswerResponse> {
        let start = Instant::now();
        if self.coordinator.state() == CoordinatorState::Empty {
            return Err(ClaimscopeError::IndexNotReady);
        }

        let selection = self.generator().await?;
        let filters = extract_filters(&selection.generator, question).await;
        info!("extracted filters: {:?}", filters.applied());

        let response = self.query(question, k, Some(&filters)).await?;
        let context: Vec<Document> = response.results.iter().map(|h| h.document.clone()).collect();
        let answer = selection.generator.generate_answer(question, &context).await?;

        Ok(AnswerResponse {
            answer,
            sources: response.results.iter().map(Source::from).collect(),
            applied_filters: response.applied_filters,
            llm: selection.generator.kind(),
            llm_model: selection.generator.model_name().to_string(),
            llm_fell_back: selection.fell_back,
            embedding_model: self.embedder.model().to_string(),
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}
