//! # claimscope
//!
//! Semantic search and question answering over insurance claims.
//!
//! ## Features
//!
//! - Exact nearest-neighbour search over dense embeddings
//! - Metadata filtering on claim status, specialty, doctor, id and date range
//! - Checksummed, versioned on-disk artifacts with atomic replacement
//! - CSV ingestion with overlapping character chunks
//! - Pluggable embedders and answer generators

pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod generation;
pub mod ingest;
pub mod persistence;
pub mod search;
pub mod service;
pub mod storage;
pub mod vector;

pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::document::Document;
    pub use crate::embedding::{HashingTextEmbedder, TextEmbedder};
    pub use crate::error::{ClaimscopeError, Result};
    pub use crate::filter::{FilterEvaluator, FilterSpec};
    pub use crate::persistence::PersistenceCodec;
    pub use crate::search::{Corpus, SearchCoordinator, SearchResult, SearchStrategy};
    pub use crate::service::RetrievalService;
    pub use crate::vector::{DocumentStore, FlatIndex};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
