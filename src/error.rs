//! Error types for claimscope.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`ClaimscopeError`] enum. Variants carry enough detail for the caller to
//! act on them; [`ClaimscopeError::boundary_code`] maps an error onto the
//! coarse conditions reported at the service boundary.
//!
//! # Examples
//!
//! ```
//! use claimscope::error::{ClaimscopeError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(ClaimscopeError::malformed_filter("unknown key 'colour'"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use serde::Serialize;
use thiserror::Error;

/// The main error type for claimscope operations.
#[derive(Error, Debug)]
pub enum ClaimscopeError {
    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Embedding shapes disagree.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A corpus invariant was violated.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// A position outside the corpus was requested.
    #[error("Position {position} is out of range for a corpus of {size} documents")]
    OutOfRange { position: usize, size: usize },

    /// Query issued before any corpus was built or loaded.
    #[error("Index not ready: run ingest before querying")]
    IndexNotReady,

    /// Filtered search requested against a corpus without raw embeddings.
    #[error("Filtering unavailable: {0}")]
    FilteringUnavailable(String),

    /// A persisted artifact exists but cannot be parsed.
    #[error("Corrupt artifact '{artifact}': {reason}")]
    CorruptArtifact { artifact: String, reason: String },

    /// A persisted artifact is absent.
    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    /// A filter key or value that cannot be interpreted.
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    /// Embedding backend errors.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Answer generation backend errors.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Ingestion errors (missing source data, malformed records).
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for operations that may fail with ClaimscopeError.
pub type Result<T> = std::result::Result<T, ClaimscopeError>;

/// Conditions reported at the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryCode {
    /// Precondition failure: no corpus has been ingested or loaded.
    CorpusNotReady,
    /// A filter key/value that cannot be interpreted.
    MalformedFilter,
    /// Legacy artifact loaded; re-ingest to enable filtering.
    FilteringUnavailable,
    /// Anything else.
    Internal,
}

impl BoundaryCode {
    /// Process exit code used by the command line front end.
    pub fn exit_code(self) -> i32 {
        match self {
            BoundaryCode::Internal => 1,
            BoundaryCode::MalformedFilter => 2,
            BoundaryCode::CorpusNotReady => 3,
            BoundaryCode::FilteringUnavailable => 4,
        }
    }
}

impl ClaimscopeError {
    /// Create a new consistency error.
    pub fn consistency<S: Into<String>>(msg: S) -> Self {
        ClaimscopeError::Consistency(msg.into())
    }

    /// Create a new corrupt artifact error.
    pub fn corrupt<A: Into<String>, R: Into<String>>(artifact: A, reason: R) -> Self {
        ClaimscopeError::CorruptArtifact {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// Create a new malformed filter error.
    pub fn malformed_filter<S: Into<String>>(msg: S) -> Self {
        ClaimscopeError::MalformedFilter(msg.into())
    }

    /// Create a new embedding error.
    pub fn embedding<S: Into<String>>(msg: S) -> Self {
        ClaimscopeError::Embedding(msg.into())
    }

    /// Create a new generation error.
    pub fn generation<S: Into<String>>(msg: S) -> Self {
        ClaimscopeError::Generation(msg.into())
    }

    /// Create a new ingest error.
    pub fn ingest<S: Into<String>>(msg: S) -> Self {
        ClaimscopeError::Ingest(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        ClaimscopeError::Storage(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        ClaimscopeError::InvalidConfig(msg.into())
    }

    /// Map this error onto the boundary condition it represents.
    pub fn boundary_code(&self) -> BoundaryCode {
        match self {
            ClaimscopeError::IndexNotReady => BoundaryCode::CorpusNotReady,
            ClaimscopeError::MalformedFilter(_) => BoundaryCode::MalformedFilter,
            ClaimscopeError::FilteringUnavailable(_) => BoundaryCode::FilteringUnavailable,
            _ => BoundaryCode::Internal,
        }
    }
}
