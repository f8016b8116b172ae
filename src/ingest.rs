//! Claim ingestion: CSV loading and record-to-document processing.

pub mod processor;
pub mod record;

pub use self::processor::ClaimProcessor;
pub use self::record::{ClaimRecord, load_csv, parse_csv};
