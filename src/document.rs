//! Retrievable document type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the claim's submission date (`YYYY-MM-DD`).
pub const CLAIM_DATE_FIELD: &str = "claim_date";

/// Metadata key holding the source record id.
pub const CLAIM_ID_FIELD: &str = "claim_id";

/// A chunk of a source record, the unit of retrieval.
///
/// Documents are immutable once created; the corpus is rebuilt wholesale on
/// ingest rather than mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique id within a corpus: `{record_id}_{chunk_index}`.
    pub id: String,
    /// The text that was embedded.
    pub text: String,
    /// String metadata copied from the source record.
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Create a new document.
    pub fn new<I: Into<String>, T: Into<String>>(
        id: I,
        text: T,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    /// Build the document id for chunk `chunk` of record `record_id`.
    pub fn chunk_id(record_id: &str, chunk: usize) -> String {
        format!("{record_id}_{chunk}")
    }

    /// Get metadata by key.
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    /// The source record id, if present in metadata.
    pub fn claim_id(&self) -> Option<&str> {
        self.get_metadata(CLAIM_ID_FIELD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id() {
        assert_eq!(Document::chunk_id("CLM-1A2B3C4D", 0), "CLM-1A2B3C4D_0");
        assert_eq!(Document::chunk_id("7", 12), "7_12");
    }

    #[test]
    fn test_metadata_access() {
        let mut metadata = BTreeMap::new();
        metadata.insert("claim_id".to_string(), "CLM-1".to_string());
        let doc = Document::new("CLM-1_0", "claim clm-1", metadata);

        assert_eq!(doc.claim_id(), Some("CLM-1"));
        assert_eq!(doc.get_metadata("status"), None);
    }
}
