//! Turns claim records into searchable, chunked documents.

use crate::config::ChunkingConfig;
use crate::document::{CLAIM_ID_FIELD, Document};
use crate::error::{ClaimscopeError, Result};
use crate::ingest::record::ClaimRecord;

/// Renders claim records as text and splits them into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for ClaimProcessor {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

impl ClaimProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
        }
        .validate()?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Assumes a validated config.
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            chunk_overlap: config.chunk_overlap.min(config.chunk_size.saturating_sub(1)),
        }
    }

    /// Lowercase, collapse whitespace runs to one space, trim.
    pub fn normalize_text(&self, text: &str) -> String {
        text.to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Descriptive text for a claim, normalized for embedding.
    pub fn create_search_document(&self, record: &ClaimRecord) -> String {
        let field = |name: &str| record.get(name).map(String::as_str).unwrap_or("");

        let status = match field("status") {
            "" => "Unknown",
            s => s,
        };
        let mut status_text = format!("Status is {status}.");
        let denial_reason = field("denial_reason");
        if !denial_reason.is_empty() {
            status_text.push_str(&format!(" Denial reason: {denial_reason}."));
        }

        let text = format!(
            "Claim {} submitted on {}. Patient ID: {}. Doctor: {} ({}). Diagnosis: {}. \
             Procedure Code: {}. Amount: ${}. {} Notes: {}",
            field("claim_id"),
            field("claim_date"),
            field("patient_id"),
            field("doctor_name"),
            field("specialty"),
            field("diagnosis"),
            field("procedure_code"),
            field("amount"),
            status_text,
            field("notes"),
        );
        self.normalize_text(&text)
    }

    /// Character windows of `chunk_size` advancing by `chunk_size - chunk_overlap`.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }
        let step = self.chunk_size - self.chunk_overlap;
        (0..chars.len())
            .step_by(step)
            .map(|start| {
                let end = (start + self.chunk_size).min(chars.len());
                chars[start..end].iter().collect()
            })
            .collect()
    }

    /// One document per chunk, id `{claim_id}_{i}`, metadata the full record.
    pub fn process_records(&self, records: &[ClaimRecord]) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            let claim_id = record
                .get(CLAIM_ID_FIELD)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    ClaimscopeError::ingest(format!("record {row} has no {CLAIM_ID_FIELD}"))
                })?;

            let text = self.create_search_document(record);
            for (i, chunk) in self.chunk(&text).into_iter().enumerate() {
                documents.push(Document::new(
                    Document::chunk_id(claim_id, i),
                    chunk,
                    record.clone(),
                ));
            }
        }
        Ok(documents)
    }
}
