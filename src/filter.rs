//! Structured metadata predicates.
//!
//! A [`FilterSpec`] narrows the searchable subset of the corpus. It is
//! compiled into a [`FilterEvaluator`], which scans document metadata and
//! yields the ascending list of matching positions.
//!
//! Semantics:
//!
//! - `start_date` / `end_date` are inclusive `YYYY-MM-DD` bounds compared
//!   lexicographically against the `claim_date` metadata field. A document
//!   without a `claim_date` never satisfies a date bound.
//! - `status`, `specialty`, `doctor_name` and `claim_id` match exactly,
//!   ignoring case. A document missing the field does not match.
//! - All present constraints must hold. Absent or empty values leave that
//!   dimension unconstrained, so an empty spec matches everything.
//!
//! There is no index over metadata: evaluation is linear in the corpus size
//! times the number of constraints, which is fine for tens of thousands of
//! documents.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::document::{CLAIM_DATE_FIELD, Document};
use crate::error::{ClaimscopeError, Result};
use crate::vector::distance::PARALLEL_THRESHOLD;

/// Keys matched exactly (case-insensitive) against metadata of the same name.
pub const EXACT_MATCH_KEYS: [&str; 4] = ["status", "specialty", "doctor_name", "claim_id"];

/// Inclusive lower date bound key.
pub const START_DATE_KEY: &str = "start_date";

/// Inclusive upper date bound key.
pub const END_DATE_KEY: &str = "end_date";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// An optional structured predicate over document metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,
}

impl FilterSpec {
    /// An unconstrained filter.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_date<S: Into<String>>(mut self, date: S) -> Self {
        self.start_date = Some(date.into());
        self
    }

    pub fn with_end_date<S: Into<String>>(mut self, date: S) -> Self {
        self.end_date = Some(date.into());
        self
    }

    pub fn with_status<S: Into<String>>(mut self, status: S) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_specialty<S: Into<String>>(mut self, specialty: S) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    pub fn with_doctor_name<S: Into<String>>(mut self, doctor_name: S) -> Self {
        self.doctor_name = Some(doctor_name.into());
        self
    }

    pub fn with_claim_id<S: Into<String>>(mut self, claim_id: S) -> Self {
        self.claim_id = Some(claim_id.into());
        self
    }

    /// Parse a filter from a JSON object.
    ///
    /// Unknown keys and non-string values are rejected as malformed; `null`
    /// values are treated as absent.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ClaimscopeError::malformed_filter("filter must be a JSON object"))?;

        let mut spec = Self::default();
        for (key, value) in object {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => spec.set(key, s)?,
                other => {
                    return Err(ClaimscopeError::malformed_filter(format!(
                        "value for '{key}' must be a string, got {other}"
                    )));
                }
            }
        }
        Ok(spec)
    }

    /// Parse a filter from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| ClaimscopeError::malformed_filter(format!("invalid JSON: {e}")))?;
        Self::from_json(&value)
    }

    /// Set a constraint by key name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let slot = match key {
            START_DATE_KEY => &mut self.start_date,
            END_DATE_KEY => &mut self.end_date,
            "status" => &mut self.status,
            "specialty" => &mut self.specialty,
            "doctor_name" => &mut self.doctor_name,
            "claim_id" => &mut self.claim_id,
            other => {
                return Err(ClaimscopeError::malformed_filter(format!(
                    "unrecognized filter key '{other}'"
                )));
            }
        };
        *slot = Some(value.to_string());
        Ok(())
    }

    /// A constraint's value, treating empty strings as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            START_DATE_KEY => &self.start_date,
            END_DATE_KEY => &self.end_date,
            "status" => &self.status,
            "specialty" => &self.specialty,
            "doctor_name" => &self.doctor_name,
            "claim_id" => &self.claim_id,
            _ => return None,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// True when no constraint is present.
    pub fn is_empty(&self) -> bool {
        self.applied().is_empty()
    }

    /// The constraints that will actually be applied.
    pub fn applied(&self) -> BTreeMap<String, String> {
        [START_DATE_KEY, END_DATE_KEY]
            .into_iter()
            .chain(EXACT_MATCH_KEYS)
            .filter_map(|key| self.get(key).map(|v| (key.to_string(), v.to_string())))
            .collect()
    }
}

/// A compiled [`FilterSpec`].
#[derive(Debug, Clone, Default)]
pub struct FilterEvaluator {
    start_date: Option<String>,
    end_date: Option<String>,
    exact: Vec<(&'static str, String)>,
}

impl FilterEvaluator {
    /// Validate `spec` and prepare it for evaluation.
    ///
    /// Date bounds must be fixed-width `YYYY-MM-DD` strings, otherwise the
    /// lexicographic comparison would be meaningless.
    pub fn compile(spec: &FilterSpec) -> Result<Self> {
        let start_date = spec.get(START_DATE_KEY).map(parse_date_bound).transpose()?;
        let end_date = spec.get(END_DATE_KEY).map(parse_date_bound).transpose()?;
        let exact = EXACT_MATCH_KEYS
            .into_iter()
            .filter_map(|key| spec.get(key).map(|v| (key, v.to_lowercase())))
            .collect();

        Ok(Self {
            start_date,
            end_date,
            exact,
        })
    }

    /// True when every document matches.
    pub fn is_unconstrained(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.exact.is_empty()
    }

    /// Evaluate against one document's metadata.
    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        if self.start_date.is_some() || self.end_date.is_some() {
            let Some(date) = metadata
                .get(CLAIM_DATE_FIELD)
                .map(|d| d.as_str())
                .filter(|d| !d.is_empty())
            else {
                return false;
            };
            if let Some(start) = &self.start_date
                && date < start.as_str()
            {
                return false;
            }
            if let Some(end) = &self.end_date
                && date > end.as_str()
            {
                return false;
            }
        }

        self.exact.iter().all(|(key, expected)| {
            metadata
                .get(*key)
                .map(|actual| actual.to_lowercase() == *expected)
                .unwrap_or(false)
        })
    }

    /// Ascending positions of the documents that satisfy the filter.
    pub fn matching_positions(&self, documents: &[Document]) -> Vec<usize> {
        if self.is_unconstrained() {
            return (0..documents.len()).collect();
        }
        if documents.len() < PARALLEL_THRESHOLD {
            documents
                .iter()
                .enumerate()
                .filter(|(_, doc)| self.matches(&doc.metadata))
                .map(|(position, _)| position)
                .collect()
        } else {
            documents
                .par_iter()
                .enumerate()
                .filter(|(_, doc)| self.matches(&doc.metadata))
                .map(|(position, _)| position)
                .collect()
        }
    }
}

fn parse_date_bound(value: &str) -> Result<String> {
    if value.len() != 10 || NaiveDate::parse_from_str(value, DATE_FORMAT).is_err() {
        return Err(ClaimscopeError::malformed_filter(format!(
            "date bound '{value}' is not a YYYY-MM-DD date"
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn docs(metadata: Vec<BTreeMap<String, String>>) -> Vec<Document> {
        metadata
            .into_iter()
            .enumerate()
            .map(|(i, m)| Document::new(format!("c{i}_0"), "text", m))
            .collect()
    }

    #[test]
    fn test_empty_spec_matches_everything() {
        let spec = FilterSpec::new();
        assert!(spec.is_empty());

        let evaluator = FilterEvaluator::compile(&spec).unwrap();
        let corpus = docs(vec![meta(&[]), meta(&[("status", "Denied")])]);
        assert_eq!(evaluator.matching_positions(&corpus), vec![0, 1]);
    }

    #[test]
    fn test_empty_strings_are_unconstrained() {
        let spec = FilterSpec::new().with_status("").with_start_date("");
        assert!(spec.is_empty());
        assert!(FilterEvaluator::compile(&spec).unwrap().is_unconstrained());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let corpus = docs(vec![
            meta(&[("claim_date", "2023-01-01")]),
            meta(&[("claim_date", "2023-06-01")]),
            meta(&[("claim_date", "2024-01-01")]),
            meta(&[("claim_date", "2023-12-31")]),
        ]);
        let spec = FilterSpec::new()
            .with_start_date("2023-01-01")
            .with_end_date("2023-12-31");
        let evaluator = FilterEvaluator::compile(&spec).unwrap();

        assert_eq!(evaluator.matching_positions(&corpus), vec![0, 1, 3]);
    }

    #[test]
    fn test_missing_date_does_not_match_date_bound() {
        let corpus = docs(vec![
            meta(&[("status", "Denied")]),
            meta(&[("claim_date", "")]),
            meta(&[("claim_date", "2023-03-03")]),
        ]);
        let spec = FilterSpec::new().with_end_date("2023-12-31");
        let evaluator = FilterEvaluator::compile(&spec).unwrap();

        assert_eq!(evaluator.matching_positions(&corpus), vec![2]);
    }

    #[test]
    fn test_exact_match_ignores_case() {
        let corpus = docs(vec![
            meta(&[("status", "Denied")]),
            meta(&[("status", "Approved")]),
            meta(&[]),
        ]);
        let spec = FilterSpec::new().with_status("denied");
        let evaluator = FilterEvaluator::compile(&spec).unwrap();

        assert_eq!(evaluator.matching_positions(&corpus), vec![0]);
    }

    #[test]
    fn test_constraints_are_conjunctive() {
        let corpus = docs(vec![
            meta(&[("status", "Denied"), ("specialty", "Cardiology")]),
            meta(&[("status", "Denied"), ("specialty", "Oncology")]),
            meta(&[("status", "Approved"), ("specialty", "Cardiology")]),
        ]);
        let spec = FilterSpec::new()
            .with_status("DENIED")
            .with_specialty("cardiology");
        let evaluator = FilterEvaluator::compile(&spec).unwrap();

        assert_eq!(evaluator.matching_positions(&corpus), vec![0]);
    }

    #[test]
    fn test_malformed_date_bound() {
        for bad in ["2023-1-5", "yesterday", "2023-13-01", "2023/01/01"] {
            let spec = FilterSpec::new().with_start_date(bad);
            assert!(
                matches!(
                    FilterEvaluator::compile(&spec),
                    Err(ClaimscopeError::MalformedFilter(_))
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_json() {
        let spec = FilterSpec::from_json_str(
            r#"{"status": "Denied", "start_date": "2023-01-01", "claim_id": null}"#,
        )
        .unwrap();
        assert_eq!(spec.status.as_deref(), Some("Denied"));
        assert_eq!(spec.start_date.as_deref(), Some("2023-01-01"));
        assert_eq!(spec.claim_id, None);

        let applied = spec.applied();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied["status"], "Denied");
    }

    #[test]
    fn test_from_json_rejects_unknown_keys_and_non_strings() {
        assert!(matches!(
            FilterSpec::from_json_str(r#"{"colour": "red"}"#),
            Err(ClaimscopeError::MalformedFilter(_))
        ));
        assert!(matches!(
            FilterSpec::from_json_str(r#"{"status": 3}"#),
            Err(ClaimscopeError::MalformedFilter(_))
        ));
        assert!(matches!(
            FilterSpec::from_json_str(r#"["status"]"#),
            Err(ClaimscopeError::MalformedFilter(_))
        ));
    }

    #[test]
    fn test_parallel_evaluation_preserves_order() {
        let corpus = docs(
            (0..PARALLEL_THRESHOLD * 2)
                .map(|i| {
                    let status = if i % 3 == 0 { "Denied" } else { "Approved" };
                    meta(&[("status", status)])
                })
                .collect(),
        );
        let evaluator = FilterEvaluator::compile(&FilterSpec::new().with_status("denied")).unwrap();
        let positions = evaluator.matching_positions(&corpus);

        assert_eq!(positions.len(), (PARALLEL_THRESHOLD * 2).div_ceil(3));
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(positions.iter().all(|p| p % 3 == 0));
    }
}
