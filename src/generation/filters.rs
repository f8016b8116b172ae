//! Turning a natural language question into a [`FilterSpec`].

use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use serde_json::Value;

use crate::error::{ClaimscopeError, Result};
use crate::filter::{FilterEvaluator, FilterSpec};
use crate::generation::backend::AnswerGenerator;
use crate::generation::prompt::filter_extraction_prompt;

/// Markdown code fences around a model's JSON reply.
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?").expect("code fence pattern is valid"));

/// Keyword rules used when no language model is available.
///
/// "approved" wins when both keywords appear.
pub fn keyword_filters(question: &str) -> FilterSpec {
    let lowered = question.to_lowercase();
    let mut spec = FilterSpec::new();
    if lowered.contains("denied") {
        spec = spec.with_status("Denied");
    }
    if lowered.contains("approved") {
        spec = spec.with_status("Approved");
    }
    spec
}

/// Parse a model reply into a filter.
///
/// Markdown code fences are removed and the text between the first `{` and
/// the last `}` is read as JSON. Keys the filter does not know and
/// non-string values are dropped. The result must compile.
pub fn parse_filter_response(response: &str) -> Result<FilterSpec> {
    let cleaned = CODE_FENCE.replace_all(response, "");
    let cleaned = cleaned.trim();

    let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) else {
        return Err(ClaimscopeError::malformed_filter(
            "model reply contains no JSON object",
        ));
    };
    if end < start {
        return Err(ClaimscopeError::malformed_filter(
            "model reply contains no JSON object",
        ));
    }

    let value: Value = serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| ClaimscopeError::malformed_filter(format!("invalid JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| ClaimscopeError::malformed_filter("filter must be a JSON object"))?;

    let mut spec = FilterSpec::new();
    for (key, value) in object {
        match value {
            Value::String(s) => {
                if let Err(e) = spec.set(key, s) {
                    debug!("ignoring extracted filter: {e}");
                }
            }
            Value::Null => {}
            other => debug!("ignoring non-string filter value {key}={other}"),
        }
    }
    FilterEvaluator::compile(&spec)?;
    Ok(spec)
}

/// Extract filters for `question` using `generator`.
///
/// The mock generator uses [`keyword_filters`]. Any failure is logged and
/// yields an empty filter, so the question is still answered unfiltered.
pub async fn extract_filters(generator: &AnswerGenerator, question: &str) -> FilterSpec {
    if matches!(generator, AnswerGenerator::Mock) {
        return keyword_filters(question);
    }

    let reply = match generator.complete(&filter_extraction_prompt(question)).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("filter extraction failed: {e}");
            return FilterSpec::new();
        }
    };
    match parse_filter_response(&reply) {
        Ok(spec) => {
            debug!("extracted filters: {:?}", spec.applied());
            spec
        }
        Err(e) => {
            warn!("filter extraction failed: {e}");
            FilterSpec::new()
        }
    }
}
