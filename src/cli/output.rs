//! Output formatting for CLI commands.

use serde::Serialize;
use serde_json::Value;

use crate::cli::args::{ClaimscopeArgs, OutputFormat};
use crate::error::Result;
use crate::service::{AnswerResponse, Health, IngestSummary, QueryResponse};

/// Longest excerpt printed per hit in human output.
const EXCERPT_CHARS: usize = 240;

/// Results that can be printed for people as well as serialized.
pub trait HumanOutput: Serialize {
    fn print_human(&self, args: &ClaimscopeArgs);
}

/// Output a result in the requested format.
pub fn output_result<T: HumanOutput>(message: &str, result: &T, args: &ClaimscopeArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!("{message}");
                println!();
            }
            result.print_human(args);
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &ClaimscopeArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

impl HumanOutput for IngestSummary {
    fn print_human(&self, _args: &ClaimscopeArgs) {
        println!("Records: {}", self.num_records);
        println!("Chunks: {}", self.num_chunks);
        println!("Duration: {}", format_millis(self.duration_ms));
    }
}

impl HumanOutput for QueryResponse {
    fn print_human(&self, args: &ClaimscopeArgs) {
        println!("Search Results:");
        println!("═══════════════");

        if !self.applied_filters.is_empty() {
            println!("Filters: {}", format_filters(&self.applied_filters));
        }

        for (i, hit) in self.results.iter().enumerate() {
            println!();
            println!("Result {}: (Distance: {:.4})", i + 1, hit.distance);
            println!("─────────────");
            println!("id: {}", hit.document.id);
            println!("{}", excerpt(&hit.document.text));
            if args.verbosity() > 1 {
                for (key, value) in &hit.document.metadata {
                    println!("  {key}: {value}");
                }
            }
        }

        println!();
        println!("Total hits: {}", self.results.len());
        println!("Strategy: {}", format_value(&serde_json::to_value(self.strategy).unwrap_or(Value::Null)));
        println!("Search time: {}", format_millis(self.search_time_ms));
    }
}

impl HumanOutput for AnswerResponse {
    fn print_human(&self, args: &ClaimscopeArgs) {
        println!("{}", self.answer);
        println!();

        if !self.applied_filters.is_empty() {
            println!("Filters: {}", format_filters(&self.applied_filters));
        }
        println!("Sources:");
        for source in &self.sources {
            println!(
                "  {} (claim {}, distance {:.4})",
                source.doc_id,
                source.claim_id.as_deref().unwrap_or("unknown"),
                source.retrieval_score
            );
            if args.verbosity() > 1 {
                println!("    {}", excerpt(&source.excerpt));
            }
        }

        println!();
        let backend = if self.llm_fell_back {
            format!("{} (fallback)", self.llm)
        } else {
            self.llm.to_string()
        };
        println!("LLM: {backend} ({})", self.llm_model);
        println!("Embedding model: {}", self.embedding_model);
        println!("Latency: {}", format_millis(self.latency_ms));
    }
}

impl HumanOutput for Health {
    fn print_human(&self, _args: &ClaimscopeArgs) {
        println!("Ready: {}", yes_no(self.ready));
        println!("Documents: {}", self.corpus_size);
        println!("Filtering available: {}", yes_no(self.filtering_available));
        println!("Embedding model: {}", self.embedding_model);
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn format_filters(filters: &std::collections::BTreeMap<String, String>) -> String {
    filters
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shorten `text` to at most `EXCERPT_CHARS` characters.
fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    }
}

/// Format a JSON value for display.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        Value::Object(_) => "[object]".to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Format milliseconds for people.
fn format_millis(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{ms:.1}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(12.34), "12.3ms");
        assert_eq!(format_millis(1500.0), "1.50s");
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short"), "short");
        let long = "é".repeat(EXCERPT_CHARS + 10);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::String("filtered_scan".to_string())), "filtered_scan");
        assert_eq!(format_value(&serde_json::json!([1, 2])), "[1, 2]");
        assert_eq!(format_value(&Value::Null), "null");
    }

    #[test]
    fn test_format_filters() {
        let mut filters = std::collections::BTreeMap::new();
        filters.insert("status".to_string(), "Denied".to_string());
        filters.insert("specialty".to_string(), "Cardiology".to_string());
        assert_eq!(format_filters(&filters), "specialty=Cardiology, status=Denied");
    }
}
