//! Command line argument parsing for the claimscope CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::LlmKind;
use crate::error::Result;
use crate::filter::FilterSpec;

/// claimscope - semantic search and question answering over insurance claims
#[derive(Parser, Debug, Clone)]
#[command(name = "claimscope")]
#[command(about = "Semantic search and question answering over insurance claims")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct ClaimscopeArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Settings file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted index
    #[arg(long, value_name = "INDEX_DIR", global = true)]
    pub index_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl ClaimscopeArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Chunk, embed and index a claims CSV
    Ingest(IngestArgs),

    /// Retrieve the claims closest to a query
    Query(QueryArgs),

    /// Answer a question from the retrieved claims
    Ask(AskArgs),

    /// Show index status
    Health,
}

/// Arguments for ingesting claims
#[derive(Parser, Debug, Clone)]
pub struct IngestArgs {
    /// Claims CSV (defaults to the configured path)
    #[arg(value_name = "CSV_FILE")]
    pub csv: Option<PathBuf>,
}

/// Arguments for a retrieval query
#[derive(Parser, Debug, Clone)]
pub struct QueryArgs {
    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results to return
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Earliest claim date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Latest claim date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Claim status, case-insensitive
    #[arg(long)]
    pub status: Option<String>,

    /// Provider specialty, case-insensitive
    #[arg(long)]
    pub specialty: Option<String>,

    /// Doctor name, case-insensitive
    #[arg(long)]
    pub doctor_name: Option<String>,

    /// Claim id, case-insensitive
    #[arg(long)]
    pub claim_id: Option<String>,

    /// Filters as a JSON object; individual flags take precedence
    #[arg(long, value_name = "JSON")]
    pub filter_json: Option<String>,
}

impl QueryArgs {
    /// Combine `--filter-json` and the individual filter flags.
    ///
    /// Returns `None` when no constraint was given.
    pub fn filters(&self) -> Result<Option<FilterSpec>> {
        let mut spec = match &self.filter_json {
            Some(json) => FilterSpec::from_json_str(json)?,
            None => FilterSpec::new(),
        };
        let flags = [
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
            ("status", &self.status),
            ("specialty", &self.specialty),
            ("doctor_name", &self.doctor_name),
            ("claim_id", &self.claim_id),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                spec.set(key, value)?;
            }
        }
        Ok((!spec.is_empty()).then_some(spec))
    }
}

/// Arguments for question answering
#[derive(Parser, Debug, Clone)]
pub struct AskArgs {
    /// Natural language question
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// Number of claims to retrieve as context
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Answer backend, overriding the configured one
    #[arg(long, value_parser = parse_llm_kind)]
    pub llm: Option<LlmKind>,
}

fn parse_llm_kind(value: &str) -> std::result::Result<LlmKind, String> {
    value.parse().map_err(|e| format!("{e}"))
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_query_command() {
        let args = ClaimscopeArgs::try_parse_from([
            "claimscope",
            "query",
            "cardiology denials",
            "-k",
            "3",
            "--status",
            "denied",
            "--start-date",
            "2023-01-01",
        ])
        .unwrap();

        if let Command::Query(query_args) = args.command {
            assert_eq!(query_args.query, "cardiology denials");
            assert_eq!(query_args.k, Some(3));
            let filters = query_args.filters().unwrap().unwrap();
            assert_eq!(filters.get("status"), Some("denied"));
            assert_eq!(filters.get("start_date"), Some("2023-01-01"));
        } else {
            panic!("Expected Query command");
        }
    }

    #[test]
    fn test_query_without_filters() {
        let args = ClaimscopeArgs::try_parse_from(["claimscope", "query", "asthma"]).unwrap();
        if let Command::Query(query_args) = args.command {
            assert!(query_args.filters().unwrap().is_none());
        } else {
            panic!("Expected Query command");
        }
    }

    #[test]
    fn test_filter_json_merges_with_flags() {
        let args = ClaimscopeArgs::try_parse_from([
            "claimscope",
            "query",
            "x",
            "--filter-json",
            r#"{"status": "Approved", "specialty": "Pediatrics"}"#,
            "--status",
            "Denied",
        ])
        .unwrap();
        if let Command::Query(query_args) = args.command {
            let filters = query_args.filters().unwrap().unwrap();
            assert_eq!(filters.get("status"), Some("Denied"));
            assert_eq!(filters.get("specialty"), Some("Pediatrics"));
        } else {
            panic!("Expected Query command");
        }
    }

    #[test]
    fn test_malformed_filter_json() {
        let args = ClaimscopeArgs::try_parse_from([
            "claimscope",
            "query",
            "x",
            "--filter-json",
            r#"{"amount": "5"}"#,
        ])
        .unwrap();
        if let Command::Query(query_args) = args.command {
            assert!(query_args.filters().is_err());
        } else {
            panic!("Expected Query command");
        }
    }

    #[test]
    fn test_ask_command() {
        let args = ClaimscopeArgs::try_parse_from([
            "claimscope",
            "ask",
            "why was CLM-1 denied?",
            "--llm",
            "gemini",
        ])
        .unwrap();
        if let Command::Ask(ask_args) = args.command {
            assert_eq!(ask_args.llm, Some(LlmKind::Gemini));
        } else {
            panic!("Expected Ask command");
        }
        assert!(ClaimscopeArgs::try_parse_from(["claimscope", "ask", "q", "--llm", "bard"]).is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        let args = ClaimscopeArgs::try_parse_from(["claimscope", "health"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = ClaimscopeArgs::try_parse_from(["claimscope", "-vv", "health"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = ClaimscopeArgs::try_parse_from(["claimscope", "health", "--quiet"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            ClaimscopeArgs::try_parse_from(["claimscope", "--format", "json", "health"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
    }
}
