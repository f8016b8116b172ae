//! Command implementations for the claimscope CLI.

use log::{debug, info};
use tokio::runtime::Runtime;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::Settings;
use crate::error::Result;
use crate::service::RetrievalService;

/// Execute a CLI command.
pub fn execute_command(args: ClaimscopeArgs) -> Result<()> {
    let settings = load_settings(&args)?;
    let runtime = Runtime::new()?;

    match &args.command {
        Command::Ingest(ingest_args) => runtime.block_on(ingest(ingest_args, settings, &args)),
        Command::Query(query_args) => runtime.block_on(query(query_args, settings, &args)),
        Command::Ask(ask_args) => runtime.block_on(ask(ask_args, settings, &args)),
        Command::Health => health(settings, &args),
    }
}

/// Settings from `--config`, then the environment, then `--index-dir`.
pub fn load_settings(args: &ClaimscopeArgs) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => {
            debug!("loading settings from {}", path.display());
            Settings::from_file(path)?
        }
        None => Settings::default(),
    };
    settings.apply_env()?;
    if let Some(dir) = &args.index_dir {
        settings.index_dir = dir.clone();
    }
    if let Command::Ask(AskArgs { llm: Some(kind), .. }) = &args.command {
        settings.llm.kind = *kind;
    }
    settings.validate()?;
    Ok(settings)
}

/// Open the service and load whatever has been persisted.
fn open_service(settings: Settings) -> Result<RetrievalService> {
    info!("opening index at {}", settings.index_dir.display());
    let service = RetrievalService::open(settings)?;
    service.restore()?;
    Ok(service)
}

async fn ingest(args: &IngestArgs, settings: Settings, cli_args: &ClaimscopeArgs) -> Result<()> {
    let service = RetrievalService::open(settings)?;
    let summary = service.ingest_csv(args.csv.as_deref()).await?;
    output_result("Ingest completed", &summary, cli_args)
}

async fn query(args: &QueryArgs, settings: Settings, cli_args: &ClaimscopeArgs) -> Result<()> {
    let filters = args.filters()?;
    let service = open_service(settings)?;
    let response = service.query(&args.query, args.k, filters.as_ref()).await?;
    output_result("Search completed", &response, cli_args)
}

async fn ask(args: &AskArgs, settings: Settings, cli_args: &ClaimscopeArgs) -> Result<()> {
    let service = open_service(settings)?;
    let response = service.ask(&args.question, args.k).await?;
    output_result("Answer", &response, cli_args)
}

fn health(settings: Settings, cli_args: &ClaimscopeArgs) -> Result<()> {
    let service = open_service(settings)?;
    output_result("Index health", &service.health(), cli_args)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;
    use crate::config::LlmKind;

    #[test]
    fn test_index_dir_flag_overrides_settings() {
        let args = ClaimscopeArgs::try_parse_from([
            "claimscope",
            "--index-dir",
            "/tmp/claims-index",
            "health",
        ])
        .unwrap();
        let settings = load_settings(&args).unwrap();
        assert_eq!(settings.index_dir, PathBuf::from("/tmp/claims-index"));
    }

    #[test]
    fn test_llm_flag_overrides_settings() {
        let args =
            ClaimscopeArgs::try_parse_from(["claimscope", "ask", "q", "--llm", "local"]).unwrap();
        let settings = load_settings(&args).unwrap();
        assert_eq!(settings.llm.kind, LlmKind::Local);
    }

    #[test]
    fn test_config_file_is_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"default_k": 9}"#).unwrap();

        let args = ClaimscopeArgs::try_parse_from([
            "claimscope",
            "--config",
            path.to_str().unwrap(),
            "health",
        ])
        .unwrap();
        assert_eq!(load_settings(&args).unwrap().default_k, 9);
    }
}
