//! Runtime configuration.
//!
//! Settings are resolved in three layers: an optional JSON file, then
//! environment variables, then command line flags. Every field has a
//! default so an empty file (or no file at all) is a valid configuration.
//!
//! ```
//! use claimscope::config::{LlmKind, Settings};
//!
//! let mut settings = Settings::default();
//! settings
//!     .apply_env_from(|key| match key {
//!         "LLM_TYPE" => Some("openai".to_string()),
//!         "OPENAI_API_KEY" => Some("sk-test".to_string()),
//!         _ => None,
//!     })
//!     .unwrap();
//!
//! assert_eq!(settings.llm.kind, LlmKind::OpenAi);
//! assert!(settings.validate().is_ok());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::embedding::hashing::DEFAULT_HASHING_DIMENSION;
use crate::error::{ClaimscopeError, Result};

pub const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
pub const ENV_LLM_TYPE: &str = "LLM_TYPE";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_INDEX_DIR: &str = "CLAIMSCOPE_INDEX_DIR";
pub const ENV_CLAIMS_CSV: &str = "CLAIMSCOPE_CLAIMS_CSV";

const HASHING_MODEL_PREFIX: &str = "hashing";

/// Top-level settings for a retrieval service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Source CSV used by `ingest` when no path is given.
    pub claims_csv: PathBuf,
    /// Directory holding the persisted artifacts.
    pub index_dir: PathBuf,
    /// Results returned when the caller does not choose `k`.
    pub default_k: usize,
    pub chunking: ChunkingConfig,
    pub embedder: EmbedderConfig,
    pub llm: LlmConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            claims_csv: PathBuf::from("sample_data/claims.csv"),
            index_dir: PathBuf::from("indexing_storage"),
            default_k: 5,
            chunking: ChunkingConfig::default(),
            embedder: EmbedderConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClaimscopeError::invalid_config(format!(
                "cannot read config file {}: {e}",
                path.display()
            ))
        })?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get(ENV_INDEX_DIR) {
            self.index_dir = PathBuf::from(dir);
        }
        if let Some(csv) = get(ENV_CLAIMS_CSV) {
            self.claims_csv = PathBuf::from(csv);
        }
        if let Some(kind) = get(ENV_LLM_TYPE) {
            self.llm.kind = kind.parse()?;
        }
        if let Some(key) = get(ENV_GEMINI_API_KEY) {
            self.llm.gemini_api_key = Some(key);
        }
        if let Some(model) = get(ENV_EMBEDDING_MODEL) {
            self.embedder = EmbedderConfig::from_model_name(&model)?;
        }
        if let Some(key) = get(ENV_OPENAI_API_KEY) {
            self.llm.openai_api_key = Some(key.clone());
            if let EmbedderConfig::OpenAi { api_key, .. } = &mut self.embedder
                && api_key.is_none()
            {
                *api_key = Some(key);
            }
        }
        Ok(())
    }

    /// Check the settings for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.default_k == 0 {
            return Err(ClaimscopeError::invalid_config("default_k must be positive"));
        }
        self.chunking.validate()?;
        self.embedder.validate()?;
        self.llm.validate()
    }
}

/// Character-window chunking of search documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ClaimscopeError::invalid_config("chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ClaimscopeError::invalid_config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Which embedding model turns text into vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbedderConfig {
    /// Offline feature-hashing embedder.
    Hashing { dimension: usize },
    /// OpenAI-compatible embeddings endpoint.
    OpenAi {
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default = "default_openai_base_url")]
        base_url: String,
        /// Requested output dimension; the model default when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dimension: Option<usize>,
    },
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        EmbedderConfig::Hashing {
            dimension: DEFAULT_HASHING_DIMENSION,
        }
    }
}

impl EmbedderConfig {
    /// Interpret a model name as given in `EMBEDDING_MODEL`.
    ///
    /// `hashing` and `hashing-<dim>` select the offline embedder; anything
    /// else is taken as an OpenAI embedding model.
    pub fn from_model_name(name: &str) -> Result<Self> {
        let name = name.trim();
        if let Some(rest) = name.strip_prefix(HASHING_MODEL_PREFIX) {
            let dimension = match rest.strip_prefix('-') {
                Some(dim) => dim.parse::<usize>().map_err(|_| {
                    ClaimscopeError::invalid_config(format!(
                        "invalid hashing embedder dimension in '{name}'"
                    ))
                })?,
                None if rest.is_empty() => DEFAULT_HASHING_DIMENSION,
                None => {
                    return Err(ClaimscopeError::invalid_config(format!(
                        "unknown embedding model '{name}'"
                    )));
                }
            };
            return Ok(EmbedderConfig::Hashing { dimension });
        }
        Ok(EmbedderConfig::OpenAi {
            model: name.to_string(),
            api_key: None,
            base_url: default_openai_base_url(),
            dimension: None,
        })
    }

    /// Model identifier reported by `health`.
    pub fn model_name(&self) -> String {
        match self {
            EmbedderConfig::Hashing { dimension } => format!("{HASHING_MODEL_PREFIX}-{dimension}"),
            EmbedderConfig::OpenAi { model, .. } => model.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            EmbedderConfig::Hashing { dimension: 0 }
            | EmbedderConfig::OpenAi {
                dimension: Some(0),
                ..
            } => Err(ClaimscopeError::invalid_config(
                "embedding dimension must be positive",
            )),
            EmbedderConfig::OpenAi { model, .. } if model.trim().is_empty() => Err(
                ClaimscopeError::invalid_config("embedding model name is empty"),
            ),
            _ => Ok(()),
        }
    }
}

/// Answer generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmKind {
    #[default]
    Mock,
    OpenAi,
    Gemini,
    Local,
}

impl FromStr for LlmKind {
    type Err = ClaimscopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(LlmKind::Mock),
            "openai" | "open_ai" => Ok(LlmKind::OpenAi),
            "gemini" => Ok(LlmKind::Gemini),
            "local" | "gpt4all" => Ok(LlmKind::Local),
            other => Err(ClaimscopeError::invalid_config(format!(
                "unknown LLM type '{other}' (expected mock, openai, gemini or local)"
            ))),
        }
    }
}

impl fmt::Display for LlmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmKind::Mock => "mock",
            LlmKind::OpenAi => "openai",
            LlmKind::Gemini => "gemini",
            LlmKind::Local => "local",
        };
        f.write_str(name)
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub kind: LlmKind,
    pub openai_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub gemini_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub local_model: String,
    pub local_base_url: String,
    /// Use the mock generator when the local server cannot be reached.
    pub fallback_to_mock: bool,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            kind: LlmKind::Mock,
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            local_model: "orca-mini-3b-gguf2-q4_0.gguf".to_string(),
            local_base_url: "http://127.0.0.1:4891/v1".to_string(),
            fallback_to_mock: true,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ClaimscopeError::invalid_config("timeout_secs must be positive"));
        }
        Ok(())
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.chunk_size, 500);
        assert_eq!(settings.chunking.chunk_overlap, 50);
        assert_eq!(
            settings.embedder,
            EmbedderConfig::Hashing { dimension: 384 }
        );
        assert_eq!(settings.llm.kind, LlmKind::Mock);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"default_k": 3, "embedder": {"type": "hashing", "dimension": 16}}"#)
                .unwrap();
        assert_eq!(settings.default_k, 3);
        assert_eq!(settings.embedder, EmbedderConfig::Hashing { dimension: 16 });
        assert_eq!(settings.chunking, ChunkingConfig::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claimscope.json");
        std::fs::write(&path, r#"{"llm": {"kind": "gemini"}}"#).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.llm.kind, LlmKind::Gemini);
        assert_eq!(settings.llm.gemini_model, "gemini-1.5-flash");

        assert!(Settings::from_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env_from(lookup(&[
                (ENV_EMBEDDING_MODEL, "text-embedding-3-small"),
                (ENV_OPENAI_API_KEY, "sk-abc"),
                (ENV_LLM_TYPE, "gpt4all"),
                (ENV_INDEX_DIR, "/tmp/claims-index"),
            ]))
            .unwrap();

        assert_eq!(settings.llm.kind, LlmKind::Local);
        assert_eq!(settings.index_dir, PathBuf::from("/tmp/claims-index"));
        assert_eq!(settings.llm.openai_api_key.as_deref(), Some("sk-abc"));
        match &settings.embedder {
            EmbedderConfig::OpenAi { model, api_key, .. } => {
                assert_eq!(model, "text-embedding-3-small");
                assert_eq!(api_key.as_deref(), Some("sk-abc"));
            }
            other => panic!("unexpected embedder {other:?}"),
        }
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut settings = Settings::default();
        settings
            .apply_env_from(lookup(&[(ENV_LLM_TYPE, "  ")]))
            .unwrap();
        assert_eq!(settings.llm.kind, LlmKind::Mock);
    }

    #[test]
    fn test_unknown_llm_type_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env_from(lookup(&[(ENV_LLM_TYPE, "claude-in-a-box")]))
            .unwrap_err();
        assert!(matches!(err, ClaimscopeError::InvalidConfig(_)));
    }

    #[test]
    fn test_hashing_model_names() {
        assert_eq!(
            EmbedderConfig::from_model_name("hashing").unwrap(),
            EmbedderConfig::Hashing { dimension: 384 }
        );
        assert_eq!(
            EmbedderConfig::from_model_name("hashing-64").unwrap(),
            EmbedderConfig::Hashing { dimension: 64 }
        );
        assert!(EmbedderConfig::from_model_name("hashing-x").is_err());
        assert_eq!(
            EmbedderConfig::Hashing { dimension: 64 }.model_name(),
            "hashing-64"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.chunking.chunk_overlap = 500;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.embedder = EmbedderConfig::Hashing { dimension: 0 };
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.default_k = 0;
        assert!(settings.validate().is_err());
    }
}
