//! Answer generation backends.

use std::time::Duration;

use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{LlmConfig, LlmKind};
use crate::document::Document;
use crate::error::{ClaimscopeError, Result};
use crate::generation::prompt::{
    SYSTEM_PROMPT, chat_user_prompt, inline_prompt, instruct_prompt,
};

const MOCK_EXCERPT_CHARS: usize = 200;
const LOCAL_MAX_TOKENS: u32 = 300;
const LOCAL_TEMPERATURE: f32 = 0.1;
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` route.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ChatCompletionClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClaimscopeError::generation(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: None,
        })
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat and return the first choice's text.
    pub async fn chat(&self, system: Option<&str>, user: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ClaimscopeError::generation(format!("chat request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ClaimscopeError::generation(format!("Failed to read response text: {e}"))
        })?;
        if !status.is_success() {
            return Err(ClaimscopeError::generation(format!(
                "chat API error (status {status}): {body}"
            )));
        }

        parse_chat_body(&body)
    }

    /// Check that the server answers `GET /models`.
    pub async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                ClaimscopeError::generation(format!("{} unreachable: {e}", self.base_url))
            })?;
        if !response.status().is_success() {
            return Err(ClaimscopeError::generation(format!(
                "{} answered {}",
                self.base_url,
                response.status()
            )));
        }
        Ok(())
    }
}

/// The first choice's text from a `/chat/completions` body.
fn parse_chat_body(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        ClaimscopeError::generation(format!("Failed to parse chat response: {e}"))
    })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ClaimscopeError::generation("chat response contained no message"))
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

/// Client for the Gemini `generateContent` route.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: String, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClaimscopeError::generation(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ClaimscopeError::generation(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            ClaimscopeError::generation(format!("Failed to read response text: {e}"))
        })?;
        if !status.is_success() {
            return Err(ClaimscopeError::generation(format!(
                "Gemini API error (status {status}): {text}"
            )));
        }

        parse_gemini_body(&text)
    }
}

/// The first candidate's parts, concatenated.
fn parse_gemini_body(body: &str) -> Result<String> {
    let parsed: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        ClaimscopeError::generation(format!("Failed to parse Gemini response: {e}"))
    })?;
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ClaimscopeError::generation("Gemini returned no candidates"))?;
    Ok(candidate
        .content
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join(""))
}

/// The configured answer generator.
#[derive(Debug, Clone)]
pub enum AnswerGenerator {
    /// Deterministic, offline.
    Mock,
    OpenAi(ChatCompletionClient),
    Gemini(GeminiClient),
    /// OpenAI-compatible server on the local machine.
    Local(ChatCompletionClient),
}

impl AnswerGenerator {
    pub fn kind(&self) -> LlmKind {
        match self {
            AnswerGenerator::Mock => LlmKind::Mock,
            AnswerGenerator::OpenAi(_) => LlmKind::OpenAi,
            AnswerGenerator::Gemini(_) => LlmKind::Gemini,
            AnswerGenerator::Local(_) => LlmKind::Local,
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            AnswerGenerator::Mock => "mock",
            AnswerGenerator::OpenAi(client) | AnswerGenerator::Local(client) => client.model(),
            AnswerGenerator::Gemini(client) => client.model(),
        }
    }

    /// Answer `query` from the retrieved `context`.
    pub async fn generate_answer(&self, query: &str, context: &[Document]) -> Result<String> {
        match self {
            AnswerGenerator::Mock => Ok(mock_answer(context)),
            AnswerGenerator::OpenAi(client) => {
                client
                    .chat(Some(SYSTEM_PROMPT), &chat_user_prompt(query, context))
                    .await
            }
            AnswerGenerator::Gemini(client) => client.generate(&inline_prompt(query, context)).await,
            AnswerGenerator::Local(client) => {
                client.chat(None, &instruct_prompt(query, context)).await
            }
        }
    }

    /// Raw completion of a standalone prompt.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        match self {
            AnswerGenerator::Mock => Ok("{}".to_string()),
            AnswerGenerator::OpenAi(client) | AnswerGenerator::Local(client) => {
                client.chat(None, prompt).await
            }
            AnswerGenerator::Gemini(client) => client.generate(prompt).await,
        }
    }
}

fn mock_answer(context: &[Document]) -> String {
    let Some(top) = context.first() else {
        return "**[MOCK ANSWER]** No matching claims were found for this question.".to_string();
    };
    let excerpt: String = top.text.chars().take(MOCK_EXCERPT_CHARS).collect();
    format!(
        "**[MOCK ANSWER]** Based on the retrieved records, here is the information.\n\n\
         I found {} related claims.\n\
         Top result: {excerpt}...",
        context.len()
    )
}

/// The generator chosen for a configuration.
#[derive(Debug, Clone)]
pub struct GeneratorSelection {
    pub generator: AnswerGenerator,
    pub requested: LlmKind,
    /// The requested backend was unavailable and the mock stands in.
    pub fell_back: bool,
}

/// Construct the generator named by `config`.
///
/// Missing credentials are an error. An unreachable local server falls back
/// to the mock generator only when `fallback_to_mock` is set.
pub async fn select_generator(config: &LlmConfig) -> Result<GeneratorSelection> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let requested = config.kind;
    info!("initializing answer generator: {requested}");

    let generator = match requested {
        LlmKind::Mock => AnswerGenerator::Mock,
        LlmKind::OpenAi => {
            let key = required_key(config.openai_api_key.as_ref(), "OPENAI_API_KEY")?;
            AnswerGenerator::OpenAi(ChatCompletionClient::new(
                &config.openai_base_url,
                Some(key),
                &config.openai_model,
                timeout,
            )?)
        }
        LlmKind::Gemini => {
            let key = required_key(config.gemini_api_key.as_ref(), "GEMINI_API_KEY")?;
            AnswerGenerator::Gemini(GeminiClient::new(
                &config.gemini_base_url,
                key,
                &config.gemini_model,
                timeout,
            )?)
        }
        LlmKind::Local => {
            let client =
                ChatCompletionClient::new(&config.local_base_url, None, &config.local_model, timeout)?
                    .with_sampling(LOCAL_TEMPERATURE, Some(LOCAL_MAX_TOKENS));
            match client.probe().await {
                Ok(()) => AnswerGenerator::Local(client),
                Err(e) if config.fallback_to_mock => {
                    warn!("local model server unavailable ({e}); falling back to mock generator");
                    return Ok(GeneratorSelection {
                        generator: AnswerGenerator::Mock,
                        requested,
                        fell_back: true,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    };

    Ok(GeneratorSelection {
        generator,
        requested,
        fell_back: false,
    })
}

fn required_key(key: Option<&String>, variable: &str) -> Result<String> {
    key.filter(|k| !k.trim().is_empty())
        .cloned()
        .ok_or_else(|| ClaimscopeError::invalid_config(format!("{variable} is not set")))
}
