//! Ollama text-generation backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use tessera_core::{Document, Error, GeneratedSuggestion, Result, TextGenerator};

use crate::prompts::{answer_lines, enhancement_prompt, parse_generated, ENHANCE_SYSTEM_PROMPT};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = tessera_core::defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = tessera_core::defaults::GEN_MODEL;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = tessera_core::defaults::GEN_TIMEOUT_SECS;

/// Ollama generator using the `/api/chat` endpoint.
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    gen_model: String,
    gen_timeout_secs: u64,
}

impl OllamaGenerator {
    /// Create a generator with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL.to_string(), DEFAULT_GEN_MODEL.to_string())
    }

    /// Create a generator for a specific endpoint and model.
    pub fn with_config(base_url: String, gen_model: String) -> Result<Self> {
        let gen_timeout = std::env::var("TESSERA_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(GEN_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing Ollama generator: url={}, gen={}",
            base_url, gen_model
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            gen_model,
            gen_timeout_secs: gen_timeout,
        })
    }

    /// Create from environment variables (`OLLAMA_BASE`, `OLLAMA_GEN_MODEL`).
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_model =
            std::env::var("OLLAMA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        Self::with_config(base_url, gen_model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One non-streaming chat round trip; returns the assistant content.
    async fn chat(&self, system: &str, prompt: &str, json: bool) -> Result<String> {
        let start = Instant::now();

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
            format: json.then(|| serde_json::Value::String("json".to_string())),
            think: json.then_some(false),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Enrichment(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Enrichment(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Enrichment(format!("Failed to parse response: {}", e)))?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = result.message.content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(result.message.content)
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// `"json"` forces a syntactically valid JSON answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    #[instrument(skip(self, document), fields(subsystem = "inference", component = "ollama", op = "enhance", model = %self.gen_model, doc_id = %document.id))]
    async fn enhance(&self, document: &Document) -> Result<GeneratedSuggestion> {
        let answer = self
            .chat(ENHANCE_SYSTEM_PROMPT, &enhancement_prompt(document), true)
            .await?;
        parse_generated(&answer)
    }

    #[instrument(skip(self, prompt), fields(subsystem = "inference", component = "ollama", op = "generate_freeform", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_freeform(&self, prompt: &str) -> Result<Vec<String>> {
        let answer = self.chat("", prompt, false).await?;
        Ok(answer_lines(&answer))
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}
