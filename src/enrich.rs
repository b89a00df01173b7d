//! LM enrichment of identifier text.
//!
//! The chat client renders a fixed prompt, asks an OpenAI-compatible
//! `/chat/completions` endpoint for a zero-temperature reply, and parses the
//! reply as `{"analysis": ..., "sentiment": ...}`.
//!
//! # Failure Handling
//!
//! [`Enricher::enrich`] never fails. Transport errors, non-success statuses
//! and unparseable replies all collapse into [`EnrichmentResult::fallback`],
//! so the pipeline always has something well-formed to store.
//!
//! A reply that is a JSON object but lacks one of the keys is *not* a
//! failure: the missing field is simply absent and is stored as NULL.
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use ureq::Agent;

/// Analysis text stored when enrichment fails.
pub const FALLBACK_ANALYSIS: &str = "AI processing failed";
/// Sentiment stored when enrichment fails.
pub const FALLBACK_SENTIMENT: &str = "neutral";

const ENRICHMENT_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/enrichment.md"
));

/// Upper bound on response text quoted in error descriptions.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// Summary and sentiment derived from a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub analysis: Option<String>,
    pub sentiment: Option<String>,
    pub error: Option<String>,
}

impl EnrichmentResult {
    /// Degraded result recorded when the LM could not produce an answer.
    pub fn fallback(error: impl Into<String>) -> Self {
        Self {
            analysis: Some(FALLBACK_ANALYSIS.to_string()),
            sentiment: Some(FALLBACK_SENTIMENT.to_string()),
            error: Some(error.into()),
        }
    }
}

/// Derives a summary and sentiment from text. Must not fail.
pub trait Enricher: Send + Sync {
    fn enrich(&self, text: &str) -> EnrichmentResult;
}

/// Connection settings for [`ChatEnricher`].
#[derive(Debug, Clone)]
pub struct ChatEnricherConfig {
    /// Full URL of the chat completions endpoint.
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// Enricher backed by an OpenAI-compatible chat completions API.
pub struct ChatEnricher {
    agent: Agent,
    config: ChatEnricherConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl ChatEnricher {
    pub fn new(config: ChatEnricherConfig) -> Self {
        // Non-2xx statuses are read so the error carries the service's message.
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent, config }
    }

    fn try_enrich(&self, text: &str) -> Result<EnrichmentResult> {
        let prompt = build_prompt(text);
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.0,
        };

        let start = Instant::now();
        let mut response = self
            .agent
            .post(self.config.url.as_str())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send_json(&request)
            .context("send chat completion request")?;
        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .context("read chat completion response")?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = body.len(),
            status = status.as_u16(),
            "lm invoke complete"
        );

        if !status.is_success() {
            return Err(anyhow!(
                "chat completion failed with status {}: {}",
                status.as_u16(),
                truncate_string(body.trim(), MAX_ERROR_BODY_BYTES)
            ));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).context("parse chat completion response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no message content"))?;
        parse_enrichment(&content)
    }
}

impl Enricher for ChatEnricher {
    fn enrich(&self, text: &str) -> EnrichmentResult {
        match self.try_enrich(text) {
            Ok(result) => result,
            Err(err) => {
                let description = format!("{err:#}");
                tracing::warn!(error = %description, "enrichment failed; using fallback");
                EnrichmentResult::fallback(description)
            }
        }
    }
}

/// Render the enrichment prompt for `text`.
pub fn build_prompt(text: &str) -> String {
    ENRICHMENT_PROMPT.replace("{text}", text)
}

/// Parse the LM's message content into an [`EnrichmentResult`].
pub fn parse_enrichment(content: &str) -> Result<EnrichmentResult> {
    let cleaned = strip_code_fences(content);
    let value: Value =
        serde_json::from_str(&cleaned).context("enrichment reply is not valid JSON")?;
    let Value::Object(fields) = value else {
        return Err(anyhow!("enrichment reply is not a JSON object"));
    };
    Ok(EnrichmentResult {
        analysis: field_text(&fields, "analysis"),
        sentiment: field_text(&fields, "sentiment"),
        error: None,
    })
}

fn field_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines
        .first()
        .is_some_and(|first| first.trim_start().starts_with("```"))
    {
        lines.remove(0);
    }
    if lines
        .last()
        .is_some_and(|last| last.trim_start().starts_with("```"))
    {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
#[path = "enrich_tests.rs"]
mod tests;
