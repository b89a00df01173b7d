//! Process-wide pipeline configuration.
//!
//! Everything here is resolved once at startup (CLI flags with environment
//! fallbacks) and validated before any collaborator is built, so a bad value
//! stops the process instead of failing the first request.
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Number of identifier/enrich/store iterations performed per request.
pub const FAN_OUT: usize = 3;

/// Default SQLite file holding the `results` table.
pub const DEFAULT_DB_PATH: &str = "pipeline.db";
/// Default random-identifier endpoint.
pub const DEFAULT_IDENTIFIER_URL: &str = "https://httpbin.org/uuid";
/// Default identifier fetch timeout, in seconds.
pub const DEFAULT_IDENTIFIER_TIMEOUT_SECS: u64 = 5;
/// Default base URL of the OpenAI-compatible chat API.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Default chat model used for enrichment.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default chat completion timeout, in seconds.
pub const DEFAULT_ENRICH_TIMEOUT_SECS: u64 = 60;
/// Recipient that is always notified in addition to the requester.
pub const DEFAULT_AUDIT_RECIPIENT: &str = "24f2008315@ds.study.iitm.ac.in";
/// Default listen address for `serve`.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Resolved settings for the identifier source, enrichment client and store.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub db_path: PathBuf,
    pub identifier_url: String,
    pub identifier_timeout: Duration,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub enrich_timeout: Duration,
    pub audit_recipient: String,
}

impl PipelineConfig {
    /// Full chat completions URL derived from the configured API base.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

/// Reject settings that could only fail later, at request time.
pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    validate_http_url(&config.identifier_url, "identifier_url")?;
    validate_http_url(&config.api_base, "api_base")?;
    if config.identifier_timeout.is_zero() {
        return Err(anyhow!("identifier timeout must be greater than zero"));
    }
    if config.enrich_timeout.is_zero() {
        return Err(anyhow!("enrich timeout must be greater than zero"));
    }
    if config.model.trim().is_empty() {
        return Err(anyhow!("model must be non-empty"));
    }
    if config.api_key.trim().is_empty() {
        return Err(anyhow!("OPENAI_API_KEY must be non-empty"));
    }
    if config.db_path.as_os_str().is_empty() {
        return Err(anyhow!("db_path must be non-empty"));
    }
    Ok(())
}

fn validate_http_url(url: &str, label: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(());
    }
    Err(anyhow!("{label} must be an http(s) URL (got {url:?})"))
}

#[cfg(test)]
pub(crate) fn test_config() -> PipelineConfig {
    PipelineConfig {
        db_path: PathBuf::from(DEFAULT_DB_PATH),
        identifier_url: DEFAULT_IDENTIFIER_URL.to_string(),
        identifier_timeout: Duration::from_secs(DEFAULT_IDENTIFIER_TIMEOUT_SECS),
        api_base: DEFAULT_API_BASE.to_string(),
        api_key: "sk-test".to_string(),
        model: DEFAULT_MODEL.to_string(),
        enrich_timeout: Duration::from_secs(DEFAULT_ENRICH_TIMEOUT_SECS),
        audit_recipient: DEFAULT_AUDIT_RECIPIENT.to_string(),
    }
}
