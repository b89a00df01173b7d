//! Random-identifier source client.
//!
//! Each call is a single `GET` with a global deadline. Every failure mode
//! (transport, status, body shape) comes back as an `Err` so the pipeline can
//! record it and move on to the next iteration.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use ureq::Agent;

/// Supplies a fresh opaque identifier on every call.
pub trait IdentifierSource: Send + Sync {
    fn fetch_identifier(&self) -> Result<String>;
}

#[derive(Deserialize)]
struct UuidBody {
    uuid: String,
}

/// Identifier source backed by an HTTP endpoint returning `{"uuid": "..."}`.
pub struct HttpIdentifierSource {
    agent: Agent,
    url: String,
}

impl HttpIdentifierSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            url: url.into(),
        }
    }
}

impl IdentifierSource for HttpIdentifierSource {
    fn fetch_identifier(&self) -> Result<String> {
        let start = Instant::now();
        let mut response = self
            .agent
            .get(self.url.as_str())
            .call()
            .with_context(|| format!("fetch identifier from {}", self.url))?;
        let body: UuidBody = response
            .body_mut()
            .read_json()
            .context("parse identifier response")?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "identifier fetched"
        );
        Ok(body.uuid)
    }
}
