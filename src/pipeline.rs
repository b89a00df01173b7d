//! Request orchestration: fetch, enrich, store, notify.
//!
//! A run performs [`FAN_OUT`] strictly sequential iterations. The stages fail
//! differently on purpose:
//!
//! - identifier fetch: the failure becomes an entry in `errors` and the
//!   iteration is skipped;
//! - enrichment: cannot fail, a degraded result is stored instead;
//! - storage: the error propagates and the whole run fails, since a lost
//!   write must not look like success.
use crate::config::{PipelineConfig, FAN_OUT};
use crate::enrich::{ChatEnricher, ChatEnricherConfig, Enricher};
use crate::identifier::{HttpIdentifierSource, IdentifierSource};
use crate::notify::{LogNotifier, Notifier};
use crate::store::{NewRecord, ResultStore};
use crate::util::utc_timestamp;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of `POST /pipeline`.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineRequest {
    /// Notification target.
    pub email: String,
    /// Tag stored on every record created by this request.
    pub source: String,
}

/// One successful iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineItem {
    pub original: String,
    pub analysis: Option<String>,
    pub sentiment: Option<String>,
    pub stored: bool,
    pub timestamp: String,
}

/// Aggregated report returned for a request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResponse {
    pub items: Vec<PipelineItem>,
    pub notification_sent: bool,
    pub processed_at: String,
    pub errors: Vec<String>,
}

/// The collaborators a run needs, built once per process.
pub struct Pipeline {
    identifiers: Arc<dyn IdentifierSource>,
    enricher: Arc<dyn Enricher>,
    store: ResultStore,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(
        identifiers: Arc<dyn IdentifierSource>,
        enricher: Arc<dyn Enricher>,
        store: ResultStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            identifiers,
            enricher,
            store,
            notifier,
        }
    }

    /// Wire the HTTP identifier source, chat enricher, SQLite store and log
    /// notifier described by `config`. Fails if the store cannot be opened.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let store = ResultStore::open(&config.db_path)?;
        let identifiers =
            HttpIdentifierSource::new(config.identifier_url.clone(), config.identifier_timeout);
        let enricher = ChatEnricher::new(ChatEnricherConfig {
            url: config.chat_completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: config.enrich_timeout,
        });
        let notifier = LogNotifier::new(config.audit_recipient.clone());
        Ok(Self::new(
            Arc::new(identifiers),
            Arc::new(enricher),
            store,
            Arc::new(notifier),
        ))
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run the fixed fan-out for one request.
    pub fn run(&self, request: &PipelineRequest) -> Result<PipelineResponse> {
        let mut items = Vec::with_capacity(FAN_OUT);
        let mut errors = Vec::new();

        for iteration in 1..=FAN_OUT {
            let original = match self.identifiers.fetch_identifier() {
                Ok(identifier) => identifier,
                Err(err) => {
                    let description = format!("{err:#}");
                    tracing::warn!(iteration, error = %description, "identifier fetch failed");
                    errors.push(description);
                    continue;
                }
            };

            let enrichment = self.enricher.enrich(&original);
            let timestamp = self.store.store(&NewRecord {
                original: &original,
                analysis: enrichment.analysis.as_deref(),
                sentiment: enrichment.sentiment.as_deref(),
                source: &request.source,
            })?;

            items.push(PipelineItem {
                original,
                analysis: enrichment.analysis,
                sentiment: enrichment.sentiment,
                stored: true,
                timestamp,
            });
        }

        self.notifier.notify(&request.email);
        tracing::info!(
            items = items.len(),
            errors = errors.len(),
            source = %request.source,
            "pipeline run complete"
        );

        Ok(PipelineResponse {
            items,
            notification_sent: true,
            processed_at: utc_timestamp(),
            errors,
        })
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
