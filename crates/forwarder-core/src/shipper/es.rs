//! Elasticsearch shipper: enrichment, buffering, bulk flushing, replay.
//!
//! Documents are buffered as create actions and flushed in one bulk call
//! when the buffer reaches the configured threshold (or on an explicit
//! flush). After any flush the buffer is empty, partial failure included;
//! rejected actions are handed to the replay handler one by one with the
//! output's connection parameters so a later invocation can retry them.
//!
//! # Dataset discovery
//!
//! The target index is resolved once per invocation, before the first send:
//!
//! - a configured name already following `logs-<dataset>-<namespace>` is
//!   taken as an explicit routing decision and parsed directly;
//! - any other non-empty name means pass-through: the literal index is used
//!   and the document carries no dataset enrichment at all;
//! - an empty name classifies the triggering object key against the rule
//!   table, falling back to `generic`/`default`.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::ElasticsearchOutput;
use crate::dataset;
use crate::error::Error;
use crate::replay::ReplayHandler;
use crate::shipper::client::{BulkAction, BulkClient};
use crate::shipper::EventIdGenerator;

/// Tags attached to every document, ahead of the dataset tag and the
/// output's configured tags.
const BASE_TAGS: [&str; 2] = ["preserve_original_event", "forwarded"];

/// Buffering shipper for one Elasticsearch output.
pub struct ElasticsearchShipper {
    output: ElasticsearchOutput,
    client: Arc<dyn BulkClient>,
    dataset: String,
    namespace: String,
    es_index: String,
    tags: Vec<String>,
    bulk_actions: Vec<BulkAction>,
    batch_max_actions: usize,
    event_id_generator: Option<EventIdGenerator>,
    replay_handler: Option<Arc<dyn ReplayHandler>>,
    dataset_discovered: bool,
}

impl ElasticsearchShipper {
    #[must_use]
    pub fn new(output: ElasticsearchOutput, client: Arc<dyn BulkClient>) -> Self {
        ElasticsearchShipper {
            es_index: output.es_index_or_datastream_name.clone(),
            tags: output.tags.clone(),
            batch_max_actions: output.batch_max_actions,
            output,
            client,
            dataset: String::new(),
            namespace: String::new(),
            bulk_actions: Vec::new(),
            event_id_generator: None,
            replay_handler: None,
            dataset_discovered: false,
        }
    }

    pub fn set_event_id_generator(&mut self, generator: EventIdGenerator) {
        self.event_id_generator = Some(generator);
    }

    pub fn set_replay_handler(&mut self, handler: Arc<dyn ReplayHandler>) {
        self.replay_handler = Some(handler);
    }

    /// Resolves (dataset, namespace, index) for this invocation.
    ///
    /// Idempotent: the first call caches the result, later calls are no-ops.
    pub fn discover_dataset(&mut self, trigger_event: &Value) {
        if self.dataset_discovered {
            return;
        }
        self.dataset_discovered = true;

        let configured = &self.output.es_index_or_datastream_name;
        if let Some((discovered_dataset, discovered_namespace)) =
            dataset::parse_index_name(configured)
        {
            // Explicit override by the config author; key rules are skipped.
            self.dataset = discovered_dataset;
            self.namespace = discovered_namespace;
        } else if !configured.is_empty() {
            // Pass-through: literal index, no dataset enrichment.
            self.dataset = String::new();
            self.namespace = String::new();
        } else {
            let object_key = dataset::object_key_from_trigger(trigger_event);
            self.dataset = object_key
                .as_deref()
                .and_then(dataset::dataset_for_object_key)
                .unwrap_or(dataset::GENERIC_DATASET)
                .to_string();
            self.namespace = dataset::DEFAULT_NAMESPACE.to_string();
            self.es_index = format!("logs-{}-{}", self.dataset, self.namespace);
        }

        debug!(
            dataset = %self.dataset,
            namespace = %self.namespace,
            es_index = %self.es_index,
            "dataset discovered"
        );
    }

    /// Enriches, buffers, and - once the buffer reaches the threshold -
    /// flushes the document.
    pub async fn send(&mut self, event: &Value) -> Result<(), Error> {
        if self.es_index.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let mut document = event.clone();
        self.enrich(&mut document)?;

        let id = self
            .event_id_generator
            .and_then(|generate| generate(&document))
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        self.bulk_actions.push(BulkAction {
            index: self.es_index.clone(),
            id,
            document,
        });

        if self.batch_max_actions > 0 && self.bulk_actions.len() < self.batch_max_actions {
            return Ok(());
        }
        self.flush().await
    }

    /// Performs one bulk call over the whole buffer.
    ///
    /// The buffer is cleared unconditionally, partial failure included; an
    /// empty buffer is a no-op. Rejected actions go to the replay handler;
    /// the flush itself still reports success in that case.
    pub async fn flush(&mut self) -> Result<(), Error> {
        if self.bulk_actions.is_empty() {
            return Ok(());
        }
        let actions = std::mem::take(&mut self.bulk_actions);

        let failures = self.client.bulk(&actions).await?;
        if failures.is_empty() {
            return Ok(());
        }
        warn!(
            rejected = failures.len(),
            total = actions.len(),
            "bulk call rejected some actions"
        );

        let Some(replay_handler) = &self.replay_handler else {
            error!(
                rejected = failures.len(),
                "no replay handler set, dropping rejected documents"
            );
            return Ok(());
        };
        let output_args = serde_json::to_value(&self.output)
            .map_err(|e| Error::ReplayEnqueue(e.to_string()))?;
        for action in &actions {
            if failures.iter().any(|failure| failure.id == action.id) {
                if let Err(e) = replay_handler
                    .replay("elasticsearch", &output_args, &action.document)
                    .await
                {
                    error!(error = %e, id = %action.id, "failed to enqueue document for replay");
                }
            }
        }
        Ok(())
    }

    /// Adds routing, event metadata, and tags to the document in place.
    fn enrich(&self, document: &mut Value) -> Result<(), Error> {
        let original = document
            .pointer("/fields/message")
            .and_then(Value::as_str)
            .ok_or(Error::MalformedDocument("missing fields.message"))?
            .to_string();
        let root = document
            .as_object_mut()
            .ok_or(Error::MalformedDocument("document is not an object"))?;

        if !self.dataset.is_empty() {
            root.insert(
                "data_stream".to_string(),
                json!({
                    "type": "logs",
                    "dataset": self.dataset,
                    "namespace": self.namespace,
                }),
            );
        }

        let mut event_metadata = serde_json::Map::new();
        if !self.dataset.is_empty() {
            event_metadata.insert("dataset".to_string(), json!(self.dataset));
        }
        event_metadata.insert("original".to_string(), Value::String(original));
        root.insert("event".to_string(), Value::Object(event_metadata));

        let mut tags: Vec<String> = BASE_TAGS.iter().map(ToString::to_string).collect();
        if !self.dataset.is_empty() {
            tags.push(self.dataset.replace('.', "-"));
        }
        tags.extend(self.tags.iter().cloned());
        root.insert("tags".to_string(), json!(tags));

        Ok(())
    }

    #[must_use]
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn es_index(&self) -> &str {
        &self.es_index
    }

    /// Number of buffered actions awaiting a flush.
    #[must_use]
    pub fn pending_actions(&self) -> usize {
        self.bulk_actions.len()
    }
}
