//! Replay of unsendable documents over a dedicated retry queue.
//!
//! When a bulk call partially fails, each rejected document is re-enqueued
//! with its original output target, the originating input identity, and the
//! full routing YAML as a message attribute. A later invocation classifies
//! such a message as a replay trigger and can reprocess it with no other
//! context: it never has to re-resolve configuration.
//!
//! Enqueueing is fire-and-forget from the shipper's perspective: beyond the
//! enqueue call itself nothing is awaited for correctness.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sqs::types::MessageAttributeValue;
use aws_sdk_sqs::Client as SqsClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::EnvSettings;
use crate::error::Error;
use crate::trigger::TriggerType;

/// Body of a replay message.
///
/// Must carry enough that a consumer with no other context can fully
/// reprocess the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayMessage {
    pub output_type: String,
    pub output_args: Value,
    pub event_payload: Value,
    pub event_input_id: String,
    pub event_input_type: TriggerType,
}

/// Receives documents the shipper could not deliver.
#[async_trait]
pub trait ReplayHandler: Send + Sync {
    async fn replay(
        &self,
        output_type: &str,
        output_args: &Value,
        event_payload: &Value,
    ) -> Result<(), Error>;
}

/// Transport for replay messages.
#[async_trait]
pub trait ReplayQueue: Send + Sync {
    /// Enqueues `body` with the routing YAML attached as a `config`
    /// string attribute.
    async fn send_message(&self, body: String, config_yaml: &str) -> Result<(), Error>;
}

/// SQS-backed [`ReplayQueue`].
#[derive(Debug, Clone)]
pub struct SqsReplayQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsReplayQueue {
    #[must_use]
    pub fn new(client: SqsClient, queue_url: String) -> Self {
        SqsReplayQueue { client, queue_url }
    }

    /// Builds a queue client from the ambient AWS environment and the
    /// replay destination in `settings`.
    pub async fn from_env(settings: &EnvSettings) -> Result<Self, Error> {
        let queue_url = settings.replay_queue_url()?.to_string();
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(SqsReplayQueue::new(SqsClient::new(&sdk_config), queue_url))
    }
}

#[async_trait]
impl ReplayQueue for SqsReplayQueue {
    async fn send_message(&self, body: String, config_yaml: &str) -> Result<(), Error> {
        let config_attribute = MessageAttributeValue::builder()
            .data_type("String")
            .string_value(config_yaml)
            .build()
            .map_err(|e| Error::ReplayEnqueue(e.to_string()))?;

        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .message_attributes("config", config_attribute)
            .send()
            .await
            .map_err(|e| Error::ReplayEnqueue(e.to_string()))?;

        Ok(())
    }
}

/// [`ReplayHandler`] bound to one invocation's input and routing YAML.
pub struct ReplayEventHandler {
    config_yaml: String,
    event_input_id: String,
    event_input_type: TriggerType,
    queue: Arc<dyn ReplayQueue>,
}

impl ReplayEventHandler {
    #[must_use]
    pub fn new(
        config_yaml: String,
        event_input_id: String,
        event_input_type: TriggerType,
        queue: Arc<dyn ReplayQueue>,
    ) -> Self {
        ReplayEventHandler {
            config_yaml,
            event_input_id,
            event_input_type,
            queue,
        }
    }
}

#[async_trait]
impl ReplayHandler for ReplayEventHandler {
    async fn replay(
        &self,
        output_type: &str,
        output_args: &Value,
        event_payload: &Value,
    ) -> Result<(), Error> {
        let message = ReplayMessage {
            output_type: output_type.to_string(),
            output_args: output_args.clone(),
            event_payload: event_payload.clone(),
            event_input_id: self.event_input_id.clone(),
            event_input_type: self.event_input_type,
        };
        let body =
            serde_json::to_string(&message).map_err(|e| Error::ReplayEnqueue(e.to_string()))?;

        self.queue.send_message(body, &self.config_yaml).await?;

        warn!(
            output_type,
            event_input_id = %self.event_input_id,
            event_input_type = %self.event_input_type,
            "sent to replay queue"
        );
        Ok(())
    }
}
