//! Output shippers and their composition.
//!
//! Every configured output gets one concrete shipper; the composite fans
//! each document out to all of them in configuration order. Members are
//! closed over an enum rather than a trait object so the dispatch set is
//! visible at the type level and adding an output kind is a compile error
//! until every match arm handles it.

pub mod client;
pub mod es;

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::Error;
use crate::replay::ReplayHandler;

pub use client::{BulkAction, BulkClient, BulkItemFailure, ElasticsearchClient};
pub use es::ElasticsearchShipper;

/// Derives a deterministic document ID from an enriched document, or `None`
/// when the document lacks the fields the scheme needs.
pub type EventIdGenerator = fn(&Value) -> Option<String>;

/// One concrete output shipper.
pub enum OutputShipper {
    Elasticsearch(ElasticsearchShipper),
}

impl OutputShipper {
    pub async fn send(&mut self, event: &Value) -> Result<(), Error> {
        match self {
            OutputShipper::Elasticsearch(shipper) => shipper.send(event).await,
        }
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        match self {
            OutputShipper::Elasticsearch(shipper) => shipper.flush().await,
        }
    }

    pub fn set_event_id_generator(&mut self, generator: EventIdGenerator) {
        match self {
            OutputShipper::Elasticsearch(shipper) => shipper.set_event_id_generator(generator),
        }
    }

    pub fn set_replay_handler(&mut self, handler: Arc<dyn ReplayHandler>) {
        match self {
            OutputShipper::Elasticsearch(shipper) => shipper.set_replay_handler(handler),
        }
    }

    #[must_use]
    pub fn output_type(&self) -> &'static str {
        match self {
            OutputShipper::Elasticsearch(_) => "elasticsearch",
        }
    }
}

/// Fans documents out to every member shipper in insertion order.
///
/// A member failure is logged and does not stop delivery to the remaining
/// members; the first error is reported once every member has been tried.
#[derive(Default)]
pub struct CompositeShipper {
    shippers: Vec<OutputShipper>,
    event_id_generator: Option<EventIdGenerator>,
    replay_handler: Option<Arc<dyn ReplayHandler>>,
}

impl std::fmt::Debug for CompositeShipper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeShipper")
            .field(
                "shippers",
                &self
                    .shippers
                    .iter()
                    .map(OutputShipper::output_type)
                    .collect::<Vec<_>>(),
            )
            .field("event_id_generator", &self.event_id_generator.is_some())
            .field("replay_handler", &self.replay_handler.is_some())
            .finish()
    }
}

impl CompositeShipper {
    #[must_use]
    pub fn new() -> Self {
        CompositeShipper::default()
    }

    /// Adds a member, handing it the generator and replay handler already
    /// set on the composite.
    pub fn add_shipper(&mut self, mut shipper: OutputShipper) {
        if let Some(generator) = self.event_id_generator {
            shipper.set_event_id_generator(generator);
        }
        if let Some(handler) = &self.replay_handler {
            shipper.set_replay_handler(Arc::clone(handler));
        }
        self.shippers.push(shipper);
    }

    /// Sets the ID generator on the composite and on every current member;
    /// members added later inherit it.
    pub fn set_event_id_generator(&mut self, generator: EventIdGenerator) {
        self.event_id_generator = Some(generator);
        for shipper in &mut self.shippers {
            shipper.set_event_id_generator(generator);
        }
    }

    /// Sets the replay handler on the composite and on every current member;
    /// members added later inherit it.
    pub fn set_replay_handler(&mut self, handler: Arc<dyn ReplayHandler>) {
        for shipper in &mut self.shippers {
            shipper.set_replay_handler(Arc::clone(&handler));
        }
        self.replay_handler = Some(handler);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shippers.is_empty()
    }

    pub async fn send(&mut self, event: &Value) -> Result<(), Error> {
        let mut first_error = None;
        for shipper in &mut self.shippers {
            if let Err(e) = shipper.send(event).await {
                warn!(output_type = shipper.output_type(), error = %e, "shipper send failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        let mut first_error = None;
        for shipper in &mut self.shippers {
            if let Err(e) = shipper.flush().await {
                warn!(output_type = shipper.output_type(), error = %e, "shipper flush failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{RecordingBulkClient, RecordingReplayHandler};
    use super::*;
    use crate::config::ElasticsearchOutput;
    use serde_json::json;

    fn output_named(name: &str) -> ElasticsearchOutput {
        ElasticsearchOutput {
            elasticsearch_url: "https://cluster.example.com:9243".to_string(),
            username: "forwarder".to_string(),
            password: "secret".to_string(),
            es_index_or_datastream_name: name.to_string(),
            ..Default::default()
        }
    }

    fn member(name: &str, client: Arc<RecordingBulkClient>) -> OutputShipper {
        let mut shipper = ElasticsearchShipper::new(output_named(name), client);
        shipper.discover_dataset(&json!({}));
        OutputShipper::Elasticsearch(shipper)
    }

    fn document() -> serde_json::Value {
        json!({ "fields": { "message": "hello" } })
    }

    #[tokio::test]
    async fn test_composite_fans_out_in_insertion_order() {
        let first = RecordingBulkClient::new();
        let second = RecordingBulkClient::new();
        let mut composite = CompositeShipper::new();
        composite.add_shipper(member("logs-first-default", first.clone()));
        composite.add_shipper(member("logs-second-default", second.clone()));

        composite.send(&document()).await.expect("send");

        assert_eq!(first.calls().len(), 1);
        assert_eq!(second.calls().len(), 1);
        assert_eq!(first.calls()[0][0].index, "logs-first-default");
        assert_eq!(second.calls()[0][0].index, "logs-second-default");
    }

    #[tokio::test]
    async fn test_composite_member_failure_does_not_stop_delivery() {
        let healthy = RecordingBulkClient::new();
        let mut composite = CompositeShipper::new();
        // Empty index makes the first member fail every send.
        composite.add_shipper(OutputShipper::Elasticsearch(ElasticsearchShipper::new(
            output_named(""),
            RecordingBulkClient::new(),
        )));
        composite.add_shipper(member("logs-healthy-default", healthy.clone()));

        let err = composite.send(&document()).await.expect_err("must fail");
        assert!(matches!(err, crate::error::Error::EmptyIndex));
        assert_eq!(healthy.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_composite_propagates_generator_to_existing_and_future_members() {
        let first = RecordingBulkClient::new();
        let second = RecordingBulkClient::new();
        let mut composite = CompositeShipper::new();
        composite.add_shipper(member("logs-first-default", first.clone()));
        composite.set_event_id_generator(|_| Some("deterministic".to_string()));
        composite.add_shipper(member("logs-second-default", second.clone()));

        composite.send(&document()).await.expect("send");

        assert_eq!(first.calls()[0][0].id, "deterministic");
        assert_eq!(second.calls()[0][0].id, "deterministic");
    }

    #[tokio::test]
    async fn test_composite_propagates_replay_handler_to_members() {
        let replay = RecordingReplayHandler::new();
        let rejecting = RecordingBulkClient::rejecting(vec!["deterministic".to_string()]);
        let mut composite = CompositeShipper::new();
        composite.set_event_id_generator(|_| Some("deterministic".to_string()));
        composite.set_replay_handler(replay.clone());
        composite.add_shipper(member("logs-first-default", rejecting));

        composite.send(&document()).await.expect("send");

        assert_eq!(replay.calls().len(), 1);
        assert_eq!(replay.calls()[0].0, "elasticsearch");
    }

    #[tokio::test]
    async fn test_composite_flush_reaches_all_members() {
        let first = RecordingBulkClient::new();
        let second = RecordingBulkClient::new();
        let mut composite = CompositeShipper::new();
        let mut buffered = |name: &str, client: Arc<RecordingBulkClient>| {
            let mut output = output_named(name);
            output.batch_max_actions = 100;
            let mut shipper = ElasticsearchShipper::new(output, client);
            shipper.discover_dataset(&json!({}));
            OutputShipper::Elasticsearch(shipper)
        };
        composite.add_shipper(buffered("logs-first-default", first.clone()));
        composite.add_shipper(buffered("logs-second-default", second.clone()));

        composite.send(&document()).await.expect("send");
        assert!(first.calls().is_empty());
        assert!(second.calls().is_empty());

        composite.flush().await.expect("flush");
        assert_eq!(first.calls().len(), 1);
        assert_eq!(second.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_composite_is_a_noop() {
        let mut composite = CompositeShipper::new();
        assert!(composite.is_empty());
        composite.send(&document()).await.expect("send");
        composite.flush().await.expect("flush");
    }
}
