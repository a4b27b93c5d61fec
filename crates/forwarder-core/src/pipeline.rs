//! Per-invocation wiring.
//!
//! One invocation builds its collaborators explicitly and passes them down:
//! the routing config is looked up for the triggering source, one shipper is
//! constructed per configured output, and the replay handler plus the
//! trigger-appropriate event-ID generator are wired through the composite.
//! Nothing here is process-global; a context is built once per invocation.
//!
//! The outermost error boundary lives here too: [`suppress`] re-raises fatal
//! classification/config errors so the platform retry policy applies, and
//! turns everything else into a descriptive non-throwing outcome so one bad
//! record cannot fail records that already succeeded.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::config::{ElasticsearchOutput, ForwarderConfig, Input, Output};
use crate::error::Error;
use crate::event_id;
use crate::replay::{ReplayEventHandler, ReplayQueue};
use crate::shipper::client::{BulkClient, ElasticsearchClient};
use crate::shipper::{CompositeShipper, ElasticsearchShipper, OutputShipper};
use crate::trigger::TriggerType;

/// Builds the bulk transport for one Elasticsearch output. Injected so tests
/// can substitute an in-memory client.
pub type BulkClientFactory<'a> =
    &'a dyn Fn(&ElasticsearchOutput) -> Result<Arc<dyn BulkClient>, Error>;

/// Production [`BulkClientFactory`]: a reqwest `/_bulk` client per output.
pub fn default_bulk_client(output: &ElasticsearchOutput) -> Result<Arc<dyn BulkClient>, Error> {
    Ok(Arc::new(ElasticsearchClient::new(output)?))
}

/// Extracts the source ARN the batch was delivered from.
pub fn source_arn(event: &Value) -> Result<&str, Error> {
    event
        .pointer("/Records/0/eventSourceARN")
        .and_then(Value::as_str)
        .ok_or(Error::UnsupportedTrigger)
}

/// Looks up the configured input for this batch's (trigger type, source ARN).
pub fn lookup_input<'c>(
    config: &'c ForwarderConfig,
    trigger_type: TriggerType,
    event: &Value,
) -> Result<&'c Input, Error> {
    let arn = source_arn(event)?;
    config
        .get_input_by_type_and_id(trigger_type, arn)
        .ok_or_else(|| {
            error!(source_arn = %arn, "no input set");
            Error::MissingInput(arn.to_string())
        })
}

/// Builds the composite shipper for one input.
///
/// Each configured output gets its own member shipper with dataset discovery
/// already run against the trigger event. The replay handler carries the full
/// routing YAML and the input identity so replayed documents are
/// self-sufficient; the event-ID generator follows the input's type, which
/// for replayed documents is the originating trigger type.
pub fn shipper_for_input(
    input: &Input,
    config_yaml: &str,
    event: &Value,
    bulk_clients: BulkClientFactory<'_>,
    replay_queue: Arc<dyn ReplayQueue>,
) -> Result<CompositeShipper, Error> {
    info!(input_type = %input.input_type, input_id = %input.id, "input");

    let mut composite = CompositeShipper::new();
    composite.set_replay_handler(Arc::new(ReplayEventHandler::new(
        config_yaml.to_string(),
        input.id.clone(),
        input.input_type,
        replay_queue,
    )));
    match input.input_type {
        TriggerType::S3Sqs => composite.set_event_id_generator(event_id::s3_object_id),
        TriggerType::KinesisDataStream => {
            composite.set_event_id_generator(event_id::kinesis_record_id);
        }
        TriggerType::ReplaySqs => {}
    }

    for output in &input.outputs {
        match output {
            Output::Elasticsearch { args } => {
                info!("setting Elasticsearch shipper");
                let client = bulk_clients(args)
                    .map_err(|e| Error::InvalidConfig(format!("elasticsearch output: {e}")))?;
                let mut shipper = ElasticsearchShipper::new(args.clone(), client);
                shipper.discover_dataset(event);
                composite.add_shipper(OutputShipper::Elasticsearch(shipper));
            }
        }
    }

    Ok(composite)
}

/// Looks up the input for the batch and builds its composite shipper.
pub fn build_shipper<'c>(
    config: &'c ForwarderConfig,
    config_yaml: &str,
    trigger_type: TriggerType,
    event: &Value,
    bulk_clients: BulkClientFactory<'_>,
    replay_queue: Arc<dyn ReplayQueue>,
) -> Result<(CompositeShipper, &'c Input), Error> {
    let input = lookup_input(config, trigger_type, event)?;
    let composite = shipper_for_input(input, config_yaml, event, bulk_clients, replay_queue)?;
    Ok((composite, input))
}

/// Outermost invocation boundary.
///
/// Fatal errors re-raise so the host's platform retry policy applies.
/// Everything else is logged with full context and rendered as a descriptive
/// non-fatal outcome; a mixed batch must not be fully retried because one
/// entry failed.
pub fn suppress(result: Result<String, Error>) -> Result<String, Error> {
    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_fatal() => {
            error!(error = %e, "exception raised");
            Err(e)
        }
        Err(e) => {
            error!(error = %e, "exception raised");
            Ok(format!("exception raised: {e}"))
        }
    }
}

/// Extracts the bucket name from a bucket ARN (`arn:aws:s3:::bucket`).
#[must_use]
pub fn bucket_name_from_arn(bucket_arn: &str) -> &str {
    bucket_arn.rsplit(':').next().unwrap_or(bucket_arn)
}

/// Stream coordinates parsed out of a Kinesis stream ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinesisStreamComponents {
    pub stream_type: String,
    pub stream_name: String,
    pub region: String,
}

/// Parses `arn:aws:kinesis:<region>:<account>:stream/<name>` into its
/// (type, name, region) components; `None` for anything else.
#[must_use]
pub fn kinesis_stream_components_from_arn(stream_arn: &str) -> Option<KinesisStreamComponents> {
    let components: Vec<&str> = stream_arn.split(':').collect();
    if components.len() < 6 {
        return None;
    }
    let (stream_type, stream_name) = components[5].split_once('/')?;
    if stream_type.is_empty() || stream_name.is_empty() {
        return None;
    }
    Some(KinesisStreamComponents {
        stream_type: stream_type.to_string(),
        stream_name: stream_name.to_string(),
        region: components[3].to_string(),
    })
}
