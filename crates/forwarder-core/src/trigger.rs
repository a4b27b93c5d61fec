//! Trigger classification for incoming event batches.
//!
//! A batch is classified by inspecting its first record. The decision order
//! matters: a replay message is its own trigger even when the surrounding
//! SQS fields are present, because the replay body was produced by a prior
//! invocation and already carries everything needed to reprocess it.

use serde_json::Value;

use crate::error::Error;

/// Source that fired the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TriggerType {
    /// S3 object-created notification delivered over SQS.
    #[serde(rename = "s3-sqs")]
    S3Sqs,
    /// Kinesis data stream records.
    #[serde(rename = "kinesis-data-stream")]
    KinesisDataStream,
    /// Documents re-enqueued by a previous invocation after a bulk failure.
    #[serde(rename = "replay-sqs")]
    ReplaySqs,
}

impl TriggerType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::S3Sqs => "s3-sqs",
            TriggerType::KinesisDataStream => "kinesis-data-stream",
            TriggerType::ReplaySqs => "replay-sqs",
        }
    }

    /// Maps the record's `eventSource` tag to a trigger type.
    fn from_event_source(event_source: &str) -> Option<TriggerType> {
        match event_source {
            "aws:sqs" => Some(TriggerType::S3Sqs),
            "aws:kinesis" => Some(TriggerType::KinesisDataStream),
            _ => None,
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the routing configuration must be sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// YAML carried inline in the first record's message attributes.
    Payload,
    /// YAML fetched from the environment-declared S3 config file.
    S3File,
}

/// Classifies a raw event batch into (trigger type, config source).
///
/// Pure; no side effects. Fails with [`Error::UnsupportedTrigger`] when the
/// batch shape is not one this forwarder handles; that error is fatal and
/// left to the platform retry policy.
pub fn classify(event: &Value) -> Result<(TriggerType, ConfigSource), Error> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .filter(|records| !records.is_empty())
        .ok_or(Error::UnsupportedTrigger)?;
    let first = &records[0];

    // A replay body wins over every other marker, even when the record also
    // carries standard trigger fields.
    if let Some(body) = first.get("body").and_then(Value::as_str) {
        if body.contains("output_type")
            && body.contains("output_args")
            && body.contains("event_payload")
        {
            return Ok((TriggerType::ReplaySqs, ConfigSource::Payload));
        }
    }

    let event_source = first
        .get("eventSource")
        .and_then(Value::as_str)
        .ok_or(Error::UnsupportedTrigger)?;
    let trigger_type =
        TriggerType::from_event_source(event_source).ok_or(Error::UnsupportedTrigger)?;

    if trigger_type == TriggerType::KinesisDataStream
        && first.pointer("/kinesis/data").is_none()
    {
        return Err(Error::UnsupportedTrigger);
    }

    if trigger_type != TriggerType::S3Sqs {
        return Ok((trigger_type, ConfigSource::S3File));
    }

    // An `originalEventSource` attribute marks a continuation of a prior
    // invocation, which embedded its config in the message attributes.
    let continued = first
        .pointer("/messageAttributes/originalEventSource")
        .is_some();
    if continued {
        Ok((TriggerType::S3Sqs, ConfigSource::Payload))
    } else {
        Ok((TriggerType::S3Sqs, ConfigSource::S3File))
    }
}
