//! Config source resolution.
//!
//! Two retrieval strategies, selected by the trigger classification: the
//! YAML either rides inline in the first record's message attributes (replay
//! and continuation batches) or is fetched from the S3 location declared by
//! [`crate::config::EnvSettings::config_file_location`]. Both return raw
//! YAML text; parsing is [`crate::config`]'s concern.

use serde_json::Value;

use crate::error::Error;
use crate::storage::ObjectStorage;
use crate::trigger::ConfigSource;

/// Extracts the config YAML from the first record's message attributes.
pub fn config_yaml_from_payload(event: &Value) -> Result<String, Error> {
    event
        .pointer("/Records/0/messageAttributes/config/stringValue")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(Error::MissingConfigPayload)
}

/// Splits an `s3://bucket/key` URI into bucket name and object key.
pub fn parse_s3_uri(s3_uri: &str) -> Result<(String, String), Error> {
    let invalid = || Error::InvalidConfigUri(s3_uri.to_string());

    let rest = s3_uri.strip_prefix("s3://").ok_or_else(invalid)?;
    let (bucket_name, object_key) = rest.split_once('/').ok_or_else(invalid)?;
    if bucket_name.is_empty() || object_key.is_empty() {
        return Err(invalid());
    }
    Ok((bucket_name.to_string(), object_key.to_string()))
}

/// Obtains the raw routing YAML for this invocation.
///
/// `storage` must already be bound to the configured file location; it is
/// only consulted for the external-file strategy.
pub async fn resolve(
    event: &Value,
    config_source: ConfigSource,
    storage: &dyn ObjectStorage,
) -> Result<String, Error> {
    match config_source {
        ConfigSource::Payload => config_yaml_from_payload(event),
        ConfigSource::S3File => storage.get_as_string().await,
    }
}
