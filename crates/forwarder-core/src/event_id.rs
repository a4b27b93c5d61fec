//! Deterministic, collision-resistant document IDs.
//!
//! The ID doubles as the bulk operation's idempotency key: redelivery of the
//! same source event produces the same ID and is rejected by the backend's
//! create semantics instead of being indexed twice.
//!
//! The scheme is a wire-compatibility contract shared with upstream
//! producers and must be reproduced bit for bit: the first 10 hex characters
//! of a SHA-256 over source coordinates, a `-` separator, then the byte
//! offset zero-padded to 12 digits.

use serde_json::Value;
use sha2::{Digest, Sha256};

fn hash_prefix(src: &str) -> String {
    let digest = Sha256::digest(src.as_bytes());
    let mut hexdigest = hex::encode(digest);
    hexdigest.truncate(10);
    hexdigest
}

/// ID for a document extracted from an S3 object.
///
/// Derived from `sha256(bucket_arn + object_key)` plus the line offset.
/// Returns `None` when the payload lacks the source fields; the shipper then
/// falls back to a random ID.
#[must_use]
pub fn s3_object_id(event_payload: &Value) -> Option<String> {
    let offset = event_payload.pointer("/fields/log/offset")?.as_u64()?;
    let bucket_arn = event_payload
        .pointer("/fields/aws/s3/bucket/arn")?
        .as_str()?;
    let object_key = event_payload
        .pointer("/fields/aws/s3/object/key")?
        .as_str()?;

    let src = format!("{bucket_arn}{object_key}");
    Some(format!("{}-{:012}", hash_prefix(&src), offset))
}

/// ID for a document extracted from a Kinesis stream record.
///
/// Derived from `sha256(stream_type + stream_name + "-" + sequence_number)`
/// plus the record offset.
#[must_use]
pub fn kinesis_record_id(event_payload: &Value) -> Option<String> {
    let offset = event_payload.pointer("/fields/log/offset")?.as_u64()?;
    let stream_type = event_payload.pointer("/fields/aws/kinesis/type")?.as_str()?;
    let stream_name = event_payload.pointer("/fields/aws/kinesis/name")?.as_str()?;
    let sequence_number = event_payload
        .pointer("/fields/aws/kinesis/sequence_number")?
        .as_str()?;

    let src = format!("{stream_type}{stream_name}-{sequence_number}");
    Some(format!("{}-{:012}", hash_prefix(&src), offset))
}
