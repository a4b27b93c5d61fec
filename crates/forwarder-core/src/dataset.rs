//! Dataset classification from object keys and index names.
//!
//! Well-known AWS log products write objects under recognizable key layouts.
//! An ordered rule table maps those layouts to a dataset name; rules are
//! evaluated top to bottom and the first match wins. A key that matches no
//! rule falls back to the `generic` dataset.
//!
//! Independently of the rules, a configured index name that already follows
//! the `logs-<dataset>-<namespace>` datastream naming convention carries its
//! own routing decision: the pair is parsed straight out of the name and the
//! key-based rules are skipped entirely. Config authors use this as an
//! explicit override. A non-empty name that does not follow the convention
//! means pass-through: no dataset, no namespace, literal index.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// One classification rule: a key pattern bound to a fixed dataset name.
struct DatasetRule {
    pattern: Regex,
    dataset: &'static str,
}

/// Ordered rule table; first match wins.
///
/// The patterns are all literal fragments today, kept as regexes so a rule
/// needing an anchor or a character class does not change the table shape.
static DATASET_RULES: LazyLock<Vec<DatasetRule>> = LazyLock::new(|| {
    [
        ("CloudTrail/", "aws.cloudtrail"),
        ("CloudTrail-Digest/", "aws.cloudtrail"),
        ("CloudTrail-Insight/", "aws.cloudtrail"),
        ("exportedlogs/", "aws.cloudwatch_logs"),
        ("elasticloadbalancing/", "aws.elb_logs"),
        ("network-firewall/", "aws.firewall_logs"),
        ("/lambda/", "aws.lambda"),
        ("SMSUsageReports/", "aws.sns"),
        ("StorageLens/", "aws.s3_storage_lens"),
        ("WAFLogs/", "aws.waf"),
        ("vpcflowlogs/", "aws.vpcflow"),
    ]
    .into_iter()
    .filter_map(|(fragment, dataset)| {
        let pattern = Regex::new(&regex::escape(fragment)).ok()?;
        Some(DatasetRule { pattern, dataset })
    })
    .collect()
});

/// Dataset used when no rule matches and no naming convention applies.
pub const GENERIC_DATASET: &str = "generic";

/// Namespace used unless the index name carries its own.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Matches an object key against the rule table.
#[must_use]
pub fn dataset_for_object_key(object_key: &str) -> Option<&'static str> {
    DATASET_RULES
        .iter()
        .find(|rule| rule.pattern.is_match(object_key))
        .map(|rule| rule.dataset)
}

/// Parses a `logs-<dataset>-<namespace>` datastream name.
///
/// The dataset itself may contain `-`, so the namespace is everything after
/// the last separator: `logs-data.set-namespace` -> (`data.set`,
/// `namespace`). Returns `None` for names not following the convention.
#[must_use]
pub fn parse_index_name(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix("logs-")?;
    let (dataset, namespace) = rest.rsplit_once('-')?;
    if dataset.is_empty() || namespace.is_empty() {
        return None;
    }
    Some((dataset.to_string(), namespace.to_string()))
}

/// Extracts the S3 object key from a trigger batch.
///
/// The key lives two levels deep: the SQS record body is itself a JSON text
/// holding the S3 notification. A missing key, malformed body, or absent
/// `Records` structure all degrade to `None`; classification then falls back
/// to the generic/default outcome rather than failing the invocation.
#[must_use]
pub fn object_key_from_trigger(event: &Value) -> Option<String> {
    let body = event.pointer("/Records/0/body")?.as_str()?;
    let notification: Value = serde_json::from_str(body).ok()?;
    let key = notification
        .pointer("/Records/0/s3/object/key")?
        .as_str()
        .filter(|key| !key.is_empty())?;
    Some(key.to_string())
}
