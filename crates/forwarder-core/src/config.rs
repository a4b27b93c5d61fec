//! Typed routing configuration.
//!
//! The routing YAML declares a set of inputs, each keyed by (trigger type,
//! source identifier) and owning one or more outputs:
//!
//! ```yaml
//! inputs:
//!   - type: s3-sqs
//!     id: arn:aws:sqs:eu-central-1:123456789:source-queue
//!     outputs:
//!       - type: elasticsearch
//!         args:
//!           elasticsearch_url: "https://cluster.example.com:9243"
//!           username: forwarder
//!           password: secret
//!           es_index_or_datastream_name: logs-generic-default
//!           batch_max_actions: 500
//!           tags:
//!             - team:platform
//! ```
//!
//! Inputs are immutable after load and looked up by
//! [`ForwarderConfig::get_input_by_type_and_id`]. Outputs are tagged variants
//! over the output kind so new delivery targets can be added without touching
//! dispatch logic.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::trigger::TriggerType;

/// Environment variable holding the `s3://bucket/key` URI of the config file.
pub const S3_CONFIG_FILE_VAR: &str = "S3_CONFIG_FILE";

/// Environment variable holding the replay queue URL.
pub const SQS_REPLAY_URL_VAR: &str = "SQS_REPLAY_URL";

/// Environment variable holding the log verbosity directive.
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";

/// Environment-sourced settings consumed directly by the core.
///
/// Read once per invocation. Variables are captured as found; a lookup that
/// needs a missing one fails with a fatal [`Error::MissingEnv`], so an
/// invocation that never touches S3 (a replay batch, say) does not require
/// `S3_CONFIG_FILE` to be set.
#[derive(Debug, Clone)]
pub struct EnvSettings {
    /// `s3://bucket/key` URI of the routing config file.
    pub s3_config_file: Option<String>,
    /// URL of the queue receiving documents that failed to index.
    pub sqs_replay_url: Option<String>,
    /// `EnvFilter` directive for [`crate::logger::init`].
    pub log_level: String,
}

impl EnvSettings {
    #[must_use]
    pub fn from_env() -> Self {
        EnvSettings {
            s3_config_file: std::env::var(S3_CONFIG_FILE_VAR).ok(),
            sqs_replay_url: std::env::var(SQS_REPLAY_URL_VAR).ok(),
            log_level: std::env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Bucket name and object key of the routing config file.
    pub fn config_file_location(&self) -> Result<(String, String), Error> {
        let s3_uri = self
            .s3_config_file
            .as_deref()
            .ok_or(Error::MissingEnv(S3_CONFIG_FILE_VAR))?;
        crate::resolver::parse_s3_uri(s3_uri)
    }

    /// Destination of the replay queue.
    pub fn replay_queue_url(&self) -> Result<&str, Error> {
        self.sqs_replay_url
            .as_deref()
            .ok_or(Error::MissingEnv(SQS_REPLAY_URL_VAR))
    }
}

const DEFAULT_BATCH_MAX_ACTIONS: usize = 500;

fn default_batch_max_actions() -> usize {
    DEFAULT_BATCH_MAX_ACTIONS
}

/// Connection parameters for an Elasticsearch output.
///
/// Serialized verbatim as the `output_args` of a replay message, so a later
/// invocation can rebuild the same shipper without re-resolving config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ElasticsearchOutput {
    pub elasticsearch_url: String,
    pub username: String,
    pub password: String,
    pub cloud_id: String,
    pub api_key: String,
    pub es_index_or_datastream_name: String,
    /// Pending-buffer threshold: a send that reaches this many buffered
    /// actions triggers an implicit flush. Zero flushes after every send.
    #[serde(default = "default_batch_max_actions")]
    pub batch_max_actions: usize,
    pub tags: Vec<String>,
}

/// A delivery target, tagged by output kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Output {
    #[serde(rename = "elasticsearch")]
    Elasticsearch { args: ElasticsearchOutput },
}

impl Output {
    #[must_use]
    pub fn output_type(&self) -> &'static str {
        match self {
            Output::Elasticsearch { .. } => "elasticsearch",
        }
    }
}

/// One trigger source and its delivery targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    #[serde(rename = "type")]
    pub input_type: TriggerType,
    pub id: String,
    pub outputs: Vec<Output>,
}

/// The full routing configuration: a set of named inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwarderConfig {
    inputs: Vec<Input>,
}

impl ForwarderConfig {
    /// Parses and validates routing YAML.
    pub fn from_yaml(config_yaml: &str) -> Result<ForwarderConfig, Error> {
        let config: ForwarderConfig =
            serde_yaml::from_str(config_yaml).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.inputs.is_empty() {
            return Err(Error::InvalidConfig("no inputs defined".to_string()));
        }
        for (n, input) in self.inputs.iter().enumerate() {
            if input.id.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("input {n} has an empty id")));
            }
            if input.outputs.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "input `{}` has no outputs",
                    input.id
                )));
            }
            let duplicate = self.inputs[..n]
                .iter()
                .any(|other| other.input_type == input.input_type && other.id == input.id);
            if duplicate {
                return Err(Error::InvalidConfig(format!(
                    "duplicate input for ({}, {})",
                    input.input_type, input.id
                )));
            }
        }
        Ok(())
    }

    /// Looks up the input configured for (trigger type, source identifier).
    #[must_use]
    pub fn get_input_by_type_and_id(
        &self,
        trigger_type: TriggerType,
        id: &str,
    ) -> Option<&Input> {
        self.inputs
            .iter()
            .find(|input| input.input_type == trigger_type && input.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG_YAML: &str = r"
inputs:
  - type: s3-sqs
    id: arn:aws:sqs:eu-central-1:123456789:source-queue
    outputs:
      - type: elasticsearch
        args:
          elasticsearch_url: 'https://cluster.example.com:9243'
          username: forwarder
          password: secret
          es_index_or_datastream_name: logs-generic-default
          tags:
            - 'tag1'
            - 'tag2'
  - type: kinesis-data-stream
    id: arn:aws:kinesis:eu-central-1:123456789:stream/source-stream
    outputs:
      - type: elasticsearch
        args:
          elasticsearch_url: 'https://cluster.example.com:9243'
          api_key: base64key
          es_index_or_datastream_name: logs-aws.vpcflow-default
          batch_max_actions: 20
";

    #[test]
    fn test_from_yaml_and_lookup() {
        let config = ForwarderConfig::from_yaml(CONFIG_YAML).expect("parse config");

        let input = config
            .get_input_by_type_and_id(
                TriggerType::S3Sqs,
                "arn:aws:sqs:eu-central-1:123456789:source-queue",
            )
            .expect("s3-sqs input");
        assert_eq!(input.outputs.len(), 1);
        let Output::Elasticsearch { args } = &input.outputs[0];
        assert_eq!(args.username, "forwarder");
        assert_eq!(args.batch_max_actions, 500);
        assert_eq!(args.tags, vec!["tag1".to_string(), "tag2".to_string()]);

        let input = config
            .get_input_by_type_and_id(
                TriggerType::KinesisDataStream,
                "arn:aws:kinesis:eu-central-1:123456789:stream/source-stream",
            )
            .expect("kinesis input");
        let Output::Elasticsearch { args } = &input.outputs[0];
        assert_eq!(args.batch_max_actions, 20);
        assert!(args.username.is_empty());
    }

    #[test]
    fn test_lookup_misses_on_wrong_type() {
        let config = ForwarderConfig::from_yaml(CONFIG_YAML).expect("parse config");
        assert!(config
            .get_input_by_type_and_id(
                TriggerType::KinesisDataStream,
                "arn:aws:sqs:eu-central-1:123456789:source-queue",
            )
            .is_none());
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let err = ForwarderConfig::from_yaml("inputs: []").expect_err("must fail");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unknown_output_type_rejected() {
        let yaml = r"
inputs:
  - type: s3-sqs
    id: some-arn
    outputs:
      - type: logstash
        args: {}
";
        assert!(matches!(
            ForwarderConfig::from_yaml(yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_duplicate_inputs_rejected() {
        let yaml = r"
inputs:
  - type: s3-sqs
    id: same-arn
    outputs:
      - type: elasticsearch
        args: {}
  - type: s3-sqs
    id: same-arn
    outputs:
      - type: elasticsearch
        args: {}
";
        assert!(matches!(
            ForwarderConfig::from_yaml(yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_settings_from_env() {
        std::env::set_var(S3_CONFIG_FILE_VAR, "s3://config-bucket/folder/config.yaml");
        std::env::set_var(SQS_REPLAY_URL_VAR, "https://sqs.region.amazonaws.com/replay");
        std::env::remove_var(LOG_LEVEL_VAR);

        let settings = EnvSettings::from_env();
        assert_eq!(
            settings.config_file_location().expect("location"),
            (
                "config-bucket".to_string(),
                "folder/config.yaml".to_string()
            )
        );
        assert_eq!(
            settings.replay_queue_url().expect("url"),
            "https://sqs.region.amazonaws.com/replay"
        );
        assert_eq!(settings.log_level, "info");

        std::env::remove_var(S3_CONFIG_FILE_VAR);
        std::env::remove_var(SQS_REPLAY_URL_VAR);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_settings_missing_vars_are_fatal_on_lookup() {
        std::env::remove_var(S3_CONFIG_FILE_VAR);
        std::env::remove_var(SQS_REPLAY_URL_VAR);

        let settings = EnvSettings::from_env();
        let err = settings.config_file_location().expect_err("must fail");
        assert!(matches!(err, Error::MissingEnv(S3_CONFIG_FILE_VAR)));
        assert!(err.is_fatal());
        assert!(matches!(
            settings.replay_queue_url(),
            Err(Error::MissingEnv(SQS_REPLAY_URL_VAR))
        ));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_settings_invalid_config_uri_is_fatal() {
        std::env::set_var(S3_CONFIG_FILE_VAR, "http://config-bucket/config.yaml");
        let settings = EnvSettings::from_env();
        assert!(matches!(
            settings.config_file_location(),
            Err(Error::InvalidConfigUri(_))
        ));
        std::env::remove_var(S3_CONFIG_FILE_VAR);
    }

    #[test]
    fn test_input_without_outputs_rejected() {
        let yaml = r"
inputs:
  - type: s3-sqs
    id: some-arn
    outputs: []
";
        assert!(matches!(
            ForwarderConfig::from_yaml(yaml),
            Err(Error::InvalidConfig(_))
        ));
    }
}
