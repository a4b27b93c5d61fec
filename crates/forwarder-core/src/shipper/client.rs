//! Bulk transport to Elasticsearch.
//!
//! The shipper only needs one operation: submit a batch of create actions
//! and learn which of them the backend rejected. The trait keeps the core
//! testable without a cluster; the production implementation POSTs NDJSON to
//! `/_bulk` over reqwest.
//!
//! Transport-level failure of the bulk call itself is not retried here; the
//! enclosing invocation sees it as a suppressed error. Per-action rejections
//! inside an otherwise-successful call are the only case the shipper routes
//! to replay.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::ElasticsearchOutput;
use crate::error::Error;

/// One pending create operation: a document wrapped with its target index
/// and idempotent ID. Lives only inside the shipper's buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkAction {
    pub index: String,
    pub id: String,
    pub document: Value,
}

/// A single action the backend rejected inside a bulk response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemFailure {
    pub id: String,
    pub reason: String,
}

/// Submits bulk create batches.
#[async_trait]
pub trait BulkClient: Send + Sync {
    /// Performs one bulk call; returns the per-action rejections.
    async fn bulk(&self, actions: &[BulkAction]) -> Result<Vec<BulkItemFailure>, Error>;
}

/// reqwest-backed [`BulkClient`] speaking the `/_bulk` NDJSON protocol.
pub struct ElasticsearchClient {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    api_key: String,
    headers: OnceCell<HeaderMap>,
}

impl ElasticsearchClient {
    pub fn new(output: &ElasticsearchOutput) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::BulkTransport(e.to_string()))?;

        Ok(ElasticsearchClient {
            client,
            endpoint: output.elasticsearch_url.trim_end_matches('/').to_string(),
            username: output.username.clone(),
            password: output.password.clone(),
            api_key: output.api_key.clone(),
            headers: OnceCell::new(),
        })
    }

    async fn get_headers(&self) -> &HeaderMap {
        self.headers
            .get_or_init(|| async {
                let mut headers = HeaderMap::new();
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-ndjson"),
                );
                if self.username.is_empty() && !self.api_key.is_empty() {
                    if let Ok(value) = HeaderValue::from_str(&format!("ApiKey {}", self.api_key)) {
                        headers.insert(AUTHORIZATION, value);
                    }
                }
                headers
            })
            .await
    }
}

/// Renders the NDJSON request body: an action line followed by a source line
/// per document, each newline-terminated.
fn render_bulk_body(actions: &[BulkAction]) -> Result<String, Error> {
    let mut body = String::new();
    for action in actions {
        let header = serde_json::json!({ "create": { "_index": action.index, "_id": action.id } });
        body.push_str(&header.to_string());
        body.push('\n');
        let source = serde_json::to_string(&action.document)
            .map_err(|e| Error::BulkTransport(e.to_string()))?;
        body.push_str(&source);
        body.push('\n');
    }
    Ok(body)
}

/// Extracts the rejected actions from a bulk response.
fn parse_bulk_response(response: &Value) -> Vec<BulkItemFailure> {
    let Some(items) = response.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let create = item.get("create")?;
            let error = create.get("error")?;
            Some(BulkItemFailure {
                id: create
                    .get("_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                reason: error.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl BulkClient for ElasticsearchClient {
    async fn bulk(&self, actions: &[BulkAction]) -> Result<Vec<BulkItemFailure>, Error> {
        if actions.is_empty() {
            return Ok(Vec::new());
        }

        let body = render_bulk_body(actions)?;
        let headers = self.get_headers().await.clone();
        let mut request = self
            .client
            .post(format!("{}/_bulk", self.endpoint))
            .headers(headers)
            .body(body);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::BulkTransport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::BulkTransport(format!(
                "bulk call returned status {status}"
            )));
        }

        let response: Value = response
            .json()
            .await
            .map_err(|e| Error::BulkTransport(e.to_string()))?;
        let failures = parse_bulk_response(&response);
        debug!(
            actions = actions.len(),
            failures = failures.len(),
            "bulk call completed"
        );
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(id: &str) -> BulkAction {
        BulkAction {
            index: "logs-generic-default".to_string(),
            id: id.to_string(),
            document: json!({ "@timestamp": "2021-12-28T11:33:08.160Z", "fields": { "message": "hello" } }),
        }
    }

    #[test]
    fn test_render_bulk_body() {
        let body = render_bulk_body(&[action("id-1"), action("id-2")]).expect("body");
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);

        let header: Value = serde_json::from_str(lines[0]).expect("header");
        assert_eq!(header["create"]["_index"], "logs-generic-default");
        assert_eq!(header["create"]["_id"], "id-1");

        let source: Value = serde_json::from_str(lines[1]).expect("source");
        assert_eq!(source["fields"]["message"], "hello");

        assert!(body.ends_with('\n'));
    }

    #[test]
    fn test_parse_bulk_response_collects_rejections() {
        let response = json!({
            "errors": true,
            "items": [
                { "create": { "_id": "id-1", "status": 201 } },
                { "create": { "_id": "id-2", "status": 409, "error": { "type": "version_conflict_engine_exception" } } },
                { "create": { "_id": "id-3", "status": 429, "error": { "type": "es_rejected_execution_exception" } } },
            ]
        });

        let failures = parse_bulk_response(&response);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].id, "id-2");
        assert!(failures[0].reason.contains("version_conflict_engine_exception"));
        assert_eq!(failures[1].id, "id-3");
    }

    #[test]
    fn test_parse_bulk_response_all_ok() {
        let response = json!({
            "errors": false,
            "items": [{ "create": { "_id": "id-1", "status": 201 } }]
        });
        assert!(parse_bulk_response(&response).is_empty());
    }

    #[tokio::test]
    async fn test_bulk_posts_ndjson_and_parses_failures() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/_bulk")
            .match_header("content-type", "application/x-ndjson")
            .with_status(200)
            .with_body(
                json!({
                    "errors": true,
                    "items": [
                        { "create": { "_id": "id-1", "status": 201 } },
                        { "create": { "_id": "id-2", "status": 429, "error": { "type": "es_rejected_execution_exception" } } },
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let output = ElasticsearchOutput {
            elasticsearch_url: server.url(),
            username: "forwarder".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        };
        let client = ElasticsearchClient::new(&output).expect("client");

        let failures = client
            .bulk(&[action("id-1"), action("id-2")])
            .await
            .expect("bulk");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, "id-2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bulk_transport_failure_is_suppressed_kind() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/_bulk")
            .with_status(503)
            .create_async()
            .await;

        let output = ElasticsearchOutput {
            elasticsearch_url: server.url(),
            ..Default::default()
        };
        let client = ElasticsearchClient::new(&output).expect("client");

        let err = client.bulk(&[action("id-1")]).await.expect_err("must fail");
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_bulk_with_empty_buffer_is_noop() {
        let output = ElasticsearchOutput {
            elasticsearch_url: "http://localhost:1".to_string(),
            ..Default::default()
        };
        let client = ElasticsearchClient::new(&output).expect("client");
        // No HTTP call happens: an unreachable endpoint still returns Ok.
        assert!(client.bulk(&[]).await.expect("noop").is_empty());
    }
}
