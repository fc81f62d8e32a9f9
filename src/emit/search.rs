//! Search datastore emitter
//!
//! Bulk-indexes documents into an Elasticsearch-compatible endpoint via
//! `POST /_bulk`. Each document is written under its deterministic id,
//! so re-delivery of the same document overwrites instead of
//! duplicating.

use crate::emit::Emitter;
use crate::error::PluginError;
use crate::transform::Document;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Minimal view of the bulk API response
#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

/// Emitter for an Elasticsearch-compatible search datastore
pub struct SearchEmitter {
    client: reqwest::Client,
    base_url: String,
    index: String,
    auth_header: Option<String>,
}

impl SearchEmitter {
    /// Create a new SearchEmitter for the given endpoint and index
    ///
    /// Uses default timeouts: 30s request timeout, 10s connection timeout
    ///
    /// # Errors
    /// Returns `PluginError::Init` if the HTTP client cannot be created
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Result<Self, PluginError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| PluginError::Init(format!("Failed to build HTTP client: {e}")))?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.into(),
            auth_header: None,
        })
    }

    /// Attach basic-auth credentials to all requests
    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        self.auth_header = Some(format!("Basic {encoded}"));
        self
    }

    /// Render a batch as bulk-API NDJSON: one action line plus one
    /// source line per document.
    fn bulk_body(&self, documents: &[Document]) -> Result<String, PluginError> {
        let mut body = String::new();

        for doc in documents {
            let action = json!({ "index": { "_index": self.index, "_id": doc.id } });
            let source = serde_json::to_string(doc)
                .map_err(|e| PluginError::Send(format!("document serialization: {e}")))?;
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&source);
            body.push('\n');
        }

        Ok(body)
    }
}

#[async_trait]
impl Emitter for SearchEmitter {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn emit(&self, documents: &[Document]) -> Result<(), PluginError> {
        if documents.is_empty() {
            return Ok(());
        }

        let url = format!("{}/_bulk", self.base_url);
        let body = self.bulk_body(documents)?;

        let mut request = self
            .client
            .post(&url)
            .header("content-type", "application/x-ndjson")
            .body(body);

        if let Some(auth) = &self.auth_header {
            request = request.header("authorization", auth.clone());
        }

        match request.send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    error!(url = %url, status = %status, body = %body, "Bulk request failed");
                    return Err(PluginError::Send(format!("bulk returned {status}: {body}")));
                }

                let bulk: BulkResponse = response
                    .json()
                    .await
                    .map_err(|e| PluginError::Send(format!("bulk response decode: {e}")))?;

                if bulk.errors {
                    // Partial failure: the sink accepted the request but
                    // rejected individual documents.
                    warn!(
                        url = %url,
                        items = bulk.items.len(),
                        "Bulk response reported per-document errors"
                    );
                    return Err(PluginError::Send(
                        "bulk response reported per-document errors".to_string(),
                    ));
                }

                debug!(url = %url, count = documents.len(), "Bulk indexed");
                Ok(())
            }
            Err(e) => {
                error!(url = %url, error = %e, "Sink connection failed");
                Err(PluginError::Connection(format!(
                    "Failed to connect to {url}: {e}"
                )))
            }
        }
    }

    async fn health(&self) -> bool {
        // HEAD to the endpoint root; any response means the sink is
        // reachable, only connection errors indicate unhealthy.
        match self.client.head(&self.base_url).send().await {
            Ok(response) => {
                let healthy = response.status().is_success()
                    || response.status().is_client_error()
                    || response.status().is_redirection();
                if !healthy {
                    debug!(
                        url = %self.base_url,
                        status = %response.status(),
                        "Health check returned server error"
                    );
                }
                healthy
            }
            Err(e) => {
                debug!(url = %self.base_url, error = %e, "Health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Bytes,
        extract::State,
        http::StatusCode,
        routing::{head, post},
    };
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Shared state for the mock sink
    #[derive(Default)]
    struct MockSinkState {
        bodies: Mutex<Vec<String>>,
        request_count: AtomicUsize,
    }

    async fn start_mock_sink() -> (SocketAddr, Arc<MockSinkState>) {
        let state = Arc::new(MockSinkState::default());

        let app = Router::new()
            .route("/_bulk", post(handle_bulk))
            .route("/", head(handle_head))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        (addr, state)
    }

    async fn handle_bulk(
        State(state): State<Arc<MockSinkState>>,
        body: Bytes,
    ) -> (StatusCode, String) {
        state.request_count.fetch_add(1, Ordering::Relaxed);
        let mut bodies = state.bodies.lock().await;
        bodies.push(String::from_utf8_lossy(&body).to_string());
        (
            StatusCode::OK,
            json!({ "took": 1, "errors": false, "items": [] }).to_string(),
        )
    }

    async fn handle_head() -> StatusCode {
        StatusCode::OK
    }

    fn make_document(id: &str) -> Document {
        let raw = json!({
            "@type": "room",
            "id": id,
            "time": "2025-12-12T00:00:00Z",
            "trace_id": "t1",
            "span_id": "s1",
            "trace_flags": "01"
        });
        Document::from_raw(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_search_emitter_creates() {
        let emitter = SearchEmitter::new("http://localhost:9200", "koti-events").unwrap();
        assert_eq!(emitter.name(), "search");
    }

    #[tokio::test]
    async fn test_bulk_body_format() {
        let emitter = SearchEmitter::new("http://localhost:9200", "koti-events").unwrap();
        let docs = vec![make_document("hz_1"), make_document("hz_2")];

        let body = emitter.bulk_body(&docs).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_index"], json!("koti-events"));
        assert_eq!(action["index"]["_id"], json!("hz_1"));

        let source: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(source["@type"], json!("room"));
        assert_eq!(source["id"], json!("hz_1"));
    }

    #[tokio::test]
    async fn test_emit_delivers_bulk_request() {
        let (addr, state) = start_mock_sink().await;
        let emitter = SearchEmitter::new(format!("http://{addr}"), "koti-events").unwrap();

        let docs = vec![make_document("hz_1"), make_document("hz_2")];
        emitter.emit(&docs).await.unwrap();

        let bodies = state.bodies.lock().await;
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("hz_1"));
        assert!(bodies[0].contains("hz_2"));
    }

    #[tokio::test]
    async fn test_emit_skips_empty_batch() {
        let (addr, state) = start_mock_sink().await;
        let emitter = SearchEmitter::new(format!("http://{addr}"), "koti-events").unwrap();

        emitter.emit(&[]).await.unwrap();
        assert_eq!(state.request_count.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_health_check() {
        let (addr, _state) = start_mock_sink().await;
        let emitter = SearchEmitter::new(format!("http://{addr}"), "koti-events").unwrap();
        assert!(emitter.health().await);
    }

    #[tokio::test]
    async fn test_emit_fails_on_unreachable_sink() {
        let emitter = SearchEmitter::new("http://127.0.0.1:1", "koti-events").unwrap();
        let docs = vec![make_document("hz_1")];
        assert!(emitter.emit(&docs).await.is_err());
    }

    #[tokio::test]
    async fn test_basic_auth_header_is_encoded() {
        let emitter = SearchEmitter::new("http://localhost:9200", "koti-events")
            .unwrap()
            .basic_auth("elastic", "secret");
        // "elastic:secret" in base64
        assert_eq!(
            emitter.auth_header.as_deref(),
            Some("Basic ZWxhc3RpYzpzZWNyZXQ=")
        );
    }
}
