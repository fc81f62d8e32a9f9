//! Hub long-poll ingestor
//!
//! Subscribes to the home-automation hub's JSON-RPC event API and
//! long-polls it for batches of raw records, feeding them into the
//! pipeline channel. Subscriptions lapse when a poll is missed for too
//! long, so the loop re-subscribes after any poll failure.

use crate::error::PluginError;
use crate::pipeline::RecordSender;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Extra margin on the HTTP timeout beyond the long-poll window
const POLL_TIMEOUT_MARGIN_SECS: u64 = 10;
/// Pause before re-subscribing after a failed poll
const RESUBSCRIBE_DELAY_SECS: u64 = 1;

/// JSON-RPC response envelope from the hub
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Long-polls the hub's event API and feeds raw records downstream
pub struct HubPoller {
    client: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl HubPoller {
    /// Create a poller for the given hub base URL
    ///
    /// `poll_timeout_secs` is the long-poll window the hub holds a
    /// request open for; the HTTP timeout gets an extra margin on top.
    ///
    /// # Errors
    /// Returns `PluginError::Init` if the HTTP client cannot be created
    pub fn new(base_url: impl Into<String>, poll_timeout_secs: u64) -> Result<Self, PluginError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + POLL_TIMEOUT_MARGIN_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PluginError::Init(format!("Failed to build HTTP client: {e}")))?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_timeout_secs,
        })
    }

    fn rpc_url(&self) -> String {
        format!("{}/remote/json-rpc", self.base_url)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, PluginError> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.rpc_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| PluginError::Connection(format!("hub request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PluginError::Connection(format!(
                "hub returned {}",
                response.status()
            )));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| PluginError::Decode(format!("hub response decode: {e}")))?;

        if let Some(error) = rpc.error {
            return Err(PluginError::Send(format!("hub rpc error: {error}")));
        }

        rpc.result
            .ok_or_else(|| PluginError::Decode("hub response missing result".to_string()))
    }

    /// Open a long-poll subscription, returning the subscription id
    async fn subscribe(&self) -> Result<String, PluginError> {
        let result = self
            .call("RE/subscribe", json!(["com/bosch/sh/remote/*", null]))
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PluginError::Decode("subscription id is not a string".to_string()))
    }

    /// Long-poll one batch of raw records for a subscription
    async fn poll(&self, subscription: &str) -> Result<Vec<Value>, PluginError> {
        let result = self
            .call("RE/longPoll", json!([subscription, self.poll_timeout_secs]))
            .await?;

        match result {
            Value::Array(records) => Ok(records),
            other => Err(PluginError::Decode(format!(
                "long-poll result is not an array: {other}"
            ))),
        }
    }

    /// Poll the hub until the pipeline channel closes
    ///
    /// A failed poll logs a warning, waits briefly, and re-subscribes.
    /// Anything more elaborate (backoff policy, jitter) is deliberately
    /// left to the operator's process supervisor.
    pub async fn run(self, sender: RecordSender) -> Result<(), PluginError> {
        let mut subscription = self.subscribe().await?;
        info!(
            hub = %self.base_url,
            subscription = %subscription,
            "Hub poller subscribed"
        );

        loop {
            match self.poll(&subscription).await {
                Ok(records) => {
                    debug!(count = records.len(), "Hub poll returned records");
                    for record in records {
                        if sender.send(record).await.is_err() {
                            info!("Pipeline channel closed, hub poller stopping");
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Hub poll failed, re-subscribing");
                    tokio::time::sleep(Duration::from_secs(RESUBSCRIBE_DELAY_SECS)).await;
                    subscription = self.subscribe().await?;
                    info!(subscription = %subscription, "Hub poller re-subscribed");
                }
            }
        }
    }

    /// Poll once into a plain channel - used by captures and tests
    pub async fn poll_once(
        &self,
        subscription: &str,
        sender: &mpsc::Sender<Value>,
    ) -> Result<usize, PluginError> {
        let records = self.poll(subscription).await?;
        let count = records.len();
        for record in records {
            sender
                .send(record)
                .await
                .map_err(|e| PluginError::Send(e.to_string()))?;
        }
        Ok(count)
    }
}
