//! Emitter system for KOTI
//!
//! Emitters deliver normalized documents to destinations (the search
//! datastore, stdout for debugging, ...). All registered emitters
//! receive documents in a fan-out pattern.

pub mod search;
pub mod stdout;

use crate::error::PluginError;
use crate::transform::Document;
use async_trait::async_trait;

pub use search::SearchEmitter;
pub use stdout::StdoutEmitter;

/// Emitter trait - delivers documents to a destination
///
/// Each emitter handles one destination. Multiple emitters can be
/// registered on the pipeline and every batch is sent to all of them.
///
/// # Example
///
/// ```ignore
/// struct MyStoreEmitter {
///     client: MyStoreClient,
/// }
///
/// #[async_trait]
/// impl Emitter for MyStoreEmitter {
///     fn name(&self) -> &'static str { "my-store" }
///
///     async fn emit(&self, documents: &[Document]) -> Result<(), PluginError> {
///         self.client.write_batch(documents).await?;
///         Ok(())
///     }
///
///     async fn health(&self) -> bool {
///         self.client.ping().await.is_ok()
///     }
/// }
/// ```
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Emitter name for identification and logging
    fn name(&self) -> &'static str;

    /// Deliver a batch of documents to the destination
    async fn emit(&self, documents: &[Document]) -> Result<(), PluginError>;

    /// Health check for the destination
    ///
    /// Returns true if the destination is reachable and accepting writes.
    async fn health(&self) -> bool;

    /// Graceful shutdown
    ///
    /// Called when the gateway is shutting down to flush and close
    /// connections.
    async fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}
