//! Ingestor system for KOTI
//!
//! Ingestors decode raw bytes from a source into raw JSON records.
//! Classification happens centrally in the pipeline, so an ingestor
//! only needs to know its source's framing, not the event model.

pub mod hub;
pub mod jsonl;

use crate::error::PluginError;
use serde_json::Value;

pub use hub::HubPoller;
pub use jsonl::JsonLines;

/// Context for ingestion
#[derive(Debug, Clone)]
pub struct IngestContext<'a> {
    /// Source identifier (e.g., "hub", "capture-file")
    pub source: &'a str,
}

/// Ingestor trait - decodes source bytes into raw records
///
/// # Example
///
/// ```ignore
/// struct MyCaptureIngestor;
///
/// impl Ingestor for MyCaptureIngestor {
///     fn name(&self) -> &'static str { "my-capture" }
///
///     fn ingest(&self, ctx: &IngestContext, data: &[u8]) -> Result<Vec<Value>, PluginError> {
///         let records: Vec<Value> = decode(data)?;
///         Ok(records)
///     }
/// }
/// ```
pub trait Ingestor: Send + Sync {
    /// Ingestor name for identification and logging
    fn name(&self) -> &'static str;

    /// Decode raw bytes into raw records
    fn ingest(&self, ctx: &IngestContext, data: &[u8]) -> Result<Vec<Value>, PluginError>;
}
