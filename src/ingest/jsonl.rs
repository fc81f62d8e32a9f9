//! Newline-delimited JSON ingestor
//!
//! Decodes hub captures stored one record per line. Used for replaying
//! recorded traffic through the pipeline and for local debugging.

use crate::error::PluginError;
use crate::ingest::{IngestContext, Ingestor};
use serde_json::Value;
use tracing::warn;

/// Ingestor for newline-delimited JSON captures
///
/// Unparseable lines are logged and skipped - a corrupt line in a
/// capture must not block the rest of the file.
pub struct JsonLines;

impl Ingestor for JsonLines {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn ingest(&self, ctx: &IngestContext, data: &[u8]) -> Result<Vec<Value>, PluginError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| PluginError::Decode(format!("invalid UTF-8: {e}")))?;

        let mut records = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        source = ctx.source,
                        line = line_no + 1,
                        error = %e,
                        "Skipping unparseable capture line"
                    );
                }
            }
        }

        Ok(records)
    }
}
