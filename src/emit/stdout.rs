//! Stdout emitter for debugging
//!
//! Prints documents to stdout in a human-readable format.
//! Useful for development and for verifying hub captures.

use crate::emit::Emitter;
use crate::error::PluginError;
use crate::transform::Document;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stdout emitter - prints documents for debugging
pub struct StdoutEmitter {
    /// Pretty print documents as JSON
    pretty: bool,
    /// Count of documents emitted
    emitted_count: AtomicU64,
}

impl StdoutEmitter {
    /// Create a new StdoutEmitter
    pub fn new() -> Self {
        Self {
            pretty: false,
            emitted_count: AtomicU64::new(0),
        }
    }

    /// Create a new StdoutEmitter with pretty printing
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            emitted_count: AtomicU64::new(0),
        }
    }

    /// Get total documents emitted
    pub fn emitted_count(&self) -> u64 {
        self.emitted_count.load(Ordering::Relaxed)
    }
}

impl Default for StdoutEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Emitter for StdoutEmitter {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn emit(&self, documents: &[Document]) -> Result<(), PluginError> {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();

        for doc in documents {
            if self.pretty {
                let body = serde_json::to_string_pretty(doc)
                    .unwrap_or_else(|_| "<unserializable document>".to_string());
                writeln!(stdout, "{body}").ok();
            } else {
                // Compact format
                match &doc.metric {
                    Some(metric) => {
                        writeln!(
                            stdout,
                            "[{}] {} metric={} ({:?})",
                            doc.event_type(),
                            doc.id,
                            metric.name,
                            metric.value
                        )
                        .ok();
                    }
                    None => {
                        writeln!(stdout, "[{}] {}", doc.event_type(), doc.id).ok();
                    }
                }
            }
        }

        self.emitted_count
            .fetch_add(documents.len() as u64, Ordering::Relaxed);

        Ok(())
    }

    async fn health(&self) -> bool {
        // Stdout is always healthy
        true
    }
}
