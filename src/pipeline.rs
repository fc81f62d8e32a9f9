//! Pipeline - the central record flow for KOTI
//!
//! The Pipeline provides a builder for configuring and running the
//! normalization flow. No YAML, just code.
//!
//! # Architecture
//!
//! ```text
//! Record Channel ──► classify + transform ──► RingBuffer ──► Emitters (fan-out)
//! ```
//!
//! Classification failures are counted and logged per record; one bad
//! record never halts the stream.
//!
//! # Example
//!
//! ```ignore
//! use koti_gateway::{Pipeline, StdoutEmitter};
//!
//! let (sender, runner) = Pipeline::new()
//!     .emitter(StdoutEmitter::new())
//!     .build();
//! tokio::spawn(runner.run());
//! sender.send(raw_record).await?;
//! ```

use crate::buffer::RingBuffer;
use crate::emit::Emitter;
use crate::error::PluginError;
use crate::metrics;
use crate::transform::Document;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// The Pipeline - central record flow
pub struct Pipeline {
    /// Buffer capacity
    buffer_capacity: usize,
    /// Batch size per flush
    batch_size: usize,
    /// Flush interval
    flush_interval: Duration,
    /// Registered emitters
    emitters: Vec<Arc<dyn Emitter>>,
}

impl Pipeline {
    /// Create a new Pipeline with default settings
    pub fn new() -> Self {
        Self {
            buffer_capacity: 10_000,
            batch_size: 500,
            flush_interval: Duration::from_millis(1_000),
            emitters: Vec::new(),
        }
    }

    /// Set the buffer capacity
    ///
    /// Default is 10,000 documents.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the flush batch size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Add an emitter destination
    ///
    /// All documents are sent to all emitters (fan-out).
    pub fn emitter<E: Emitter + 'static>(mut self, emitter: E) -> Self {
        self.emitters.push(Arc::new(emitter));
        self
    }

    /// Add an emitter destination (Arc version)
    pub fn emitter_arc(mut self, emitter: Arc<dyn Emitter>) -> Self {
        self.emitters.push(emitter);
        self
    }

    /// Build the record sender and runner for this pipeline
    ///
    /// The sender injects raw hub records; the runner owns the
    /// transform loop and the flush task.
    pub fn build(self) -> (RecordSender, PipelineRunner) {
        let (tx, rx) = mpsc::channel(1024);

        let sender = RecordSender { tx };

        let runner = PipelineRunner {
            rx,
            buffer: Arc::new(RingBuffer::new(self.buffer_capacity)),
            batch_size: self.batch_size,
            flush_interval: self.flush_interval,
            emitters: self.emitters,
        };

        (sender, runner)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Sender for injecting raw records into the pipeline
#[derive(Clone)]
pub struct RecordSender {
    tx: mpsc::Sender<Value>,
}

impl RecordSender {
    /// Send a raw record into the pipeline
    pub async fn send(&self, record: Value) -> Result<(), PluginError> {
        self.tx
            .send(record)
            .await
            .map_err(|e| PluginError::Send(e.to_string()))
    }

    /// Try to send a raw record without blocking
    pub fn try_send(&self, record: Value) -> Result<(), PluginError> {
        self.tx
            .try_send(record)
            .map_err(|e| PluginError::Send(e.to_string()))
    }
}

/// Pipeline runner - transforms records and flushes documents
pub struct PipelineRunner {
    rx: mpsc::Receiver<Value>,
    buffer: Arc<RingBuffer>,
    batch_size: usize,
    flush_interval: Duration,
    emitters: Vec<Arc<dyn Emitter>>,
}

impl PipelineRunner {
    /// Run the pipeline until the record channel closes
    ///
    /// This will:
    /// 1. Receive raw records from the channel
    /// 2. Classify and transform each one independently
    /// 3. Buffer the resulting documents
    /// 4. Periodically flush batches to all emitters
    /// 5. On shutdown, drain the buffer and shut emitters down
    pub async fn run(mut self) -> Result<(), PluginError> {
        info!(
            emitters = self.emitters.len(),
            buffer_capacity = self.buffer.capacity(),
            batch_size = self.batch_size,
            "Pipeline started"
        );

        if self.emitters.is_empty() {
            warn!("No emitters registered - documents will be buffered but not delivered");
        }

        if let Some(m) = metrics::Metrics::get() {
            m.set_buffer_capacity(self.buffer.capacity());
        }

        // Spawn the periodic flusher
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let buffer = Arc::clone(&self.buffer);
        let emitters = self.emitters.clone();
        let batch_size = self.batch_size;
        let flush_interval = self.flush_interval;
        let flush_handle = tokio::spawn(async move {
            flush_loop(buffer, emitters, batch_size, flush_interval, shutdown_rx).await;
        });

        // Process incoming records
        while let Some(record) = self.rx.recv().await {
            match Document::from_raw(&record) {
                Ok(doc) => {
                    metrics::try_record_received("hub", doc.event_type(), 1);
                    debug!(id = %doc.id, event_type = doc.event_type(), "Document buffered");
                    let dropped = self.buffer.push(vec![doc]);
                    if dropped > 0 {
                        warn!(dropped, "Buffer overflow, documents dropped");
                        metrics::try_record_dropped("buffer_overflow", dropped as u64);
                    }
                    if let Some(m) = metrics::Metrics::get() {
                        m.set_buffer_size(self.buffer.len());
                    }
                }
                Err(err) => {
                    // Reported, never fatal: operators watch this to
                    // discover new upstream event kinds.
                    warn!(error = %err, "Record rejected");
                    metrics::try_record_rejected(err.reason_label());
                }
            }
        }

        // Channel closed: signal the flusher and wait for it, so a batch
        // it already drained still reaches the emitters before the final
        // drain below.
        let _ = shutdown_tx.send(true);
        if let Err(e) = flush_handle.await {
            error!(error = %e, "Flush task failed");
        }

        let remaining = self.buffer.drain(self.buffer.len());
        if !remaining.is_empty() {
            info!(count = remaining.len(), "Flushing remaining documents");
            emit_to_all(&self.emitters, &remaining).await;
        }

        for emitter in &self.emitters {
            if let Err(e) = emitter.shutdown().await {
                error!(emitter = emitter.name(), error = %e, "Error during emitter shutdown");
            }
        }

        info!("Pipeline shutdown");
        Ok(())
    }

    /// Get a reference to the buffer for monitoring
    pub fn buffer(&self) -> &Arc<RingBuffer> {
        &self.buffer
    }
}

/// Background flush loop - sends buffered documents to emitters
///
/// Stops between batches when the shutdown signal arrives; a batch
/// already handed to the emitters always completes.
async fn flush_loop(
    buffer: Arc<RingBuffer>,
    emitters: Vec<Arc<dyn Emitter>>,
    batch_size: usize,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => return,
        }

        let documents = buffer.drain(batch_size);
        if documents.is_empty() {
            continue;
        }

        if let Some(m) = metrics::Metrics::get() {
            m.set_buffer_size(buffer.len());
        }

        emit_to_all(&emitters, &documents).await;
    }
}

/// Deliver one batch to every emitter (fan-out)
///
/// Failures are logged per emitter and don't stop delivery to the rest.
async fn emit_to_all(emitters: &[Arc<dyn Emitter>], documents: &[Document]) {
    for emitter in emitters {
        let start = std::time::Instant::now();
        match emitter.emit(documents).await {
            Ok(()) => {
                if let Some(m) = metrics::Metrics::get() {
                    for doc in documents {
                        m.record_indexed(emitter.name(), doc.event_type(), 1);
                    }
                    m.record_latency(emitter.name(), start.elapsed().as_secs_f64());
                }
                debug!(
                    emitter = emitter.name(),
                    count = documents.len(),
                    "Documents delivered"
                );
            }
            Err(e) => {
                error!(
                    emitter = emitter.name(),
                    error = %e,
                    count = documents.len(),
                    "Failed to deliver documents"
                );
            }
        }
    }
}
