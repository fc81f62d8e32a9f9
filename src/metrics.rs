//! Prometheus metrics for KOTI

use crate::error::{KotiError, Result};
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramVec, TextEncoder, register_counter_vec, register_gauge,
    register_histogram_vec,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All KOTI metrics
pub struct Metrics {
    /// Raw records received from the hub (by source, type)
    pub records_received: CounterVec,

    /// Records rejected during classification (by reason)
    pub records_rejected: CounterVec,

    /// Documents delivered to a sink (by emitter, type)
    pub documents_indexed: CounterVec,

    /// Documents dropped (by reason)
    pub documents_dropped: CounterVec,

    /// Current buffer size
    pub buffer_size: Gauge,

    /// Buffer capacity
    pub buffer_capacity: Gauge,

    /// Sink delivery latency (by emitter)
    pub sink_latency: HistogramVec,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            records_received: register_counter_vec!(
                "koti_records_received_total",
                "Total raw records received from the hub",
                &["source", "type"]
            )
            .map_err(|e| KotiError::Metrics(format!("records_received: {e}")))?,

            records_rejected: register_counter_vec!(
                "koti_records_rejected_total",
                "Total records rejected during classification",
                &["reason"]
            )
            .map_err(|e| KotiError::Metrics(format!("records_rejected: {e}")))?,

            documents_indexed: register_counter_vec!(
                "koti_documents_indexed_total",
                "Total documents delivered to sinks",
                &["emitter", "type"]
            )
            .map_err(|e| KotiError::Metrics(format!("documents_indexed: {e}")))?,

            documents_dropped: register_counter_vec!(
                "koti_documents_dropped_total",
                "Total documents dropped",
                &["reason"]
            )
            .map_err(|e| KotiError::Metrics(format!("documents_dropped: {e}")))?,

            buffer_size: register_gauge!(
                "koti_buffer_size",
                "Current number of documents in buffer"
            )
            .map_err(|e| KotiError::Metrics(format!("buffer_size: {e}")))?,

            buffer_capacity: register_gauge!("koti_buffer_capacity", "Maximum buffer capacity")
                .map_err(|e| KotiError::Metrics(format!("buffer_capacity: {e}")))?,

            sink_latency: register_histogram_vec!(
                "koti_sink_latency_seconds",
                "Sink delivery latency",
                &["emitter"],
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
            )
            .map_err(|e| KotiError::Metrics(format!("sink_latency: {e}")))?,
        };

        // Set the metrics (only succeeds once)
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| KotiError::Metrics("Failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Record raw records received
    pub fn record_received(&self, source: &str, event_type: &str, count: u64) {
        self.records_received
            .with_label_values(&[source, event_type])
            .inc_by(count as f64);
    }

    /// Record a rejected record
    pub fn record_rejected(&self, reason: &str) {
        self.records_rejected.with_label_values(&[reason]).inc();
    }

    /// Record documents delivered
    pub fn record_indexed(&self, emitter: &str, event_type: &str, count: u64) {
        self.documents_indexed
            .with_label_values(&[emitter, event_type])
            .inc_by(count as f64);
    }

    /// Record documents dropped
    pub fn record_dropped(&self, reason: &str, count: u64) {
        self.documents_dropped
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }

    /// Update buffer size
    pub fn set_buffer_size(&self, size: usize) {
        self.buffer_size.set(size as f64);
    }

    /// Update buffer capacity
    pub fn set_buffer_capacity(&self, capacity: usize) {
        self.buffer_capacity.set(capacity as f64);
    }

    /// Record sink delivery latency
    pub fn record_latency(&self, emitter: &str, seconds: f64) {
        self.sink_latency
            .with_label_values(&[emitter])
            .observe(seconds);
    }
}

/// Gather all metrics and encode as Prometheus text format
///
/// Returns the metrics as a String, ready to be served via HTTP.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Helper to record received records if metrics are initialized
pub fn try_record_received(source: &str, event_type: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.record_received(source, event_type, count);
    }
}

/// Helper to record a rejection if metrics are initialized
pub fn try_record_rejected(reason: &str) {
    if let Some(m) = Metrics::get() {
        m.record_rejected(reason);
    }
}

/// Helper to record dropped documents if metrics are initialized
pub fn try_record_dropped(reason: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.record_dropped(reason, count);
    }
}
