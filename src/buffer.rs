//! Ring buffer for normalized documents awaiting delivery

use crate::transform::Document;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe ring buffer for documents
///
/// When full, oldest documents are dropped (FIFO eviction).
/// Provides counters for monitoring buffer state.
pub struct RingBuffer {
    documents: Mutex<VecDeque<Document>>,
    capacity: usize,
    counters: BufferCounters,
}

/// Counters for buffer monitoring
pub struct BufferCounters {
    /// Total documents pushed
    pub pushed: AtomicU64,
    /// Total documents dropped due to full buffer
    pub dropped: AtomicU64,
    /// Total documents drained
    pub drained: AtomicU64,
}

impl Default for BufferCounters {
    fn default() -> Self {
        Self {
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            drained: AtomicU64::new(0),
        }
    }
}

impl RingBuffer {
    /// Create a new ring buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            documents: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            counters: BufferCounters::default(),
        }
    }

    /// Push documents into the buffer
    ///
    /// Returns the number of documents dropped due to capacity limits.
    pub fn push(&self, documents: Vec<Document>) -> usize {
        let mut buffer = self.documents.lock();
        let mut dropped = 0;

        let pushed = documents.len();
        for doc in documents {
            if buffer.len() >= self.capacity {
                // Drop oldest document (FIFO eviction)
                buffer.pop_front();
                dropped += 1;
            }
            buffer.push_back(doc);
        }

        self.counters.pushed.fetch_add(pushed as u64, Ordering::Relaxed);
        self.counters.dropped.fetch_add(dropped as u64, Ordering::Relaxed);

        dropped
    }

    /// Drain up to `n` documents from the buffer
    ///
    /// Returns the drained documents in FIFO order.
    pub fn drain(&self, n: usize) -> Vec<Document> {
        let mut buffer = self.documents.lock();
        let drain_count = n.min(buffer.len());
        let documents: Vec<Document> = buffer.drain(..drain_count).collect();

        self.counters
            .drained
            .fetch_add(documents.len() as u64, Ordering::Relaxed);

        documents
    }

    /// Get current number of documents in buffer
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get current fill percentage (0.0 - 1.0)
    pub fn fill_ratio(&self) -> f64 {
        let len = self.documents.lock().len();
        len as f64 / self.capacity as f64
    }

    /// Get total documents pushed
    pub fn total_pushed(&self) -> u64 {
        self.counters.pushed.load(Ordering::Relaxed)
    }

    /// Get total documents dropped
    pub fn total_dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Get total documents drained
    pub fn total_drained(&self) -> u64 {
        self.counters.drained.load(Ordering::Relaxed)
    }
}
