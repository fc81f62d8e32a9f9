//! KOTI - Home-Automation Hub Event Gateway
//!
//! Ingests event streams from a home-automation hub (device, room,
//! message, and client telemetry), normalizes them, and forwards
//! storage-ready documents to a search/analytics datastore.
//!
//! # Architecture
//!
//! ```text
//! Hub (long-poll) ──► classify ──► {metric, doc id} ──► buffer ──► Emitters
//! ```
//!
//! The normalization core (`event`, `normalize`, `transform`) is pure
//! and per-record independent; everything around it is pluggable
//! plumbing via the [`Ingestor`](ingest::Ingestor) and
//! [`Emitter`](emit::Emitter) traits.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod buffer;
pub mod config;
pub mod emit;
pub mod error;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod metrics_server;
pub mod normalize;
pub mod pipeline;
pub mod transform;

pub use config::Config;
pub use emit::{Emitter, SearchEmitter, StdoutEmitter};
pub use error::{ClassifyError, KotiError, PluginError, Result};
pub use event::Event;
pub use ingest::{HubPoller, Ingestor, JsonLines};
pub use normalize::{Metric, MetricValue, doc_id, extract_metric};
pub use pipeline::{Pipeline, RecordSender};
pub use transform::Document;
