//! Document transform - raw record to storage-ready document
//!
//! One record in, one document (or one typed error) out:
//!
//! ```text
//! raw record ──► classify ──► extract_metric ──► doc_id ──► Document
//! ```
//!
//! The transform holds no state between invocations, so it is safe to
//! call in a tight loop or in parallel across a batch. One bad record
//! yields a reported error and never blocks the rest.

use crate::error::ClassifyError;
use crate::event::Event;
use crate::normalize::{Metric, doc_id, extract_metric};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Storage-ready shape for one accepted hub record.
///
/// Serializes as `{ "id", "metric"?, ...normalized event fields... }`.
/// `id` is guaranteed non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub metric: Option<Metric>,
    pub event: Event,
}

impl Serialize for Document {
    /// Flattens the normalized event fields and overlays `id` and
    /// `metric` on top. The event's own `id` field collides with the
    /// document key; the generated id must win, and the output must
    /// never carry a duplicate `"id"` key.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::Error;

        let mut body = serde_json::to_value(&self.event).map_err(S::Error::custom)?;
        let map = body
            .as_object_mut()
            .ok_or_else(|| S::Error::custom("event did not serialize to an object"))?;

        if let Some(metric) = &self.metric {
            let metric = serde_json::to_value(metric).map_err(S::Error::custom)?;
            map.insert("metric".to_string(), metric);
        }
        map.insert("id".to_string(), Value::String(self.id.clone()));

        body.serialize(serializer)
    }
}

impl Document {
    /// Transform one raw record into a document.
    pub fn from_raw(raw: &Value) -> std::result::Result<Document, ClassifyError> {
        let event = Event::classify(raw)?;
        Ok(Document::from_event(event))
    }

    /// Normalize an already-classified event.
    pub fn from_event(event: Event) -> Document {
        let id = doc_id(&event);
        let metric = extract_metric(&event);
        Document { id, metric, event }
    }

    /// The discriminator of the underlying event.
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

/// Transform a batch of raw records, splitting successes from failures.
///
/// Per-record independence: results are identical whether records are
/// processed here one by one or concurrently elsewhere.
pub fn transform_batch(raws: &[Value]) -> (Vec<Document>, Vec<ClassifyError>) {
    let mut documents = Vec::with_capacity(raws.len());
    let mut failures = Vec::new();

    for raw in raws {
        match Document::from_raw(raw) {
            Ok(doc) => documents.push(doc),
            Err(err) => failures.push(err),
        }
    }

    (documents, failures)
}
