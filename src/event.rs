//! Event model for hub telemetry
//!
//! The hub emits a closed set of five record shapes, discriminated by
//! the `@type` field. Classification turns an untyped wire record into
//! exactly one variant or a typed [`ClassifyError`] - unrecognized
//! discriminators are reported, never silently accepted, so new hub
//! firmware event kinds surface operationally instead of vanishing.
//!
//! Events are immutable and transient: built from one raw record,
//! consumed by the transform functions, then discarded.

use crate::error::ClassifyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Correlation envelope carried by every hub record.
///
/// The trace fields are attached by an external instrumentation layer
/// and passed through opaque - KOTI never interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// ISO-8601 event timestamp
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    #[serde(default)]
    pub trace_flags: String,
}

/// A reading from one service of one device.
///
/// The nested `state` payload has its own hub-controlled `@type`
/// vocabulary (humidity state, valve state, climate state, ...) that is
/// open-ended upstream, so it stays a generic JSON value rather than an
/// enumeration. Malformed state shapes degrade to "no metric" later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceServiceData {
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Owning device id; observed absent on some hub firmwares, kept loose
    #[serde(default)]
    pub device_id: Value,
    /// Service id, e.g. "HumidityLevel"
    pub id: String,
    #[serde(default)]
    pub path: Value,
    #[serde(default)]
    pub state: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faults: Option<Value>,
}

/// Device metadata record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Remaining hub fields, preserved verbatim for the document
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Room metadata record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub id: String,
    /// Absent on a measurable share of real-world records (6/371 in a
    /// production sample) - must stay optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_properties: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Hub message record (notifications, alerts).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Paired-client record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The closed union of recognized hub events.
///
/// Consumers match exhaustively with no wildcard arm, so adding a
/// variant here fails to compile until every consumer handles it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "@type")]
pub enum Event {
    #[serde(rename = "DeviceServiceData")]
    DeviceServiceData(DeviceServiceData),
    #[serde(rename = "device")]
    Device(Device),
    #[serde(rename = "room")]
    Room(Room),
    #[serde(rename = "message")]
    Message(Message),
    #[serde(rename = "client")]
    Client(Client),
}

impl Event {
    /// Classify a raw wire record into a typed event.
    ///
    /// Pure function: inspects the `@type` discriminator, then shapes
    /// the record into the matching variant. Distinguishes two failure
    /// kinds - an unrecognized discriminator
    /// ([`ClassifyError::UnknownEventType`], carrying the raw string)
    /// versus a recognized one with missing or invalid required fields
    /// ([`ClassifyError::MalformedEvent`]).
    pub fn classify(raw: &Value) -> std::result::Result<Event, ClassifyError> {
        let obj = match raw.as_object() {
            Some(obj) => obj,
            None => {
                return Err(ClassifyError::MalformedEvent {
                    event_type: "<none>".to_string(),
                    reason: "record is not a JSON object".to_string(),
                });
            }
        };

        let tag = match obj.get("@type").and_then(Value::as_str) {
            Some(tag) => tag,
            None => {
                return Err(ClassifyError::MalformedEvent {
                    event_type: "<none>".to_string(),
                    reason: "missing '@type' discriminator".to_string(),
                });
            }
        };

        // The discriminator is consumed here; the variant structs see
        // only the remaining fields (their flatten maps must not
        // capture a stray "@type").
        let mut fields = obj.clone();
        fields.remove("@type");
        let body = Value::Object(fields);

        let malformed = |e: serde_json::Error| ClassifyError::MalformedEvent {
            event_type: tag.to_string(),
            reason: e.to_string(),
        };

        match tag {
            "DeviceServiceData" => Ok(Event::DeviceServiceData(
                serde_json::from_value(body).map_err(malformed)?,
            )),
            "device" => Ok(Event::Device(serde_json::from_value(body).map_err(malformed)?)),
            "room" => Ok(Event::Room(serde_json::from_value(body).map_err(malformed)?)),
            "message" => Ok(Event::Message(serde_json::from_value(body).map_err(malformed)?)),
            "client" => Ok(Event::Client(serde_json::from_value(body).map_err(malformed)?)),
            other => Err(ClassifyError::UnknownEventType {
                event_type: other.to_string(),
            }),
        }
    }

    /// The discriminator value this event was classified under.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::DeviceServiceData(_) => "DeviceServiceData",
            Event::Device(_) => "device",
            Event::Room(_) => "room",
            Event::Message(_) => "message",
            Event::Client(_) => "client",
        }
    }

    /// Common envelope shared by all variants.
    pub fn envelope(&self) -> &Envelope {
        match self {
            Event::DeviceServiceData(e) => &e.envelope,
            Event::Device(e) => &e.envelope,
            Event::Room(e) => &e.envelope,
            Event::Message(e) => &e.envelope,
            Event::Client(e) => &e.envelope,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope_fields() -> Value {
        json!({
            "time": "2025-12-12T00:00:00Z",
            "trace_id": "t1",
            "span_id": "s1",
            "trace_flags": "01"
        })
    }

    fn merged(extra: Value) -> Value {
        let mut base = envelope_fields();
        let obj = base.as_object_mut().unwrap();
        for (k, v) in extra.as_object().unwrap() {
            obj.insert(k.clone(), v.clone());
        }
        base
    }

    #[test]
    fn test_classify_device_service_data() {
        let raw = merged(json!({
            "@type": "DeviceServiceData",
            "deviceId": "hdm:HomeMaticIP:3014",
            "id": "HumidityLevel",
            "path": "/devices/hdm:HomeMaticIP:3014/services/HumidityLevel",
            "state": { "@type": "humidityLevelState", "humidity": 39.8 }
        }));

        let event = Event::classify(&raw).unwrap();
        match event {
            Event::DeviceServiceData(data) => {
                assert_eq!(data.id, "HumidityLevel");
                assert_eq!(data.device_id, json!("hdm:HomeMaticIP:3014"));
                assert_eq!(data.state["humidity"], json!(39.8));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_classify_room_without_ext_properties() {
        let raw = merged(json!({
            "@type": "room",
            "id": "hz_1",
            "name": "Living Room",
            "iconId": "1"
        }));

        let event = Event::classify(&raw).unwrap();
        match event {
            Event::Room(room) => {
                assert_eq!(room.id, "hz_1");
                assert!(room.ext_properties.is_none());
                assert_eq!(room.extra["name"], json!("Living Room"));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_classify_unknown_type_reports_raw_string() {
        let raw = merged(json!({ "@type": "unexpected_future_type", "id": "x" }));

        let err = Event::classify(&raw).unwrap_err();
        assert_eq!(
            err,
            ClassifyError::UnknownEventType {
                event_type: "unexpected_future_type".to_string()
            }
        );
    }

    #[test]
    fn test_classify_missing_required_field_is_malformed() {
        // device without its required id
        let raw = merged(json!({ "@type": "device" }));

        let err = Event::classify(&raw).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::MalformedEvent { ref event_type, .. } if event_type == "device"
        ));
    }

    #[test]
    fn test_classify_missing_discriminator() {
        let raw = merged(json!({ "id": "x" }));
        let err = Event::classify(&raw).unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedEvent { .. }));
    }

    #[test]
    fn test_classify_non_object_record() {
        let err = Event::classify(&json!("not a record")).unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedEvent { .. }));
    }

    #[test]
    fn test_classify_message_and_client() {
        let msg = Event::classify(&merged(json!({ "@type": "message", "id": "m-1" }))).unwrap();
        assert_eq!(msg.event_type(), "message");

        let client = Event::classify(&merged(json!({ "@type": "client", "id": "c-1" }))).unwrap();
        assert_eq!(client.event_type(), "client");
    }

    #[test]
    fn test_serialized_event_keeps_discriminator() {
        let raw = merged(json!({ "@type": "room", "id": "hz_1" }));
        let event = Event::classify(&raw).unwrap();

        let out = serde_json::to_value(&event).unwrap();
        assert_eq!(out["@type"], json!("room"));
        assert_eq!(out["id"], json!("hz_1"));
        assert_eq!(out["trace_id"], json!("t1"));
    }

    #[test]
    fn test_envelope_accessor() {
        let raw = merged(json!({ "@type": "client", "id": "c-1" }));
        let event = Event::classify(&raw).unwrap();
        assert_eq!(event.envelope().trace_flags, "01");
    }
}
