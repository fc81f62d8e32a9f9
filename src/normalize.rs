//! Pure normalization functions over classified events
//!
//! Two transforms run per event: metric extraction (zero or one numeric
//! observation) and document-id generation (a stable storage key).
//! Both are total for well-formed events - they match every [`Event`]
//! variant without a wildcard arm, so a new variant fails to compile
//! here until it gets an intentional branch.

use crate::event::{Envelope, Event};
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;

/// Sentinel substituted for absent, null, or empty identifier parts.
pub const UNKNOWN: &str = "unknown";

/// A single named observation derived from an event.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Scalar metric value - the hub reports both numeric readings and
/// boolean switch states.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Bool(bool),
}

/// State-payload keys recognized as measurements, with unit context.
///
/// The nested state vocabulary is hub-controlled and open-ended, so
/// this is a best-effort lookup table, not an enumeration of shapes.
/// First match wins.
const MEASUREMENT_KEYS: &[(&str, Option<&str>)] = &[
    ("humidity", Some("percent")),
    ("temperature", Some("celsius")),
    ("setpointTemperature", Some("celsius")),
    ("purity", Some("ppm")),
    ("illuminance", Some("lux")),
    ("level", Some("percent")),
    ("position", Some("percent")),
    ("on", None),
    ("enabled", None),
    ("value", None),
];

/// Extract zero or one metric from a classified event.
///
/// Never fails for a well-formed event; malformed nested state degrades
/// to `None` rather than an error.
pub fn extract_metric(event: &Event) -> Option<Metric> {
    match event {
        Event::DeviceServiceData(data) => {
            let state = data.state.as_object()?;
            for (key, unit) in MEASUREMENT_KEYS {
                if let Some(value) = state.get(*key).and_then(scalar_value) {
                    let name = if data.id.trim().is_empty() {
                        (*key).to_string()
                    } else {
                        data.id.clone()
                    };
                    return Some(Metric {
                        name,
                        value,
                        unit: unit.map(str::to_string),
                    });
                }
            }
            None
        }
        Event::Room(room) => {
            // extProperties is genuinely absent on some production
            // records; its absence means "no reading", not a fault.
            let props = room.ext_properties.as_ref()?;
            let value = props.get("humidity").and_then(scalar_value)?;
            Some(Metric {
                name: "humidity".to_string(),
                value,
                unit: Some("percent".to_string()),
            })
        }
        // Metadata and status records by policy - no numeric
        // observation is defined for them today.
        Event::Device(_) | Event::Message(_) | Event::Client(_) => None,
    }
}

/// Best-effort scalar coercion for loosely-typed hub state fields.
/// The hub reports some numeric readings as strings.
fn scalar_value(value: &Value) -> Option<MetricValue> {
    match value {
        Value::Number(n) => n.as_f64().map(MetricValue::Number),
        Value::Bool(b) => Some(MetricValue::Bool(*b)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(MetricValue::Number),
        _ => None,
    }
}

/// Derive the deterministic storage key for a classified event.
///
/// Total and side-effect-free; never returns an empty string. Repeated
/// service readings at different times get distinct ids, while writes
/// for the same timestamp and service collide intentionally (idempotent
/// overwrite). Device and room documents are keyed by their own id, so
/// the latest state overwrites the previous document.
pub fn doc_id(event: &Event) -> String {
    match event {
        Event::DeviceServiceData(data) => format!(
            "{}-{}-{}",
            id_part(&data.device_id),
            str_part(&data.id),
            timestamp_part(&data.envelope),
        ),
        Event::Device(device) => str_part(&device.id).to_string(),
        Event::Room(room) => str_part(&room.id).to_string(),
        // Message ids are reissued over time; the timestamp keeps
        // reissues distinct.
        Event::Message(message) => format!(
            "{}-{}",
            str_part(&message.id),
            timestamp_part(&message.envelope),
        ),
        Event::Client(client) => format!(
            "client-{}-{}",
            str_part(&client.id),
            timestamp_part(&client.envelope),
        ),
    }
}

/// Total, crash-free stringifier for identifier parts.
///
/// The downstream sink rejects non-scalar identifier values, and an
/// unguarded null or object reaching the key has corrupted writes in
/// production three separate times. Absent, null, and empty values
/// become the [`UNKNOWN`] sentinel; structured values are serialized to
/// their JSON text rather than passed through.
pub fn id_part(value: &Value) -> String {
    match value {
        Value::Null => UNKNOWN.to_string(),
        Value::String(s) => str_part(s).to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| UNKNOWN.to_string()),
    }
}

fn str_part(s: &str) -> &str {
    if s.trim().is_empty() { UNKNOWN } else { s }
}

fn timestamp_part(envelope: &Envelope) -> String {
    envelope.time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::{Client, Device, DeviceServiceData, Message, Room};
    use chrono::{TimeZone, Utc};
    use serde_json::{Map, json};

    fn envelope() -> Envelope {
        Envelope {
            time: Utc.with_ymd_and_hms(2025, 12, 12, 0, 0, 0).unwrap(),
            trace_id: "t1".to_string(),
            span_id: "s1".to_string(),
            trace_flags: "01".to_string(),
        }
    }

    fn service_data(id: &str, state: Value) -> Event {
        Event::DeviceServiceData(DeviceServiceData {
            envelope: envelope(),
            device_id: json!("hdm:1234"),
            id: id.to_string(),
            path: json!("/devices/hdm:1234/services/HumidityLevel"),
            state,
            operations: None,
            faults: None,
        })
    }

    fn room(id: &str, ext_properties: Option<Map<String, Value>>) -> Event {
        Event::Room(Room {
            envelope: envelope(),
            id: id.to_string(),
            ext_properties,
            extra: Map::new(),
        })
    }

    fn all_variants() -> Vec<Event> {
        vec![
            service_data(
                "HumidityLevel",
                json!({ "@type": "humidityLevelState", "humidity": 39.8 }),
            ),
            Event::Device(Device {
                envelope: envelope(),
                id: "hdm:1234".to_string(),
                parent_device_id: None,
                room_id: None,
                extra: Map::new(),
            }),
            room("hz_1", None),
            Event::Message(Message {
                envelope: envelope(),
                id: "m-1".to_string(),
                extra: Map::new(),
            }),
            Event::Client(Client {
                envelope: envelope(),
                id: "c-1".to_string(),
                extra: Map::new(),
            }),
        ]
    }

    #[test]
    fn test_humidity_state_yields_metric() {
        let event = service_data(
            "HumidityLevel",
            json!({ "@type": "humidityLevelState", "humidity": 39.8 }),
        );

        let metric = extract_metric(&event).unwrap();
        assert_eq!(metric.name, "HumidityLevel");
        assert_eq!(metric.value, MetricValue::Number(39.8));
        assert_eq!(metric.unit.as_deref(), Some("percent"));
    }

    #[test]
    fn test_boolean_state_yields_metric() {
        let event = service_data(
            "PresenceSimulationConfiguration",
            json!({ "@type": "presenceSimulationConfigurationState", "enabled": true }),
        );

        let metric = extract_metric(&event).unwrap();
        assert_eq!(metric.value, MetricValue::Bool(true));
        assert!(metric.unit.is_none());
    }

    #[test]
    fn test_stringified_reading_is_parsed() {
        let event = service_data(
            "ValveTappet",
            json!({ "@type": "valveTappetState", "position": "87" }),
        );

        let metric = extract_metric(&event).unwrap();
        assert_eq!(metric.value, MetricValue::Number(87.0));
    }

    #[test]
    fn test_unrecognized_state_yields_no_metric() {
        let event = service_data(
            "CommunicationQuality",
            json!({ "@type": "communicationQualityState", "quality": "NORMAL" }),
        );
        assert!(extract_metric(&event).is_none());
    }

    #[test]
    fn test_malformed_state_degrades_to_no_metric() {
        // state that is not even an object
        let event = service_data("Broken", json!("not-a-state"));
        assert!(extract_metric(&event).is_none());
    }

    #[test]
    fn test_room_without_ext_properties_has_no_metric() {
        assert!(extract_metric(&room("hz_1", None)).is_none());
    }

    #[test]
    fn test_room_ambient_humidity_surfaces_as_metric() {
        let mut props = Map::new();
        props.insert("humidity".to_string(), json!("54.5"));
        let metric = extract_metric(&room("hz_1", Some(props))).unwrap();
        assert_eq!(metric.name, "humidity");
        assert_eq!(metric.value, MetricValue::Number(54.5));
    }

    #[test]
    fn test_metric_and_id_defined_for_every_variant() {
        for event in all_variants() {
            // extract_metric must not panic, whatever it returns
            let _ = extract_metric(&event);
            let id = doc_id(&event);
            assert!(!id.is_empty(), "empty id for {}", event.event_type());
        }
    }

    #[test]
    fn test_metadata_variants_have_no_metric_by_policy() {
        for event in all_variants() {
            match event {
                Event::Device(_) | Event::Message(_) | Event::Client(_) => {
                    assert!(extract_metric(&event).is_none());
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_doc_id_is_deterministic() {
        for event in all_variants() {
            assert_eq!(doc_id(&event), doc_id(&event));
        }
    }

    #[test]
    fn test_service_data_id_composition() {
        let event = service_data("HumidityLevel", json!({ "humidity": 40 }));
        let id = doc_id(&event);
        assert!(id.contains("hdm:1234"));
        assert!(id.contains("HumidityLevel"));
        assert!(id.contains("2025-12-12"));
    }

    #[test]
    fn test_room_id_contains_room_identifier() {
        assert_eq!(doc_id(&room("hz_1", None)), "hz_1");
    }

    #[test]
    fn test_client_id_is_tagged() {
        let event = Event::Client(Client {
            envelope: envelope(),
            id: "c-1".to_string(),
            extra: Map::new(),
        });
        let id = doc_id(&event);
        assert!(id.starts_with("client-c-1-"));
    }

    #[test]
    fn test_absent_device_id_falls_back_to_sentinel() {
        let event = Event::DeviceServiceData(DeviceServiceData {
            envelope: envelope(),
            device_id: Value::Null,
            id: "HumidityLevel".to_string(),
            path: Value::Null,
            state: Value::Null,
            operations: None,
            faults: None,
        });

        let id = doc_id(&event);
        assert!(id.starts_with("unknown-HumidityLevel-"));
    }

    #[test]
    fn test_structured_device_id_is_serialized_not_passed_through() {
        let event = Event::DeviceServiceData(DeviceServiceData {
            envelope: envelope(),
            device_id: json!({ "nested": "oops" }),
            id: "HumidityLevel".to_string(),
            path: Value::Null,
            state: Value::Null,
            operations: None,
            faults: None,
        });

        let id = doc_id(&event);
        // JSON text of the object, never an opaque debug form
        assert!(id.contains(r#"{"nested":"oops"}"#));
    }

    #[test]
    fn test_id_part_totality() {
        assert_eq!(id_part(&Value::Null), UNKNOWN);
        assert_eq!(id_part(&json!("")), UNKNOWN);
        assert_eq!(id_part(&json!("  ")), UNKNOWN);
        assert_eq!(id_part(&json!("abc")), "abc");
        assert_eq!(id_part(&json!(42)), "42");
        assert_eq!(id_part(&json!(true)), "true");
        assert_eq!(id_part(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_empty_identity_field_still_yields_non_empty_id() {
        let event = room("", None);
        assert_eq!(doc_id(&event), UNKNOWN);
    }
}
