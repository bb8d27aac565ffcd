use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::AggregateId;

/// Unique identifier for a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Position of an aggregate in its own event stream.
///
/// Version 0 means "no events yet". The first event ever emitted for an
/// aggregate carries version 1 and every later event increments it by one,
/// so the version of an aggregate equals the number of events applied to it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The version of an aggregate with no events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// The version carried by the first event of a stream.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// The version reached after `count` more events.
    pub fn advanced_by(&self, count: usize) -> Self {
        Self(self.0 + count as u64)
    }

    /// The version before the last `count` events, floored at 0.
    pub fn rewound_by(&self, count: usize) -> Self {
        Self(self.0.saturating_sub(count as u64))
    }

    pub fn is_initial(&self) -> bool {
        self.0 == 0
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// The persisted form of a domain event.
///
/// Carries the serialized payload together with everything the store needs
/// to order and check it: aggregate id, aggregate type and the aggregate
/// version reached after the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// Type tag of the payload (e.g., "LineAdded").
    pub event_type: String,

    pub aggregate_id: AggregateId,

    /// Type of the owning aggregate (e.g., "Order").
    pub aggregate_type: String,

    /// Aggregate version after this event was applied.
    pub version: Version,

    pub timestamp: DateTime<Utc>,

    pub payload: serde_json::Value,

    /// Correlation ids and the like; never interpreted by the store.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Wraps an already serialized payload under a fresh event id, stamped
    /// with the current time.
    pub fn new(
        aggregate_id: impl Into<AggregateId>,
        aggregate_type: impl Into<String>,
        version: Version,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Like [`EventEnvelope::new`], serializing `payload` to JSON first.
    pub fn encode<T: Serialize>(
        aggregate_id: impl Into<AggregateId>,
        aggregate_type: impl Into<String>,
        version: Version,
        event_type: impl Into<String>,
        payload: &T,
    ) -> serde_json::Result<Self> {
        let payload = serde_json::to_value(payload)?;
        Ok(Self::new(
            aggregate_id,
            aggregate_type,
            version,
            event_type,
            payload,
        ))
    }

    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Metadata entry as a string, if present and a JSON string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    /// Deserializes the payload into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct LineAdded {
        sku: String,
        quantity: u32,
    }

    #[test]
    fn versions_count_events() {
        assert!(Version::initial().is_initial());
        assert_eq!(Version::initial().next(), Version::first());
        assert_eq!(Version::first().advanced_by(3), Version::new(4));
        assert_eq!(Version::new(4).rewound_by(3), Version::first());
        assert_eq!(Version::first().rewound_by(5), Version::initial());
        assert_eq!(Version::new(7).to_string(), "7");
    }

    #[test]
    fn encode_then_decode_payload() {
        let payload = LineAdded {
            sku: "sku-7".to_string(),
            quantity: 2,
        };

        let envelope =
            EventEnvelope::encode("O1", "Order", Version::new(2), "LineAdded", &payload).unwrap();

        assert_eq!(envelope.aggregate_id.as_str(), "O1");
        assert_eq!(envelope.aggregate_type, "Order");
        assert_eq!(envelope.version, Version::new(2));
        assert_eq!(envelope.payload["quantity"], 2);
        assert_eq!(envelope.decode::<LineAdded>().unwrap(), payload);
    }

    #[test]
    fn metadata_is_optional_on_the_wire() {
        let envelope = EventEnvelope::new(
            "O1",
            "Order",
            Version::first(),
            "OrderCreated",
            serde_json::json!({}),
        )
        .with_metadata("correlation_id", serde_json::json!("abc"));
        assert_eq!(envelope.metadata_str("correlation_id"), Some("abc"));
        assert_eq!(envelope.metadata_str("missing"), None);

        let mut json = serde_json::to_value(&envelope).unwrap();
        json.as_object_mut().unwrap().remove("metadata");
        let decoded: EventEnvelope = serde_json::from_value(json).unwrap();
        assert!(decoded.metadata.is_empty());
        assert_eq!(decoded.event_id, envelope.event_id);
    }
}
