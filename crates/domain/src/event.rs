//! Domain events and their metadata.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::DomainError;

/// Trait for domain event payloads.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense. An aggregate's
/// event type is usually an enum with one variant per event shape.
pub trait DomainEvent:
    Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + Clone + 'static
{
    /// Returns the event type tag, unique per event shape.
    ///
    /// This is the key used to find the applier for the event.
    fn event_type(&self) -> &'static str;
}

/// One concrete event shape carried by the event enum `E`.
///
/// Lets an applier be registered against the typed payload of a single
/// variant instead of the whole enum.
pub trait EventPayload<E>: Sized + 'static {
    /// The type tag of this shape.
    const EVENT_TYPE: &'static str;

    /// Borrows the payload out of `event` if it holds this shape.
    fn extract(event: &E) -> Option<&Self>;
}

/// Implements [`DomainEvent`] for a newtype-variant event enum and
/// [`EventPayload`] for each variant's payload. The variant name is the
/// event type tag.
///
/// ```ignore
/// event_variants!(OrderEvent {
///     OrderCreated(OrderCreatedData),
///     LineAdded(LineAddedData),
/// });
/// ```
#[macro_export]
macro_rules! event_variants {
    ($event:ident { $($variant:ident($payload:ty)),+ $(,)? }) => {
        impl $crate::DomainEvent for $event {
            fn event_type(&self) -> &'static str {
                match self {
                    $($event::$variant(_) => stringify!($variant),)+
                }
            }
        }

        $(
            impl $crate::EventPayload<$event> for $payload {
                const EVENT_TYPE: &'static str = stringify!($variant);

                fn extract(event: &$event) -> Option<&Self> {
                    match event {
                        $event::$variant(payload) => Some(payload),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )+
    };
}

/// Metadata recorded with every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// The aggregate that emitted the event.
    pub aggregate_id: AggregateId,

    /// The aggregate version after this event is applied.
    pub aggregate_version: Version,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// The event type tag.
    pub event_type: String,
}

/// An immutable fact emitted by an aggregate: payload plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    metadata: EventMetadata,
    payload: E,
}

impl<E: DomainEvent> Event<E> {
    pub(crate) fn new(aggregate_id: AggregateId, aggregate_version: Version, payload: E) -> Self {
        Self {
            metadata: EventMetadata {
                aggregate_id,
                aggregate_version,
                occurred_at: Utc::now(),
                event_type: payload.event_type().to_string(),
            },
            payload,
        }
    }

    /// Reassembles an event from stored parts.
    pub fn from_parts(metadata: EventMetadata, payload: E) -> Self {
        Self { metadata, payload }
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    pub fn event_type(&self) -> &str {
        &self.metadata.event_type
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.metadata.aggregate_id
    }

    pub fn version(&self) -> Version {
        self.metadata.aggregate_version
    }

    /// Converts the event into its persisted envelope.
    pub fn to_envelope(&self, aggregate_type: &str) -> Result<EventEnvelope, DomainError> {
        let envelope = EventEnvelope::encode(
            self.metadata.aggregate_id.clone(),
            aggregate_type,
            self.metadata.aggregate_version,
            self.metadata.event_type.clone(),
            &self.payload,
        )?;
        Ok(envelope.with_timestamp(self.metadata.occurred_at))
    }

    /// Decodes a persisted envelope.
    pub fn from_envelope(envelope: EventEnvelope) -> Result<Self, DomainError> {
        let payload: E = envelope.decode()?;
        Ok(Self {
            metadata: EventMetadata {
                aggregate_id: envelope.aggregate_id,
                aggregate_version: envelope.version,
                occurred_at: envelope.timestamp,
                event_type: envelope.event_type,
            },
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Opened {
        name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Closed;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "data")]
    enum AccountEvent {
        Opened(Opened),
        Closed(Closed),
    }

    crate::event_variants!(AccountEvent {
        Opened(Opened),
        Closed(Closed),
    });

    #[test]
    fn macro_derives_tags_and_extraction() {
        let event = AccountEvent::Opened(Opened {
            name: "main".to_string(),
        });
        assert_eq!(event.event_type(), "Opened");
        assert_eq!(<Opened as EventPayload<AccountEvent>>::EVENT_TYPE, "Opened");
        assert!(Opened::extract(&event).is_some());
        assert!(Closed::extract(&event).is_none());
    }

    #[test]
    fn envelope_conversion_preserves_metadata() {
        let event = Event::new(
            AggregateId::from("A1"),
            Version::new(3),
            AccountEvent::Closed(Closed),
        );

        let envelope = event.to_envelope("Account").unwrap();
        assert_eq!(envelope.aggregate_type, "Account");
        assert_eq!(envelope.event_type, "Closed");
        assert_eq!(envelope.version, Version::new(3));

        let decoded: Event<AccountEvent> = Event::from_envelope(envelope).unwrap();
        assert_eq!(decoded, event);
    }
}
