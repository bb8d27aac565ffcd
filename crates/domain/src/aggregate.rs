//! Aggregate roots and the applier registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

use common::AggregateId;
use event_store::{EventEnvelope, Version};

use crate::error::DomainError;
use crate::event::{DomainEvent, Event, EventPayload};

/// Trait for aggregate state in an event-sourced system.
///
/// An aggregate is a cluster of domain objects that can be treated as a single unit.
/// Its state is never set directly: it is folded from events, one applier per
/// event type, registered once in [`Aggregate::register_appliers`].
///
/// In event sourcing, aggregates:
/// - Are rebuilt by replaying events
/// - Generate events from commands
/// - Apply events to update state (pure, deterministic)
pub trait Aggregate: Default + Send + Sync + 'static {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    ///
    /// Recorded on every persisted event and checked again on load.
    fn aggregate_type() -> &'static str;

    /// Registers one applier for every event type the aggregate can emit.
    fn register_appliers(appliers: &mut Appliers<Self>);
}

/// One applier table per aggregate type, for the life of the process.
static REGISTRY: OnceLock<RwLock<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>> =
    OnceLock::new();

type ApplyFn<A> = Box<dyn Fn(&mut A, &<A as Aggregate>::Event) -> bool + Send + Sync>;

/// Dispatch table from event type tag to the function folding that event into state.
pub struct Appliers<A: Aggregate> {
    handlers: HashMap<&'static str, ApplyFn<A>>,
}

impl<A: Aggregate> Appliers<A> {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    fn build() -> Self {
        let mut appliers = Self::new();
        A::register_appliers(&mut appliers);
        appliers
    }

    /// The table for `A`, built on first use and shared by every instance
    /// afterwards.
    fn for_aggregate() -> &'static Self {
        let registry = REGISTRY.get_or_init(Default::default);
        let key = TypeId::of::<A>();

        let cached = registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied();
        let entry = match cached {
            Some(entry) => entry,
            None => {
                let mut registry = registry.write().unwrap_or_else(PoisonError::into_inner);
                *registry.entry(key).or_insert_with(|| {
                    let built: &'static (dyn Any + Send + Sync) =
                        Box::leak(Box::new(Self::build()));
                    built
                })
            }
        };

        // Entries are keyed by their own type, so the downcast always succeeds.
        entry
            .downcast_ref::<Self>()
            .unwrap_or_else(|| Box::leak(Box::new(Self::build())))
    }

    /// Registers the applier for the payload type `P`.
    ///
    /// # Panics
    ///
    /// Panics if an applier for the same event type is already registered.
    pub fn on<P>(&mut self, apply: fn(&mut A, &P)) -> &mut Self
    where
        P: EventPayload<A::Event>,
    {
        let previous = self.handlers.insert(
            P::EVENT_TYPE,
            Box::new(move |state, event| match P::extract(event) {
                Some(payload) => {
                    apply(state, payload);
                    true
                }
                None => false,
            }),
        );
        assert!(
            previous.is_none(),
            "applier for {} registered twice on {}",
            P::EVENT_TYPE,
            A::aggregate_type()
        );
        self
    }

    /// Returns true if an applier is registered for `event_type`.
    pub fn contains(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Number of registered event types.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Folds `event` into `state`. State is untouched on error.
    fn apply(&self, state: &mut A, event: &A::Event) -> Result<(), DomainError> {
        let event_type = event.event_type();
        let handler = self
            .handlers
            .get(event_type)
            .ok_or_else(|| DomainError::MissingApplier {
                aggregate_type: A::aggregate_type(),
                event_type: event_type.to_string(),
            })?;

        if handler(state, event) {
            Ok(())
        } else {
            Err(DomainError::EventTypeMismatch {
                aggregate_type: A::aggregate_type(),
                event_type: event_type.to_string(),
            })
        }
    }
}

impl<A: Aggregate> fmt::Debug for Appliers<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut event_types: Vec<_> = self.handlers.keys().collect();
        event_types.sort();
        f.debug_struct("Appliers")
            .field("aggregate_type", &A::aggregate_type())
            .field("event_types", &event_types)
            .finish()
    }
}

/// An aggregate instance together with its identity, version and the
/// events emitted since it was last persisted.
///
/// Owned by one command execution at a time. Concurrent writers are
/// resolved by the event store's version check, not by locking.
pub struct AggregateRoot<A: Aggregate> {
    id: AggregateId,
    version: Version,
    state: A,
    uncommitted: Vec<Event<A::Event>>,
    appliers: &'static Appliers<A>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Creates an aggregate with no history (version 0).
    ///
    /// Business constructors call this and then emit their creation event.
    pub fn new(id: impl Into<AggregateId>) -> Self {
        Self {
            id: id.into(),
            version: Version::initial(),
            state: A::default(),
            uncommitted: Vec::new(),
            appliers: Appliers::for_aggregate(),
        }
    }

    /// Rebuilds an aggregate by replaying its stored history.
    ///
    /// Every event must belong to `id` and carry exactly the next version.
    /// Replayed events are never buffered as uncommitted.
    pub fn rehydrate(
        id: impl Into<AggregateId>,
        history: impl IntoIterator<Item = Event<A::Event>>,
    ) -> Result<Self, DomainError> {
        let mut root = Self::new(id);
        for event in history {
            root.replay(&event)?;
        }
        Ok(root)
    }

    fn replay(&mut self, event: &Event<A::Event>) -> Result<(), DomainError> {
        if event.aggregate_id() != &self.id {
            return Err(DomainError::AggregateIdMismatch {
                expected: self.id.clone(),
                actual: event.aggregate_id().clone(),
            });
        }

        let expected = self.version.next();
        if event.version() != expected {
            return Err(DomainError::EventStreamGap {
                aggregate_id: self.id.clone(),
                expected,
                actual: event.version(),
            });
        }

        self.appliers.apply(&mut self.state, event.payload())?;
        self.version = event.version();
        Ok(())
    }

    /// Records a new event: applies it to state, buffers it and bumps the version.
    ///
    /// Fails without any change if no applier handles the event's type.
    pub fn emit(&mut self, payload: A::Event) -> Result<(), DomainError> {
        let event = Event::new(self.id.clone(), self.version.next(), payload);
        self.appliers.apply(&mut self.state, event.payload())?;
        self.version = event.version();
        tracing::trace!(
            aggregate_id = %self.id,
            event_type = event.event_type(),
            version = %self.version,
            "Event emitted"
        );
        self.uncommitted.push(event);
        Ok(())
    }

    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    /// Version after every applied event, persisted or not.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Version the store is expected to hold: the version before any
    /// buffered event. This is the expected base version for a save.
    pub fn committed_version(&self) -> Version {
        self.version.rewound_by(self.uncommitted.len())
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    /// Events emitted since the last [`mark_changes_as_committed`](Self::mark_changes_as_committed),
    /// in emission order. Does not clear them.
    pub fn uncommitted_events(&self) -> &[Event<A::Event>] {
        &self.uncommitted
    }

    pub fn has_uncommitted_events(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Converts the buffered events into envelopes ready for the store.
    pub fn uncommitted_envelopes(&self) -> Result<Vec<EventEnvelope>, DomainError> {
        self.uncommitted
            .iter()
            .map(|event| event.to_envelope(A::aggregate_type()))
            .collect()
    }

    /// Clears the buffer.
    ///
    /// Call exactly once after the buffered events have been durably saved;
    /// calling it earlier loses them.
    pub fn mark_changes_as_committed(&mut self) {
        self.uncommitted.clear();
    }
}

impl<A: Aggregate + fmt::Debug> fmt::Debug for AggregateRoot<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("uncommitted", &self.uncommitted.len())
            .finish()
    }
}
