//! Event definitions and traits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Stable identifier of an event category.
///
/// Two kinds are equal when they refer to the same Rust type; the name is
/// carried only for logs and error messages.
#[derive(Clone, Copy)]
pub struct EventKind {
    id: TypeId,
    name: &'static str,
}

impl EventKind {
    /// Kind of the event type `E`.
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: short_type_name(std::any::type_name::<E>()),
        }
    }

    /// Short type name of the event (no module path).
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventKind").field(&self.name).finish()
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Strip the module path and generic arguments from a type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}

/// Base event metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub id: Uuid,

    /// Timestamp when event was created
    pub occurred_at: DateTime<Utc>,

    /// Optional correlation ID for tracing
    pub correlation_id: Option<Uuid>,

    /// Optional causation ID (ID of the event that caused this event)
    pub causation_id: Option<Uuid>,
}

impl EventMetadata {
    /// Create new event metadata with a fresh id and the current time
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            correlation_id: None,
            causation_id: None,
        }
    }

    /// Set correlation ID
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Set causation ID
    pub fn with_causation_id(mut self, id: Uuid) -> Self {
        self.causation_id = Some(id);
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Event trait
///
/// All events must implement this trait to be published through the
/// dispatcher. Payload fields are opaque to the dispatcher; only the
/// metadata and the kind are read.
///
/// ```rust,ignore
/// #[derive(Debug)]
/// struct OrderCreated {
///     metadata: EventMetadata,
///     order_id: String,
/// }
///
/// impl Event for OrderCreated {
///     fn metadata(&self) -> &EventMetadata {
///         &self.metadata
///     }
/// }
/// ```
pub trait Event: AnyEvent + Send + Sync + Debug + 'static {
    /// Event metadata (id, timestamp, correlation)
    fn metadata(&self) -> &EventMetadata;

    /// Get event ID
    fn event_id(&self) -> Uuid {
        self.metadata().id
    }

    /// Get event timestamp
    fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata().occurred_at
    }
}

/// Kind and downcast access for type-erased events.
///
/// Implemented for every [`Event`]; calling it through `&dyn Event`
/// reaches the concrete type's implementation.
pub trait AnyEvent {
    /// Kind of the concrete event type
    fn kind(&self) -> EventKind;

    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

impl<E: Event> AnyEvent for E {
    fn kind(&self) -> EventKind {
        EventKind::of::<E>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
