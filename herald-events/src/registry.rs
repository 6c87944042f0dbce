//! Subscription registry
//!
//! Maps each [`EventKind`] to the ordered, duplicate-free list of handler
//! kinds subscribed to it. The registry only grows: there is no unsubscribe.
//!
//! ## Concurrency
//!
//! - Writers (`subscribe`) are serialized by a single mutex held only for the
//!   read-modify-write of one key's list.
//! - Each key's list is an immutable `Arc<[Subscription]>` replaced
//!   copy-on-write. Readers clone the `Arc` and never touch the writer mutex,
//!   so a snapshot taken by a publish stays valid for that whole publish.

use crate::event::{Event, EventKind};
use crate::handler::{EventHandler, HandlerError, HandlerKind};
use crate::resolver::HandlerInstance;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Type-erased call into a typed handler, captured at subscribe time.
#[async_trait]
pub(crate) trait Invoke: Send + Sync {
    async fn invoke(
        &self,
        instance: HandlerInstance,
        event: &dyn Event,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError>;
}

struct TypedInvoker<E, H> {
    _phantom: PhantomData<fn() -> (E, H)>,
}

impl<E, H> TypedInvoker<E, H> {
    fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<E, H> Invoke for TypedInvoker<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    async fn invoke(
        &self,
        instance: HandlerInstance,
        event: &dyn Event,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let handler = instance
            .downcast::<H>()
            .map_err(|_| HandlerError::type_mismatch(HandlerKind::of::<H>().name()))?;
        let event = event
            .as_any()
            .downcast_ref::<E>()
            .ok_or_else(|| HandlerError::type_mismatch(EventKind::of::<E>().name()))?;

        handler.handle(event, cancel).await
    }
}

/// One handler slot for an event kind
#[derive(Clone)]
pub(crate) struct Subscription {
    pub(crate) handler: HandlerKind,
    pub(crate) invoker: Arc<dyn Invoke>,
}

/// Registry of event kind to handler kinds
#[derive(Default)]
pub struct Registry {
    subscriptions: DashMap<EventKind, Arc<[Subscription]>>,
    write_lock: Mutex<()>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe handler type `H` to event type `E`.
    ///
    /// Idempotent: returns `false` when the pair was already registered.
    /// Insertion order is the invocation order.
    pub fn subscribe<E, H>(&self) -> bool
    where
        E: Event,
        H: EventHandler<E>,
    {
        self.insert(
            EventKind::of::<E>(),
            Subscription {
                handler: HandlerKind::of::<H>(),
                invoker: Arc::new(TypedInvoker::<E, H>::new()),
            },
        )
    }

    fn insert(&self, event_kind: EventKind, subscription: Subscription) -> bool {
        let _guard = self.write_lock.lock();

        let current = self
            .subscriptions
            .get(&event_kind)
            .map(|entry| Arc::clone(entry.value()));

        let mut next = match current {
            Some(current) => {
                if current.iter().any(|s| s.handler == subscription.handler) {
                    return false;
                }
                current.to_vec()
            }
            None => Vec::with_capacity(1),
        };

        let handler = subscription.handler;
        next.push(subscription);
        self.subscriptions.insert(event_kind, next.into());

        debug!(
            event_kind = %event_kind,
            handler = %handler,
            "Registered handler"
        );
        true
    }

    /// Handler kinds subscribed to `event_kind`, in invocation order
    pub fn handlers_for(&self, event_kind: &EventKind) -> Vec<HandlerKind> {
        self.snapshot(event_kind)
            .map(|subs| subs.iter().map(|s| s.handler).collect())
            .unwrap_or_default()
    }

    /// Snapshot of the subscriptions for one publish call
    pub(crate) fn snapshot(&self, event_kind: &EventKind) -> Option<Arc<[Subscription]>> {
        self.subscriptions
            .get(event_kind)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of handlers subscribed to `event_kind`
    pub fn handler_count(&self, event_kind: &EventKind) -> usize {
        self.snapshot(event_kind).map(|subs| subs.len()).unwrap_or(0)
    }

    /// Event kinds with at least one subscription
    pub fn event_kinds(&self) -> Vec<EventKind> {
        self.subscriptions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
