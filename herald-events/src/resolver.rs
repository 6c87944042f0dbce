//! Handler resolution
//!
//! The dispatcher never owns handler instances. For every subscribed
//! [`HandlerKind`] it asks a [`HandlerResolver`] for a live instance at
//! publish time; `None` means the capability is unavailable and the handler
//! is skipped.

use crate::handler::HandlerKind;
use async_trait::async_trait;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

/// Type-erased handler instance as returned by a resolver
pub type HandlerInstance = Arc<dyn Any + Send + Sync>;

/// Produces live handler instances from handler kinds.
///
/// Must be safe to call concurrently and repeatedly within one publish.
#[async_trait]
pub trait HandlerResolver: Send + Sync {
    /// Resolve an instance for `kind`, or `None` if none is available
    async fn resolve(&self, kind: &HandlerKind) -> Option<HandlerInstance>;
}

type Factory = Arc<dyn Fn() -> HandlerInstance + Send + Sync>;

#[derive(Clone)]
enum Provider {
    /// One shared instance for every resolve
    Singleton(HandlerInstance),
    /// A fresh instance per resolve
    Factory(Factory),
}

/// In-memory resolver backed by registered instances and factories
#[derive(Clone, Default)]
pub struct ServiceResolver {
    providers: Arc<DashMap<HandlerKind, Provider>>,
}

impl ServiceResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared handler instance, replacing any previous provider
    pub fn register<H>(&self, handler: H) -> &Self
    where
        H: Send + Sync + 'static,
    {
        self.register_arc(Arc::new(handler))
    }

    /// Register an already shared handler instance
    pub fn register_arc<H>(&self, handler: Arc<H>) -> &Self
    where
        H: Send + Sync + 'static,
    {
        self.providers
            .insert(HandlerKind::of::<H>(), Provider::Singleton(handler));
        self
    }

    /// Register a factory invoked on every resolve
    pub fn register_factory<H, F>(&self, factory: F) -> &Self
    where
        H: Send + Sync + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || Arc::new(factory()) as HandlerInstance);
        self.providers
            .insert(HandlerKind::of::<H>(), Provider::Factory(factory));
        self
    }

    /// Whether a provider exists for `kind`
    pub fn contains(&self, kind: &HandlerKind) -> bool {
        self.providers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl HandlerResolver for ServiceResolver {
    async fn resolve(&self, kind: &HandlerKind) -> Option<HandlerInstance> {
        // Clone the provider out so no shard lock is held while a factory runs.
        let provider = self.providers.get(kind).map(|entry| entry.value().clone())?;

        match provider {
            Provider::Singleton(instance) => Some(instance),
            Provider::Factory(factory) => Some(factory()),
        }
    }
}
