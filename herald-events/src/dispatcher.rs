//! Event dispatcher
//!
//! Resolves and invokes the handlers subscribed to one event.
//!
//! ## Rules
//! - **Sequential**: handlers run one at a time, in registration order; each
//!   is awaited before the next starts.
//! - **Fail-isolated**: a failing (or panicking) handler is recorded and the
//!   loop moves on; every failure ends up in the [`AggregateFailure`]. A
//!   resolver that panics while producing an instance counts as that
//!   handler's failure.
//! - **Benign absences**: no subscriptions, or no instance from the resolver,
//!   are not errors.
//! - **No timeouts**: the cancellation token is handed to handlers, which are
//!   expected to observe it; the dispatcher never interrupts them.

use crate::config::DispatcherConfig;
use crate::error::{AggregateFailure, DispatchFailure, PrimaryCodePolicy};
use crate::event::{Event, EventKind};
use crate::handler::{EventHandler, HandlerError, HandlerKind};
use crate::registry::{Registry, Subscription};
use crate::resolver::{HandlerInstance, HandlerResolver, ServiceResolver};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace};
use uuid::Uuid;

/// Result of one handler slot during a dispatch
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler ran and succeeded
    Delivered(HandlerKind),
    /// The resolver had no instance; the handler was not invoked
    Skipped(HandlerKind),
    /// The handler ran and failed
    Failed(DispatchFailure),
}

impl DispatchOutcome {
    pub fn handler(&self) -> HandlerKind {
        match self {
            DispatchOutcome::Delivered(kind) | DispatchOutcome::Skipped(kind) => *kind,
            DispatchOutcome::Failed(failure) => failure.handler,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DispatchOutcome::Failed(_))
    }
}

/// Per-handler outcomes of one dispatch, in registration order
#[derive(Debug)]
pub struct DispatchReport {
    event_id: Uuid,
    event_kind: EventKind,
    outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }

    pub fn outcomes(&self) -> &[DispatchOutcome] {
        &self.outcomes
    }

    /// Handlers that were invoked (successfully or not), in order
    pub fn invoked(&self) -> Vec<HandlerKind> {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o, DispatchOutcome::Skipped(_)))
            .map(DispatchOutcome::handler)
            .collect()
    }

    /// Handlers skipped because the resolver returned nothing
    pub fn skipped(&self) -> Vec<HandlerKind> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DispatchOutcome::Skipped(_)))
            .map(DispatchOutcome::handler)
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Collapse into the publish result
    pub fn into_result(self, policy: PrimaryCodePolicy) -> Result<(), AggregateFailure> {
        let failures: Vec<DispatchFailure> = self
            .outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                DispatchOutcome::Failed(failure) => Some(failure),
                _ => None,
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateFailure::new(
                self.event_id,
                self.event_kind,
                failures,
                policy,
            ))
        }
    }
}

/// Dispatches events to the handlers held in a [`Registry`]
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    resolver: Arc<dyn HandlerResolver>,
    config: Arc<DispatcherConfig>,
}

impl Dispatcher {
    /// Create a dispatcher with default configuration
    pub fn new(registry: Arc<Registry>, resolver: Arc<dyn HandlerResolver>) -> Self {
        Self::with_config(registry, resolver, DispatcherConfig::default())
    }

    /// Create a dispatcher with custom config
    pub fn with_config(
        registry: Arc<Registry>,
        resolver: Arc<dyn HandlerResolver>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            config: Arc::new(config),
        }
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Shorthand for [`Registry::subscribe`]
    pub fn subscribe<E, H>(&self) -> bool
    where
        E: Event,
        H: EventHandler<E>,
    {
        self.registry.subscribe::<E, H>()
    }

    /// Publish an event to every subscribed handler.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let cancel = CancellationToken::new();
    /// dispatcher.publish(&OrderCreated::new("order-1"), &cancel).await?;
    /// ```
    pub async fn publish<E: Event>(
        &self,
        event: &E,
        cancel: &CancellationToken,
    ) -> Result<(), AggregateFailure> {
        self.publish_dyn(event, cancel).await
    }

    /// Publish a type-erased event
    pub async fn publish_dyn(
        &self,
        event: &dyn Event,
        cancel: &CancellationToken,
    ) -> Result<(), AggregateFailure> {
        self.dispatch(event, cancel)
            .await
            .into_result(self.config.primary_code)
    }

    /// Run every subscribed handler and report each outcome
    pub async fn dispatch(&self, event: &dyn Event, cancel: &CancellationToken) -> DispatchReport {
        let event_kind = event.kind();
        let event_id = event.event_id();
        let span = info_span!("dispatch", %event_id, %event_kind);

        self.dispatch_in_span(event, event_kind, event_id, cancel)
            .instrument(span)
            .await
    }

    async fn dispatch_in_span(
        &self,
        event: &dyn Event,
        event_kind: EventKind,
        event_id: Uuid,
        cancel: &CancellationToken,
    ) -> DispatchReport {
        let mut report = DispatchReport {
            event_id,
            event_kind,
            outcomes: Vec::new(),
        };

        // Subscriptions added after this point belong to later publishes.
        let subscriptions = match self.registry.snapshot(&event_kind) {
            Some(subscriptions) => subscriptions,
            None => {
                if self.config.enable_logging {
                    debug!("No handlers registered for event {}", event_kind);
                }
                return report;
            }
        };

        if self.config.enable_logging {
            info!(
                handlers = subscriptions.len(),
                "Publishing event {} of kind {}", event_id, event_kind
            );
        }

        report.outcomes.reserve(subscriptions.len());

        for subscription in subscriptions.iter() {
            let handler = subscription.handler;

            let result = match self.resolve(&handler).await {
                Ok(Some(instance)) => self.invoke(subscription, instance, event, cancel).await,
                Ok(None) => {
                    if self.config.enable_logging {
                        trace!(%handler, "No instance resolved, skipping handler");
                    }
                    report.outcomes.push(DispatchOutcome::Skipped(handler));
                    continue;
                }
                Err(err) => Err(err),
            };

            match result {
                Ok(()) => report.outcomes.push(DispatchOutcome::Delivered(handler)),
                Err(err) => {
                    if self.config.enable_logging {
                        error!(
                            %handler,
                            error = %err,
                            "Error handling event {} with handler {}", event_id, handler
                        );
                    }
                    report.outcomes.push(DispatchOutcome::Failed(DispatchFailure {
                        handler,
                        event_kind,
                        event_id,
                        error: err,
                    }));
                }
            }
        }

        report
    }

    /// Resolving runs under the same panic capture as the handler itself.
    async fn resolve(&self, handler: &HandlerKind) -> Result<Option<HandlerInstance>, HandlerError> {
        let resolve = self.resolver.resolve(handler);

        if !self.config.catch_panics {
            return Ok(resolve.await);
        }

        AssertUnwindSafe(resolve)
            .catch_unwind()
            .await
            .map_err(HandlerError::panicked)
    }

    async fn invoke(
        &self,
        subscription: &Subscription,
        instance: HandlerInstance,
        event: &dyn Event,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let call = subscription.invoker.invoke(instance, event, cancel);

        if !self.config.catch_panics {
            return call.await;
        }

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::panicked(payload)),
        }
    }
}

/// Dispatcher builder
pub struct DispatcherBuilder {
    registry: Option<Arc<Registry>>,
    resolver: Option<Arc<dyn HandlerResolver>>,
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create new dispatcher builder
    pub fn new() -> Self {
        Self {
            registry: None,
            resolver: None,
            config: DispatcherConfig::default(),
        }
    }

    /// Use an existing registry (a fresh one is created otherwise)
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the handler resolver (an empty [`ServiceResolver`] otherwise)
    pub fn resolver<R: HandlerResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn resolver_arc(mut self, resolver: Arc<dyn HandlerResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable/disable logging
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Enable/disable capturing handler panics as failures
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.config.catch_panics = enabled;
        self
    }

    pub fn primary_code(mut self, policy: PrimaryCodePolicy) -> Self {
        self.config.primary_code = policy;
        self
    }

    /// Build the dispatcher
    pub fn build(self) -> Dispatcher {
        Dispatcher::with_config(
            self.registry.unwrap_or_default(),
            self.resolver
                .unwrap_or_else(|| Arc::new(ServiceResolver::new()) as Arc<dyn HandlerResolver>),
            self.config,
        )
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
