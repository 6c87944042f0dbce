//! Batch publishing
//!
//! Every event in a batch is dispatched independently on its own tokio task,
//! so events run in parallel on the runtime's worker pool. There is no
//! ordering between events of one batch; within each event the dispatcher's
//! sequential handler order still holds.

use crate::dispatcher::Dispatcher;
use crate::error::{AggregateFailure, BatchFailure, DispatchFailure};
use crate::event::Event;
use crate::handler::{HandlerError, HandlerKind};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info};

impl Dispatcher {
    /// Publish a heterogeneous batch of events.
    ///
    /// Each publish is spawned before any is awaited and the call returns
    /// once every one has finished. Fails if at least one event failed,
    /// carrying the aggregate of each failing event in batch order. `cancel`
    /// is shared by every in-flight publish.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn publish_all(
        &self,
        events: &[Arc<dyn Event>],
        cancel: &CancellationToken,
    ) -> Result<(), BatchFailure> {
        if events.is_empty() {
            return Ok(());
        }

        if self.config().enable_logging {
            info!(events = events.len(), "Publishing batch");
        }

        let handles: Vec<_> = events
            .iter()
            .map(|event| {
                let dispatcher = self.clone();
                let event = Arc::clone(event);
                let cancel = cancel.clone();
                tokio::spawn(
                    async move { dispatcher.publish_dyn(&*event, &cancel).await }.in_current_span(),
                )
            })
            .collect();

        let mut failures: Vec<AggregateFailure> = Vec::new();
        for (event, joined) in events.iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => failures.push(failure),
                // Only reachable with `catch_panics` off: keep unwinding into the caller.
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => failures.push(self.task_failure(&**event, err)),
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        if self.config().enable_logging {
            error!(
                failed = failures.len(),
                events = events.len(),
                "One or more events failed to publish"
            );
        }

        Err(BatchFailure::new(events.len(), failures))
    }

    /// Aggregate for an event whose publish task was cancelled by the runtime
    fn task_failure(&self, event: &dyn Event, err: JoinError) -> AggregateFailure {
        let event_kind = event.kind();
        let event_id = event.event_id();

        if self.config().enable_logging {
            error!(%event_id, %event_kind, error = %err, "Publish task did not complete");
        }

        AggregateFailure::new(
            event_id,
            event_kind,
            vec![DispatchFailure {
                handler: HandlerKind::of::<Dispatcher>(),
                event_kind,
                event_id,
                error: HandlerError::from_error(err),
            }],
            self.config().primary_code,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventMetadata;
    use crate::handler::{EventHandler, HandlerError};
    use crate::resolver::ServiceResolver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug)]
    struct UserRegistered {
        metadata: EventMetadata,
    }

    impl Event for UserRegistered {
        fn metadata(&self) -> &EventMetadata {
            &self.metadata
        }
    }

    #[derive(Debug)]
    struct InvoiceIssued {
        metadata: EventMetadata,
        reject: bool,
    }

    impl Event for InvoiceIssued {
        fn metadata(&self) -> &EventMetadata {
            &self.metadata
        }
    }

    #[derive(Default)]
    struct InvoiceHandler {
        calls: AtomicU32,
    }

    #[async_trait]
    impl EventHandler<InvoiceIssued> for InvoiceHandler {
        async fn handle(&self, event: &InvoiceIssued, _: &CancellationToken) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if event.reject {
                Err(HandlerError::new("invoice rejected"))
            } else {
                Ok(())
            }
        }
    }

    /// Reports failure once the shared token is cancelled
    struct CancelAwareHandler {
        calls: AtomicU32,
    }

    #[async_trait]
    impl EventHandler<UserRegistered> for CancelAwareHandler {
        async fn handle(&self, _: &UserRegistered, cancel: &CancellationToken) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if cancel.is_cancelled() {
                return Err(HandlerError::new("cancelled"));
            }
            Ok(())
        }
    }

    /// Blocks its worker thread, simulating CPU-bound work
    struct BusyHandler;

    #[async_trait]
    impl EventHandler<UserRegistered> for BusyHandler {
        async fn handle(&self, _: &UserRegistered, _: &CancellationToken) -> Result<(), HandlerError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        }
    }

    /// Blocks until every participant reached the barrier
    struct RendezvousHandler {
        barrier: Barrier,
    }

    #[async_trait]
    impl EventHandler<UserRegistered> for RendezvousHandler {
        async fn handle(&self, _: &UserRegistered, _: &CancellationToken) -> Result<(), HandlerError> {
            self.barrier.wait().await;
            Ok(())
        }
    }

    fn invoice(reject: bool) -> Arc<dyn Event> {
        Arc::new(InvoiceIssued {
            metadata: EventMetadata::new(),
            reject,
        })
    }

    fn user() -> Arc<dyn Event> {
        Arc::new(UserRegistered {
            metadata: EventMetadata::new(),
        })
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds() {
        let dispatcher = Dispatcher::builder().build();
        assert_ok!(dispatcher.publish_all(&[], &CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_batch_references_only_failing_events() {
        let handler = Arc::new(InvoiceHandler::default());
        let resolver = ServiceResolver::new();
        resolver.register_arc(handler.clone());

        let dispatcher = Dispatcher::builder().resolver(resolver).build();
        dispatcher.subscribe::<InvoiceIssued, InvoiceHandler>();

        let events = vec![invoice(false), invoice(true), user(), invoice(true)];
        let failure = assert_err!(
            dispatcher
                .publish_all(&events, &CancellationToken::new())
                .await
        );

        assert_eq!(failure.attempted(), 4);
        assert_eq!(
            failure.failed_event_ids(),
            vec![events[1].event_id(), events[3].event_id()]
        );
        assert!(failure.failures().iter().all(|f| f.len() == 1));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_batch_succeeds_when_every_event_succeeds() {
        let resolver = ServiceResolver::new();
        resolver.register(InvoiceHandler::default());

        let dispatcher = Dispatcher::builder().resolver(resolver).build();
        dispatcher.subscribe::<InvoiceIssued, InvoiceHandler>();

        let events = vec![invoice(false), user(), invoice(false)];
        assert_ok!(dispatcher.publish_all(&events, &CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_events_are_dispatched_concurrently() {
        // Each handler waits for all three; a sequential batch would never finish.
        let resolver = ServiceResolver::new();
        resolver.register(RendezvousHandler {
            barrier: Barrier::new(3),
        });

        let dispatcher = Dispatcher::builder().resolver(resolver).build();
        dispatcher.subscribe::<UserRegistered, RendezvousHandler>();

        let events = vec![user(), user(), user()];
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.publish_all(&events, &CancellationToken::new()),
        )
        .await;

        assert_ok!(assert_ok!(outcome));
    }

    #[tokio::test]
    async fn test_cancellation_reaches_every_event() {
        let handler = Arc::new(CancelAwareHandler {
            calls: AtomicU32::new(0),
        });
        let resolver = ServiceResolver::new();
        resolver.register_arc(handler.clone());

        let dispatcher = Dispatcher::builder().resolver(resolver).build();
        dispatcher.subscribe::<UserRegistered, CancelAwareHandler>();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let events = vec![user(), user(), user()];
        let failure = assert_err!(dispatcher.publish_all(&events, &cancel).await);

        assert_eq!(failure.attempted(), 3);
        assert_eq!(
            failure.failed_event_ids(),
            events.iter().map(|e| e.event_id()).collect::<Vec<_>>()
        );
        assert!(
            failure
                .failures()
                .iter()
                .all(|f| f.failures()[0].error.message() == "cancelled")
        );
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_blocking_handlers_run_in_parallel() {
        let resolver = ServiceResolver::new();
        resolver.register(BusyHandler);

        let dispatcher = Dispatcher::builder().resolver(resolver).build();
        dispatcher.subscribe::<UserRegistered, BusyHandler>();

        let events = vec![user(), user(), user(), user()];
        let started = std::time::Instant::now();
        assert_ok!(dispatcher.publish_all(&events, &CancellationToken::new()).await);

        // Four 200ms handlers back to back would take 800ms.
        assert!(started.elapsed() < Duration::from_millis(600));
    }
}
