//! In-process publish/subscribe for Herald
//!
//! This crate provides an explicitly owned subscription registry and a
//! dispatcher that resolves and invokes handlers, isolating failures.
//!
//! ## Features
//!
//! - **Registry** - Ordered, duplicate-free handler lists per event kind
//! - **Resolver** - Handler instances are resolved at publish time
//! - **Fail-isolated** - One failing handler never stops its siblings
//! - **Aggregate failures** - Every handler failure is reported, not just the first
//! - **Batches** - Heterogeneous events published concurrently
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald_events::*;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! // Define an event
//! #[derive(Debug)]
//! struct UserCreated {
//!     metadata: EventMetadata,
//!     email: String,
//! }
//!
//! impl Event for UserCreated {
//!     fn metadata(&self) -> &EventMetadata { &self.metadata }
//! }
//!
//! // Define a handler
//! struct WelcomeEmail;
//!
//! #[async_trait]
//! impl EventHandler<UserCreated> for WelcomeEmail {
//!     async fn handle(&self, event: &UserCreated, _: &CancellationToken) -> Result<(), HandlerError> {
//!         println!("Sending welcome email to {}", event.email);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = ServiceResolver::new();
//!     resolver.register(WelcomeEmail);
//!
//!     let dispatcher = Dispatcher::builder().resolver(resolver).build();
//!     dispatcher.subscribe::<UserCreated, WelcomeEmail>();
//!
//!     let event = UserCreated {
//!         metadata: EventMetadata::new(),
//!         email: "alice@example.com".to_string(),
//!     };
//!
//!     dispatcher.publish(&event, &CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```rust,ignore
//! match dispatcher.publish(&event, &cancel).await {
//!     Ok(()) => println!("All handlers succeeded"),
//!     Err(aggregate) => {
//!         for failure in aggregate.failures() {
//!             eprintln!("{} failed: {}", failure.handler, failure.error);
//!         }
//!     }
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::builder()
//!     .config(DispatcherConfig::from_env()?)
//!     .primary_code(PrimaryCodePolicy::Highest)
//!     .build();
//! ```

pub mod batch;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod registry;
pub mod resolver;

pub use config::DispatcherConfig;
pub use dispatcher::{DispatchOutcome, DispatchReport, Dispatcher, DispatcherBuilder};
pub use error::{AggregateFailure, BatchFailure, ConfigError, DispatchFailure, PrimaryCodePolicy};
pub use event::{AnyEvent, Event, EventKind, EventMetadata};
pub use handler::{EventHandler, HandlerError, HandlerErrorKind, HandlerKind};
pub use registry::Registry;
pub use resolver::{HandlerInstance, HandlerResolver, ServiceResolver};

/// Re-exported so handlers can name the cancellation type without a direct dependency
pub use tokio_util::sync::CancellationToken;
