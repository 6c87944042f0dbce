// Herald - In-process publish/subscribe event dispatcher
//
// This library provides an explicitly owned registry of event handlers and a
// dispatcher that invokes them with per-handler failure isolation.

// Re-export core functionality
pub use herald_events::*;

// Re-export optional crates
#[cfg(feature = "log")]
pub use herald_log;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AggregateFailure, BatchFailure, CancellationToken, Dispatcher, DispatcherConfig, Event,
        EventHandler, EventMetadata, HandlerError, HandlerResolver, PrimaryCodePolicy, Registry,
        ServiceResolver,
    };
}
