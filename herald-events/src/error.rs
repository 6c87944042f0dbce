//! Dispatch and batch failures

use crate::event::EventKind;
use crate::handler::{HandlerError, HandlerKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// One handler's failure while handling one event
#[derive(Debug, Error)]
#[error("handler {handler} failed for event {event_id} ({event_kind}): {error}")]
pub struct DispatchFailure {
    pub handler: HandlerKind,
    pub event_kind: EventKind,
    pub event_id: Uuid,
    #[source]
    pub error: HandlerError,
}

/// How an aggregate picks its single error code from its failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryCodePolicy {
    /// No single code; callers inspect the individual failures
    #[default]
    None,
    /// Code of the first failing handler that carries one
    First,
    /// Highest code among the failures
    Highest,
}

impl PrimaryCodePolicy {
    /// Apply the policy to a list of failures
    pub fn select(&self, failures: &[DispatchFailure]) -> Option<i32> {
        let mut codes = failures.iter().filter_map(|f| f.error.code());
        match self {
            PrimaryCodePolicy::None => None,
            PrimaryCodePolicy::First => codes.next(),
            PrimaryCodePolicy::Highest => codes.max(),
        }
    }
}

impl FromStr for PrimaryCodePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(PrimaryCodePolicy::None),
            "first" => Ok(PrimaryCodePolicy::First),
            "highest" => Ok(PrimaryCodePolicy::Highest),
            other => Err(ConfigError::InvalidValue {
                key: "primary_code".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Every handler failure recorded by one publish call.
///
/// Never empty: a publish with zero failures succeeds instead.
#[derive(Debug)]
pub struct AggregateFailure {
    event_id: Uuid,
    event_kind: EventKind,
    failures: Vec<DispatchFailure>,
    primary_code: Option<i32>,
}

impl AggregateFailure {
    pub(crate) fn new(
        event_id: Uuid,
        event_kind: EventKind,
        failures: Vec<DispatchFailure>,
        policy: PrimaryCodePolicy,
    ) -> Self {
        let primary_code = policy.select(&failures);
        Self {
            event_id,
            event_kind,
            failures,
            primary_code,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }

    /// Individual handler failures, in invocation order
    pub fn failures(&self) -> &[DispatchFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<DispatchFailure> {
        self.failures
    }

    /// Kinds of the handlers that failed, in invocation order
    pub fn failed_handlers(&self) -> Vec<HandlerKind> {
        self.failures.iter().map(|f| f.handler).collect()
    }

    /// Code selected by the configured [`PrimaryCodePolicy`]
    pub fn primary_code(&self) -> Option<i32> {
        self.primary_code
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} handler(s) failed for event {} ({})",
            self.failures.len(),
            self.event_id,
            self.event_kind
        )?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.handler, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFailure {}

/// Every failing event of one batch publish
#[derive(Debug, Error)]
#[error("{} of {attempted} event(s) failed to publish", .failures.len())]
pub struct BatchFailure {
    attempted: usize,
    failures: Vec<AggregateFailure>,
}

impl BatchFailure {
    pub(crate) fn new(attempted: usize, failures: Vec<AggregateFailure>) -> Self {
        Self {
            attempted,
            failures,
        }
    }

    /// Number of events in the batch
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Per-event aggregates, in batch order
    pub fn failures(&self) -> &[AggregateFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<AggregateFailure> {
        self.failures
    }

    /// Ids of the events that failed, in batch order
    pub fn failed_event_ids(&self) -> Vec<Uuid> {
        self.failures.iter().map(|f| f.event_id).collect()
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventMetadata};

    #[derive(Debug)]
    struct PaymentCaptured {
        metadata: EventMetadata,
    }

    impl Event for PaymentCaptured {
        fn metadata(&self) -> &EventMetadata {
            &self.metadata
        }
    }

    struct LedgerHandler;
    struct ReceiptHandler;
    struct FraudHandler;

    fn failure(handler: HandlerKind, error: HandlerError) -> DispatchFailure {
        DispatchFailure {
            handler,
            event_kind: EventKind::of::<PaymentCaptured>(),
            event_id: Uuid::nil(),
            error,
        }
    }

    fn failures() -> Vec<DispatchFailure> {
        vec![
            failure(HandlerKind::of::<LedgerHandler>(), HandlerError::new("no code")),
            failure(
                HandlerKind::of::<ReceiptHandler>(),
                HandlerError::new("mail").with_code(400),
            ),
            failure(
                HandlerKind::of::<FraudHandler>(),
                HandlerError::new("fraud").with_code(503),
            ),
        ]
    }

    #[test]
    fn test_primary_code_policies() {
        let failures = failures();

        assert_eq!(PrimaryCodePolicy::None.select(&failures), None);
        assert_eq!(PrimaryCodePolicy::First.select(&failures), Some(400));
        assert_eq!(PrimaryCodePolicy::Highest.select(&failures), Some(503));
        assert_eq!(PrimaryCodePolicy::Highest.select(&[]), None);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Highest".parse::<PrimaryCodePolicy>().unwrap(), PrimaryCodePolicy::Highest);
        assert_eq!(" first ".parse::<PrimaryCodePolicy>().unwrap(), PrimaryCodePolicy::First);
        assert!("worst".parse::<PrimaryCodePolicy>().is_err());
    }

    #[test]
    fn test_aggregate_lists_every_failure() {
        let id = Uuid::new_v4();
        let aggregate = AggregateFailure::new(
            id,
            EventKind::of::<PaymentCaptured>(),
            failures(),
            PrimaryCodePolicy::First,
        );

        assert_eq!(aggregate.len(), 3);
        assert_eq!(aggregate.primary_code(), Some(400));
        assert_eq!(
            aggregate.failed_handlers(),
            vec![
                HandlerKind::of::<LedgerHandler>(),
                HandlerKind::of::<ReceiptHandler>(),
                HandlerKind::of::<FraudHandler>(),
            ]
        );

        let message = aggregate.to_string();
        assert!(message.starts_with(&format!("3 handler(s) failed for event {}", id)));
        assert!(message.contains("ReceiptHandler: mail"));
        assert!(message.contains("FraudHandler: fraud"));
    }

    #[test]
    fn test_batch_failure_message() {
        let aggregate = AggregateFailure::new(
            Uuid::new_v4(),
            EventKind::of::<PaymentCaptured>(),
            failures(),
            PrimaryCodePolicy::None,
        );
        let id = aggregate.event_id();
        let batch = BatchFailure::new(4, vec![aggregate]);

        assert_eq!(batch.to_string(), "1 of 4 event(s) failed to publish");
        assert_eq!(batch.failed_event_ids(), vec![id]);
        assert_eq!(batch.attempted(), 4);
    }
}
