//! Event handler traits and handler errors

use crate::event::{Event, short_type_name};
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use tokio_util::sync::CancellationToken;

/// Stable identifier of a handler type.
#[derive(Clone, Copy)]
pub struct HandlerKind {
    id: TypeId,
    name: &'static str,
}

impl HandlerKind {
    /// Kind of the handler type `H`.
    pub fn of<H: Any>() -> Self {
        Self {
            id: TypeId::of::<H>(),
            name: short_type_name(std::any::type_name::<H>()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for HandlerKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for HandlerKind {}

impl Hash for HandlerKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerKind").field(&self.name).finish()
    }
}

impl Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Event handler trait
///
/// Handlers should observe `cancel` cooperatively; the dispatcher never
/// interrupts a running handler.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    /// Handle the event
    async fn handle(&self, event: &E, cancel: &CancellationToken) -> Result<(), HandlerError>;
}

/// What went wrong inside a handler invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerErrorKind {
    /// The handler returned an error
    Failed,
    /// The handler panicked
    Panicked,
    /// The resolved instance or the event did not match the subscribed types
    TypeMismatch,
}

/// Event handler error
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    kind: HandlerErrorKind,
    message: String,
    code: Option<i32>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HandlerError {
    /// Handler failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: HandlerErrorKind::Failed,
            message: message.into(),
            code: None,
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it as the source
    pub fn from_error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            kind: HandlerErrorKind::Failed,
            message: error.to_string(),
            code: None,
            source: Some(Box::new(error)),
        }
    }

    /// Attach a numeric error code
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };

        Self {
            kind: HandlerErrorKind::Panicked,
            message: format!("handler panicked: {}", detail),
            code: None,
            source: None,
        }
    }

    pub(crate) fn type_mismatch(expected: &'static str) -> Self {
        Self {
            kind: HandlerErrorKind::TypeMismatch,
            message: format!("type mismatch: expected {}", expected),
            code: None,
            source: None,
        }
    }

    pub fn kind(&self) -> HandlerErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }
}
