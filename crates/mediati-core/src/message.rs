//! Message types for the Mediati engine.
//!
//! Every request that flows through the [`Mediator`](crate::Mediator) is a
//! [`Message`]: a value with a statically known result type and a [`Role`].
//! The three roles are expressed as marker traits so that front doors such as
//! [`Mediator::send`](crate::Mediator::send) only accept the right kind of
//! message:
//!
//! - [`Command`]: changes state, answered by exactly one handler.
//! - [`Query`]: reads state, answered by exactly one handler.
//! - [`DomainEvent`]: something that happened; may have no handler at all.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediati::prelude::*;
//!
//! #[derive(Debug, Command)]
//! #[message(output = u64)]
//! struct CreateOrder {
//!     sku: String,
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Role
// ============================================================================

/// The role a message plays in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A state-changing request.
    Command,
    /// A read-only request.
    Query,
    /// A notification that something happened.
    Event,
}

impl Role {
    /// Returns the lowercase name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Command => "command",
            Role::Query => "query",
            Role::Event => "event",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Message Traits
// ============================================================================

/// A value that can be dispatched through the mediator.
///
/// Usually implemented through `#[derive(Command)]`, `#[derive(Query)]` or
/// `#[derive(DomainEvent)]` rather than by hand.
pub trait Message: Send + 'static {
    /// The value produced by the handler for this message.
    type Output: Send + 'static;

    /// The role this message plays.
    const ROLE: Role;
}

/// A state-changing message.
pub trait Command: Message {}

/// A read-only message.
pub trait Query: Message {}

/// A notification that something happened in the domain.
///
/// Publishing an event with no registered handler is not an error.
pub trait DomainEvent: Message {
    /// A stable, human-readable name for the event.
    fn event_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A message whose result can be turned into a domain event.
///
/// Used by [`Mediator::dispatch_and_publish`](crate::Mediator::dispatch_and_publish).
pub trait TriggersEvent<E: DomainEvent>: Message {
    /// Builds the event from the message's output.
    fn to_event(output: &Self::Output) -> E;
}

// ============================================================================
// Type-erased Messages
// ============================================================================

/// Object-safe view of a [`Message`].
///
/// Lets callers hold messages of different types behind one pointer and still
/// reach the handler registered for the *concrete* type.
pub trait DynMessage: Send + 'static {
    /// The `TypeId` of the concrete message type.
    fn message_type(&self) -> TypeId;

    /// The name of the concrete message type.
    fn message_name(&self) -> &'static str;

    /// The role of the concrete message type.
    fn role(&self) -> Role;

    /// Converts the box into `Box<dyn Any>` for downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<M: Message> DynMessage for M {
    fn message_type(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn message_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn role(&self) -> Role {
        M::ROLE
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl fmt::Debug for dyn DynMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynMessage")
            .field("type", &self.message_name())
            .field("role", &self.role())
            .finish()
    }
}
