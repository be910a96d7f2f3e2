//! The mediator: routes messages to their registered chain.
//!
//! Lookup is keyed by the message's *concrete* runtime type, the requested
//! result type and the message role. A message dispatched as
//! `Box<dyn DynMessage>` therefore reaches the same handler as the typed
//! value would.
//!
//! Each call runs through `Resolving -> Invoking -> Completed | Failed`. The
//! intermediate phases are emitted as trace events inside the `dispatch` span,
//! and the terminal phase is recorded on the span once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use tracing::{Instrument, Span, debug, debug_span, trace, warn};

use crate::capability::{Capability, TypeKey};
use crate::error::{DispatchError, DispatchResult};
use crate::message::{Command, DomainEvent, DynMessage, Message, Query, TriggersEvent};
use crate::registrar::{InvokeError, RegistrationTable};

/// Phase of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    /// Looking up the chain.
    Resolving,
    /// Running the chain.
    Invoking,
    /// The chain returned a value.
    Completed,
    /// The lookup or the chain failed.
    Failed,
}

impl DispatchPhase {
    /// Returns the lowercase name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchPhase::Resolving => "resolving",
            DispatchPhase::Invoking => "invoking",
            DispatchPhase::Completed => "completed",
            DispatchPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the mediator's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediatorStats {
    /// Dispatches started.
    pub dispatched: u64,
    /// Dispatches that returned a value.
    pub completed: u64,
    /// Dispatches whose chain failed.
    pub failed: u64,
    /// Dispatches with no registered chain.
    pub not_registered: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    not_registered: AtomicU64,
}

/// Dispatches messages to the chains of a sealed [`RegistrationTable`].
///
/// Cheap to clone; clones share the table and the counters.
#[derive(Clone)]
pub struct Mediator {
    table: Arc<RegistrationTable>,
    counters: Arc<Counters>,
}

impl Mediator {
    /// Creates a mediator over `table`.
    pub fn new(table: RegistrationTable) -> Self {
        Self::from_shared(Arc::new(table))
    }

    /// Creates a mediator over an already shared table.
    pub fn from_shared(table: Arc<RegistrationTable>) -> Self {
        Self {
            table,
            counters: Arc::new(Counters::default()),
        }
    }

    /// The registration table.
    pub fn table(&self) -> &RegistrationTable {
        &self.table
    }

    /// Returns a snapshot of the dispatch counters.
    pub fn stats(&self) -> MediatorStats {
        MediatorStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            not_registered: self.counters.not_registered.load(Ordering::Relaxed),
        }
    }

    /// Dispatches a type-erased message and expects a result of type `R`.
    pub async fn dispatch_dyn<R: Send + 'static>(
        &self,
        message: Box<dyn DynMessage>,
    ) -> DispatchResult<R> {
        let capability = Capability {
            message: TypeKey::from_parts(message.message_type(), message.message_name()),
            output: TypeKey::of::<R>(),
            role: message.role(),
        };

        let span = debug_span!(
            "dispatch",
            capability = %capability,
            handler = tracing::field::Empty,
            phase = tracing::field::Empty,
        );

        self.run(capability, message).instrument(span).await
    }

    /// Dispatches a typed message.
    pub async fn dispatch<M: Message>(&self, message: M) -> DispatchResult<M::Output> {
        self.dispatch_dyn::<M::Output>(Box::new(message)).await
    }

    /// Sends a command.
    pub async fn send<C: Command>(&self, command: C) -> DispatchResult<C::Output> {
        self.dispatch(command).await
    }

    /// Runs a query.
    pub async fn query<Q: Query>(&self, query: Q) -> DispatchResult<Q::Output> {
        self.dispatch(query).await
    }

    /// Publishes a domain event.
    ///
    /// Returns `Ok(None)` when no handler is registered for the event.
    pub async fn publish<E: DomainEvent>(&self, event: E) -> DispatchResult<Option<E::Output>> {
        let name = event.event_name();
        match self.dispatch(event).await {
            Ok(output) => Ok(Some(output)),
            Err(e) if e.is_not_registered() => {
                debug!(event = name, "No handler for event");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Publishes several events concurrently.
    ///
    /// Results are returned in input order.
    pub async fn publish_all<E, I>(&self, events: I) -> Vec<DispatchResult<Option<E::Output>>>
    where
        E: DomainEvent,
        I: IntoIterator<Item = E>,
    {
        join_all(events.into_iter().map(|event| self.publish(event))).await
    }

    /// Dispatches `message`, then publishes the event built from its output.
    pub async fn dispatch_and_publish<M, E>(&self, message: M) -> DispatchResult<M::Output>
    where
        M: TriggersEvent<E>,
        E: DomainEvent,
    {
        let output = self.dispatch(message).await?;
        self.publish(M::to_event(&output)).await?;
        Ok(output)
    }

    async fn run<R: Send + 'static>(
        &self,
        capability: Capability,
        message: Box<dyn DynMessage>,
    ) -> DispatchResult<R> {
        let span = Span::current();
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        trace!(phase = %DispatchPhase::Resolving);

        let Some(chain) = self.table.get(&capability) else {
            span.record("phase", DispatchPhase::Failed.as_str());
            self.counters.not_registered.fetch_add(1, Ordering::Relaxed);
            debug!("No handler registered");
            return Err(DispatchError::HandlerNotRegistered { capability });
        };

        span.record("handler", chain.handler());
        trace!(phase = %DispatchPhase::Invoking);

        let result = match chain.invoke(message.into_any()).await {
            Ok(output) => output
                .downcast::<R>()
                .map(|output| *output)
                .map_err(|_| DispatchError::ResultTypeMismatch { capability }),
            Err(InvokeError::Handler(source)) => Err(DispatchError::HandlerExecutionFailed {
                capability,
                source,
            }),
            Err(InvokeError::Construction(source)) => Err(DispatchError::ChainConstruction {
                capability,
                source,
            }),
            Err(InvokeError::WrongMessage) => Err(DispatchError::ResultTypeMismatch { capability }),
        };

        match &result {
            Ok(_) => {
                span.record("phase", DispatchPhase::Completed.as_str());
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                span.record("phase", DispatchPhase::Failed.as_str());
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Dispatch failed");
            }
        }

        result
    }
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("handlers", &self.table.len())
            .field("stats", &self.stats())
            .finish()
    }
}
