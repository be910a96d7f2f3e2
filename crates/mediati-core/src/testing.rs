//! Shared fixtures for unit tests.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::decorator::{
    AttributeInitialised, Decorate, DecoratorTemplate, ErasedInitialise, Link, TemplateKey,
};
use crate::dependency::{Resolve, ResolveExt};
use crate::error::{HandlerResult, PipelineResult};
use crate::handler::{BoxedHandler, Construct, Handler};
use crate::message::{Command, DomainEvent, Message, Query, Role};

/// Records which links ran and were initialised.
#[derive(Clone, Default)]
pub(crate) struct Journal {
    entries: Arc<Mutex<Vec<u8>>>,
    initialised: Arc<Mutex<Vec<u8>>>,
    constructed: Arc<AtomicUsize>,
}

impl Journal {
    pub(crate) fn record(&self, id: u8) {
        self.entries.lock().push(id);
    }

    pub(crate) fn entries(&self) -> Vec<u8> {
        self.entries.lock().clone()
    }

    pub(crate) fn initialised(&self) -> Vec<u8> {
        self.initialised.lock().clone()
    }

    pub(crate) fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Messages
// ============================================================================

pub(crate) struct Ping(pub u32);

impl Message for Ping {
    type Output = u32;
    const ROLE: Role = Role::Query;
}

impl Query for Ping {}

pub(crate) struct Explode;

impl Message for Explode {
    type Output = u32;
    const ROLE: Role = Role::Command;
}

impl Command for Explode {}

pub(crate) struct Pinged(pub u32);

impl Message for Pinged {
    type Output = ();
    const ROLE: Role = Role::Event;
}

impl DomainEvent for Pinged {
    fn event_name(&self) -> &'static str {
        "pinged"
    }
}

#[derive(Debug)]
pub(crate) struct Boom;

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("boom")
    }
}

impl std::error::Error for Boom {}

// ============================================================================
// Handlers
// ============================================================================

pub(crate) struct PingHandler {
    journal: Arc<Journal>,
}

impl Construct for PingHandler {
    fn construct(deps: &dyn Resolve) -> PipelineResult<Self> {
        let journal = deps.require::<Journal>()?;
        journal.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Self { journal })
    }
}

#[async_trait]
impl Handler<Ping> for PingHandler {
    async fn handle(&self, message: Ping) -> HandlerResult<u32> {
        self.journal.record(0);
        Ok(message.0)
    }
}

#[derive(Default)]
pub(crate) struct ExplodeHandler;

impl Construct for ExplodeHandler {
    fn construct(_deps: &dyn Resolve) -> PipelineResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Handler<Explode> for ExplodeHandler {
    async fn handle(&self, _message: Explode) -> HandlerResult<u32> {
        Err(Boom.into())
    }
}

pub(crate) struct PingedHandler {
    journal: Arc<Journal>,
}

impl Construct for PingedHandler {
    fn construct(deps: &dyn Resolve) -> PipelineResult<Self> {
        Ok(Self {
            journal: deps.require::<Journal>()?,
        })
    }
}

#[async_trait]
impl Handler<Pinged> for PingedHandler {
    async fn handle(&self, event: Pinged) -> HandlerResult<()> {
        self.journal.record(event.0 as u8);
        Ok(())
    }
}

// ============================================================================
// Decorators
// ============================================================================

/// Records its `ID` in the journal before calling `next`.
pub(crate) struct Tag<const ID: u8>;

impl<const ID: u8> DecoratorTemplate for Tag<ID> {
    const NAME: &'static str = match ID {
        1 => "Tag1",
        2 => "Tag2",
        3 => "Tag3",
        10 => "Tag10",
        20 => "Tag20",
        30 => "Tag30",
        _ => "Tag",
    };
    type Config = ();
}

impl<M: Message, const ID: u8> Decorate<M> for Tag<ID> {
    type Link = TagLink<M, ID>;

    fn decorate(next: BoxedHandler<M>, deps: &dyn Resolve) -> PipelineResult<Self::Link> {
        Ok(TagLink {
            next,
            journal: deps.require::<Journal>()?,
            _message: PhantomData,
        })
    }
}

pub(crate) struct TagLink<M: Message, const ID: u8> {
    next: BoxedHandler<M>,
    journal: Arc<Journal>,
    _message: PhantomData<fn() -> M>,
}

#[async_trait]
impl<M: Message, const ID: u8> Handler<M> for TagLink<M, ID> {
    async fn handle(&self, message: M) -> HandlerResult<M::Output> {
        self.journal.record(ID);
        self.next.handle(message).await
    }
}

impl<M: Message, const ID: u8> Link<M> for TagLink<M, ID> {
    fn declaring_template(&self) -> Option<TemplateKey> {
        Some(TemplateKey::of::<Tag<ID>>())
    }

    fn as_initialisable(&mut self) -> Option<&mut dyn ErasedInitialise> {
        Some(self)
    }
}

impl<M: Message, const ID: u8> AttributeInitialised for TagLink<M, ID> {
    type Config = ();

    fn initialise_from_attribute(&mut self, _config: &()) {
        self.journal.initialised.lock().push(ID);
    }
}

/// Needs a dependency nobody provides.
pub(crate) struct Unlisted;

pub(crate) struct Missing;

impl DecoratorTemplate for Unlisted {
    const NAME: &'static str = "Unlisted";
    type Config = ();
}

impl<M: Message> Decorate<M> for Unlisted {
    type Link = TagLink<M, 0>;

    fn decorate(next: BoxedHandler<M>, deps: &dyn Resolve) -> PipelineResult<Self::Link> {
        deps.require::<Missing>()?;
        <Tag<0> as Decorate<M>>::decorate(next, deps)
    }
}

// ============================================================================
// Log capture
// ============================================================================

/// Collects formatted log output of the current thread.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Runs `f` with a plain-text subscriber writing into this buffer.
    pub(crate) fn capture<T>(&self, f: impl FnOnce() -> T) -> T {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
