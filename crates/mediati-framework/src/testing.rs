//! Shared fixtures for unit tests.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use mediati_core::{Construct, Handler, HandlerResult, Message, PipelineResult, Resolve, Role};

pub(crate) struct Echo(pub String);

impl Message for Echo {
    type Output = String;
    const ROLE: Role = Role::Query;
}

pub(crate) struct EchoHandler;

impl Construct for EchoHandler {
    fn construct(_deps: &dyn Resolve) -> PipelineResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Handler<Echo> for EchoHandler {
    async fn handle(&self, message: Echo) -> HandlerResult<String> {
        Ok(message.0)
    }
}

pub(crate) struct Failing;

impl Message for Failing {
    type Output = String;
    const ROLE: Role = Role::Command;
}

#[derive(Debug)]
pub(crate) struct HandlerFailed;

impl fmt::Display for HandlerFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("handler failed")
    }
}

impl std::error::Error for HandlerFailed {}

pub(crate) struct FailingHandler;

impl Construct for FailingHandler {
    fn construct(_deps: &dyn Resolve) -> PipelineResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Handler<Failing> for FailingHandler {
    async fn handle(&self, _message: Failing) -> HandlerResult<String> {
        Err(HandlerFailed.into())
    }
}

/// Fails like [`Failing`], under a separate capability.
pub(crate) struct Refuse(pub u32);

impl Message for Refuse {
    type Output = u32;
    const ROLE: Role = Role::Command;
}

pub(crate) struct RefuseHandler;

impl Construct for RefuseHandler {
    fn construct(_deps: &dyn Resolve) -> PipelineResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Handler<Refuse> for RefuseHandler {
    async fn handle(&self, _message: Refuse) -> HandlerResult<u32> {
        tokio::task::yield_now().await;
        Err(HandlerFailed.into())
    }
}

/// Sleeps for the given number of milliseconds, then returns it.
pub(crate) struct Sleep(pub u64);

impl Message for Sleep {
    type Output = u64;
    const ROLE: Role = Role::Query;
}

pub(crate) struct SleepHandler;

impl Construct for SleepHandler {
    fn construct(_deps: &dyn Resolve) -> PipelineResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Handler<Sleep> for SleepHandler {
    async fn handle(&self, message: Sleep) -> HandlerResult<u64> {
        tokio::time::sleep(Duration::from_millis(message.0)).await;
        Ok(message.0)
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
