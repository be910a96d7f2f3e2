//! User Directory Example
//!
//! A tiny user directory whose operations all go through the mediator:
//!
//! - `CreateUser` (command) is validated, traced and publishes `UserCreated`
//! - `GetUser` (query) runs under a timeout
//! - `TouchLastSeen` (command) is best effort; failures are suppressed
//!
//! # Usage
//!
//! ```bash
//! cargo run --package user-directory -- --config demos/sample-app/mediati.toml
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use clap::Parser;
use mediati::framework::{
    Timeout, TimeoutConfig, Trace, Validate, ValidationError, ValidationResult, Validator,
    WrapError,
};
use mediati::prelude::*;
use tokio::sync::RwLock;
use tracing::{error, info};

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user {0} does not exist")]
    UnknownUser(u64),
    #[error("email {0} is already registered")]
    DuplicateEmail(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, name: String, email: String) -> Result<User, DirectoryError>;
    async fn find(&self, id: u64) -> Option<User>;
    async fn touch(&self, id: u64) -> Result<(), DirectoryError>;
}

#[derive(Default)]
pub struct InMemoryUsers {
    next_id: AtomicU64,
    users: RwLock<HashMap<u64, User>>,
    last_seen: RwLock<HashMap<u64, u64>>,
}

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn insert(&self, name: String, email: String) -> Result<User, DirectoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(DirectoryError::DuplicateEmail(email));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User { id, name, email };
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn find(&self, id: u64) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    async fn touch(&self, id: u64) -> Result<(), DirectoryError> {
        if !self.users.read().await.contains_key(&id) {
            return Err(DirectoryError::UnknownUser(id));
        }
        *self.last_seen.write().await.entry(id).or_default() += 1;
        Ok(())
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Command)]
#[message(output = User)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Query)]
#[message(output = Option<User>)]
pub struct GetUser {
    pub id: u64,
}

#[derive(Debug, Command)]
pub struct TouchLastSeen {
    pub id: u64,
}

#[derive(Debug, Clone, DomainEvent)]
#[message(name = "user.created")]
pub struct UserCreated {
    pub id: u64,
    pub name: String,
}

impl TriggersEvent<UserCreated> for CreateUser {
    fn to_event(user: &User) -> UserCreated {
        UserCreated {
            id: user.id,
            name: user.name.clone(),
        }
    }
}

fn validate_new_user(command: &CreateUser) -> ValidationResult {
    if command.name.trim().is_empty() {
        return Err(ValidationError::field("name", "must not be empty"));
    }
    if !command.email.contains('@') {
        return Err(ValidationError::field("email", "must contain '@'"));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

#[handler(CreateUser)]
#[decorate(Trace)]
#[decorate(Validate, order = 10)]
pub struct CreateUserHandler {
    store: Arc<dyn UserStore>,
}

impl Construct for CreateUserHandler {
    fn construct(deps: &dyn Resolve) -> PipelineResult<Self> {
        Ok(Self {
            store: deps.require::<dyn UserStore>()?,
        })
    }
}

#[async_trait]
impl Handler<CreateUser> for CreateUserHandler {
    async fn handle(&self, command: CreateUser) -> HandlerResult<User> {
        Ok(self.store.insert(command.name, command.email).await?)
    }
}

#[handler(GetUser)]
#[decorate(Trace)]
#[decorate(Timeout, order = 10, config = TimeoutConfig { millis: 250 })]
pub struct GetUserHandler {
    store: Arc<dyn UserStore>,
}

impl Construct for GetUserHandler {
    fn construct(deps: &dyn Resolve) -> PipelineResult<Self> {
        Ok(Self {
            store: deps.require::<dyn UserStore>()?,
        })
    }
}

#[async_trait]
impl Handler<GetUser> for GetUserHandler {
    async fn handle(&self, query: GetUser) -> HandlerResult<Option<User>> {
        Ok(self.store.find(query.id).await)
    }
}

#[handler(TouchLastSeen)]
#[decorate(WrapError)]
pub struct TouchLastSeenHandler {
    store: Arc<dyn UserStore>,
}

impl Construct for TouchLastSeenHandler {
    fn construct(deps: &dyn Resolve) -> PipelineResult<Self> {
        Ok(Self {
            store: deps.require::<dyn UserStore>()?,
        })
    }
}

#[async_trait]
impl Handler<TouchLastSeen> for TouchLastSeenHandler {
    async fn handle(&self, command: TouchLastSeen) -> HandlerResult<()> {
        Ok(self.store.touch(command.id).await?)
    }
}

#[handler(UserCreated, construct = default)]
#[derive(Default)]
pub struct WelcomeHandler;

#[async_trait]
impl Handler<UserCreated> for WelcomeHandler {
    async fn handle(&self, event: UserCreated) -> HandlerResult<()> {
        info!(event = event.event_name(), id = event.id, "Welcome, {}!", event.name);
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

#[derive(Debug, Parser)]
#[command(about = "A small user directory driven by the Mediati mediator")]
struct Args {
    /// Configuration file (defaults to searching for mediati.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration profile
    #[arg(long, default_value = "development")]
    profile: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = MediatiRuntime::builder().profile(&args.profile);
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build()?;

    runtime.provide::<dyn UserStore>(Arc::new(InMemoryUsers::default()))?;
    runtime.provide::<dyn Validator<CreateUser>>(Arc::new(validate_new_user))?;
    let mediator = runtime.start()?;

    let ada = mediator
        .dispatch_and_publish::<_, UserCreated>(CreateUser {
            name: "Ada".into(),
            email: "ada@example.com".into(),
        })
        .await?;
    info!(id = ada.id, "Created user");

    if let Err(e) = mediator
        .send(CreateUser {
            name: String::new(),
            email: "nobody@example.com".into(),
        })
        .await
    {
        error!(error = %e, cause = ?e.handler_error().map(ToString::to_string), "Rejected");
    }

    match mediator.query(GetUser { id: ada.id }).await? {
        Some(user) => info!(?user, "Found user"),
        None => error!(id = ada.id, "User vanished"),
    }

    mediator.send(TouchLastSeen { id: ada.id }).await?;
    // Unknown user: the handler fails, WrapError turns it into `()`.
    mediator.send(TouchLastSeen { id: 404 }).await?;

    let stats = mediator.stats();
    info!(
        dispatched = stats.dispatched,
        completed = stats.completed,
        failed = stats.failed,
        "Done"
    );
    Ok(())
}
