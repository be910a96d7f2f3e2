//! Dependency source used while building chains.
//!
//! Links (handlers and decorators) resolve everything except their `next`
//! link from a [`Resolve`] implementation. The engine does not ship a
//! container; [`Dependencies`] is a small type map good enough for most hosts,
//! and any closure `Fn(TypeId) -> Option<ServiceArc>` can stand in for a
//! richer one.
//!
//! Services are stored the same way for every type: an `Arc<T>` is wrapped in
//! another `Arc` and erased to `Arc<dyn Any + Send + Sync>`. That lets
//! unsized targets such as `Arc<dyn Validator<M>>` round-trip through the map.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};

/// A type-erased service handle as stored by a dependency source.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// Resolves dependencies by `TypeId`.
pub trait Resolve: Send + Sync {
    /// Returns the service registered for `type_id`, if any.
    ///
    /// The returned value must be an `Arc<Arc<T>>` erased to [`ServiceArc`].
    fn resolve(&self, type_id: TypeId) -> Option<ServiceArc>;
}

impl<F> Resolve for F
where
    F: Fn(TypeId) -> Option<ServiceArc> + Send + Sync,
{
    fn resolve(&self, type_id: TypeId) -> Option<ServiceArc> {
        self(type_id)
    }
}

/// Typed helpers over [`Resolve`].
pub trait ResolveExt {
    /// Returns the service of type `T`, if registered.
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>>;

    /// Returns the service of type `T` or a `DependencyNotFound` error.
    fn require<T: ?Sized + Send + Sync + 'static>(&self) -> PipelineResult<Arc<T>> {
        self.get::<T>()
            .ok_or_else(PipelineError::dependency_not_found::<T>)
    }
}

impl<R: Resolve + ?Sized> ResolveExt for R {
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve(TypeId::of::<T>())
            .and_then(|service| service.downcast::<Arc<T>>().ok())
            .map(|outer| Arc::clone(&*outer))
    }
}

/// A simple type map implementing [`Resolve`].
#[derive(Clone, Default)]
pub struct Dependencies {
    services: HashMap<TypeId, ServiceArc>,
}

impl Dependencies {
    /// Creates an empty dependency map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` as the provider of `T`, replacing any previous one.
    pub fn insert<T: ?Sized + Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.services
            .insert(TypeId::of::<T>(), Arc::new(service) as ServiceArc);
        self
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with<T: ?Sized + Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.insert(service);
        self
    }

    /// Returns `true` if a provider of `T` is registered.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Resolve for Dependencies {
    fn resolve(&self, type_id: TypeId) -> Option<ServiceArc> {
        self.services.get(&type_id).cloned()
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("services", &self.services.len())
            .finish()
    }
}
