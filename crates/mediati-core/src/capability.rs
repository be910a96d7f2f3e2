//! Capability keys.
//!
//! A [`Capability`] identifies the chain that answers a message: the message
//! type, the declared result type and the message role. The registration
//! table is keyed by capability, and the dispatcher computes the same key from
//! a message's concrete runtime type.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::message::{Message, Role};

/// A `TypeId` paired with its type name for diagnostics.
///
/// Equality and hashing only consider the `TypeId`.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Builds a key from parts.
    pub fn from_parts(id: TypeId, name: &'static str) -> Self {
        Self { id, name }
    }

    /// The `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The full type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The (message type, result type, role) triple that identifies a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    /// The message type.
    pub message: TypeKey,
    /// The declared result type.
    pub output: TypeKey,
    /// The message role.
    pub role: Role,
}

impl Capability {
    /// Returns the capability for message type `M`.
    pub fn of<M: Message>() -> Self {
        Self {
            message: TypeKey::of::<M>(),
            output: TypeKey::of::<M::Output>(),
            role: M::ROLE,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}> -> {}", self.role, self.message, self.output)
    }
}
