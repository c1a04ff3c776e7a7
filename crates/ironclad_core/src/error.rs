//! # Registry Error Types
//!
//! All errors that can be raised by the registry, its type-erased storage
//! and the lock guards.
//!
//! Lookup and type errors go to the immediate caller and are never retried
//! internally. Lock timeouts are ordinary results: the raw locks report them
//! as `bool`, only [`ScopedLock::acquire_for`](crate::sync::ScopedLock::acquire_for)
//! turns them into [`EcsError::LockTimeout`].

use std::time::Duration;

use thiserror::Error;

use crate::ecs::{EntityId, SystemId};
use crate::sync::LockMode;

/// Errors that can occur in the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// No live entity has this id.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity exists but does not hold the requested component.
    #[error("component `{component}` not found on entity {entity}")]
    ComponentNotFound {
        /// The entity that was queried.
        entity: EntityId,
        /// Type name of the missing component.
        component: &'static str,
    },

    /// No registered system has this id.
    #[error("system not found: {0:?}")]
    SystemNotFound(SystemId),

    /// A type-erased cell was read as the wrong type.
    #[error("type mismatch: expected `{expected}`, cell holds `{found}`")]
    TypeMismatch {
        /// The type the caller asked for.
        expected: &'static str,
        /// The type actually stored.
        found: &'static str,
    },

    /// A type-erased cell was read after its value was moved out.
    #[error("empty cell: expected `{expected}`")]
    EmptyCell {
        /// The type the caller asked for.
        expected: &'static str,
    },

    /// A value was constructed from out-of-domain input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A bounded lock wait expired.
    #[error("{mode:?} lock not acquired within {timeout:?}")]
    LockTimeout {
        /// The requested mode.
        mode: LockMode,
        /// How long the caller was willing to wait.
        timeout: Duration,
    },
}

/// Result type for registry operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = EcsError::ComponentNotFound {
            entity: EntityId::from_raw(7),
            component: "Hull",
        };
        assert_eq!(err.to_string(), "component `Hull` not found on entity #7");

        let err = EcsError::TypeMismatch {
            expected: "u32",
            found: "f32",
        };
        assert!(err.to_string().contains("expected `u32`"));
    }
}
