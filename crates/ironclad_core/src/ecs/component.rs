//! # Component System
//!
//! Components are plain data attached to entities, at most one instance of
//! each type per entity. They live in type-erased cells, so any
//! `Send + Sync + 'static` type can be one once it opts in.
//!
//! A component that must be read from another thread (a presentation thread
//! drawing positions while the simulation moves them) wraps its state in a
//! [`RwLock`](crate::sync::RwLock) behind an `Arc`, or mixes a raw lock in
//! through [`Lockable`](crate::sync::Lockable). The registry itself never
//! locks components.

use super::polymorph::TypeKey;

/// Marker trait for registry components.
///
/// # Example
///
/// ```rust,ignore
/// struct Hull {
///     integrity: u32,
/// }
///
/// impl Component for Hull {}
/// ```
pub trait Component: Send + Sync + 'static {
    /// Key used for this type in entity maps and the reverse index.
    #[inline]
    #[must_use]
    fn key() -> TypeKey
    where
        Self: Sized,
    {
        TypeKey::of::<Self>()
    }
}

impl<T: Component> Component for std::sync::Arc<T> {}
