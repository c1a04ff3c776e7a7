//! # Type-Erased Value Cell
//!
//! A [`Polymorph`] owns exactly one value of a type chosen at construction
//! and forgets that type statically. Entities keep one cell per component
//! type, which lets them hold any number of unrelated component types without
//! a closed enum.
//!
//! Two read paths exist:
//!
//! - `get` / `get_mut`: compare the stored [`TypeKey`] and fail with
//!   [`EcsError::TypeMismatch`] when it differs
//! - `get_unchecked` / `get_unchecked_mut`: no comparison, for hot loops that
//!   already proved the type through the key they looked the cell up by

// SAFETY: the unchecked accessors cast the erased pointer without a type
// comparison. Callers of those `unsafe fn`s guarantee the stored type.
#![allow(unsafe_code)]

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{EcsError, EcsResult};

/// Process-wide stable key for a Rust type, with its name for diagnostics.
///
/// Equality and hashing only look at the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key of `T`.
    #[inline]
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    #[inline]
    #[must_use]
    pub const fn type_id(self) -> TypeId {
        self.id
    }

    /// Full type name, as reported by [`std::any::type_name`].
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
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

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type Erased = Box<dyn Any + Send + Sync>;

/// Owning, move-only cell holding one value of an erased type.
///
/// Never `Clone`: moving a `Polymorph` transfers the value, it never
/// duplicates it.
#[derive(Default)]
pub struct Polymorph {
    slot: Option<(TypeKey, Erased)>,
}

impl Polymorph {
    /// Erases `value` into a new cell.
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            slot: Some((TypeKey::of::<T>(), Box::new(value))),
        }
    }

    /// Creates a cell holding nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self { slot: None }
    }

    /// `true` when the cell holds no value.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Key of the stored type, or `None` for an empty cell.
    #[inline]
    #[must_use]
    pub fn type_info(&self) -> Option<TypeKey> {
        self.slot.as_ref().map(|(key, _)| *key)
    }

    /// `true` when the cell currently holds a `T`.
    #[inline]
    #[must_use]
    pub fn holds<T: 'static>(&self) -> bool {
        self.type_info()
            .is_some_and(|key| key.type_id() == TypeId::of::<T>())
    }

    /// Checked shared access.
    ///
    /// # Errors
    ///
    /// [`EcsError::EmptyCell`] for an empty cell, [`EcsError::TypeMismatch`]
    /// when the stored type is not `T`.
    pub fn get<T: 'static>(&self) -> EcsResult<&T> {
        let (key, value) = self.slot.as_ref().ok_or(EcsError::EmptyCell {
            expected: type_name::<T>(),
        })?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(*key))
    }

    /// Checked exclusive access.
    ///
    /// # Errors
    ///
    /// Same as [`Polymorph::get`].
    pub fn get_mut<T: 'static>(&mut self) -> EcsResult<&mut T> {
        let (key, value) = self.slot.as_mut().ok_or(EcsError::EmptyCell {
            expected: type_name::<T>(),
        })?;
        let key = *key;
        value.downcast_mut::<T>().ok_or_else(|| mismatch::<T>(key))
    }

    /// Moves the value out, leaving the cell empty.
    ///
    /// On a type mismatch the value stays in the cell.
    ///
    /// # Errors
    ///
    /// Same as [`Polymorph::get`].
    pub fn take<T: 'static>(&mut self) -> EcsResult<T> {
        self.get::<T>()?;
        let (key, value) = self.slot.take().ok_or(EcsError::EmptyCell {
            expected: type_name::<T>(),
        })?;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| mismatch::<T>(key))
    }

    /// Exclusive access to the stored `T`, first replacing whatever the cell
    /// held with `init()` when that is not a `T`.
    pub fn get_or_insert_with<T, F>(&mut self, init: F) -> &mut T
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if !self.holds::<T>() {
            *self = Self::new(init());
        }
        // SAFETY: the cell holds a `T` after the replacement above.
        unsafe { self.get_unchecked_mut::<T>() }
    }

    /// Unchecked shared access.
    ///
    /// # Safety
    ///
    /// The cell must be non-empty and hold a `T`. Anything else is undefined
    /// behaviour. Debug builds assert it.
    #[inline]
    #[must_use]
    pub unsafe fn get_unchecked<T: 'static>(&self) -> &T {
        debug_assert!(self.holds::<T>(), "unchecked read as `{}`", type_name::<T>());
        let (_, value) = self.slot.as_ref().unwrap_unchecked();
        &*(&**value as *const (dyn Any + Send + Sync)).cast::<T>()
    }

    /// Unchecked exclusive access.
    ///
    /// # Safety
    ///
    /// Same contract as [`Polymorph::get_unchecked`].
    #[inline]
    #[must_use]
    pub unsafe fn get_unchecked_mut<T: 'static>(&mut self) -> &mut T {
        debug_assert!(self.holds::<T>(), "unchecked write as `{}`", type_name::<T>());
        let (_, value) = self.slot.as_mut().unwrap_unchecked();
        &mut *(&mut **value as *mut (dyn Any + Send + Sync)).cast::<T>()
    }
}

impl fmt::Debug for Polymorph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_info() {
            Some(key) => write!(f, "Polymorph<{}>", key.name()),
            None => f.write_str("Polymorph<empty>"),
        }
    }
}

fn mismatch<T: 'static>(found: TypeKey) -> EcsError {
    EcsError::TypeMismatch {
        expected: type_name::<T>(),
        found: found.name(),
    }
}
