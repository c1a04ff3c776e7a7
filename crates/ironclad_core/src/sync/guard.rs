//! # Lock Modes, Mix-in and Scope Guard
//!
//! Both raw locks implement [`RawLock`]. A component type becomes lockable
//! by embedding one of them and implementing [`Lockable`]; callers then hold
//! a [`ScopedLock`] for as long as they touch the component's shared fields.

use std::time::Duration;

use crate::error::{EcsError, EcsResult};

/// Access mode requested from a reader-writer lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LockMode {
    /// Shared access, any number of holders.
    Read = 0,
    /// Exclusive access, one holder.
    Write = 1,
}

impl TryFrom<u8> for LockMode {
    type Error = EcsError;

    fn try_from(value: u8) -> EcsResult<Self> {
        match value {
            0 => Ok(Self::Read),
            1 => Ok(Self::Write),
            other => Err(EcsError::InvalidArgument(format!(
                "unknown lock mode discriminant {other}"
            ))),
        }
    }
}

/// Mode-based reader-writer lock interface.
///
/// Implementations grant writers priority: once a writer waits, no new
/// reader acquires until that writer has acquired and released.
pub trait RawLock: Send + Sync {
    /// Blocks until `mode` is granted.
    fn lock(&self, mode: LockMode);

    /// Acquires `mode` only if it is immediately grantable.
    fn try_lock(&self, mode: LockMode) -> bool;

    /// Waits at most `timeout` for `mode`.
    fn try_lock_for(&self, mode: LockMode, timeout: Duration) -> bool;

    /// Releases one hold of `mode`.
    ///
    /// Releasing a mode that is not held corrupts the lock state for every
    /// other user. Prefer [`ScopedLock`], which cannot get this wrong.
    fn unlock(&self, mode: LockMode);
}

/// Mix-in for component types that guard their own fields.
///
/// # Example
///
/// ```rust,ignore
/// struct Radar {
///     lock: RawRwLock,
///     sweep: AtomicU32,
/// }
///
/// impl Lockable for Radar {
///     type Lock = RawRwLock;
///     fn raw_lock(&self) -> &RawRwLock {
///         &self.lock
///     }
/// }
///
/// let _guard = radar.write();
/// radar.sweep.store(90, Ordering::Relaxed);
/// ```
pub trait Lockable {
    /// The embedded lock type.
    type Lock: RawLock;

    /// The embedded lock.
    fn raw_lock(&self) -> &Self::Lock;

    /// Blocks for shared access.
    fn read(&self) -> ScopedLock<'_, Self::Lock> {
        ScopedLock::new(self.raw_lock(), LockMode::Read)
    }

    /// Blocks for exclusive access.
    fn write(&self) -> ScopedLock<'_, Self::Lock> {
        ScopedLock::new(self.raw_lock(), LockMode::Write)
    }

    /// Shared access if immediately available.
    fn try_read(&self) -> Option<ScopedLock<'_, Self::Lock>> {
        ScopedLock::try_new(self.raw_lock(), LockMode::Read)
    }

    /// Exclusive access if immediately available.
    fn try_write(&self) -> Option<ScopedLock<'_, Self::Lock>> {
        ScopedLock::try_new(self.raw_lock(), LockMode::Write)
    }
}

/// Holds one mode of a [`RawLock`] and releases it on every exit path.
///
/// A guard built with [`ScopedLock::deferred`] starts unlocked; it still
/// releases on drop whatever it acquired later.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ScopedLock<'a, L: RawLock + ?Sized> {
    lock: &'a L,
    mode: LockMode,
    owned: bool,
}

impl<'a, L: RawLock + ?Sized> ScopedLock<'a, L> {
    /// Blocks until `mode` is held.
    pub fn new(lock: &'a L, mode: LockMode) -> Self {
        lock.lock(mode);
        Self {
            lock,
            mode,
            owned: true,
        }
    }

    /// Binds the guard without acquiring.
    pub fn deferred(lock: &'a L, mode: LockMode) -> Self {
        Self {
            lock,
            mode,
            owned: false,
        }
    }

    /// Acquires only if immediately grantable.
    pub fn try_new(lock: &'a L, mode: LockMode) -> Option<Self> {
        let mut guard = Self::deferred(lock, mode);
        guard.try_lock().then_some(guard)
    }

    /// Waits at most `timeout`.
    ///
    /// # Errors
    ///
    /// [`EcsError::LockTimeout`] if the mode was not granted in time.
    pub fn acquire_for(lock: &'a L, mode: LockMode, timeout: Duration) -> EcsResult<Self> {
        let mut guard = Self::deferred(lock, mode);
        if guard.try_lock_for(timeout) {
            Ok(guard)
        } else {
            Err(EcsError::LockTimeout { mode, timeout })
        }
    }

    /// Acquires a deferred or released guard. No-op when already held.
    pub fn lock(&mut self) {
        if !self.owned {
            self.lock.lock(self.mode);
            self.owned = true;
        }
    }

    /// Non-blocking [`ScopedLock::lock`].
    pub fn try_lock(&mut self) -> bool {
        if !self.owned {
            self.owned = self.lock.try_lock(self.mode);
        }
        self.owned
    }

    /// Bounded [`ScopedLock::lock`].
    pub fn try_lock_for(&mut self, timeout: Duration) -> bool {
        if !self.owned {
            self.owned = self.lock.try_lock_for(self.mode, timeout);
        }
        self.owned
    }

    /// Releases early. No-op when not held.
    pub fn unlock(&mut self) {
        if self.owned {
            self.lock.unlock(self.mode);
            self.owned = false;
        }
    }

    /// `true` while the guard holds its mode.
    #[must_use]
    pub const fn owns_lock(&self) -> bool {
        self.owned
    }

    /// The mode this guard manages.
    #[must_use]
    pub const fn mode(&self) -> LockMode {
        self.mode
    }
}

impl<L: RawLock + ?Sized> Drop for ScopedLock<'_, L> {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{RawRwLock, RawSpinRwLock};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Radar {
        lock: RawRwLock,
        sweep: AtomicU32,
    }

    impl Lockable for Radar {
        type Lock = RawRwLock;

        fn raw_lock(&self) -> &RawRwLock {
            &self.lock
        }
    }

    #[test]
    fn test_mode_discriminants() {
        assert_eq!(LockMode::try_from(0).unwrap(), LockMode::Read);
        assert_eq!(LockMode::try_from(1).unwrap(), LockMode::Write);
        assert!(matches!(
            LockMode::try_from(7),
            Err(EcsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = RawSpinRwLock::new();
        {
            let guard = ScopedLock::new(&lock, LockMode::Write);
            assert!(guard.owns_lock());
            assert!(!lock.try_lock(LockMode::Read));
        }
        assert!(lock.try_lock(LockMode::Write));
        lock.unlock(LockMode::Write);
    }

    #[test]
    fn test_deferred_guard() {
        let lock = RawRwLock::new();
        let mut guard = ScopedLock::deferred(&lock, LockMode::Read);
        assert!(!guard.owns_lock());
        assert!(lock.try_lock(LockMode::Write));

        // Writer holds it, so the deferred reader cannot get in.
        assert!(!guard.try_lock());
        lock.unlock(LockMode::Write);

        assert!(guard.try_lock());
        assert_eq!(lock.readers(), 1);
        guard.unlock();
        assert_eq!(lock.readers(), 0);
    }

    #[test]
    fn test_early_return_releases() {
        fn bail(lock: &RawRwLock) -> Result<(), &'static str> {
            let _guard = ScopedLock::new(lock, LockMode::Write);
            Err("jammed")
        }

        let lock = RawRwLock::new();
        assert!(bail(&lock).is_err());
        assert!(!lock.is_write_locked());
    }

    #[test]
    fn test_acquire_for_times_out() {
        let lock = RawRwLock::new();
        let _reader = ScopedLock::new(&lock, LockMode::Read);
        let err = ScopedLock::acquire_for(&lock, LockMode::Write, Duration::from_millis(5))
            .err()
            .unwrap();
        assert!(matches!(err, EcsError::LockTimeout { mode: LockMode::Write, .. }));
        // The timed-out writer no longer blocks readers.
        assert!(ScopedLock::try_new(&lock, LockMode::Read).is_some());
    }

    #[test]
    fn test_lockable_mixin() {
        let radar = Radar {
            lock: RawRwLock::new(),
            sweep: AtomicU32::new(0),
        };
        {
            let _guard = radar.write();
            radar.sweep.store(90, Ordering::Relaxed);
            assert!(radar.try_read().is_none());
        }
        let guard = radar.read();
        assert_eq!(radar.sweep.load(Ordering::Relaxed), 90);
        assert!(radar.try_write().is_none());
        drop(guard);
        assert!(radar.try_write().is_some());
    }
}
