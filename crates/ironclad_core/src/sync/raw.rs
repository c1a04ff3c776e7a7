//! # Blocking Writer-Priority Lock
//!
//! A reader-writer lock whose state lives behind a `parking_lot` mutex, with
//! one condition variable per side.
//!
//! ```text
//!   idle ──read──▶ reading(n) ──last unlock──▶ idle
//!     │                │
//!   write         writer arrives
//!     ▼                ▼
//!  writing ◀──n = 0── write_pending   (new readers wait here)
//! ```
//!
//! The simulation thread writes hot components every tick while a
//! presentation thread reads them continuously. Writer priority bounds the
//! simulation's wait at "the readers already inside", never "every reader
//! that keeps arriving".

#![allow(unsafe_code)]

use std::time::{Duration, Instant};

use parking_lot::lock_api::{self, GuardSend};
use parking_lot::{Condvar, Mutex};

use super::guard::{LockMode, RawLock};

#[derive(Debug)]
struct LockState {
    readers: u32,
    writer_active: bool,
    writers_waiting: u32,
}

impl LockState {
    const fn read_grantable(&self) -> bool {
        !self.writer_active && self.writers_waiting == 0
    }

    const fn write_grantable(&self) -> bool {
        !self.writer_active && self.readers == 0
    }
}

/// Blocking reader-writer lock with writer priority.
///
/// Usable on its own through [`RawLock`], embedded in a component through
/// [`Lockable`](super::Lockable), or as the raw half of [`RwLock<T>`](super::RwLock).
#[derive(Debug)]
pub struct RawRwLock {
    state: Mutex<LockState>,
    readers_cv: Condvar,
    writers_cv: Condvar,
}

impl RawRwLock {
    /// Creates an idle lock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: parking_lot::const_mutex(LockState {
                readers: 0,
                writer_active: false,
                writers_waiting: 0,
            }),
            readers_cv: Condvar::new(),
            writers_cv: Condvar::new(),
        }
    }

    /// Number of readers currently inside.
    #[must_use]
    pub fn readers(&self) -> u32 {
        self.state.lock().readers
    }

    /// `true` while at least one writer is queued.
    #[must_use]
    pub fn is_write_pending(&self) -> bool {
        self.state.lock().writers_waiting > 0
    }

    /// `true` while a writer holds the lock.
    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer_active
    }

    fn lock_read_until(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.read_grantable() {
                state.readers += 1;
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self.readers_cv.wait_until(&mut state, deadline).timed_out() {
                        let granted = state.read_grantable();
                        if granted {
                            state.readers += 1;
                        }
                        return granted;
                    }
                }
                None => self.readers_cv.wait(&mut state),
            }
        }
    }

    fn lock_write_until(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.state.lock();
        state.writers_waiting += 1;
        let acquired = loop {
            if state.write_grantable() {
                break true;
            }
            match deadline {
                Some(deadline) => {
                    if self.writers_cv.wait_until(&mut state, deadline).timed_out() {
                        break state.write_grantable();
                    }
                }
                None => self.writers_cv.wait(&mut state),
            }
        };
        state.writers_waiting -= 1;
        if acquired {
            state.writer_active = true;
        } else if state.writers_waiting == 0 && !state.writer_active {
            // The readers held back by this writer may go now.
            self.readers_cv.notify_all();
        }
        acquired
    }
}

impl Default for RawRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawLock for RawRwLock {
    fn lock(&self, mode: LockMode) {
        match mode {
            LockMode::Read => self.lock_read_until(None),
            LockMode::Write => self.lock_write_until(None),
        };
    }

    fn try_lock(&self, mode: LockMode) -> bool {
        let mut state = self.state.lock();
        match mode {
            LockMode::Read if state.read_grantable() => {
                state.readers += 1;
                true
            }
            LockMode::Write if state.write_grantable() => {
                state.writer_active = true;
                true
            }
            _ => false,
        }
    }

    fn try_lock_for(&self, mode: LockMode, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        match mode {
            LockMode::Read => self.lock_read_until(deadline),
            LockMode::Write => self.lock_write_until(deadline),
        }
    }

    fn unlock(&self, mode: LockMode) {
        let mut state = self.state.lock();
        match mode {
            LockMode::Read => {
                debug_assert!(state.readers > 0, "read unlock without a reader");
                state.readers = state.readers.saturating_sub(1);
                if state.readers == 0 && state.writers_waiting > 0 {
                    self.writers_cv.notify_one();
                }
            }
            LockMode::Write => {
                debug_assert!(state.writer_active, "write unlock without a writer");
                state.writer_active = false;
                if state.writers_waiting > 0 {
                    self.writers_cv.notify_one();
                } else {
                    self.readers_cv.notify_all();
                }
            }
        }
    }
}

// SAFETY: shared holds exclude exclusive holds and exclusive holds exclude
// each other, which is exactly the state machine above.
unsafe impl lock_api::RawRwLock for RawRwLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    type GuardMarker = GuardSend;

    fn lock_shared(&self) {
        RawLock::lock(self, LockMode::Read);
    }

    fn try_lock_shared(&self) -> bool {
        RawLock::try_lock(self, LockMode::Read)
    }

    unsafe fn unlock_shared(&self) {
        RawLock::unlock(self, LockMode::Read);
    }

    fn lock_exclusive(&self) {
        RawLock::lock(self, LockMode::Write);
    }

    fn try_lock_exclusive(&self) -> bool {
        RawLock::try_lock(self, LockMode::Write)
    }

    unsafe fn unlock_exclusive(&self) {
        RawLock::unlock(self, LockMode::Write);
    }

    fn is_locked(&self) -> bool {
        let state = self.state.lock();
        state.readers > 0 || state.writer_active
    }
}

// SAFETY: same state machine, bounded by a deadline.
unsafe impl lock_api::RawRwLockTimed for RawRwLock {
    type Duration = Duration;
    type Instant = Instant;

    fn try_lock_shared_for(&self, timeout: Duration) -> bool {
        RawLock::try_lock_for(self, LockMode::Read, timeout)
    }

    fn try_lock_shared_until(&self, timeout: Instant) -> bool {
        self.lock_read_until(Some(timeout))
    }

    fn try_lock_exclusive_for(&self, timeout: Duration) -> bool {
        RawLock::try_lock_for(self, LockMode::Write, timeout)
    }

    fn try_lock_exclusive_until(&self, timeout: Instant) -> bool {
        self.lock_write_until(Some(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_readers() {
        let lock = RawRwLock::new();
        assert!(lock.try_lock(LockMode::Read));
        assert!(lock.try_lock(LockMode::Read));
        assert_eq!(lock.readers(), 2);
        assert!(!lock.try_lock(LockMode::Write));

        lock.unlock(LockMode::Read);
        lock.unlock(LockMode::Read);
        assert!(lock.try_lock(LockMode::Write));
        assert!(lock.is_write_locked());
        assert!(!lock.try_lock(LockMode::Read));
        lock.unlock(LockMode::Write);
    }

    #[test]
    fn test_timed_read_waits_out_writer() {
        let lock = RawRwLock::new();
        lock.lock(LockMode::Write);
        assert!(!lock.try_lock_for(LockMode::Read, Duration::from_millis(5)));
        lock.unlock(LockMode::Write);
        assert!(lock.try_lock_for(LockMode::Read, Duration::from_millis(5)));
        lock.unlock(LockMode::Read);
    }

    #[test]
    fn test_huge_timeout_does_not_overflow() {
        let lock = RawRwLock::new();
        assert!(lock.try_lock_for(LockMode::Write, Duration::MAX));
        lock.unlock(LockMode::Write);
    }
}
