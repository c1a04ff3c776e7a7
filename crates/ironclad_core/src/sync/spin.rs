//! # Spinning Writer-Priority Lock
//!
//! Same policy as [`RawRwLock`](super::RawRwLock), packed into one atomic
//! word and busy-waiting instead of sleeping on a condition variable.
//!
//! ```text
//!  bit 31       bits 0..31
//! ┌────────┬──────────────────┐
//! │ WRITER │   reader count   │
//! └────────┴──────────────────┘
//! ```
//!
//! A writer first claims the `WRITER` bit, which stops new readers, then
//! waits for the reader count to drain. The bit therefore means "pending"
//! until the count reaches zero and "held" afterwards.

#![allow(unsafe_code)]

use std::hint;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::lock_api::{self, GuardSend};

use super::guard::{LockMode, RawLock};

const WRITER: u32 = 1 << 31;
const READERS: u32 = WRITER - 1;

/// Spins this many times before yielding the thread.
const SPIN_LIMIT: u32 = 64;

struct Backoff {
    step: u32,
}

impl Backoff {
    const fn new() -> Self {
        Self { step: 0 }
    }

    fn snooze(&mut self) {
        if self.step < SPIN_LIMIT {
            hint::spin_loop();
            self.step += 1;
        } else {
            thread::yield_now();
        }
    }
}

/// Non-blocking (busy-waiting) reader-writer lock with writer priority.
#[derive(Debug, Default)]
pub struct RawSpinRwLock {
    word: AtomicU32,
}

impl RawSpinRwLock {
    /// Creates an idle lock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
        }
    }

    /// Number of readers currently inside.
    #[must_use]
    pub fn readers(&self) -> u32 {
        self.word.load(Ordering::Relaxed) & READERS
    }

    /// `true` while a writer is pending or holds the lock.
    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        self.word.load(Ordering::Relaxed) & WRITER != 0
    }

    fn try_read_once(&self) -> bool {
        let mut current = self.word.load(Ordering::Relaxed);
        loop {
            if current & WRITER != 0 {
                return false;
            }
            debug_assert!(current & READERS < READERS, "reader count overflow");
            match self.word.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn try_claim_writer(&self) -> bool {
        self.word.fetch_or(WRITER, Ordering::Acquire) & WRITER == 0
    }

    fn readers_drained(&self) -> bool {
        self.word.load(Ordering::Acquire) & READERS == 0
    }

    fn lock_until(&self, mode: LockMode, deadline: Option<Instant>) -> bool {
        let expired = || deadline.is_some_and(|deadline| Instant::now() >= deadline);
        let mut backoff = Backoff::new();
        match mode {
            LockMode::Read => loop {
                if self.try_read_once() {
                    return true;
                }
                if expired() {
                    return false;
                }
                backoff.snooze();
            },
            LockMode::Write => {
                while !self.try_claim_writer() {
                    if expired() {
                        return false;
                    }
                    backoff.snooze();
                }
                while !self.readers_drained() {
                    if expired() {
                        self.word.fetch_and(!WRITER, Ordering::Release);
                        return false;
                    }
                    backoff.snooze();
                }
                true
            }
        }
    }
}

impl RawLock for RawSpinRwLock {
    fn lock(&self, mode: LockMode) {
        self.lock_until(mode, None);
    }

    fn try_lock(&self, mode: LockMode) -> bool {
        match mode {
            LockMode::Read => self.try_read_once(),
            LockMode::Write => self
                .word
                .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
                .is_ok(),
        }
    }

    fn try_lock_for(&self, mode: LockMode, timeout: Duration) -> bool {
        self.lock_until(mode, Instant::now().checked_add(timeout))
    }

    fn unlock(&self, mode: LockMode) {
        match mode {
            LockMode::Read => {
                let previous = self.word.fetch_sub(1, Ordering::Release);
                debug_assert!(previous & READERS > 0, "read unlock without a reader");
            }
            LockMode::Write => {
                let previous = self.word.fetch_and(!WRITER, Ordering::Release);
                debug_assert!(previous & WRITER != 0, "write unlock without a writer");
            }
        }
    }
}

// SAFETY: readers only enter with the WRITER bit clear and a writer only
// returns once the bit is its own and the reader count is zero.
unsafe impl lock_api::RawRwLock for RawSpinRwLock {
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
        self.word.load(Ordering::Relaxed) != 0
    }
}

// SAFETY: same protocol, bounded by a deadline.
unsafe impl lock_api::RawRwLockTimed for RawSpinRwLock {
    type Duration = Duration;
    type Instant = Instant;

    fn try_lock_shared_for(&self, timeout: Duration) -> bool {
        RawLock::try_lock_for(self, LockMode::Read, timeout)
    }

    fn try_lock_shared_until(&self, timeout: Instant) -> bool {
        self.lock_until(LockMode::Read, Some(timeout))
    }

    fn try_lock_exclusive_for(&self, timeout: Duration) -> bool {
        RawLock::try_lock_for(self, LockMode::Write, timeout)
    }

    fn try_lock_exclusive_until(&self, timeout: Instant) -> bool {
        self.lock_until(LockMode::Write, Some(timeout))
    }
}
