//! # Shared-Component Locks
//!
//! The registry is single-threaded. Individual components may still be read
//! from other threads (the presentation thread drawing what the simulation
//! thread moves), each component guarding only itself.
//!
//! ```text
//! Simulation thread:   tick ── write(Position) ── write(Hull) ── ...
//! Presentation thread: ── read(Position) ── read(Position) ── ...
//! ```
//!
//! There is no multi-component transaction: a reader may observe a new
//! position next to an old hull value.
//!
//! ## Flavors
//!
//! - [`RawRwLock`]: blocks on a condition variable
//! - [`RawSpinRwLock`]: one atomic word, busy-waits; for call sites that must
//!   never sleep
//!
//! Both favour writers, and both back a data-carrying alias ([`RwLock`],
//! [`SpinRwLock`]) with RAII guards, or can be mixed into a component type
//! through [`Lockable`] and held with a [`ScopedLock`].

mod guard;
mod raw;
mod spin;

use parking_lot::lock_api;

use crate::ecs::Component;

pub use guard::{LockMode, Lockable, RawLock, ScopedLock};
pub use raw::RawRwLock;
pub use spin::RawSpinRwLock;

/// Writer-priority reader-writer lock owning its data.
pub type RwLock<T> = lock_api::RwLock<RawRwLock, T>;
/// Shared guard of an [`RwLock`].
pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawRwLock, T>;
/// Exclusive guard of an [`RwLock`].
pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawRwLock, T>;

/// Spinning variant of [`RwLock`].
pub type SpinRwLock<T> = lock_api::RwLock<RawSpinRwLock, T>;
/// Shared guard of a [`SpinRwLock`].
pub type SpinRwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawSpinRwLock, T>;
/// Exclusive guard of a [`SpinRwLock`].
pub type SpinRwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawSpinRwLock, T>;

impl<T: Send + Sync + 'static> Component for RwLock<T> {}
impl<T: Send + Sync + 'static> Component for SpinRwLock<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[test]
    fn test_data_lock_guards() {
        let position = RwLock::new(Position::default());
        {
            let mut guard = position.write();
            guard.x = 4.0;
            assert!(position.try_read().is_none());
        }
        let a = position.read();
        let b = position.read();
        assert_eq!(a.x, b.x);
        assert!(position.try_write_for(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_spin_data_lock_across_threads() {
        let position = Arc::new(SpinRwLock::new(Position::default()));
        let writer = {
            let position = Arc::clone(&position);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let mut guard = position.write();
                    guard.x += 1.0;
                    guard.y -= 1.0;
                }
            })
        };
        for _ in 0..1000 {
            let guard = position.read();
            // Each write is atomic with respect to readers.
            assert!((guard.x + guard.y).abs() < f32::EPSILON);
        }
        writer.join().unwrap();
        assert_eq!(*position.read(), Position { x: 1000.0, y: -1000.0 });
    }
}
