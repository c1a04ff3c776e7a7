//! # Systems
//!
//! A system is one unit of per-step simulation logic. The [`World`] drives
//! its lifecycle:
//!
//! 1. `init` once, when it is added (may look up and cache entity ids)
//! 2. `tick` once per `World::tick`, in registration order
//! 3. `clean` on `World::reset`, before the entities it cached disappear
//!
//! Systems are stored as `Arc<Mutex<S>>` so the world can run one while
//! handing it `&mut World`, and so the same object can also be subscribed
//! to events.

use std::any::type_name;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use slotmap::new_key_type;

use super::world::World;
use crate::error::EcsResult;

new_key_type! {
    /// Stable handle of a registered system.
    pub struct SystemId;
}

/// Per-step simulation logic.
pub trait System: Send + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Called once before registration. An error aborts the registration.
    ///
    /// # Errors
    ///
    /// Whatever the system's lookups fail with.
    fn init(&mut self, world: &mut World) -> EcsResult<()> {
        let _ = world;
        Ok(())
    }

    /// Called once per simulation step.
    ///
    /// # Errors
    ///
    /// An error stops the current step; the world returns it from `tick`.
    fn tick(&mut self, world: &mut World) -> EcsResult<()>;

    /// Drops cached state on `World::reset`.
    fn clean(&mut self) {}
}

/// Type-erased shared system, as the world stores it.
pub type SharedSystem = Arc<Mutex<dyn System>>;

/// Typed handle returned by `World::add_system`.
///
/// Keeps the concrete type so callers can inspect the system or subscribe
/// it to events.
pub struct SystemHandle<S> {
    id: SystemId,
    system: Arc<Mutex<S>>,
}

impl<S> SystemHandle<S> {
    pub(crate) fn new(id: SystemId, system: Arc<Mutex<S>>) -> Self {
        Self { id, system }
    }

    /// Registry id, for removal.
    #[must_use]
    pub fn id(&self) -> SystemId {
        self.id
    }

    /// The shared system object.
    #[must_use]
    pub fn shared(&self) -> &Arc<Mutex<S>> {
        &self.system
    }

    /// Locks the system.
    ///
    /// Do not hold the guard across `World::tick`: the world locks every
    /// system it runs.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.system.lock()
    }
}

impl<S> Clone for SystemHandle<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            system: Arc::clone(&self.system),
        }
    }
}

/// What one `World::tick` did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Step number, starting at 1.
    pub tick: u64,
    /// Entities physically erased at the start of the step.
    pub removed_entities: usize,
    /// Systems unregistered at the start of the step.
    pub removed_systems: usize,
    /// Systems whose `tick` ran to completion.
    pub systems_run: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl System for Idle {
        fn tick(&mut self, _world: &mut World) -> EcsResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_name_and_handle() {
        let mut world = World::with_seed(1);
        let handle = world.add_system(Idle).unwrap();
        assert!(handle.lock().name().ends_with("Idle"));

        let copy = handle.clone();
        assert_eq!(copy.id(), handle.id());
        assert!(Arc::ptr_eq(copy.shared(), handle.shared()));
    }
}
