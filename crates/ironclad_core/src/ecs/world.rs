//! # ECS World
//!
//! The registry: sole owner of every entity and system, and the only place
//! where the reverse component index is maintained.
//!
//! ## Layout
//!
//! ```text
//! entities:      EntityId ──▶ Entity { TypeKey ──▶ Polymorph }
//! by_component:  TypeKey  ──▶ {EntityId, ...}      (reverse index)
//! systems:       SystemId ──▶ Arc<Mutex<dyn System>>
//! system_order:  [SystemId, ...]                   (registration order)
//! ```
//!
//! ## Step
//!
//! `tick()` first applies the removals staged during the previous step, then
//! runs every system once in registration order. Removals requested while a
//! step is running are staged and wait for the next `tick()`, so iteration
//! never observes a container changing underneath it.

#![allow(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use slotmap::SlotMap;

use super::component::Component;
use super::entity::{Entity, EntityMut};
use super::id::{EntityId, IdGenerator};
use super::polymorph::{Polymorph, TypeKey};
use super::query::Query;
use super::system::{SharedSystem, System, SystemHandle, SystemId, TickReport};
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::event::{self, EventBus, EventCallback};

/// One simulation's registry.
///
/// Not internally synchronized: create, remove and tick from one thread.
/// Components that must be read from other threads carry their own lock
/// (see [`crate::sync`]).
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
///
/// let tank = world.create_entity();
/// world.add_component(tank, Position::default())?;
/// world.add_component(tank, Hull(100))?;
///
/// for id in world.get_entities_with_components::<(Position, Hull)>() {
///     // ...
/// }
/// ```
pub struct World {
    entities: IndexMap<EntityId, Entity>,
    by_component: HashMap<TypeKey, IndexSet<EntityId>>,
    ids: IdGenerator,

    // =========================================================================
    // Systems
    // =========================================================================
    systems: SlotMap<SystemId, SharedSystem>,
    system_order: Vec<SystemId>,

    // =========================================================================
    // Staged removals, applied at the start of the next tick
    // =========================================================================
    pending_entity_removals: IndexSet<EntityId>,
    pending_system_removals: IndexSet<SystemId>,

    events: EventBus,
    tick_count: u64,
    tick_state: Arc<Mutex<TickState>>,
}

/// Where a running [`World::tick`] is.
#[derive(Debug, Default, Clone, Copy)]
struct TickState {
    active: bool,
    /// The system being ticked and the address of its shared cell.
    running: Option<(SystemId, usize)>,
}

/// Clears [`TickState`] when `tick` returns or unwinds.
struct TickGuard(Arc<Mutex<TickState>>);

impl TickGuard {
    fn enter(state: &Arc<Mutex<TickState>>) -> Self {
        state.lock().active = true;
        Self(Arc::clone(state))
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        *self.0.lock() = TickState::default();
    }
}

impl World {
    /// Creates a world with default configuration and an entropy-seeded id
    /// generator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&WorldConfig::default())
    }

    /// Creates a world whose entity ids are reproducible from `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_config(&WorldConfig {
            seed: Some(seed),
            ..WorldConfig::default()
        })
    }

    /// Creates a world from a loaded configuration.
    #[must_use]
    pub fn with_config(config: &WorldConfig) -> Self {
        let ids = config
            .seed
            .map_or_else(IdGenerator::from_entropy, IdGenerator::from_seed);
        Self {
            entities: IndexMap::with_capacity(config.entity_capacity),
            by_component: HashMap::new(),
            ids,
            systems: SlotMap::with_capacity_and_key(config.system_capacity),
            system_order: Vec::with_capacity(config.system_capacity),
            pending_entity_removals: IndexSet::new(),
            pending_system_removals: IndexSet::new(),
            events: EventBus::new(),
            tick_count: 0,
            tick_state: Arc::default(),
        }
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Creates an empty entity with a fresh id.
    ///
    /// # Returns
    ///
    /// A non-zero id, unique among live entities.
    pub fn create_entity(&mut self) -> EntityId {
        let entities = &self.entities;
        let id = self.ids.next_id(|candidate| entities.contains_key(&candidate));
        self.entities.insert(id, Entity::new(id));
        tracing::trace!(entity = %id, "entity created");
        id
    }

    /// Removes an entity and all of its components now.
    ///
    /// Do not call this while iterating a query result that may contain the
    /// entity; use [`World::schedule_remove_entity`] instead.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for an unknown id.
    pub fn remove_entity(&mut self, id: EntityId) -> EcsResult<()> {
        self.detach(id).map(drop).ok_or(EcsError::EntityNotFound(id))
    }

    /// Marks an entity invalid now and removes it at the next [`World::tick`].
    ///
    /// The entity stays present, with all of its components, until then.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for an unknown id.
    pub fn schedule_remove_entity(&mut self, id: EntityId) -> EcsResult<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(EcsError::EntityNotFound(id))?;
        entity.invalidate();
        self.pending_entity_removals.insert(id);
        Ok(())
    }

    /// `true` while the entity exists, including after its removal was
    /// scheduled.
    #[inline]
    #[must_use]
    pub fn entity_present(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Checked entity lookup.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for an unknown id.
    pub fn get_entity(&self, id: EntityId) -> EcsResult<&Entity> {
        self.entities.get(&id).ok_or(EcsError::EntityNotFound(id))
    }

    /// Mutable handle for adding and removing components.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for an unknown id.
    pub fn entity_mut(&mut self, id: EntityId) -> EcsResult<EntityMut<'_>> {
        if self.entities.contains_key(&id) {
            Ok(EntityMut::new(self, id))
        } else {
            Err(EcsError::EntityNotFound(id))
        }
    }

    pub(crate) fn entity_ref(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches `component` to an entity, replacing any previous `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for an unknown id.
    pub fn add_component<T: Component>(&mut self, id: EntityId, component: T) -> EcsResult<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(EcsError::EntityNotFound(id))?;
        entity.insert_cell(T::key(), Polymorph::new(component));
        self.by_component.entry(T::key()).or_default().insert(id);
        Ok(())
    }

    /// Detaches `T` from an entity.
    ///
    /// # Returns
    ///
    /// The removed component, or `None` if the entity had no `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for an unknown id.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> EcsResult<Option<T>> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(EcsError::EntityNotFound(id))?;
        let removed = entity.remove_cell(&T::key());
        self.unindex(T::key(), id);
        removed.map(|mut cell| cell.take::<T>()).transpose()
    }

    /// `false` for unknown entities.
    #[must_use]
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.entities
            .get(&id)
            .is_some_and(Entity::has_component::<T>)
    }

    /// Checked component lookup.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] or [`EcsError::ComponentNotFound`].
    pub fn get_component<T: Component>(&self, id: EntityId) -> EcsResult<&T> {
        self.get_entity(id)?.get_component::<T>()
    }

    /// Checked exclusive component lookup.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] or [`EcsError::ComponentNotFound`].
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> EcsResult<&mut T> {
        self.entities
            .get_mut(&id)
            .ok_or(EcsError::EntityNotFound(id))?
            .get_component_mut::<T>()
    }

    /// Unchecked component lookup.
    ///
    /// # Safety
    ///
    /// The entity must exist and hold a `T`.
    #[inline]
    #[must_use]
    pub unsafe fn get_component_unsafe<T: Component>(&self, id: EntityId) -> &T {
        debug_assert!(self.has_component::<T>(id));
        self.entities
            .get(&id)
            .unwrap_unchecked()
            .get_component_unsafe::<T>()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Entities holding every component type of `Q`.
    ///
    /// Walks the smallest holder set against the others, so the cost follows
    /// the rarest component. Entities scheduled for removal are included;
    /// check [`Entity::is_valid`] to skip them.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let armed = world.get_entities_with_components::<(Turret, Ammo)>();
    /// ```
    #[must_use]
    pub fn get_entities_with_components<Q: Query>(&self) -> Vec<EntityId> {
        let mut sets = Vec::new();
        for key in Q::keys() {
            match self.by_component.get(&key) {
                Some(set) => sets.push(set),
                None => return Vec::new(),
            }
        }
        sets.sort_by_key(|set| set.len());

        let Some((smallest, rest)) = sets.split_first() else {
            return Vec::new();
        };
        smallest
            .iter()
            .filter(|id| rest.iter().all(|set| set.contains(*id)))
            .copied()
            .collect()
    }

    /// Calls `f` with every entity matching `Q` and its components.
    pub fn for_each_with<'s, Q, F>(&'s self, mut f: F)
    where
        Q: Query,
        F: FnMut(&'s Entity, Q::Item<'s>),
    {
        self.for_each_while::<Q, _>(|entity, item| {
            f(entity, item);
            true
        });
    }

    /// Like [`World::for_each_with`], stopping at the first `false`.
    ///
    /// # Returns
    ///
    /// `true` if every match was visited.
    pub fn for_each_while<'s, Q, F>(&'s self, mut f: F) -> bool
    where
        Q: Query,
        F: FnMut(&'s Entity, Q::Item<'s>) -> bool,
    {
        for id in self.get_entities_with_components::<Q>() {
            let Some(entity) = self.entities.get(&id) else {
                continue;
            };
            if let Some(item) = Q::fetch(entity) {
                if !f(entity, item) {
                    return false;
                }
            }
        }
        true
    }

    /// Calls `f` with exclusive access to the components of every entity
    /// matching `Q`, once each.
    ///
    /// Visits in entity map order: creation order until the first removal,
    /// which moves the last entity into the freed slot. The matches are found
    /// through the smallest holder set, then one pass over the entity map
    /// hands out the disjoint borrows.
    pub fn for_each_with_mut<'s, Q, F>(&'s mut self, mut f: F)
    where
        Q: Query,
        F: FnMut(EntityId, Q::ItemMut<'s>),
    {
        let matches: HashSet<EntityId> = self
            .get_entities_with_components::<Q>()
            .into_iter()
            .collect();
        if matches.is_empty() {
            return;
        }
        for (id, entity) in &mut self.entities {
            if !matches.contains(id) {
                continue;
            }
            if let Some(item) = Q::fetch_mut(entity) {
                f(*id, item);
            }
        }
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Initializes `system` against this world, then registers it after every
    /// system already present.
    ///
    /// # Errors
    ///
    /// Whatever `init` returns; the system is not registered in that case.
    pub fn add_system<S: System>(&mut self, system: S) -> EcsResult<SystemHandle<S>> {
        let shared = Arc::new(Mutex::new(system));
        shared.lock().init(self)?;

        let erased: SharedSystem = shared.clone();
        let id = self.systems.insert(erased);
        self.system_order.push(id);
        {
            let system = shared.lock();
            tracing::debug!(system = system.name(), ?id, "system registered");
        }
        Ok(SystemHandle::new(id, shared))
    }

    /// Unregisters a system now.
    ///
    /// Called from inside a tick, the removal is staged instead, exactly as
    /// [`World::schedule_remove_system`] would.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemNotFound`] for an unknown id.
    pub fn remove_system(&mut self, id: SystemId) -> EcsResult<()> {
        if self.tick_state.lock().active {
            tracing::debug!(?id, "system removal during tick deferred");
            return self.schedule_remove_system(id);
        }
        self.systems.remove(id).ok_or(EcsError::SystemNotFound(id))?;
        self.system_order.retain(|registered| *registered != id);
        self.pending_system_removals.swap_remove(&id);
        tracing::debug!(?id, "system removed");
        Ok(())
    }

    /// Unregisters a system at the start of the next [`World::tick`].
    ///
    /// A system may schedule its own removal; it still finishes the current
    /// step.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemNotFound`] for an unknown id.
    pub fn schedule_remove_system(&mut self, id: SystemId) -> EcsResult<()> {
        if !self.systems.contains_key(id) {
            return Err(EcsError::SystemNotFound(id));
        }
        self.pending_system_removals.insert(id);
        Ok(())
    }

    /// Registered systems, in run order.
    #[must_use]
    pub fn system_ids(&self) -> &[SystemId] {
        &self.system_order
    }

    /// Number of registered systems, including those staged for removal.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes `callback` to events of type `E`.
    ///
    /// Returns `false` if it already was.
    pub fn subscribe<E, C>(&mut self, callback: &Arc<Mutex<C>>) -> bool
    where
        E: 'static,
        C: EventCallback<E> + 'static,
    {
        self.events.subscribe::<E, C>(callback)
    }

    /// Removes `callback` from the subscribers of `E`.
    ///
    /// Returns `false` if it was not subscribed.
    pub fn unsubscribe<E, C>(&mut self, callback: &Arc<Mutex<C>>) -> bool
    where
        E: 'static,
        C: EventCallback<E> + 'static,
    {
        self.events.unsubscribe::<E, C>(callback)
    }

    /// Delivers `event` to every subscriber of `E` before returning.
    ///
    /// Waits for subscribers another thread has locked. The one exception is
    /// the system currently ticking: it is passed over with a warning when it
    /// emits an event it subscribes to.
    ///
    /// # Returns
    ///
    /// Number of subscribers reached.
    pub fn emit_event<E: 'static>(&mut self, event: E) -> usize {
        let running = self.tick_state.lock().running.map(|(_, address)| address);
        self.events.emit_skipping(&event, running)
    }

    /// The event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Runs one simulation step.
    ///
    /// 1. Erase entities staged by `schedule_remove_entity`
    /// 2. Unregister systems staged by `schedule_remove_system`
    /// 3. Tick every remaining system once, in registration order
    ///
    /// Systems added during the step first run on the next step.
    ///
    /// # Errors
    ///
    /// The first error a system returns. Systems after it do not run this
    /// step. Calling `tick` from inside a system is an
    /// [`EcsError::InvalidArgument`].
    ///
    /// A panicking system unwinds out of `tick` and leaves the world usable.
    pub fn tick(&mut self) -> EcsResult<TickReport> {
        if self.tick_state.lock().active {
            return Err(EcsError::InvalidArgument(
                "tick called from inside a system tick".to_string(),
            ));
        }

        let removed_entities = self.flush_entity_removals();
        let removed_systems = self.flush_system_removals();
        self.tick_count += 1;

        let order: Vec<(SystemId, SharedSystem)> = self
            .system_order
            .iter()
            .filter_map(|id| self.systems.get(*id).map(|system| (*id, Arc::clone(system))))
            .collect();

        let ticking = TickGuard::enter(&self.tick_state);
        let mut systems_run = 0;
        let mut outcome = Ok(());
        for (id, system) in order {
            self.tick_state.lock().running = Some((id, event::address(&system)));
            let result = system.lock().tick(self);
            self.tick_state.lock().running = None;
            if let Err(err) = result {
                outcome = Err(err);
                break;
            }
            systems_run += 1;
        }
        drop(ticking);
        outcome?;

        let report = TickReport {
            tick: self.tick_count,
            removed_entities,
            removed_systems,
            systems_run,
        };
        tracing::trace!(
            tick = report.tick,
            removed_entities,
            removed_systems,
            systems_run,
            "tick complete"
        );
        Ok(report)
    }

    /// Drops every entity and staged removal and lets every system
    /// `clean()`. Systems stay registered.
    ///
    /// Waits for systems another thread has locked. A system that calls
    /// `reset` from its own `tick` is the one system not cleaned.
    pub fn reset(&mut self) {
        let removed = self.entities.len();
        self.entities.clear();
        self.by_component.clear();
        self.pending_entity_removals.clear();
        self.pending_system_removals.clear();

        let running = self.tick_state.lock().running.map(|(id, _)| id);
        for id in &self.system_order {
            if running == Some(*id) {
                tracing::debug!(?id, "running system not cleaned");
                continue;
            }
            if let Some(system) = self.systems.get(*id) {
                system.lock().clean();
            }
        }
        tracing::debug!(removed, "world reset");
    }

    /// Full teardown: [`World::reset`], then every system unregistered and
    /// every subscription dropped.
    pub fn clean(&mut self) {
        self.reset();
        self.systems.clear();
        self.system_order.clear();
        self.events.clear();
        tracing::debug!("world cleaned");
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Live entities, including those staged for removal.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Completed calls to [`World::tick`].
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Ids re-drawn by the generator after hitting zero or a live id.
    #[must_use]
    pub const fn id_rerolls(&self) -> u64 {
        self.ids.rerolls()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn detach(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.swap_remove(&id)?;
        for key in entity.component_keys() {
            self.unindex(key, id);
        }
        self.pending_entity_removals.swap_remove(&id);
        tracing::trace!(entity = %id, "entity removed");
        Some(entity)
    }

    fn unindex(&mut self, key: TypeKey, id: EntityId) {
        if let Some(holders) = self.by_component.get_mut(&key) {
            holders.swap_remove(&id);
            if holders.is_empty() {
                self.by_component.remove(&key);
            }
        }
    }

    fn flush_entity_removals(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_entity_removals);
        pending
            .into_iter()
            .filter(|id| self.detach(*id).is_some())
            .count()
    }

    fn flush_system_removals(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_system_removals);
        let removed = pending
            .into_iter()
            .filter(|id| self.systems.remove(*id).is_some())
            .count();
        if removed > 0 {
            let systems = &self.systems;
            self.system_order.retain(|id| systems.contains_key(*id));
            tracing::debug!(removed, "staged systems removed");
        }
        removed
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("component_types", &self.by_component.len())
            .field("systems", &self.system_order.len())
            .field("pending_entity_removals", &self.pending_entity_removals.len())
            .field("pending_system_removals", &self.pending_system_removals.len())
            .field("tick_count", &self.tick_count)
            .field("tick_state", &*self.tick_state.lock())
            .finish()
    }
}
