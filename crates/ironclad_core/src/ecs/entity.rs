//! # Entity Management
//!
//! An [`Entity`] is an id plus one type-erased cell per attached component
//! type. Entities are owned by the [`World`](super::World); consumers only
//! ever see `&Entity` or an [`EntityMut`] handle borrowed from it.
//!
//! The entity has no reverse index of its own. Every component insert or
//! removal goes through [`EntityMut`] (or the `World` shortcuts), which
//! update the world's per-type holder sets in the same call.

#![allow(unsafe_code)]

use std::any::type_name;
use std::collections::HashMap;

use super::component::Component;
use super::id::EntityId;
use super::polymorph::{Polymorph, TypeKey};
use super::world::World;
use crate::error::{EcsError, EcsResult};

/// An id and its components.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    components: HashMap<TypeKey, Polymorph>,
    valid: bool,
}

impl Entity {
    /// Only the world's factory creates entities.
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            components: HashMap::new(),
            valid: true,
        }
    }

    /// The id assigned at creation. Never changes.
    #[inline]
    #[must_use]
    pub const fn get_id(&self) -> EntityId {
        self.id
    }

    /// `false` once removal has been scheduled for the next tick.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of attached components.
    #[inline]
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// O(1) presence test.
    #[inline]
    #[must_use]
    pub fn has_component<T: Component>(&self) -> bool {
        self.components.contains_key(&T::key())
    }

    /// Checked component access.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotFound`] when the entity has no `T`.
    pub fn get_component<T: Component>(&self) -> EcsResult<&T> {
        self.components
            .get(&T::key())
            .ok_or_else(|| self.missing::<T>())?
            .get::<T>()
    }

    /// Unchecked component access for loops that already called
    /// [`Entity::has_component`].
    ///
    /// # Safety
    ///
    /// The entity must hold a `T`.
    #[inline]
    #[must_use]
    pub unsafe fn get_component_unsafe<T: Component>(&self) -> &T {
        debug_assert!(self.has_component::<T>());
        self.components
            .get(&T::key())
            .unwrap_unchecked()
            .get_unchecked::<T>()
    }

    /// Keys of every attached component, in no particular order.
    pub fn component_keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.components.keys().copied()
    }

    pub(crate) fn get_component_mut<T: Component>(&mut self) -> EcsResult<&mut T> {
        let missing = self.missing::<T>();
        self.components
            .get_mut(&T::key())
            .ok_or(missing)?
            .get_mut::<T>()
    }

    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = (&TypeKey, &mut Polymorph)> {
        self.components.iter_mut()
    }

    pub(crate) fn cell(&self, key: &TypeKey) -> Option<&Polymorph> {
        self.components.get(key)
    }

    /// Returns the replaced cell, if any.
    pub(crate) fn insert_cell(&mut self, key: TypeKey, cell: Polymorph) -> Option<Polymorph> {
        self.components.insert(key, cell)
    }

    pub(crate) fn remove_cell(&mut self, key: &TypeKey) -> Option<Polymorph> {
        self.components.remove(key)
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    fn missing<T: Component>(&self) -> EcsError {
        EcsError::ComponentNotFound {
            entity: self.id,
            component: type_name::<T>(),
        }
    }
}

/// Mutable entity handle borrowed from the [`World`].
///
/// Component changes made through this handle keep the world's reverse
/// component index consistent.
pub struct EntityMut<'w> {
    world: &'w mut World,
    id: EntityId,
}

impl<'w> EntityMut<'w> {
    /// The world checks that `id` is live before building the handle.
    pub(crate) fn new(world: &'w mut World, id: EntityId) -> Self {
        Self { world, id }
    }

    /// The entity's id.
    #[inline]
    #[must_use]
    pub const fn get_id(&self) -> EntityId {
        self.id
    }

    /// Attaches `component`, replacing any previous `T`.
    ///
    /// Returns the handle for chaining.
    ///
    /// # Errors
    ///
    /// Whatever [`World::add_component`] reports for this entity.
    pub fn add_component<T: Component>(&mut self, component: T) -> EcsResult<&mut Self> {
        self.world.add_component(self.id, component)?;
        Ok(self)
    }

    /// Detaches `T`, returning it if it was present.
    pub fn remove_component<T: Component>(&mut self) -> Option<T> {
        self.world.remove_component::<T>(self.id).ok().flatten()
    }

    /// Presence test.
    #[must_use]
    pub fn has_component<T: Component>(&self) -> bool {
        self.entity().has_component::<T>()
    }

    /// Checked shared access.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotFound`] when the entity has no `T`.
    pub fn get_component<T: Component>(&self) -> EcsResult<&T> {
        self.entity().get_component::<T>()
    }

    /// Checked exclusive access.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotFound`] when the entity has no `T`.
    pub fn get_component_mut<T: Component>(&mut self) -> EcsResult<&mut T> {
        self.world.get_component_mut::<T>(self.id)
    }

    /// The underlying entity.
    ///
    /// # Panics
    ///
    /// Never in practice: the handle borrows the world mutably, so the entity
    /// it was created for cannot be removed while it lives.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        self.world
            .entity_ref(self.id)
            .unwrap_or_else(|| unreachable!("EntityMut outlived entity {}", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Turret {
        heading: f32,
    }
    impl Component for Turret {}

    #[derive(Debug)]
    struct Ammo(u32);
    impl Component for Ammo {}

    #[test]
    fn test_component_cells() {
        let mut entity = Entity::new(EntityId::from_raw(42));
        assert_eq!(entity.get_id(), EntityId::from_raw(42));
        assert!(entity.is_valid());
        assert!(!entity.has_component::<Turret>());

        entity.insert_cell(Turret::key(), Polymorph::new(Turret { heading: 90.0 }));
        assert!(entity.has_component::<Turret>());
        assert_eq!(entity.component_count(), 1);

        entity.get_component_mut::<Turret>().unwrap().heading = 180.0;
        assert_eq!(entity.get_component::<Turret>().unwrap().heading, 180.0);

        // SAFETY: presence checked above.
        let turret = unsafe { entity.get_component_unsafe::<Turret>() };
        assert_eq!(turret, &Turret { heading: 180.0 });

        let err = entity.get_component::<Ammo>().unwrap_err();
        assert_eq!(
            err,
            EcsError::ComponentNotFound {
                entity: EntityId::from_raw(42),
                component: type_name::<Ammo>(),
            }
        );

        assert!(entity.remove_cell(&Turret::key()).is_some());
        assert!(!entity.has_component::<Turret>());
    }

    #[test]
    fn test_entity_mut_handle() {
        let mut world = World::with_seed(3);
        let id = world.create_entity();

        let mut handle = world.entity_mut(id).unwrap();
        handle
            .add_component(Turret { heading: 0.0 })
            .unwrap()
            .add_component(Ammo(12))
            .unwrap();
        handle.get_component_mut::<Ammo>().unwrap().0 -= 1;
        assert_eq!(handle.get_component::<Ammo>().unwrap().0, 11);
        assert_eq!(handle.remove_component::<Ammo>().map(|a| a.0), Some(11));
        assert!(handle.remove_component::<Ammo>().is_none());
        assert!(handle.has_component::<Turret>());

        assert_eq!(world.get_entities_with_components::<(Turret,)>(), vec![id]);
        assert!(world.get_entities_with_components::<(Ammo,)>().is_empty());
    }

    #[test]
    fn test_entity_mut_chain_propagates() -> EcsResult<()> {
        let mut world = World::with_seed(3);
        let id = world.create_entity();

        world
            .entity_mut(id)?
            .add_component(Turret { heading: 45.0 })?
            .add_component(Ammo(3))?
            .add_component(Turret { heading: 90.0 })?;

        let handle = world.entity_mut(id)?;
        assert!((handle.get_component::<Turret>()?.heading - 90.0).abs() < f32::EPSILON);
        assert_eq!(handle.entity().component_count(), 2);
        Ok(())
    }
}
