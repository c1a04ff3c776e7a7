//! Integration tests for entity lifecycle, component bookkeeping and queries.

use std::collections::HashSet;

use ironclad_core::{Component, EcsError, EntityId, World, WorldConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {}

#[derive(Debug, PartialEq)]
struct Turret {
    heading: f32,
}
impl Component for Turret {}

#[test]
fn test_ids_are_nonzero_and_unique() {
    let mut world = World::with_seed(2024);
    let mut seen = HashSet::new();
    for _ in 0..10_000 {
        let id = world.create_entity();
        assert_ne!(id, EntityId::INVALID);
        assert!(seen.insert(id), "duplicate live id {id}");
    }
    assert_eq!(world.entity_count(), 10_000);
}

#[test]
fn test_unseeded_world_creates_entities() {
    let mut world = World::new();
    let a = world.create_entity();
    let b = world.create_entity();
    assert_ne!(a, b);
    assert!(!a.is_invalid() && !b.is_invalid());
}

#[test]
fn test_world_from_config() {
    let config = WorldConfig::from_toml_str("seed = 5\nentity_capacity = 8").unwrap();
    let mut a = World::with_config(&config);
    let mut b = World::with_seed(5);
    assert_eq!(a.create_entity(), b.create_entity());
}

#[test]
fn test_has_component_tracks_add_and_remove() {
    let mut world = World::with_seed(1);
    let id = world.create_entity();

    world.add_component(id, Position { x: 1.0, y: 1.0 }).unwrap();
    assert!(world.has_component::<Position>(id));
    world.add_component(id, Turret { heading: 0.0 }).unwrap();
    assert!(world.has_component::<Turret>(id));

    world.remove_component::<Position>(id).unwrap();
    assert!(!world.has_component::<Position>(id));
    assert!(world.has_component::<Turret>(id));
    assert!(world.get_entities_with_components::<(Position,)>().is_empty());

    world.remove_component::<Turret>(id).unwrap();
    assert!(!world.has_component::<Turret>(id));
}

#[test]
fn test_entity_handle_updates_index() {
    let mut world = World::with_seed(1);
    let id = world.create_entity();
    world
        .entity_mut(id)
        .unwrap()
        .add_component(Position { x: 0.0, y: 0.0 })
        .unwrap()
        .add_component(Velocity { dx: 1.0, dy: 0.0 })
        .unwrap();
    assert_eq!(
        world.get_entities_with_components::<(Position, Velocity)>(),
        vec![id]
    );

    let removed = world.entity_mut(id).unwrap().remove_component::<Velocity>();
    assert_eq!(removed, Some(Velocity { dx: 1.0, dy: 0.0 }));
    assert!(world
        .get_entities_with_components::<(Position, Velocity)>()
        .is_empty());
}

#[test]
fn test_intersection_matches_has_component() {
    let mut world = World::with_seed(77);

    // Every subset of {Position, Velocity, Turret}, several times over.
    for round in 0..5 {
        for mask in 0u8..8 {
            let id = world.create_entity();
            if mask & 1 != 0 {
                world.add_component(id, Position { x: round as f32, y: 0.0 }).unwrap();
            }
            if mask & 2 != 0 {
                world.add_component(id, Velocity { dx: 0.0, dy: 1.0 }).unwrap();
            }
            if mask & 4 != 0 {
                world.add_component(id, Turret { heading: 0.0 }).unwrap();
            }
        }
    }

    let queried: HashSet<EntityId> = world
        .get_entities_with_components::<(Position, Velocity)>()
        .into_iter()
        .collect();

    let mut expected = HashSet::new();
    world.for_each_with::<(Position,), _>(|entity, _| {
        if entity.has_component::<Velocity>() {
            expected.insert(entity.get_id());
        }
    });

    assert_eq!(queried.len(), 10);
    assert_eq!(queried, expected);
    for id in &queried {
        assert!(world.has_component::<Position>(*id));
        assert!(world.has_component::<Velocity>(*id));
    }

    let armed_movers = world.get_entities_with_components::<(Position, Velocity, Turret)>();
    assert_eq!(armed_movers.len(), 5);
}

#[test]
fn test_mutable_query_moves_entities() {
    let mut world = World::with_seed(3);
    let mover = world.create_entity();
    world.add_component(mover, Position { x: 0.0, y: 0.0 }).unwrap();
    world.add_component(mover, Velocity { dx: 2.0, dy: -1.0 }).unwrap();
    let parked = world.create_entity();
    world.add_component(parked, Position { x: 5.0, y: 5.0 }).unwrap();

    for _ in 0..3 {
        world.for_each_with_mut::<(Position, Velocity), _>(|_, (position, velocity)| {
            position.x += velocity.dx;
            position.y += velocity.dy;
        });
    }

    assert_eq!(
        world.get_component::<Position>(mover),
        Ok(&Position { x: 6.0, y: -3.0 })
    );
    assert_eq!(
        world.get_component::<Position>(parked),
        Ok(&Position { x: 5.0, y: 5.0 })
    );
}

#[test]
fn test_first_match_scan() {
    let mut world = World::with_seed(3);
    for heading in [10.0, 20.0, 30.0] {
        let id = world.create_entity();
        world.add_component(id, Turret { heading }).unwrap();
    }

    let mut visited = 0;
    let mut found = None;
    let completed = world.for_each_while::<(Turret,), _>(|entity, (turret,)| {
        visited += 1;
        if turret.heading > 5.0 {
            found = Some(entity.get_id());
            return false;
        }
        true
    });
    assert!(!completed);
    assert_eq!(visited, 1);
    assert!(found.is_some());
}

#[test]
fn test_scheduled_removal_waits_for_tick() {
    let mut world = World::with_seed(9);
    let e = world.create_entity();
    world.add_component(e, Turret { heading: 0.0 }).unwrap();

    world.schedule_remove_entity(e).unwrap();
    assert!(world.entity_present(e));
    assert!(!world.get_entity(e).unwrap().is_valid());

    world.tick().unwrap();
    assert!(!world.entity_present(e));
    assert_eq!(world.get_entity(e).err(), Some(EcsError::EntityNotFound(e)));
    assert!(world.get_entities_with_components::<(Turret,)>().is_empty());
}

#[test]
fn test_immediate_removal_of_scheduled_entity() {
    let mut world = World::with_seed(9);
    let e = world.create_entity();
    world.schedule_remove_entity(e).unwrap();
    world.remove_entity(e).unwrap();

    let report = world.tick().unwrap();
    assert_eq!(report.removed_entities, 0);
}

#[test]
fn test_checked_access_errors() {
    let mut world = World::with_seed(4);
    let id = world.create_entity();
    world.add_component(id, Position { x: 0.0, y: 0.0 }).unwrap();

    match world.get_component::<Turret>(id) {
        Err(EcsError::ComponentNotFound { entity, component }) => {
            assert_eq!(entity, id);
            assert!(component.ends_with("Turret"));
        }
        other => panic!("expected ComponentNotFound, got {other:?}"),
    }

    let err = world.get_entity(id).unwrap().get_component::<Velocity>().unwrap_err();
    assert!(err.to_string().contains("Velocity"));
}

#[test]
fn test_reset_clears_entities() {
    let mut world = World::with_seed(12);
    for _ in 0..10 {
        let id = world.create_entity();
        world.add_component(id, Position { x: 0.0, y: 0.0 }).unwrap();
    }
    let doomed = world.create_entity();
    world.schedule_remove_entity(doomed).unwrap();

    world.reset();
    assert_eq!(world.entity_count(), 0);
    assert!(world.get_entities_with_components::<(Position,)>().is_empty());

    let report = world.tick().unwrap();
    assert_eq!(report.removed_entities, 0);

    // The world is usable after a reset.
    let fresh = world.create_entity();
    assert!(world.entity_present(fresh));
}
