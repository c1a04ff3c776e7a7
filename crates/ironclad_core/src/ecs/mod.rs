//! # Entity-Component-System
//!
//! Entities are random non-zero ids carrying any number of type-erased
//! components. The [`World`] owns them, keeps a reverse index from component
//! type to holders, and runs [`System`]s once per step.
//!
//! ```text
//! World
//! ├── entities ──▶ Entity ──▶ { TypeKey ──▶ Polymorph }
//! ├── by_component ──▶ { TypeKey ──▶ {EntityId} }
//! ├── systems ──▶ [System, ...]      (registration order)
//! └── events ──▶ EventBus
//! ```

mod component;
mod entity;
mod id;
mod polymorph;
mod query;
mod system;
mod world;

pub use component::Component;
pub use entity::{Entity, EntityMut};
pub use id::{EntityId, IdGenerator};
pub use polymorph::{Polymorph, TypeKey};
pub use query::Query;
pub use system::{SharedSystem, System, SystemHandle, SystemId, TickReport};
pub use world::World;
