//! # IRONCLAD Core
//!
//! Entity-component registry for a tank-battle simulation:
//! - Entities are random non-zero ids with type-erased components
//! - A reverse index answers "who has all of these components" by probing
//!   the rarest component first
//! - Systems run once per step; removals are staged until the next step
//! - Events are dispatched synchronously to subscribers in registration order
//! - Components read from another thread carry a writer-priority lock
//!
//! ## Example
//!
//! ```rust,ignore
//! use ironclad_core::{Component, World};
//!
//! struct Hull(u32);
//! impl Component for Hull {}
//!
//! let mut world = World::new();
//! let tank = world.create_entity();
//! world.add_component(tank, Hull(100))?;
//! world.tick()?;
//! ```

pub mod config;
pub mod ecs;
pub mod error;
pub mod event;
pub mod sync;

pub use config::{ConfigError, WorldConfig};
pub use ecs::{
    Component, Entity, EntityId, EntityMut, Polymorph, Query, System, SystemHandle, SystemId,
    TickReport, TypeKey, World,
};
pub use error::{EcsError, EcsResult};
pub use event::{EventBus, EventCallback};
pub use sync::{
    LockMode, Lockable, RawLock, RawRwLock, RawSpinRwLock, RwLock, ScopedLock, SpinRwLock,
};
