//! # EMBER Core
//!
//! Entity-component runtime for a real-time simulation loop:
//! - Lock-free generational handle allocation
//! - Sorted and unsorted component pools behind one registry
//! - Deferred create/destroy applied at a single sync point
//! - Multi-component queries that pick their join strategy from pool sizes
//!
//! ## Frame Discipline
//!
//! 1. **Update phase** - any thread may `create`, `destroy`, `get` and `query`
//! 2. **Sync point** - one thread calls `sync`, which expands templates,
//!    purges destroyed rows and retires handles
//!
//! ## Example
//!
//! ```rust
//! use ember_core::{define_component, EntityRegistry, JoinStrategy};
//!
//! #[derive(Debug)]
//! struct Transform { x: f32 }
//! #[derive(Debug)]
//! struct Player;
//!
//! define_component!(Transform, "Transform", sorted);
//! define_component!(Player, "Player", unsorted);
//!
//! let mut registry = EntityRegistry::with_capacity(4096);
//! for i in 0..1000 {
//!     let entity = registry.create();
//!     registry.insert(entity, Transform { x: i as f32 });
//!     if i == 42 {
//!         registry.insert(entity, Player);
//!     }
//! }
//!
//! let mut players = registry.query::<(&Transform, &Player)>();
//! assert_eq!(players.strategy(), &JoinStrategy::Probe { driver: 1 });
//! assert_eq!(players.iter().count(), 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod sync;

pub use config::RegistryConfig;
pub use ecs::{
    AllocatorStats, Component, ComponentStorage, ComponentTypeId, Entity, EntityRef,
    EntityRegistry, ErasedPool, HandleAllocator, JoinStats, JoinStrategy, Query, QueryIter,
    QueryView, SortedPool, SyncStats, TemplateContext, TemplateId, UnsortedPool,
};
pub use error::{CoreError, CoreResult};
pub use sync::Mailbox;
