//! # Entity Component Runtime
//!
//! Generational handles, per-type component pools, and the registry that
//! ties them together.
//!
//! ## Design Rules
//!
//! - Handles are values; holding one keeps nothing alive
//! - Every component type gets exactly one pool, sorted or unsorted
//! - Create and destroy are thread-safe requests; `sync` applies them
//! - A retired handle never resolves again, even after its index is reused

mod allocator;
mod component;
mod entity;
mod facet;
mod registry;
mod template;

pub mod query;
pub mod storage;

pub use allocator::{AllocatorStats, HandleAllocator};
pub use component::{Component, ComponentTypeId};
pub use entity::{Entity, GENERATION_BITS, MAX_GENERATION};
pub use facet::EntityRef;
pub use query::{JoinStats, JoinStrategy, Query, QueryIter, QueryView};
pub use registry::{EntityRegistry, SyncStats};
pub use storage::{ComponentStorage, ErasedPool, SortedPool, UnsortedPool};
pub use template::{TemplateContext, TemplateId};
