//! # Component Pools
//!
//! Every registered component type owns exactly one pool. Two flavors exist:
//!
//! ```text
//!   SortedPool<T>                       UnsortedPool<T>
//!   ┌──────────┬──────────┐             ┌──────────┬──────────┐
//!   │ handles  │ rows     │             │ handles  │ rows     │
//!   │ 1:v0     │ T        │             │ 9:v2     │ T        │
//!   │ 4:v1     │ T        │             │ 3:v0     │ T        │
//!   │ 7:v0     │ T        │             └──────────┴──────────┘
//!   └──────────┴──────────┘              index → row map
//!   ascending index, cursor-able        O(1) insert/erase/lookup
//! ```
//!
//! Both flavors implement [`ComponentStorage`]. The registry keeps pools
//! behind the object-safe [`ErasedPool`] so it can purge destroyed entities
//! from every pool without knowing their component types.

mod column;
mod sorted;
mod unsorted;

use std::any::Any;

pub use column::{Column, ColumnMut, RowLookup, Rows};
pub use sorted::SortedPool;
pub use unsorted::UnsortedPool;

use super::component::Component;
use super::entity::Entity;

/// Capability contract shared by both pool flavors.
///
/// Lookups compare the full handle: a row stored under a different
/// generation of the same index is reported absent.
pub trait ComponentStorage: Default + Send + Sync + 'static {
    /// Component type stored in this pool.
    type Item: Component;

    /// Whether rows are kept in ascending entity-index order.
    const SORTED: bool;

    /// Inserts or replaces the row for `entity`, returning the previous value.
    ///
    /// # Panics
    ///
    /// Panics if a row for a different generation of the same index is
    /// still present.
    fn insert(&mut self, entity: Entity, value: Self::Item) -> Option<Self::Item>;

    /// Removes the row for `entity`.
    fn remove(&mut self, entity: Entity) -> Option<Self::Item>;

    /// Row for `entity`.
    fn get(&self, entity: Entity) -> Option<&Self::Item>;

    /// Mutable row for `entity`.
    fn get_mut(&mut self, entity: Entity) -> Option<&mut Self::Item>;

    /// Whether `entity` has a row.
    fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    /// Row for a raw entity index, regardless of generation.
    fn probe(&self, index: u32) -> Option<(Entity, &Self::Item)>;

    /// Number of rows.
    fn len(&self) -> usize;

    /// Whether the pool has no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every row.
    fn clear(&mut self);

    /// Handles in row order.
    fn entities(&self) -> &[Entity];

    /// Shared column view for queries.
    fn column(&self) -> Column<'_, Self::Item>;

    /// Exclusive column view for queries.
    fn column_mut(&mut self) -> ColumnMut<'_, Self::Item>;

    /// Iterates `(handle, row)` pairs in row order.
    fn iter(&self) -> Rows<'_, Self::Item> {
        self.column().iter()
    }
}

/// Type-erased view of a pool.
///
/// [`ErasedPool::as_any`] exposes the concrete `T::Storage`, so callers that
/// know the component type can downcast:
///
/// ```rust
/// use ember_core::{define_component, ComponentStorage, EntityRegistry};
///
/// struct Mass(f32);
/// define_component!(Mass, "Mass", sorted);
///
/// let mut registry = EntityRegistry::with_capacity(16);
/// registry.register_component_type::<Mass>();
/// let pool = registry.pool_by_name("Mass").unwrap();
/// let typed = pool.as_any().downcast_ref::<<Mass as ember_core::Component>::Storage>();
/// assert!(typed.unwrap().is_empty());
/// ```
pub trait ErasedPool: Send + Sync {
    /// Registered component name.
    fn name(&self) -> &'static str;

    /// Whether the pool is a sorted pool.
    fn is_sorted(&self) -> bool;

    /// Number of rows.
    fn len(&self) -> usize;

    /// Whether the pool has no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `entity` has a row.
    fn contains(&self, entity: Entity) -> bool;

    /// Drops the row for `entity`, if any. Returns whether a row was erased.
    fn erase(&mut self, entity: Entity) -> bool;

    /// Drops every row.
    fn clear(&mut self);

    /// Handles in row order.
    fn entities(&self) -> &[Entity];

    /// The concrete storage as `Any`.
    fn as_any(&self) -> &dyn Any;

    /// The concrete storage as mutable `Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Adapter erasing a component's storage type.
pub(crate) struct TypedPool<T: Component> {
    storage: T::Storage,
}

impl<T: Component> TypedPool<T> {
    pub(crate) fn boxed(storage: T::Storage) -> Box<dyn ErasedPool> {
        Box::new(Self { storage })
    }
}

impl<T: Component> ErasedPool for TypedPool<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn is_sorted(&self) -> bool {
        <T::Storage as ComponentStorage>::SORTED
    }

    fn len(&self) -> usize {
        self.storage.len()
    }

    fn contains(&self, entity: Entity) -> bool {
        self.storage.contains(entity)
    }

    fn erase(&mut self, entity: Entity) -> bool {
        self.storage.remove(entity).is_some()
    }

    fn clear(&mut self) {
        self.storage.clear();
    }

    fn entities(&self) -> &[Entity] {
        self.storage.entities()
    }

    fn as_any(&self) -> &dyn Any {
        &self.storage
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.storage
    }
}

/// Recovers the typed storage of a pool registered for `T`.
///
/// # Panics
///
/// Panics if the pool stores a different component type.
pub(crate) fn downcast<T: Component>(pool: &dyn ErasedPool) -> &T::Storage {
    let name = pool.name();
    pool.as_any()
        .downcast_ref::<T::Storage>()
        .unwrap_or_else(|| mismatch::<T>(name))
}

/// Mutable counterpart of [`downcast`].
///
/// # Panics
///
/// Panics if the pool stores a different component type.
pub(crate) fn downcast_mut<T: Component>(pool: &mut dyn ErasedPool) -> &mut T::Storage {
    let name = pool.name();
    pool.as_any_mut()
        .downcast_mut::<T::Storage>()
        .unwrap_or_else(|| mismatch::<T>(name))
}

#[cold]
fn mismatch<T: Component>(pool: &str) -> ! {
    panic!("pool `{pool}` does not store component `{}`", T::NAME)
}
