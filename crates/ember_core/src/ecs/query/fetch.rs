//! Per-component access declarations used to build query tuples.

use std::any::TypeId;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};

use super::plan::Shape;
use crate::ecs::component::Component;
use crate::ecs::entity::Entity;
use crate::ecs::registry::EntityRegistry;
use crate::ecs::storage::{Column, ColumnMut, ComponentStorage};

/// One component access requested by a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    /// Component type.
    pub type_id: TypeId,
    /// Component name, for diagnostics.
    pub name: &'static str,
    /// Whether rows are handed out as `&mut`.
    pub mutable: bool,
}

impl Access {
    fn of<T: Component>(mutable: bool) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::NAME,
            mutable,
        }
    }
}

/// A single element of a query tuple: `&T` or `&mut T`.
pub trait Fetch {
    /// Pool guard held for the lifetime of the view.
    type Borrow<'r>;
    /// Column view built from the guard for one iteration.
    type Column<'v>;
    /// What iteration yields for this element.
    type Item<'v>;

    /// The access this element performs.
    fn access() -> Access;

    /// Locks the pool, or `None` if the type is not registered.
    fn borrow(registry: &EntityRegistry) -> Option<Self::Borrow<'_>>;

    /// Size and ordering of the locked pool.
    fn shape(borrow: &Self::Borrow<'_>) -> Shape;

    /// Column over the locked pool.
    fn column<'v, 'r>(borrow: &'v mut Self::Borrow<'r>) -> Self::Column<'v>;

    /// Handles in the column's row order.
    fn entities<'v>(column: &Self::Column<'v>) -> &'v [Entity];

    /// Row for `entity`, trusting `hint` as its position when given.
    ///
    /// # Safety
    ///
    /// For mutable access, the caller must not fetch the same entity twice
    /// from one column while an earlier result is alive.
    unsafe fn fetch<'v>(
        column: &Self::Column<'v>,
        entity: Entity,
        hint: Option<usize>,
    ) -> Option<Self::Item<'v>>;
}

impl<T: Component> Fetch for &T {
    type Borrow<'r> = MappedRwLockReadGuard<'r, T::Storage>;
    type Column<'v> = Column<'v, T>;
    type Item<'v> = &'v T;

    fn access() -> Access {
        Access::of::<T>(false)
    }

    fn borrow(registry: &EntityRegistry) -> Option<Self::Borrow<'_>> {
        registry.pool::<T>()
    }

    fn shape(borrow: &Self::Borrow<'_>) -> Shape {
        Shape {
            len: ComponentStorage::len(&**borrow),
            sorted: <T::Storage as ComponentStorage>::SORTED,
        }
    }

    fn column<'v, 'r>(borrow: &'v mut Self::Borrow<'r>) -> Self::Column<'v> {
        ComponentStorage::column(&**borrow)
    }

    fn entities<'v>(column: &Self::Column<'v>) -> &'v [Entity] {
        column.entities()
    }

    unsafe fn fetch<'v>(
        column: &Self::Column<'v>,
        entity: Entity,
        hint: Option<usize>,
    ) -> Option<Self::Item<'v>> {
        column.get(entity, hint)
    }
}

impl<T: Component> Fetch for &mut T {
    type Borrow<'r> = MappedRwLockWriteGuard<'r, T::Storage>;
    type Column<'v> = ColumnMut<'v, T>;
    type Item<'v> = &'v mut T;

    fn access() -> Access {
        Access::of::<T>(true)
    }

    fn borrow(registry: &EntityRegistry) -> Option<Self::Borrow<'_>> {
        registry.pool_mut::<T>()
    }

    fn shape(borrow: &Self::Borrow<'_>) -> Shape {
        Shape {
            len: ComponentStorage::len(&**borrow),
            sorted: <T::Storage as ComponentStorage>::SORTED,
        }
    }

    fn column<'v, 'r>(borrow: &'v mut Self::Borrow<'r>) -> Self::Column<'v> {
        ComponentStorage::column_mut(&mut **borrow)
    }

    fn entities<'v>(column: &Self::Column<'v>) -> &'v [Entity] {
        column.entities()
    }

    unsafe fn fetch<'v>(
        column: &Self::Column<'v>,
        entity: Entity,
        hint: Option<usize>,
    ) -> Option<Self::Item<'v>> {
        // SAFETY: forwarded from this function's contract.
        unsafe { column.get(entity, hint) }
    }
}

/// Rejects queries that alias a mutable column.
///
/// # Panics
///
/// Panics if a type is accessed mutably together with any other access to
/// the same type.
pub(crate) fn check_disjoint(accesses: &[Access]) {
    for (position, access) in accesses.iter().enumerate() {
        for other in &accesses[position + 1..] {
            assert!(
                access.type_id != other.type_id || !(access.mutable || other.mutable),
                "query accesses `{}` mutably together with another access to it",
                access.name
            );
        }
    }
}
