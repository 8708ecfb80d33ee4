//! # Adaptive Multi-Component Queries
//!
//! A query names a tuple of component accesses, e.g.
//! `registry.query::<(&Position, &mut Velocity)>()`, and yields every entity
//! present in all of the requested pools.
//!
//! ## Strategy
//!
//! Chosen once per view from the pool sizes:
//!
//! ```text
//!   smallest unsorted ≤ smallest sorted / 10     otherwise
//!   (or no sorted pools at all)
//!
//!   Probe { driver }                             Merge { drivers }
//!   ┌────────┐   probe   ┌────────┐              ┌────────┐ ┌────────┐
//!   │ rare B │ ────────► │ big  A │              │ A  1 3 │ │ C  3 4 │  lockstep
//!   └────────┘           └────────┘              └────────┘ └────────┘  cursors
//!   one pass over B, one lookup per row          sorted pools within 10x of
//!                                                the smallest are intersected;
//!                                                the rest are probed
//! ```
//!
//! The strategy only changes cost, never the result set.
//!
//! ## Locking
//!
//! A view takes a read lock per `&T` and a write lock per `&mut T`, in tuple
//! order, and keeps them until dropped. Requesting `&mut T` alongside any
//! other access to `T` panics before any lock is taken. Two threads running
//! mutable queries over the same types in different orders can deadlock;
//! scheduling them apart is up to the caller.

// SAFETY: mutable queries hand out `&mut` rows from a shared column view;
// see `QueryIter::next` for the argument.
#![allow(unsafe_code)]

mod fetch;
mod plan;
mod view;

pub use fetch::{Access, Fetch};
pub use plan::{JoinStrategy, Shape, DRIVER_RATIO};
pub use view::{JoinStats, QueryIter, QueryView};

use super::entity::Entity;
use super::registry::EntityRegistry;

/// A tuple of [`Fetch`] elements, arity 1 to 8.
pub trait Query {
    /// Number of elements.
    const WIDTH: usize;

    /// Pool guards held by a view.
    type Borrow<'r>;
    /// Column views built for one iteration.
    type Columns<'v>;
    /// What iteration yields besides the entity.
    type Item<'v>;

    /// Accesses performed, in tuple order.
    fn accesses() -> Vec<Access>;

    /// Locks every pool, or `None` if any type is not registered.
    fn borrow(registry: &EntityRegistry) -> Option<Self::Borrow<'_>>;

    /// Shapes of the locked pools, in tuple order.
    fn shapes(borrow: &Self::Borrow<'_>) -> Vec<Shape>;

    /// Column views over the locked pools.
    fn columns<'v, 'r>(borrow: &'v mut Self::Borrow<'r>) -> Self::Columns<'v>;

    /// Handles of the column at `slot`, in row order.
    fn entities<'v>(columns: &Self::Columns<'v>, slot: usize) -> &'v [Entity];

    /// Every element for `entity`, or `None` if any pool lacks it.
    ///
    /// # Safety
    ///
    /// The caller must not fetch the same entity twice from one set of
    /// columns while an earlier result is alive.
    unsafe fn fetch<'v>(
        columns: &Self::Columns<'v>,
        entity: Entity,
        hints: &[Option<usize>],
    ) -> Option<Self::Item<'v>>;
}

macro_rules! impl_query {
    ($($slot:tt $name:ident),+) => {
        impl<$($name: Fetch),+> Query for ($($name,)+) {
            const WIDTH: usize = [$(stringify!($name)),+].len();

            type Borrow<'r> = ($($name::Borrow<'r>,)+);
            type Columns<'v> = ($($name::Column<'v>,)+);
            type Item<'v> = ($($name::Item<'v>,)+);

            fn accesses() -> Vec<Access> {
                vec![$($name::access()),+]
            }

            fn borrow(registry: &EntityRegistry) -> Option<Self::Borrow<'_>> {
                Some(($($name::borrow(registry)?,)+))
            }

            fn shapes(borrow: &Self::Borrow<'_>) -> Vec<Shape> {
                vec![$($name::shape(&borrow.$slot)),+]
            }

            fn columns<'v, 'r>(borrow: &'v mut Self::Borrow<'r>) -> Self::Columns<'v> {
                ($($name::column(&mut borrow.$slot),)+)
            }

            fn entities<'v>(columns: &Self::Columns<'v>, slot: usize) -> &'v [Entity] {
                match slot {
                    $($slot => $name::entities(&columns.$slot),)+
                    _ => &[],
                }
            }

            unsafe fn fetch<'v>(
                columns: &Self::Columns<'v>,
                entity: Entity,
                hints: &[Option<usize>],
            ) -> Option<Self::Item<'v>> {
                // SAFETY: each column is distinct and the caller upholds the
                // once-per-entity contract for all of them.
                Some(($(unsafe { $name::fetch(&columns.$slot, entity, hints[$slot]) }?,)+))
            }
        }
    };
}

impl_query!(0 A);
impl_query!(0 A, 1 B);
impl_query!(0 A, 1 B, 2 C);
impl_query!(0 A, 1 B, 2 C, 3 D);
impl_query!(0 A, 1 B, 2 C, 3 D, 4 E);
impl_query!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_query!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
impl_query!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);
