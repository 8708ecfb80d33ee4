//! # Component Types
//!
//! Components are plain data attached to entities. The runtime does not know
//! any concrete component type; it only needs each type to declare:
//! - a human-readable name, unique among registered types
//! - the pool flavor storing it (sorted or unsorted)
//! - whether the registry may create that pool lazily on first use

use std::fmt;

use super::storage::ComponentStorage;

/// Small integer identifying a registered component type.
///
/// Ids are assigned densely in registration order and index the registry's
/// pool table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(pub(crate) u16);

impl ComponentTypeId {
    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Trait for component types.
///
/// # Example
///
/// ```rust
/// use ember_core::{Component, SortedPool};
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {
///     const NAME: &'static str = "Position";
///     type Storage = SortedPool<Self>;
/// }
/// ```
pub trait Component: Send + Sync + Sized + 'static {
    /// Human-readable name, unique across registered types.
    const NAME: &'static str;

    /// Whether [`crate::EntityRegistry::pool_for`] may create a default pool
    /// for this type on first use. Types whose pools need construction
    /// arguments set this to `false` and are registered explicitly with
    /// [`crate::EntityRegistry::register_component_type_with`].
    const AUTO_REGISTER: bool = true;

    /// Pool flavor storing this component.
    type Storage: ComponentStorage<Item = Self>;
}

/// Implements [`Component`] for a type.
///
/// # Example
///
/// ```rust
/// use ember_core::define_component;
///
/// #[derive(Clone, Copy, Debug, Default)]
/// struct Velocity { x: f32, y: f32 }
///
/// #[derive(Clone, Debug)]
/// struct PlayerTag;
///
/// define_component!(Velocity, "Velocity", sorted);
/// define_component!(PlayerTag, "PlayerTag", unsorted);
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $name:expr, sorted) => {
        impl $crate::Component for $ty {
            const NAME: &'static str = $name;
            type Storage = $crate::SortedPool<$ty>;
        }
    };
    ($ty:ty, $name:expr, unsorted) => {
        impl $crate::Component for $ty {
            const NAME: &'static str = $name;
            type Storage = $crate::UnsortedPool<$ty>;
        }
    };
}
