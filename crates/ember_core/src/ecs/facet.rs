//! Per-entity accessor returned by [`EntityRegistry::get`].

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};

use super::component::Component;
use super::entity::Entity;
use super::registry::EntityRegistry;
use super::storage::ComponentStorage;

/// A live entity bound to its registry.
///
/// Every accessor forwards to the component's pool and takes that pool's
/// lock for as long as the returned guard lives. Holding a guard from
/// [`EntityRef::get`] while calling [`EntityRef::add`] or
/// [`EntityRef::get_mut`] for the same type on one thread deadlocks.
#[derive(Clone, Copy)]
pub struct EntityRef<'r> {
    registry: &'r EntityRegistry,
    entity: Entity,
}

impl<'r> EntityRef<'r> {
    pub(crate) fn new(registry: &'r EntityRegistry, entity: Entity) -> Self {
        Self { registry, entity }
    }

    /// The entity handle.
    #[inline]
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Shared access to the entity's `T`.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<MappedRwLockReadGuard<'r, T>> {
        let entity = self.entity;
        let pool = self.registry.pool::<T>()?;
        MappedRwLockReadGuard::try_map(pool, |pool| pool.get(entity)).ok()
    }

    /// Exclusive access to the entity's `T`.
    #[must_use]
    pub fn get_mut<T: Component>(&self) -> Option<MappedRwLockWriteGuard<'r, T>> {
        let entity = self.entity;
        let pool = self.registry.pool_mut::<T>()?;
        MappedRwLockWriteGuard::try_map(pool, |pool| pool.get_mut(entity)).ok()
    }

    /// Whether the entity has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self) -> bool {
        self.registry
            .pool::<T>()
            .is_some_and(|pool| pool.contains(self.entity))
    }

    /// Attaches a `T`, returning the previous value.
    ///
    /// # Panics
    ///
    /// Panics if `T` has not been registered.
    pub fn add<T: Component>(&self, value: T) -> Option<T> {
        let Some(mut pool) = self.registry.pool_mut::<T>() else {
            panic!(
                "component `{}` is not registered; register it before adding through an entity facet",
                T::NAME
            );
        };
        pool.insert(self.entity, value)
    }

    /// Detaches the entity's `T`.
    pub fn remove<T: Component>(&self) -> Option<T> {
        self.registry.pool_mut::<T>()?.remove(self.entity)
    }
}

impl std::fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EntityRef").field(&self.entity).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{define_component, EntityRegistry};

    #[derive(Debug, PartialEq)]
    struct Speed(f32);
    define_component!(Speed, "Speed", sorted);

    #[derive(Debug, PartialEq)]
    struct Frozen;
    define_component!(Frozen, "Frozen", unsorted);

    #[test]
    fn test_facet_forwards_to_pools() {
        let mut registry = EntityRegistry::with_capacity(8);
        registry.register_component_type::<Speed>();
        registry.register_component_type::<Frozen>();
        let entity = registry.create();

        let facet = registry.get(entity).unwrap_or_else(|| panic!("fresh entity must resolve"));
        assert_eq!(facet.entity(), entity);
        assert!(!facet.has::<Speed>());
        assert_eq!(facet.add(Speed(2.0)), None);
        assert!(facet.has::<Speed>());

        if let Some(mut speed) = facet.get_mut::<Speed>() {
            speed.0 *= 2.0;
        }
        assert_eq!(facet.get::<Speed>().map(|s| s.0), Some(4.0));

        facet.add(Frozen);
        assert_eq!(facet.remove::<Frozen>(), Some(Frozen));
        assert!(facet.get::<Frozen>().is_none());
    }

    #[test]
    fn test_facet_on_unregistered_type_is_absent() {
        let registry = EntityRegistry::with_capacity(8);
        let entity = registry.create();
        let facet = registry.get(entity).unwrap_or_else(|| panic!("fresh entity must resolve"));
        assert!(!facet.has::<Speed>());
        assert!(facet.get::<Speed>().is_none());
        assert!(facet.remove::<Speed>().is_none());
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_facet_add_unregistered_panics() {
        let registry = EntityRegistry::with_capacity(8);
        let entity = registry.create();
        if let Some(facet) = registry.get(entity) {
            facet.add(Speed(1.0));
        }
    }
}
