//! # Entity Registry
//!
//! Owns the handle allocator, one type-erased pool per registered component
//! type, and the deferred create/destroy queues.
//!
//! ## Phases
//!
//! ```text
//!   update phase (&self, any thread)          sync point (&mut self, one thread)
//!   ┌──────────────────────────────┐          ┌──────────────────────────────┐
//!   │ create / destroy / get       │  ──────► │ expand queued templates      │
//!   │ query (pool RwLocks)         │          │ purge destroyed rows         │
//!   │ create_from_template         │          │ retire handles               │
//!   └──────────────────────────────┘          └──────────────────────────────┘
//! ```
//!
//! Everything that changes which handles are valid, or moves rows around
//! structurally, takes `&mut self`. The borrow checker therefore enforces the
//! phase discipline: no query or facet can be alive while `sync` runs.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use super::allocator::{AllocatorStats, HandleAllocator};
use super::component::{Component, ComponentTypeId};
use super::entity::Entity;
use super::facet::EntityRef;
use super::query::{Query, QueryView};
use super::storage::{self, ComponentStorage, ErasedPool, TypedPool};
use super::template::{CreateRequest, TemplateContext, TemplateFn, TemplateId, TemplateTable};
use crate::config::RegistryConfig;
use crate::error::CoreResult;
use crate::sync::Mailbox;

/// What a call to [`EntityRegistry::sync`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Template requests expanded (including nested ones).
    pub expanded: usize,
    /// Entities retired.
    pub destroyed: usize,
    /// Destroy requests ignored because the handle was already invalid.
    pub skipped: usize,
    /// Component rows dropped from pools.
    pub rows_erased: usize,
}

/// Central container for entities and their components.
///
/// # Example
///
/// ```rust
/// use ember_core::{define_component, EntityRegistry};
///
/// #[derive(Debug, PartialEq)]
/// struct Health(u32);
/// define_component!(Health, "Health", sorted);
///
/// let mut registry = EntityRegistry::with_capacity(1024);
/// let entity = registry.create();
/// registry.insert(entity, Health(100));
///
/// registry.destroy(entity);
/// assert!(registry.is_valid(entity));
///
/// registry.sync();
/// assert!(!registry.is_valid(entity));
/// ```
pub struct EntityRegistry {
    config: RegistryConfig,
    allocator: HandleAllocator,
    /// Indexed by `ComponentTypeId`.
    pools: Vec<RwLock<Box<dyn ErasedPool>>>,
    type_ids: HashMap<TypeId, ComponentTypeId>,
    type_ids_by_name: HashMap<&'static str, ComponentTypeId>,
    templates: TemplateTable,
    pending_create: Mailbox<CreateRequest>,
    pending_destroy: Mailbox<Entity>,
    userdata: Option<Box<dyn Any + Send + Sync>>,
}

impl EntityRegistry {
    /// Creates a registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates a registry able to hold `capacity` entity indices.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or `u32::MAX`.
    #[must_use]
    pub fn with_capacity(capacity: u32) -> Self {
        Self::with_config(RegistryConfig::with_capacity(capacity))
    }

    /// Creates a registry from a config.
    ///
    /// # Panics
    ///
    /// Panics if the config does not validate; use
    /// [`EntityRegistry::try_with_config`] for untrusted input.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            allocator: HandleAllocator::from_config(&config),
            config,
            pools: Vec::new(),
            type_ids: HashMap::new(),
            type_ids_by_name: HashMap::new(),
            templates: TemplateTable::default(),
            pending_create: Mailbox::new(),
            pending_destroy: Mailbox::new(),
            userdata: None,
        }
    }

    /// Creates a registry from a config, validating it first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidConfig`] for out-of-range values.
    pub fn try_with_config(config: RegistryConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Allocator counters.
    #[must_use]
    pub fn allocator_stats(&self) -> AllocatorStats {
        self.allocator.stats()
    }

    /// The handle allocator, for inspection.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &HandleAllocator {
        &self.allocator
    }

    // =========================================================================
    // Entity lifecycle (thread-safe)
    // =========================================================================

    /// Issues a new entity handle.
    #[inline]
    pub fn create(&self) -> Entity {
        self.allocator.allocate()
    }

    /// Issues a handle and queues `template` for expansion at the next sync.
    ///
    /// Returns `None`, allocating nothing, if `template` is unknown.
    pub fn create_from_template(&self, template: TemplateId) -> Option<Entity> {
        if !self.templates.contains(template) {
            return None;
        }
        let entity = self.allocator.allocate();
        self.pending_create.post(CreateRequest { entity, template });
        Some(entity)
    }

    /// Queues `entity` for destruction at the next sync.
    ///
    /// The handle stays valid, and its components visible, until then.
    #[inline]
    pub fn destroy(&self, entity: Entity) {
        self.pending_destroy.post(entity);
    }

    /// Whether `entity` is a live handle.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.allocator.is_valid(entity)
    }

    /// Current handle for a raw index ([`Entity::INVALID`] if never issued).
    #[inline]
    #[must_use]
    pub fn lookup(&self, index: u32) -> Entity {
        self.allocator.lookup(index)
    }

    /// Accessor facet for a live entity.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<EntityRef<'_>> {
        self.is_valid(entity).then(|| EntityRef::new(self, entity))
    }

    /// Iterates every live entity in index order.
    ///
    /// Linear in the number of indices ever issued; meant for tooling and
    /// serialization passes rather than per-frame work.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.allocator.iter()
    }

    /// Number of live entities (linear scan).
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.allocator.live_count()
    }

    /// Destroy requests waiting for the next sync.
    #[must_use]
    pub fn pending_destroy_count(&self) -> usize {
        self.pending_destroy.len()
    }

    /// Template requests waiting for the next sync.
    #[must_use]
    pub fn pending_create_count(&self) -> usize {
        self.pending_create.len()
    }

    // =========================================================================
    // Component types
    // =========================================================================

    /// Registers `T` with a default pool. Idempotent.
    ///
    /// # Panics
    ///
    /// Panics if another type already uses `T::NAME`.
    pub fn register_component_type<T: Component>(&mut self) -> ComponentTypeId {
        match self.component_type_id::<T>() {
            Some(id) => id,
            None => self.bind::<T>(T::Storage::default()),
        }
    }

    /// Registers `T` with a caller-built pool.
    ///
    /// # Panics
    ///
    /// Panics if `T` is already registered or if another type already uses
    /// `T::NAME`.
    pub fn register_component_type_with<T: Component>(&mut self, storage: T::Storage) -> ComponentTypeId {
        assert!(
            self.component_type_id::<T>().is_none(),
            "component `{}` is already registered",
            T::NAME
        );
        self.bind::<T>(storage)
    }

    fn bind<T: Component>(&mut self, storage: T::Storage) -> ComponentTypeId {
        if let Some(existing) = self.type_ids_by_name.get(T::NAME) {
            panic!(
                "component name `{}` is already bound to type id {existing}",
                T::NAME
            );
        }
        let Ok(raw) = u16::try_from(self.pools.len()) else {
            panic!("too many component types registered");
        };
        let id = ComponentTypeId(raw);

        self.pools.push(RwLock::new(TypedPool::<T>::boxed(storage)));
        self.type_ids.insert(TypeId::of::<T>(), id);
        self.type_ids_by_name.insert(T::NAME, id);
        tracing::trace!(
            component = T::NAME,
            id = raw,
            sorted = <T::Storage as ComponentStorage>::SORTED,
            "registered component type"
        );
        id
    }

    /// Id of `T`, if registered.
    #[inline]
    #[must_use]
    pub fn component_type_id<T: Component>(&self) -> Option<ComponentTypeId> {
        self.type_ids.get(&TypeId::of::<T>()).copied()
    }

    /// Id registered under `name`.
    #[must_use]
    pub fn component_type_id_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.type_ids_by_name.get(name).copied()
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn component_type_count(&self) -> usize {
        self.pools.len()
    }

    // =========================================================================
    // Pool access
    // =========================================================================

    /// Shared access to `T`'s pool.
    ///
    /// Blocks while a mutable query or write guard holds the pool. Read guards
    /// are recursive, so nesting reads on one thread never deadlocks.
    #[must_use]
    pub fn pool<T: Component>(&self) -> Option<MappedRwLockReadGuard<'_, T::Storage>> {
        let id = self.component_type_id::<T>()?;
        let guard = self.pools[id.slot()].read_recursive();
        Some(RwLockReadGuard::map(guard, |pool| storage::downcast::<T>(&**pool)))
    }

    /// Exclusive access to `T`'s pool.
    ///
    /// Structural changes made here must not race with queries over `T` on
    /// other threads; the lock serializes them but the caller schedules them.
    #[must_use]
    pub fn pool_mut<T: Component>(&self) -> Option<MappedRwLockWriteGuard<'_, T::Storage>> {
        let id = self.component_type_id::<T>()?;
        let guard = self.pools[id.slot()].write();
        Some(RwLockWriteGuard::map(guard, |pool| {
            storage::downcast_mut::<T>(&mut **pool)
        }))
    }

    /// `T`'s pool, registering it first if `T` allows lazy registration.
    ///
    /// Returns `None` for an unregistered type with
    /// `AUTO_REGISTER == false`.
    pub fn pool_for<T: Component>(&mut self) -> Option<&mut T::Storage> {
        let id = match self.component_type_id::<T>() {
            Some(id) => id,
            None if T::AUTO_REGISTER => self.register_component_type::<T>(),
            None => return None,
        };
        Some(storage::downcast_mut::<T>(&mut **self.pools[id.slot()].get_mut()))
    }

    /// Type-erased pool registered under `name`.
    #[must_use]
    pub fn pool_by_name(&self, name: &str) -> Option<MappedRwLockReadGuard<'_, dyn ErasedPool>> {
        let id = self.component_type_id_by_name(name)?;
        let guard = self.pools[id.slot()].read_recursive();
        Some(RwLockReadGuard::map(guard, |pool| &**pool))
    }

    /// Visits every registered pool in type-id order.
    pub fn for_each_pool(&self, mut f: impl FnMut(ComponentTypeId, &dyn ErasedPool)) {
        for (slot, pool) in self.pools.iter().enumerate() {
            let guard = pool.read_recursive();
            // Slot count is bounded by `bind`.
            f(ComponentTypeId(slot as u16), &**guard);
        }
    }

    /// Attaches a component to a live entity, returning the previous value.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid, or if `T` is unregistered and opts
    /// out of lazy registration.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Option<T> {
        assert!(
            self.is_valid(entity),
            "inserting `{}` on {entity:?}, which is not a live handle",
            T::NAME
        );
        let Some(pool) = self.pool_for::<T>() else {
            panic!("component `{}` is not registered", T::NAME);
        };
        pool.insert(entity, value)
    }

    /// Detaches a component from an entity.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let id = self.component_type_id::<T>()?;
        storage::downcast_mut::<T>(&mut **self.pools[id.slot()].get_mut()).remove(entity)
    }

    /// Builds a join over the pools named by `Q`.
    ///
    /// See [`crate::ecs::query`] for the strategy selection rules.
    ///
    /// # Panics
    ///
    /// Panics if `Q` requests mutable access to a type it also reads.
    #[must_use]
    pub fn query<Q: Query>(&self) -> QueryView<'_, Q> {
        QueryView::new(self)
    }

    // =========================================================================
    // Templates and userdata
    // =========================================================================

    /// Registers an expansion callback under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered.
    pub fn register_template<F>(&mut self, name: impl Into<String>, callback: F) -> TemplateId
    where
        F: Fn(&mut TemplateContext<'_>, Entity) + Send + Sync + 'static,
    {
        let callback: TemplateFn = std::sync::Arc::new(callback);
        self.templates.register(name.into(), callback)
    }

    /// Id of the template registered under `name`.
    #[must_use]
    pub fn template_id(&self, name: &str) -> Option<TemplateId> {
        self.templates.id(name)
    }

    /// Sets the engine value handed to template callbacks.
    pub fn set_userdata<U: Any + Send + Sync>(&mut self, value: U) {
        self.userdata = Some(Box::new(value));
    }

    /// Removes and returns the userdata.
    pub fn take_userdata(&mut self) -> Option<Box<dyn Any + Send + Sync>> {
        self.userdata.take()
    }

    /// Userdata, if set and of type `U`.
    #[must_use]
    pub fn userdata<U: Any>(&self) -> Option<&U> {
        self.userdata.as_deref()?.downcast_ref::<U>()
    }

    // =========================================================================
    // Sync point (single writer)
    // =========================================================================

    /// Applies every queued creation and destruction.
    ///
    /// Template requests are expanded first, including requests queued by
    /// templates during expansion. Destroyed entities then lose their rows in
    /// every pool before their handles are retired, so no pool ever holds a
    /// row under a reusable index. Destroy requests for handles that are no
    /// longer valid (duplicates, stale copies) are skipped.
    ///
    /// # Panics
    ///
    /// Panics if more than `template_expansion_limit` template requests are
    /// expanded in one call.
    pub fn sync(&mut self) -> SyncStats {
        let span = tracing::debug_span!("registry_sync");
        let _enter = span.enter();

        let mut stats = SyncStats {
            expanded: self.expand_pending(),
            ..SyncStats::default()
        };

        while let Some(entity) = self.pending_destroy.take() {
            if !self.allocator.is_valid(entity) {
                tracing::debug!(%entity, "skipping destroy of invalid handle");
                stats.skipped += 1;
                continue;
            }

            for pool in &mut self.pools {
                if pool.get_mut().erase(entity) {
                    stats.rows_erased += 1;
                }
            }
            self.allocator.retire(entity);
            stats.destroyed += 1;
        }

        tracing::debug!(
            expanded = stats.expanded,
            destroyed = stats.destroyed,
            skipped = stats.skipped,
            rows_erased = stats.rows_erased,
            "registry synced"
        );
        stats
    }

    fn expand_pending(&mut self) -> usize {
        let limit = self.config.template_expansion_limit;
        let mut userdata = self.userdata.take();
        let mut expanded = 0;

        while let Some(request) = self.pending_create.take() {
            assert!(
                expanded < limit,
                "more than {limit} template expansions in one sync; a template is likely spawning itself"
            );
            let Some(callback) = self.templates.get(request.template).cloned() else {
                continue;
            };

            let mut context = TemplateContext::new(self, request.entity, userdata.as_deref_mut());
            callback(&mut context, request.entity);
            expanded += 1;
        }

        self.userdata = userdata;
        expanded
    }

    /// Drops every row, every handle and every queued request.
    ///
    /// Registered component types and templates are kept.
    pub fn reset(&mut self) {
        for pool in &mut self.pools {
            pool.get_mut().clear();
        }
        self.pending_create.clear();
        self.pending_destroy.clear();
        self.allocator.reset();
        tracing::debug!(component_types = self.pools.len(), "registry reset");
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
