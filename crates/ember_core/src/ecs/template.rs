//! # Entity Templates
//!
//! A template is a named callback that populates a freshly created entity.
//! [`EntityRegistry::create_from_template`] only issues the handle and queues
//! the request; the callback runs later inside [`EntityRegistry::sync`], where
//! it has exclusive access to the registry and may insert components, create
//! more entities, or queue nested templates.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::component::Component;
use super::entity::Entity;
use super::registry::EntityRegistry;

/// Identifier of a registered template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemplateId(pub(crate) u32);

impl TemplateId {
    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template#{}", self.0)
    }
}

/// Expansion callback stored by the registry.
pub(crate) type TemplateFn = Arc<dyn Fn(&mut TemplateContext<'_>, Entity) + Send + Sync>;

/// Queued request to expand a template onto an already issued handle.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CreateRequest {
    pub(crate) entity: Entity,
    pub(crate) template: TemplateId,
}

/// Registered templates, addressable by id or name.
#[derive(Default)]
pub(crate) struct TemplateTable {
    callbacks: Vec<TemplateFn>,
    by_name: HashMap<String, TemplateId>,
}

impl TemplateTable {
    /// Registers `callback` under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken.
    pub(crate) fn register(&mut self, name: String, callback: TemplateFn) -> TemplateId {
        assert!(
            !self.by_name.contains_key(&name),
            "template `{name}` is already registered"
        );
        let Ok(raw) = u32::try_from(self.callbacks.len()) else {
            panic!("template table is full");
        };
        let id = TemplateId(raw);

        tracing::trace!(template = %name, id = id.0, "registered entity template");
        self.callbacks.push(callback);
        self.by_name.insert(name, id);
        id
    }

    pub(crate) fn get(&self, id: TemplateId) -> Option<&TemplateFn> {
        self.callbacks.get(id.0 as usize)
    }

    pub(crate) fn contains(&self, id: TemplateId) -> bool {
        (id.0 as usize) < self.callbacks.len()
    }

    pub(crate) fn id(&self, name: &str) -> Option<TemplateId> {
        self.by_name.get(name).copied()
    }
}

/// Exclusive view of the registry handed to a template callback.
pub struct TemplateContext<'a> {
    registry: &'a mut EntityRegistry,
    entity: Entity,
    userdata: Option<&'a mut (dyn Any + Send + Sync)>,
}

impl<'a> TemplateContext<'a> {
    pub(crate) fn new(
        registry: &'a mut EntityRegistry,
        entity: Entity,
        userdata: Option<&'a mut (dyn Any + Send + Sync)>,
    ) -> Self {
        Self {
            registry,
            entity,
            userdata,
        }
    }

    /// Entity being expanded.
    #[inline]
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Adds a component to the entity being expanded.
    pub fn insert<T: Component>(&mut self, value: T) -> Option<T> {
        self.registry.insert(self.entity, value)
    }

    /// Creates a bare child entity immediately.
    pub fn create(&mut self) -> Entity {
        self.registry.create()
    }

    /// Creates an entity from another template. It is expanded later in the
    /// same sync.
    pub fn spawn(&mut self, template: TemplateId) -> Option<Entity> {
        self.registry.create_from_template(template)
    }

    /// The registry itself.
    pub fn registry(&mut self) -> &mut EntityRegistry {
        self.registry
    }

    /// Engine-supplied userdata, if set and of type `U`.
    pub fn userdata<U: Any>(&mut self) -> Option<&mut U> {
        self.userdata.as_deref_mut()?.downcast_mut::<U>()
    }
}
