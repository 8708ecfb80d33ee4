//! Dense pool with hashed point lookup and no ordering.

use std::collections::HashMap;

use super::column::{Column, ColumnMut, RowLookup, Rows};
use super::ComponentStorage;
use crate::ecs::component::Component;
use crate::ecs::entity::Entity;

/// Unsorted component pool.
///
/// Suited to rare components (tags, singletons): insert, erase and point
/// lookup are all O(1). Rows are dense but unordered, so the pool can drive a
/// query only by being iterated and probing everything else.
pub struct UnsortedPool<T> {
    entities: Vec<Entity>,
    rows: Vec<T>,
    /// Entity index → row position.
    lookup: HashMap<u32, usize>,
}

impl<T> UnsortedPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            rows: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn row_of(&self, entity: Entity) -> Option<usize> {
        self.lookup
            .get(&entity.index())
            .copied()
            .filter(|&row| self.entities[row] == entity)
    }

    /// Iterates `(handle, row)` pairs in storage order.
    #[must_use]
    pub fn iter(&self) -> Rows<'_, T> {
        self.entities.iter().copied().zip(self.rows.iter())
    }
}

impl<T> Default for UnsortedPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentStorage for UnsortedPool<T> {
    type Item = T;
    const SORTED: bool = false;

    fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        if let Some(&row) = self.lookup.get(&entity.index()) {
            assert_eq!(
                self.entities[row],
                entity,
                "pool `{}` still holds a row for index {}; rows must be erased before the index is reused",
                T::NAME,
                entity.index()
            );
            return Some(std::mem::replace(&mut self.rows[row], value));
        }

        self.lookup.insert(entity.index(), self.rows.len());
        self.entities.push(entity);
        self.rows.push(value);
        None
    }

    fn remove(&mut self, entity: Entity) -> Option<T> {
        let row = self.row_of(entity)?;
        self.lookup.remove(&entity.index());
        self.entities.swap_remove(row);
        let value = self.rows.swap_remove(row);
        if let Some(moved) = self.entities.get(row) {
            self.lookup.insert(moved.index(), row);
        }
        Some(value)
    }

    fn get(&self, entity: Entity) -> Option<&T> {
        self.row_of(entity).map(|row| &self.rows[row])
    }

    fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.row_of(entity).map(|row| &mut self.rows[row])
    }

    fn probe(&self, index: u32) -> Option<(Entity, &T)> {
        let row = *self.lookup.get(&index)?;
        Some((self.entities[row], &self.rows[row]))
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn clear(&mut self) {
        self.entities.clear();
        self.rows.clear();
        self.lookup.clear();
    }

    fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn column(&self) -> Column<'_, T> {
        Column::new(&self.entities, &self.rows, RowLookup::Hashed(&self.lookup))
    }

    fn column_mut(&mut self) -> ColumnMut<'_, T> {
        ColumnMut::new(&self.entities, &mut self.rows, RowLookup::Hashed(&self.lookup))
    }
}
