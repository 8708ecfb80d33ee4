//! Dense pool kept in ascending entity-index order.

use super::column::{Column, ColumnMut, RowLookup, Rows};
use super::ComponentStorage;
use crate::ecs::component::Component;
use crate::ecs::entity::Entity;

/// Sorted component pool.
///
/// Rows live in two parallel dense arrays (handles and values) ordered by
/// entity index, which makes the pool a merge-join driver: a query can walk
/// it with a cursor and intersect it against other sorted pools in one pass.
///
/// - Insert: O(1) when indices arrive in increasing order (the common case
///   for freshly minted entities), O(n) shift otherwise
/// - Point lookup: O(log n)
/// - Erase: O(n) shift, preserving order
pub struct SortedPool<T> {
    entities: Vec<Entity>,
    rows: Vec<T>,
}

impl<T> SortedPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Creates an empty pool with room for `capacity` rows.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: Vec::with_capacity(capacity),
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Row position of `index`, or the position it would be inserted at.
    fn position(&self, index: u32) -> Result<usize, usize> {
        match self.entities.last() {
            None => Err(0),
            Some(last) if last.index() < index => Err(self.entities.len()),
            Some(_) => self.entities.binary_search_by_key(&index, |e| e.index()),
        }
    }

    fn row_of(&self, entity: Entity) -> Option<usize> {
        self.position(entity.index())
            .ok()
            .filter(|&row| self.entities[row] == entity)
    }

    /// Ascending cursor over `(handle, row)` pairs.
    #[must_use]
    pub fn iter(&self) -> Rows<'_, T> {
        self.entities.iter().copied().zip(self.rows.iter())
    }

    /// Ascending cursor starting at the first row whose index is `from` or
    /// greater.
    ///
    /// Queries walk the handle column directly; this is for callers outside
    /// the join that page through a pool in bounded chunks, such as a
    /// serializer resuming after the last index it wrote.
    ///
    /// ```
    /// use ember_core::{ComponentStorage, Entity, SortedPool};
    /// # #[derive(Debug)] struct Mass(f32);
    /// # ember_core::define_component!(Mass, "Mass", sorted);
    ///
    /// let mut pool = SortedPool::new();
    /// for index in 1..=10 {
    ///     pool.insert(Entity::new(index, 0), Mass(index as f32));
    /// }
    ///
    /// let mut resume = 0;
    /// let mut pages = Vec::new();
    /// loop {
    ///     let page: Vec<u32> = pool.cursor(resume).take(4).map(|(e, _)| e.index()).collect();
    ///     let Some(&last) = page.last() else { break };
    ///     resume = last + 1;
    ///     pages.push(page);
    /// }
    /// assert_eq!(pages, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 10]]);
    /// ```
    #[must_use]
    pub fn cursor(&self, from: u32) -> Rows<'_, T> {
        let start = match self.position(from) {
            Ok(row) | Err(row) => row,
        };
        self.entities[start..].iter().copied().zip(self.rows[start..].iter())
    }

    /// Ascending cursor over `(handle, mutable row)` pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.entities.iter().copied().zip(self.rows.iter_mut())
    }
}

impl<T> Default for SortedPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentStorage for SortedPool<T> {
    type Item = T;
    const SORTED: bool = true;

    fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        match self.position(entity.index()) {
            Ok(row) => {
                assert_eq!(
                    self.entities[row],
                    entity,
                    "pool `{}` still holds a row for index {}; rows must be erased before the index is reused",
                    T::NAME,
                    entity.index()
                );
                Some(std::mem::replace(&mut self.rows[row], value))
            }
            Err(row) => {
                self.entities.insert(row, entity);
                self.rows.insert(row, value);
                None
            }
        }
    }

    fn remove(&mut self, entity: Entity) -> Option<T> {
        let row = self.row_of(entity)?;
        self.entities.remove(row);
        Some(self.rows.remove(row))
    }

    fn get(&self, entity: Entity) -> Option<&T> {
        self.row_of(entity).map(|row| &self.rows[row])
    }

    fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.row_of(entity).map(|row| &mut self.rows[row])
    }

    fn probe(&self, index: u32) -> Option<(Entity, &T)> {
        let row = self.position(index).ok()?;
        Some((self.entities[row], &self.rows[row]))
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn clear(&mut self) {
        self.entities.clear();
        self.rows.clear();
    }

    fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn column(&self) -> Column<'_, T> {
        Column::new(&self.entities, &self.rows, RowLookup::Ordered)
    }

    fn column_mut(&mut self) -> ColumnMut<'_, T> {
        ColumnMut::new(&self.entities, &mut self.rows, RowLookup::Ordered)
    }
}
