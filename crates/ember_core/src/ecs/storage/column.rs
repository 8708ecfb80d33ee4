//! Column views used by queries.
//!
//! A column is a borrowed, flattened view of one pool: the handle of every
//! row, the rows themselves, and the pool's point-lookup structure.

// SAFETY: `ColumnMut` hands out `&mut` rows through a raw pointer so that a
// query iterator can yield rows for many entities from one exclusive borrow.
// Soundness relies on each row being requested at most once per borrow.
#![allow(unsafe_code)]

use std::collections::HashMap;
use std::iter::{Copied, Zip};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::slice;

use crate::ecs::entity::Entity;

/// Iterator over `(handle, row)` pairs in a pool's native row order.
pub type Rows<'a, T> = Zip<Copied<slice::Iter<'a, Entity>>, slice::Iter<'a, T>>;

/// How a pool maps an entity index to a row.
#[derive(Clone, Copy, Debug)]
pub enum RowLookup<'a> {
    /// Rows are sorted by index; lookups binary-search the handle column.
    Ordered,
    /// Rows are unordered; lookups go through an index → row map.
    Hashed(&'a HashMap<u32, usize>),
}

impl RowLookup<'_> {
    #[inline]
    fn find(self, entities: &[Entity], index: u32) -> Option<usize> {
        match self {
            Self::Ordered => entities.binary_search_by_key(&index, |e| e.index()).ok(),
            Self::Hashed(rows) => rows.get(&index).copied(),
        }
    }

    #[inline]
    fn is_ordered(self) -> bool {
        matches!(self, Self::Ordered)
    }
}

/// Shared view of a pool.
pub struct Column<'a, T> {
    entities: &'a [Entity],
    rows: &'a [T],
    lookup: RowLookup<'a>,
}

impl<'a, T> Column<'a, T> {
    /// Builds a view from a pool's handle column, rows and lookup.
    ///
    /// # Panics
    ///
    /// Panics if the handle column and the rows differ in length.
    #[must_use]
    pub fn new(entities: &'a [Entity], rows: &'a [T], lookup: RowLookup<'a>) -> Self {
        assert_eq!(entities.len(), rows.len(), "column handles and rows out of step");
        Self { entities, rows, lookup }
    }

    /// Handles in row order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &'a [Entity] {
        self.entities
    }

    /// Whether rows are in ascending index order.
    #[inline]
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.lookup.is_ordered()
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the column has no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row position for an entity index.
    #[inline]
    #[must_use]
    pub fn find(&self, index: u32) -> Option<usize> {
        self.lookup.find(self.entities, index)
    }

    /// Row for `entity`. `hint` is a known row position, if any.
    ///
    /// Returns `None` if the stored handle carries another generation.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity, hint: Option<usize>) -> Option<&'a T> {
        let row = resolve(self.entities, self.lookup, entity, hint)?;
        self.rows.get(row)
    }

    /// Iterates `(handle, row)` pairs in row order.
    #[must_use]
    pub fn iter(&self) -> Rows<'a, T> {
        self.entities.iter().copied().zip(self.rows.iter())
    }
}

/// Exclusive view of a pool that can hand out disjoint `&mut` rows.
pub struct ColumnMut<'a, T> {
    entities: &'a [Entity],
    lookup: RowLookup<'a>,
    rows: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> ColumnMut<'a, T> {
    /// Builds a view from a pool's handle column, rows and lookup.
    ///
    /// # Panics
    ///
    /// Panics if the handle column and the rows differ in length.
    #[must_use]
    pub fn new(entities: &'a [Entity], rows: &'a mut [T], lookup: RowLookup<'a>) -> Self {
        assert_eq!(entities.len(), rows.len(), "column handles and rows out of step");
        Self {
            entities,
            lookup,
            len: rows.len(),
            rows: NonNull::from(rows).cast(),
            _marker: PhantomData,
        }
    }

    /// Handles in row order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &'a [Entity] {
        self.entities
    }

    /// Whether rows are in ascending index order.
    #[inline]
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.lookup.is_ordered()
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the column has no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Row position for an entity index.
    #[inline]
    #[must_use]
    pub fn find(&self, index: u32) -> Option<usize> {
        self.lookup.find(self.entities, index)
    }

    /// Mutable row for `entity`. `hint` is a known row position.
    ///
    /// # Safety
    ///
    /// The caller must not request the same row twice while a reference
    /// returned for it is still alive.
    #[inline]
    pub(crate) unsafe fn get(&self, entity: Entity, hint: Option<usize>) -> Option<&'a mut T> {
        let row = resolve(self.entities, self.lookup, entity, hint)?;
        if row >= self.len {
            return None;
        }
        // SAFETY: `row < len` keeps the pointer inside the slice borrowed for
        // 'a, and the caller guarantees no other live reference to this row.
        Some(unsafe { &mut *self.rows.as_ptr().add(row) })
    }
}

/// Row holding exactly `entity`, trusting `hint` when given.
#[inline]
fn resolve(entities: &[Entity], lookup: RowLookup<'_>, entity: Entity, hint: Option<usize>) -> Option<usize> {
    let row = match hint {
        Some(row) => row,
        None => lookup.find(entities, entity.index())?,
    };
    (entities.get(row) == Some(&entity)).then_some(row)
}
