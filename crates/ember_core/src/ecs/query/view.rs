//! Query views and their iterators.

use super::plan::JoinStrategy;
use super::{fetch, Query};
use crate::ecs::entity::Entity;
use crate::ecs::registry::EntityRegistry;

/// Work done by one pass over a query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Rows stepped over in driving pools.
    pub driver_rows: usize,
    /// Point lookups into non-driving pools.
    pub probes: usize,
    /// Entities yielded.
    pub matches: usize,
}

/// Locked pools for one query, plus the strategy chosen for them.
///
/// The view holds a read guard for every `&T` and a write guard for every
/// `&mut T` until it is dropped. Rows yielded by [`QueryView::iter`] borrow
/// the view.
pub struct QueryView<'r, Q: Query> {
    borrow: Option<Q::Borrow<'r>>,
    strategy: JoinStrategy,
}

impl<'r, Q: Query> QueryView<'r, Q> {
    pub(crate) fn new(registry: &'r EntityRegistry) -> Self {
        fetch::check_disjoint(&Q::accesses());

        let borrow = Q::borrow(registry);
        let strategy = borrow
            .as_ref()
            .map_or(JoinStrategy::Empty, |borrow| JoinStrategy::select(&Q::shapes(borrow)));
        Self { borrow, strategy }
    }

    /// Strategy the view iterates with.
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> &JoinStrategy {
        &self.strategy
    }

    /// Iterates `(entity, components)` for every entity present in all
    /// requested pools.
    pub fn iter(&mut self) -> QueryIter<'_, Q> {
        let Some(borrow) = self.borrow.as_mut() else {
            return QueryIter::exhausted();
        };
        let columns = Q::columns(borrow);

        let cursor = match &self.strategy {
            JoinStrategy::Empty => Cursor::Done,
            JoinStrategy::Probe { driver } => Cursor::Probe {
                driver: *driver,
                entities: Q::entities(&columns, *driver),
                row: 0,
            },
            JoinStrategy::Merge { drivers } => Cursor::Merge {
                drivers: drivers
                    .iter()
                    .map(|&slot| (slot, Q::entities(&columns, slot)))
                    .collect(),
                rows: vec![0; drivers.len()],
            },
        };

        QueryIter {
            probes_per_candidate: Q::WIDTH - self.strategy.driver_count(),
            columns: Some(columns),
            cursor,
            hints: vec![None; Q::WIDTH],
            stats: JoinStats::default(),
        }
    }

    /// Calls `f` for every match.
    pub fn for_each<'v, F>(&'v mut self, mut f: F)
    where
        F: FnMut(Entity, Q::Item<'v>),
    {
        for (entity, item) in self.iter() {
            f(entity, item);
        }
    }
}

impl<'v, 'r, Q: Query> IntoIterator for &'v mut QueryView<'r, Q> {
    type Item = (Entity, Q::Item<'v>);
    type IntoIter = QueryIter<'v, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Position within the driving pools.
enum Cursor<'v> {
    Done,
    Probe {
        driver: usize,
        entities: &'v [Entity],
        row: usize,
    },
    Merge {
        drivers: Vec<(usize, &'v [Entity])>,
        rows: Vec<usize>,
    },
}

impl Cursor<'_> {
    /// Next candidate. Driver row positions are written into `hints`.
    fn advance(&mut self, hints: &mut [Option<usize>], stats: &mut JoinStats) -> Option<Entity> {
        match self {
            Self::Done => None,
            Self::Probe {
                driver,
                entities,
                row,
            } => {
                let entity = *entities.get(*row)?;
                hints.fill(None);
                hints[*driver] = Some(*row);
                *row += 1;
                stats.driver_rows += 1;
                Some(entity)
            }
            Self::Merge { drivers, rows } => intersect(drivers, rows, hints, stats),
        }
    }
}

/// Steps sorted cursors until they all sit on the same index.
fn intersect(
    drivers: &[(usize, &[Entity])],
    rows: &mut [usize],
    hints: &mut [Option<usize>],
    stats: &mut JoinStats,
) -> Option<Entity> {
    loop {
        let mut target = 0;
        for (&(_, entities), &row) in drivers.iter().zip(rows.iter()) {
            target = target.max(entities.get(row)?.index());
        }

        let mut aligned = true;
        for (&(_, entities), row) in drivers.iter().zip(rows.iter_mut()) {
            while entities.get(*row)?.index() < target {
                *row += 1;
                stats.driver_rows += 1;
            }
            aligned &= entities[*row].index() == target;
        }
        if !aligned {
            continue;
        }

        let entity = drivers[0].1[rows[0]];
        hints.fill(None);
        for (&(slot, _), row) in drivers.iter().zip(rows.iter_mut()) {
            hints[slot] = Some(*row);
            *row += 1;
        }
        stats.driver_rows += drivers.len();
        return Some(entity);
    }
}

/// Single-pass iterator over a [`QueryView`].
pub struct QueryIter<'v, Q: Query> {
    columns: Option<Q::Columns<'v>>,
    cursor: Cursor<'v>,
    hints: Vec<Option<usize>>,
    probes_per_candidate: usize,
    stats: JoinStats,
}

impl<Q: Query> QueryIter<'_, Q> {
    fn exhausted() -> Self {
        Self {
            columns: None,
            cursor: Cursor::Done,
            hints: Vec::new(),
            probes_per_candidate: 0,
            stats: JoinStats::default(),
        }
    }

    /// Work done so far.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> JoinStats {
        self.stats
    }
}

impl<'v, Q: Query> Iterator for QueryIter<'v, Q> {
    type Item = (Entity, Q::Item<'v>);

    fn next(&mut self) -> Option<Self::Item> {
        let columns = self.columns.as_ref()?;
        while let Some(entity) = self.cursor.advance(&mut self.hints, &mut self.stats) {
            self.stats.probes += self.probes_per_candidate;
            // SAFETY: drivers only move forward and each pool holds an index
            // at most once, so every entity is fetched at most once per
            // iterator. `QueryView::new` rejected aliased mutable columns.
            if let Some(item) = unsafe { Q::fetch(columns, entity, &self.hints) } {
                self.stats.matches += 1;
                return Some((entity, item));
            }
        }
        None
    }
}
