//! Join strategy selection.

/// Size ratio separating "rare" from "comparable" pools.
///
/// An unsorted pool drives a query when it is at most `1 / DRIVER_RATIO` the
/// size of the smallest sorted pool. Otherwise every sorted pool within
/// `DRIVER_RATIO` times the smallest sorted pool joins the merge.
pub const DRIVER_RATIO: usize = 10;

/// Size and ordering of one requested pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
    /// Number of rows.
    pub len: usize,
    /// Whether rows are in ascending index order.
    pub sorted: bool,
}

/// How a query walks its pools. Slots are positions in the query tuple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Some requested pool is empty or missing; nothing can match.
    Empty,
    /// Iterate one small unsorted pool and probe every other pool per row.
    Probe {
        /// Slot of the driving pool.
        driver: usize,
    },
    /// Intersect several sorted pools in lockstep, probing the rest.
    Merge {
        /// Slots of the sorted pools walked together, in slot order.
        drivers: Vec<usize>,
    },
}

impl JoinStrategy {
    /// Picks a strategy from the shapes of the requested pools.
    #[must_use]
    pub fn select(shapes: &[Shape]) -> Self {
        if shapes.is_empty() || shapes.iter().any(|shape| shape.len == 0) {
            return Self::Empty;
        }

        let smallest_sorted = shapes
            .iter()
            .filter(|shape| shape.sorted)
            .map(|shape| shape.len)
            .min();
        let smallest_unsorted = shapes
            .iter()
            .enumerate()
            .filter(|(_, shape)| !shape.sorted)
            .min_by_key(|(_, shape)| shape.len);

        match (smallest_sorted, smallest_unsorted) {
            (None, Some((driver, _))) => Self::Probe { driver },
            (Some(floor), Some((driver, shape)))
                if shape.len.saturating_mul(DRIVER_RATIO) <= floor =>
            {
                Self::Probe { driver }
            }
            (Some(floor), _) => {
                let ceiling = floor.saturating_mul(DRIVER_RATIO);
                Self::Merge {
                    drivers: shapes
                        .iter()
                        .enumerate()
                        .filter(|(_, shape)| shape.sorted && shape.len <= ceiling)
                        .map(|(slot, _)| slot)
                        .collect(),
                }
            }
            (None, None) => Self::Empty,
        }
    }

    /// Number of pools walked rather than probed.
    #[must_use]
    pub fn driver_count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Probe { .. } => 1,
            Self::Merge { drivers } => drivers.len(),
        }
    }
}
