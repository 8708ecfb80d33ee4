//! # Handle Allocator
//!
//! Issues and validates [`Entity`] handles without locks.
//!
//! ## Slot Encoding
//!
//! ```text
//! slot[index - 1]: u32
//! ┌───┬──────────────────────────────────────┐
//! │ F │ generation (31 bits)                 │
//! └───┴──────────────────────────────────────┘
//!   F = 1: index is free (sitting in the free list, or parked)
//!   F = 0: index is live with this generation
//! ```
//!
//! A handle is valid iff its index has been issued and its slot holds exactly
//! its generation with the free flag clear. Setting the flag therefore
//! invalidates every outstanding handle for the index in one store.
//!
//! ## Thread Safety
//!
//! - `allocate`, `lookup`, `is_valid`, `next_live`: `&self`, callable from any thread
//! - `retire`, `reset`: `&mut self`, single writer (the registry's sync point)

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use super::entity::{Entity, MAX_GENERATION};
use crate::config::RegistryConfig;
use crate::sync::Mailbox;

/// Free flag stored in the top bit of a slot.
const FREE_FLAG: u32 = 1 << 31;

/// Mask extracting the generation from a slot.
const GENERATION_MASK: u32 = MAX_GENERATION;

/// Counters describing allocator behaviour since creation or the last reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Fresh indices minted from the high-water counter.
    pub minted: usize,
    /// Recycled indices reactivated from the free list.
    pub recycled: usize,
    /// Allocations that exhausted their reactivation attempts and minted instead.
    pub contention_fallbacks: usize,
    /// Indices permanently retired because their generation was exhausted.
    pub parked: usize,
}

/// Lock-free generational index allocator.
///
/// The slot table is pre-allocated to a fixed capacity; indices are 1-based
/// so that index 0 stays reserved for [`Entity::INVALID`].
///
/// # Example
///
/// ```rust
/// use ember_core::HandleAllocator;
///
/// let mut allocator = HandleAllocator::with_capacity(16);
/// let a = allocator.allocate();
/// assert!(allocator.is_valid(a));
///
/// allocator.retire(a);
/// assert!(!allocator.is_valid(a));
///
/// let b = allocator.allocate();
/// assert_eq!(b.index(), a.index());
/// assert_eq!(b.generation(), a.generation() + 1);
/// ```
pub struct HandleAllocator {
    /// Generation + free flag per index, at position `index - 1`.
    slots: Box<[AtomicU32]>,
    /// Retired handles (already carrying their bumped generation).
    free_list: Mailbox<Entity>,
    /// Number of indices ever minted; the next fresh index is this plus one.
    next_fresh_index: AtomicU32,
    /// CAS attempts before falling back to a fresh index.
    max_reactivation_attempts: u32,
    minted: AtomicUsize,
    recycled: AtomicUsize,
    contention_fallbacks: AtomicUsize,
    parked: usize,
}

impl HandleAllocator {
    /// Creates an allocator with `capacity` pre-allocated slots and the
    /// default reactivation bound.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or `u32::MAX`.
    #[must_use]
    pub fn with_capacity(capacity: u32) -> Self {
        Self::from_config(&RegistryConfig::with_capacity(capacity))
    }

    /// Creates an allocator from a registry config.
    ///
    /// # Panics
    ///
    /// Panics if the config does not validate.
    #[must_use]
    pub fn from_config(config: &RegistryConfig) -> Self {
        if let Err(err) = config.validate() {
            panic!("{err}");
        }

        let slots = (0..config.capacity)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            free_list: Mailbox::new(),
            next_fresh_index: AtomicU32::new(0),
            max_reactivation_attempts: config.max_reactivation_attempts,
            minted: AtomicUsize::new(0),
            recycled: AtomicUsize::new(0),
            contention_fallbacks: AtomicUsize::new(0),
            parked: 0,
        }
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        // Bounded by `RegistryConfig::validate`.
        self.slots.len() as u32
    }

    /// Highest index issued so far (indices `1..=high_water` have been minted).
    #[inline]
    #[must_use]
    pub fn high_water(&self) -> u32 {
        self.next_fresh_index
            .load(Ordering::Acquire)
            .min(self.capacity())
    }

    /// Number of retired indices waiting in the free list.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns the allocator's counters.
    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            minted: self.minted.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            contention_fallbacks: self.contention_fallbacks.load(Ordering::Relaxed),
            parked: self.parked,
        }
    }

    /// Issues a handle. Lock-free and callable from any number of threads.
    ///
    /// Recycled indices are preferred. Each candidate from the free list is
    /// reactivated with a compare-and-swap from "free, generation g" to
    /// "live, generation g"; the generation was already bumped at retirement.
    /// A failed swap means the candidate went stale under contention, so the
    /// next one is tried. After `max_reactivation_attempts` failures, or as
    /// soon as the free list is empty, a fresh index is minted instead, which
    /// always succeeds.
    ///
    /// # Panics
    ///
    /// Panics if a fresh index is needed and the slot table is full.
    pub fn allocate(&self) -> Entity {
        for _ in 0..self.max_reactivation_attempts {
            let Some(candidate) = self.free_list.take() else {
                return self.mint();
            };

            let generation = candidate.generation();
            match self.slots[slot_of(candidate)].compare_exchange(
                FREE_FLAG | generation,
                generation,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.recycled.fetch_add(1, Ordering::Relaxed);
                    return candidate;
                }
                // Each retire posts exactly one entry, so a candidate that
                // fails is superseded: its slot is live again or free under a
                // newer generation whose own entry is still queued. Dropping it
                // loses nothing.
                Err(observed) => debug_assert!(
                    observed & FREE_FLAG == 0 || observed & !FREE_FLAG > generation,
                    "free-list entry {candidate:?} is the only claim on a free slot; \
                     dropping it would lose the index"
                ),
            }
        }

        self.contention_fallbacks.fetch_add(1, Ordering::Relaxed);
        self.mint()
    }

    /// Mints a never-issued index with generation 0.
    fn mint(&self) -> Entity {
        let issued = self.next_fresh_index.fetch_add(1, Ordering::AcqRel);
        assert!(
            issued < self.capacity(),
            "entity index space exhausted (capacity {})",
            self.capacity()
        );
        self.minted.fetch_add(1, Ordering::Relaxed);
        // Fresh slots are zero: live, generation 0.
        Entity::new(issued + 1, 0)
    }

    /// Returns the handle currently associated with `index`.
    ///
    /// The result may be a free (invalid) handle if the index is not live;
    /// [`Entity::INVALID`] is returned for indices never issued.
    #[must_use]
    pub fn lookup(&self, index: u32) -> Entity {
        if index == 0 || index > self.high_water() {
            return Entity::INVALID;
        }
        let value = self.slots[(index - 1) as usize].load(Ordering::Acquire);
        Entity::new(index, value & GENERATION_MASK)
    }

    /// Checks whether `entity` is a live handle.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        let index = entity.index();
        if index == 0 || index > self.high_water() || entity.generation() > MAX_GENERATION {
            return false;
        }
        self.slots[(index - 1) as usize].load(Ordering::Acquire) == entity.generation()
    }

    /// Retires a live handle: bumps its generation, marks the slot free and
    /// queues the index for reuse.
    ///
    /// An index whose generation cannot be bumped any further is parked
    /// instead: it stays free forever, so no stale handle can alias it.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not currently valid (double retirement).
    pub fn retire(&mut self, entity: Entity) {
        assert!(
            self.is_valid(entity),
            "retiring {entity:?}, which is not a live handle"
        );

        let slot = self.slots[slot_of(entity)].get_mut();
        if entity.generation() == MAX_GENERATION {
            *slot = FREE_FLAG | MAX_GENERATION;
            self.parked += 1;
            tracing::warn!(
                index = entity.index(),
                "generation counter exhausted, index parked permanently"
            );
            return;
        }

        let next = entity.generation() + 1;
        *slot = FREE_FLAG | next;
        self.free_list.post(Entity::new(entity.index(), next));
    }

    /// Forgets every issued index and clears the free list.
    pub fn reset(&mut self) {
        let issued = self.high_water() as usize;
        for slot in &mut self.slots[..issued] {
            *slot.get_mut() = 0;
        }
        self.free_list.clear();
        *self.next_fresh_index.get_mut() = 0;
        *self.minted.get_mut() = 0;
        *self.recycled.get_mut() = 0;
        *self.contention_fallbacks.get_mut() = 0;
        self.parked = 0;
    }

    /// Returns the first live handle with an index greater than `after`'s,
    /// or [`Entity::INVALID`] when there is none.
    ///
    /// Pass [`Entity::INVALID`] to start from the beginning. This is a linear
    /// scan meant for "all entities" passes outside hot per-frame queries; the
    /// result is only a consistent snapshot when no thread is allocating.
    #[must_use]
    pub fn next_live(&self, after: Entity) -> Entity {
        // Slot position `p` holds index `p + 1`, so scanning from position
        // `after.index()` starts at the index right after `after`.
        let start = after.index() as usize;
        let end = self.high_water() as usize;
        for position in start..end {
            let value = self.slots[position].load(Ordering::Acquire);
            if value & FREE_FLAG == 0 {
                return Entity::new(position as u32 + 1, value);
            }
        }
        Entity::INVALID
    }

    /// Iterates all live handles in index order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        let mut cursor = Entity::INVALID;
        std::iter::from_fn(move || {
            cursor = self.next_live(cursor);
            (!cursor.is_invalid()).then_some(cursor)
        })
    }

    /// Counts live handles (linear scan).
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.iter().count()
    }
}

#[inline]
fn slot_of(entity: Entity) -> usize {
    (entity.index() - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_fresh_indices_start_at_one() {
        let allocator = HandleAllocator::with_capacity(8);
        let handles: Vec<_> = (0..3).map(|_| allocator.allocate()).collect();
        assert_eq!(
            handles,
            vec![Entity::new(1, 0), Entity::new(2, 0), Entity::new(3, 0)]
        );
        assert!(handles.iter().all(|&h| allocator.is_valid(h)));
        assert_eq!(allocator.high_water(), 3);
    }

    #[test]
    fn test_retire_bumps_generation_and_recycles() {
        let mut allocator = HandleAllocator::with_capacity(8);
        let first = allocator.allocate();
        allocator.retire(first);

        assert!(!allocator.is_valid(first));
        assert_eq!(allocator.free_count(), 1);
        assert_eq!(allocator.lookup(first.index()), Entity::new(1, 1));

        let second = allocator.allocate();
        assert_eq!(second, Entity::new(1, 1));
        assert!(allocator.is_valid(second));
        assert!(!allocator.is_valid(first));
        assert_eq!(allocator.stats().recycled, 1);
    }

    #[test]
    fn test_generations_strictly_increase_per_index() {
        let mut allocator = HandleAllocator::with_capacity(4);
        let mut previous = allocator.allocate();
        for _ in 0..50 {
            allocator.retire(previous);
            let next = allocator.allocate();
            assert_eq!(next.index(), previous.index());
            assert!(next.generation() > previous.generation());
            assert!(!allocator.is_valid(previous));
            previous = next;
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let allocator = HandleAllocator::with_capacity(4);
        assert!(!allocator.is_valid(Entity::INVALID));
        assert!(!allocator.is_valid(Entity::new(3, 0)));
        assert_eq!(allocator.lookup(0), Entity::INVALID);
        assert_eq!(allocator.lookup(1), Entity::INVALID);

        let live = allocator.allocate();
        let forged = Entity::new(live.index(), FREE_FLAG);
        assert!(!allocator.is_valid(forged));
    }

    #[test]
    fn test_contention_fallback_mints_fresh_index() {
        let allocator = HandleAllocator::with_capacity(16);
        let live = allocator.allocate();

        // Stale candidates whose slots are not in the expected free state:
        // every reactivation CAS fails.
        for generation in 1..=4 {
            allocator.free_list.post(Entity::new(live.index(), generation));
        }

        let fresh = allocator.allocate();
        assert_eq!(fresh, Entity::new(2, 0));
        assert!(allocator.is_valid(live));
        assert!(allocator.is_valid(fresh));

        let stats = allocator.stats();
        assert_eq!(stats.contention_fallbacks, 1);
        assert_eq!(stats.recycled, 0);
        assert_eq!(stats.minted, 2);
        assert_eq!(allocator.free_count(), 0);
    }

    #[test]
    fn test_stale_candidate_skipped_before_bound() {
        let mut allocator = HandleAllocator::with_capacity(16);
        let a = allocator.allocate();
        let b = allocator.allocate();
        allocator.free_list.post(Entity::new(a.index(), 9));
        allocator.retire(b);

        // One failed CAS, then the genuine candidate succeeds.
        let reused = allocator.allocate();
        assert_eq!(reused, Entity::new(b.index(), 1));
        assert_eq!(allocator.stats().contention_fallbacks, 0);
    }

    #[test]
    fn test_superseded_candidate_leaves_index_recoverable() {
        let mut allocator = HandleAllocator::with_capacity(16);
        let first = allocator.allocate();
        allocator.retire(first);
        let second = allocator.allocate();
        allocator.retire(second);

        // An outdated entry for the same index, ahead of the real one.
        allocator.free_list.clear();
        allocator.free_list.post(first);
        allocator.free_list.post(Entity::new(first.index(), 2));

        let reused = allocator.allocate();
        assert_eq!(reused, Entity::new(first.index(), 2));
        assert_eq!(allocator.stats().contention_fallbacks, 0);
        assert_eq!(
            allocator.live_count() + allocator.free_count(),
            allocator.high_water() as usize
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "would lose the index")]
    fn test_dropping_sole_claim_on_free_slot_is_caught() {
        let mut allocator = HandleAllocator::with_capacity(16);
        let entity = allocator.allocate();
        allocator.retire(entity);

        // Replace the genuine entry with one from a generation the slot has
        // not reached yet.
        allocator.free_list.clear();
        allocator.free_list.post(Entity::new(entity.index(), 7));
        allocator.allocate();
    }

    #[test]
    fn test_exhausted_generation_parks_index() {
        let mut allocator = HandleAllocator::with_capacity(4);
        let first = allocator.allocate();
        *allocator.slots[slot_of(first)].get_mut() = MAX_GENERATION;
        let oldest = Entity::new(first.index(), MAX_GENERATION);
        assert!(allocator.is_valid(oldest));

        allocator.retire(oldest);
        assert!(!allocator.is_valid(oldest));
        assert_eq!(allocator.free_count(), 0);
        assert_eq!(allocator.stats().parked, 1);

        let next = allocator.allocate();
        assert_eq!(next.index(), 2);
    }

    #[test]
    fn test_next_live_skips_free_slots() {
        let mut allocator = HandleAllocator::with_capacity(8);
        let handles: Vec<_> = (0..5).map(|_| allocator.allocate()).collect();
        allocator.retire(handles[1]);
        allocator.retire(handles[3]);

        assert_eq!(allocator.next_live(Entity::INVALID), handles[0]);
        assert_eq!(allocator.next_live(handles[0]), handles[2]);
        assert_eq!(allocator.next_live(handles[2]), handles[4]);
        assert_eq!(allocator.next_live(handles[4]), Entity::INVALID);

        let live: Vec<_> = allocator.iter().collect();
        assert_eq!(live, vec![handles[0], handles[2], handles[4]]);
        assert_eq!(allocator.live_count(), 3);
    }

    #[test]
    fn test_reset_forgets_everything() {
        let mut allocator = HandleAllocator::with_capacity(8);
        let a = allocator.allocate();
        let b = allocator.allocate();
        allocator.retire(b);

        allocator.reset();
        assert!(!allocator.is_valid(a));
        assert_eq!(allocator.high_water(), 0);
        assert_eq!(allocator.free_count(), 0);
        assert_eq!(allocator.stats(), AllocatorStats::default());
        assert_eq!(allocator.allocate(), Entity::new(1, 0));
    }

    #[test]
    #[should_panic(expected = "not a live handle")]
    fn test_double_retire_panics() {
        let mut allocator = HandleAllocator::with_capacity(4);
        let entity = allocator.allocate();
        allocator.retire(entity);
        allocator.retire(entity);
    }

    #[test]
    #[should_panic(expected = "index space exhausted")]
    fn test_capacity_exhaustion_panics() {
        let allocator = HandleAllocator::with_capacity(2);
        for _ in 0..3 {
            let _ = allocator.allocate();
        }
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let mut allocator = HandleAllocator::with_capacity(64 * 1024);
        let warmup: Vec<_> = (0..4096).map(|_| allocator.allocate()).collect();
        for entity in warmup {
            allocator.retire(entity);
        }

        let allocator = &allocator;
        let per_thread: Vec<Vec<Entity>> = thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(move || (0..2000).map(|_| allocator.allocate()).collect::<Vec<_>>())
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let mut seen = HashSet::new();
        let mut indices = HashSet::new();
        for entity in per_thread.into_iter().flatten() {
            assert!(allocator.is_valid(entity));
            assert!(seen.insert(entity), "handle {entity:?} issued twice");
            assert!(indices.insert(entity.index()), "index {} live twice", entity.index());
        }
        assert_eq!(seen.len(), 16_000);

        let stats = allocator.stats();
        assert_eq!(stats.recycled, 4096);
        assert_eq!(stats.minted, 4096 + 16_000 - 4096);
    }
}
