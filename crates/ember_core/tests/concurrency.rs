//! # Concurrency Stress Tests
//!
//! Worker threads create, destroy and query during an update phase while the
//! main thread owns the sync point. The registry sits behind a
//! `parking_lot::RwLock`: workers share a read guard, sync takes the write
//! guard, mirroring the frame discipline an engine would use.
//!
//! Run with: cargo test -p ember_core --test concurrency --release

use std::collections::HashSet;
use std::thread;

use ember_core::{define_component, Entity, EntityRegistry};
use parking_lot::RwLock;

#[derive(Debug)]
struct Tick(usize);

define_component!(Tick, "Tick", sorted);

const WORKERS: usize = 8;
const ROUNDS: usize = 40;
const PER_WORKER: usize = 250;

#[test]
fn create_destroy_sync_never_duplicates_or_loses_handles() {
    let registry = RwLock::new(EntityRegistry::with_capacity(1 << 18));
    registry.write().register_component_type::<Tick>();

    let mut ever_issued: HashSet<Entity> = HashSet::new();
    let mut expected_live: HashSet<Entity> = HashSet::new();
    let mut survivors: Vec<Entity> = Vec::new();
    let mut ticked = 0;

    for round in 0..ROUNDS {
        // ------------------------------------------------------------------
        // Update phase: many threads, shared access only.
        // ------------------------------------------------------------------
        let guard = registry.read();
        let shared: &EntityRegistry = &guard;
        let previous: &[Entity] = &survivors;

        let results: Vec<(Vec<Entity>, Vec<Entity>)> = thread::scope(|scope| {
            let workers: Vec<_> = (0..WORKERS)
                .map(|worker| {
                    scope.spawn(move || {
                        let mut created = Vec::with_capacity(PER_WORKER);
                        let mut destroyed = Vec::new();

                        for i in 0..PER_WORKER {
                            let entity = shared.create();
                            assert!(shared.is_valid(entity));
                            created.push(entity);
                            if i % 3 == worker % 3 {
                                shared.destroy(entity);
                                destroyed.push(entity);
                            }
                        }

                        // Every worker destroys the same fifth of the previous
                        // round, so sync sees plenty of duplicates.
                        for (position, &entity) in previous.iter().enumerate() {
                            if position % 5 == 0 || position % WORKERS == worker {
                                shared.destroy(entity);
                                destroyed.push(entity);
                            }
                        }

                        // Queries run alongside creation and destroy requests.
                        let seen = shared.query::<(&Tick,)>().iter().count();
                        assert_eq!(seen, ticked);

                        (created, destroyed)
                    })
                })
                .collect();

            workers
                .into_iter()
                .map(|worker| worker.join().unwrap_or_else(|_| panic!("worker panicked")))
                .collect()
        });
        drop(guard);

        let mut destroyed_now: HashSet<Entity> = HashSet::new();
        let mut created_now: Vec<Entity> = Vec::new();
        for (created, destroyed) in results {
            for entity in created {
                assert!(ever_issued.insert(entity), "round {round}: {entity} issued twice");
                expected_live.insert(entity);
                created_now.push(entity);
            }
            destroyed_now.extend(destroyed);
        }

        // Destroy requests do not take effect before the sync point.
        assert!(destroyed_now.iter().all(|&entity| registry.read().is_valid(entity)));

        // ------------------------------------------------------------------
        // Sync point: exclusive access.
        // ------------------------------------------------------------------
        let mut synced = registry.write();
        let stats = synced.sync();
        assert_eq!(stats.destroyed, destroyed_now.len());
        for entity in &destroyed_now {
            expected_live.remove(entity);
            assert!(!synced.is_valid(*entity));
        }

        survivors = created_now
            .into_iter()
            .filter(|entity| !destroyed_now.contains(entity))
            .collect();
        for &entity in &survivors {
            synced.insert(entity, Tick(round));
        }

        let live: HashSet<Entity> = synced.entities().collect();
        assert_eq!(live, expected_live, "round {round}: live set diverged");
        ticked = synced.pool::<Tick>().map_or(0, |pool| {
            ember_core::ComponentStorage::len(&*pool)
        });

        // Every issued index is either live or waiting to be recycled.
        let allocator = synced.allocator();
        assert_eq!(
            allocator.live_count() + allocator.free_count(),
            allocator.high_water() as usize,
            "round {round}: an index went missing"
        );
    }

    let stats = registry.read().allocator_stats();
    assert!(stats.recycled > 0);
    assert_eq!(stats.parked, 0);
}

#[test]
fn concurrent_allocation_across_a_shared_registry() {
    let mut registry = EntityRegistry::with_capacity(1 << 16);

    // Seed the free list so workers race for recycled slots.
    let warmup: Vec<Entity> = (0..4_096).map(|_| registry.create()).collect();
    for &entity in &warmup {
        registry.destroy(entity);
    }
    registry.sync();

    let shared = &registry;
    let handles: Vec<Entity> = thread::scope(|scope| {
        let workers: Vec<_> = (0..WORKERS)
            .map(|_| scope.spawn(move || (0..2_000).map(|_| shared.create()).collect::<Vec<_>>()))
            .collect();
        workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap_or_else(|_| panic!("worker panicked")))
            .collect()
    });

    let unique: HashSet<Entity> = handles.iter().copied().collect();
    assert_eq!(unique.len(), handles.len());
    assert!(handles.iter().all(|&entity| registry.is_valid(entity)));
    assert_eq!(registry.live_count(), WORKERS * 2_000);
}
