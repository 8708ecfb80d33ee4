//! # Query Equivalence Tests
//!
//! Randomized populations (seeded ChaCha) compared against a naive join that
//! walks every live entity and checks each pool through the entity facet.
//! Whatever strategy a view picks, the result set must be identical.
//!
//! Run with: cargo test -p ember_core --test query_equivalence

use std::collections::BTreeSet;

use ember_core::{define_component, Entity, EntityRef, EntityRegistry, JoinStrategy};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug)]
struct Alpha(u64);

#[derive(Debug)]
struct Beta {
    bits: u64,
    visits: u32,
}

#[derive(Debug)]
struct Gamma(u64);

#[derive(Debug)]
struct Delta(u64);

define_component!(Alpha, "Alpha", sorted);
define_component!(Beta, "Beta", sorted);
define_component!(Gamma, "Gamma", unsorted);
define_component!(Delta, "Delta", unsorted);

/// Per-component probability of being attached to a new entity.
type Odds = [f64; 4];

const POPULATIONS: &[(u64, usize, Odds)] = &[
    (1, 4_000, [0.9, 0.5, 0.01, 0.3]),
    (2, 4_000, [0.6, 0.6, 0.6, 0.6]),
    (3, 6_000, [0.05, 0.95, 0.002, 0.5]),
    (4, 3_000, [1.0, 0.001, 0.2, 0.0]),
    (5, 500, [0.3, 0.03, 0.9, 0.003]),
    (6, 8_000, [0.5, 0.04, 0.5, 0.05]),
];

fn populate(registry: &mut EntityRegistry, rng: &mut ChaCha8Rng, count: usize, odds: Odds) -> Vec<Entity> {
    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        let entity = registry.create();
        let bits = entity.to_bits();
        if rng.gen_bool(odds[0]) {
            registry.insert(entity, Alpha(bits));
        }
        if rng.gen_bool(odds[1]) {
            registry.insert(entity, Beta { bits, visits: 0 });
        }
        if rng.gen_bool(odds[2]) {
            registry.insert(entity, Gamma(bits));
        }
        if rng.gen_bool(odds[3]) {
            registry.insert(entity, Delta(bits));
        }
        created.push(entity);
    }
    created
}

/// Builds a population with holes and recycled indices.
fn build(seed: u64, count: usize, odds: Odds) -> EntityRegistry {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut registry = EntityRegistry::with_capacity(16_384);
    registry.register_component_type::<Alpha>();
    registry.register_component_type::<Beta>();
    registry.register_component_type::<Gamma>();
    registry.register_component_type::<Delta>();

    let first_wave = populate(&mut registry, &mut rng, count, odds);
    for entity in first_wave {
        if rng.gen_bool(0.2) {
            registry.destroy(entity);
        }
    }
    registry.sync();

    // Reused indices land in the middle of sorted pools.
    populate(&mut registry, &mut rng, count / 4, odds);
    registry
}

fn naive(registry: &EntityRegistry, matches: impl Fn(&EntityRef<'_>) -> bool) -> BTreeSet<Entity> {
    registry
        .entities()
        .filter(|&entity| registry.get(entity).is_some_and(|facet| matches(&facet)))
        .collect()
}

fn collect_unique(found: Vec<Entity>) -> BTreeSet<Entity> {
    let unique: BTreeSet<Entity> = found.iter().copied().collect();
    assert_eq!(unique.len(), found.len(), "an entity was yielded twice");
    unique
}

#[derive(Default)]
struct Seen {
    probe: usize,
    merge: usize,
}

impl Seen {
    fn record(&mut self, strategy: &JoinStrategy) {
        match strategy {
            JoinStrategy::Probe { .. } => self.probe += 1,
            JoinStrategy::Merge { .. } => self.merge += 1,
            JoinStrategy::Empty => {}
        }
    }
}

#[test]
fn read_queries_match_naive_join() {
    let mut seen = Seen::default();

    for &(seed, count, odds) in POPULATIONS {
        let registry = build(seed, count, odds);

        let mut view = registry.query::<(&Alpha, &Beta)>();
        seen.record(view.strategy());
        let found = view
            .iter()
            .map(|(entity, (a, b))| {
                assert_eq!(a.0, entity.to_bits());
                assert_eq!(b.bits, entity.to_bits());
                entity
            })
            .collect();
        assert_eq!(
            collect_unique(found),
            naive(&registry, |f| f.has::<Alpha>() && f.has::<Beta>()),
            "seed {seed}: (Alpha, Beta)"
        );

        let mut view = registry.query::<(&Alpha, &Gamma)>();
        seen.record(view.strategy());
        let found = view
            .iter()
            .map(|(entity, (a, g))| {
                assert_eq!(a.0, g.0);
                entity
            })
            .collect();
        assert_eq!(
            collect_unique(found),
            naive(&registry, |f| f.has::<Alpha>() && f.has::<Gamma>()),
            "seed {seed}: (Alpha, Gamma)"
        );

        let mut view = registry.query::<(&Gamma, &Delta)>();
        seen.record(view.strategy());
        let found = view.iter().map(|(entity, _)| entity).collect();
        assert_eq!(
            collect_unique(found),
            naive(&registry, |f| f.has::<Gamma>() && f.has::<Delta>()),
            "seed {seed}: (Gamma, Delta)"
        );

        let mut view = registry.query::<(&Delta, &Beta, &Gamma, &Alpha)>();
        seen.record(view.strategy());
        let found = view
            .iter()
            .map(|(entity, (d, b, g, a))| {
                assert!(d.0 == b.bits && b.bits == g.0 && g.0 == a.0);
                entity
            })
            .collect();
        assert_eq!(
            collect_unique(found),
            naive(&registry, |f| {
                f.has::<Alpha>() && f.has::<Beta>() && f.has::<Gamma>() && f.has::<Delta>()
            }),
            "seed {seed}: (Delta, Beta, Gamma, Alpha)"
        );
    }

    assert!(seen.probe > 0, "no population exercised the probe strategy");
    assert!(seen.merge > 0, "no population exercised the merge strategy");
}

#[test]
fn mutable_queries_touch_each_match_once() {
    for &(seed, count, odds) in POPULATIONS {
        let registry = build(seed, count, odds);
        let expected = naive(&registry, |f| f.has::<Alpha>() && f.has::<Beta>());

        registry
            .query::<(&Alpha, &mut Beta)>()
            .for_each(|_, (_, beta)| beta.visits += 1);

        let mut touched = BTreeSet::new();
        if let Some(pool) = registry.pool::<Beta>() {
            for (entity, beta) in ember_core::ComponentStorage::iter(&*pool) {
                assert!(beta.visits <= 1, "seed {seed}: {entity} visited {} times", beta.visits);
                if beta.visits == 1 {
                    touched.insert(entity);
                }
            }
        }
        assert_eq!(touched, expected, "seed {seed}");
    }
}

#[test]
fn mutable_probe_query_rewrites_rare_rows() {
    let registry = build(11, 5_000, [0.8, 0.8, 0.004, 0.5]);

    let mut view = registry.query::<(&mut Gamma, &Alpha)>();
    assert_eq!(view.strategy(), &JoinStrategy::Probe { driver: 0 });
    for (_, (gamma, alpha)) in &mut view {
        gamma.0 = !alpha.0;
    }
    drop(view);

    let rewritten = naive(&registry, |f| {
        f.get::<Gamma>()
            .zip(f.get::<Alpha>())
            .is_some_and(|(g, a)| g.0 == !a.0)
    });
    assert_eq!(rewritten, naive(&registry, |f| f.has::<Gamma>() && f.has::<Alpha>()));
}
