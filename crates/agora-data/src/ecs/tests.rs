// Copyright 2025 the Agora contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::rc::Rc;

use agora_core::ecs::entity::{Entity, GEN_ALIVE_BIT, GEN_MASK};

use super::component::Component;
use super::registry::component_id;
use super::world::World;

// --- DUMMY COMPONENTS FOR TESTING ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Position {
    x: i32,
    y: i32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Health {
    hp: i32,
}
impl Component for Health {}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Velocity {
    vx: f32,
    vy: f32,
}
impl Component for Velocity {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Counter {
    value: i32,
}
impl Component for Counter {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Tag;
impl Component for Tag {}

/// Never attached by any test; its pool is never created.
#[derive(Debug, Clone, Copy)]
struct Unused;
impl Component for Unused {}

// --- HELPERS ---

fn xorshift32(state: &mut u32) -> u32 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    *state = x;
    x
}

/// Checks the structural invariants for every live entity: the signature
/// popcount matches the dense-index vector length, and the vector is read
/// in ascending component-id order.
fn assert_sig_idx_lockstep(world: &World) {
    for index in 0..world.store.len() as u32 {
        let meta = world.store.get(index);
        if !meta.is_alive() {
            continue;
        }
        assert_eq!(
            meta.sig.popcount(),
            meta.idx.len(),
            "signature popcount and idx length diverged for slot {index}"
        );
        let mut expected_pos = 0;
        meta.sig.for_each_set(|cid| {
            assert_eq!(meta.sig.rank(cid), expected_pos);
            expected_pos += 1;
        });
    }
}

/// Checks that every live entity owning `T` points at a pool entry tagged
/// with its own slot coordinates.
fn assert_pool_backrefs<T: Component>(world: &World) {
    let cid = component_id::<T>();
    let Some(pool) = world.pool_ref::<T>() else {
        return;
    };
    for index in 0..world.store.len() as u32 {
        let meta = world.store.get(index);
        if !meta.is_alive() || !meta.sig.test(cid) {
            continue;
        }
        let di = meta.idx[meta.sig.rank(cid)] as usize;
        assert!(di < pool.entries.len(), "dense index out of range");
        let entry = pool.entries.get(di);
        assert_eq!(entry.entity_index, meta.index);
        assert_eq!(entry.generation, meta.generation);
    }
}

fn assert_invariants(world: &World) {
    assert_sig_idx_lockstep(world);
    assert_pool_backrefs::<Position>(world);
    assert_pool_backrefs::<Health>(world);
    assert_pool_backrefs::<Velocity>(world);
    assert_pool_backrefs::<Counter>(world);
    assert_pool_backrefs::<Tag>(world);
}

// --- ENTITY LIFECYCLE ---

#[test]
fn test_create_destroy_lifecycle() {
    let mut world = World::new();
    let e = world.create();
    assert!(world.is_alive(e));

    world.destroy(e);
    assert!(!world.is_alive(e));

    let e2 = world.create();
    assert!(world.is_alive(e2));
    assert!(e2.id > e.id, "entity ids must be strictly increasing");
    assert_eq!(e2.index, e.index, "the freed slot should be recycled");
    assert_eq!(e2.generation, e.generation + 1);
}

#[test]
fn test_slot_reuse_advances_generation() {
    let mut world = World::new();
    let e1 = world.create();
    let old_index = e1.index;
    let old_gen = e1.generation;

    world.destroy(e1);
    assert!(!world.is_alive(e1));

    let e2 = world.create();
    assert_eq!(e2.index, old_index);
    let expected_gen = (old_gen.wrapping_add(1) & GEN_MASK) | GEN_ALIVE_BIT;
    assert_eq!(e2.generation, expected_gen);

    assert!(!world.is_alive(e1));
    assert!(world.is_alive(e2));
}

#[test]
fn test_entity_id_strictly_increases() {
    let mut world = World::new();
    let e1 = world.create();
    let e2 = world.create();
    world.destroy(e1);
    let e3 = world.create();
    let e4 = world.create();

    assert!(e1.id < e2.id);
    assert!(e2.id < e3.id);
    assert!(e3.id < e4.id);
}

#[test]
fn test_first_generation_is_alive_one() {
    let mut world = World::new();
    let e = world.create();
    assert_eq!(e.generation, GEN_ALIVE_BIT | 1);
    assert_eq!(e.index, 0);
}

#[test]
fn test_null_handle_never_validates() {
    let world = World::new();
    assert!(!world.is_alive(Entity::NULL));
    assert!(Entity::NULL.is_null());
}

// --- ADD / GET / REMOVE ---

#[test]
fn test_add_get_remove() {
    let mut world = World::new();
    let e = world.create();

    assert!(!world.has::<Position>(e));
    let pos = world.add(e, Position { x: 3, y: 4 });
    assert_eq!(pos.x, 3);
    assert_eq!(pos.y, 4);
    assert!(world.has::<Position>(e));

    let pos2 = world.get::<Position>(e);
    assert_eq!(*pos2, Position { x: 3, y: 4 });

    world.remove::<Position>(e);
    assert!(!world.has::<Position>(e));
    assert_invariants(&world);
}

#[test]
fn test_add_existing_returns_reference_to_existing() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });

    // Adding twice never reconstructs; the incoming value is dropped.
    let pos = world.add(e, Position { x: 99, y: 99 });
    assert_eq!(*pos, Position { x: 1, y: 2 });
}

#[test]
fn test_remove_missing_component_is_noop() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });

    world.remove::<Health>(e);

    assert!(world.has::<Position>(e));
    assert!(!world.has::<Health>(e));
}

#[test]
fn test_try_get_absent_returns_none() {
    let mut world = World::new();
    let e = world.create();

    assert!(world.try_get::<Position>(e).is_none());
    assert!(world.try_get::<Health>(e).is_none());
}

#[test]
fn test_get_mut_writes_through() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Counter { value: 1 });

    world.get_mut::<Counter>(e).value = 7;
    assert_eq!(world.get::<Counter>(e).value, 7);
}

#[test]
#[should_panic(expected = "stale entity handle")]
fn test_add_on_stale_handle_panics() {
    let mut world = World::new();
    let e = world.create();
    world.destroy(e);
    world.add(e, Position { x: 0, y: 0 });
}

#[test]
#[should_panic(expected = "missing component")]
fn test_get_on_absent_component_panics() {
    let mut world = World::new();
    let e = world.create();
    let _ = world.get::<Position>(e);
}

#[test]
fn test_stale_handle_rejected_after_destroy() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 5, y: 5 });

    let stale = e;
    world.destroy(e);

    assert!(!world.is_alive(stale));
    assert!(!world.has::<Position>(stale));
    assert!(world.try_get::<Position>(stale).is_none());

    // The recycled slot's new occupant must be unaffected by the stale
    // handle.
    let e2 = world.create();
    world.add(e2, Position { x: 10, y: 10 });
    assert!(!world.has::<Position>(stale));
    world.destroy(stale);
    assert!(world.is_alive(e2));
    assert_eq!(world.get::<Position>(e2).x, 10);
}

#[test]
fn test_zero_size_tag_component() {
    let mut world = World::new();
    let e = world.create();

    assert!(!world.has::<Tag>(e));
    world.add(e, Tag);
    assert!(world.has::<Tag>(e));

    let mut count = 0;
    world.each::<Tag, _>(|_, _| count += 1);
    assert_eq!(count, 1);

    world.remove::<Tag>(e);
    assert!(!world.has::<Tag>(e));
}

// --- SWAP-ERASE ---

#[test]
fn test_swap_erase_updates_moved_entity() {
    let mut world = World::new();
    let a = world.create();
    let b = world.create();
    let c = world.create();

    world.add(a, Health { hp: 10 });
    world.add(b, Health { hp: 20 });
    world.add(c, Health { hp: 30 });

    // Removing the first owner moves the tail entry over its slot; the
    // moved entity's dense index must be patched.
    world.remove::<Health>(a);

    assert!(!world.has::<Health>(a));
    assert_eq!(world.get::<Health>(b).hp, 20);
    assert_eq!(world.get::<Health>(c).hp, 30);
    assert_eq!(world.pool_ref::<Health>().unwrap().entries.len(), 2);
    assert_invariants(&world);
}

#[test]
fn test_swap_erase_only_entry() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Health { hp: 10 });
    world.remove::<Health>(e);

    assert!(!world.has::<Health>(e));
    let mut count = 0;
    world.each::<Health, _>(|_, _| count += 1);
    assert_eq!(count, 0);
}

#[test]
fn test_swap_erase_last_entry_no_move() {
    let mut world = World::new();
    let a = world.create();
    let b = world.create();

    world.add(a, Health { hp: 10 });
    world.add(b, Health { hp: 20 });

    world.remove::<Health>(b);

    assert!(world.has::<Health>(a));
    assert!(!world.has::<Health>(b));
    assert_eq!(world.get::<Health>(a).hp, 10);
    assert_invariants(&world);
}

// --- SIGNATURE / INDEX LOCKSTEP ---

#[test]
fn test_rank_with_multiple_components() {
    let mut world = World::new();
    let e = world.create();

    world.add(e, Position { x: 1, y: 2 });
    world.add(e, Health { hp: 100 });
    world.add(e, Velocity { vx: 3.0, vy: 4.0 });

    assert_eq!(world.get::<Position>(e).x, 1);
    assert_eq!(world.get::<Health>(e).hp, 100);
    assert_eq!(world.get::<Velocity>(e).vx, 3.0);
    assert_invariants(&world);

    // Removing the middle component re-ranks the survivors.
    world.remove::<Health>(e);
    assert!(!world.has::<Health>(e));
    assert_eq!(world.get::<Position>(e).x, 1);
    assert_eq!(world.get::<Velocity>(e).vx, 3.0);
    assert_invariants(&world);
}

#[test]
fn test_add_order_independence() {
    let mut world = World::new();

    let e1 = world.create();
    world.add(e1, Position { x: 1, y: 1 });
    world.add(e1, Health { hp: 50 });
    world.add(e1, Velocity { vx: 2.0, vy: 2.0 });
    world.remove::<Health>(e1);
    assert_eq!(world.get::<Position>(e1).x, 1);
    assert_eq!(world.get::<Velocity>(e1).vx, 2.0);

    let e2 = world.create();
    world.add(e2, Velocity { vx: 5.0, vy: 5.0 });
    world.add(e2, Position { x: 3, y: 3 });
    world.add(e2, Health { hp: 75 });
    world.remove::<Position>(e2);
    assert_eq!(world.get::<Velocity>(e2).vx, 5.0);
    assert_eq!(world.get::<Health>(e2).hp, 75);

    assert_invariants(&world);
}

#[test]
fn test_idx_vector_follows_ascending_component_ids() {
    let mut world = World::new();
    let e = world.create();

    // Insertion order deliberately differs from id order; the compact
    // vector must come out id-sorted regardless.
    world.add(e, Velocity { vx: 1.0, vy: 1.0 });
    world.add(e, Position { x: 2, y: 2 });
    world.add(e, Health { hp: 3 });

    let meta = world.store.get(e.index);
    let pairs = meta.components();
    let mut cids: Vec<_> = pairs.iter().map(|(cid, _)| *cid).collect();
    let sorted = {
        let mut s = cids.clone();
        s.sort_unstable();
        s
    };
    assert_eq!(cids, sorted, "component pairs must come out id-sorted");
    cids.dedup();
    assert_eq!(cids.len(), 3);
    assert_invariants(&world);
}

// --- DESTROY ---

#[test]
fn test_destroy_removes_all_components() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });
    world.add(e, Health { hp: 100 });
    world.add(e, Velocity { vx: 3.0, vy: 4.0 });

    world.destroy(e);

    let mut pos_count = 0;
    let mut hp_count = 0;
    let mut vel_count = 0;
    world.each::<Position, _>(|_, _| pos_count += 1);
    world.each::<Health, _>(|_, _| hp_count += 1);
    world.each::<Velocity, _>(|_, _| vel_count += 1);

    assert_eq!(pos_count, 0);
    assert_eq!(hp_count, 0);
    assert_eq!(vel_count, 0);
}

// --- RESOLUTION BY SLOT ---

#[test]
fn test_resolve_slot() {
    let mut world = World::new();
    let a = world.create();

    let r0 = world.resolve_slot(a.index, a.generation);
    assert_eq!(r0, a);

    world.destroy(a);
    let r1 = world.resolve_slot(a.index, a.generation);
    assert!(r1.is_null());

    let b = world.create();
    assert_eq!(b.index, a.index);
    let r2 = world.resolve_slot(b.index, b.generation);
    assert_eq!(r2, b);
    let r3 = world.resolve_slot(b.index, a.generation);
    assert!(r3.is_null());
}

#[test]
fn test_try_get_slot() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 8, y: 9 });

    let pos = world.try_get_slot::<Position>(e.index, e.generation);
    assert_eq!(pos, Some(&Position { x: 8, y: 9 }));

    if let Some(pos) = world.try_get_slot_mut::<Position>(e.index, e.generation) {
        pos.x = 80;
    }
    assert_eq!(world.get::<Position>(e).x, 80);

    world.destroy(e);
    assert!(world
        .try_get_slot::<Position>(e.index, e.generation)
        .is_none());
    assert!(world.try_get_slot::<Position>(9999, e.generation).is_none());
}

// --- ITERATION ---

#[test]
fn test_each_iterates_components() {
    let mut world = World::new();
    let a = world.create();
    let b = world.create();
    world.add(a, Health { hp: 5 });
    world.add(b, Health { hp: 7 });

    let mut sum = 0;
    let mut count = 0;
    world.each::<Health, _>(|_, h| {
        sum += h.hp;
        count += 1;
    });

    assert_eq!(count, 2);
    assert_eq!(sum, 12);
}

#[test]
fn test_each_skips_destroyed_entities() {
    let mut world = World::new();
    let a = world.create();
    let b = world.create();
    let c = world.create();

    world.add(a, Counter { value: 1 });
    world.add(b, Counter { value: 2 });
    world.add(c, Counter { value: 3 });

    world.destroy(b);

    let mut sum = 0;
    let mut count = 0;
    world.each::<Counter, _>(|_, ct| {
        sum += ct.value;
        count += 1;
    });

    assert_eq!(count, 2);
    assert_eq!(sum, 4);
}

#[test]
fn test_each_mut_updates_payloads() {
    let mut world = World::new();
    for i in 0..10 {
        let e = world.create();
        world.add(e, Counter { value: i });
    }

    world.each_mut::<Counter, _>(|_, ct| ct.value *= 2);

    let mut sum = 0;
    world.each::<Counter, _>(|_, ct| sum += ct.value);
    assert_eq!(sum, 90);
}

#[test]
fn test_each_passes_valid_handles() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Health { hp: 1 });

    world.each::<Health, _>(|visited, _| {
        assert_eq!(visited, e);
        assert!(world.is_alive(visited));
    });
}

// --- QUERY ---

#[test]
fn test_query_matches_required_component_set() {
    let mut world = World::new();

    let e1 = world.create();
    world.add(e1, Position { x: 1, y: 1 });

    let e2 = world.create();
    world.add(e2, Position { x: 2, y: 2 });
    world.add(e2, Health { hp: 10 });

    let e3 = world.create();
    world.add(e3, Health { hp: 20 });

    let e4 = world.create();
    world.add(e4, Position { x: 3, y: 3 });
    world.add(e4, Health { hp: 30 });
    world.add(e4, Velocity { vx: 4.0, vy: 4.0 });

    let mut count = 0;
    let mut sum = 0;
    world.query::<Position, (Health,), _>(|_, p, (h,)| {
        count += 1;
        sum += p.x + h.hp;
    });
    assert_eq!(count, 2);
    assert_eq!(sum, 45);

    world.query_mut::<Position, (Health,), _>(|_, _, (h,)| {
        h.hp += 1;
    });
    assert_eq!(world.get::<Health>(e2).hp, 11);
    assert_eq!(world.get::<Health>(e4).hp, 31);
    assert_eq!(world.get::<Health>(e3).hp, 20, "non-matching entity untouched");
}

#[test]
fn test_query_three_way_join() {
    let mut world = World::new();
    let full = world.create();
    world.add(full, Position { x: 1, y: 0 });
    world.add(full, Health { hp: 2 });
    world.add(full, Velocity { vx: 3.0, vy: 0.0 });

    let partial = world.create();
    world.add(partial, Position { x: 10, y: 0 });
    world.add(partial, Health { hp: 20 });

    let mut hits = Vec::new();
    world.query::<Position, (Health, Velocity), _>(|e, p, (h, v)| {
        hits.push((e, p.x, h.hp, v.vx));
    });
    assert_eq!(hits, vec![(full, 1, 2, 3.0)]);
}

#[test]
fn test_query_missing_rest_pool_yields_nothing() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });

    let mut count = 0;
    world.query::<Position, (Unused,), _>(|_, _, _| count += 1);
    assert_eq!(count, 0);
}

#[test]
fn test_query_missing_driver_pool_yields_nothing() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });

    let mut count = 0;
    world.query::<Unused, (Position,), _>(|_, _, _| count += 1);
    assert_eq!(count, 0);
}

#[test]
#[should_panic(expected = "must be unique")]
fn test_query_duplicate_component_types_rejected() {
    let world = World::new();
    world.query::<Position, (Position,), _>(|_, _, _| {});
}

// --- PREFABS ---

#[test]
fn test_instantiate_empty_prefab() {
    let mut world = World::new();
    let e = world.instantiate(());

    assert!(world.is_alive(e));
    assert!(!world.has::<Position>(e));
    assert!(!world.has::<Health>(e));
}

#[test]
fn test_instantiate_single_component_prefab() {
    let mut world = World::new();
    let e = world.instantiate(Health { hp: 42 });

    assert!(world.has::<Health>(e));
    assert!(!world.has::<Position>(e));
    assert_eq!(world.get::<Health>(e).hp, 42);
}

#[test]
fn test_instantiate_many_components() {
    let mut world = World::new();
    let e = world.instantiate((
        Position { x: 1, y: 2 },
        Health { hp: 100 },
        Velocity { vx: 3.0, vy: 4.0 },
    ));

    assert!(world.has::<Position>(e));
    assert!(world.has::<Health>(e));
    assert!(world.has::<Velocity>(e));
    assert_eq!(world.get::<Position>(e).y, 2);
    assert_eq!(world.get::<Health>(e).hp, 100);
    assert_eq!(world.get::<Velocity>(e).vx, 3.0);
    assert_invariants(&world);
}

#[test]
fn test_instantiate_yields_canonical_index_order() {
    let mut world = World::new();
    // Tuple order is unrelated to component-id order on purpose.
    let e = world.instantiate((
        Velocity { vx: 1.0, vy: 1.0 },
        Position { x: 2, y: 2 },
        Health { hp: 3 },
        Counter { value: 4 },
    ));

    let meta = world.store.get(e.index);
    let cids: Vec<_> = meta.components().iter().map(|(cid, _)| *cid).collect();
    let mut sorted = cids.clone();
    sorted.sort_unstable();
    assert_eq!(cids, sorted);
    assert_eq!(meta.idx.len(), 4);
    assert_invariants(&world);
}

// --- BULK COPY ---

#[test]
fn test_add_missing_components_copies_from_source() {
    let mut world = World::new();
    let src = world.create();
    let dst = world.create();

    world.add(src, Position { x: 10, y: 20 });
    world.add(src, Health { hp: 42 });
    world.add(dst, Position { x: 1, y: 2 });

    world.add_missing_components(dst, src);

    // Existing components are never overwritten; missing ones are copied.
    assert_eq!(*world.get::<Position>(dst), Position { x: 1, y: 2 });
    assert_eq!(world.get::<Health>(dst).hp, 42);
    assert_invariants(&world);
}

#[test]
fn test_add_missing_components_with_dead_entities_is_noop() {
    let mut world = World::new();
    let src = world.create();
    let dst = world.create();

    world.add(src, Position { x: 10, y: 20 });
    world.destroy(src);

    world.add_missing_components(dst, src);
    assert!(!world.has::<Position>(dst));
}

#[test]
fn test_add_missing_components_copies_values_independently() {
    let mut world = World::new();
    let src = world.create();
    let dst = world.create();

    world.add(src, Position { x: 1, y: 2 });
    world.add(src, Health { hp: 7 });
    world.add_missing_components(dst, src);

    world.get_mut::<Position>(src).x = 99;
    world.get_mut::<Health>(src).hp = 42;

    assert_eq!(world.get::<Position>(dst).x, 1);
    assert_eq!(world.get::<Health>(dst).hp, 7);
}

// --- SNAPSHOT / RESTORE ---

#[test]
fn test_snapshot_restore_roundtrip() {
    let mut world = World::new();
    let a = world.create();
    world.add(a, Position { x: 3, y: 4 });

    let snap = world.snapshot();

    let b = world.create();
    world.add(b, Health { hp: 11 });
    world.remove::<Position>(a);

    assert!(world.has::<Health>(b));
    assert!(!world.has::<Position>(a));

    world.restore(&snap);

    assert!(world.is_alive(a));
    assert!(!world.is_alive(b));
    assert_eq!(*world.get::<Position>(a), Position { x: 3, y: 4 });
    assert_invariants(&world);
}

#[test]
fn test_snapshot_preserves_entity_state() {
    let mut world = World::new();
    let e1 = world.create();
    let e2 = world.create();
    world.add(e1, Position { x: 10, y: 20 });
    world.add(e1, Health { hp: 50 });
    world.add(e2, Position { x: 30, y: 40 });

    let snap = world.snapshot();

    world.destroy(e1);
    let e3 = world.create();
    world.add(e3, Velocity { vx: 1.0, vy: 2.0 });
    world.get_mut::<Position>(e2).x = 999;

    world.restore(&snap);

    assert!(world.is_alive(e1));
    assert!(world.is_alive(e2));
    assert!(!world.is_alive(e3));
    assert_eq!(world.get::<Position>(e1).x, 10);
    assert_eq!(world.get::<Health>(e1).hp, 50);
    assert_eq!(world.get::<Position>(e2).x, 30);
}

#[test]
fn test_multiple_snapshots_are_independent() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Counter { value: 1 });

    let snap1 = world.snapshot();

    world.get_mut::<Counter>(e).value = 2;
    let snap2 = world.snapshot();

    world.get_mut::<Counter>(e).value = 3;

    world.restore(&snap1);
    assert_eq!(world.get::<Counter>(e).value, 1);

    world.restore(&snap2);
    assert_eq!(world.get::<Counter>(e).value, 2);
}

#[test]
fn test_restore_then_modify_leaves_snapshot_intact() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Health { hp: 100 });

    let snap = world.snapshot();

    world.get_mut::<Health>(e).hp = 50;
    world.restore(&snap);
    assert_eq!(world.get::<Health>(e).hp, 100);

    world.get_mut::<Health>(e).hp = 75;
    assert_eq!(world.get::<Health>(e).hp, 75);

    // The snapshot is still the pristine capture.
    world.restore(&snap);
    assert_eq!(world.get::<Health>(e).hp, 100);
}

#[test]
fn test_restore_keeps_entity_id_counter() {
    let mut world = World::new();
    let a = world.create();
    let snap = world.snapshot();

    let b = world.create();
    world.restore(&snap);

    let c = world.create();
    assert_eq!(c.id, b.id, "restore rewinds the id counter");
    assert!(c.id > a.id);
}

// --- PROXIES ---

#[test]
fn test_proxy_caches_component_access() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 5, y: 6 });

    let proxy = world.get_proxy(e).expect("live entity must yield a proxy");
    let pos = proxy.try_get::<Position>(&world).unwrap();
    assert_eq!(pos.x, 5);
    assert_eq!(pos.y, 6);

    proxy.try_get_mut::<Position>(&mut world).unwrap().x = 9;
    assert_eq!(world.get::<Position>(e).x, 9);

    world.remove::<Position>(e);
    assert!(proxy.try_get::<Position>(&world).is_none());
}

#[test]
fn test_proxy_recovers_after_remove_and_add() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });

    let proxy = world.get_proxy(e).unwrap();
    assert!(proxy.try_get::<Position>(&world).is_some());

    world.remove::<Position>(e);
    assert!(proxy.try_get::<Position>(&world).is_none());

    world.add(e, Position { x: 7, y: 8 });
    let pos = proxy.try_get::<Position>(&world).unwrap();
    assert_eq!(pos.x, 7);
    assert_eq!(pos.y, 8);
}

#[test]
fn test_proxy_invalidated_on_destroy() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });

    let proxy = world.get_proxy(e).unwrap();
    assert!(proxy.is_alive(&world));

    world.destroy(e);

    assert!(!proxy.is_alive(&world));
    assert!(proxy.try_get::<Position>(&world).is_none());
    assert!(proxy.entity().is_null());
    assert!(world.get_proxy(e).is_none());
}

#[test]
fn test_proxy_shared_across_get_proxy_calls() {
    let mut world = World::new();
    let e = world.create();

    let proxy1 = world.get_proxy(e).unwrap();
    let proxy2 = world.get_proxy(e).unwrap();
    assert!(Rc::ptr_eq(&proxy1, &proxy2));

    // A destroyed entity gets a fresh proxy on its next life.
    world.destroy(e);
    let e2 = world.create();
    let proxy3 = world.get_proxy(e2).unwrap();
    assert!(!Rc::ptr_eq(&proxy1, &proxy3));
}

#[test]
fn test_proxy_cache_survives_swap_erase() {
    let mut world = World::new();
    let a = world.create();
    let b = world.create();

    world.add(a, Health { hp: 10 });
    world.add(b, Health { hp: 20 });

    let proxy_b = world.get_proxy(b).unwrap();
    assert_eq!(proxy_b.try_get::<Health>(&world).unwrap().hp, 20);

    // Erasing a's entry moves b's entry into the vacated slot; the store
    // pushes the fresh address into the proxy.
    world.remove::<Health>(a);

    let through_proxy = proxy_b.try_get::<Health>(&world).unwrap();
    assert_eq!(through_proxy.hp, 20);
    let through_world = world.try_get::<Health>(b).unwrap();
    assert!(std::ptr::eq(through_proxy, through_world));
}

#[test]
fn test_proxy_selective_invalidation() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });
    world.add(e, Health { hp: 10 });

    let proxy = world.get_proxy(e).unwrap();
    assert!(proxy.try_get::<Position>(&world).is_some());
    assert!(proxy.try_get::<Health>(&world).is_some());

    world.remove::<Health>(e);

    assert!(proxy.try_get::<Health>(&world).is_none());
    let pos = proxy.try_get::<Position>(&world).unwrap();
    assert_eq!(*pos, Position { x: 1, y: 2 });

    world.remove::<Position>(e);
    assert!(proxy.try_get::<Position>(&world).is_none());
}

#[test]
fn test_proxy_invalidated_on_restore() {
    let mut world = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });

    let proxy = world.get_proxy(e).unwrap();
    assert!(proxy.try_get::<Position>(&world).is_some());

    let snap = world.snapshot();
    world.get_mut::<Position>(e).x = 99;
    world.restore(&snap);

    // Proxies cache pointers into the replaced storage; restore kills
    // them outright.
    assert!(!proxy.is_alive(&world));
    assert!(proxy.try_get::<Position>(&world).is_none());

    let proxy2 = world.get_proxy(e).unwrap();
    assert!(proxy2.is_alive(&world));
    let pos = proxy2.try_get::<Position>(&world).unwrap();
    assert_eq!(*pos, Position { x: 1, y: 2 });
}

#[test]
fn test_proxy_rejects_foreign_world() {
    let mut world = World::new();
    let mut other = World::new();
    let e = world.create();
    world.add(e, Position { x: 1, y: 2 });
    let _ = other.create();

    let proxy = world.get_proxy(e).unwrap();
    assert!(proxy.try_get::<Position>(&other).is_none());
    assert!(proxy.try_get::<Position>(&world).is_some());
}

// --- STRESS ---

#[derive(Default, Clone, Copy)]
struct Expected {
    alive: bool,
    has_pos: bool,
    has_hp: bool,
    has_vel: bool,
    pos: Position,
    hp: Health,
    vel: Velocity,
}

#[test]
fn test_stress_random_ops_against_model() {
    const ENTITY_COUNT: usize = 2000;
    const OPS: usize = 20000;

    let mut world = World::new();
    let mut entities = Vec::with_capacity(ENTITY_COUNT);
    let mut expected = vec![Expected::default(); ENTITY_COUNT];

    for slot in expected.iter_mut() {
        slot.alive = true;
    }
    for _ in 0..ENTITY_COUNT {
        entities.push(world.create());
    }

    let mut rng = 0x1234_5678u32;
    for _ in 0..OPS {
        let i = xorshift32(&mut rng) as usize % ENTITY_COUNT;
        let op = xorshift32(&mut rng) % 7;

        if !expected[i].alive {
            entities[i] = world.create();
            expected[i] = Expected {
                alive: true,
                ..Expected::default()
            };
        }
        let e = entities[i];

        match op {
            0 => {
                let x = (xorshift32(&mut rng) & 0xFF) as i32;
                let y = (xorshift32(&mut rng) & 0xFF) as i32;
                if expected[i].has_pos {
                    *world.get_mut::<Position>(e) = Position { x, y };
                } else {
                    world.add(e, Position { x, y });
                    expected[i].has_pos = true;
                }
                expected[i].pos = Position { x, y };
            }
            1 => {
                let hp = (xorshift32(&mut rng) & 0x3FF) as i32;
                if expected[i].has_hp {
                    world.get_mut::<Health>(e).hp = hp;
                } else {
                    world.add(e, Health { hp });
                    expected[i].has_hp = true;
                }
                expected[i].hp = Health { hp };
            }
            2 => {
                let vx = (xorshift32(&mut rng) & 0x7F) as f32;
                let vy = (xorshift32(&mut rng) & 0x7F) as f32;
                if expected[i].has_vel {
                    *world.get_mut::<Velocity>(e) = Velocity { vx, vy };
                } else {
                    world.add(e, Velocity { vx, vy });
                    expected[i].has_vel = true;
                }
                expected[i].vel = Velocity { vx, vy };
            }
            3 => {
                world.remove::<Position>(e);
                expected[i].has_pos = false;
            }
            4 => {
                world.remove::<Health>(e);
                expected[i].has_hp = false;
            }
            5 => {
                world.remove::<Velocity>(e);
                expected[i].has_vel = false;
            }
            _ => {
                world.destroy(e);
                expected[i] = Expected::default();
            }
        }

        if expected[i].alive {
            assert!(world.is_alive(e));
            assert_eq!(world.has::<Position>(e), expected[i].has_pos);
            assert_eq!(world.has::<Health>(e), expected[i].has_hp);
            assert_eq!(world.has::<Velocity>(e), expected[i].has_vel);
            if expected[i].has_pos {
                assert_eq!(*world.get::<Position>(e), expected[i].pos);
            }
            if expected[i].has_hp {
                assert_eq!(*world.get::<Health>(e), expected[i].hp);
            }
            if expected[i].has_vel {
                assert_eq!(*world.get::<Velocity>(e), expected[i].vel);
            }
        } else {
            assert!(!world.is_alive(e));
        }
    }

    // Pool populations must agree with the model.
    let mut pos_count = 0;
    let mut hp_count = 0;
    let mut vel_count = 0;
    world.each::<Position, _>(|_, _| pos_count += 1);
    world.each::<Health, _>(|_, _| hp_count += 1);
    world.each::<Velocity, _>(|_, _| vel_count += 1);

    let live = |f: fn(&Expected) -> bool| expected.iter().filter(|x| x.alive && f(x)).count();
    assert_eq!(pos_count, live(|x| x.has_pos));
    assert_eq!(hp_count, live(|x| x.has_hp));
    assert_eq!(vel_count, live(|x| x.has_vel));

    assert_invariants(&world);
}

#[test]
fn test_large_population_with_partial_destroy() {
    const N: i32 = 1000;

    let mut world = World::new();
    let mut entities = Vec::new();
    for i in 0..N {
        let e = world.create();
        world.add(e, Counter { value: i });
        entities.push(e);
    }

    for e in entities.iter().step_by(2) {
        world.destroy(*e);
    }

    let mut sum = 0;
    let mut count = 0;
    world.each::<Counter, _>(|_, ct| {
        sum += ct.value;
        count += 1;
    });

    assert_eq!(count, N / 2);
    let expected_sum: i32 = (1..N).step_by(2).sum();
    assert_eq!(sum, expected_sum);
    assert_invariants(&world);
}
