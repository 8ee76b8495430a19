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

use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use agora_core::ecs::entity::{Entity, GEN_ALIVE_BIT, GEN_MASK};

use crate::ecs::bitset::Signature;
use crate::ecs::component::Component;
use crate::ecs::entity_store::{EntityMeta, EntityStore};
use crate::ecs::pool::{AnyPool, ComponentEntry, DenseIndex, MovedEntry, Pool};
use crate::ecs::prefab::Prefab;
use crate::ecs::proxy::EntityProxy;
use crate::ecs::query::QueryRest;
use crate::ecs::registry::{component_id, ComponentId, MAX_COMPONENTS};
use crate::ecs::snapshot::{clone_pools, Snapshot};

/// Distinguishes worlds so a proxy cannot be used against a world it does
/// not belong to.
static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// The central container of the ECS, holding all entities and components.
///
/// The world owns one slotted entity store and one dense pool per
/// component type, and maintains the central invariant: for every live
/// entity, the signature's set bits and the compact dense-index vector
/// describe the same components in ascending component-id order, and each
/// referenced pool entry is tagged with that entity's slot coordinates.
///
/// A world is a single-threaded value: exactly one mutator at a time, any
/// number of readers between mutations.
pub struct World {
    pub(crate) store: EntityStore,
    /// One optional pool per component id; a pool is created lazily the
    /// first time a component of that type is added anywhere.
    pub(crate) pools: Vec<Option<Box<dyn AnyPool>>>,
    next_entity_id: u64,
    world_id: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates a new, empty world.
    pub fn new() -> Self {
        let mut pools = Vec::with_capacity(MAX_COMPONENTS);
        pools.resize_with(MAX_COMPONENTS, || None);
        Self {
            store: EntityStore::new(),
            pools,
            next_entity_id: 0,
            world_id: NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.world_id
    }

    // --- entity lifecycle ---------------------------------------------

    /// Creates a new entity with no components.
    ///
    /// Recycled slots come back with an advanced generation, so handles to
    /// the previous occupant keep failing validation. The returned
    /// handle's `id` is strictly greater than every id this world handed
    /// out before.
    pub fn create(&mut self) -> Entity {
        let index = self.store.alloc();
        self.next_entity_id += 1;
        let id = self.next_entity_id;
        let meta = self.store.get_mut(index);
        meta.id = id;
        meta.index = index;
        meta.generation = (meta.generation & GEN_MASK) | GEN_ALIVE_BIT;
        meta.sig.clear();
        meta.idx.clear();
        meta.handle()
    }

    /// Destroys `entity`, erasing every component it owns. A stale handle
    /// is a silent no-op.
    pub fn destroy(&mut self, entity: Entity) {
        if self.validate(entity).is_none() {
            return;
        }

        // Sever the proxy first; it must not observe the teardown.
        let meta = self.store.get_mut(entity.index);
        if let Some(proxy) = meta.proxy.upgrade() {
            proxy.mark_dead();
        }
        meta.proxy = Weak::new();

        // Erase in ascending component order, reading positions from the
        // dense-index vector in lockstep with the signature bits.
        let removals = meta.components();
        for (cid, di) in removals {
            self.erase_from_pool(cid, di);
        }

        let meta = self.store.get_mut(entity.index);
        meta.sig.clear();
        meta.idx.clear();
        // The counter wraps within 31 bits; the alive flag is masked off.
        meta.generation = meta.generation.wrapping_add(1) & GEN_MASK;
        self.store.free(entity.index);
    }

    /// True if `entity` passes full validation: index in range, alive flag
    /// set, generation word equal, and world-unique id equal. All three
    /// fields must match; two are not enough.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.validate(entity).is_some()
    }

    /// Reconstructs a full handle from a slot coordinate pair, for compact
    /// references that do not carry the 64-bit id.
    ///
    /// Returns [`Entity::NULL`] when the index is out of range, the slot
    /// is dead, or the generation mismatches.
    pub fn resolve_slot(&self, index: u32, generation: u32) -> Entity {
        if index as usize >= self.store.len() {
            return Entity::NULL;
        }
        let meta = self.store.get(index);
        if !meta.is_alive() || meta.generation != generation {
            return Entity::NULL;
        }
        Entity {
            id: meta.id,
            index,
            generation,
        }
    }

    // --- component attach / detach ------------------------------------

    /// Attaches `value` to `entity` and returns a mutable reference to the
    /// stored payload.
    ///
    /// Adding a component the entity already has keeps the existing
    /// payload untouched (the incoming value is dropped) and returns the
    /// stored one; adding twice never reconstructs.
    ///
    /// # Panics
    ///
    /// Panics on a stale handle. Passing a dead entity here is a
    /// programmer error, unlike the soft paths (`remove`, `try_get`).
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> &mut T {
        let cid = component_id::<T>();
        let meta = self
            .validate_mut(entity)
            .expect("World::add called with a stale entity handle");

        if meta.sig.test(cid) {
            let di = meta.idx[meta.sig.rank(cid)];
            let pool = self.pool_mut::<T>();
            return &mut pool.entries.get_mut(di as usize).data;
        }

        let pos = meta.sig.rank(cid);
        meta.sig.set(cid);
        let proxy = meta.proxy.clone();

        let pool = self.pool_mut::<T>();
        let di = pool.emplace(entity.index, entity.generation, value);
        let addr = std::ptr::NonNull::from(pool.entries.get_mut(di as usize)).cast();

        let meta = self.store.get_mut(entity.index);
        meta.idx.insert(pos, di);
        if let Some(proxy) = proxy.upgrade() {
            proxy.cache_entry(cid, addr);
        }

        let pool = self.pool_mut::<T>();
        &mut pool.entries.get_mut(di as usize).data
    }

    /// Detaches component `T` from `entity`. A missing component or a
    /// stale handle is a no-op.
    pub fn remove<T: Component>(&mut self, entity: Entity) {
        let cid = component_id::<T>();
        let Some(meta) = self.validate_mut(entity) else {
            return;
        };
        if !meta.sig.test(cid) {
            return;
        }
        let pos = meta.sig.rank(cid);
        let di = meta.idx[pos];

        self.erase_from_pool(cid, di);

        let meta = self.store.get_mut(entity.index);
        meta.idx.remove(pos);
        meta.sig.reset(cid);
        if let Some(proxy) = meta.proxy.upgrade() {
            proxy.mark_missing(cid);
        }
    }

    /// Copies every component `src` has and `dst` lacks onto `dst`,
    /// leaving components already present on `dst` untouched. Either
    /// handle being stale is a no-op.
    pub fn add_missing_components(&mut self, dst: Entity, src: Entity) {
        if self.validate(dst).is_none() {
            return;
        }
        let Some(src_meta) = self.validate(src) else {
            return;
        };

        let source = src_meta.components();
        for (cid, src_di) in source {
            let meta = self.store.get(dst.index);
            if meta.sig.test(cid) {
                continue;
            }
            let pos = meta.sig.rank(cid);

            let Some(pool) = self.pools[cid as usize].as_mut() else {
                continue;
            };
            let di = pool.clone_entry(dst.index, dst.generation, src_di);
            let addr = pool.entry_addr(di);

            let meta = self.store.get_mut(dst.index);
            meta.sig.set(cid);
            meta.idx.insert(pos, di);
            if let Some(proxy) = meta.proxy.upgrade() {
                proxy.cache_entry(cid, addr);
            }
        }
    }

    // --- component access ---------------------------------------------

    /// True if `entity` is live and carries component `T`.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.validate(entity)
            .map_or(false, |meta| meta.sig.test(component_id::<T>()))
    }

    /// Shared access to `entity`'s component `T`, or `None` when the
    /// handle is stale or the component absent.
    pub fn try_get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.entry_ref::<T>(entity).map(|entry| &entry.data)
    }

    /// Mutable flavour of [`World::try_get`].
    pub fn try_get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.entry_mut::<T>(entity).map(|entry| &mut entry.data)
    }

    /// Shared access to a component that must be present.
    ///
    /// # Panics
    ///
    /// Panics when the handle is stale or the component is absent; use
    /// [`World::try_get`] for the soft path.
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        self.try_get::<T>(entity)
            .expect("World::get on a missing component")
    }

    /// Mutable flavour of [`World::get`].
    ///
    /// # Panics
    ///
    /// Panics when the handle is stale or the component is absent.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        self.try_get_mut::<T>(entity)
            .expect("World::get_mut on a missing component")
    }

    /// Like [`World::try_get`], but addresses the entity by
    /// `(index, generation)` only, skipping the id check. For compact
    /// references cached inside components.
    pub fn try_get_slot<T: Component>(&self, index: u32, generation: u32) -> Option<&T> {
        if index as usize >= self.store.len() {
            return None;
        }
        let meta = self.store.get(index);
        if !meta.is_alive() || meta.generation != generation {
            return None;
        }
        let cid = component_id::<T>();
        if !meta.sig.test(cid) {
            return None;
        }
        let di = meta.idx[meta.sig.rank(cid)];
        let pool = self.pool_ref::<T>()?;
        Some(&pool.entries.get(di as usize).data)
    }

    /// Mutable flavour of [`World::try_get_slot`].
    pub fn try_get_slot_mut<T: Component>(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        if index as usize >= self.store.len() {
            return None;
        }
        let meta = self.store.get(index);
        if !meta.is_alive() || meta.generation != generation {
            return None;
        }
        let cid = component_id::<T>();
        if !meta.sig.test(cid) {
            return None;
        }
        let di = meta.idx[meta.sig.rank(cid)];
        let pool = self.pools[cid as usize]
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<Pool<T>>()?;
        Some(&mut pool.entries.get_mut(di as usize).data)
    }

    /// Full pool entry for `T`, used by proxies to cache owner-tagged
    /// addresses.
    pub(crate) fn entry_ref<T: Component>(&self, entity: Entity) -> Option<&ComponentEntry<T>> {
        let meta = self.validate(entity)?;
        let cid = component_id::<T>();
        if !meta.sig.test(cid) {
            return None;
        }
        let di = meta.idx[meta.sig.rank(cid)];
        let pool = self.pool_ref::<T>()?;
        Some(pool.entries.get(di as usize))
    }

    /// Mutable flavour of [`World::entry_ref`].
    pub(crate) fn entry_mut<T: Component>(
        &mut self,
        entity: Entity,
    ) -> Option<&mut ComponentEntry<T>> {
        let meta = self.validate(entity)?;
        let cid = component_id::<T>();
        if !meta.sig.test(cid) {
            return None;
        }
        let di = meta.idx[meta.sig.rank(cid)];
        let pool = self.pools[cid as usize]
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<Pool<T>>()?;
        Some(pool.entries.get_mut(di as usize))
    }

    // --- iteration ----------------------------------------------------

    /// Visits every live entity owning component `T`, in pool insertion
    /// order.
    ///
    /// Entries whose slot died (or was reused) since insertion are
    /// silently skipped. The pool length is captured before the loop, and
    /// the world stays borrowed for its duration, so the callback cannot
    /// change the population being iterated; entries appended by other
    /// means would not be visited in the same pass.
    pub fn each<T: Component, F: FnMut(Entity, &T)>(&self, mut f: F) {
        let Some(pool) = self.pool_ref::<T>() else {
            return;
        };
        let count = pool.entries.len();
        for di in 0..count {
            let entry = pool.entries.get(di);
            let meta = self.store.get(entry.entity_index);
            if !meta.is_alive() || meta.generation != entry.generation {
                continue;
            }
            f(
                Entity {
                    id: meta.id,
                    index: entry.entity_index,
                    generation: entry.generation,
                },
                &entry.data,
            );
        }
    }

    /// Mutable flavour of [`World::each`].
    pub fn each_mut<T: Component, F: FnMut(Entity, &mut T)>(&mut self, mut f: F) {
        let cid = component_id::<T>() as usize;
        let store = &self.store;
        let Some(slot) = self.pools[cid].as_mut() else {
            return;
        };
        let pool = slot
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
            .expect("pool type mismatch for component id");
        let count = pool.entries.len();
        for di in 0..count {
            let entry = pool.entries.get_mut(di);
            let meta = store.get(entry.entity_index);
            if !meta.is_alive() || meta.generation != entry.generation {
                continue;
            }
            f(
                Entity {
                    id: meta.id,
                    index: entry.entity_index,
                    generation: entry.generation,
                },
                &mut entry.data,
            );
        }
    }

    /// Visits every live entity owning `T0` and every component of the
    /// rest tuple `R`, driving iteration over `T0`'s pool and filtering by
    /// signature. Yields nothing if any required pool has never been
    /// created.
    ///
    /// The queried component set must be unique; duplicates are rejected
    /// at run time.
    pub fn query<'w, T0, R, F>(&'w self, mut f: F)
    where
        T0: Component,
        R: QueryRest<'w>,
        F: FnMut(Entity, &'w T0, R::Refs),
    {
        let driver = component_id::<T0>();
        let mut required = Signature::default();
        required.set(driver);
        R::mark(&mut required);
        assert_eq!(
            required.popcount(),
            1 + R::ARITY,
            "query component types must be unique"
        );

        let Some(pool) = self.pool_ref::<T0>() else {
            return;
        };
        let Some(access) = R::acquire(self) else {
            return;
        };

        let count = pool.entries.len();
        for di in 0..count {
            let entry = pool.entries.get(di);
            let meta = self.store.get(entry.entity_index);
            if !meta.is_alive() || meta.generation != entry.generation {
                continue;
            }
            if !meta.sig.contains_all(&required) {
                continue;
            }
            let entity = Entity {
                id: meta.id,
                index: entry.entity_index,
                generation: entry.generation,
            };
            // SAFETY: `meta` satisfies the required signature, so every
            // rest lookup resolves to a valid dense index in a pool
            // captured from this world borrow.
            let rest = unsafe { R::fetch(access, meta) };
            f(entity, &entry.data, rest);
        }
    }

    /// Mutable flavour of [`World::query`]: the callback receives the
    /// driver component and each rest component mutably.
    pub fn query_mut<'w, T0, R, F>(&'w mut self, mut f: F)
    where
        T0: Component,
        R: QueryRest<'w>,
        F: FnMut(Entity, &'w mut T0, R::Muts),
    {
        let driver = component_id::<T0>();
        let mut required = Signature::default();
        required.set(driver);
        R::mark(&mut required);
        assert_eq!(
            required.popcount(),
            1 + R::ARITY,
            "query component types must be unique"
        );

        if self.pools[driver as usize].is_none() {
            return;
        }
        let Some(access) = R::acquire(self) else {
            return;
        };

        // The driver pool is iterated through a raw pointer while the rest
        // pools are reached through the access captured above. The
        // uniqueness assert guarantees all of these are distinct entries
        // of `self.pools`, and the store is a separate field, so no datum
        // is reachable twice.
        let store = &self.store;
        let pool_ptr: *mut Pool<T0> = self.pools[driver as usize]
            .as_mut()
            .unwrap()
            .as_any_mut()
            .downcast_mut::<Pool<T0>>()
            .expect("pool type mismatch for component id");

        // SAFETY: `pool_ptr` came from the exclusive borrow above and is
        // only used while it is the sole handle to that pool.
        let count = unsafe { (*pool_ptr).entries.len() };
        for di in 0..count {
            // SAFETY: each dense index is visited exactly once, so the
            // mutable references handed to the callback never alias.
            let entry = unsafe { (*pool_ptr).entries.get_mut(di) };
            let meta = store.get(entry.entity_index);
            if !meta.is_alive() || meta.generation != entry.generation {
                continue;
            }
            if !meta.sig.contains_all(&required) {
                continue;
            }
            let entity = Entity {
                id: meta.id,
                index: entry.entity_index,
                generation: entry.generation,
            };
            // SAFETY: as in `query`, plus exclusivity established above.
            let rest = unsafe { R::fetch_mut(access, meta) };
            f(entity, &mut entry.data, rest);
        }
    }

    // --- prefabs ------------------------------------------------------

    /// Creates an entity and attaches the prefab's components in one pass.
    ///
    /// Bundle entries are sorted by component id before insertion, which
    /// yields the canonical signature/index ordering directly.
    ///
    /// # Panics
    ///
    /// Panics if the prefab contains duplicate component types.
    pub fn instantiate<P: Prefab>(&mut self, prefab: P) -> Entity {
        let entity = self.create();
        prefab.spawn_into(self, entity);
        entity
    }

    // --- proxies ------------------------------------------------------

    /// Returns the shared proxy for `entity`, creating it on first
    /// request; `None` for a stale handle.
    ///
    /// While the entity stays alive, every call returns the same proxy.
    pub fn get_proxy(&mut self, entity: Entity) -> Option<Rc<EntityProxy>> {
        self.validate(entity)?;
        let world_id = self.world_id;
        let meta = self.store.get_mut(entity.index);
        if let Some(existing) = meta.proxy.upgrade() {
            return Some(existing);
        }
        let proxy = Rc::new(EntityProxy::new(world_id, entity));
        meta.proxy = Rc::downgrade(&proxy);
        Some(proxy)
    }

    // --- snapshots ----------------------------------------------------

    /// Deep-copies every slot, every pool, and the id counter into an
    /// opaque [`Snapshot`]. Proxies are not captured.
    pub fn snapshot(&self) -> Snapshot {
        let entries: usize = self.pools.iter().flatten().map(|pool| pool.len()).sum();
        log::trace!(
            "capturing world snapshot ({} entity slots, {} component entries)",
            self.store.len(),
            entries
        );
        Snapshot {
            store: self.store.snapshot_clone(),
            pools: clone_pools(&self.pools),
            next_entity_id: self.next_entity_id,
        }
    }

    /// Replaces the world's state with a deep copy of `snapshot`.
    ///
    /// Every live proxy is marked dead first: proxies cache addresses into
    /// the storage being replaced. The snapshot itself is untouched and
    /// can be restored from again.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        for index in 0..self.store.len() as u32 {
            let meta = self.store.get_mut(index);
            if let Some(proxy) = meta.proxy.upgrade() {
                proxy.mark_dead();
            }
            meta.proxy = Weak::new();
        }
        self.store = snapshot.store.snapshot_clone();
        self.pools = clone_pools(&snapshot.pools);
        self.next_entity_id = snapshot.next_entity_id;
        log::debug!("restored world snapshot ({} entity slots)", self.store.len());
    }

    // --- internals ----------------------------------------------------

    fn validate(&self, entity: Entity) -> Option<&EntityMeta> {
        if entity.index as usize >= self.store.len() {
            return None;
        }
        let meta = self.store.get(entity.index);
        if !meta.is_alive() || meta.generation != entity.generation || meta.id != entity.id {
            return None;
        }
        Some(meta)
    }

    fn validate_mut(&mut self, entity: Entity) -> Option<&mut EntityMeta> {
        if entity.index as usize >= self.store.len() {
            return None;
        }
        let meta = self.store.get_mut(entity.index);
        if !meta.is_alive() || meta.generation != entity.generation || meta.id != entity.id {
            return None;
        }
        Some(meta)
    }

    /// Typed pool for `T`, created on first use.
    pub(crate) fn pool_mut<T: Component>(&mut self) -> &mut Pool<T> {
        let cid = component_id::<T>() as usize;
        let slot = &mut self.pools[cid];
        if slot.is_none() {
            *slot = Some(Box::new(Pool::<T>::new()));
        }
        slot.as_mut()
            .unwrap()
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
            .expect("pool type mismatch for component id")
    }

    /// Typed pool for `T`, if any component of that type was ever added.
    pub(crate) fn pool_ref<T: Component>(&self) -> Option<&Pool<T>> {
        let cid = component_id::<T>() as usize;
        self.pools[cid]
            .as_ref()
            .and_then(|pool| pool.as_any().downcast_ref::<Pool<T>>())
    }

    /// Swap-erases `di` from `cid`'s pool and patches whatever entity's
    /// entry was moved into the vacated slot.
    fn erase_from_pool(&mut self, cid: ComponentId, di: DenseIndex) {
        let Some(pool) = self.pools[cid as usize].as_mut() else {
            return;
        };
        if let Some(moved) = pool.swap_erase(di) {
            self.patch_moved(cid, di, moved);
        }
    }

    /// After a swap-erase moved an entry to `di`, repoints the owning
    /// entity's dense-index vector at the new position and refreshes its
    /// proxy cache. Owners whose slot died since insertion are skipped.
    fn patch_moved(&mut self, cid: ComponentId, di: DenseIndex, moved: MovedEntry) {
        if moved.entity_index as usize >= self.store.len() {
            return;
        }
        let meta = self.store.get_mut(moved.entity_index);
        if !meta.is_alive() || meta.generation != moved.generation {
            return;
        }
        let pos = meta.sig.rank(cid);
        if pos < meta.idx.len() {
            meta.idx[pos] = di;
        }
        let proxy = meta.proxy.clone();
        if let Some(proxy) = proxy.upgrade() {
            let addr = self.pools[cid as usize]
                .as_mut()
                .expect("pool exists for a moved entry")
                .entry_addr(di);
            proxy.cache_entry(cid, addr);
        }
    }
}
