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

//! Cached entity handles maintained by store-side notifications.

use std::cell::Cell;
use std::ptr::NonNull;

use agora_core::ecs::entity::Entity;

use crate::ecs::component::Component;
use crate::ecs::pool::ComponentEntry;
use crate::ecs::registry::{component_id, ComponentId, MAX_COMPONENTS};
use crate::ecs::world::World;

/// One cache slot per component id.
#[derive(Clone, Copy)]
enum CacheSlot {
    /// Never resolved, or invalidated since; the next access asks the
    /// world.
    Unknown,
    /// Known absent; the next access returns `None` without asking.
    Missing,
    /// Address of the pool entry, verified against the handle on use.
    Cached(NonNull<u8>),
}

/// A shared, cached handle to one entity.
///
/// A proxy memoizes the address of every component entry it has resolved.
/// The world keeps a weak back-reference to it and pushes notifications
/// whenever a component is added, removed, relocated by a swap-erase, or
/// the entity dies, so cached addresses never dangle while the entity
/// stays alive. The steady-state lookup cost is one pointer load and one
/// owner-tag compare.
///
/// Accessors take the owning [`World`] explicitly; returned references
/// borrow it, which keeps mutation and cached-pointer reads from ever
/// overlapping. A proxy handed a world it does not belong to returns
/// `None`.
pub struct EntityProxy {
    world_id: u64,
    entity: Cell<Entity>,
    alive: Cell<bool>,
    cache: [Cell<CacheSlot>; MAX_COMPONENTS],
}

impl EntityProxy {
    pub(crate) fn new(world_id: u64, entity: Entity) -> Self {
        Self {
            world_id,
            entity: Cell::new(entity),
            alive: Cell::new(true),
            cache: std::array::from_fn(|_| Cell::new(CacheSlot::Unknown)),
        }
    }

    /// The handle this proxy tracks (the null handle once the entity died).
    pub fn entity(&self) -> Entity {
        self.entity.get()
    }

    /// True while the proxied entity is alive in `world`.
    pub fn is_alive(&self, world: &World) -> bool {
        self.alive.get() && world.is_alive(self.entity.get())
    }

    /// Cached lookup of component `T`.
    ///
    /// Resolution order: dead proxy or foreign world return `None`; a
    /// cached missing sentinel returns `None`; a cached entry whose owner
    /// tag still matches returns its payload; anything else falls through
    /// to the world, and the outcome is cached.
    pub fn try_get<'w, T: Component>(&self, world: &'w World) -> Option<&'w T> {
        if !self.alive.get() || world.id() != self.world_id {
            return None;
        }
        let cid = component_id::<T>();
        match self.cache[cid as usize].get() {
            CacheSlot::Missing => None,
            CacheSlot::Cached(ptr) => {
                // SAFETY: cached addresses always point at a constructed
                // entry of this world's pool for `T`: the world re-caches
                // on swap-erase moves, marks the slot missing on removal,
                // kills the proxy on destroy/restore, and pool blocks
                // never move. The owner-tag check below rejects an entry
                // that a different entity now occupies.
                let entry = unsafe { ptr.cast::<ComponentEntry<T>>().as_ref() };
                let e = self.entity.get();
                if entry.entity_index == e.index && entry.generation == e.generation {
                    Some(&entry.data)
                } else {
                    self.resolve::<T>(world, cid)
                }
            }
            CacheSlot::Unknown => self.resolve::<T>(world, cid),
        }
    }

    /// Mutable flavour of [`EntityProxy::try_get`].
    pub fn try_get_mut<'w, T: Component>(&self, world: &'w mut World) -> Option<&'w mut T> {
        if !self.alive.get() || world.id() != self.world_id {
            return None;
        }
        let cid = component_id::<T>();
        match self.cache[cid as usize].get() {
            CacheSlot::Missing => None,
            CacheSlot::Cached(ptr) => {
                // SAFETY: as in `try_get`; the exclusive world borrow makes
                // the mutable reborrow of the entry unique.
                let entry = unsafe { &mut *ptr.cast::<ComponentEntry<T>>().as_ptr() };
                let e = self.entity.get();
                if entry.entity_index == e.index && entry.generation == e.generation {
                    Some(&mut entry.data)
                } else {
                    self.resolve_mut::<T>(world, cid)
                }
            }
            CacheSlot::Unknown => self.resolve_mut::<T>(world, cid),
        }
    }

    /// Like [`EntityProxy::try_get`], but the component must be present.
    ///
    /// # Panics
    ///
    /// Panics when the entity is dead or the component absent.
    pub fn get<'w, T: Component>(&self, world: &'w World) -> &'w T {
        self.try_get::<T>(world)
            .expect("EntityProxy::get on a missing component")
    }

    /// True if the proxied entity currently has component `T`. Populates
    /// the cache as a side effect.
    pub fn has<T: Component>(&self, world: &World) -> bool {
        self.try_get::<T>(world).is_some()
    }

    fn resolve<'w, T: Component>(&self, world: &'w World, cid: ComponentId) -> Option<&'w T> {
        match world.entry_ref::<T>(self.entity.get()) {
            Some(entry) => {
                self.cache[cid as usize].set(CacheSlot::Cached(NonNull::from(entry).cast()));
                Some(&entry.data)
            }
            None => {
                self.cache[cid as usize].set(CacheSlot::Missing);
                None
            }
        }
    }

    fn resolve_mut<'w, T: Component>(
        &self,
        world: &'w mut World,
        cid: ComponentId,
    ) -> Option<&'w mut T> {
        match world.entry_mut::<T>(self.entity.get()) {
            Some(entry) => {
                self.cache[cid as usize].set(CacheSlot::Cached(NonNull::from(&mut *entry).cast()));
                Some(&mut entry.data)
            }
            None => {
                self.cache[cid as usize].set(CacheSlot::Missing);
                None
            }
        }
    }

    // --- store-side notifications -------------------------------------

    /// Component added or relocated: cache its fresh address.
    pub(crate) fn cache_entry(&self, cid: ComponentId, addr: NonNull<u8>) {
        self.cache[cid as usize].set(CacheSlot::Cached(addr));
    }

    /// Component removed: remember the absence.
    pub(crate) fn mark_missing(&self, cid: ComponentId) {
        self.cache[cid as usize].set(CacheSlot::Missing);
    }

    /// Forget every cached slot; the next accesses consult the world.
    pub(crate) fn invalidate_all(&self) {
        for slot in &self.cache {
            slot.set(CacheSlot::Unknown);
        }
    }

    /// Entity destroyed (or world restored): the proxy goes permanently
    /// dead.
    pub(crate) fn mark_dead(&self) {
        self.invalidate_all();
        self.alive.set(false);
        self.entity.set(Entity::NULL);
    }
}
