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

//! Entity slot storage and index recycling.

use std::rc::Weak;

use agora_core::ecs::entity::{Entity, GEN_ALIVE_BIT};
use smallvec::SmallVec;

use crate::ecs::bitset::Signature;
use crate::ecs::dense::DenseArray;
use crate::ecs::pool::DenseIndex;
use crate::ecs::proxy::EntityProxy;
use crate::ecs::registry::ComponentId;

/// Sentinel index marking the end of the free list.
pub(crate) const INVALID_INDEX: u32 = u32::MAX;

/// Per-slot entity record.
///
/// While the slot is dead its `id` field is reinterpreted as the index of
/// the next free slot, threading the free list through the storage itself.
pub struct EntityMeta {
    pub id: u64,
    pub index: u32,
    pub generation: u32,
    pub sig: Signature,
    /// Dense indices of this entity's components, kept in ascending
    /// component-id order in lockstep with `sig`: the index for component
    /// `c` sits at position `sig.rank(c)`. Typical entities carry few
    /// components, so a handful live inline without heap traffic.
    pub idx: SmallVec<[DenseIndex; 4]>,
    /// Back-reference to the shared proxy, if an external holder created
    /// one. Never carried into snapshots.
    pub proxy: Weak<EntityProxy>,
}

impl EntityMeta {
    fn fresh(index: u32) -> Self {
        Self {
            id: 0,
            index,
            generation: 1,
            sig: Signature::default(),
            idx: SmallVec::new(),
            proxy: Weak::new(),
        }
    }

    /// True while the slot's alive flag is set.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.generation & GEN_ALIVE_BIT != 0
    }

    /// The full handle for this slot.
    pub fn handle(&self) -> Entity {
        Entity {
            id: self.id,
            index: self.index,
            generation: self.generation,
        }
    }

    /// Pairs of `(component id, dense index)` in ascending component-id
    /// order, read from `sig` and `idx` in lockstep.
    pub fn components(&self) -> Vec<(ComponentId, DenseIndex)> {
        let mut out = Vec::with_capacity(self.idx.len());
        let mut pos = 0;
        self.sig.for_each_set(|cid| {
            out.push((cid, self.idx[pos]));
            pos += 1;
        });
        out
    }

    /// Copy used by snapshots: everything but the proxy back-reference.
    fn snapshot_clone(&self) -> Self {
        Self {
            id: self.id,
            index: self.index,
            generation: self.generation,
            sig: self.sig,
            idx: self.idx.clone(),
            proxy: Weak::new(),
        }
    }
}

/// Slotted allocator of entity records with a free list.
///
/// Slots are constructed lazily and never deallocated; a destroyed
/// entity's slot goes onto the free list and is handed back by the next
/// allocation, its generation already advanced by the world so stale
/// handles fail validation.
pub(crate) struct EntityStore {
    slots: DenseArray<EntityMeta>,
    free_head: u32,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            slots: DenseArray::new(),
            free_head: INVALID_INDEX,
        }
    }

    /// Number of slots ever allocated, live and dead.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Pops a slot off the free list, or lazily constructs a new one.
    pub fn alloc(&mut self) -> u32 {
        if self.free_head != INVALID_INDEX {
            let index = self.free_head;
            self.free_head = self.slots.get(index as usize).id as u32;
            return index;
        }
        let index = self.slots.len() as u32;
        self.slots.push(EntityMeta::fresh(index));
        index
    }

    /// Pushes `index` onto the free list. The caller has already advanced
    /// the slot's generation; this only rethreads the `id` field.
    pub fn free(&mut self, index: u32) {
        let meta = self.slots.get_mut(index as usize);
        meta.id = u64::from(self.free_head);
        self.free_head = index;
    }

    #[inline]
    pub fn get(&self, index: u32) -> &EntityMeta {
        self.slots.get(index as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> &mut EntityMeta {
        self.slots.get_mut(index as usize)
    }

    /// Deep copy with every proxy back-reference cleared; the free list
    /// comes across intact.
    pub fn snapshot_clone(&self) -> Self {
        let mut slots = DenseArray::new();
        for i in 0..self.slots.len() {
            slots.push(self.slots.get(i).snapshot_clone());
        }
        Self {
            slots,
            free_head: self.free_head,
        }
    }
}
