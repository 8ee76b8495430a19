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

//! Typed component pools and their type-erased surface.

use std::any::Any;
use std::ptr::NonNull;

use crate::ecs::component::Component;
use crate::ecs::dense::DenseArray;

/// Position of an entry inside a component pool.
pub type DenseIndex = u32;

/// A single pool entry: the owning entity's slot coordinates plus the
/// payload.
///
/// `generation` is captured at insertion time. Iteration re-checks it
/// against the owning slot, so entries whose slot has since died (and was
/// possibly reused) are silently skipped.
#[derive(Clone)]
pub(crate) struct ComponentEntry<T> {
    pub entity_index: u32,
    pub generation: u32,
    pub data: T,
}

/// Dense storage for every component of one type.
pub(crate) struct Pool<T: Component> {
    pub entries: DenseArray<ComponentEntry<T>>,
}

impl<T: Component> Pool<T> {
    pub fn new() -> Self {
        Self {
            entries: DenseArray::new(),
        }
    }

    /// Appends an entry tagged with its owner and returns its dense index.
    pub fn emplace(&mut self, entity_index: u32, generation: u32, data: T) -> DenseIndex {
        self.entries.push(ComponentEntry {
            entity_index,
            generation,
            data,
        }) as DenseIndex
    }
}

/// The owner of an entry that a swap-erase relocated.
pub(crate) struct MovedEntry {
    pub entity_index: u32,
    pub generation: u32,
}

/// Object-safe surface the world uses to drive a pool without knowing its
/// element type: swap-erase, clone-one-entry, address-of-entry, and deep
/// clone, plus `Any` casts to recover the typed pool.
pub(crate) trait AnyPool {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Swap-erases the entry at `di`: the last entry is moved into the
    /// vacated slot and the pool shrinks by one. If an entry actually
    /// moved, returns its owner so the caller can patch that entity's
    /// dense-index vector and proxy.
    fn swap_erase(&mut self, di: DenseIndex) -> Option<MovedEntry>;

    /// Appends a deep copy of the entry at `src`, retagged with the
    /// destination owner. Returns the new dense index.
    fn clone_entry(&mut self, entity_index: u32, generation: u32, src: DenseIndex) -> DenseIndex;

    /// Type-erased address of the entry at `di`, for proxy caches.
    fn entry_addr(&mut self, di: DenseIndex) -> NonNull<u8>;

    /// Deep copy of the whole pool, for snapshots.
    fn boxed_clone(&self) -> Box<dyn AnyPool>;

    /// Number of entries, including ones owned by since-destroyed slots.
    fn len(&self) -> usize;
}

impl<T: Component> AnyPool for Pool<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn swap_erase(&mut self, di: DenseIndex) -> Option<MovedEntry> {
        let last = self.entries.len() - 1;
        let tail = self.entries.pop().expect("swap_erase on an empty pool");
        if di as usize == last {
            // The victim was the tail; nothing moved.
            return None;
        }
        let slot = self.entries.get_mut(di as usize);
        *slot = tail;
        Some(MovedEntry {
            entity_index: slot.entity_index,
            generation: slot.generation,
        })
    }

    fn clone_entry(&mut self, entity_index: u32, generation: u32, src: DenseIndex) -> DenseIndex {
        let data = self.entries.get(src as usize).data.clone();
        self.emplace(entity_index, generation, data)
    }

    fn entry_addr(&mut self, di: DenseIndex) -> NonNull<u8> {
        NonNull::from(self.entries.get_mut(di as usize)).cast()
    }

    fn boxed_clone(&self) -> Box<dyn AnyPool> {
        Box::new(Pool {
            entries: self.entries.clone(),
        })
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
