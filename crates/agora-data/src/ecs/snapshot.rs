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

//! Whole-world snapshots.

use crate::ecs::entity_store::EntityStore;
use crate::ecs::pool::AnyPool;

/// An opaque deep copy of a world's state: every entity slot (free list
/// included), every component pool, and the entity id counter.
///
/// Snapshots are independent of the world and of each other: restoring one
/// never mutates it, so the same snapshot can seed any number of restores.
/// The in-memory layout is an implementation detail and is not portable
/// across builds. Proxies are not captured; restoring invalidates the
/// world's live proxies.
pub struct Snapshot {
    pub(crate) store: EntityStore,
    pub(crate) pools: Vec<Option<Box<dyn AnyPool>>>,
    pub(crate) next_entity_id: u64,
}

/// Deep-copies a pool table, preserving the id-indexed layout.
pub(crate) fn clone_pools(pools: &[Option<Box<dyn AnyPool>>]) -> Vec<Option<Box<dyn AnyPool>>> {
    pools
        .iter()
        .map(|slot| slot.as_ref().map(|pool| pool.boxed_clone()))
        .collect()
}
