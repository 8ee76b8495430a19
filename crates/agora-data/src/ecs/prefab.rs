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

//! Prefab bundles: batched component sets for one-pass instantiation.

use agora_core::ecs::entity::Entity;

use crate::ecs::component::Component;
use crate::ecs::registry::component_id;
use crate::ecs::world::World;

/// An ordered bundle of initial component values used to create an entity
/// atomically.
///
/// Implemented for component tuples of up to four elements, for a bare
/// component, and for the empty tuple. The bundle's entries are sorted by
/// component id and written in one pass, so the new entity's signature and
/// dense-index vector come out in canonical order without per-component
/// insertion shifting. Duplicate component types in one bundle are a
/// construction error and are rejected before any pool is touched.
pub trait Prefab {
    /// Attaches this bundle's components to the freshly created `entity`.
    fn spawn_into(self, world: &mut World, entity: Entity);
}

/// The empty bundle spawns an entity with no components.
impl Prefab for () {
    fn spawn_into(self, _world: &mut World, _entity: Entity) {}
}

impl<C1: Component> Prefab for C1 {
    fn spawn_into(self, world: &mut World, entity: Entity) {
        let c1 = component_id::<C1>();
        let di = world
            .pool_mut::<C1>()
            .emplace(entity.index, entity.generation, self);
        let meta = world.store.get_mut(entity.index);
        meta.sig.set(c1);
        meta.idx.push(di);
    }
}

impl<C1: Component> Prefab for (C1,) {
    fn spawn_into(self, world: &mut World, entity: Entity) {
        self.0.spawn_into(world, entity);
    }
}

impl<C1: Component, C2: Component> Prefab for (C1, C2) {
    fn spawn_into(self, world: &mut World, entity: Entity) {
        let c1 = component_id::<C1>();
        let c2 = component_id::<C2>();
        assert_ne!(c1, c2, "prefabs cannot contain duplicate component types");

        let (v1, v2) = self;
        let mut entries = [
            (
                c1,
                world
                    .pool_mut::<C1>()
                    .emplace(entity.index, entity.generation, v1),
            ),
            (
                c2,
                world
                    .pool_mut::<C2>()
                    .emplace(entity.index, entity.generation, v2),
            ),
        ];
        entries.sort_unstable_by_key(|(cid, _)| *cid);

        let meta = world.store.get_mut(entity.index);
        for (cid, di) in entries {
            meta.sig.set(cid);
            meta.idx.push(di);
        }
    }
}

impl<C1: Component, C2: Component, C3: Component> Prefab for (C1, C2, C3) {
    fn spawn_into(self, world: &mut World, entity: Entity) {
        let c1 = component_id::<C1>();
        let c2 = component_id::<C2>();
        let c3 = component_id::<C3>();
        assert_ne!(c1, c2, "prefabs cannot contain duplicate component types");
        assert_ne!(c1, c3, "prefabs cannot contain duplicate component types");
        assert_ne!(c2, c3, "prefabs cannot contain duplicate component types");

        let (v1, v2, v3) = self;
        let mut entries = [
            (
                c1,
                world
                    .pool_mut::<C1>()
                    .emplace(entity.index, entity.generation, v1),
            ),
            (
                c2,
                world
                    .pool_mut::<C2>()
                    .emplace(entity.index, entity.generation, v2),
            ),
            (
                c3,
                world
                    .pool_mut::<C3>()
                    .emplace(entity.index, entity.generation, v3),
            ),
        ];
        entries.sort_unstable_by_key(|(cid, _)| *cid);

        let meta = world.store.get_mut(entity.index);
        for (cid, di) in entries {
            meta.sig.set(cid);
            meta.idx.push(di);
        }
    }
}

impl<C1: Component, C2: Component, C3: Component, C4: Component> Prefab for (C1, C2, C3, C4) {
    fn spawn_into(self, world: &mut World, entity: Entity) {
        let c1 = component_id::<C1>();
        let c2 = component_id::<C2>();
        let c3 = component_id::<C3>();
        let c4 = component_id::<C4>();
        assert_ne!(c1, c2, "prefabs cannot contain duplicate component types");
        assert_ne!(c1, c3, "prefabs cannot contain duplicate component types");
        assert_ne!(c1, c4, "prefabs cannot contain duplicate component types");
        assert_ne!(c2, c3, "prefabs cannot contain duplicate component types");
        assert_ne!(c2, c4, "prefabs cannot contain duplicate component types");
        assert_ne!(c3, c4, "prefabs cannot contain duplicate component types");

        let (v1, v2, v3, v4) = self;
        let mut entries = [
            (
                c1,
                world
                    .pool_mut::<C1>()
                    .emplace(entity.index, entity.generation, v1),
            ),
            (
                c2,
                world
                    .pool_mut::<C2>()
                    .emplace(entity.index, entity.generation, v2),
            ),
            (
                c3,
                world
                    .pool_mut::<C3>()
                    .emplace(entity.index, entity.generation, v3),
            ),
            (
                c4,
                world
                    .pool_mut::<C4>()
                    .emplace(entity.index, entity.generation, v4),
            ),
        ];
        entries.sort_unstable_by_key(|(cid, _)| *cid);

        let meta = world.store.get_mut(entity.index);
        for (cid, di) in entries {
            meta.sig.set(cid);
            meta.idx.push(di);
        }
    }
}
