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

//! Implements Agora's **signature-indexed dense-pool ECS**.
//!
//! Unlike archetype stores, every component type here owns a single dense
//! pool and each entity tracks its own component set in a fixed-width
//! [`Signature`] bitset. The bitset's rank operation translates a component
//! id into a position inside the entity's compact dense-index vector, which
//! turns a component lookup into one popcount and one indexed load instead
//! of a map scan.
//!
//! Pools erase by swap-with-last to stay dense; the world patches the moved
//! entry's owner and pushes the fresh address into that entity's
//! [`EntityProxy`], so externally held proxies keep cached pointers valid
//! across arbitrary churn.
//!
//! The store is single-threaded by design: one mutator, any number of
//! readers between mutations, no operation suspends. The primary entry
//! point is the [`World`] struct.

mod bitset;
mod component;
mod dense;
mod entity_store;
mod pool;
mod prefab;
mod proxy;
mod query;
mod registry;
mod snapshot;
mod world;

pub use agora_core::ecs::entity::{Entity, GEN_ALIVE_BIT, GEN_MASK};
pub use bitset::Signature;
pub use component::Component;
pub use prefab::Prefab;
pub use proxy::EntityProxy;
pub use query::QueryRest;
pub use registry::{component_id, ComponentId, MAX_COMPONENTS};
pub use snapshot::Snapshot;
pub use world::World;

#[cfg(test)]
mod tests;
