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

//! Process-wide component identity.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::ecs::component::Component;

/// Dense identifier assigned to each component type in registration order.
pub type ComponentId = u16;

/// Ceiling on distinct component types.
///
/// Worlds index their pools by [`ComponentId`], and entity signatures are
/// sized to this many bits.
pub const MAX_COMPONENTS: usize = 128;

/// Global registry: type -> id map plus the next free id.
struct Registry {
    by_type: HashMap<TypeId, ComponentId>,
    next_id: ComponentId,
}

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| {
    RwLock::new(Registry {
        by_type: HashMap::new(),
        next_id: 0,
    })
});

/// Returns the dense id for component type `T`, assigning one on first use.
///
/// Ids are handed out once per type for the life of the process, so every
/// world indexes its pools the same way and signatures stay comparable
/// across worlds.
///
/// # Panics
///
/// Panics if more than [`MAX_COMPONENTS`] distinct component types ever
/// request an id.
pub fn component_id<T: Component>() -> ComponentId {
    let type_id = TypeId::of::<T>();
    if let Some(&id) = REGISTRY.read().unwrap().by_type.get(&type_id) {
        return id;
    }

    let mut reg = REGISTRY.write().unwrap();
    // Re-check under the write lock; another thread may have won the race.
    if let Some(&id) = reg.by_type.get(&type_id) {
        return id;
    }
    let id = reg.next_id;
    assert!(
        (id as usize) < MAX_COMPONENTS,
        "component type limit ({}) exceeded",
        MAX_COMPONENTS
    );
    reg.next_id += 1;
    reg.by_type.insert(type_id, id);
    log::trace!(
        "assigned component id {} to {}",
        id,
        std::any::type_name::<T>()
    );
    id
}
