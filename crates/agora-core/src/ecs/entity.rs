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

//! Defines core types related to entities in the ECS architecture.

use serde::{Deserialize, Serialize};

/// Flag marking a generation word as alive (the MSB of the word).
pub const GEN_ALIVE_BIT: u32 = 0x8000_0000;

/// Mask selecting the 31-bit generation counter below the alive flag.
pub const GEN_MASK: u32 = 0x7FFF_FFFF;

/// A handle addressing one entity in a world.
///
/// It combines a recycled slot index with a generation count to solve the
/// "ABA problem": when an entity is destroyed its slot index can be handed
/// to a new entity, but the slot's generation is advanced, so stale handles
/// pointing at the recycled index fail validation and cannot accidentally
/// affect the new occupant. The world-unique `id` is checked as well; a
/// handle is live only when all three fields match the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Monotonically increasing identifier, unique for the life of the
    /// world. Stable identity: suited for ordering and as a map key.
    pub id: u64,

    /// Index of the entity's slot in the store. Reused after destroy; not
    /// a stable identifier on its own.
    pub index: u32,

    /// Generation counter (low 31 bits) combined with the alive flag
    /// ([`GEN_ALIVE_BIT`]) in a single word.
    pub generation: u32,
}

impl Entity {
    /// The universal null handle. Never validates as live.
    pub const NULL: Entity = Entity {
        id: 0,
        index: 0,
        generation: 0,
    };

    /// Returns true if this is the null handle.
    #[inline]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}
