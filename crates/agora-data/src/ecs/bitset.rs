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

//! Fixed-width component signature with a fast rank operation.

use crate::ecs::registry::{ComponentId, MAX_COMPONENTS};

/// Number of 64-bit words backing a [`Signature`].
pub(crate) const WORD_COUNT: usize = (MAX_COMPONENTS + 63) / 64;

/// A fixed-size bitset recording which component types an entity carries,
/// one bit per [`ComponentId`].
///
/// The interesting operation is [`Signature::rank`]: counting the set bits
/// below a given id yields the position of that component's dense index
/// inside the entity's compact index vector. Every component lookup goes
/// through it, so it is kept branch-light.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    words: [u64; WORD_COUNT],
}

impl Signature {
    /// Clears every bit.
    pub fn clear(&mut self) {
        self.words = [0; WORD_COUNT];
    }

    /// Returns true if the bit for `cid` is set.
    ///
    /// `cid < MAX_COMPONENTS` is a caller precondition.
    #[inline]
    pub fn test(&self, cid: ComponentId) -> bool {
        debug_assert!((cid as usize) < MAX_COMPONENTS);
        (self.words[(cid / 64) as usize] >> (cid % 64)) & 1 != 0
    }

    /// Sets the bit for `cid`. Idempotent.
    #[inline]
    pub fn set(&mut self, cid: ComponentId) {
        debug_assert!((cid as usize) < MAX_COMPONENTS);
        self.words[(cid / 64) as usize] |= 1u64 << (cid % 64);
    }

    /// Clears the bit for `cid`. Idempotent.
    #[inline]
    pub fn reset(&mut self, cid: ComponentId) {
        debug_assert!((cid as usize) < MAX_COMPONENTS);
        self.words[(cid / 64) as usize] &= !(1u64 << (cid % 64));
    }

    /// Number of set bits.
    #[inline]
    pub fn popcount(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Counts the set bits at positions `[0, cid)`.
    ///
    /// Mask out the bits at and above `cid` in the containing word,
    /// popcount, and add the popcount of the lower word under an
    /// all-ones/all-zeros mask instead of a branch on the word index.
    #[inline]
    pub fn rank(&self, cid: ComponentId) -> usize {
        debug_assert!((cid as usize) < MAX_COMPONENTS);
        let word = (cid >> 6) as usize;
        let bit = cid & 63;
        let low = self.words[word] & ((1u64 << bit) - 1);
        if WORD_COUNT == 2 {
            let carry_mask = ((word != 0) as u64).wrapping_neg();
            let below = u64::from(self.words[0].count_ones()) & carry_mask;
            (below + u64::from(low.count_ones())) as usize
        } else {
            let mut count = low.count_ones() as usize;
            for w in &self.words[..word] {
                count += w.count_ones() as usize;
            }
            count
        }
    }

    /// Returns true if every bit set in `other` is also set in `self`.
    #[inline]
    pub fn contains_all(&self, other: &Signature) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *b)
    }

    /// Calls `f` for each set bit, in ascending component-id order.
    pub fn for_each_set(&self, mut f: impl FnMut(ComponentId)) {
        for (word_idx, &w) in self.words.iter().enumerate() {
            let mut v = w;
            while v != 0 {
                let bit = v.trailing_zeros() as usize;
                f((word_idx * 64 + bit) as ComponentId);
                v &= v - 1;
            }
        }
    }
}
