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

//! Chunked storage with stable element addresses.

use std::mem::MaybeUninit;

/// Number of elements per allocation block.
const BLOCK_LEN: usize = 4096;

/// An append-only chunked array.
///
/// Elements live in fixed-size blocks that are allocated once and never
/// reallocated, so the address of an element is stable from the push that
/// created it until it is popped or the array is dropped. That stability is
/// what lets entity proxies cache raw pointers to pool entries across
/// unrelated pushes; a single contiguous vector that can reallocate would
/// void them. Addresses do not survive a clone: cloning copies every
/// element into fresh blocks.
pub(crate) struct DenseArray<T> {
    blocks: Vec<Box<[MaybeUninit<T>]>>,
    len: usize,
}

impl<T> DenseArray<T> {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn slot(&self, index: usize) -> &MaybeUninit<T> {
        &self.blocks[index / BLOCK_LEN][index % BLOCK_LEN]
    }

    #[inline]
    fn slot_mut(&mut self, index: usize) -> &mut MaybeUninit<T> {
        &mut self.blocks[index / BLOCK_LEN][index % BLOCK_LEN]
    }

    /// Appends `value` and returns its index.
    pub fn push(&mut self, value: T) -> usize {
        let index = self.len;
        if index / BLOCK_LEN >= self.blocks.len() {
            self.blocks.push(Box::new_uninit_slice(BLOCK_LEN));
        }
        self.slot_mut(index).write(value);
        self.len += 1;
        index
    }

    /// Returns the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn get(&self, index: usize) -> &T {
        assert!(index < self.len);
        // SAFETY: every slot below `len` holds an initialized value.
        unsafe { self.slot(index).assume_init_ref() }
    }

    /// Mutable flavour of [`DenseArray::get`].
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut T {
        assert!(index < self.len);
        // SAFETY: every slot below `len` holds an initialized value.
        unsafe { self.slot_mut(index).assume_init_mut() }
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let index = self.len;
        // SAFETY: the slot held an initialized value, and `len` has already
        // been decremented so the slot will not be read again.
        Some(unsafe { self.slot(index).assume_init_read() })
    }

    /// Drops every element. Blocks stay allocated.
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T: Clone> Clone for DenseArray<T> {
    fn clone(&self) -> Self {
        let mut out = Self::new();
        for i in 0..self.len {
            out.push(self.get(i).clone());
        }
        out
    }
}

impl<T> Drop for DenseArray<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Default for DenseArray<T> {
    fn default() -> Self {
        Self::new()
    }
}
