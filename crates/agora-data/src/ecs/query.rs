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

//! Rest-component tuples for `World::query`.

use std::ptr::NonNull;

use crate::ecs::bitset::Signature;
use crate::ecs::component::Component;
use crate::ecs::entity_store::EntityMeta;
use crate::ecs::pool::Pool;
use crate::ecs::registry::{component_id, ComponentId};
use crate::ecs::world::World;

/// Captured access to one rest pool: the component id plus a pointer to
/// the typed pool, resolved once before iteration begins.
#[doc(hidden)]
pub struct RestAccess<T: Component> {
    cid: ComponentId,
    pool: NonNull<Pool<T>>,
}

impl<T: Component> Clone for RestAccess<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Component> Copy for RestAccess<T> {}

impl<T: Component> RestAccess<T> {
    fn acquire(world: &World) -> Option<Self> {
        let cid = component_id::<T>();
        let pool = world.pool_ref::<T>()?;
        Some(Self {
            cid,
            pool: NonNull::from(pool),
        })
    }

    /// # Safety
    ///
    /// The pool pointer must still refer to the world being iterated, and
    /// `meta.sig` must contain `self.cid`.
    unsafe fn entry_ref<'w>(self, meta: &EntityMeta) -> &'w T {
        let pool = self.pool.as_ref();
        let di = meta.idx[meta.sig.rank(self.cid)];
        &pool.entries.get(di as usize).data
    }

    /// # Safety
    ///
    /// As for `entry_ref`, and the caller must hold the world exclusively
    /// with this pool distinct from every other pool being accessed. The
    /// const pointer is cast to a mutable one; that is sound only because
    /// the query engine guarantees no other access to this pool while the
    /// returned borrow lives.
    unsafe fn entry_mut<'w>(self, meta: &EntityMeta) -> &'w mut T {
        let pool = &mut *self.pool.as_ptr();
        let di = meta.idx[meta.sig.rank(self.cid)];
        &mut pool.entries.get_mut(di as usize).data
    }
}

/// A tuple of additional component types fetched alongside a query's
/// driver component.
///
/// Implemented for rest tuples of up to three components. The driver plus
/// rest set must consist of unique types; `World::query` checks this
/// dynamically via the required signature's popcount.
pub trait QueryRest<'w>: Sized {
    /// Shared references handed to the callback, e.g. `(&A, &B)`.
    type Refs;
    /// Mutable references handed to the callback, e.g. `(&mut A, &mut B)`.
    type Muts;
    /// Pool access captured before iteration.
    #[doc(hidden)]
    type Access: Copy;
    /// Number of rest components.
    const ARITY: usize;

    /// Sets this tuple's component bits in the query's required signature.
    #[doc(hidden)]
    fn mark(required: &mut Signature);

    /// Captures pool access, or `None` when some pool has never been
    /// created (such a query yields nothing).
    #[doc(hidden)]
    fn acquire(world: &World) -> Option<Self::Access>;

    /// Fetches shared references for an entity known to match the query.
    ///
    /// # Safety
    ///
    /// `meta` must satisfy the required signature, and `access` must have
    /// been captured from the world currently being iterated.
    #[doc(hidden)]
    unsafe fn fetch(access: Self::Access, meta: &EntityMeta) -> Self::Refs;

    /// Fetches mutable references for an entity known to match the query.
    ///
    /// # Safety
    ///
    /// As for [`QueryRest::fetch`], and the caller must hold the world
    /// exclusively with a unique component set.
    #[doc(hidden)]
    unsafe fn fetch_mut(access: Self::Access, meta: &EntityMeta) -> Self::Muts;
}

impl<'w> QueryRest<'w> for () {
    type Refs = ();
    type Muts = ();
    type Access = ();
    const ARITY: usize = 0;

    fn mark(_required: &mut Signature) {}

    fn acquire(_world: &World) -> Option<()> {
        Some(())
    }

    unsafe fn fetch(_access: (), _meta: &EntityMeta) -> Self::Refs {}

    unsafe fn fetch_mut(_access: (), _meta: &EntityMeta) -> Self::Muts {}
}

impl<'w, A: Component> QueryRest<'w> for (A,) {
    type Refs = (&'w A,);
    type Muts = (&'w mut A,);
    type Access = (RestAccess<A>,);
    const ARITY: usize = 1;

    fn mark(required: &mut Signature) {
        required.set(component_id::<A>());
    }

    fn acquire(world: &World) -> Option<Self::Access> {
        Some((RestAccess::<A>::acquire(world)?,))
    }

    unsafe fn fetch(access: Self::Access, meta: &EntityMeta) -> Self::Refs {
        (access.0.entry_ref(meta),)
    }

    unsafe fn fetch_mut(access: Self::Access, meta: &EntityMeta) -> Self::Muts {
        (access.0.entry_mut(meta),)
    }
}

impl<'w, A: Component, B: Component> QueryRest<'w> for (A, B) {
    type Refs = (&'w A, &'w B);
    type Muts = (&'w mut A, &'w mut B);
    type Access = (RestAccess<A>, RestAccess<B>);
    const ARITY: usize = 2;

    fn mark(required: &mut Signature) {
        required.set(component_id::<A>());
        required.set(component_id::<B>());
    }

    fn acquire(world: &World) -> Option<Self::Access> {
        Some((
            RestAccess::<A>::acquire(world)?,
            RestAccess::<B>::acquire(world)?,
        ))
    }

    unsafe fn fetch(access: Self::Access, meta: &EntityMeta) -> Self::Refs {
        (access.0.entry_ref(meta), access.1.entry_ref(meta))
    }

    unsafe fn fetch_mut(access: Self::Access, meta: &EntityMeta) -> Self::Muts {
        (access.0.entry_mut(meta), access.1.entry_mut(meta))
    }
}

impl<'w, A: Component, B: Component, C: Component> QueryRest<'w> for (A, B, C) {
    type Refs = (&'w A, &'w B, &'w C);
    type Muts = (&'w mut A, &'w mut B, &'w mut C);
    type Access = (RestAccess<A>, RestAccess<B>, RestAccess<C>);
    const ARITY: usize = 3;

    fn mark(required: &mut Signature) {
        required.set(component_id::<A>());
        required.set(component_id::<B>());
        required.set(component_id::<C>());
    }

    fn acquire(world: &World) -> Option<Self::Access> {
        Some((
            RestAccess::<A>::acquire(world)?,
            RestAccess::<B>::acquire(world)?,
            RestAccess::<C>::acquire(world)?,
        ))
    }

    unsafe fn fetch(access: Self::Access, meta: &EntityMeta) -> Self::Refs {
        (
            access.0.entry_ref(meta),
            access.1.entry_ref(meta),
            access.2.entry_ref(meta),
        )
    }

    unsafe fn fetch_mut(access: Self::Access, meta: &EntityMeta) -> Self::Muts {
        (
            access.0.entry_mut(meta),
            access.1.entry_mut(meta),
            access.2.entry_mut(meta),
        )
    }
}
