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

/// A marker trait for types that can be attached to entities as components.
///
/// This trait must be implemented for any struct you wish to attach to an
/// entity. `Clone` is required because component values are copied by value
/// during bulk copies between entities and world snapshots. The `'static`
/// lifetime ensures the payload holds no borrowed data, and `Send + Sync`
/// keep pools transferable even though a world mutates on a single thread.
pub trait Component: Clone + Send + Sync + 'static {}
