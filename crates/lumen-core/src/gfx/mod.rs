// Copyright 2025 eraflo
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

//! Backend-agnostic graphics layer.
//!
//! Everything above [`NativeApi`] is written once: device and adapter
//! selection, the swapchain and its resize sequence, buffers and textures,
//! shaders with their packed constants, cached state objects and the ordered
//! draw submission. A backend (see `lumen-infra`) only implements the
//! primitive native calls. [`mock::MockApi`] is an in-memory backend that
//! records every call.

pub mod api;
pub mod buffer;
pub mod device;
pub mod error;
pub mod mock;
pub mod packer;
pub mod shader;
pub mod shader_var;
pub mod state_cache;
pub mod submit;
pub mod swapchain;
pub mod texture;
pub mod traits;

pub use self::api::*;
pub use self::buffer::Buffer;
pub use self::device::{enumerate_adapters, Device, MAX_SAMPLER_SLOTS};
pub use self::error::{ErrorKind, GfxError, GfxResult};
pub use self::packer::{pack_indices, pack_instances, pack_vertices, Mat4, Mesh};
pub use self::shader::{Shader, ShaderState};
pub use self::shader_var::{ShaderValue, ShaderVar, ShaderVars, VarType};
pub use self::state_cache::{StateCache, StateDescriptor, StateObjects};
pub use self::submit::{DrawStats, DrawUnit, FrameStats, Renderer};
pub use self::swapchain::{Swapchain, SwapchainState};
pub use self::texture::Texture;
pub use self::traits::NativeApi;
