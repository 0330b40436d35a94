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

//! Opaque identifiers for objects owned by a native backend.
//!
//! The graphics layer never holds native pointers. Each backend hands out small
//! copyable IDs and resolves them internally, so ownership stays explicit: a
//! native object lives until its ID is passed to [`NativeApi::release`].
//!
//! [`NativeApi::release`]: crate::gfx::traits::NativeApi::release

macro_rules! native_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u64);
        )*
    };
}

native_id! {
    /// The native API factory (adapter enumerator).
    FactoryId,
    /// A physical adapter opened from a factory.
    AdapterId,
    /// A logical device.
    DeviceId,
    /// The immediate context of a device.
    ContextId,
    /// A presentation swapchain.
    SwapchainId,
    /// A GPU buffer.
    BufferId,
    /// A GPU texture.
    TextureId,
    /// A render-target, depth-stencil or shader-resource view.
    ViewId,
    /// A compiled shader blob.
    ShaderBlobId,
    /// A shader program built from a blob.
    ProgramId,
    /// A vertex input layout.
    InputLayoutId,
    /// A rasterizer state object.
    RasterStateId,
    /// A blend state object.
    BlendStateId,
    /// A depth-stencil state object.
    DepthStateId,
    /// A sampler state object.
    SamplerId,
}

/// A tagged reference to any native object, consumed by `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeHandle {
    /// See [`FactoryId`].
    Factory(FactoryId),
    /// See [`AdapterId`].
    Adapter(AdapterId),
    /// See [`DeviceId`].
    Device(DeviceId),
    /// See [`ContextId`].
    Context(ContextId),
    /// See [`SwapchainId`].
    Swapchain(SwapchainId),
    /// See [`BufferId`].
    Buffer(BufferId),
    /// See [`TextureId`].
    Texture(TextureId),
    /// See [`ViewId`].
    View(ViewId),
    /// See [`ShaderBlobId`].
    ShaderBlob(ShaderBlobId),
    /// See [`ProgramId`].
    Program(ProgramId),
    /// See [`InputLayoutId`].
    InputLayout(InputLayoutId),
    /// See [`RasterStateId`].
    RasterState(RasterStateId),
    /// See [`BlendStateId`].
    BlendState(BlendStateId),
    /// See [`DepthStateId`].
    DepthState(DepthStateId),
    /// See [`SamplerId`].
    Sampler(SamplerId),
}

macro_rules! into_native_handle {
    ($($id:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$id> for NativeHandle {
                fn from(id: $id) -> Self {
                    NativeHandle::$variant(id)
                }
            }
        )*
    };
}

into_native_handle! {
    FactoryId => Factory,
    AdapterId => Adapter,
    DeviceId => Device,
    ContextId => Context,
    SwapchainId => Swapchain,
    BufferId => Buffer,
    TextureId => Texture,
    ViewId => View,
    ShaderBlobId => ShaderBlob,
    ProgramId => Program,
    InputLayoutId => InputLayout,
    RasterStateId => RasterState,
    BlendStateId => BlendState,
    DepthStateId => DepthState,
    SamplerId => Sampler,
}

/// An ordered list of native objects to release if a multi-step creation fails.
///
/// Objects are pushed as they are created. [`UnwindStack::unwind`] releases them
/// in reverse order; [`UnwindStack::commit`] forgets them once creation has
/// succeeded and ownership moved to the finished object.
#[derive(Debug, Default)]
pub struct UnwindStack {
    handles: Vec<NativeHandle>,
}

impl UnwindStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly created native object.
    pub fn push(&mut self, handle: impl Into<NativeHandle>) {
        self.handles.push(handle.into());
    }

    /// Releases every recorded object, newest first.
    pub fn unwind(mut self, api: &dyn crate::gfx::traits::NativeApi) {
        while let Some(handle) = self.handles.pop() {
            log::debug!("Unwinding partially created native object {handle:?}");
            api.release(handle);
        }
    }

    /// Drops the records without releasing anything.
    pub fn commit(mut self) {
        self.handles.clear();
    }
}
