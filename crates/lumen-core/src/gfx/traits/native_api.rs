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

use crate::gfx::api::*;
use crate::gfx::error::GfxResult;
use std::fmt::Debug;

/// The native 3D API underneath the graphics layer.
///
/// The shape follows an immediate-mode API: a factory enumerates adapters, an
/// adapter yields a device plus one immediate context, and all binds and draws
/// are issued on that context in call order. The API tracks no dependencies
/// between binds; the callers in this crate are responsible for issuing them in a
/// valid order.
///
/// Context operations that cannot fail on a real driver return `()`. Draw calls
/// return a `Result` because some backends resolve deferred pipeline state at
/// draw time.
pub trait NativeApi: Send + Sync + Debug + 'static {
    // --- Factory and device ---

    /// Creates the adapter factory.
    /// ## Errors
    /// * `GfxError` - If the native runtime is unavailable.
    fn create_factory(&self) -> GfxResult<FactoryId>;

    /// Lists the adapters visible to `factory`, in enumeration order.
    fn enumerate_adapters(&self, factory: FactoryId) -> GfxResult<Vec<AdapterInfo>>;

    /// Opens the adapter at `index`.
    /// ## Errors
    /// * `GfxError::NotFound` - If `index` is out of range.
    fn open_adapter(&self, factory: FactoryId, index: u32) -> GfxResult<AdapterId>;

    /// Creates a logical device at exactly `level`.
    /// ## Arguments
    /// * `adapter` - The adapter to create the device on.
    /// * `level` - The feature level to request; no fallback is attempted here.
    /// * `debug` - Enables the native validation layer when available.
    /// ## Errors
    /// * `GfxError::Native` - If the adapter does not support `level`.
    fn create_device(
        &self,
        adapter: AdapterId,
        level: FeatureLevel,
        debug: bool,
    ) -> GfxResult<DeviceId>;

    /// Returns the immediate context of `device`.
    fn immediate_context(&self, device: DeviceId) -> GfxResult<ContextId>;

    // --- Swapchain ---

    /// Creates a swapchain presenting into `descriptor.window`.
    fn create_swapchain(
        &self,
        device: DeviceId,
        descriptor: &SwapchainDescriptor,
    ) -> GfxResult<SwapchainId>;

    /// Returns a new reference to buffer 0 of the swapchain.
    ///
    /// The returned texture must be released before the swapchain is resized.
    fn back_buffer(&self, swapchain: SwapchainId) -> GfxResult<TextureId>;

    /// Resizes every buffer of the swapchain.
    ///
    /// Fails if any reference to a back buffer or a view of it is still alive.
    fn resize_buffers(
        &self,
        swapchain: SwapchainId,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> GfxResult<()>;

    /// Presents the current back buffer.
    /// ## Arguments
    /// * `sync_interval` - 0 presents immediately, 1 waits for vertical blank.
    fn present(&self, swapchain: SwapchainId, sync_interval: u32) -> GfxResult<()>;

    // --- Resources ---

    /// Creates a buffer initialized with `initial`, which is exactly
    /// `descriptor.size` bytes long.
    fn create_buffer(
        &self,
        device: DeviceId,
        descriptor: &BufferDescriptor,
        initial: &[u8],
    ) -> GfxResult<BufferId>;

    /// Replaces the whole content of a dynamic buffer (map-discard, write, unmap).
    fn write_buffer(&self, context: ContextId, buffer: BufferId, data: &[u8]) -> GfxResult<()>;

    /// Creates a 2D texture, optionally initializing mip 0 with tightly packed rows.
    fn create_texture(
        &self,
        device: DeviceId,
        descriptor: &TextureDescriptor,
        initial: Option<&[u8]>,
    ) -> GfxResult<TextureId>;

    /// Replaces mip 0 of a dynamic texture.
    fn write_texture(&self, context: ContextId, texture: TextureId, data: &[u8]) -> GfxResult<()>;

    /// Creates a view of `texture` for the given binding purpose.
    fn create_view(&self, device: DeviceId, texture: TextureId, kind: ViewKind)
        -> GfxResult<ViewId>;

    // --- Shaders and state objects ---

    /// Compiles `source` into a blob.
    /// ## Errors
    /// * `GfxError::Native` - With the compiler diagnostics if compilation fails.
    fn compile_shader(
        &self,
        source: &str,
        descriptor: &ShaderSourceDescriptor,
    ) -> GfxResult<ShaderBlobId>;

    /// Builds an executable program from a compiled blob.
    fn create_program(&self, device: DeviceId, blob: ShaderBlobId) -> GfxResult<ProgramId>;

    /// Builds an input layout validated against the vertex shader `blob`.
    fn create_input_layout(
        &self,
        device: DeviceId,
        blob: ShaderBlobId,
        elements: &[InputElement],
    ) -> GfxResult<InputLayoutId>;

    /// Builds a rasterizer state object.
    fn create_raster_state(
        &self,
        device: DeviceId,
        descriptor: &RasterDescriptor,
    ) -> GfxResult<RasterStateId>;

    /// Builds a blend state object.
    fn create_blend_state(
        &self,
        device: DeviceId,
        descriptor: &BlendDescriptor,
    ) -> GfxResult<BlendStateId>;

    /// Builds a depth-stencil state object.
    fn create_depth_state(
        &self,
        device: DeviceId,
        descriptor: &DepthDescriptor,
    ) -> GfxResult<DepthStateId>;

    /// Builds a sampler state object.
    fn create_sampler(&self, device: DeviceId, descriptor: &SamplerDescriptor)
        -> GfxResult<SamplerId>;

    // --- Immediate context ---

    /// Binds the output-merger targets. `None` unbinds.
    fn set_render_targets(
        &self,
        context: ContextId,
        render_target: Option<ViewId>,
        depth_stencil: Option<ViewId>,
    );

    /// Sets viewport 0.
    fn set_viewport(&self, context: ContextId, viewport: &Viewport);

    /// Fills a render-target view with `color`.
    fn clear_render_target(&self, context: ContextId, view: ViewId, color: [f32; 4]);

    /// Resets a depth-stencil view.
    fn clear_depth_stencil(&self, context: ContextId, view: ViewId, depth: f32, stencil: u8);

    /// Binds (or with `None` unbinds) the vertex program.
    fn bind_vertex_shader(&self, context: ContextId, program: Option<ProgramId>);

    /// Binds (or with `None` unbinds) the pixel program.
    fn bind_pixel_shader(&self, context: ContextId, program: Option<ProgramId>);

    /// Binds the vertex input layout.
    fn bind_input_layout(&self, context: ContextId, layout: Option<InputLayoutId>);

    /// Sets the primitive topology.
    fn set_primitive_topology(&self, context: ContextId, topology: PrimitiveTopology);

    /// Binds a rasterizer state.
    fn bind_raster_state(&self, context: ContextId, state: RasterStateId);

    /// Binds a blend state.
    fn bind_blend_state(&self, context: ContextId, state: BlendStateId);

    /// Binds a depth-stencil state with its stencil reference value.
    fn bind_depth_state(&self, context: ContextId, state: DepthStateId, stencil_ref: u32);

    /// Binds samplers to consecutive slots of `stage`.
    fn bind_samplers(
        &self,
        context: ContextId,
        stage: ShaderKind,
        start_slot: u32,
        samplers: &[SamplerId],
    );

    /// Binds shader-resource views to consecutive slots of `stage`.
    fn bind_shader_resources(
        &self,
        context: ContextId,
        stage: ShaderKind,
        start_slot: u32,
        views: &[ViewId],
    );

    /// Binds a constant buffer to `slot` of `stage`.
    fn bind_constant_buffer(
        &self,
        context: ContextId,
        stage: ShaderKind,
        slot: u32,
        buffer: Option<BufferId>,
    );

    /// Binds a vertex buffer to an input slot.
    fn bind_vertex_buffer(
        &self,
        context: ContextId,
        slot: u32,
        buffer: Option<BufferId>,
        stride: u32,
        offset: u32,
    );

    /// Binds the index buffer.
    fn bind_index_buffer(
        &self,
        context: ContextId,
        buffer: Option<BufferId>,
        format: IndexFormat,
        offset: u32,
    );

    /// Non-indexed, non-instanced draw.
    fn draw(&self, context: ContextId, vertex_count: u32, start_vertex: u32) -> GfxResult<()>;

    /// Indexed, non-instanced draw.
    fn draw_indexed(
        &self,
        context: ContextId,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> GfxResult<()>;

    /// Non-indexed, instanced draw.
    fn draw_instanced(
        &self,
        context: ContextId,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) -> GfxResult<()>;

    /// Indexed, instanced draw.
    fn draw_indexed_instanced(
        &self,
        context: ContextId,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) -> GfxResult<()>;

    // --- Lifetime ---

    /// Releases a native object. Releasing an unknown handle is a no-op.
    fn release(&self, handle: NativeHandle);
}
