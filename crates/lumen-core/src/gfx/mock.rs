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

//! An in-memory [`NativeApi`] that records every call.
//!
//! `MockApi` behaves like a strict immediate-mode driver: it keeps buffer and
//! texture bytes, refuses to resize a swapchain while a back-buffer reference is
//! alive, rejects draws without both shader stages bound, and can be told to
//! fail any operation. Tests and headless tools drive the whole graphics layer
//! through it.

use crate::gfx::api::*;
use crate::gfx::error::{GfxError, GfxResult};
use crate::gfx::traits::NativeApi;
use raw_window_handle as rwh;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A window that exists only for surface bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessWindow {
    id: u32,
}

impl HeadlessWindow {
    /// Creates a headless window with the given id.
    pub fn new(id: u32) -> Self {
        Self { id }
    }
}

impl Default for HeadlessWindow {
    fn default() -> Self {
        Self::new(1)
    }
}

impl rwh::HasWindowHandle for HeadlessWindow {
    fn window_handle(&self) -> Result<rwh::WindowHandle<'_>, rwh::HandleError> {
        let raw = rwh::RawWindowHandle::Web(rwh::WebWindowHandle::new(self.id));
        // SAFETY: a web handle is a plain id with no borrowed native resource.
        Ok(unsafe { rwh::WindowHandle::borrow_raw(raw) })
    }
}

impl rwh::HasDisplayHandle for HeadlessWindow {
    fn display_handle(&self) -> Result<rwh::DisplayHandle<'_>, rwh::HandleError> {
        let raw = rwh::RawDisplayHandle::Web(rwh::WebDisplayHandle::new());
        // SAFETY: see `window_handle`.
        Ok(unsafe { rwh::DisplayHandle::borrow_raw(raw) })
    }
}

/// An adapter exposed by [`MockApi`].
#[derive(Debug, Clone)]
pub struct MockAdapter {
    /// What enumeration reports.
    pub info: AdapterInfo,
    /// The newest feature level device creation accepts.
    pub max_feature_level: FeatureLevel,
}

impl MockAdapter {
    /// A discrete adapter with one 1920x1080 display and full 11.1 support.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            info: AdapterInfo {
                index: 0,
                name: name.into(),
                adapter_type: AdapterType::DiscreteGpu,
                vendor_id: 0x10de,
                device_id: 0x2684,
                subsystem_id: 0,
                revision: 0xa1,
                dedicated_video_memory: 8 << 30,
                dedicated_system_memory: 0,
                shared_system_memory: 16 << 30,
                displays: vec![DisplayInfo {
                    name: "\\\\.\\DISPLAY1".to_string(),
                    desktop_bounds: [0, 0, 1920, 1080],
                    attached_to_desktop: true,
                }],
            },
            max_feature_level: FeatureLevel::L11_1,
        }
    }

    /// Caps the feature levels this adapter accepts.
    pub fn with_max_feature_level(mut self, level: FeatureLevel) -> Self {
        self.max_feature_level = level;
        self
    }
}

/// One recorded call into [`MockApi`].
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum MockCall {
    CreateFactory(FactoryId),
    EnumerateAdapters,
    OpenAdapter(u32),
    CreateDevice(FeatureLevel),
    ImmediateContext(ContextId),
    CreateSwapchain {
        swapchain: SwapchainId,
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    BackBuffer(TextureId),
    ResizeBuffers {
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    Present {
        sync_interval: u32,
    },
    CreateBuffer {
        buffer: BufferId,
        buffer_type: BufferType,
        usage: BufferUsage,
        size: u64,
    },
    WriteBuffer {
        buffer: BufferId,
        len: usize,
    },
    CreateTexture {
        texture: TextureId,
        format: PixelFormat,
        width: u32,
        height: u32,
    },
    WriteTexture {
        texture: TextureId,
        len: usize,
    },
    CreateView {
        view: ViewId,
        texture: TextureId,
        kind: ViewKind,
    },
    CompileShader(ShaderBlobId, ShaderTarget),
    CreateProgram(ProgramId),
    CreateInputLayout {
        layout: InputLayoutId,
        elements: usize,
    },
    CreateRasterState(RasterStateId),
    CreateBlendState(BlendStateId),
    CreateDepthState(DepthStateId),
    CreateSampler(SamplerId),
    SetRenderTargets(Option<ViewId>, Option<ViewId>),
    SetViewport(Viewport),
    ClearRenderTarget(ViewId, [f32; 4]),
    ClearDepthStencil(ViewId, f32, u8),
    BindVertexShader(Option<ProgramId>),
    BindPixelShader(Option<ProgramId>),
    BindInputLayout(Option<InputLayoutId>),
    SetPrimitiveTopology(PrimitiveTopology),
    BindRasterState(RasterStateId),
    BindBlendState(BlendStateId),
    BindDepthState(DepthStateId, u32),
    BindSamplers {
        stage: ShaderKind,
        start_slot: u32,
        samplers: Vec<SamplerId>,
    },
    BindShaderResources {
        stage: ShaderKind,
        start_slot: u32,
        views: Vec<ViewId>,
    },
    BindConstantBuffer {
        stage: ShaderKind,
        slot: u32,
        buffer: Option<BufferId>,
    },
    BindVertexBuffer {
        slot: u32,
        buffer: Option<BufferId>,
        stride: u32,
        offset: u32,
    },
    BindIndexBuffer {
        buffer: Option<BufferId>,
        format: IndexFormat,
        offset: u32,
    },
    Draw {
        vertex_count: u32,
        start_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    },
    DrawInstanced {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
    },
    Release(NativeHandle),
}

impl MockCall {
    /// Returns `true` for draw calls of any flavor.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            MockCall::Draw { .. }
                | MockCall::DrawIndexed { .. }
                | MockCall::DrawInstanced { .. }
                | MockCall::DrawIndexedInstanced { .. }
        )
    }
}

#[derive(Debug)]
enum MockObject {
    Factory,
    Adapter(usize),
    Device,
    Context,
    Swapchain {
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    Buffer {
        usage: BufferUsage,
        bytes: Vec<u8>,
    },
    Texture {
        dynamic: bool,
        bytes: Vec<u8>,
        back_buffer_of: Option<SwapchainId>,
    },
    View {
        texture: TextureId,
    },
    Blob {
        kind: ShaderKind,
    },
    Program,
    InputLayout,
    State,
}

#[derive(Debug, Default)]
struct ContextState {
    vertex_shader: Option<ProgramId>,
    pixel_shader: Option<ProgramId>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    objects: HashMap<u64, MockObject>,
    calls: Vec<MockCall>,
    failing: HashSet<&'static str>,
    context: ContextState,
}

impl MockState {
    fn insert(&mut self, object: MockObject) -> u64 {
        self.next_id += 1;
        self.objects.insert(self.next_id, object);
        self.next_id
    }

    fn check(&self, operation: &'static str) -> GfxResult<()> {
        if self.failing.contains(operation) {
            Err(GfxError::native(operation, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn require(&self, operation: &'static str, id: u64) -> GfxResult<&MockObject> {
        self.objects
            .get(&id)
            .ok_or_else(|| GfxError::native(operation, format!("object #{id} is not alive")))
    }
}

/// The recording backend. See the module documentation.
#[derive(Debug)]
pub struct MockApi {
    adapters: Vec<MockAdapter>,
    state: Mutex<MockState>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    /// A backend exposing a single adapter.
    pub fn new() -> Self {
        Self::with_adapters(vec![MockAdapter::named("Mock Adapter")])
    }

    /// A backend exposing `adapters` in the given order.
    pub fn with_adapters(adapters: Vec<MockAdapter>) -> Self {
        let adapters = adapters
            .into_iter()
            .enumerate()
            .map(|(index, mut adapter)| {
                adapter.info.index = index as u32;
                adapter
            })
            .collect();
        Self {
            adapters,
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every later call of `operation` (a [`NativeApi`] method name) fail.
    pub fn fail(&self, operation: &'static str) {
        self.state().failing.insert(operation);
    }

    /// Stops injecting failures.
    pub fn clear_failures(&self) {
        self.state().failing.clear();
    }

    /// Every call recorded so far, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Position of the first recorded call matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&MockCall) -> bool) -> Option<usize> {
        self.state().calls.iter().position(predicate)
    }

    /// Number of native objects not yet released.
    pub fn live_objects(&self) -> usize {
        self.state().objects.len()
    }

    /// Returns `true` if the object behind `handle` has not been released.
    pub fn is_live(&self, handle: impl Into<NativeHandle>) -> bool {
        let id = handle_raw(handle.into());
        self.state().objects.contains_key(&id)
    }

    /// The bytes currently stored in a buffer.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        match self.state().objects.get(&buffer.0) {
            Some(MockObject::Buffer { bytes, .. }) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// The bytes currently stored in mip 0 of a texture.
    pub fn texture_contents(&self, texture: TextureId) -> Option<Vec<u8>> {
        match self.state().objects.get(&texture.0) {
            Some(MockObject::Texture { bytes, .. }) => Some(bytes.clone()),
            _ => None,
        }
    }

    fn record(&self, call: MockCall) {
        self.state().calls.push(call);
    }

    fn create_state_object(&self, operation: &'static str) -> GfxResult<u64> {
        let mut state = self.state();
        state.check(operation)?;
        Ok(state.insert(MockObject::State))
    }

    fn draw_checked(&self, operation: &'static str, call: MockCall) -> GfxResult<()> {
        let mut state = self.state();
        state.check(operation)?;
        if state.context.vertex_shader.is_none() || state.context.pixel_shader.is_none() {
            return Err(GfxError::native(operation, "both shader stages must be bound"));
        }
        state.calls.push(call);
        Ok(())
    }
}

fn handle_raw(handle: NativeHandle) -> u64 {
    match handle {
        NativeHandle::Factory(id) => id.0,
        NativeHandle::Adapter(id) => id.0,
        NativeHandle::Device(id) => id.0,
        NativeHandle::Context(id) => id.0,
        NativeHandle::Swapchain(id) => id.0,
        NativeHandle::Buffer(id) => id.0,
        NativeHandle::Texture(id) => id.0,
        NativeHandle::View(id) => id.0,
        NativeHandle::ShaderBlob(id) => id.0,
        NativeHandle::Program(id) => id.0,
        NativeHandle::InputLayout(id) => id.0,
        NativeHandle::RasterState(id) => id.0,
        NativeHandle::BlendState(id) => id.0,
        NativeHandle::DepthState(id) => id.0,
        NativeHandle::Sampler(id) => id.0,
    }
}

impl NativeApi for MockApi {
    fn create_factory(&self) -> GfxResult<FactoryId> {
        let mut state = self.state();
        state.check("create_factory")?;
        let id = FactoryId(state.insert(MockObject::Factory));
        state.calls.push(MockCall::CreateFactory(id));
        Ok(id)
    }

    fn enumerate_adapters(&self, factory: FactoryId) -> GfxResult<Vec<AdapterInfo>> {
        let mut state = self.state();
        state.check("enumerate_adapters")?;
        state.require("enumerate_adapters", factory.0)?;
        state.calls.push(MockCall::EnumerateAdapters);
        Ok(self.adapters.iter().map(|a| a.info.clone()).collect())
    }

    fn open_adapter(&self, factory: FactoryId, index: u32) -> GfxResult<AdapterId> {
        let mut state = self.state();
        state.check("open_adapter")?;
        state.require("open_adapter", factory.0)?;
        if index as usize >= self.adapters.len() {
            return Err(GfxError::not_found("adapter", index.to_string()));
        }
        state.calls.push(MockCall::OpenAdapter(index));
        Ok(AdapterId(state.insert(MockObject::Adapter(index as usize))))
    }

    fn create_device(
        &self,
        adapter: AdapterId,
        level: FeatureLevel,
        _debug: bool,
    ) -> GfxResult<DeviceId> {
        let mut state = self.state();
        state.check("create_device")?;
        let index = match state.require("create_device", adapter.0)? {
            MockObject::Adapter(index) => *index,
            _ => return Err(GfxError::native("create_device", "not an adapter")),
        };
        if level > self.adapters[index].max_feature_level {
            return Err(GfxError::native(
                "create_device",
                format!("feature level {level:?} unsupported"),
            ));
        }
        state.calls.push(MockCall::CreateDevice(level));
        Ok(DeviceId(state.insert(MockObject::Device)))
    }

    fn immediate_context(&self, device: DeviceId) -> GfxResult<ContextId> {
        let mut state = self.state();
        state.check("immediate_context")?;
        state.require("immediate_context", device.0)?;
        let id = ContextId(state.insert(MockObject::Context));
        state.calls.push(MockCall::ImmediateContext(id));
        Ok(id)
    }

    fn create_swapchain(
        &self,
        device: DeviceId,
        descriptor: &SwapchainDescriptor,
    ) -> GfxResult<SwapchainId> {
        let mut state = self.state();
        state.check("create_swapchain")?;
        state.require("create_swapchain", device.0)?;
        let swapchain = SwapchainId(state.insert(MockObject::Swapchain {
            width: descriptor.width,
            height: descriptor.height,
            format: descriptor.format,
        }));
        state.calls.push(MockCall::CreateSwapchain {
            swapchain,
            width: descriptor.width,
            height: descriptor.height,
            format: descriptor.format,
        });
        Ok(swapchain)
    }

    fn back_buffer(&self, swapchain: SwapchainId) -> GfxResult<TextureId> {
        let mut state = self.state();
        state.check("back_buffer")?;
        let (width, height, format) = match state.require("back_buffer", swapchain.0)? {
            MockObject::Swapchain {
                width,
                height,
                format,
            } => (*width, *height, *format),
            _ => return Err(GfxError::native("back_buffer", "not a swapchain")),
        };
        let len = width as usize * height as usize * format.bytes_per_pixel() as usize;
        let texture = TextureId(state.insert(MockObject::Texture {
            dynamic: false,
            bytes: vec![0; len],
            back_buffer_of: Some(swapchain),
        }));
        state.calls.push(MockCall::BackBuffer(texture));
        Ok(texture)
    }

    fn resize_buffers(
        &self,
        swapchain: SwapchainId,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> GfxResult<()> {
        let mut state = self.state();
        state.check("resize_buffers")?;
        state.require("resize_buffers", swapchain.0)?;

        let back_buffers: HashSet<u64> = state
            .objects
            .iter()
            .filter_map(|(id, object)| match object {
                MockObject::Texture {
                    back_buffer_of: Some(owner),
                    ..
                } if *owner == swapchain => Some(*id),
                _ => None,
            })
            .collect();
        let views_alive = state.objects.values().any(|object| {
            matches!(object, MockObject::View { texture } if back_buffers.contains(&texture.0))
        });
        if !back_buffers.is_empty() || views_alive {
            return Err(GfxError::native(
                "resize_buffers",
                "back-buffer references are still alive",
            ));
        }

        if let Some(MockObject::Swapchain {
            width: w,
            height: h,
            format: f,
        }) = state.objects.get_mut(&swapchain.0)
        {
            *w = width;
            *h = height;
            *f = format;
        }
        state.calls.push(MockCall::ResizeBuffers {
            width,
            height,
            format,
        });
        Ok(())
    }

    fn present(&self, swapchain: SwapchainId, sync_interval: u32) -> GfxResult<()> {
        let mut state = self.state();
        state.check("present")?;
        state.require("present", swapchain.0)?;
        state.calls.push(MockCall::Present { sync_interval });
        Ok(())
    }

    fn create_buffer(
        &self,
        device: DeviceId,
        descriptor: &BufferDescriptor,
        initial: &[u8],
    ) -> GfxResult<BufferId> {
        let mut state = self.state();
        state.check("create_buffer")?;
        state.require("create_buffer", device.0)?;
        if initial.len() as u64 != descriptor.size {
            return Err(GfxError::native(
                "create_buffer",
                format!(
                    "initial data is {} bytes, buffer is {}",
                    initial.len(),
                    descriptor.size
                ),
            ));
        }
        let buffer = BufferId(state.insert(MockObject::Buffer {
            usage: descriptor.usage,
            bytes: initial.to_vec(),
        }));
        state.calls.push(MockCall::CreateBuffer {
            buffer,
            buffer_type: descriptor.buffer_type,
            usage: descriptor.usage,
            size: descriptor.size,
        });
        Ok(buffer)
    }

    fn write_buffer(&self, context: ContextId, buffer: BufferId, data: &[u8]) -> GfxResult<()> {
        let mut state = self.state();
        state.check("write_buffer")?;
        state.require("write_buffer", context.0)?;
        match state.objects.get_mut(&buffer.0) {
            Some(MockObject::Buffer {
                usage: BufferUsage::Dynamic,
                bytes,
            }) => {
                if data.len() > bytes.len() {
                    return Err(GfxError::native("write_buffer", "write exceeds buffer size"));
                }
                bytes.fill(0);
                bytes[..data.len()].copy_from_slice(data);
            }
            Some(MockObject::Buffer { usage, .. }) => {
                return Err(GfxError::native(
                    "write_buffer",
                    format!("cannot map a {usage:?} buffer"),
                ));
            }
            _ => return Err(GfxError::native("write_buffer", "not a buffer")),
        }
        state.calls.push(MockCall::WriteBuffer {
            buffer,
            len: data.len(),
        });
        Ok(())
    }

    fn create_texture(
        &self,
        device: DeviceId,
        descriptor: &TextureDescriptor,
        initial: Option<&[u8]>,
    ) -> GfxResult<TextureId> {
        let mut state = self.state();
        state.check("create_texture")?;
        state.require("create_texture", device.0)?;
        let mut bytes = vec![0; descriptor.byte_size() as usize];
        if let Some(data) = initial {
            let len = data.len().min(bytes.len());
            bytes[..len].copy_from_slice(&data[..len]);
        }
        let texture = TextureId(state.insert(MockObject::Texture {
            dynamic: descriptor.flags.contains(TextureFlags::DYNAMIC),
            bytes,
            back_buffer_of: None,
        }));
        state.calls.push(MockCall::CreateTexture {
            texture,
            format: descriptor.format,
            width: descriptor.width,
            height: descriptor.height,
        });
        Ok(texture)
    }

    fn write_texture(&self, context: ContextId, texture: TextureId, data: &[u8]) -> GfxResult<()> {
        let mut state = self.state();
        state.check("write_texture")?;
        state.require("write_texture", context.0)?;
        match state.objects.get_mut(&texture.0) {
            Some(MockObject::Texture {
                dynamic: true,
                bytes,
                ..
            }) => {
                let len = data.len().min(bytes.len());
                bytes[..len].copy_from_slice(&data[..len]);
            }
            Some(MockObject::Texture { .. }) => {
                return Err(GfxError::native("write_texture", "texture is not dynamic"));
            }
            _ => return Err(GfxError::native("write_texture", "not a texture")),
        }
        state.calls.push(MockCall::WriteTexture {
            texture,
            len: data.len(),
        });
        Ok(())
    }

    fn create_view(
        &self,
        device: DeviceId,
        texture: TextureId,
        kind: ViewKind,
    ) -> GfxResult<ViewId> {
        let mut state = self.state();
        state.check("create_view")?;
        state.require("create_view", device.0)?;
        if !matches!(
            state.require("create_view", texture.0)?,
            MockObject::Texture { .. }
        ) {
            return Err(GfxError::native("create_view", "not a texture"));
        }
        let view = ViewId(state.insert(MockObject::View { texture }));
        state.calls.push(MockCall::CreateView {
            view,
            texture,
            kind,
        });
        Ok(view)
    }

    fn compile_shader(
        &self,
        source: &str,
        descriptor: &ShaderSourceDescriptor,
    ) -> GfxResult<ShaderBlobId> {
        let mut state = self.state();
        state.check("compile_shader")?;
        if !source.contains(descriptor.entry_point.as_ref()) {
            return Err(GfxError::native(
                "compile_shader",
                format!(
                    "{}: entry point '{}' not found",
                    descriptor.label, descriptor.entry_point
                ),
            ));
        }
        let blob = ShaderBlobId(state.insert(MockObject::Blob {
            kind: descriptor.target.kind,
        }));
        state
            .calls
            .push(MockCall::CompileShader(blob, descriptor.target));
        Ok(blob)
    }

    fn create_program(&self, device: DeviceId, blob: ShaderBlobId) -> GfxResult<ProgramId> {
        let mut state = self.state();
        state.check("create_program")?;
        state.require("create_program", device.0)?;
        if !matches!(
            state.require("create_program", blob.0)?,
            MockObject::Blob { .. }
        ) {
            return Err(GfxError::native("create_program", "not a shader blob"));
        }
        let program = ProgramId(state.insert(MockObject::Program));
        state.calls.push(MockCall::CreateProgram(program));
        Ok(program)
    }

    fn create_input_layout(
        &self,
        device: DeviceId,
        blob: ShaderBlobId,
        elements: &[InputElement],
    ) -> GfxResult<InputLayoutId> {
        let mut state = self.state();
        state.check("create_input_layout")?;
        state.require("create_input_layout", device.0)?;
        match state.require("create_input_layout", blob.0)? {
            MockObject::Blob {
                kind: ShaderKind::Vertex,
            } => {}
            _ => {
                return Err(GfxError::native(
                    "create_input_layout",
                    "input layouts need a vertex shader blob",
                ))
            }
        }
        let layout = InputLayoutId(state.insert(MockObject::InputLayout));
        state.calls.push(MockCall::CreateInputLayout {
            layout,
            elements: elements.len(),
        });
        Ok(layout)
    }

    fn create_raster_state(
        &self,
        _device: DeviceId,
        _descriptor: &RasterDescriptor,
    ) -> GfxResult<RasterStateId> {
        let id = RasterStateId(self.create_state_object("create_raster_state")?);
        self.record(MockCall::CreateRasterState(id));
        Ok(id)
    }

    fn create_blend_state(
        &self,
        _device: DeviceId,
        _descriptor: &BlendDescriptor,
    ) -> GfxResult<BlendStateId> {
        let id = BlendStateId(self.create_state_object("create_blend_state")?);
        self.record(MockCall::CreateBlendState(id));
        Ok(id)
    }

    fn create_depth_state(
        &self,
        _device: DeviceId,
        _descriptor: &DepthDescriptor,
    ) -> GfxResult<DepthStateId> {
        let id = DepthStateId(self.create_state_object("create_depth_state")?);
        self.record(MockCall::CreateDepthState(id));
        Ok(id)
    }

    fn create_sampler(
        &self,
        _device: DeviceId,
        _descriptor: &SamplerDescriptor,
    ) -> GfxResult<SamplerId> {
        let id = SamplerId(self.create_state_object("create_sampler")?);
        self.record(MockCall::CreateSampler(id));
        Ok(id)
    }

    fn set_render_targets(
        &self,
        _context: ContextId,
        render_target: Option<ViewId>,
        depth_stencil: Option<ViewId>,
    ) {
        self.record(MockCall::SetRenderTargets(render_target, depth_stencil));
    }

    fn set_viewport(&self, _context: ContextId, viewport: &Viewport) {
        self.record(MockCall::SetViewport(*viewport));
    }

    fn clear_render_target(&self, _context: ContextId, view: ViewId, color: [f32; 4]) {
        self.record(MockCall::ClearRenderTarget(view, color));
    }

    fn clear_depth_stencil(&self, _context: ContextId, view: ViewId, depth: f32, stencil: u8) {
        self.record(MockCall::ClearDepthStencil(view, depth, stencil));
    }

    fn bind_vertex_shader(&self, _context: ContextId, program: Option<ProgramId>) {
        let mut state = self.state();
        state.context.vertex_shader = program;
        state.calls.push(MockCall::BindVertexShader(program));
    }

    fn bind_pixel_shader(&self, _context: ContextId, program: Option<ProgramId>) {
        let mut state = self.state();
        state.context.pixel_shader = program;
        state.calls.push(MockCall::BindPixelShader(program));
    }

    fn bind_input_layout(&self, _context: ContextId, layout: Option<InputLayoutId>) {
        self.record(MockCall::BindInputLayout(layout));
    }

    fn set_primitive_topology(&self, _context: ContextId, topology: PrimitiveTopology) {
        self.record(MockCall::SetPrimitiveTopology(topology));
    }

    fn bind_raster_state(&self, _context: ContextId, state: RasterStateId) {
        self.record(MockCall::BindRasterState(state));
    }

    fn bind_blend_state(&self, _context: ContextId, state: BlendStateId) {
        self.record(MockCall::BindBlendState(state));
    }

    fn bind_depth_state(&self, _context: ContextId, state: DepthStateId, stencil_ref: u32) {
        self.record(MockCall::BindDepthState(state, stencil_ref));
    }

    fn bind_samplers(
        &self,
        _context: ContextId,
        stage: ShaderKind,
        start_slot: u32,
        samplers: &[SamplerId],
    ) {
        self.record(MockCall::BindSamplers {
            stage,
            start_slot,
            samplers: samplers.to_vec(),
        });
    }

    fn bind_shader_resources(
        &self,
        _context: ContextId,
        stage: ShaderKind,
        start_slot: u32,
        views: &[ViewId],
    ) {
        self.record(MockCall::BindShaderResources {
            stage,
            start_slot,
            views: views.to_vec(),
        });
    }

    fn bind_constant_buffer(
        &self,
        _context: ContextId,
        stage: ShaderKind,
        slot: u32,
        buffer: Option<BufferId>,
    ) {
        self.record(MockCall::BindConstantBuffer {
            stage,
            slot,
            buffer,
        });
    }

    fn bind_vertex_buffer(
        &self,
        _context: ContextId,
        slot: u32,
        buffer: Option<BufferId>,
        stride: u32,
        offset: u32,
    ) {
        self.record(MockCall::BindVertexBuffer {
            slot,
            buffer,
            stride,
            offset,
        });
    }

    fn bind_index_buffer(
        &self,
        _context: ContextId,
        buffer: Option<BufferId>,
        format: IndexFormat,
        offset: u32,
    ) {
        self.record(MockCall::BindIndexBuffer {
            buffer,
            format,
            offset,
        });
    }

    fn draw(&self, _context: ContextId, vertex_count: u32, start_vertex: u32) -> GfxResult<()> {
        self.draw_checked(
            "draw",
            MockCall::Draw {
                vertex_count,
                start_vertex,
            },
        )
    }

    fn draw_indexed(
        &self,
        _context: ContextId,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> GfxResult<()> {
        self.draw_checked(
            "draw_indexed",
            MockCall::DrawIndexed {
                index_count,
                start_index,
                base_vertex,
            },
        )
    }

    fn draw_instanced(
        &self,
        _context: ContextId,
        vertex_count: u32,
        instance_count: u32,
        _start_vertex: u32,
        _start_instance: u32,
    ) -> GfxResult<()> {
        self.draw_checked(
            "draw_instanced",
            MockCall::DrawInstanced {
                vertex_count,
                instance_count,
            },
        )
    }

    fn draw_indexed_instanced(
        &self,
        _context: ContextId,
        index_count: u32,
        instance_count: u32,
        _start_index: u32,
        _base_vertex: i32,
        _start_instance: u32,
    ) -> GfxResult<()> {
        self.draw_checked(
            "draw_indexed_instanced",
            MockCall::DrawIndexedInstanced {
                index_count,
                instance_count,
            },
        )
    }

    fn release(&self, handle: NativeHandle) {
        let mut state = self.state();
        if state.objects.remove(&handle_raw(handle)).is_some() {
            state.calls.push(MockCall::Release(handle));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapters_are_reindexed_in_order() {
        let api = MockApi::with_adapters(vec![MockAdapter::named("A"), MockAdapter::named("B")]);
        let factory = api.create_factory().unwrap();
        let adapters = api.enumerate_adapters(factory).unwrap();
        assert_eq!(adapters.len(), 2);
        assert_eq!(adapters[1].index, 1);
        assert_eq!(adapters[1].name, "B");
    }

    #[test]
    fn injected_failures_surface_as_native_errors() {
        let api = MockApi::new();
        api.fail("create_factory");
        assert!(api.create_factory().is_err());
        api.clear_failures();
        assert!(api.create_factory().is_ok());
    }

    #[test]
    fn resize_is_refused_while_a_back_buffer_is_alive() {
        let api = MockApi::new();
        let factory = api.create_factory().unwrap();
        let adapter = api.open_adapter(factory, 0).unwrap();
        let device = api.create_device(adapter, FeatureLevel::L11_0, false).unwrap();
        let swapchain = api
            .create_swapchain(
                device,
                &SwapchainDescriptor {
                    window: std::sync::Arc::new(HeadlessWindow::default()),
                    width: 64,
                    height: 64,
                    format: PixelFormat::Rgba8Unorm,
                    refresh_rate: Rational::default(),
                    fullscreen: false,
                    buffer_count: 2,
                    swap_effect: SwapEffect::FlipDiscard,
                },
            )
            .unwrap();

        let back = api.back_buffer(swapchain).unwrap();
        assert!(api
            .resize_buffers(swapchain, 128, 128, PixelFormat::Rgba8Unorm)
            .is_err());

        api.release(back.into());
        assert!(api
            .resize_buffers(swapchain, 128, 128, PixelFormat::Rgba8Unorm)
            .is_ok());
    }

    #[test]
    fn releasing_twice_records_once() {
        let api = MockApi::new();
        let factory = api.create_factory().unwrap();
        api.release(factory.into());
        api.release(factory.into());
        let releases = api.count(|c| matches!(c, MockCall::Release(_)));
        assert_eq!(releases, 1);
        assert!(!api.is_live(factory));
    }

    #[test]
    fn draws_need_both_stages() {
        let api = MockApi::new();
        let context = ContextId(0);
        assert!(api.draw(context, 3, 0).is_err());
        api.bind_vertex_shader(context, Some(ProgramId(1)));
        api.bind_pixel_shader(context, Some(ProgramId(2)));
        assert!(api.draw(context, 3, 0).is_ok());
        assert_eq!(api.count(MockCall::is_draw), 1);
    }
}
