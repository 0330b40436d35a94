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

//! The WGPU implementation of [`NativeApi`].
//!
//! Every native object lives in a per-kind table keyed by its id. The immediate
//! context only records what is bound; each draw resolves those bindings into
//! a cached pipeline and a bind group and records one render pass into the
//! context's frame encoder. The encoder is submitted before every queue write
//! (so uploads land between the draws that use them) and on present.
//!
//! Shaders are WGSL. Resources use the fixed bind group layout documented in
//! [`super::pipeline_cache`].

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use wgpu::util::DeviceExt;

use lumen_core::gfx::api::*;
use lumen_core::gfx::{GfxError, GfxResult, NativeApi};

use super::context;
use super::conversions::{adapter_info, IntoWgpu};
use super::pipeline_cache::{BindingSet, PipelineCache, PipelineInputs, PipelineKey, StageInput};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unknown_object(operation: &'static str, id: impl fmt::Debug) -> GfxError {
    GfxError::native(operation, format!("unknown object {id:?}"))
}

#[derive(Debug)]
struct WgpuAdapterEntry {
    adapter: wgpu::Adapter,
    factory: FactoryId,
}

#[derive(Debug)]
struct WgpuDeviceEntry {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: AdapterId,
    context: Option<ContextId>,
}

#[derive(Debug)]
struct SurfaceFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

struct WgpuSwapchainEntry {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    device_id: DeviceId,
    frame: Option<SurfaceFrame>,
    // Keeps the window alive for as long as the surface points at it.
    _window: GfxWindow,
}

impl fmt::Debug for WgpuSwapchainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuSwapchainEntry")
            .field("config", &self.config)
            .field("device_id", &self.device_id)
            .field("frame_acquired", &self.frame.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct WgpuBufferEntry {
    buffer: wgpu::Buffer,
    size: u64,
}

#[derive(Debug)]
enum TextureStorage {
    Owned(wgpu::Texture),
    BackBuffer(SwapchainId),
}

#[derive(Debug)]
struct WgpuTextureEntry {
    storage: TextureStorage,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    dynamic: bool,
}

#[derive(Debug)]
struct WgpuViewEntry {
    texture: TextureId,
    /// `None` for back-buffer views, which resolve to the current frame.
    view: Option<wgpu::TextureView>,
}

#[derive(Debug)]
struct ShaderBlob {
    label: String,
    source: String,
    entry_point: String,
    kind: ShaderKind,
}

#[derive(Debug)]
struct WgpuProgramEntry {
    module: wgpu::ShaderModule,
    entry_point: String,
}

#[derive(Debug, Clone, Copy)]
struct VertexBinding {
    buffer: BufferId,
    stride: u32,
    offset: u32,
}

/// Everything bound on an immediate context.
#[derive(Debug, Clone, Copy, Default)]
struct BoundState {
    render_target: Option<ViewId>,
    depth_stencil: Option<ViewId>,
    viewport: Option<Viewport>,
    vertex_shader: Option<ProgramId>,
    pixel_shader: Option<ProgramId>,
    input_layout: Option<InputLayoutId>,
    topology: PrimitiveTopology,
    raster: Option<RasterStateId>,
    blend: Option<BlendStateId>,
    depth: Option<DepthStateId>,
    stencil_ref: u32,
    vertex_constants: Option<BufferId>,
    pixel_constants: Option<BufferId>,
    texture: Option<ViewId>,
    sampler: Option<SamplerId>,
    vertex_buffers: [Option<VertexBinding>; 2],
    index_buffer: Option<(BufferId, IndexFormat, u32)>,
}

impl BoundState {
    /// Unbinds every slot that refers to `handle`.
    fn forget(&mut self, handle: NativeHandle) {
        fn clear<T: PartialEq>(slot: &mut Option<T>, id: T) {
            if slot.as_ref() == Some(&id) {
                *slot = None;
            }
        }
        match handle {
            NativeHandle::View(id) => {
                clear(&mut self.render_target, id);
                clear(&mut self.depth_stencil, id);
                clear(&mut self.texture, id);
            }
            NativeHandle::Buffer(id) => {
                clear(&mut self.vertex_constants, id);
                clear(&mut self.pixel_constants, id);
                for binding in &mut self.vertex_buffers {
                    if binding.is_some_and(|binding| binding.buffer == id) {
                        *binding = None;
                    }
                }
                if self.index_buffer.is_some_and(|(buffer, ..)| buffer == id) {
                    self.index_buffer = None;
                }
            }
            NativeHandle::Program(id) => {
                clear(&mut self.vertex_shader, id);
                clear(&mut self.pixel_shader, id);
            }
            NativeHandle::InputLayout(id) => clear(&mut self.input_layout, id),
            NativeHandle::RasterState(id) => clear(&mut self.raster, id),
            NativeHandle::BlendState(id) => clear(&mut self.blend, id),
            NativeHandle::DepthState(id) => clear(&mut self.depth, id),
            NativeHandle::Sampler(id) => clear(&mut self.sampler, id),
            _ => {}
        }
    }
}

#[derive(Debug)]
struct WgpuContextEntry {
    device: DeviceId,
    bound: BoundState,
    encoder: Option<wgpu::CommandEncoder>,
}

enum DrawCall {
    Vertices {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    Indexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

/// A [`NativeApi`] backed by WGPU.
pub struct WgpuApi {
    validation: bool,
    next_id: AtomicU64,
    factories: Mutex<HashMap<FactoryId, wgpu::Instance>>,
    adapters: Mutex<HashMap<AdapterId, WgpuAdapterEntry>>,
    devices: Mutex<HashMap<DeviceId, WgpuDeviceEntry>>,
    contexts: Mutex<HashMap<ContextId, WgpuContextEntry>>,
    swapchains: Mutex<HashMap<SwapchainId, WgpuSwapchainEntry>>,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    textures: Mutex<HashMap<TextureId, WgpuTextureEntry>>,
    views: Mutex<HashMap<ViewId, WgpuViewEntry>>,
    blobs: Mutex<HashMap<ShaderBlobId, ShaderBlob>>,
    programs: Mutex<HashMap<ProgramId, WgpuProgramEntry>>,
    input_layouts: Mutex<HashMap<InputLayoutId, Vec<InputElement>>>,
    raster_states: Mutex<HashMap<RasterStateId, RasterDescriptor>>,
    blend_states: Mutex<HashMap<BlendStateId, BlendDescriptor>>,
    depth_states: Mutex<HashMap<DepthStateId, DepthDescriptor>>,
    samplers: Mutex<HashMap<SamplerId, wgpu::Sampler>>,
    pipelines: Mutex<PipelineCache>,
}

impl fmt::Debug for WgpuApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuApi")
            .field("validation", &self.validation)
            .field("devices", &lock(&self.devices).len())
            .field("buffers", &lock(&self.buffers).len())
            .field("textures", &lock(&self.textures).len())
            .field("programs", &lock(&self.programs).len())
            .field("pipelines", &lock(&self.pipelines).len())
            .finish_non_exhaustive()
    }
}

impl Default for WgpuApi {
    fn default() -> Self {
        Self::new(false)
    }
}

impl WgpuApi {
    /// Creates the backend. `validation` enables the WGPU debugging flags on
    /// every instance it creates.
    pub fn new(validation: bool) -> Self {
        Self {
            validation,
            next_id: AtomicU64::new(1),
            factories: Mutex::default(),
            adapters: Mutex::default(),
            devices: Mutex::default(),
            contexts: Mutex::default(),
            swapchains: Mutex::default(),
            buffers: Mutex::default(),
            textures: Mutex::default(),
            views: Mutex::default(),
            blobs: Mutex::default(),
            programs: Mutex::default(),
            input_layouts: Mutex::default(),
            raster_states: Mutex::default(),
            blend_states: Mutex::default(),
            depth_states: Mutex::default(),
            samplers: Mutex::default(),
            pipelines: Mutex::default(),
        }
    }

    fn next<T>(&self, wrap: fn(u64) -> T) -> T {
        wrap(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn instance(&self, factory: FactoryId, operation: &'static str) -> GfxResult<wgpu::Instance> {
        lock(&self.factories)
            .get(&factory)
            .cloned()
            .ok_or_else(|| unknown_object(operation, factory))
    }

    fn device(
        &self,
        device: DeviceId,
        operation: &'static str,
    ) -> GfxResult<(wgpu::Device, wgpu::Queue)> {
        lock(&self.devices)
            .get(&device)
            .map(|entry| (entry.device.clone(), entry.queue.clone()))
            .ok_or_else(|| unknown_object(operation, device))
    }

    fn context_device(
        &self,
        context: ContextId,
        operation: &'static str,
    ) -> GfxResult<(wgpu::Device, wgpu::Queue)> {
        let device = lock(&self.contexts)
            .get(&context)
            .map(|entry| entry.device)
            .ok_or_else(|| unknown_object(operation, context))?;
        self.device(device, operation)
    }

    fn bound(&self, context: ContextId, operation: &'static str) -> GfxResult<BoundState> {
        lock(&self.contexts)
            .get(&context)
            .map(|entry| entry.bound)
            .ok_or_else(|| unknown_object(operation, context))
    }

    fn with_bound(&self, context: ContextId, update: impl FnOnce(&mut BoundState)) {
        match lock(&self.contexts).get_mut(&context) {
            Some(entry) => update(&mut entry.bound),
            None => log::error!("Ignoring bind on unknown context {context:?}"),
        }
    }

    fn buffer(&self, buffer: BufferId, operation: &'static str) -> GfxResult<wgpu::Buffer> {
        lock(&self.buffers)
            .get(&buffer)
            .map(|entry| entry.buffer.clone())
            .ok_or_else(|| unknown_object(operation, buffer))
    }

    /// Submits whatever the context has recorded so far.
    fn flush(&self, context: ContextId, operation: &'static str) -> GfxResult<()> {
        let encoder = lock(&self.contexts)
            .get_mut(&context)
            .and_then(|entry| entry.encoder.take());
        if let Some(encoder) = encoder {
            let (_, queue) = self.context_device(context, operation)?;
            queue.submit(std::iter::once(encoder.finish()));
        }
        Ok(())
    }

    /// Records into the context's frame encoder, creating it on first use.
    fn record(
        &self,
        context: ContextId,
        operation: &'static str,
        pass: impl FnOnce(&mut wgpu::CommandEncoder),
    ) -> GfxResult<()> {
        let (device, _) = self.context_device(context, operation)?;
        let taken = lock(&self.contexts)
            .get_mut(&context)
            .and_then(|entry| entry.encoder.take());
        let mut encoder = taken.unwrap_or_else(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lumen Frame Encoder"),
            })
        });
        pass(&mut encoder);
        if let Some(entry) = lock(&self.contexts).get_mut(&context) {
            entry.encoder = Some(encoder);
        }
        Ok(())
    }

    /// Resolves a view id to a WGPU view and the format of its texture.
    fn resolve_view(
        &self,
        view: ViewId,
        operation: &'static str,
    ) -> GfxResult<(wgpu::TextureView, wgpu::TextureFormat)> {
        let (texture, cached) = lock(&self.views)
            .get(&view)
            .map(|entry| (entry.texture, entry.view.clone()))
            .ok_or_else(|| unknown_object(operation, view))?;
        let (swapchain, format) = lock(&self.textures)
            .get(&texture)
            .map(|entry| {
                let swapchain = match entry.storage {
                    TextureStorage::Owned(_) => None,
                    TextureStorage::BackBuffer(swapchain) => Some(swapchain),
                };
                (swapchain, entry.format)
            })
            .ok_or_else(|| unknown_object(operation, texture))?;

        match (cached, swapchain) {
            (Some(view), _) => Ok((view, format)),
            (None, Some(swapchain)) => Ok((self.frame_view(swapchain, operation)?, format)),
            (None, None) => Err(GfxError::native(operation, format!("{view:?} has no view"))),
        }
    }

    /// The view of the swapchain image being rendered, acquired on first use.
    fn frame_view(
        &self,
        swapchain: SwapchainId,
        operation: &'static str,
    ) -> GfxResult<wgpu::TextureView> {
        let mut swapchains = lock(&self.swapchains);
        let entry = swapchains
            .get_mut(&swapchain)
            .ok_or_else(|| unknown_object(operation, swapchain))?;

        if let Some(frame) = &entry.frame {
            return Ok(frame.view.clone());
        }

        let texture = match entry.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Swapchain surface is outdated, reconfiguring");
                entry.surface.configure(&entry.device, &entry.config);
                entry.surface.get_current_texture().map_err(|e| {
                    GfxError::native(operation, format!("Failed to acquire swapchain image: {e}"))
                })?
            }
            Err(e) => {
                return Err(GfxError::native(
                    operation,
                    format!("Failed to acquire swapchain image: {e}"),
                ))
            }
        };
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        entry.frame = Some(SurfaceFrame {
            texture,
            view: view.clone(),
        });
        Ok(view)
    }

    fn draw_with(&self, context: ContextId, operation: &'static str, call: DrawCall) -> GfxResult<()> {
        let bound = self.bound(context, operation)?;
        let missing = |state: &str| GfxError::InvalidState {
            operation,
            state: state.to_string(),
        };
        let vertex_shader = bound
            .vertex_shader
            .ok_or_else(|| missing("no vertex shader is bound"))?;
        let pixel_shader = bound
            .pixel_shader
            .ok_or_else(|| missing("no pixel shader is bound"))?;
        if bound.render_target.is_none() && bound.depth_stencil.is_none() {
            return Err(missing("no render target is bound"));
        }

        let (device, _) = self.context_device(context, operation)?;
        let color = bound
            .render_target
            .map(|view| self.resolve_view(view, operation))
            .transpose()?;
        let depth = bound
            .depth_stencil
            .map(|view| self.resolve_view(view, operation))
            .transpose()?;

        let (vertex, pixel) = {
            let programs = lock(&self.programs);
            let stage = |id: ProgramId| {
                programs
                    .get(&id)
                    .map(|entry| (entry.module.clone(), entry.entry_point.clone()))
                    .ok_or_else(|| unknown_object(operation, id))
            };
            (stage(vertex_shader)?, stage(pixel_shader)?)
        };
        let elements = bound
            .input_layout
            .and_then(|layout| lock(&self.input_layouts).get(&layout).cloned())
            .unwrap_or_default();
        let raster = bound
            .raster
            .and_then(|id| lock(&self.raster_states).get(&id).copied())
            .unwrap_or_default();
        let blend = bound
            .blend
            .and_then(|id| lock(&self.blend_states).get(&id).copied())
            .unwrap_or_default();
        let depth_state = bound
            .depth
            .and_then(|id| lock(&self.depth_states).get(&id).copied())
            .unwrap_or_default();

        let vertex_constants = bound
            .vertex_constants
            .map(|id| self.buffer(id, operation))
            .transpose()?;
        let pixel_constants = bound
            .pixel_constants
            .map(|id| self.buffer(id, operation))
            .transpose()?;
        let texture = bound
            .texture
            .map(|view| self.resolve_view(view, operation).map(|(view, _)| view))
            .transpose()?;
        let sampler = bound
            .sampler
            .map(|id| {
                lock(&self.samplers)
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| unknown_object(operation, id))
            })
            .transpose()?;

        let bindings = BindingSet {
            vertex_constants: vertex_constants.is_some(),
            pixel_constants: pixel_constants.is_some(),
            texture: texture.is_some(),
            sampler: sampler.is_some(),
        };
        let key = PipelineKey {
            vertex: vertex_shader,
            pixel: pixel_shader,
            input_layout: bound.input_layout,
            topology: bound.topology,
            raster: bound.raster,
            blend: bound.blend,
            depth: bound.depth,
            color_format: color.as_ref().map(|(_, format)| *format),
            depth_format: depth.as_ref().map(|(_, format)| *format),
            strides: bound
                .vertex_buffers
                .map(|binding| binding.map_or(0, |binding| binding.stride)),
            bindings,
        };
        let inputs = PipelineInputs {
            vertex: StageInput {
                module: &vertex.0,
                entry_point: &vertex.1,
            },
            pixel: StageInput {
                module: &pixel.0,
                entry_point: &pixel.1,
            },
            elements: &elements,
            raster,
            blend,
            depth: depth_state,
            features: device.features(),
        };
        let pipeline = lock(&self.pipelines).get_or_create(&device, &key, &inputs)?;

        let bind_group = (!bindings.is_empty()).then(|| {
            let mut entries = Vec::with_capacity(4);
            if let Some(buffer) = &vertex_constants {
                entries.push(wgpu::BindGroupEntry {
                    binding: BindingSet::VERTEX_CONSTANTS,
                    resource: buffer.as_entire_binding(),
                });
            }
            if let Some(buffer) = &pixel_constants {
                entries.push(wgpu::BindGroupEntry {
                    binding: BindingSet::PIXEL_CONSTANTS,
                    resource: buffer.as_entire_binding(),
                });
            }
            if let Some(view) = &texture {
                entries.push(wgpu::BindGroupEntry {
                    binding: BindingSet::TEXTURE,
                    resource: wgpu::BindingResource::TextureView(view),
                });
            }
            if let Some(sampler) = &sampler {
                entries.push(wgpu::BindGroupEntry {
                    binding: BindingSet::SAMPLER,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
            }
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Lumen Draw Bind Group"),
                layout: &pipeline.bind_group_layout,
                entries: &entries,
            })
        });

        let mut vertex_buffers = Vec::with_capacity(2);
        for (slot, binding) in bound.vertex_buffers.iter().enumerate() {
            if let Some(binding) = binding {
                let buffer = self.buffer(binding.buffer, operation)?;
                vertex_buffers.push((slot as u32, buffer, u64::from(binding.offset)));
            }
        }
        let index_buffer = match (&call, bound.index_buffer) {
            (DrawCall::Indexed { .. }, Some((buffer, format, offset))) => Some((
                self.buffer(buffer, operation)?,
                format.into_wgpu(),
                u64::from(offset),
            )),
            (DrawCall::Indexed { .. }, None) => return Err(missing("no index buffer is bound")),
            (DrawCall::Vertices { .. }, _) => None,
        };

        self.record(context, operation, |encoder| {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Lumen Draw Pass"),
                color_attachments: &[color.as_ref().map(|(view, _)| {
                    wgpu::RenderPassColorAttachment {
                        view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    }
                })],
                depth_stencil_attachment: depth.as_ref().map(|(view, format)| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: format.has_stencil_aspect().then_some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&pipeline.pipeline);
            if let Some(bind_group) = &bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            for (slot, buffer, offset) in &vertex_buffers {
                pass.set_vertex_buffer(*slot, buffer.slice(*offset..));
            }
            if let Some(viewport) = bound.viewport {
                pass.set_viewport(
                    viewport.x,
                    viewport.y,
                    viewport.width,
                    viewport.height,
                    viewport.min_depth,
                    viewport.max_depth,
                );
            }
            pass.set_stencil_reference(bound.stencil_ref);

            match call {
                DrawCall::Vertices {
                    vertices,
                    instances,
                } => pass.draw(vertices, instances),
                DrawCall::Indexed {
                    indices,
                    base_vertex,
                    instances,
                } => {
                    if let Some((buffer, format, offset)) = &index_buffer {
                        pass.set_index_buffer(buffer.slice(*offset..), *format);
                    }
                    pass.draw_indexed(indices, base_vertex, instances);
                }
            }
        })
    }
}

impl NativeApi for WgpuApi {
    // --- Factory and device ---

    fn create_factory(&self) -> GfxResult<FactoryId> {
        let instance = context::create_instance(self.validation);
        let id = self.next(FactoryId);
        lock(&self.factories).insert(id, instance);
        log::info!("Created WGPU instance {id:?} (validation: {})", self.validation);
        Ok(id)
    }

    fn enumerate_adapters(&self, factory: FactoryId) -> GfxResult<Vec<AdapterInfo>> {
        let instance = self.instance(factory, "enumerate_adapters")?;
        Ok(context::adapters(&instance)
            .iter()
            .enumerate()
            .map(|(index, adapter)| adapter_info(index as u32, adapter))
            .collect())
    }

    fn open_adapter(&self, factory: FactoryId, index: u32) -> GfxResult<AdapterId> {
        let instance = self.instance(factory, "open_adapter")?;
        let adapter = context::adapters(&instance)
            .into_iter()
            .nth(index as usize)
            .ok_or_else(|| GfxError::not_found("adapter", index.to_string()))?;
        let id = self.next(AdapterId);
        log::info!(
            "Opened graphics adapter \"{}\" (Backend: {:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );
        lock(&self.adapters).insert(id, WgpuAdapterEntry { adapter, factory });
        Ok(id)
    }

    fn create_device(
        &self,
        adapter: AdapterId,
        level: FeatureLevel,
        debug: bool,
    ) -> GfxResult<DeviceId> {
        let wgpu_adapter = lock(&self.adapters)
            .get(&adapter)
            .map(|entry| entry.adapter.clone())
            .ok_or_else(|| unknown_object("create_device", adapter))?;
        if debug && !self.validation {
            log::info!("Debug device requested; create the backend with validation to enable it");
        }

        let (device, queue) = context::request_device(&wgpu_adapter, level)
            .map_err(|e| GfxError::native("create_device", e.to_string()))?;
        let id = self.next(DeviceId);
        log::info!("Logical device {id:?} created at {level:?}");
        lock(&self.devices).insert(
            id,
            WgpuDeviceEntry {
                device,
                queue,
                adapter,
                context: None,
            },
        );
        Ok(id)
    }

    fn immediate_context(&self, device: DeviceId) -> GfxResult<ContextId> {
        let mut devices = lock(&self.devices);
        let entry = devices
            .get_mut(&device)
            .ok_or_else(|| unknown_object("immediate_context", device))?;
        if let Some(context) = entry.context {
            return Ok(context);
        }
        let context = self.next(ContextId);
        entry.context = Some(context);
        drop(devices);

        lock(&self.contexts).insert(
            context,
            WgpuContextEntry {
                device,
                bound: BoundState::default(),
                encoder: None,
            },
        );
        Ok(context)
    }

    // --- Swapchain ---

    fn create_swapchain(
        &self,
        device: DeviceId,
        descriptor: &SwapchainDescriptor,
    ) -> GfxResult<SwapchainId> {
        const OP: &str = "create_swapchain";
        let adapter_id = lock(&self.devices)
            .get(&device)
            .map(|entry| entry.adapter)
            .ok_or_else(|| unknown_object(OP, device))?;
        let (adapter, factory) = lock(&self.adapters)
            .get(&adapter_id)
            .map(|entry| (entry.adapter.clone(), entry.factory))
            .ok_or_else(|| unknown_object(OP, adapter_id))?;
        let instance = self.instance(factory, OP)?;
        let (wgpu_device, _) = self.device(device, OP)?;

        if descriptor.fullscreen {
            log::warn!("Exclusive fullscreen is not supported by the WGPU backend, presenting windowed");
        }

        let surface = context::create_surface(&instance, &descriptor.window)
            .map_err(|e| GfxError::native(OP, e.to_string()))?;
        let mut config = context::surface_config(
            &surface,
            &adapter,
            descriptor.width,
            descriptor.height,
            descriptor.format,
            true,
        )
        .map_err(|e| GfxError::native(OP, e.to_string()))?;
        config.desired_maximum_frame_latency = descriptor.buffer_count.max(1);
        surface.configure(&wgpu_device, &config);

        let id = self.next(SwapchainId);
        log::info!(
            "Swapchain {id:?} configured at {}x{} {:?}",
            config.width,
            config.height,
            config.format
        );
        lock(&self.swapchains).insert(
            id,
            WgpuSwapchainEntry {
                surface,
                config,
                adapter,
                device: wgpu_device,
                device_id: device,
                frame: None,
                _window: descriptor.window.clone(),
            },
        );
        Ok(id)
    }

    fn back_buffer(&self, swapchain: SwapchainId) -> GfxResult<TextureId> {
        let (format, width, height) = lock(&self.swapchains)
            .get(&swapchain)
            .map(|entry| (entry.config.format, entry.config.width, entry.config.height))
            .ok_or_else(|| unknown_object("back_buffer", swapchain))?;
        let id = self.next(TextureId);
        lock(&self.textures).insert(
            id,
            WgpuTextureEntry {
                storage: TextureStorage::BackBuffer(swapchain),
                format,
                width,
                height,
                dynamic: false,
            },
        );
        Ok(id)
    }

    fn resize_buffers(
        &self,
        swapchain: SwapchainId,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> GfxResult<()> {
        const OP: &str = "resize_buffers";
        let referenced = lock(&self.textures).values().any(|entry| {
            matches!(entry.storage, TextureStorage::BackBuffer(owner) if owner == swapchain)
        });
        if referenced {
            return Err(GfxError::native(
                OP,
                "back buffer is still referenced by a texture or view",
            ));
        }

        let mut swapchains = lock(&self.swapchains);
        let entry = swapchains
            .get_mut(&swapchain)
            .ok_or_else(|| unknown_object(OP, swapchain))?;
        entry.frame = None;

        let mut config = context::surface_config(
            &entry.surface,
            &entry.adapter,
            width,
            height,
            format,
            entry.config.present_mode == wgpu::PresentMode::Fifo,
        )
        .map_err(|e| GfxError::native(OP, e.to_string()))?;
        config.desired_maximum_frame_latency = entry.config.desired_maximum_frame_latency;
        entry.surface.configure(&entry.device, &config);
        entry.config = config;
        Ok(())
    }

    fn present(&self, swapchain: SwapchainId, sync_interval: u32) -> GfxResult<()> {
        const OP: &str = "present";
        let device = lock(&self.swapchains)
            .get(&swapchain)
            .map(|entry| entry.device_id)
            .ok_or_else(|| unknown_object(OP, swapchain))?;
        let context = lock(&self.devices)
            .get(&device)
            .and_then(|entry| entry.context);
        if let Some(context) = context {
            self.flush(context, OP)?;
        }

        let mut swapchains = lock(&self.swapchains);
        let entry = swapchains
            .get_mut(&swapchain)
            .ok_or_else(|| unknown_object(OP, swapchain))?;
        match entry.frame.take() {
            Some(SurfaceFrame { texture, view }) => {
                drop(view);
                texture.present();
            }
            None => log::debug!("Nothing was rendered to {swapchain:?}, skipping present"),
        }

        let present_mode = context::present_mode(sync_interval > 0);
        if entry.config.present_mode != present_mode {
            entry.config.present_mode = present_mode;
            entry.surface.configure(&entry.device, &entry.config);
        }
        Ok(())
    }

    // --- Resources ---

    fn create_buffer(
        &self,
        device: DeviceId,
        descriptor: &BufferDescriptor,
        initial: &[u8],
    ) -> GfxResult<BufferId> {
        const OP: &str = "create_buffer";
        let (wgpu_device, _) = self.device(device, OP)?;
        let label = descriptor.label.as_deref();
        let buffer = validated(&wgpu_device, OP, label, || {
            wgpu_device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label,
                contents: initial,
                usage: descriptor.buffer_type.into_wgpu(),
            })
        })
        .inspect_err(|e| log::error!("{e}"))?;
        let id = self.next(BufferId);
        lock(&self.buffers).insert(
            id,
            WgpuBufferEntry {
                buffer,
                size: descriptor.size,
            },
        );
        Ok(id)
    }

    fn write_buffer(&self, context: ContextId, buffer: BufferId, data: &[u8]) -> GfxResult<()> {
        const OP: &str = "write_buffer";
        let (target, size) = lock(&self.buffers)
            .get(&buffer)
            .map(|entry| (entry.buffer.clone(), entry.size))
            .ok_or_else(|| unknown_object(OP, buffer))?;
        if data.len() as u64 > size {
            return Err(GfxError::native(
                OP,
                format!("{} bytes do not fit in {size}", data.len()),
            ));
        }

        self.flush(context, OP)?;
        let (_, queue) = self.context_device(context, OP)?;
        let aligned = data.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize);
        if aligned == data.len() {
            queue.write_buffer(&target, 0, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(aligned, 0);
            queue.write_buffer(&target, 0, &padded);
        }
        Ok(())
    }

    fn create_texture(
        &self,
        device: DeviceId,
        descriptor: &TextureDescriptor,
        initial: Option<&[u8]>,
    ) -> GfxResult<TextureId> {
        const OP: &str = "create_texture";
        let (wgpu_device, queue) = self.device(device, OP)?;
        let format: wgpu::TextureFormat = descriptor.format.into_wgpu();
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if descriptor
            .flags
            .intersects(TextureFlags::RENDER_TARGET | TextureFlags::DEPTH_STENCIL)
        {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if descriptor.flags.contains(TextureFlags::GENERATE_MIPS) {
            log::warn!("Mip generation is not supported by the WGPU backend");
        }

        let size = wgpu::Extent3d {
            width: descriptor.width,
            height: descriptor.height,
            depth_or_array_layers: 1,
        };
        if let Some(data) = initial {
            if (data.len() as u64) < descriptor.byte_size() {
                return Err(GfxError::native(
                    OP,
                    format!(
                        "{} bytes of initial data for a {}-byte texture",
                        data.len(),
                        descriptor.byte_size()
                    ),
                ));
            }
        }

        let label = descriptor.label.as_deref();
        let texture = validated(&wgpu_device, OP, label, || {
            let texture = wgpu_device.create_texture(&wgpu::TextureDescriptor {
                label,
                size,
                mip_level_count: descriptor.mip_levels.max(1),
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            });
            if let Some(data) = initial {
                upload_texture(&queue, &texture, data, descriptor.format.bytes_per_pixel());
            }
            texture
        })
        .inspect_err(|e| log::error!("{e}"))?;

        let id = self.next(TextureId);
        lock(&self.textures).insert(
            id,
            WgpuTextureEntry {
                storage: TextureStorage::Owned(texture),
                format,
                width: descriptor.width,
                height: descriptor.height,
                dynamic: descriptor.flags.contains(TextureFlags::DYNAMIC),
            },
        );
        Ok(id)
    }

    fn write_texture(&self, context: ContextId, texture: TextureId, data: &[u8]) -> GfxResult<()> {
        const OP: &str = "write_texture";
        let (target, format, width, height) = {
            let textures = lock(&self.textures);
            let entry = textures
                .get(&texture)
                .ok_or_else(|| unknown_object(OP, texture))?;
            let TextureStorage::Owned(target) = &entry.storage else {
                return Err(GfxError::native(OP, "back buffers cannot be written"));
            };
            if !entry.dynamic {
                return Err(GfxError::native(OP, "texture was not created dynamic"));
            }
            (target.clone(), entry.format, entry.width, entry.height)
        };
        let bytes_per_pixel = format.block_copy_size(None).unwrap_or(4);
        if (data.len() as u64) < u64::from(width * height * bytes_per_pixel) {
            return Err(GfxError::native(OP, "data is smaller than the texture"));
        }

        self.flush(context, OP)?;
        let (_, queue) = self.context_device(context, OP)?;
        upload_texture(&queue, &target, data, bytes_per_pixel);
        Ok(())
    }

    fn create_view(&self, _device: DeviceId, texture: TextureId, kind: ViewKind) -> GfxResult<ViewId> {
        let view = {
            let textures = lock(&self.textures);
            let entry = textures
                .get(&texture)
                .ok_or_else(|| unknown_object("create_view", texture))?;
            match &entry.storage {
                TextureStorage::Owned(texture) => {
                    Some(texture.create_view(&wgpu::TextureViewDescriptor {
                        label: Some(match kind {
                            ViewKind::RenderTarget => "Lumen Render Target View",
                            ViewKind::DepthStencil => "Lumen Depth Stencil View",
                            ViewKind::ShaderResource => "Lumen Shader Resource View",
                        }),
                        ..Default::default()
                    }))
                }
                TextureStorage::BackBuffer(_) => None,
            }
        };
        let id = self.next(ViewId);
        lock(&self.views).insert(id, WgpuViewEntry { texture, view });
        Ok(id)
    }

    // --- Shaders and state objects ---

    fn compile_shader(
        &self,
        source: &str,
        descriptor: &ShaderSourceDescriptor,
    ) -> GfxResult<ShaderBlobId> {
        let entry_point = descriptor.entry_point.as_ref();
        if !source.contains(entry_point) {
            return Err(GfxError::native(
                "compile_shader",
                format!("entry point '{entry_point}' not found in '{}'", descriptor.label),
            ));
        }
        let id = self.next(ShaderBlobId);
        lock(&self.blobs).insert(
            id,
            ShaderBlob {
                label: descriptor.label.to_string(),
                source: source.to_string(),
                entry_point: entry_point.to_string(),
                kind: descriptor.target.kind,
            },
        );
        Ok(id)
    }

    fn create_program(&self, device: DeviceId, blob: ShaderBlobId) -> GfxResult<ProgramId> {
        const OP: &str = "create_program";
        let (label, source, entry_point) = lock(&self.blobs)
            .get(&blob)
            .map(|blob| (blob.label.clone(), blob.source.clone(), blob.entry_point.clone()))
            .ok_or_else(|| unknown_object(OP, blob))?;
        let (wgpu_device, _) = self.device(device, OP)?;

        let module = validated(&wgpu_device, OP, Some(&label), || {
            wgpu_device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;

        let id = self.next(ProgramId);
        lock(&self.programs).insert(
            id,
            WgpuProgramEntry {
                module,
                entry_point,
            },
        );
        Ok(id)
    }

    fn create_input_layout(
        &self,
        _device: DeviceId,
        blob: ShaderBlobId,
        elements: &[InputElement],
    ) -> GfxResult<InputLayoutId> {
        let kind = lock(&self.blobs)
            .get(&blob)
            .map(|blob| blob.kind)
            .ok_or_else(|| unknown_object("create_input_layout", blob))?;
        if kind != ShaderKind::Vertex {
            return Err(GfxError::native(
                "create_input_layout",
                format!("{kind:?} shaders have no vertex input"),
            ));
        }
        let id = self.next(InputLayoutId);
        lock(&self.input_layouts).insert(id, elements.to_vec());
        Ok(id)
    }

    fn create_raster_state(
        &self,
        _device: DeviceId,
        descriptor: &RasterDescriptor,
    ) -> GfxResult<RasterStateId> {
        let id = self.next(RasterStateId);
        lock(&self.raster_states).insert(id, *descriptor);
        Ok(id)
    }

    fn create_blend_state(
        &self,
        _device: DeviceId,
        descriptor: &BlendDescriptor,
    ) -> GfxResult<BlendStateId> {
        let id = self.next(BlendStateId);
        lock(&self.blend_states).insert(id, *descriptor);
        Ok(id)
    }

    fn create_depth_state(
        &self,
        _device: DeviceId,
        descriptor: &DepthDescriptor,
    ) -> GfxResult<DepthStateId> {
        let id = self.next(DepthStateId);
        lock(&self.depth_states).insert(id, *descriptor);
        Ok(id)
    }

    fn create_sampler(&self, device: DeviceId, descriptor: &SamplerDescriptor) -> GfxResult<SamplerId> {
        let (wgpu_device, _) = self.device(device, "create_sampler")?;
        let sampler = wgpu_device.create_sampler(&descriptor.into_wgpu());
        let id = self.next(SamplerId);
        lock(&self.samplers).insert(id, sampler);
        Ok(id)
    }

    // --- Immediate context ---

    fn set_render_targets(
        &self,
        context: ContextId,
        render_target: Option<ViewId>,
        depth_stencil: Option<ViewId>,
    ) {
        self.with_bound(context, |bound| {
            bound.render_target = render_target;
            bound.depth_stencil = depth_stencil;
        });
    }

    fn set_viewport(&self, context: ContextId, viewport: &Viewport) {
        let viewport = *viewport;
        self.with_bound(context, |bound| bound.viewport = Some(viewport));
    }

    fn clear_render_target(&self, context: ContextId, view: ViewId, color: [f32; 4]) {
        const OP: &str = "clear_render_target";
        let cleared = self.resolve_view(view, OP).and_then(|(target, _)| {
            self.record(context, OP, |encoder| {
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Lumen Clear Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: f64::from(color[0]),
                                g: f64::from(color[1]),
                                b: f64::from(color[2]),
                                a: f64::from(color[3]),
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
            })
        });
        if let Err(e) = cleared {
            log::error!("Failed to clear {view:?}: {e}");
        }
    }

    fn clear_depth_stencil(&self, context: ContextId, view: ViewId, depth: f32, stencil: u8) {
        const OP: &str = "clear_depth_stencil";
        let cleared = self.resolve_view(view, OP).and_then(|(target, format)| {
            self.record(context, OP, |encoder| {
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Lumen Clear Pass"),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &target,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(depth),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: format.has_stencil_aspect().then_some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(u32::from(stencil)),
                            store: wgpu::StoreOp::Store,
                        }),
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
            })
        });
        if let Err(e) = cleared {
            log::error!("Failed to clear {view:?}: {e}");
        }
    }

    fn bind_vertex_shader(&self, context: ContextId, program: Option<ProgramId>) {
        self.with_bound(context, |bound| bound.vertex_shader = program);
    }

    fn bind_pixel_shader(&self, context: ContextId, program: Option<ProgramId>) {
        self.with_bound(context, |bound| bound.pixel_shader = program);
    }

    fn bind_input_layout(&self, context: ContextId, layout: Option<InputLayoutId>) {
        self.with_bound(context, |bound| bound.input_layout = layout);
    }

    fn set_primitive_topology(&self, context: ContextId, topology: PrimitiveTopology) {
        self.with_bound(context, |bound| bound.topology = topology);
    }

    fn bind_raster_state(&self, context: ContextId, state: RasterStateId) {
        self.with_bound(context, |bound| bound.raster = Some(state));
    }

    fn bind_blend_state(&self, context: ContextId, state: BlendStateId) {
        self.with_bound(context, |bound| bound.blend = Some(state));
    }

    fn bind_depth_state(&self, context: ContextId, state: DepthStateId, stencil_ref: u32) {
        self.with_bound(context, |bound| {
            bound.depth = Some(state);
            bound.stencil_ref = stencil_ref;
        });
    }

    fn bind_samplers(
        &self,
        context: ContextId,
        stage: ShaderKind,
        start_slot: u32,
        samplers: &[SamplerId],
    ) {
        if stage != ShaderKind::Pixel || start_slot != 0 || samplers.len() > 1 {
            log::warn!("Only pixel sampler slot 0 is supported, ignoring {stage:?} slot {start_slot}+");
        }
        if stage == ShaderKind::Pixel && start_slot == 0 {
            let sampler = samplers.first().copied();
            self.with_bound(context, |bound| bound.sampler = sampler);
        }
    }

    fn bind_shader_resources(
        &self,
        context: ContextId,
        stage: ShaderKind,
        start_slot: u32,
        views: &[ViewId],
    ) {
        if stage != ShaderKind::Pixel || start_slot != 0 || views.len() > 1 {
            log::warn!("Only pixel texture slot 0 is supported, ignoring {stage:?} slot {start_slot}+");
        }
        if stage == ShaderKind::Pixel && start_slot == 0 {
            let view = views.first().copied();
            self.with_bound(context, |bound| bound.texture = view);
        }
    }

    fn bind_constant_buffer(
        &self,
        context: ContextId,
        stage: ShaderKind,
        slot: u32,
        buffer: Option<BufferId>,
    ) {
        match (stage, slot) {
            (ShaderKind::Vertex, 0) => {
                self.with_bound(context, |bound| bound.vertex_constants = buffer)
            }
            (ShaderKind::Pixel, 0) => {
                self.with_bound(context, |bound| bound.pixel_constants = buffer)
            }
            _ => log::warn!("Ignoring constant buffer for {stage:?} slot {slot}"),
        }
    }

    fn bind_vertex_buffer(
        &self,
        context: ContextId,
        slot: u32,
        buffer: Option<BufferId>,
        stride: u32,
        offset: u32,
    ) {
        let Some(index) = (slot < 2).then_some(slot as usize) else {
            log::warn!("Ignoring vertex buffer for slot {slot}");
            return;
        };
        let binding = buffer.map(|buffer| VertexBinding {
            buffer,
            stride,
            offset,
        });
        self.with_bound(context, |bound| bound.vertex_buffers[index] = binding);
    }

    fn bind_index_buffer(
        &self,
        context: ContextId,
        buffer: Option<BufferId>,
        format: IndexFormat,
        offset: u32,
    ) {
        let binding = buffer.map(|buffer| (buffer, format, offset));
        self.with_bound(context, |bound| bound.index_buffer = binding);
    }

    fn draw(&self, context: ContextId, vertex_count: u32, start_vertex: u32) -> GfxResult<()> {
        self.draw_with(
            context,
            "draw",
            DrawCall::Vertices {
                vertices: start_vertex..start_vertex + vertex_count,
                instances: 0..1,
            },
        )
    }

    fn draw_indexed(
        &self,
        context: ContextId,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> GfxResult<()> {
        self.draw_with(
            context,
            "draw_indexed",
            DrawCall::Indexed {
                indices: start_index..start_index + index_count,
                base_vertex,
                instances: 0..1,
            },
        )
    }

    fn draw_instanced(
        &self,
        context: ContextId,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) -> GfxResult<()> {
        self.draw_with(
            context,
            "draw_instanced",
            DrawCall::Vertices {
                vertices: start_vertex..start_vertex + vertex_count,
                instances: start_instance..start_instance + instance_count,
            },
        )
    }

    fn draw_indexed_instanced(
        &self,
        context: ContextId,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) -> GfxResult<()> {
        self.draw_with(
            context,
            "draw_indexed_instanced",
            DrawCall::Indexed {
                indices: start_index..start_index + index_count,
                base_vertex,
                instances: start_instance..start_instance + instance_count,
            },
        )
    }

    // --- Lifetime ---

    fn release(&self, handle: NativeHandle) {
        let released = match handle {
            NativeHandle::Factory(id) => lock(&self.factories).remove(&id).is_some(),
            NativeHandle::Adapter(id) => lock(&self.adapters).remove(&id).is_some(),
            NativeHandle::Device(id) => lock(&self.devices).remove(&id).is_some(),
            NativeHandle::Context(id) => {
                let entry = lock(&self.contexts).remove(&id);
                if let Some(device) = entry.as_ref().map(|entry| entry.device) {
                    if let Some(owner) = lock(&self.devices).get_mut(&device) {
                        owner.context = None;
                    }
                }
                entry.is_some()
            }
            NativeHandle::Swapchain(id) => lock(&self.swapchains).remove(&id).is_some(),
            NativeHandle::Buffer(id) => lock(&self.buffers)
                .remove(&id)
                .map(|entry| entry.buffer.destroy())
                .is_some(),
            NativeHandle::Texture(id) => lock(&self.textures)
                .remove(&id)
                .map(|entry| {
                    if let TextureStorage::Owned(texture) = entry.storage {
                        texture.destroy();
                    }
                })
                .is_some(),
            NativeHandle::View(id) => lock(&self.views).remove(&id).is_some(),
            NativeHandle::ShaderBlob(id) => lock(&self.blobs).remove(&id).is_some(),
            NativeHandle::Program(id) => lock(&self.programs).remove(&id).is_some(),
            NativeHandle::InputLayout(id) => lock(&self.input_layouts).remove(&id).is_some(),
            NativeHandle::RasterState(id) => lock(&self.raster_states).remove(&id).is_some(),
            NativeHandle::BlendState(id) => lock(&self.blend_states).remove(&id).is_some(),
            NativeHandle::DepthState(id) => lock(&self.depth_states).remove(&id).is_some(),
            NativeHandle::Sampler(id) => lock(&self.samplers).remove(&id).is_some(),
        };
        if released {
            // Draws resolve every bound slot, so none may name a dead object.
            for entry in lock(&self.contexts).values_mut() {
                entry.bound.forget(handle);
            }
            lock(&self.pipelines).evict(handle);
            log::trace!("Released {handle:?}");
        }
    }
}

/// Runs `create` inside a validation error scope so a rejected descriptor
/// surfaces as an error instead of an invalid object.
fn validated<T>(
    device: &wgpu::Device,
    operation: &'static str,
    label: Option<&str>,
    create: impl FnOnce() -> T,
) -> GfxResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let created = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(GfxError::native(
            operation,
            format!("'{}': {error}", label.unwrap_or("unlabelled")),
        )),
        None => Ok(created),
    }
}

/// Writes tightly packed texel rows into mip 0 of `texture`.
fn upload_texture(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &[u8], bytes_per_pixel: u32) {
    let size = texture.size();
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * bytes_per_pixel),
            rows_per_image: Some(size.height),
        },
        wgpu::Extent3d {
            depth_or_array_layers: 1,
            ..size
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    const SOURCE: &str = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";

    fn descriptor(entry_point: &'static str, kind: ShaderKind) -> ShaderSourceDescriptor<'static> {
        ShaderSourceDescriptor {
            label: Cow::Borrowed("test.wgsl"),
            entry_point: Cow::Borrowed(entry_point),
            target: ShaderTarget {
                kind,
                major: 5,
                minor: 0,
            },
        }
    }

    #[test]
    fn test_compile_shader_requires_entry_point() {
        let api = WgpuApi::default();

        let found = api.compile_shader(SOURCE, &descriptor("vs_main", ShaderKind::Vertex));
        let missing = api.compile_shader(SOURCE, &descriptor("ps_main", ShaderKind::Pixel));

        assert!(found.is_ok());
        assert!(matches!(missing, Err(GfxError::Native { .. })));
    }

    #[test]
    fn test_input_layout_needs_vertex_blob() {
        let api = WgpuApi::default();
        let vertex = api
            .compile_shader(SOURCE, &descriptor("vs_main", ShaderKind::Vertex))
            .unwrap();
        let pixel = api
            .compile_shader(SOURCE, &descriptor("vs_main", ShaderKind::Pixel))
            .unwrap();
        let elements = VertexFormat::PositionUv.input_layout();

        assert!(api.create_input_layout(DeviceId(0), vertex, &elements).is_ok());
        assert!(api.create_input_layout(DeviceId(0), pixel, &elements).is_err());
    }

    #[test]
    fn test_release_removes_state_objects_once() {
        let api = WgpuApi::default();
        let raster = api
            .create_raster_state(DeviceId(0), &RasterDescriptor::default())
            .unwrap();
        let blend = api
            .create_blend_state(DeviceId(0), &BlendDescriptor::ALPHA_BLEND)
            .unwrap();

        api.release(raster.into());
        api.release(raster.into());

        assert!(lock(&api.raster_states).is_empty());
        assert_eq!(lock(&api.blend_states).get(&blend), Some(&BlendDescriptor::ALPHA_BLEND));
    }

    #[test]
    fn test_unknown_objects_are_reported() {
        let api = WgpuApi::default();

        assert!(api.immediate_context(DeviceId(42)).is_err());
        assert!(api.back_buffer(SwapchainId(7)).is_err());
        assert!(api.draw(ContextId(3), 3, 0).is_err());
        // Binds on an unknown context are logged and dropped.
        api.bind_vertex_shader(ContextId(3), None);
    }

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let api = WgpuApi::default();
        let raster = api
            .create_raster_state(DeviceId(0), &RasterDescriptor::default())
            .unwrap();
        let depth = api
            .create_depth_state(DeviceId(0), &DepthDescriptor::default())
            .unwrap();

        assert_ne!(raster.0, depth.0);
    }

    #[test]
    fn test_release_unbinds_the_object_from_every_context() {
        // Arrange
        let api = WgpuApi::default();
        let raster = api
            .create_raster_state(DeviceId(0), &RasterDescriptor::default())
            .unwrap();
        let blend = api
            .create_blend_state(DeviceId(0), &BlendDescriptor::ALPHA_BLEND)
            .unwrap();
        let bound = BoundState {
            raster: Some(raster),
            blend: Some(blend),
            ..BoundState::default()
        };
        for context in [ContextId(100), ContextId(101)] {
            lock(&api.contexts).insert(
                context,
                WgpuContextEntry {
                    device: DeviceId(0),
                    bound,
                    encoder: None,
                },
            );
        }

        // Act
        api.release(raster.into());

        // Assert
        for entry in lock(&api.contexts).values() {
            assert_eq!(entry.bound.raster, None);
            assert_eq!(entry.bound.blend, Some(blend));
        }
    }

    #[test]
    fn test_forget_clears_only_matching_slots() {
        let (texture, other) = (ViewId(1), ViewId(2));
        let (constants, vertices) = (BufferId(3), BufferId(4));
        let mut bound = BoundState {
            render_target: Some(other),
            texture: Some(texture),
            pixel_constants: Some(constants),
            vertex_buffers: [
                Some(VertexBinding {
                    buffer: vertices,
                    stride: 12,
                    offset: 0,
                }),
                Some(VertexBinding {
                    buffer: constants,
                    stride: 64,
                    offset: 0,
                }),
            ],
            index_buffer: Some((vertices, IndexFormat::Uint16, 0)),
            ..BoundState::default()
        };

        bound.forget(texture.into());
        bound.forget(vertices.into());

        assert_eq!(bound.texture, None);
        assert_eq!(bound.render_target, Some(other));
        assert_eq!(bound.pixel_constants, Some(constants));
        assert!(bound.vertex_buffers[0].is_none());
        assert!(bound.vertex_buffers[1].is_some_and(|binding| binding.buffer == constants));
        assert!(bound.index_buffer.is_none());
    }

    #[test]
    fn test_oversized_texture_is_a_native_error() {
        let api = WgpuApi::default();
        let factory = api.create_factory().unwrap();
        // Machines without an adapter have nothing to validate against.
        let Ok(adapter) = api.open_adapter(factory, 0) else {
            return;
        };
        let Ok(device) = api.create_device(adapter, FeatureLevel::L11_0, false) else {
            return;
        };
        let oversized = TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 1 << 20, 4);
        let fitting = TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 4, 4);

        let oversized = api.create_texture(device, &oversized, None);
        let fitting = api.create_texture(device, &fitting, None);

        assert!(matches!(oversized, Err(GfxError::Native { .. })));
        assert!(fitting.is_ok());
        assert_eq!(lock(&api.textures).len(), 1);
    }
}
