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

//! The ordered draw submission protocol.
//!
//! [`Renderer::submit`] always runs the same sequence:
//!
//! 1. set the supplied vertex and pixel shader variables,
//! 2. interleave vertices and flatten indices on the CPU,
//! 3. bind vertex shader, pixel shader, input layout, topology, rasterizer,
//!    blend and (optionally) depth state,
//! 4. bind the sampler and texture views when the pixel shader reads textures,
//! 5. pack, upload and bind each stage's constants when it has any,
//! 6. upload and bind the vertex, index and instance streams,
//! 7. issue the draw.

use crate::gfx::api::*;
use crate::gfx::buffer::Buffer;
use crate::gfx::device::Device;
use crate::gfx::error::{GfxError, GfxResult};
use crate::gfx::packer::{pack_indices, pack_instances, pack_vertices, Mat4, Mesh};
use crate::gfx::shader::Shader;
use crate::gfx::shader_var::ShaderValue;
use crate::gfx::state_cache::StateObjects;

/// Smallest scratch buffer allocated when a stream outgrows its buffer.
const MIN_SCRATCH_BYTES: u64 = 256;

/// Sampler slot used for pixel-shader textures.
pub const SAMPLER_SLOT: u32 = 0;

/// Everything needed for one draw.
#[derive(Debug)]
pub struct DrawUnit<'a> {
    /// Geometry to draw, interleaved in the vertex shader's
    /// [`Shader::vertex_format`].
    pub mesh: &'a Mesh,
    /// Vertex stage.
    pub vertex_shader: &'a mut Shader,
    /// Pixel stage.
    pub pixel_shader: &'a mut Shader,
    /// Values set on the vertex shader before packing.
    pub vertex_vars: Vec<(&'a str, ShaderValue<'a>)>,
    /// Values set on the pixel shader before packing.
    pub pixel_vars: Vec<(&'a str, ShaderValue<'a>)>,
    /// Per-instance transforms for instanced vertex formats.
    pub instances: &'a [Mat4],
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Rasterizer state.
    pub raster: RasterDescriptor,
    /// Blend state.
    pub blend: BlendDescriptor,
    /// Depth-stencil state; `None` keeps whatever is bound.
    pub depth: Option<DepthDescriptor>,
    /// Sampler for pixel-shader textures.
    pub sampler: SamplerDescriptor,
}

impl<'a> DrawUnit<'a> {
    /// A draw with default states and no variables.
    pub fn new(mesh: &'a Mesh, vertex_shader: &'a mut Shader, pixel_shader: &'a mut Shader) -> Self {
        Self {
            mesh,
            vertex_shader,
            pixel_shader,
            vertex_vars: Vec::new(),
            pixel_vars: Vec::new(),
            instances: &[],
            topology: PrimitiveTopology::TriangleList,
            raster: RasterDescriptor::default(),
            blend: BlendDescriptor::default(),
            depth: None,
            sampler: SamplerDescriptor::default(),
        }
    }

    /// Adds a vertex-shader variable.
    pub fn vertex_var(mut self, name: &'a str, value: ShaderValue<'a>) -> Self {
        self.vertex_vars.push((name, value));
        self
    }

    /// Adds a pixel-shader variable.
    pub fn pixel_var(mut self, name: &'a str, value: ShaderValue<'a>) -> Self {
        self.pixel_vars.push((name, value));
        self
    }

    /// Sets the per-instance transforms.
    pub fn with_instances(mut self, instances: &'a [Mat4]) -> Self {
        self.instances = instances;
        self
    }
}

/// What one submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawStats {
    /// Draw calls issued (0 or 1).
    pub draw_calls: u32,
    /// Vertices drawn.
    pub vertices: u32,
    /// Indices drawn.
    pub indices: u32,
    /// Instances drawn.
    pub instances: u32,
    /// Bytes handed to the GPU (constants and streams).
    pub uploaded_bytes: u64,
}

/// Totals since the last [`Renderer::begin_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Accumulated submission stats.
    pub totals: DrawStats,
    /// Submissions skipped because a shader was broken or there was nothing to draw.
    pub skipped: u32,
}

impl FrameStats {
    fn record(&mut self, draw: &DrawStats) {
        if draw.draw_calls == 0 {
            self.skipped += 1;
        }
        self.totals.draw_calls += draw.draw_calls;
        self.totals.vertices += draw.vertices;
        self.totals.indices += draw.indices;
        self.totals.instances += draw.instances;
        self.totals.uploaded_bytes += draw.uploaded_bytes;
    }
}

/// Owns the scratch memory and state caches shared by every draw.
///
/// Submission needs `&mut self`, so draws are serialized by construction.
/// Call [`Renderer::release`] before dropping the device.
#[derive(Debug)]
pub struct Renderer {
    vertices: Vec<u8>,
    indices: Vec<u8>,
    instances: Vec<u8>,
    constants: Vec<u8>,
    vertex_buffer: Option<Buffer>,
    index_buffer: Option<Buffer>,
    instance_buffer: Option<Buffer>,
    states: StateObjects,
    stats: FrameStats,
}

impl Renderer {
    /// Creates the renderer with dynamic vertex and index scratch buffers.
    ///
    /// ## Arguments
    /// * `vertex_bytes` - Initial vertex buffer capacity in bytes.
    /// * `index_count` - Initial index buffer capacity in 32-bit indices.
    pub fn new(device: &Device, vertex_bytes: u64, index_count: u64) -> GfxResult<Self> {
        let mut vertex_buffer = Buffer::new(
            device,
            None,
            vertex_bytes,
            BufferType::Vertex,
            BufferUsage::Dynamic,
        )?;
        let index_buffer = match Buffer::new(
            device,
            None,
            index_count * IndexFormat::Uint32.size() as u64,
            BufferType::Index,
            BufferUsage::Dynamic,
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                vertex_buffer.free(device);
                return Err(e);
            }
        };

        Ok(Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            instances: Vec::new(),
            constants: Vec::new(),
            vertex_buffer: Some(vertex_buffer),
            index_buffer: Some(index_buffer),
            instance_buffer: None,
            states: StateObjects::new(),
            stats: FrameStats::default(),
        })
    }

    /// Resets the frame stats, binds the swapchain targets and clears them.
    pub fn begin_frame(&mut self, device: &mut Device, clear_color: [f32; 4]) -> GfxResult<()> {
        self.stats = FrameStats::default();
        device.begin_frame(clear_color)
    }

    /// Runs the submission protocol for `unit`.
    ///
    /// ## Errors
    /// * `Error` - the swapchain is resizing or missing, or a native call failed.
    /// * `NotFound`/`Unknown` - a supplied variable is undeclared or mistyped.
    /// * `Unknown` - the vertex shader was built without a vertex format.
    /// * `NoData` - the mesh lacks an attribute the vertex format needs.
    ///
    /// A broken shader is not an error: the draw is skipped with a warning.
    pub fn submit(&mut self, device: &mut Device, unit: DrawUnit<'_>) -> GfxResult<DrawStats> {
        device.ensure_bindable("submit draw")?;
        let DrawUnit {
            mesh,
            vertex_shader,
            pixel_shader,
            vertex_vars,
            pixel_vars,
            instances,
            topology,
            raster,
            blend,
            depth,
            sampler,
        } = unit;

        if vertex_shader.is_broken() || pixel_shader.is_broken() {
            log::warn!("Skipping draw: vertex or pixel shader is not built");
            return Ok(self.finish(DrawStats::default()));
        }
        // The stream is packed in the format the bound input layout was built from.
        let vertex_format = vertex_shader.vertex_format().ok_or_else(|| {
            log::error!("Vertex shader has no input layout to pack vertices for");
            GfxError::unknown("vertex format", None::<VertexFormat>)
        })?;

        // 1. Shader variables.
        for (name, value) in vertex_vars {
            vertex_shader.set_var_by_name(name, value)?;
        }
        for (name, value) in pixel_vars {
            pixel_shader.set_var_by_name(name, value)?;
        }

        // 2. CPU-side streams.
        let vertex_count = pack_vertices(mesh, vertex_format, &mut self.vertices)?;
        let index_count = pack_indices(mesh, &mut self.indices);
        let instance_count = if vertex_format.is_instanced() {
            pack_instances(instances, &mut self.instances)
        } else {
            0
        };
        if vertex_count == 0 || (vertex_format.is_instanced() && instance_count == 0) {
            log::debug!("Skipping empty draw ({vertex_count} vertices, {instance_count} instances)");
            return Ok(self.finish(DrawStats::default()));
        }

        // 3. Shaders and fixed-function state.
        let context = device.context_id();
        vertex_shader.bind(device)?;
        pixel_shader.bind(device)?;
        vertex_shader.bind_input_layout(device)?;
        device.api().set_primitive_topology(context, topology);
        let raster = self.states.configure_raster_state(device, &raster)?;
        device.api().bind_raster_state(context, raster);
        let blend = self.states.configure_blend_state(device, &blend)?;
        device.api().bind_blend_state(context, blend);
        if let Some(depth) = depth {
            let depth = self.states.configure_depth_state(device, &depth)?;
            device.api().bind_depth_state(context, depth, 0);
        }

        // 4. Sampler and textures.
        if pixel_shader.vars().has_textures() {
            let sampler = self
                .states
                .configure_sampler_state(device, SAMPLER_SLOT, &sampler)?;
            device
                .api()
                .bind_samplers(context, ShaderKind::Pixel, SAMPLER_SLOT, &[sampler]);
            let views = pixel_shader.vars().textures();
            if !views.is_empty() {
                device
                    .api()
                    .bind_shader_resources(context, ShaderKind::Pixel, 0, &views);
            }
        }

        // 5. Constants.
        let mut uploaded = vertex_shader.upload_constants(device, &mut self.constants)? as u64;
        uploaded += pixel_shader.upload_constants(device, &mut self.constants)? as u64;

        // 6. GPU streams.
        let vertex_buffer = upload(
            &mut self.vertex_buffer,
            device,
            BufferType::Vertex,
            &self.vertices,
        )?;
        device.api().bind_vertex_buffer(
            context,
            VERTEX_SLOT,
            vertex_buffer,
            vertex_format.stride(),
            0,
        );
        uploaded += self.vertices.len() as u64;

        if index_count > 0 {
            let index_buffer =
                upload(&mut self.index_buffer, device, BufferType::Index, &self.indices)?;
            device
                .api()
                .bind_index_buffer(context, index_buffer, IndexFormat::Uint32, 0);
            uploaded += self.indices.len() as u64;
        }

        if instance_count > 0 {
            let instance_buffer = upload(
                &mut self.instance_buffer,
                device,
                BufferType::Vertex,
                &self.instances,
            )?;
            device.api().bind_vertex_buffer(
                context,
                INSTANCE_SLOT,
                instance_buffer,
                INSTANCE_STRIDE,
                0,
            );
            uploaded += self.instances.len() as u64;
        }

        // 7. Draw.
        let api = device.api();
        let drawn = match (index_count > 0, instance_count > 0) {
            (false, false) => api.draw(context, vertex_count, 0),
            (true, false) => api.draw_indexed(context, index_count, 0, 0),
            (false, true) => api.draw_instanced(context, vertex_count, instance_count, 0, 0),
            (true, true) => {
                api.draw_indexed_instanced(context, index_count, instance_count, 0, 0, 0)
            }
        };
        drawn.inspect_err(|e| log::error!("Draw failed: {e}"))?;

        Ok(self.finish(DrawStats {
            draw_calls: 1,
            vertices: vertex_count,
            indices: index_count,
            instances: instance_count,
            uploaded_bytes: uploaded,
        }))
    }

    fn finish(&mut self, draw: DrawStats) -> DrawStats {
        self.stats.record(&draw);
        draw
    }

    /// Totals since the last [`Renderer::begin_frame`].
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// The rasterizer, blend and depth caches.
    pub fn states(&self) -> &StateObjects {
        &self.states
    }

    /// Capacity of the vertex scratch buffer in bytes.
    pub fn vertex_capacity(&self) -> u64 {
        self.vertex_buffer.as_ref().map_or(0, Buffer::size)
    }

    /// Frees the scratch buffers and cached state objects.
    pub fn release(&mut self, device: &Device) {
        for mut buffer in [
            self.instance_buffer.take(),
            self.index_buffer.take(),
            self.vertex_buffer.take(),
        ]
        .into_iter()
        .flatten()
        {
            buffer.free(device);
        }
        self.states.release(device);
    }
}

/// Copies `bytes` into the scratch buffer in `slot`, recreating it larger if
/// it is missing or too small.
fn upload(
    slot: &mut Option<Buffer>,
    device: &Device,
    buffer_type: BufferType,
    bytes: &[u8],
) -> GfxResult<Option<BufferId>> {
    let needed = bytes.len() as u64;
    let capacity = slot.as_ref().map_or(0, Buffer::size);
    if needed > capacity {
        let size = needed.next_power_of_two().max(MIN_SCRATCH_BYTES);
        log::debug!("Growing {buffer_type:?} scratch buffer from {capacity} to {size} bytes");
        if let Some(mut old) = slot.take() {
            old.free(device);
        }
        *slot = Some(Buffer::new(
            device,
            None,
            size,
            buffer_type,
            BufferUsage::Dynamic,
        )?);
    }

    let buffer = slot.as_mut().ok_or(GfxError::Null {
        what: "scratch buffer",
    })?;
    buffer.copy(device, bytes)?;
    Ok(buffer.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::mock::{HeadlessWindow, MockApi, MockCall};
    use crate::gfx::shader_var::{ShaderVar, VarType};
    use std::sync::Arc;

    const SOURCE: &str = "fn vs_main() {} fn ps_main() {}";

    fn device() -> (Arc<MockApi>, Device) {
        let api = Arc::new(MockApi::new());
        let config = GfxConfig::default().with_window(Arc::new(HeadlessWindow::default()));
        (api.clone(), Device::initialize(api, &config).unwrap())
    }

    fn shaders(device: &Device, format: VertexFormat) -> (Shader, Shader) {
        let mut vs = Shader::new(ShaderKind::Vertex);
        vs.compile_from_source(device, "vs", SOURCE, "vs_main", "vs_5_0")
            .unwrap();
        vs.build_program(device, Some(format)).unwrap();
        let mut ps = Shader::new(ShaderKind::Pixel);
        ps.compile_from_source(device, "ps", SOURCE, "ps_main", "ps_5_0")
            .unwrap();
        ps.build_program(device, None).unwrap();
        (vs, ps)
    }

    fn triangle() -> Mesh {
        Mesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            colors: vec![[1.0; 4]; 3],
            triangles: vec![[0, 1, 2]],
            ..Mesh::default()
        }
    }

    #[test]
    fn binds_follow_the_protocol_order() {
        let (api, mut device) = device();
        let (mut vs, mut ps) = shaders(&device, VertexFormat::PositionColor);
        vs.add_var(ShaderVar::new("world", VarType::Mat4));
        let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
        let mesh = triangle();
        let world = [1.0f32; 16];
        api.clear_calls();

        let unit = DrawUnit::new(&mesh, &mut vs, &mut ps)
            .vertex_var("world", ShaderValue::of(&world));
        let stats = renderer.submit(&mut device, unit).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.indices, 3);

        let pos = |pred: fn(&MockCall) -> bool| api.position(pred).unwrap();
        let order = [
            pos(|c| matches!(c, MockCall::BindVertexShader(Some(_)))),
            pos(|c| matches!(c, MockCall::BindPixelShader(Some(_)))),
            pos(|c| matches!(c, MockCall::BindInputLayout(Some(_)))),
            pos(|c| matches!(c, MockCall::BindRasterState(_))),
            pos(|c| matches!(c, MockCall::BindBlendState(_))),
            pos(|c| matches!(c, MockCall::BindConstantBuffer { .. })),
            pos(|c| matches!(c, MockCall::BindVertexBuffer { .. })),
            pos(|c| matches!(c, MockCall::BindIndexBuffer { .. })),
            pos(|c| matches!(c, MockCall::DrawIndexed { .. })),
        ];
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{order:?}");
    }

    #[test]
    fn pixel_textures_bind_a_sampler_first() {
        let (api, mut device) = device();
        let (mut vs, mut ps) = shaders(&device, VertexFormat::PositionColor);
        ps.add_var(ShaderVar::new("albedo", VarType::Texture));
        let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
        let mesh = triangle();

        let unit = DrawUnit::new(&mesh, &mut vs, &mut ps)
            .pixel_var("albedo", ShaderValue::Texture(ViewId(42)));
        renderer.submit(&mut device, unit).unwrap();

        let sampler = api
            .position(|c| matches!(c, MockCall::BindSamplers { .. }))
            .unwrap();
        let views = api
            .position(|c| {
                matches!(c, MockCall::BindShaderResources { views, .. } if views == &[ViewId(42)])
            })
            .unwrap();
        assert!(sampler < views);
        assert_eq!(device.sampler_rebuilds(SAMPLER_SLOT), 1);
    }

    #[test]
    fn broken_shaders_skip_the_draw() {
        let (api, mut device) = device();
        let (mut vs, _) = shaders(&device, VertexFormat::PositionColor);
        let mut broken = Shader::new(ShaderKind::Pixel);
        let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
        let mesh = triangle();

        let stats = renderer
            .submit(
                &mut device,
                DrawUnit::new(&mesh, &mut vs, &mut broken),
            )
            .unwrap();
        assert_eq!(stats, DrawStats::default());
        assert_eq!(renderer.stats().skipped, 1);
        assert_eq!(api.count(MockCall::is_draw), 0);
    }

    #[test]
    fn instanced_draws_bind_the_instance_stream() {
        let (api, mut device) = device();
        let format = VertexFormat::PositionColorInstanced;
        let (mut vs, mut ps) = shaders(&device, format);
        let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
        let mesh = triangle();
        let transforms = [[0.0f32; 16]; 5];

        let unit = DrawUnit::new(&mesh, &mut vs, &mut ps).with_instances(&transforms);
        let stats = renderer.submit(&mut device, unit).unwrap();
        assert_eq!(stats.instances, 5);
        assert!(api.calls().iter().any(|c| matches!(
            c,
            MockCall::BindVertexBuffer {
                slot: INSTANCE_SLOT,
                stride: INSTANCE_STRIDE,
                ..
            }
        )));
        assert!(api.calls().contains(&MockCall::DrawIndexedInstanced {
            index_count: 3,
            instance_count: 5,
        }));
    }

    #[test]
    fn scratch_buffers_grow_when_exceeded() {
        let (_api, mut device) = device();
        let (mut vs, mut ps) = shaders(&device, VertexFormat::PositionColor);
        let mut renderer = Renderer::new(&device, 32, 3).unwrap();
        let mesh = Mesh {
            positions: vec![[0.0; 3]; 10],
            colors: vec![[1.0; 4]; 10],
            ..Mesh::default()
        };

        let stats = renderer
            .submit(
                &mut device,
                DrawUnit::new(&mesh, &mut vs, &mut ps),
            )
            .unwrap();
        assert_eq!(stats.vertices, 10);
        assert_eq!(stats.indices, 0);
        assert_eq!(renderer.vertex_capacity(), 512);
    }

    #[test]
    fn vertices_are_packed_in_the_input_layout_format() {
        let (api, mut device) = device();
        let (mut vs, mut ps) = shaders(&device, VertexFormat::PositionUv);
        let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
        let mesh = Mesh {
            uvs: vec![[0.0; 2]; 3],
            ..triangle()
        };

        let stats = renderer
            .submit(&mut device, DrawUnit::new(&mesh, &mut vs, &mut ps))
            .unwrap();

        assert_eq!(stats.draw_calls, 1);
        let stride = VertexFormat::PositionUv.stride();
        assert!(api.calls().iter().any(|c| matches!(
            c,
            MockCall::BindVertexBuffer { slot: VERTEX_SLOT, stride: s, .. } if *s == stride
        )));
        assert_eq!(stats.uploaded_bytes, u64::from(3 * stride) + 12);
    }

    #[test]
    fn vertex_shader_without_layout_is_rejected() {
        let (api, mut device) = device();
        let (_, mut ps) = shaders(&device, VertexFormat::PositionColor);
        let mut vs = Shader::new(ShaderKind::Vertex);
        vs.compile_from_source(&device, "vs", SOURCE, "vs_main", "vs_5_0")
            .unwrap();
        vs.build_program(&device, None).unwrap();
        let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
        let mesh = triangle();

        let err = renderer
            .submit(&mut device, DrawUnit::new(&mesh, &mut vs, &mut ps))
            .unwrap_err();

        assert!(matches!(err, GfxError::Unknown { what: "vertex format", .. }));
        assert_eq!(api.count(MockCall::is_draw), 0);
    }

    #[test]
    fn submission_is_refused_while_resizing() {
        let (api, mut device) = device();
        let (mut vs, mut ps) = shaders(&device, VertexFormat::PositionColor);
        let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
        let mesh = triangle();

        api.fail("resize_buffers");
        assert!(device
            .resize_swapchain(1920, 1080, PixelFormat::Rgba8Unorm)
            .is_err());
        let err = renderer
            .submit(
                &mut device,
                DrawUnit::new(&mesh, &mut vs, &mut ps),
            )
            .unwrap_err();
        assert!(matches!(err, GfxError::InvalidState { .. }));
    }
}
