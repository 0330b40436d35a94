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

//! Render pipelines assembled from separately bound state objects.
//!
//! The immediate-context model binds shaders, input layout and states one at a
//! time; WGPU wants them baked into one pipeline. Pipelines are built at draw
//! time from whatever is bound and cached under the ids of those objects.
//!
//! Resources use a fixed layout in bind group 0:
//!
//! | binding | resource                   | stage    |
//! |---------|----------------------------|----------|
//! | 0       | vertex constant buffer     | vertex   |
//! | 1       | pixel constant buffer      | fragment |
//! | 2       | pixel texture (slot 0)     | fragment |
//! | 3       | pixel sampler (slot 0)     | fragment |
//!
//! Only the bindings that are actually bound appear in the layout, so a shader
//! must not declare a binding the draw does not provide.

use std::collections::HashMap;

use lumen_core::gfx::api::{
    BlendDescriptor, BlendStateId, DepthDescriptor, DepthStateId, InputElement, InputLayoutId,
    NativeHandle, PrimitiveTopology, ProgramId, RasterDescriptor, RasterStateId,
};
use lumen_core::gfx::{GfxError, GfxResult};

use super::conversions::{depth_stencil_state, primitive_state, IntoWgpu};

/// Which of the fixed bindings a draw provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BindingSet {
    /// A vertex constant buffer is bound.
    pub vertex_constants: bool,
    /// A pixel constant buffer is bound.
    pub pixel_constants: bool,
    /// A pixel texture is bound.
    pub texture: bool,
    /// A pixel sampler is bound.
    pub sampler: bool,
}

impl BindingSet {
    /// Binding of the vertex constant buffer.
    pub const VERTEX_CONSTANTS: u32 = 0;
    /// Binding of the pixel constant buffer.
    pub const PIXEL_CONSTANTS: u32 = 1;
    /// Binding of the pixel texture.
    pub const TEXTURE: u32 = 2;
    /// Binding of the pixel sampler.
    pub const SAMPLER: u32 = 3;

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let uniform = |binding, visibility| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let mut entries = Vec::with_capacity(4);
        if self.vertex_constants {
            entries.push(uniform(Self::VERTEX_CONSTANTS, wgpu::ShaderStages::VERTEX));
        }
        if self.pixel_constants {
            entries.push(uniform(Self::PIXEL_CONSTANTS, wgpu::ShaderStages::FRAGMENT));
        }
        if self.texture {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: Self::TEXTURE,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        if self.sampler {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: Self::SAMPLER,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        entries
    }
}

/// Identifies a pipeline by the objects bound when it was built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub vertex: ProgramId,
    pub pixel: ProgramId,
    pub input_layout: Option<InputLayoutId>,
    pub topology: PrimitiveTopology,
    pub raster: Option<RasterStateId>,
    pub blend: Option<BlendStateId>,
    pub depth: Option<DepthStateId>,
    pub color_format: Option<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    /// Strides of vertex slots 0 and 1.
    pub strides: [u32; 2],
    pub bindings: BindingSet,
}

impl PipelineKey {
    /// Returns `true` if the pipeline was built from `handle`.
    pub fn references(&self, handle: NativeHandle) -> bool {
        match handle {
            NativeHandle::Program(id) => self.vertex == id || self.pixel == id,
            NativeHandle::InputLayout(id) => self.input_layout == Some(id),
            NativeHandle::RasterState(id) => self.raster == Some(id),
            NativeHandle::BlendState(id) => self.blend == Some(id),
            NativeHandle::DepthState(id) => self.depth == Some(id),
            _ => false,
        }
    }
}

/// One shader stage of a pipeline.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub module: &'a wgpu::ShaderModule,
    pub entry_point: &'a str,
}

/// The resolved objects a pipeline is built from.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInputs<'a> {
    pub vertex: StageInput<'a>,
    pub pixel: StageInput<'a>,
    pub elements: &'a [InputElement],
    pub raster: RasterDescriptor,
    pub blend: BlendDescriptor,
    pub depth: DepthDescriptor,
    pub features: wgpu::Features,
}

/// A built pipeline and the layout its bind group must use.
#[derive(Debug, Clone)]
pub struct CachedPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

/// Pipelines keyed by the objects they were built from.
#[derive(Debug, Default)]
pub struct PipelineCache {
    pipelines: HashMap<PipelineKey, CachedPipeline>,
    builds: u64,
}

impl PipelineCache {
    /// Returns the pipeline for `key`, building it from `inputs` on a miss.
    ///
    /// ## Errors
    /// * `GfxError::Native` - WGPU rejected the pipeline.
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: &PipelineKey,
        inputs: &PipelineInputs<'_>,
    ) -> GfxResult<CachedPipeline> {
        if let Some(cached) = self.pipelines.get(key) {
            return Ok(cached.clone());
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let cached = build(device, key, inputs);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(GfxError::native("create_render_pipeline", error.to_string()));
        }

        self.builds += 1;
        log::debug!(
            "Built render pipeline #{} for {:?}/{:?}",
            self.builds,
            key.vertex,
            key.pixel
        );
        self.pipelines.insert(key.clone(), cached.clone());
        Ok(cached)
    }

    /// Drops every pipeline built from `handle`.
    pub fn evict(&mut self, handle: NativeHandle) {
        self.pipelines.retain(|key, _| !key.references(handle));
    }

    /// Number of cached pipelines.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns `true` if no pipeline is cached.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

fn build(device: &wgpu::Device, key: &PipelineKey, inputs: &PipelineInputs<'_>) -> CachedPipeline {
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Lumen Bind Group Layout"),
        entries: &key.bindings.layout_entries(),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Lumen Pipeline Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let attributes = vertex_attributes(inputs.elements);
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attributes
        .iter()
        .enumerate()
        .map(|(slot, (per_instance, attributes))| wgpu::VertexBufferLayout {
            array_stride: u64::from(key.strides.get(slot).copied().unwrap_or(0)),
            step_mode: if *per_instance {
                wgpu::VertexStepMode::Instance
            } else {
                wgpu::VertexStepMode::Vertex
            },
            attributes,
        })
        .collect();

    let color = [key.color_format.map(|format| wgpu::ColorTargetState {
        format,
        blend: (&inputs.blend).into_wgpu(),
        write_mask: inputs.blend.write_mask.into_wgpu(),
    })];
    let targets: &[Option<wgpu::ColorTargetState>] = if key.color_format.is_some() {
        &color
    } else {
        &[]
    };

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Lumen Render Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: inputs.vertex.module,
            entry_point: Some(inputs.vertex.entry_point),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        primitive: primitive_state(
            key.topology,
            &inputs.raster,
            inputs.features.contains(wgpu::Features::POLYGON_MODE_LINE),
            inputs.features.contains(wgpu::Features::DEPTH_CLIP_CONTROL),
        ),
        depth_stencil: key
            .depth_format
            .map(|format| depth_stencil_state(format, &inputs.depth, &inputs.raster)),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: inputs.blend.alpha_to_coverage,
        },
        fragment: Some(wgpu::FragmentState {
            module: inputs.pixel.module,
            entry_point: Some(inputs.pixel.entry_point),
            compilation_options: Default::default(),
            targets,
        }),
        multiview: None,
        cache: None,
    });

    CachedPipeline {
        pipeline,
        bind_group_layout,
    }
}

/// Groups input elements by vertex slot, in slot order.
fn vertex_attributes(elements: &[InputElement]) -> Vec<(bool, Vec<wgpu::VertexAttribute>)> {
    let slots = elements
        .iter()
        .map(|element| element.slot as usize + 1)
        .max()
        .unwrap_or(0);
    let mut grouped = vec![(false, Vec::new()); slots];
    for element in elements {
        let (per_instance, attributes) = &mut grouped[element.slot as usize];
        *per_instance |= element.per_instance;
        attributes.push(wgpu::VertexAttribute {
            format: element.format.into_wgpu(),
            offset: u64::from(element.offset),
            shader_location: element.location,
        });
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::gfx::api::{InputElement, VertexFormat};

    fn key() -> PipelineKey {
        PipelineKey {
            vertex: ProgramId(1),
            pixel: ProgramId(2),
            input_layout: Some(InputLayoutId(3)),
            topology: PrimitiveTopology::TriangleList,
            raster: Some(RasterStateId(4)),
            blend: Some(BlendStateId(5)),
            depth: None,
            color_format: Some(wgpu::TextureFormat::Rgba8Unorm),
            depth_format: Some(wgpu::TextureFormat::Depth24PlusStencil8),
            strides: [28, 0],
            bindings: BindingSet::default(),
        }
    }

    #[test]
    fn keys_reference_the_objects_they_were_built_from() {
        let key = key();
        assert!(key.references(NativeHandle::Program(ProgramId(2))));
        assert!(key.references(NativeHandle::RasterState(RasterStateId(4))));
        assert!(!key.references(NativeHandle::DepthState(DepthStateId(4))));
        assert!(!key.references(NativeHandle::Program(ProgramId(4))));
    }

    #[test]
    fn instanced_layouts_split_into_two_slots() {
        let elements: Vec<InputElement> = VertexFormat::PositionColorInstanced.input_layout();
        let grouped = vertex_attributes(&elements);
        assert_eq!(grouped.len(), 2);
        assert!(!grouped[0].0);
        assert_eq!(grouped[0].1.len(), 2);
        assert!(grouped[1].0);
        assert_eq!(grouped[1].1.len(), 4);
        assert_eq!(grouped[1].1[3].offset, 48);
        assert_eq!(grouped[1].1[0].shader_location, 2);
    }

    #[test]
    fn only_bound_resources_enter_the_layout() {
        let bindings = BindingSet {
            pixel_constants: true,
            sampler: true,
            ..BindingSet::default()
        };
        let bound: Vec<u32> = bindings
            .layout_entries()
            .iter()
            .map(|entry| entry.binding)
            .collect();
        assert_eq!(bound, vec![BindingSet::PIXEL_CONSTANTS, BindingSet::SAMPLER]);
        assert!(BindingSet::default().is_empty());
    }
}
