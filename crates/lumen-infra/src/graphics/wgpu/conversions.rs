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

use lumen_core::gfx::api::{
    AdapterInfo, AdapterType, AddressMode, BlendDescriptor, BlendFactor, BlendOp, BufferType,
    ColorWriteMask, CompareFunction, CullMode, DepthDescriptor, ElementFormat, FillMode, Filter,
    IndexFormat, PixelFormat, PrimitiveTopology, RasterDescriptor, SamplerDescriptor,
};

/// A local extension trait to convert lumen types into WGPU-compatible types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a WGPU-compatible type.
    fn into_wgpu(self) -> T;
}

// --- Formats ---

impl IntoWgpu<wgpu::TextureFormat> for PixelFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            PixelFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            PixelFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            PixelFormat::R32Float => wgpu::TextureFormat::R32Float,
            PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            PixelFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            PixelFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

impl IntoWgpu<wgpu::VertexFormat> for ElementFormat {
    fn into_wgpu(self) -> wgpu::VertexFormat {
        match self {
            ElementFormat::Float2 => wgpu::VertexFormat::Float32x2,
            ElementFormat::Float3 => wgpu::VertexFormat::Float32x3,
            ElementFormat::Float4 => wgpu::VertexFormat::Float32x4,
        }
    }
}

impl IntoWgpu<wgpu::BufferUsages> for BufferType {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        let binding = match self {
            BufferType::Vertex => wgpu::BufferUsages::VERTEX,
            BufferType::Index => wgpu::BufferUsages::INDEX,
            BufferType::Constant => wgpu::BufferUsages::UNIFORM,
        };
        binding | wgpu::BufferUsages::COPY_DST
    }
}

// --- Rasterizer ---

impl IntoWgpu<wgpu::PrimitiveTopology> for PrimitiveTopology {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
            PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
            PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
        }
    }
}

impl IntoWgpu<Option<wgpu::Face>> for CullMode {
    fn into_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        }
    }
}

impl IntoWgpu<wgpu::PolygonMode> for FillMode {
    fn into_wgpu(self) -> wgpu::PolygonMode {
        match self {
            FillMode::Solid => wgpu::PolygonMode::Fill,
            FillMode::Wireframe => wgpu::PolygonMode::Line,
        }
    }
}

/// Builds the primitive state of a pipeline from a topology and rasterizer state.
///
/// `polygon_line` and `clip_control` report whether the device enabled the
/// features wireframe fill and disabled depth clipping need; without them the
/// setting is ignored.
pub fn primitive_state(
    topology: PrimitiveTopology,
    raster: &RasterDescriptor,
    polygon_line: bool,
    clip_control: bool,
) -> wgpu::PrimitiveState {
    let polygon_mode = match raster.fill_mode {
        FillMode::Wireframe if !polygon_line => {
            log::warn!("Wireframe fill is not supported by this device, drawing solid");
            wgpu::PolygonMode::Fill
        }
        fill => fill.into_wgpu(),
    };
    wgpu::PrimitiveState {
        topology: topology.into_wgpu(),
        strip_index_format: None,
        front_face: if raster.front_counter_clockwise {
            wgpu::FrontFace::Ccw
        } else {
            wgpu::FrontFace::Cw
        },
        cull_mode: raster.cull_mode.into_wgpu(),
        unclipped_depth: clip_control && !raster.depth_clip,
        polygon_mode,
        conservative: false,
    }
}

// --- Blending ---

impl IntoWgpu<wgpu::BlendFactor> for BlendFactor {
    fn into_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcColor => wgpu::BlendFactor::Src,
            BlendFactor::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DestColor => wgpu::BlendFactor::Dst,
            BlendFactor::InvDestColor => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::DestAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::InvDestAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        }
    }
}

impl IntoWgpu<wgpu::BlendOperation> for BlendOp {
    fn into_wgpu(self) -> wgpu::BlendOperation {
        match self {
            BlendOp::Add => wgpu::BlendOperation::Add,
            BlendOp::Subtract => wgpu::BlendOperation::Subtract,
            BlendOp::RevSubtract => wgpu::BlendOperation::ReverseSubtract,
            BlendOp::Min => wgpu::BlendOperation::Min,
            BlendOp::Max => wgpu::BlendOperation::Max,
        }
    }
}

impl IntoWgpu<wgpu::ColorWrites> for ColorWriteMask {
    fn into_wgpu(self) -> wgpu::ColorWrites {
        wgpu::ColorWrites::from_bits_truncate(u32::from(self.0))
    }
}

impl IntoWgpu<Option<wgpu::BlendState>> for &BlendDescriptor {
    fn into_wgpu(self) -> Option<wgpu::BlendState> {
        self.enabled.then(|| wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: self.src.into_wgpu(),
                dst_factor: self.dst.into_wgpu(),
                operation: self.op.into_wgpu(),
            },
            alpha: wgpu::BlendComponent {
                src_factor: self.src_alpha.into_wgpu(),
                dst_factor: self.dst_alpha.into_wgpu(),
                operation: self.op_alpha.into_wgpu(),
            },
        })
    }
}

// --- Depth / stencil ---

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

/// Builds the depth-stencil state of a pipeline rendering into `format`.
///
/// Depth bias lives in the rasterizer state on the lumen side and in the
/// depth-stencil state on the WGPU side, hence the second descriptor.
pub fn depth_stencil_state(
    format: wgpu::TextureFormat,
    depth: &DepthDescriptor,
    raster: &RasterDescriptor,
) -> wgpu::DepthStencilState {
    let face = if depth.stencil_enabled {
        wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::Equal,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::Keep,
        }
    } else {
        wgpu::StencilFaceState::IGNORE
    };

    wgpu::DepthStencilState {
        format,
        depth_write_enabled: depth.depth_enabled && depth.depth_write,
        depth_compare: if depth.depth_enabled {
            depth.depth_func.into_wgpu()
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState {
            front: face,
            back: face,
            read_mask: u32::from(depth.stencil_read_mask),
            write_mask: u32::from(depth.stencil_write_mask),
        },
        bias: wgpu::DepthBiasState {
            constant: raster.depth_bias,
            slope_scale: raster.slope_scaled_depth_bias,
            clamp: raster.depth_bias_clamp,
        },
    }
}

// --- Samplers ---

impl IntoWgpu<wgpu::AddressMode> for AddressMode {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressMode::Wrap => wgpu::AddressMode::Repeat,
            AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
            AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
            // Border colors need an optional device feature.
            AddressMode::Border => wgpu::AddressMode::ClampToEdge,
        }
    }
}

impl IntoWgpu<wgpu::FilterMode> for Filter {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            Filter::Point => wgpu::FilterMode::Nearest,
            Filter::Linear | Filter::Anisotropic => wgpu::FilterMode::Linear,
        }
    }
}

impl<'a> IntoWgpu<wgpu::SamplerDescriptor<'a>> for &SamplerDescriptor {
    fn into_wgpu(self) -> wgpu::SamplerDescriptor<'a> {
        let filter = self.filter.into_wgpu();
        let lod_min_clamp = self.min_lod.max(0.0);
        let anisotropy = match self.filter {
            Filter::Anisotropic => self.max_anisotropy.clamp(1, 16) as u16,
            _ => 1,
        };
        wgpu::SamplerDescriptor {
            label: Some("Lumen Sampler"),
            address_mode_u: self.address_u.into_wgpu(),
            address_mode_v: self.address_v.into_wgpu(),
            address_mode_w: self.address_w.into_wgpu(),
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            lod_min_clamp,
            lod_max_clamp: self.max_lod.min(32.0).max(lod_min_clamp),
            compare: self.comparison.map(IntoWgpu::into_wgpu),
            anisotropy_clamp: anisotropy,
            border_color: None,
        }
    }
}

// --- Adapters ---

fn adapter_type(device_type: wgpu::DeviceType) -> AdapterType {
    match device_type {
        wgpu::DeviceType::IntegratedGpu => AdapterType::IntegratedGpu,
        wgpu::DeviceType::DiscreteGpu => AdapterType::DiscreteGpu,
        wgpu::DeviceType::VirtualGpu => AdapterType::VirtualGpu,
        wgpu::DeviceType::Cpu => AdapterType::Software,
        wgpu::DeviceType::Other => AdapterType::Unknown,
    }
}

/// Describes a WGPU adapter. WGPU exposes neither memory sizes nor outputs,
/// so those fields stay empty.
pub fn adapter_info(index: u32, adapter: &wgpu::Adapter) -> AdapterInfo {
    let info = adapter.get_info();
    AdapterInfo {
        index,
        name: info.name,
        adapter_type: adapter_type(info.device_type),
        vendor_id: info.vendor,
        device_id: info.device,
        ..AdapterInfo::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_keep_their_stencil() {
        let format: wgpu::TextureFormat = PixelFormat::Depth24Stencil8.into_wgpu();
        assert!(format.has_stencil_aspect());
        let format: wgpu::TextureFormat = PixelFormat::Depth32Float.into_wgpu();
        assert!(!format.has_stencil_aspect());
    }

    #[test]
    fn opaque_blending_disables_the_blend_state() {
        let blend: Option<wgpu::BlendState> = (&BlendDescriptor::OPAQUE).into_wgpu();
        assert!(blend.is_none());
        let blend: Option<wgpu::BlendState> = (&BlendDescriptor::ALPHA_BLEND).into_wgpu();
        assert_eq!(blend, Some(wgpu::BlendState::ALPHA_BLENDING));
    }

    #[test]
    fn disabled_depth_always_passes_without_writing() {
        let depth = DepthDescriptor {
            depth_enabled: false,
            ..DepthDescriptor::default()
        };
        let state = depth_stencil_state(
            wgpu::TextureFormat::Depth32Float,
            &depth,
            &RasterDescriptor::default(),
        );
        assert!(!state.depth_write_enabled);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::Always);
    }

    #[test]
    fn wireframe_falls_back_without_the_feature() {
        let raster = RasterDescriptor {
            fill_mode: FillMode::Wireframe,
            cull_mode: CullMode::None,
            ..RasterDescriptor::default()
        };
        let state = primitive_state(PrimitiveTopology::TriangleList, &raster, false, false);
        assert_eq!(state.polygon_mode, wgpu::PolygonMode::Fill);
        assert_eq!(state.cull_mode, None);
        assert!(!state.unclipped_depth);
    }

    #[test]
    fn color_write_masks_match_bit_for_bit() {
        let writes: wgpu::ColorWrites = ColorWriteMask::ALL.into_wgpu();
        assert_eq!(writes, wgpu::ColorWrites::ALL);
        let writes: wgpu::ColorWrites = ColorWriteMask::ALPHA.into_wgpu();
        assert_eq!(writes, wgpu::ColorWrites::ALPHA);
    }
}
