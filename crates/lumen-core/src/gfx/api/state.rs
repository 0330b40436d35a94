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

//! Descriptors for the small fixed-function state objects.
//!
//! Every descriptor implements `PartialEq`; the state cache compares an incoming
//! descriptor against the cached one field by field and only rebuilds the native
//! object when they differ.

/// Polygon fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Filled triangles.
    #[default]
    Solid,
    /// Triangle edges only.
    Wireframe,
}

/// Which triangle faces are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw every triangle.
    None,
    /// Discard front faces.
    Front,
    /// Discard back faces.
    #[default]
    Back,
}

/// Rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterDescriptor {
    /// Fill mode.
    pub fill_mode: FillMode,
    /// Cull mode.
    pub cull_mode: CullMode,
    /// Counter-clockwise triangles are front-facing when `true`.
    pub front_counter_clockwise: bool,
    /// Constant depth bias.
    pub depth_bias: i32,
    /// Maximum depth bias.
    pub depth_bias_clamp: f32,
    /// Slope-scaled depth bias.
    pub slope_scaled_depth_bias: f32,
    /// Clip against the near/far planes.
    pub depth_clip: bool,
    /// Enable the scissor test.
    pub scissor: bool,
    /// Enable multisample rasterization.
    pub multisample: bool,
    /// Enable line antialiasing.
    pub antialiased_lines: bool,
}

impl Default for RasterDescriptor {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_counter_clockwise: false,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip: true,
            scissor: false,
            multisample: false,
            antialiased_lines: false,
        }
    }
}

/// Blend factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0.
    Zero,
    /// 1.
    One,
    /// Source color.
    SrcColor,
    /// 1 - source color.
    InvSrcColor,
    /// Source alpha.
    SrcAlpha,
    /// 1 - source alpha.
    InvSrcAlpha,
    /// Destination color.
    DestColor,
    /// 1 - destination color.
    InvDestColor,
    /// Destination alpha.
    DestAlpha,
    /// 1 - destination alpha.
    InvDestAlpha,
}

/// Blend operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    /// `src + dst`
    Add,
    /// `src - dst`
    Subtract,
    /// `dst - src`
    RevSubtract,
    /// `min(src, dst)`
    Min,
    /// `max(src, dst)`
    Max,
}

/// Color channels written by the output merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorWriteMask(pub u8);

impl ColorWriteMask {
    /// Red channel.
    pub const RED: ColorWriteMask = ColorWriteMask(0b0001);
    /// Green channel.
    pub const GREEN: ColorWriteMask = ColorWriteMask(0b0010);
    /// Blue channel.
    pub const BLUE: ColorWriteMask = ColorWriteMask(0b0100);
    /// Alpha channel.
    pub const ALPHA: ColorWriteMask = ColorWriteMask(0b1000);
    /// All channels.
    pub const ALL: ColorWriteMask = ColorWriteMask(0b1111);
}

/// Blend configuration of render target 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDescriptor {
    /// Enable blending; when `false` the source color is written as is.
    pub enabled: bool,
    /// Source color factor.
    pub src: BlendFactor,
    /// Destination color factor.
    pub dst: BlendFactor,
    /// Color operation.
    pub op: BlendOp,
    /// Source alpha factor.
    pub src_alpha: BlendFactor,
    /// Destination alpha factor.
    pub dst_alpha: BlendFactor,
    /// Alpha operation.
    pub op_alpha: BlendOp,
    /// Channel write mask.
    pub write_mask: ColorWriteMask,
    /// Use alpha as a multisample coverage mask.
    pub alpha_to_coverage: bool,
}

impl BlendDescriptor {
    /// Opaque writes, no blending.
    pub const OPAQUE: BlendDescriptor = BlendDescriptor {
        enabled: false,
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
        op: BlendOp::Add,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
        op_alpha: BlendOp::Add,
        write_mask: ColorWriteMask::ALL,
        alpha_to_coverage: false,
    };

    /// Classic straight-alpha blending.
    pub const ALPHA_BLEND: BlendDescriptor = BlendDescriptor {
        enabled: true,
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::InvSrcAlpha,
        op: BlendOp::Add,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::InvSrcAlpha,
        op_alpha: BlendOp::Add,
        write_mask: ColorWriteMask::ALL,
        alpha_to_coverage: false,
    };
}

impl Default for BlendDescriptor {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// Comparison functions for depth tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if new < old.
    #[default]
    Less,
    /// Passes if new == old.
    Equal,
    /// Passes if new <= old.
    LessEqual,
    /// Passes if new > old.
    Greater,
    /// Passes if new != old.
    NotEqual,
    /// Passes if new >= old.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Depth-stencil configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthDescriptor {
    /// Enable the depth test.
    pub depth_enabled: bool,
    /// Write passing depth values.
    pub depth_write: bool,
    /// Depth comparison.
    pub depth_func: CompareFunction,
    /// Enable the stencil test.
    pub stencil_enabled: bool,
    /// Stencil read mask.
    pub stencil_read_mask: u8,
    /// Stencil write mask.
    pub stencil_write_mask: u8,
}

impl Default for DepthDescriptor {
    fn default() -> Self {
        Self {
            depth_enabled: true,
            depth_write: true,
            depth_func: CompareFunction::Less,
            stencil_enabled: false,
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
        }
    }
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    /// Nearest texel for min, mag and mip.
    Point,
    /// Linear min/mag/mip.
    #[default]
    Linear,
    /// Anisotropic filtering.
    Anisotropic,
}

/// Texture coordinate addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Tile.
    #[default]
    Wrap,
    /// Tile, mirroring every other repetition.
    Mirror,
    /// Clamp to the edge texel.
    Clamp,
    /// Use the border color outside [0, 1].
    Border,
}

/// Sampler configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDescriptor {
    /// Filtering.
    pub filter: Filter,
    /// U addressing.
    pub address_u: AddressMode,
    /// V addressing.
    pub address_v: AddressMode,
    /// W addressing.
    pub address_w: AddressMode,
    /// Bias added to the computed mip level.
    pub mip_lod_bias: f32,
    /// Anisotropy clamp, 1..=16.
    pub max_anisotropy: u32,
    /// Comparison function for comparison samplers.
    pub comparison: Option<CompareFunction>,
    /// Border color for [`AddressMode::Border`].
    pub border_color: [f32; 4],
    /// Lowest mip level accessed.
    pub min_lod: f32,
    /// Highest mip level accessed.
    pub max_lod: f32,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            filter: Filter::Linear,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
            mip_lod_bias: 0.0,
            max_anisotropy: 1,
            comparison: None,
            border_color: [0.0; 4],
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}
