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

use super::format::PixelFormat;
use crate::gfx::error::GfxError;
use bitflags::bitflags;
use std::borrow::Cow;

bitflags! {
    /// Creation flags of a 2D texture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        /// The texture can be bound as a color render target.
        const RENDER_TARGET = 1 << 0;
        /// The texture can be bound as a depth/stencil target.
        const DEPTH_STENCIL = 1 << 1;
        /// The CPU rewrites the texture contents through map-discard.
        const DYNAMIC = 1 << 2;
        /// The mip chain is generated on the GPU.
        const GENERATE_MIPS = 1 << 3;
        /// The texture may be opened by another device.
        const SHARED = 1 << 4;
        /// Shared access is synchronized with a keyed mutex.
        const KEYED_MUTEX = 1 << 5;
    }
}

/// Describes a 2D texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Texel format.
    pub format: PixelFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Number of mip levels; 0 is treated as 1.
    pub mip_levels: u32,
    /// Creation flags.
    pub flags: TextureFlags,
}

impl<'a> TextureDescriptor<'a> {
    /// A single-mip shader-resource texture.
    pub fn new_2d(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            label: None,
            format,
            width,
            height,
            mip_levels: 1,
            flags: TextureFlags::empty(),
        }
    }

    /// Returns a copy with the given flags.
    pub fn with_flags(mut self, flags: TextureFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Returns a copy with the given label.
    pub fn with_label(mut self, label: impl Into<Cow<'a, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Size of mip level 0 in bytes.
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }

    /// Rejects flag and format combinations no native API accepts.
    pub fn validate(&self) -> Result<(), GfxError> {
        if self.width == 0 || self.height == 0 {
            return Err(GfxError::NoData { what: "texture" });
        }
        if self
            .flags
            .contains(TextureFlags::RENDER_TARGET | TextureFlags::DEPTH_STENCIL)
        {
            return Err(GfxError::unknown("texture flag combination", self.flags));
        }
        if self.format.is_depth() != self.flags.contains(TextureFlags::DEPTH_STENCIL) {
            return Err(GfxError::unknown(
                "texture format for flags",
                (self.format, self.flags),
            ));
        }
        if self.flags.contains(TextureFlags::KEYED_MUTEX) && !self.flags.contains(TextureFlags::SHARED)
        {
            return Err(GfxError::unknown("texture flag combination", self.flags));
        }
        Ok(())
    }

    /// The views a texture created from this descriptor receives.
    pub fn view_kinds(&self) -> Vec<ViewKind> {
        if self.flags.contains(TextureFlags::DEPTH_STENCIL) {
            vec![ViewKind::DepthStencil]
        } else if self.flags.contains(TextureFlags::RENDER_TARGET) {
            vec![ViewKind::RenderTarget, ViewKind::ShaderResource]
        } else {
            vec![ViewKind::ShaderResource]
        }
    }
}

/// The binding purpose of a texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Render-target view.
    RenderTarget,
    /// Depth-stencil view.
    DepthStencil,
    /// Shader-resource view.
    ShaderResource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::error::ErrorKind;

    #[test]
    fn render_target_and_depth_stencil_are_exclusive() {
        let desc = TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 64, 64)
            .with_flags(TextureFlags::RENDER_TARGET | TextureFlags::DEPTH_STENCIL);
        assert_eq!(desc.validate().unwrap_err().kind(), ErrorKind::Unknown);
    }

    #[test]
    fn depth_textures_only_get_a_depth_view() {
        let desc = TextureDescriptor::new_2d(PixelFormat::Depth24Stencil8, 64, 64)
            .with_flags(TextureFlags::DEPTH_STENCIL);
        assert!(desc.validate().is_ok());
        assert_eq!(desc.view_kinds(), vec![ViewKind::DepthStencil]);
    }

    #[test]
    fn render_targets_can_also_be_sampled() {
        let desc = TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 64, 64)
            .with_flags(TextureFlags::RENDER_TARGET);
        assert_eq!(
            desc.view_kinds(),
            vec![ViewKind::RenderTarget, ViewKind::ShaderResource]
        );
    }

    #[test]
    fn zero_extent_is_rejected() {
        let desc = TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 0, 16);
        assert_eq!(desc.validate().unwrap_err().kind(), ErrorKind::NoData);
    }
}
