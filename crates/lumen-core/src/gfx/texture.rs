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
use crate::gfx::device::Device;
use crate::gfx::error::{GfxError, GfxResult};
use crate::gfx::traits::NativeApi;

/// A 2D texture and the views created for it.
///
/// Render targets get a render-target view and a shader-resource view,
/// depth-stencil textures only a depth-stencil view, everything else a
/// shader-resource view. Release is explicit through [`Texture::destroy`].
#[derive(Debug)]
pub struct Texture {
    id: Option<TextureId>,
    format: PixelFormat,
    width: u32,
    height: u32,
    mip_levels: u32,
    flags: TextureFlags,
    render_target: Option<ViewId>,
    depth_stencil: Option<ViewId>,
    shader_resource: Option<ViewId>,
}

impl Texture {
    /// Creates a texture and its views.
    ///
    /// ## Arguments
    /// * `device` - The owning device.
    /// * `data` - Optional tightly packed pixels for mip 0.
    /// * `descriptor` - Size, format and flags.
    ///
    /// ## Errors
    /// * `NoData` - zero width or height.
    /// * `Unknown` - render-target and depth-stencil requested together, or a
    ///   format that does not match the depth-stencil flag.
    /// * `Error` - the native texture or one of its views could not be created.
    ///   Anything already created is released newest first.
    pub fn create(
        device: &Device,
        data: Option<&[u8]>,
        descriptor: &TextureDescriptor,
    ) -> GfxResult<Self> {
        Self::create_on(device.api(), device.device_id(), data, descriptor)
    }

    pub(crate) fn create_on(
        api: &dyn NativeApi,
        device: DeviceId,
        data: Option<&[u8]>,
        descriptor: &TextureDescriptor,
    ) -> GfxResult<Self> {
        descriptor.validate().inspect_err(|e| {
            log::error!("Rejected texture {:?}: {e}", descriptor.label);
        })?;

        let mut unwind = UnwindStack::new();
        let id = api
            .create_texture(device, descriptor, data)
            .inspect_err(|e| {
                log::error!(
                    "Failed to create {}x{} {:?} texture: {e}",
                    descriptor.width,
                    descriptor.height,
                    descriptor.format
                );
            })?;
        unwind.push(id);

        let mut texture = Self {
            id: Some(id),
            format: descriptor.format,
            width: descriptor.width,
            height: descriptor.height,
            mip_levels: descriptor.mip_levels.max(1),
            flags: descriptor.flags,
            render_target: None,
            depth_stencil: None,
            shader_resource: None,
        };

        for kind in descriptor.view_kinds() {
            match api.create_view(device, id, kind) {
                Ok(view) => {
                    unwind.push(view);
                    *texture.view_slot(kind) = Some(view);
                }
                Err(e) => {
                    log::error!("Failed to create {kind:?} view for texture {id:?}: {e}");
                    unwind.unwind(api);
                    return Err(e);
                }
            }
        }

        unwind.commit();
        log::debug!(
            "Created texture {id:?} ({}x{} {:?}, {:?})",
            texture.width,
            texture.height,
            texture.format,
            texture.flags
        );
        Ok(texture)
    }

    /// Wraps a new reference to the current back buffer of the device's swapchain.
    ///
    /// The reference (and its render-target view) must be destroyed before the
    /// swapchain is resized.
    ///
    /// ## Errors
    /// * `InvalidState` - the device has no swapchain.
    pub fn from_back_buffer(device: &Device) -> GfxResult<Self> {
        let swapchain = device
            .swapchain
            .as_ref()
            .ok_or_else(|| GfxError::InvalidState {
                operation: "wrap back buffer",
                state: format!("{:?}", device.swapchain_state()),
            })?;
        let config = device.config();
        Self::wrap_back_buffer(
            device.api(),
            device.device_id(),
            swapchain.id(),
            config.width,
            config.height,
            config.pixel_format,
        )
    }

    pub(crate) fn wrap_back_buffer(
        api: &dyn NativeApi,
        device: DeviceId,
        swapchain: SwapchainId,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> GfxResult<Self> {
        let id = api.back_buffer(swapchain).inspect_err(|e| {
            log::error!("Failed to get back buffer of {swapchain:?}: {e}");
        })?;
        let view = match api.create_view(device, id, ViewKind::RenderTarget) {
            Ok(view) => view,
            Err(e) => {
                log::error!("Failed to create back-buffer render-target view: {e}");
                api.release(id.into());
                return Err(e);
            }
        };
        Ok(Self {
            id: Some(id),
            format,
            width,
            height,
            mip_levels: 1,
            flags: TextureFlags::RENDER_TARGET,
            render_target: Some(view),
            depth_stencil: None,
            shader_resource: None,
        })
    }

    fn view_slot(&mut self, kind: ViewKind) -> &mut Option<ViewId> {
        match kind {
            ViewKind::RenderTarget => &mut self.render_target,
            ViewKind::DepthStencil => &mut self.depth_stencil,
            ViewKind::ShaderResource => &mut self.shader_resource,
        }
    }

    /// Replaces mip 0 of a dynamic texture.
    ///
    /// ## Errors
    /// * `Null` - the texture was destroyed.
    /// * `Error` - the texture was not created with [`TextureFlags::DYNAMIC`] or
    ///   the native upload failed.
    pub fn update(&mut self, device: &Device, data: &[u8]) -> GfxResult<()> {
        let id = self.id.ok_or(GfxError::Null { what: "texture" })?;
        if !self.flags.contains(TextureFlags::DYNAMIC) {
            return Err(GfxError::InvalidState {
                operation: "update texture",
                state: format!("created with {:?}", self.flags),
            });
        }
        device
            .api()
            .write_texture(device.context_id(), id, data)
            .inspect_err(|e| log::error!("Failed to update texture {id:?}: {e}"))
    }

    /// Releases every view, then the texture. Safe to call repeatedly.
    pub fn destroy(&mut self, device: &Device) {
        self.release(device.api());
    }

    pub(crate) fn release(&mut self, api: &dyn NativeApi) {
        for view in [
            self.shader_resource.take(),
            self.depth_stencil.take(),
            self.render_target.take(),
        ]
        .into_iter()
        .flatten()
        {
            api.release(view.into());
        }
        if let Some(id) = self.id.take() {
            log::debug!("Released texture {id:?}");
            api.release(id.into());
        }
    }

    /// The native texture, or `None` once destroyed.
    pub fn id(&self) -> Option<TextureId> {
        self.id
    }

    /// Texel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Width in texels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of mip levels.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Creation flags.
    pub fn flags(&self) -> TextureFlags {
        self.flags
    }

    /// The render-target view.
    pub fn render_target_view(&self) -> Option<ViewId> {
        self.render_target
    }

    /// The depth-stencil view.
    pub fn depth_stencil_view(&self) -> Option<ViewId> {
        self.depth_stencil
    }

    /// The shader-resource view. Never present on depth-stencil textures.
    pub fn shader_resource_view(&self) -> Option<ViewId> {
        self.shader_resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::error::ErrorKind;
    use crate::gfx::mock::{MockApi, MockCall};
    use std::sync::Arc;

    fn device(api: &Arc<MockApi>) -> Device {
        Device::create(api.clone(), &GfxConfig::default()).unwrap()
    }

    #[test]
    fn views_follow_flags() {
        let api = Arc::new(MockApi::new());
        let device = device(&api);

        let plain = TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 4, 4);
        let mut plain = Texture::create(&device, None, &plain).unwrap();
        assert!(plain.shader_resource_view().is_some());
        assert!(plain.render_target_view().is_none());

        let depth = TextureDescriptor::new_2d(PixelFormat::Depth24Stencil8, 4, 4)
            .with_flags(TextureFlags::DEPTH_STENCIL);
        let mut depth = Texture::create(&device, None, &depth).unwrap();
        assert!(depth.depth_stencil_view().is_some());
        assert!(depth.shader_resource_view().is_none());

        plain.destroy(&device);
        depth.destroy(&device);
    }

    #[test]
    fn destroy_is_idempotent() {
        let api = Arc::new(MockApi::new());
        let device = device(&api);
        let before = api.live_objects();

        let desc = TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 8, 8)
            .with_flags(TextureFlags::RENDER_TARGET);
        let mut texture = Texture::create(&device, None, &desc).unwrap();
        texture.destroy(&device);
        texture.destroy(&device);

        assert!(texture.id().is_none());
        assert_eq!(api.live_objects(), before);
    }

    #[test]
    fn failed_view_unwinds_texture() {
        let api = Arc::new(MockApi::new());
        let device = device(&api);
        let before = api.live_objects();
        api.fail("create_view");

        let desc = TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 8, 8);
        let err = Texture::create(&device, None, &desc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Error);
        assert_eq!(api.live_objects(), before);
        assert!(matches!(
            api.calls().last(),
            Some(MockCall::Release(NativeHandle::Texture(_)))
        ));
    }

    #[test]
    fn update_requires_dynamic() {
        let api = Arc::new(MockApi::new());
        let device = device(&api);

        let desc = TextureDescriptor::new_2d(PixelFormat::R8Unorm, 2, 2);
        let mut fixed = Texture::create(&device, Some(&[1, 2, 3, 4]), &desc).unwrap();
        assert_eq!(
            fixed.update(&device, &[0; 4]).unwrap_err().kind(),
            ErrorKind::Error
        );

        let mut dynamic =
            Texture::create(&device, None, &desc.with_flags(TextureFlags::DYNAMIC)).unwrap();
        dynamic.update(&device, &[9, 8, 7, 6]).unwrap();
        let id = dynamic.id().unwrap();
        assert_eq!(api.texture_contents(id).unwrap(), vec![9, 8, 7, 6]);

        dynamic.destroy(&device);
        assert_eq!(
            dynamic.update(&device, &[0; 4]).unwrap_err().kind(),
            ErrorKind::Null
        );
        fixed.destroy(&device);
    }
}
