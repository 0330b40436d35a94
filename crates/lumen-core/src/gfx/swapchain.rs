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

//! The swapchain, its render targets and the resize sequence.

use crate::gfx::api::*;
use crate::gfx::device::Device;
use crate::gfx::error::{GfxError, GfxResult};
use crate::gfx::texture::Texture;
use crate::gfx::traits::NativeApi;

/// Number of buffers in the chain.
pub const SWAPCHAIN_BUFFER_COUNT: u32 = 2;

/// Format of the depth target created alongside the swapchain.
pub const DEPTH_FORMAT: PixelFormat = PixelFormat::Depth24Stencil8;

/// Lifecycle of the swapchain.
///
/// `Uninitialized -> Ready` on creation, `Ready -> Resizing -> Ready` on resize.
/// Binding render state is illegal while `Resizing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapchainState {
    /// No swapchain exists.
    Uninitialized,
    /// Targets exist and are bound.
    Ready,
    /// Targets are torn down, or a resize failed midway.
    Resizing,
}

/// The native swapchain and the targets bound to it.
#[derive(Debug)]
pub struct Swapchain {
    id: SwapchainId,
    state: SwapchainState,
    back_buffer: Option<Texture>,
    depth: Option<Texture>,
    viewport: Viewport,
}

impl Swapchain {
    /// The native swapchain.
    pub fn id(&self) -> SwapchainId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// The back-buffer render-target view.
    pub fn render_target_view(&self) -> Option<ViewId> {
        self.back_buffer
            .as_ref()
            .and_then(Texture::render_target_view)
    }

    /// The depth-stencil view.
    pub fn depth_stencil_view(&self) -> Option<ViewId> {
        self.depth.as_ref().and_then(Texture::depth_stencil_view)
    }

    fn release_targets(&mut self, api: &dyn NativeApi) {
        if let Some(mut depth) = self.depth.take() {
            depth.release(api);
        }
        if let Some(mut back_buffer) = self.back_buffer.take() {
            back_buffer.release(api);
        }
    }

    pub(crate) fn release(&mut self, api: &dyn NativeApi) {
        self.release_targets(api);
        api.release(self.id.into());
        log::debug!("Released swapchain {:?}", self.id);
    }
}

/// Creates the back-buffer view and the depth target at `width` x `height`.
fn create_targets(
    api: &dyn NativeApi,
    device: DeviceId,
    swapchain: SwapchainId,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> GfxResult<(Texture, Texture)> {
    let mut back_buffer = Texture::wrap_back_buffer(api, device, swapchain, width, height, format)?;
    let depth_desc = TextureDescriptor::new_2d(DEPTH_FORMAT, width, height)
        .with_flags(TextureFlags::DEPTH_STENCIL)
        .with_label("swapchain depth");
    match Texture::create_on(api, device, None, &depth_desc) {
        Ok(depth) => Ok((back_buffer, depth)),
        Err(e) => {
            back_buffer.release(api);
            Err(e)
        }
    }
}

fn bind_targets(api: &dyn NativeApi, context: ContextId, swapchain: &Swapchain) {
    api.set_render_targets(
        context,
        swapchain.render_target_view(),
        swapchain.depth_stencil_view(),
    );
    api.set_viewport(context, &swapchain.viewport);
}

impl Device {
    /// Creates a double-buffered flip-discard swapchain for `window`, its
    /// render-target and depth-stencil views, binds both and sets a viewport
    /// covering the whole surface.
    ///
    /// ## Errors
    /// * `Null` - `window` is `None`.
    /// * `NoData` - `width` or `height` is zero.
    /// * `Error` - a swapchain already exists, or a native call failed. Objects
    ///   created for the swapchain are released newest first.
    pub fn create_swapchain(
        &mut self,
        window: Option<GfxWindow>,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        fps: Rational,
        fullscreen: bool,
    ) -> GfxResult<()> {
        let window = window.ok_or(GfxError::Null { what: "window" })?;
        if width == 0 || height == 0 {
            return Err(GfxError::NoData {
                what: "swapchain back buffer",
            });
        }
        if self.swapchain.is_some() {
            return Err(GfxError::InvalidState {
                operation: "create swapchain",
                state: format!("{:?}", self.swapchain_state()),
            });
        }

        let api = self.api();
        let descriptor = SwapchainDescriptor {
            window: window.clone(),
            width,
            height,
            format: pixel_format,
            refresh_rate: fps,
            fullscreen,
            buffer_count: SWAPCHAIN_BUFFER_COUNT,
            swap_effect: SwapEffect::FlipDiscard,
        };
        let id = api
            .create_swapchain(self.device_id(), &descriptor)
            .inspect_err(|e| log::error!("Failed to create swapchain {descriptor:?}: {e}"))?;

        let (back_buffer, depth) =
            match create_targets(api, self.device_id(), id, width, height, pixel_format) {
                Ok(targets) => targets,
                Err(e) => {
                    log::error!("Failed to create swapchain targets: {e}");
                    api.release(id.into());
                    return Err(e);
                }
            };

        let swapchain = Swapchain {
            id,
            state: SwapchainState::Ready,
            back_buffer: Some(back_buffer),
            depth: Some(depth),
            viewport: Viewport::full(width, height),
        };
        bind_targets(api, self.context_id(), &swapchain);
        self.swapchain = Some(swapchain);

        let config = self.config_mut();
        config.window = Some(window);
        config.width = width;
        config.height = height;
        config.pixel_format = pixel_format;
        config.fps = fps;
        config.fullscreen = fullscreen;

        log::info!(
            "Created swapchain {width}x{height} {pixel_format:?} @ {:.2} Hz",
            fps.hz()
        );
        Ok(())
    }

    /// Resizes the swapchain.
    ///
    /// The sequence is fixed: unbind and destroy the render-target and depth
    /// objects, resize the native buffers, recreate the targets at the new size,
    /// then rebind targets and viewport. A zero size (minimized window) is
    /// ignored. If any step fails the swapchain stays `Resizing` until a later
    /// resize succeeds.
    ///
    /// ## Errors
    /// * `Error` - no swapchain exists, or a native call failed.
    pub fn resize_swapchain(
        &mut self,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> GfxResult<()> {
        if width == 0 || height == 0 {
            log::warn!("Ignoring swapchain resize to {width}x{height}");
            return Ok(());
        }

        let device = self.device_id();
        let context = self.context_id();
        let api_owner = self.api_arc();
        let api = api_owner.as_ref();
        let swapchain = self.swapchain.as_mut().ok_or_else(|| GfxError::InvalidState {
            operation: "resize swapchain",
            state: format!("{:?}", SwapchainState::Uninitialized),
        })?;

        swapchain.state = SwapchainState::Resizing;

        api.set_render_targets(context, None, None);
        swapchain.release_targets(api);
        debug_assert!(swapchain.back_buffer.is_none() && swapchain.depth.is_none());

        api.resize_buffers(swapchain.id, width, height, pixel_format)
            .inspect_err(|e| {
                log::error!("Failed to resize swapchain buffers to {width}x{height}: {e}")
            })?;

        let (back_buffer, depth) =
            create_targets(api, device, swapchain.id, width, height, pixel_format)
                .inspect_err(|e| log::error!("Failed to recreate swapchain targets: {e}"))?;
        swapchain.back_buffer = Some(back_buffer);
        swapchain.depth = Some(depth);
        swapchain.viewport = Viewport::full(width, height);

        bind_targets(api, context, swapchain);
        swapchain.state = SwapchainState::Ready;

        let config = self.config_mut();
        config.width = width;
        config.height = height;
        config.pixel_format = pixel_format;
        log::info!("Resized swapchain to {width}x{height} {pixel_format:?}");
        Ok(())
    }

    /// The current viewport, or `None` without a swapchain.
    pub fn viewport(&self) -> Option<Viewport> {
        self.swapchain.as_ref().map(|swapchain| swapchain.viewport)
    }

    /// The active swapchain.
    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    /// Fails unless the swapchain is `Ready`.
    ///
    /// ## Errors
    /// * `Error` (`InvalidState`) - the swapchain is missing or resizing.
    pub fn ensure_bindable(&self, operation: &'static str) -> GfxResult<()> {
        match self.swapchain_state() {
            SwapchainState::Ready => Ok(()),
            state => Err(GfxError::InvalidState {
                operation,
                state: format!("swapchain is {state:?}"),
            }),
        }
    }

    /// Binds the swapchain targets, clears color to `clear_color` and depth to
    /// 1.0 with stencil 0.
    pub fn begin_frame(&mut self, clear_color: [f32; 4]) -> GfxResult<()> {
        self.ensure_bindable("begin frame")?;
        let api = self.api();
        let context = self.context_id();
        if let Some(swapchain) = self.swapchain.as_ref() {
            bind_targets(api, context, swapchain);
            if let Some(rtv) = swapchain.render_target_view() {
                api.clear_render_target(context, rtv, clear_color);
            }
            if let Some(dsv) = swapchain.depth_stencil_view() {
                api.clear_depth_stencil(context, dsv, 1.0, 0);
            }
        }
        Ok(())
    }

    /// Presents the back buffer, waiting for vertical blank when `vsync` is set.
    pub fn present(&mut self, vsync: bool) -> GfxResult<()> {
        self.ensure_bindable("present")?;
        let Some(swapchain) = self.swapchain.as_ref() else {
            return Ok(());
        };
        self.api()
            .present(swapchain.id, u32::from(vsync))
            .inspect_err(|e| log::error!("Failed to present: {e}"))
    }

    /// Presents the back buffer with the vsync setting of the device config.
    pub fn present_frame(&mut self) -> GfxResult<()> {
        let vsync = self.config().vsync;
        self.present(vsync)
    }
}
