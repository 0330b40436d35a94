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

//! Instance, device and surface creation.
//!
//! These helpers speak `anyhow`; the [`super::WgpuApi`] entry points map their
//! errors onto `GfxError::Native`.

use anyhow::{anyhow, Result};
use lumen_core::gfx::api::{FeatureLevel, GfxWindow, PixelFormat};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::{Adapter, Features, Instance, SurfaceTargetUnsafe};

use super::conversions::IntoWgpu;

/// Optional features enabled whenever the adapter offers them.
fn optional_features() -> Features {
    Features::POLYGON_MODE_LINE | Features::DEPTH_CLIP_CONTROL
}

/// Creates the WGPU instance over every available backend.
pub fn create_instance(debug: bool) -> Instance {
    let flags = if debug {
        wgpu::InstanceFlags::debugging()
    } else {
        wgpu::InstanceFlags::empty()
    };
    Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags,
        ..Default::default()
    })
}

/// The adapters of `instance`, in a stable enumeration order.
pub fn adapters(instance: &Instance) -> Vec<Adapter> {
    instance.enumerate_adapters(wgpu::Backends::all())
}

/// The newest feature level `adapter` can offer.
///
/// WGPU has no feature levels; a fully WebGPU-compliant adapter is treated as
/// 11_1 and a downlevel one as 10_1.
pub fn max_feature_level(adapter: &Adapter) -> FeatureLevel {
    if adapter.get_downlevel_capabilities().is_webgpu_compliant() {
        FeatureLevel::L11_1
    } else {
        FeatureLevel::L10_1
    }
}

/// Requests a logical device and its queue.
///
/// ## Errors
/// * The adapter tops out below `level`, or the device request failed.
pub fn request_device(
    adapter: &Adapter,
    level: FeatureLevel,
) -> Result<(wgpu::Device, wgpu::Queue)> {
    let max = max_feature_level(adapter);
    if level > max {
        return Err(anyhow!("adapter supports up to {max:?}, {level:?} requested"));
    }

    let required_limits = if level >= FeatureLevel::L11_0 {
        wgpu::Limits::default()
    } else {
        wgpu::Limits::downlevel_defaults()
    }
    .using_resolution(adapter.limits());

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Lumen Logical Device"),
        required_features: adapter.features() & optional_features(),
        required_limits,
        ..Default::default()
    }))
    .map_err(|e| anyhow!("Failed to create logical device: {}", e))?;

    device.on_uncaptured_error(Box::new(|e| {
        log::error!("WGPU Uncaptured Error: {e:?}");
    }));
    Ok((device, queue))
}

/// Creates a surface over `window`.
///
/// The window is kept alive by the swapchain entry that owns the surface.
pub fn create_surface(instance: &Instance, window: &GfxWindow) -> Result<wgpu::Surface<'static>> {
    let raw_display_handle = window
        .display_handle()
        .map_err(|e| anyhow!("Failed to get display handle: {}", e))?
        .as_raw();
    let raw_window_handle = window
        .window_handle()
        .map_err(|e| anyhow!("Failed to get window handle: {}", e))?
        .as_raw();

    let surface = unsafe {
        instance.create_surface_unsafe(SurfaceTargetUnsafe::RawHandle {
            raw_display_handle,
            raw_window_handle,
        })?
    };
    log::debug!("WGPU surface created for the window.");
    Ok(surface)
}

/// Builds the surface configuration for a swapchain.
///
/// Falls back to the surface's preferred format when `format` is not
/// presentable.
pub fn surface_config(
    surface: &wgpu::Surface<'_>,
    adapter: &Adapter,
    width: u32,
    height: u32,
    format: PixelFormat,
    vsync: bool,
) -> Result<wgpu::SurfaceConfiguration> {
    let caps = surface.get_capabilities(adapter);
    let requested: wgpu::TextureFormat = format.into_wgpu();
    let format = if caps.formats.contains(&requested) {
        requested
    } else {
        let fallback = caps
            .formats
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Surface is not compatible with the adapter"))?;
        log::warn!("Surface cannot present {requested:?}, using {fallback:?}");
        fallback
    };

    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: present_mode(vsync),
        alpha_mode: caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    })
}

/// Fifo is guaranteed to be supported; `AutoNoVsync` falls back to it.
pub fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::Fifo
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}
