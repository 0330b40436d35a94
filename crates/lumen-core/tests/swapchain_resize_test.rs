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

use approx::assert_relative_eq;
use lumen_core::gfx::mock::{HeadlessWindow, MockApi, MockCall};
use lumen_core::gfx::*;
use std::sync::Arc;

fn setup(width: u32, height: u32) -> (Arc<MockApi>, Device) {
    let api = Arc::new(MockApi::new());
    let mut config = GfxConfig::default().with_window(Arc::new(HeadlessWindow::default()));
    config.width = width;
    config.height = height;
    let device = Device::initialize(api.clone(), &config).expect("device should initialize");
    (api, device)
}

#[test]
fn test_resize_releases_old_targets_before_resizing_buffers() {
    // --- 1. ARRANGE ---
    let (api, mut device) = setup(800, 600);
    let swapchain = device.swapchain().unwrap();
    let old_rtv = swapchain.render_target_view().unwrap();
    let old_dsv = swapchain.depth_stencil_view().unwrap();
    api.clear_calls();

    // --- 2. ACT ---
    device
        .resize_swapchain(1280, 720, PixelFormat::Rgba8Unorm)
        .unwrap();

    // --- 3. ASSERT ---
    let released = |view: ViewId| {
        api.position(move |c| *c == MockCall::Release(view.into()))
            .expect("old view released")
    };
    let unbind = api
        .position(|c| *c == MockCall::SetRenderTargets(None, None))
        .expect("targets unbound");
    let resize = api
        .position(|c| matches!(c, MockCall::ResizeBuffers { width: 1280, height: 720, .. }))
        .expect("buffers resized");
    let new_view = api
        .position(|c| matches!(c, MockCall::CreateView { .. }))
        .expect("new views created");

    assert!(unbind < released(old_rtv));
    assert!(released(old_rtv) < resize);
    assert!(released(old_dsv) < resize);
    assert!(resize < new_view);

    let viewport = device.viewport().unwrap();
    assert_relative_eq!(viewport.width, 1280.0);
    assert_relative_eq!(viewport.height, 720.0);
    assert_eq!(device.swapchain_state(), SwapchainState::Ready);
    assert_eq!(device.config().width, 1280);
    assert_eq!(device.config().height, 720);

    // The new targets are bound again.
    let swapchain = device.swapchain().unwrap();
    let rebound = MockCall::SetRenderTargets(
        swapchain.render_target_view(),
        swapchain.depth_stencil_view(),
    );
    assert!(api.calls().contains(&rebound));
}

#[test]
fn test_zero_sized_resize_is_ignored() {
    let (api, mut device) = setup(800, 600);
    api.clear_calls();

    device
        .resize_swapchain(0, 600, PixelFormat::Rgba8Unorm)
        .unwrap();

    assert!(api.calls().is_empty());
    assert_eq!(device.swapchain_state(), SwapchainState::Ready);
    assert_relative_eq!(device.viewport().unwrap().width, 800.0);
}

#[test]
fn test_failed_resize_blocks_binding_until_retried() {
    // --- 1. ARRANGE ---
    let (api, mut device) = setup(800, 600);

    // --- 2. ACT ---
    api.fail("resize_buffers");
    let failed = device.resize_swapchain(1024, 768, PixelFormat::Rgba8Unorm);
    let frame_while_resizing = device.begin_frame([0.0; 4]);
    let present_while_resizing = device.present(true);

    api.clear_failures();
    device
        .resize_swapchain(1024, 768, PixelFormat::Rgba8Unorm)
        .unwrap();

    // --- 3. ASSERT ---
    assert_eq!(failed.unwrap_err().kind(), ErrorKind::Error);
    assert!(matches!(
        frame_while_resizing,
        Err(GfxError::InvalidState { .. })
    ));
    assert!(present_while_resizing.is_err());
    assert_eq!(device.swapchain_state(), SwapchainState::Ready);
    device.begin_frame([0.0; 4]).unwrap();
    device.present(true).unwrap();
    assert!(api
        .calls()
        .contains(&MockCall::Present { sync_interval: 1 }));
}
