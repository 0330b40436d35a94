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

//! Graphics backends.

pub mod wgpu;

use std::sync::Arc;

use lumen_core::gfx::mock::MockApi;
use lumen_core::gfx::{BackendKind, GfxConfig, NativeApi};

/// Creates the backend `config` selects.
///
/// The WGPU backend turns on validation when `config.debug` is set.
pub fn create_api(config: &GfxConfig) -> Arc<dyn NativeApi> {
    log::info!("Using the {:?} graphics backend", config.backend);
    match config.backend {
        BackendKind::Mock => Arc::new(MockApi::new()),
        BackendKind::Wgpu => Arc::new(wgpu::WgpuApi::new(config.debug)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::gfx::mock::HeadlessWindow;
    use lumen_core::gfx::Device;

    #[test]
    fn test_mock_backend_drives_a_device() {
        let config = GfxConfig {
            backend: BackendKind::Mock,
            ..GfxConfig::default()
        }
        .with_window(Arc::new(HeadlessWindow::default()));

        let device = Device::initialize(create_api(&config), &config).unwrap();

        assert!(device.swapchain().is_some());
    }
}
