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

//! The configuration surface of the graphics layer.

use super::format::PixelFormat;
use super::swapchain::{GfxWindow, Rational};
use crate::gfx::error::GfxError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which native backend drives the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// The in-memory recording backend.
    Mock,
    /// The wgpu backend from `lumen-infra`.
    #[default]
    Wgpu,
}

/// Settings passed once at initialization; width, height and pixel format are
/// reused when the swapchain is resized.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GfxConfig {
    /// Backend selection.
    pub backend: BackendKind,
    /// Window to present into. Supplied by the windowing layer at runtime.
    #[serde(skip)]
    pub window: Option<GfxWindow>,
    /// Index of the adapter to create the device on.
    pub adapter: u32,
    /// Back-buffer width.
    pub width: u32,
    /// Back-buffer height.
    pub height: u32,
    /// Requested refresh rate.
    pub fps: Rational,
    /// Exclusive fullscreen.
    pub fullscreen: bool,
    /// Back-buffer format.
    pub pixel_format: PixelFormat,
    /// Wait for vertical blank when presenting.
    pub vsync: bool,
    /// Request the native debug layer.
    pub debug: bool,
}

impl Default for GfxConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            window: None,
            adapter: 0,
            width: 1280,
            height: 720,
            fps: Rational::default(),
            fullscreen: false,
            pixel_format: PixelFormat::Rgba8Unorm,
            vsync: true,
            debug: cfg!(debug_assertions),
        }
    }
}

impl GfxConfig {
    /// Returns a copy bound to `window`.
    pub fn with_window(mut self, window: GfxWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Checks the settings before any native object is created.
    ///
    /// ## Errors
    /// * `Null` - no window was supplied.
    /// * `NoData` - the back buffer would be empty.
    /// * `Unknown` - the refresh rate has a zero denominator or the pixel format
    ///   cannot be presented.
    pub fn validate(&self) -> Result<(), GfxError> {
        if self.window.is_none() {
            return Err(GfxError::Null { what: "window" });
        }
        if self.width == 0 || self.height == 0 {
            return Err(GfxError::NoData {
                what: "swapchain back buffer",
            });
        }
        if self.fps.denominator == 0 {
            return Err(GfxError::unknown("refresh rate", self.fps));
        }
        if self.pixel_format.is_depth() {
            return Err(GfxError::unknown("back-buffer format", self.pixel_format));
        }
        Ok(())
    }
}

impl fmt::Debug for GfxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GfxConfig")
            .field("backend", &self.backend)
            .field("window", &self.window.as_ref().map(|_| "<window>"))
            .field("adapter", &self.adapter)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("fps", &self.fps)
            .field("fullscreen", &self.fullscreen)
            .field("pixel_format", &self.pixel_format)
            .field("vsync", &self.vsync)
            .field("debug", &self.debug)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::error::ErrorKind;
    use crate::gfx::mock::HeadlessWindow;
    use std::sync::Arc;

    #[test]
    fn missing_window_is_null() {
        let err = GfxConfig::default().validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Null);
    }

    #[test]
    fn validates_size_rate_and_format() {
        let window: GfxWindow = Arc::new(HeadlessWindow::default());
        let base = GfxConfig::default().with_window(window);
        assert!(base.validate().is_ok());

        let mut zero = base.clone();
        zero.height = 0;
        assert_eq!(zero.validate().unwrap_err().kind(), ErrorKind::NoData);

        let mut bad_rate = base.clone();
        bad_rate.fps = Rational::new(60, 0);
        assert_eq!(bad_rate.validate().unwrap_err().kind(), ErrorKind::Unknown);

        let mut depth = base;
        depth.pixel_format = PixelFormat::Depth32Float;
        assert_eq!(depth.validate().unwrap_err().kind(), ErrorKind::Unknown);
    }

    #[test]
    fn deserializes_partial_settings_over_defaults() {
        let config: GfxConfig = serde_json::from_str(
            r#"{ "backend": "Mock", "adapter": 1, "width": 640, "height": 480,
                 "fps": { "numerator": 144, "denominator": 1 } }"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Mock);
        assert_eq!(config.adapter, 1);
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.fps.hz(), 144.0);
        assert_eq!(config.pixel_format, PixelFormat::Rgba8Unorm);
        assert!(config.window.is_none());
    }
}
