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
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Anything a surface can be created for.
pub trait WindowHandle: HasWindowHandle + HasDisplayHandle {}

impl<T: HasWindowHandle + HasDisplayHandle> WindowHandle for T {}

/// A shared, thread-safe window handle handed over by the windowing layer.
pub type GfxWindow = Arc<dyn WindowHandle + Send + Sync>;

/// A refresh rate expressed as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    /// Numerator.
    pub numerator: u32,
    /// Denominator.
    pub denominator: u32,
}

impl Rational {
    /// Builds `numerator / denominator`.
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// The rate in Hz, or 0 for an unspecified rate.
    pub fn hz(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::new(60, 1)
    }
}

/// How presented buffers are recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapEffect {
    /// Flip model; the back buffer contents are undefined after present.
    FlipDiscard,
    /// Flip model; the back buffer contents are preserved.
    FlipSequential,
}

/// Everything the native API needs to create a swapchain.
#[derive(Clone)]
pub struct SwapchainDescriptor {
    /// Window to present into.
    pub window: GfxWindow,
    /// Back-buffer width.
    pub width: u32,
    /// Back-buffer height.
    pub height: u32,
    /// Back-buffer format.
    pub format: PixelFormat,
    /// Requested refresh rate.
    pub refresh_rate: Rational,
    /// Exclusive fullscreen.
    pub fullscreen: bool,
    /// Number of buffers in the chain.
    pub buffer_count: u32,
    /// Recycling model.
    pub swap_effect: SwapEffect,
}

impl fmt::Debug for SwapchainDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapchainDescriptor")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("refresh_rate", &self.refresh_rate)
            .field("fullscreen", &self.fullscreen)
            .field("buffer_count", &self.buffer_count)
            .field("swap_effect", &self.swap_effect)
            .finish_non_exhaustive()
    }
}

/// The rasterizer viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Depth range minimum.
    pub min_depth: f32,
    /// Depth range maximum.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering a whole `width` x `height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}
