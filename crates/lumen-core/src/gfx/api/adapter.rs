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

//! Adapter and display descriptions reported by the native factory.

/// The physical type of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdapterType {
    /// A GPU integrated into the CPU.
    IntegratedGpu,
    /// A discrete, dedicated GPU.
    DiscreteGpu,
    /// A virtualized GPU.
    VirtualGpu,
    /// A software rasterizer.
    Software,
    /// Not reported by the backend.
    #[default]
    Unknown,
}

/// An output (monitor) attached to an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayInfo {
    /// The device name of the output (e.g. `\\.\DISPLAY1`).
    pub name: String,
    /// Desktop coordinates of the output: left, top, right, bottom.
    pub desktop_bounds: [i32; 4],
    /// Whether the output is attached to the desktop.
    pub attached_to_desktop: bool,
}

impl DisplayInfo {
    /// Width of the output's desktop area in pixels.
    pub fn width(&self) -> u32 {
        (self.desktop_bounds[2] - self.desktop_bounds[0]).max(0) as u32
    }

    /// Height of the output's desktop area in pixels.
    pub fn height(&self) -> u32 {
        (self.desktop_bounds[3] - self.desktop_bounds[1]).max(0) as u32
    }
}

/// A graphics adapter as enumerated by the native factory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdapterInfo {
    /// Position of the adapter in enumeration order.
    pub index: u32,
    /// Human-readable adapter name.
    pub name: String,
    /// The physical adapter type.
    pub adapter_type: AdapterType,
    /// PCI vendor id.
    pub vendor_id: u32,
    /// PCI device id.
    pub device_id: u32,
    /// PCI subsystem id.
    pub subsystem_id: u32,
    /// PCI revision.
    pub revision: u32,
    /// Dedicated video memory in bytes.
    pub dedicated_video_memory: u64,
    /// Dedicated system memory in bytes.
    pub dedicated_system_memory: u64,
    /// Shared system memory in bytes.
    pub shared_system_memory: u64,
    /// Outputs attached to this adapter, in enumeration order.
    pub displays: Vec<DisplayInfo>,
}

/// Feature levels a device may be created at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureLevel {
    /// Shader model 4.0 class hardware.
    L10_0,
    /// Shader model 4.1 class hardware.
    L10_1,
    /// Shader model 5.0 class hardware.
    L11_0,
    /// Shader model 5.0 with 11.1 extensions.
    L11_1,
}

impl FeatureLevel {
    /// Every feature level, newest first. Device creation walks this list.
    pub const NEWEST_FIRST: [FeatureLevel; 4] = [
        FeatureLevel::L11_1,
        FeatureLevel::L11_0,
        FeatureLevel::L10_1,
        FeatureLevel::L10_0,
    ];
}
