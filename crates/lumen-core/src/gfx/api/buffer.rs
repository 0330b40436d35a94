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

use crate::gfx::error::GfxError;
use std::borrow::Cow;

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Per-vertex (or per-instance) attribute data.
    Vertex,
    /// Index data.
    Index,
    /// Shader constants.
    Constant,
}

/// How the CPU and GPU access a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// GPU read/write, no CPU access.
    Default,
    /// GPU read, CPU write through map-discard. The only usage that accepts `copy`.
    Dynamic,
    /// GPU read only; contents fixed at creation.
    Immutable,
    /// CPU-accessible transfer memory, never bound to the pipeline.
    Staging,
}

impl TryFrom<u32> for BufferType {
    type Error = GfxError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(BufferType::Vertex),
            1 => Ok(BufferType::Index),
            2 => Ok(BufferType::Constant),
            other => Err(GfxError::unknown("buffer type", other)),
        }
    }
}

impl TryFrom<u32> for BufferUsage {
    type Error = GfxError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(BufferUsage::Default),
            1 => Ok(BufferUsage::Dynamic),
            2 => Ok(BufferUsage::Immutable),
            3 => Ok(BufferUsage::Staging),
            other => Err(GfxError::unknown("buffer usage", other)),
        }
    }
}

/// Describes a buffer to the native API.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size in bytes.
    pub size: u64,
    /// Bind type.
    pub buffer_type: BufferType,
    /// Access pattern.
    pub usage: BufferUsage,
    /// Byte distance between elements, for vertex buffers.
    pub stride: u32,
}
