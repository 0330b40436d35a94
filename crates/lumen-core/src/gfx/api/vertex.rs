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

//! Vertex formats and the input layouts derived from them.
//!
//! A [`VertexFormat`] is the single source of truth for the interleaved vertex
//! layout: the packer walks [`VertexFormat::attributes`] to write bytes and
//! [`VertexFormat::input_layout`] walks the same list to compute offsets, so the
//! two cannot disagree.

use crate::gfx::error::GfxError;
use std::str::FromStr;

/// Bytes per instance in the per-instance transform stream (one 4x4 f32 matrix).
pub const INSTANCE_STRIDE: u32 = 64;

/// Input slot of the per-vertex stream.
pub const VERTEX_SLOT: u32 = 0;

/// Input slot of the per-instance transform stream.
pub const INSTANCE_SLOT: u32 = 1;

/// Meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    /// Object-space position.
    Position,
    /// Vertex color.
    Color,
    /// Object-space normal.
    Normal,
    /// Texture coordinate.
    TexCoord,
    /// One row of the per-instance transform.
    Instance,
}

impl Semantic {
    /// The semantic name used by the input layout.
    pub fn name(self) -> &'static str {
        match self {
            Semantic::Position => "POSITION",
            Semantic::Color => "COLOR",
            Semantic::Normal => "NORMAL",
            Semantic::TexCoord => "TEXCOORD",
            Semantic::Instance => "INSTANCE",
        }
    }
}

/// Storage format of one input element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementFormat {
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
}

impl ElementFormat {
    /// Size in bytes.
    pub fn size(self) -> u32 {
        match self {
            ElementFormat::Float2 => 8,
            ElementFormat::Float3 => 12,
            ElementFormat::Float4 => 16,
        }
    }

    fn from_components(components: u32) -> Self {
        match components {
            2 => ElementFormat::Float2,
            3 => ElementFormat::Float3,
            _ => ElementFormat::Float4,
        }
    }
}

/// One attribute of an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// What the attribute means.
    pub semantic: Semantic,
    /// Number of components.
    pub components: u32,
    /// Size of one component in bytes.
    pub component_size: u32,
}

impl VertexAttribute {
    const fn float(semantic: Semantic, components: u32) -> Self {
        Self {
            semantic,
            components,
            component_size: 4,
        }
    }

    /// Size of the attribute in bytes.
    pub fn byte_size(&self) -> u32 {
        self.components * self.component_size
    }

    /// The element format matching this attribute.
    pub fn format(&self) -> ElementFormat {
        ElementFormat::from_components(self.components)
    }
}

const POSITION: VertexAttribute = VertexAttribute::float(Semantic::Position, 3);
const COLOR: VertexAttribute = VertexAttribute::float(Semantic::Color, 4);
const NORMAL: VertexAttribute = VertexAttribute::float(Semantic::Normal, 3);
const TEX_COORD: VertexAttribute = VertexAttribute::float(Semantic::TexCoord, 2);

/// An entry of a native input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputElement {
    /// Semantic name.
    pub semantic: Semantic,
    /// Semantic index (row number for instance transforms).
    pub semantic_index: u32,
    /// Storage format.
    pub format: ElementFormat,
    /// Byte offset inside one element of its stream.
    pub offset: u32,
    /// Input slot (vertex buffer binding).
    pub slot: u32,
    /// Advances once per instance instead of once per vertex.
    pub per_instance: bool,
    /// Sequential shader input location.
    pub location: u32,
}

/// The supported interleaved vertex layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Position + color.
    PositionColor,
    /// Position + texture coordinate.
    PositionUv,
    /// Position + normal + texture coordinate.
    PositionNormalUv,
    /// [`VertexFormat::PositionColor`] with a per-instance transform.
    PositionColorInstanced,
    /// [`VertexFormat::PositionUv`] with a per-instance transform.
    PositionUvInstanced,
    /// [`VertexFormat::PositionNormalUv`] with a per-instance transform.
    PositionNormalUvInstanced,
}

impl VertexFormat {
    /// Per-vertex attributes, in interleaving order.
    pub fn attributes(self) -> &'static [VertexAttribute] {
        match self {
            VertexFormat::PositionColor | VertexFormat::PositionColorInstanced => {
                &[POSITION, COLOR]
            }
            VertexFormat::PositionUv | VertexFormat::PositionUvInstanced => &[POSITION, TEX_COORD],
            VertexFormat::PositionNormalUv | VertexFormat::PositionNormalUvInstanced => {
                &[POSITION, NORMAL, TEX_COORD]
            }
        }
    }

    /// Returns `true` if this format carries a per-instance transform stream.
    pub fn is_instanced(self) -> bool {
        matches!(
            self,
            VertexFormat::PositionColorInstanced
                | VertexFormat::PositionUvInstanced
                | VertexFormat::PositionNormalUvInstanced
        )
    }

    /// Size of one interleaved vertex in bytes.
    pub fn stride(self) -> u32 {
        self.attributes().iter().map(VertexAttribute::byte_size).sum()
    }

    /// Byte offset of `semantic` inside one vertex, if present.
    pub fn offset_of(self, semantic: Semantic) -> Option<u32> {
        let mut offset = 0;
        for attribute in self.attributes() {
            if attribute.semantic == semantic {
                return Some(offset);
            }
            offset += attribute.byte_size();
        }
        None
    }

    /// Builds the input layout table for this format.
    pub fn input_layout(self) -> Vec<InputElement> {
        let mut elements = Vec::with_capacity(self.attributes().len() + 4);
        let mut offset = 0;
        for attribute in self.attributes() {
            elements.push(InputElement {
                semantic: attribute.semantic,
                semantic_index: 0,
                format: attribute.format(),
                offset,
                slot: VERTEX_SLOT,
                per_instance: false,
                location: elements.len() as u32,
            });
            offset += attribute.byte_size();
        }

        if self.is_instanced() {
            for row in 0..4 {
                elements.push(InputElement {
                    semantic: Semantic::Instance,
                    semantic_index: row,
                    format: ElementFormat::Float4,
                    offset: row * ElementFormat::Float4.size(),
                    slot: INSTANCE_SLOT,
                    per_instance: true,
                    location: elements.len() as u32,
                });
            }
        }
        elements
    }
}

impl FromStr for VertexFormat {
    type Err = GfxError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "PositionColor" => Ok(VertexFormat::PositionColor),
            "PositionUv" => Ok(VertexFormat::PositionUv),
            "PositionNormalUv" => Ok(VertexFormat::PositionNormalUv),
            "PositionColorInstanced" => Ok(VertexFormat::PositionColorInstanced),
            "PositionUvInstanced" => Ok(VertexFormat::PositionUvInstanced),
            "PositionNormalUvInstanced" => Ok(VertexFormat::PositionNormalUvInstanced),
            other => Err(GfxError::unknown("vertex format", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [VertexFormat; 6] = [
        VertexFormat::PositionColor,
        VertexFormat::PositionUv,
        VertexFormat::PositionNormalUv,
        VertexFormat::PositionColorInstanced,
        VertexFormat::PositionUvInstanced,
        VertexFormat::PositionNormalUvInstanced,
    ];

    #[test]
    fn strides_match_attribute_sizes() {
        assert_eq!(VertexFormat::PositionColor.stride(), 28);
        assert_eq!(VertexFormat::PositionUv.stride(), 20);
        assert_eq!(VertexFormat::PositionNormalUv.stride(), 32);
    }

    #[test]
    fn layout_offsets_agree_with_offset_of() {
        for format in ALL {
            for element in format.input_layout().iter().filter(|e| !e.per_instance) {
                assert_eq!(Some(element.offset), format.offset_of(element.semantic));
            }
        }
    }

    #[test]
    fn instanced_formats_append_four_transform_rows() {
        let layout = VertexFormat::PositionUvInstanced.input_layout();
        let rows: Vec<_> = layout.iter().filter(|e| e.per_instance).collect();
        assert_eq!(rows.len(), 4);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.slot, INSTANCE_SLOT);
            assert_eq!(row.semantic_index, i as u32);
            assert_eq!(row.offset, i as u32 * 16);
        }
        assert_eq!(rows.last().unwrap().offset + 16, INSTANCE_STRIDE);
    }

    #[test]
    fn locations_are_sequential() {
        let layout = VertexFormat::PositionNormalUvInstanced.input_layout();
        for (i, element) in layout.iter().enumerate() {
            assert_eq!(element.location, i as u32);
        }
    }

    #[test]
    fn parses_tags() {
        assert_eq!(
            "PositionNormalUv".parse::<VertexFormat>().unwrap(),
            VertexFormat::PositionNormalUv
        );
        assert!("Position".parse::<VertexFormat>().is_err());
    }
}
