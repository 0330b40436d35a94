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

//! Interleaves mesh attributes into vertex, index and instance byte streams.
//!
//! The field order comes from [`VertexFormat::attributes`], the same list the
//! input layout is derived from.

use crate::gfx::api::{Semantic, VertexFormat};
use crate::gfx::error::{GfxError, GfxResult};

/// A 4x4 column-major matrix as consumed by shaders.
pub type Mat4 = [f32; 16];

/// Separate attribute streams of a mesh.
///
/// Every stream the vertex format needs must hold at least one entry per
/// position; streams the format does not use may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Object-space positions.
    pub positions: Vec<[f32; 3]>,
    /// Vertex colors.
    pub colors: Vec<[f32; 4]>,
    /// Object-space normals.
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates.
    pub uvs: Vec<[f32; 2]>,
    /// Index triples.
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// Number of vertices.
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Number of indices once triangles are flattened.
    pub fn index_count(&self) -> u32 {
        self.triangles.len() as u32 * 3
    }

    fn stream(&self, semantic: Semantic) -> GfxResult<&[u8]> {
        let (bytes, len, what): (&[u8], usize, &'static str) = match semantic {
            Semantic::Position => (bytemuck::cast_slice(&self.positions), self.positions.len(), "positions"),
            Semantic::Color => (bytemuck::cast_slice(&self.colors), self.colors.len(), "vertex colors"),
            Semantic::Normal => (bytemuck::cast_slice(&self.normals), self.normals.len(), "normals"),
            Semantic::TexCoord => (bytemuck::cast_slice(&self.uvs), self.uvs.len(), "texture coordinates"),
            Semantic::Instance => {
                return Err(GfxError::unknown("per-vertex semantic", semantic));
            }
        };
        if len < self.positions.len() {
            return Err(GfxError::NoData { what });
        }
        Ok(bytes)
    }
}

/// Interleaves the vertices of `mesh` into `out` following `format`.
///
/// `out` is cleared first. Returns the number of vertices written.
///
/// ## Errors
/// * `NoData` - an attribute the format needs has fewer entries than positions.
pub fn pack_vertices(mesh: &Mesh, format: VertexFormat, out: &mut Vec<u8>) -> GfxResult<u32> {
    let attributes = format.attributes();
    let streams = attributes
        .iter()
        .map(|attribute| mesh.stream(attribute.semantic))
        .collect::<GfxResult<Vec<_>>>()?;

    out.clear();
    out.reserve(mesh.positions.len() * format.stride() as usize);
    for vertex in 0..mesh.positions.len() {
        for (attribute, stream) in attributes.iter().zip(&streams) {
            let size = attribute.byte_size() as usize;
            out.extend_from_slice(&stream[vertex * size..(vertex + 1) * size]);
        }
    }
    Ok(mesh.vertex_count())
}

/// Flattens the triangles of `mesh` into 32-bit indices in `out`.
///
/// Returns the number of indices written.
pub fn pack_indices(mesh: &Mesh, out: &mut Vec<u8>) -> u32 {
    out.clear();
    out.extend_from_slice(bytemuck::cast_slice(&mesh.triangles));
    mesh.index_count()
}

/// Copies per-instance transforms into `out`, one 64-byte row block each.
///
/// Returns the number of instances written.
pub fn pack_instances(transforms: &[Mat4], out: &mut Vec<u8>) -> u32 {
    out.clear();
    out.extend_from_slice(bytemuck::cast_slice(transforms));
    transforms.len() as u32
}
