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

//! Named shader variables and their packing into a constant buffer.
//!
//! Every non-texture variable occupies its size rounded up to 16 bytes, in
//! insertion order. This over-allocates scalars compared to native packing rules,
//! so shaders must declare one 16-byte register per variable. Offsets are
//! produced by a single iterator ([`ShaderVars::layout`]) that both the size
//! query and the fill walk.

use crate::gfx::api::ViewId;
use crate::gfx::error::{GfxError, GfxResult};
use crate::gfx::texture::Texture;
use bytemuck::Pod;
use std::slice;

/// Alignment of every variable in the constant buffer.
pub const CBUFFER_ALIGNMENT: usize = 16;

/// The type of a shader variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    /// `float`
    Float,
    /// `int`
    Int,
    /// `uint`
    UInt,
    /// `float2`
    Vec2,
    /// `float3`
    Vec3,
    /// `float4`
    Vec4,
    /// `float4x4`
    Mat4,
    /// A texture bound through its shader-resource view.
    Texture,
}

impl VarType {
    /// Size of the value in bytes; textures contribute none.
    pub fn size(self) -> usize {
        match self {
            VarType::Float | VarType::Int | VarType::UInt => 4,
            VarType::Vec2 => 8,
            VarType::Vec3 => 12,
            VarType::Vec4 => 16,
            VarType::Mat4 => 64,
            VarType::Texture => 0,
        }
    }

    /// Size of the slot the value occupies in the constant buffer.
    pub fn padded_size(self) -> usize {
        self.size().div_ceil(CBUFFER_ALIGNMENT) * CBUFFER_ALIGNMENT
    }
}

/// A value passed to [`ShaderVars::set_by_name`].
#[derive(Debug, Clone, Copy)]
pub enum ShaderValue<'a> {
    /// Raw bytes, copied into the variable.
    Bytes(&'a [u8]),
    /// A texture's shader-resource view. Only the reference is kept.
    Texture(ViewId),
}

impl<'a> ShaderValue<'a> {
    /// Views any plain value (`f32`, `[f32; 4]`, `[[f32; 4]; 4]`, ...) as bytes.
    pub fn of<T: Pod>(value: &'a T) -> Self {
        ShaderValue::Bytes(bytemuck::bytes_of(value))
    }

    /// References the shader-resource view of `texture`.
    ///
    /// ## Errors
    /// * `Null` - the texture has no shader-resource view.
    pub fn texture(texture: &Texture) -> GfxResult<Self> {
        texture
            .shader_resource_view()
            .map(ShaderValue::Texture)
            .ok_or(GfxError::Null {
                what: "texture shader-resource view",
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum VarValue {
    Unset,
    Bytes(Vec<u8>),
    Texture(ViewId),
}

/// A named uniform of a shader.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderVar {
    name: String,
    var_type: VarType,
    value: VarValue,
}

impl ShaderVar {
    /// Declares an unset variable.
    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            var_type,
            value: VarValue::Unset,
        }
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable type.
    pub fn var_type(&self) -> VarType {
        self.var_type
    }

    /// Returns `true` once a value has been set.
    pub fn is_set(&self) -> bool {
        self.value != VarValue::Unset
    }

    /// The stored bytes of a non-texture variable.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.value {
            VarValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The referenced view of a texture variable.
    pub fn texture(&self) -> Option<ViewId> {
        match self.value {
            VarValue::Texture(view) => Some(view),
            _ => None,
        }
    }
}

/// Walks the non-texture variables in insertion order with their byte offsets.
#[derive(Debug, Clone)]
pub struct VarLayout<'a> {
    vars: slice::Iter<'a, ShaderVar>,
    offset: usize,
}

impl<'a> Iterator for VarLayout<'a> {
    type Item = (usize, &'a ShaderVar);

    fn next(&mut self) -> Option<Self::Item> {
        let var = self
            .vars
            .by_ref()
            .find(|var| var.var_type != VarType::Texture)?;
        let offset = self.offset;
        self.offset += var.var_type.padded_size();
        Some((offset, var))
    }
}

/// The ordered, append-only variable list of one shader.
#[derive(Debug, Clone, Default)]
pub struct ShaderVars {
    vars: Vec<ShaderVar>,
}

impl ShaderVars {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `var`. Duplicate names are kept; lookups hit the first one.
    pub fn add(&mut self, var: ShaderVar) {
        self.vars.push(var);
    }

    /// All variables, in insertion order.
    pub fn iter(&self) -> slice::Iter<'_, ShaderVar> {
        self.vars.iter()
    }

    /// Number of variables, textures included.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if no variable was declared.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Sets the first variable named `name`.
    ///
    /// ## Errors
    /// * `NotFound` - no variable has that name.
    /// * `Unknown` - the value's kind or size disagrees with the variable's type.
    pub fn set_by_name(&mut self, name: &str, value: ShaderValue<'_>) -> GfxResult<()> {
        let var = self
            .vars
            .iter_mut()
            .find(|var| var.name == name)
            .ok_or_else(|| GfxError::not_found("shader variable", name))?;

        var.value = match (var.var_type, value) {
            (VarType::Texture, ShaderValue::Texture(view)) => VarValue::Texture(view),
            (var_type, ShaderValue::Bytes(bytes))
                if var_type != VarType::Texture && bytes.len() == var_type.size() =>
            {
                VarValue::Bytes(bytes.to_vec())
            }
            (var_type, value) => {
                return Err(GfxError::Unknown {
                    what: "shader variable value",
                    value: format!("{value:?} for '{name}' of type {var_type:?}"),
                })
            }
        };
        Ok(())
    }

    /// Offsets of the non-texture variables.
    pub fn layout(&self) -> VarLayout<'_> {
        VarLayout {
            vars: self.vars.iter(),
            offset: 0,
        }
    }

    /// Size of the constant buffer holding every non-texture variable.
    pub fn size(&self) -> usize {
        self.layout()
            .last()
            .map_or(0, |(offset, var)| offset + var.var_type.padded_size())
    }

    /// Packs every non-texture variable into `out` at its layout offset.
    ///
    /// `out` is resized to [`ShaderVars::size`]; unset variables stay zero.
    /// Returns the number of bytes filled, 0 meaning there is nothing to upload.
    pub fn fill(&self, out: &mut Vec<u8>) -> usize {
        let size = self.size();
        out.clear();
        out.resize(size, 0);
        for (offset, var) in self.layout() {
            if let Some(bytes) = var.bytes() {
                out[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
        }
        size
    }

    /// Returns `true` if any variable is a texture.
    pub fn has_textures(&self) -> bool {
        self.vars.iter().any(|var| var.var_type == VarType::Texture)
    }

    /// The views bound to texture variables, in insertion order.
    pub fn textures(&self) -> Vec<ViewId> {
        self.vars.iter().filter_map(ShaderVar::texture).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::error::ErrorKind;

    fn mixed() -> ShaderVars {
        let mut vars = ShaderVars::new();
        vars.add(ShaderVar::new("time", VarType::Float));
        vars.add(ShaderVar::new("albedo", VarType::Texture));
        vars.add(ShaderVar::new("offset", VarType::Vec3));
        vars.add(ShaderVar::new("world", VarType::Mat4));
        vars.add(ShaderVar::new("frame", VarType::UInt));
        vars.add(ShaderVar::new("tint", VarType::Vec4));
        vars
    }

    #[test]
    fn offsets_are_aligned_and_strictly_increasing() {
        let vars = mixed();
        let offsets: Vec<usize> = vars.layout().map(|(offset, _)| offset).collect();
        assert_eq!(offsets, vec![0, 16, 32, 96, 112]);
        for pair in offsets.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(offsets.iter().all(|o| o % CBUFFER_ALIGNMENT == 0));
    }

    #[test]
    fn size_equals_the_offset_of_one_more_var() {
        let mut vars = mixed();
        let size = vars.size();
        vars.add(ShaderVar::new("extra", VarType::Float));
        let (offset, var) = vars.layout().last().unwrap();
        assert_eq!(var.name(), "extra");
        assert_eq!(offset, size);
    }

    #[test]
    fn fill_writes_each_value_at_its_offset() {
        let mut vars = mixed();
        vars.set_by_name("time", ShaderValue::of(&1.5f32)).unwrap();
        vars.set_by_name("tint", ShaderValue::of(&[0.25f32; 4]))
            .unwrap();

        let mut out = vec![0xff; 3];
        let filled = vars.fill(&mut out);
        assert_eq!(filled, 128);
        assert_eq!(out.len(), 128);
        assert_eq!(&out[0..4], bytemuck::bytes_of(&1.5f32));
        assert!(out[4..112].iter().all(|&b| b == 0));
        assert_eq!(&out[112..128], bytemuck::bytes_of(&[0.25f32; 4]));
    }

    #[test]
    fn textures_contribute_no_bytes() {
        let mut vars = ShaderVars::new();
        vars.add(ShaderVar::new("albedo", VarType::Texture));
        assert_eq!(vars.size(), 0);
        assert_eq!(vars.fill(&mut Vec::new()), 0);
        assert!(vars.has_textures());
        assert!(vars.textures().is_empty());

        vars.set_by_name("albedo", ShaderValue::Texture(ViewId(7)))
            .unwrap();
        assert_eq!(vars.textures(), vec![ViewId(7)]);
    }

    #[test]
    fn lookup_errors() {
        let mut vars = mixed();
        let err = vars
            .set_by_name("missing", ShaderValue::of(&0.0f32))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = vars
            .set_by_name("world", ShaderValue::of(&0.0f32))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);

        let err = vars
            .set_by_name("albedo", ShaderValue::of(&[0u8; 4]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);

        let err = vars
            .set_by_name("time", ShaderValue::Texture(ViewId(1)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn duplicate_names_resolve_to_the_first() {
        let mut vars = ShaderVars::new();
        vars.add(ShaderVar::new("scale", VarType::Float));
        vars.add(ShaderVar::new("scale", VarType::Float));
        vars.set_by_name("scale", ShaderValue::of(&2.0f32)).unwrap();

        let set: Vec<bool> = vars.iter().map(ShaderVar::is_set).collect();
        assert_eq!(set, vec![true, false]);
        assert_eq!(vars.size(), 32);
    }
}
