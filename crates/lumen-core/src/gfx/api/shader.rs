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
use std::fmt;

/// The pipeline stage a shader runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    /// Vertex stage.
    Vertex,
    /// Pixel (fragment) stage.
    Pixel,
    /// Geometry stage. Parsed but never compiled.
    Geometry,
    /// Compute stage. Parsed but never compiled.
    Compute,
}

impl ShaderKind {
    fn profile_prefix(self) -> &'static str {
        match self {
            ShaderKind::Vertex => "vs",
            ShaderKind::Pixel => "ps",
            ShaderKind::Geometry => "gs",
            ShaderKind::Compute => "cs",
        }
    }
}

/// A parsed target profile such as `vs_5_0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderTarget {
    /// Stage encoded in the profile prefix.
    pub kind: ShaderKind,
    /// Shader model major version.
    pub major: u8,
    /// Shader model minor version.
    pub minor: u8,
}

impl ShaderTarget {
    /// Parses a `<stage>_<major>_<minor>` profile string.
    ///
    /// ## Errors
    /// * `Unknown` - the string is not a recognized profile.
    /// * `NotImplemented` - geometry and compute profiles.
    pub fn parse(profile: &str) -> Result<Self, GfxError> {
        let mut parts = profile.split('_');
        let (Some(stage), Some(major), Some(minor), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(GfxError::unknown("shader target profile", profile));
        };

        let kind = match stage {
            "vs" => ShaderKind::Vertex,
            "ps" => ShaderKind::Pixel,
            "gs" | "cs" => {
                return Err(GfxError::NotImplemented {
                    what: format!("compilation of '{profile}' shaders"),
                })
            }
            _ => return Err(GfxError::unknown("shader target profile", profile)),
        };

        let (Ok(major), Ok(minor)) = (major.parse::<u8>(), minor.parse::<u8>()) else {
            return Err(GfxError::unknown("shader target profile", profile));
        };
        if !(4..=5).contains(&major) {
            return Err(GfxError::unknown("shader model", profile));
        }

        Ok(Self { kind, major, minor })
    }
}

impl fmt::Display for ShaderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.kind.profile_prefix(), self.major, self.minor)
    }
}

/// Everything the native compiler needs besides the source text.
#[derive(Debug, Clone)]
pub struct ShaderSourceDescriptor<'a> {
    /// Debug label, usually the source path.
    pub label: Cow<'a, str>,
    /// Entry-point function name.
    pub entry_point: Cow<'a, str>,
    /// Target profile.
    pub target: ShaderTarget,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::error::ErrorKind;

    #[test]
    fn parses_vertex_and_pixel_profiles() {
        let vs = ShaderTarget::parse("vs_5_0").unwrap();
        assert_eq!(vs.kind, ShaderKind::Vertex);
        assert_eq!((vs.major, vs.minor), (5, 0));
        assert_eq!(vs.to_string(), "vs_5_0");

        let ps = ShaderTarget::parse("ps_4_1").unwrap();
        assert_eq!(ps.kind, ShaderKind::Pixel);
    }

    #[test]
    fn geometry_and_compute_are_not_implemented() {
        for profile in ["gs_5_0", "cs_5_0"] {
            let err = ShaderTarget::parse(profile).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotImplemented);
        }
    }

    #[test]
    fn garbage_profiles_are_unknown() {
        for profile in ["", "vs5_0", "xs_5_0", "vs_five_0", "vs_5_0_1", "vs_3_0"] {
            let err = ShaderTarget::parse(profile).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unknown, "{profile}");
        }
    }
}
