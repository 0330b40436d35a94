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

//! Defines the error type shared by every graphics operation.

use std::fmt;

/// The coarse category of a [`GfxError`].
///
/// Callers that only need to branch on the failure class (for example to decide
/// whether a missing file should fall back to an embedded shader) match on this
/// instead of on the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required handle or pointer was missing.
    Null,
    /// A zero-sized allocation was requested.
    NoData,
    /// A file, adapter or named resource could not be found.
    NotFound,
    /// A value was outside of any recognized enumeration or combination.
    Unknown,
    /// The native API rejected a call, or the call was illegal in the current state.
    Error,
    /// The request is valid but the code path is not built.
    NotImplemented,
}

/// An error raised by the graphics layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GfxError {
    /// A required handle was missing (e.g. no window to present into).
    Null {
        /// What was missing.
        what: &'static str,
    },
    /// A zero-sized resource was requested.
    NoData {
        /// The resource being created.
        what: &'static str,
    },
    /// A resource could not be located.
    NotFound {
        /// The kind of resource.
        what: &'static str,
        /// The name, path or index that was looked up.
        name: String,
    },
    /// A value did not map onto a known enumeration or legal combination.
    Unknown {
        /// The kind of value.
        what: &'static str,
        /// The offending value, formatted for diagnostics.
        value: String,
    },
    /// A native API call failed.
    Native {
        /// The operation that failed.
        operation: &'static str,
        /// Details reported by the backend.
        details: String,
    },
    /// The call is illegal in the object's current state.
    InvalidState {
        /// The operation that was rejected.
        operation: &'static str,
        /// The state the object was in.
        state: String,
    },
    /// The request is valid but not supported by this implementation.
    NotImplemented {
        /// The missing feature.
        what: String,
    },
}

impl GfxError {
    /// Returns the coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GfxError::Null { .. } => ErrorKind::Null,
            GfxError::NoData { .. } => ErrorKind::NoData,
            GfxError::NotFound { .. } => ErrorKind::NotFound,
            GfxError::Unknown { .. } => ErrorKind::Unknown,
            GfxError::Native { .. } | GfxError::InvalidState { .. } => ErrorKind::Error,
            GfxError::NotImplemented { .. } => ErrorKind::NotImplemented,
        }
    }

    /// Shorthand for a [`GfxError::Native`] error.
    pub fn native(operation: &'static str, details: impl Into<String>) -> Self {
        GfxError::Native {
            operation,
            details: details.into(),
        }
    }

    /// Shorthand for a [`GfxError::Unknown`] error.
    pub fn unknown(what: &'static str, value: impl fmt::Debug) -> Self {
        GfxError::Unknown {
            what,
            value: format!("{value:?}"),
        }
    }

    /// Shorthand for a [`GfxError::NotFound`] error.
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        GfxError::NotFound {
            what,
            name: name.into(),
        }
    }
}

impl fmt::Display for GfxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GfxError::Null { what } => write!(f, "Required handle is missing: {what}"),
            GfxError::NoData { what } => {
                write!(f, "Refusing to create zero-sized {what}")
            }
            GfxError::NotFound { what, name } => write!(f, "{what} not found: '{name}'"),
            GfxError::Unknown { what, value } => {
                write!(f, "Unrecognized {what}: {value}")
            }
            GfxError::Native { operation, details } => {
                write!(f, "Native call '{operation}' failed: {details}")
            }
            GfxError::InvalidState { operation, state } => {
                write!(f, "'{operation}' is not allowed while {state}")
            }
            GfxError::NotImplemented { what } => write!(f, "Not implemented: {what}"),
        }
    }
}

impl std::error::Error for GfxError {}

/// Convenience alias used across the graphics layer.
pub type GfxResult<T> = Result<T, GfxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_and_invalid_state_share_the_error_kind() {
        assert_eq!(GfxError::native("CreateBuffer", "E_OUTOFMEMORY").kind(), ErrorKind::Error);
        let err = GfxError::InvalidState {
            operation: "bind",
            state: "Resizing".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Error);
    }

    #[test]
    fn display_names_operation_and_parameters() {
        let err = GfxError::native("CreateTexture2D", "640x480 Rgba8Unorm rejected");
        assert_eq!(
            format!("{err}"),
            "Native call 'CreateTexture2D' failed: 640x480 Rgba8Unorm rejected"
        );

        let err = GfxError::not_found("shader source", "shaders/missing.hlsl");
        assert_eq!(format!("{err}"), "shader source not found: 'shaders/missing.hlsl'");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn unknown_formats_the_value_with_debug() {
        let err = GfxError::unknown("buffer type", 7u32);
        assert_eq!(format!("{err}"), "Unrecognized buffer type: 7");
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }
}
