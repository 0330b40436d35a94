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

//! Plain data types shared between the graphics layer and its native backends.

pub mod adapter;
pub mod buffer;
pub mod config;
pub mod format;
pub mod ids;
pub mod shader;
pub mod state;
pub mod swapchain;
pub mod texture;
pub mod vertex;

pub use self::adapter::*;
pub use self::buffer::*;
pub use self::config::*;
pub use self::format::*;
pub use self::ids::*;
pub use self::shader::*;
pub use self::state::*;
pub use self::swapchain::*;
pub use self::texture::*;
pub use self::vertex::*;
