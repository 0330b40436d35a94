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

//! Logger initialization for applications built on Lumen.

use env_logger::{Builder, Env};

/// Installs the global `env_logger` logger.
///
/// `RUST_LOG` overrides the default `info` filter. WGPU's HAL layer is kept
/// at `error` since it is very chatty at `info`.
///
/// Calling this more than once is harmless; later calls keep the first logger.
pub fn init_logging() {
    let installed = Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .try_init();
    if installed.is_err() {
        log::debug!("A logger was already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging();
        init_logging();
        log::info!("logger still works");
    }
}
