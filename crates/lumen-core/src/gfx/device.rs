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

//! Adapter enumeration and logical device creation.

use crate::gfx::api::*;
use crate::gfx::error::{GfxError, GfxResult};
use crate::gfx::state_cache::StateCache;
use crate::gfx::swapchain::{Swapchain, SwapchainState};
use crate::gfx::traits::NativeApi;
use std::fmt;
use std::sync::Arc;

/// Lists every adapter the native API can see, each with its displays.
///
/// The factory used for enumeration is released before returning.
///
/// ## Errors
/// * `NotFound` - the native factory could not be created.
pub fn enumerate_adapters(api: &dyn NativeApi) -> GfxResult<Vec<AdapterInfo>> {
    let factory = api.create_factory().map_err(|e| {
        log::error!("Failed to create the graphics factory: {e}");
        GfxError::not_found("graphics factory", e.to_string())
    })?;
    let adapters = api.enumerate_adapters(factory);
    api.release(factory.into());
    let adapters = adapters.inspect_err(|e| log::error!("Failed to enumerate adapters: {e}"))?;

    for adapter in &adapters {
        log::debug!(
            "Adapter {}: '{}' ({:?}), {} MiB VRAM, {} display(s)",
            adapter.index,
            adapter.name,
            adapter.adapter_type,
            adapter.dedicated_video_memory >> 20,
            adapter.displays.len()
        );
    }
    Ok(adapters)
}

/// Number of sampler slots a pixel stage exposes.
pub const MAX_SAMPLER_SLOTS: u32 = 16;

/// Native objects produced by a successful device bring-up.
struct NativeParts {
    factory: FactoryId,
    adapter_id: AdapterId,
    adapter: AdapterInfo,
    device: DeviceId,
    context: ContextId,
    feature_level: FeatureLevel,
}

/// The logical device, its immediate context and everything bound to them.
///
/// A `Device` is created once and passed by reference to every resource
/// constructor. Dropping it releases, newest first, the cached samplers, the
/// swapchain with its render targets, the context, the device, the adapter and
/// the factory. Buffers, textures and shaders are owned by their creators and
/// must be freed before the device is dropped.
pub struct Device {
    api: Arc<dyn NativeApi>,
    factory: FactoryId,
    adapter_id: AdapterId,
    adapter: AdapterInfo,
    device: DeviceId,
    context: ContextId,
    feature_level: FeatureLevel,
    config: GfxConfig,
    pub(crate) swapchain: Option<Swapchain>,
    samplers: Vec<StateCache<SamplerDescriptor>>,
    pub(crate) bound_vertex_shader: Option<ProgramId>,
    pub(crate) bound_pixel_shader: Option<ProgramId>,
}

impl Device {
    /// Creates the device on the adapter selected by `config.adapter`.
    ///
    /// Feature levels are tried from newest to oldest. No swapchain is created;
    /// see [`Device::initialize`] for the one-call bring-up.
    ///
    /// ## Errors
    /// * `NotFound` - no factory, or the adapter index is out of range.
    /// * `Error` - the adapter supports none of the feature levels.
    ///
    /// Whatever was already created is released in reverse order on failure.
    pub fn create(api: Arc<dyn NativeApi>, config: &GfxConfig) -> GfxResult<Self> {
        let mut unwind = UnwindStack::new();
        match Self::create_native(api.as_ref(), config, &mut unwind) {
            Ok(parts) => {
                unwind.commit();
                log::info!(
                    "Created graphics device on '{}' at feature level {:?}",
                    parts.adapter.name,
                    parts.feature_level
                );
                Ok(Self {
                    api,
                    factory: parts.factory,
                    adapter_id: parts.adapter_id,
                    adapter: parts.adapter,
                    device: parts.device,
                    context: parts.context,
                    feature_level: parts.feature_level,
                    config: config.clone(),
                    swapchain: None,
                    samplers: Vec::new(),
                    bound_vertex_shader: None,
                    bound_pixel_shader: None,
                })
            }
            Err(e) => {
                log::error!("Failed to create graphics device (adapter {}): {e}", config.adapter);
                unwind.unwind(api.as_ref());
                Err(e)
            }
        }
    }

    /// Validates `config`, creates the device and opens its swapchain.
    pub fn initialize(api: Arc<dyn NativeApi>, config: &GfxConfig) -> GfxResult<Self> {
        config.validate()?;
        let mut device = Self::create(api, config)?;
        device.create_swapchain(
            config.window.clone(),
            config.width,
            config.height,
            config.pixel_format,
            config.fps,
            config.fullscreen,
        )?;
        Ok(device)
    }

    fn create_native(
        api: &dyn NativeApi,
        config: &GfxConfig,
        unwind: &mut UnwindStack,
    ) -> GfxResult<NativeParts> {
        let factory = api
            .create_factory()
            .map_err(|e| GfxError::not_found("graphics factory", e.to_string()))?;
        unwind.push(factory);

        let adapter = api
            .enumerate_adapters(factory)?
            .into_iter()
            .find(|info| info.index == config.adapter)
            .ok_or_else(|| GfxError::not_found("adapter", config.adapter.to_string()))?;
        let adapter_id = api.open_adapter(factory, config.adapter)?;
        unwind.push(adapter_id);

        let (device, feature_level) = FeatureLevel::NEWEST_FIRST
            .iter()
            .find_map(|&level| match api.create_device(adapter_id, level, config.debug) {
                Ok(device) => Some((device, level)),
                Err(e) => {
                    log::debug!("Feature level {level:?} rejected: {e}");
                    None
                }
            })
            .ok_or_else(|| {
                GfxError::native(
                    "create_device",
                    format!("'{}' supports no known feature level", adapter.name),
                )
            })?;
        unwind.push(device);

        let context = api.immediate_context(device)?;
        unwind.push(context);

        Ok(NativeParts {
            factory,
            adapter_id,
            adapter,
            device,
            context,
            feature_level,
        })
    }

    /// The native API this device runs on.
    pub fn api(&self) -> &dyn NativeApi {
        self.api.as_ref()
    }

    pub(crate) fn api_arc(&self) -> Arc<dyn NativeApi> {
        Arc::clone(&self.api)
    }

    /// The native device.
    pub fn device_id(&self) -> DeviceId {
        self.device
    }

    /// The immediate context.
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    /// The adapter the device was created on.
    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    /// The feature level the device was created at.
    pub fn feature_level(&self) -> FeatureLevel {
        self.feature_level
    }

    /// The configuration the device was created with. Swapchain fields follow
    /// the latest successful create or resize.
    pub fn config(&self) -> &GfxConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut GfxConfig {
        &mut self.config
    }

    /// The state of the swapchain.
    pub fn swapchain_state(&self) -> SwapchainState {
        self.swapchain
            .as_ref()
            .map_or(SwapchainState::Uninitialized, Swapchain::state)
    }

    /// The vertex program bound by the last successful shader bind.
    pub fn bound_vertex_shader(&self) -> Option<ProgramId> {
        self.bound_vertex_shader
    }

    /// The pixel program bound by the last successful shader bind.
    pub fn bound_pixel_shader(&self) -> Option<ProgramId> {
        self.bound_pixel_shader
    }

    /// Returns the sampler cached in `slot`, rebuilding it only if `descriptor`
    /// differs from the cached one.
    ///
    /// ## Errors
    /// * `Unknown` - `slot` is not below [`MAX_SAMPLER_SLOTS`].
    pub fn configure_sampler(
        &mut self,
        slot: u32,
        descriptor: &SamplerDescriptor,
    ) -> GfxResult<SamplerId> {
        if slot >= MAX_SAMPLER_SLOTS {
            log::error!("Sampler slot {slot} is out of range (max {MAX_SAMPLER_SLOTS})");
            return Err(GfxError::unknown("sampler slot", slot));
        }
        let slot = slot as usize;
        if self.samplers.len() <= slot {
            self.samplers.resize_with(slot + 1, StateCache::default);
        }
        self.samplers[slot].configure(self.api.as_ref(), self.device, descriptor)
    }

    /// Native rebuild count of the sampler in `slot`.
    pub fn sampler_rebuilds(&self, slot: u32) -> u32 {
        self.samplers
            .get(slot as usize)
            .map_or(0, StateCache::rebuilds)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("adapter", &self.adapter.name)
            .field("device", &self.device)
            .field("context", &self.context)
            .field("feature_level", &self.feature_level)
            .field("swapchain", &self.swapchain_state())
            .finish_non_exhaustive()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let api = self.api.as_ref();
        for sampler in self.samplers.iter_mut().rev() {
            sampler.release(api);
        }
        if let Some(mut swapchain) = self.swapchain.take() {
            swapchain.release(api);
        }
        api.release(self.context.into());
        api.release(self.device.into());
        api.release(self.adapter_id.into());
        api.release(self.factory.into());
        log::info!("Released graphics device on '{}'", self.adapter.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::error::ErrorKind;
    use crate::gfx::mock::{MockAdapter, MockApi, MockCall};

    fn two_adapters() -> Arc<MockApi> {
        Arc::new(MockApi::with_adapters(vec![
            MockAdapter::named("Primary"),
            MockAdapter::named("Secondary").with_max_feature_level(FeatureLevel::L10_1),
        ]))
    }

    #[test]
    fn enumeration_releases_its_factory() {
        let api = two_adapters();
        let adapters = enumerate_adapters(api.as_ref()).unwrap();
        assert_eq!(adapters.len(), 2);
        assert_eq!(adapters[0].displays.len(), 1);
        assert_eq!(api.live_objects(), 0);
    }

    #[test]
    fn enumeration_without_factory_is_not_found() {
        let api = MockApi::new();
        api.fail("create_factory");
        let err = enumerate_adapters(&api).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn falls_back_to_older_feature_levels() {
        let api = two_adapters();
        let config = GfxConfig {
            adapter: 1,
            ..GfxConfig::default()
        };
        let device = Device::create(api.clone(), &config).unwrap();
        assert_eq!(device.feature_level(), FeatureLevel::L10_1);
        assert_eq!(device.adapter().name, "Secondary");
    }

    #[test]
    fn out_of_range_adapter_is_not_found_and_unwinds() {
        let api = two_adapters();
        let config = GfxConfig {
            adapter: 5,
            ..GfxConfig::default()
        };
        let err = Device::create(api.clone(), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(api.live_objects(), 0);
    }

    #[test]
    fn failed_context_releases_device_adapter_factory_in_reverse() {
        let api = two_adapters();
        api.fail("immediate_context");
        let err = Device::create(api.clone(), &GfxConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Error);
        assert_eq!(api.live_objects(), 0);

        let releases: Vec<_> = api
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Release(handle) => Some(handle),
                _ => None,
            })
            .collect();
        assert!(matches!(
            releases.as_slice(),
            [
                NativeHandle::Device(_),
                NativeHandle::Adapter(_),
                NativeHandle::Factory(_)
            ]
        ));
    }

    #[test]
    fn no_supported_level_is_an_error() {
        let api = Arc::new(MockApi::new());
        api.fail("create_device");
        let err = Device::create(api.clone(), &GfxConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Error);
        assert_eq!(api.count(|c| matches!(c, MockCall::CreateDevice(_))), 0);
        assert_eq!(api.live_objects(), 0);
    }

    #[test]
    fn drop_releases_everything() {
        let api = two_adapters();
        let mut device = Device::create(api.clone(), &GfxConfig::default()).unwrap();
        device
            .configure_sampler(2, &SamplerDescriptor::default())
            .unwrap();
        assert_eq!(device.sampler_rebuilds(2), 1);
        assert_eq!(device.sampler_rebuilds(0), 0);
        drop(device);
        assert_eq!(api.live_objects(), 0);
    }

    #[test]
    fn sampler_slot_past_the_stage_limit_is_unknown() {
        let api = Arc::new(MockApi::new());
        let mut device = Device::create(api.clone(), &GfxConfig::default()).unwrap();
        let last = device
            .configure_sampler(MAX_SAMPLER_SLOTS - 1, &SamplerDescriptor::default())
            .unwrap();
        assert!(api.is_live(last));

        let err = device
            .configure_sampler(MAX_SAMPLER_SLOTS, &SamplerDescriptor::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        let err = device
            .configure_sampler(u32::MAX, &SamplerDescriptor::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(device.sampler_rebuilds(MAX_SAMPLER_SLOTS), 0);
        assert_eq!(api.count(|c| matches!(c, MockCall::CreateSampler(_))), 1);
    }
}
