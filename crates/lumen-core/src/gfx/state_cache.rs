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

//! Dirty-checked caches for the fixed-function state objects.

use crate::gfx::api::*;
use crate::gfx::device::Device;
use crate::gfx::error::GfxResult;
use crate::gfx::traits::NativeApi;
use std::fmt;

/// A descriptor that builds one kind of native state object.
pub trait StateDescriptor: Clone + PartialEq + fmt::Debug {
    /// The native object built from the descriptor.
    type Id: Copy + Into<NativeHandle> + fmt::Debug;

    /// Builds the native object.
    fn build(&self, api: &dyn NativeApi, device: DeviceId) -> GfxResult<Self::Id>;
}

impl StateDescriptor for RasterDescriptor {
    type Id = RasterStateId;

    fn build(&self, api: &dyn NativeApi, device: DeviceId) -> GfxResult<Self::Id> {
        api.create_raster_state(device, self)
    }
}

impl StateDescriptor for BlendDescriptor {
    type Id = BlendStateId;

    fn build(&self, api: &dyn NativeApi, device: DeviceId) -> GfxResult<Self::Id> {
        api.create_blend_state(device, self)
    }
}

impl StateDescriptor for DepthDescriptor {
    type Id = DepthStateId;

    fn build(&self, api: &dyn NativeApi, device: DeviceId) -> GfxResult<Self::Id> {
        api.create_depth_state(device, self)
    }
}

impl StateDescriptor for SamplerDescriptor {
    type Id = SamplerId;

    fn build(&self, api: &dyn NativeApi, device: DeviceId) -> GfxResult<Self::Id> {
        api.create_sampler(device, self)
    }
}

/// Holds the last descriptor of one state category and the object built from it.
#[derive(Debug)]
pub struct StateCache<D: StateDescriptor> {
    cached: Option<(D, D::Id)>,
    rebuilds: u32,
}

impl<D: StateDescriptor> Default for StateCache<D> {
    fn default() -> Self {
        Self {
            cached: None,
            rebuilds: 0,
        }
    }
}

impl<D: StateDescriptor> StateCache<D> {
    /// Returns the native object for `descriptor`.
    ///
    /// An identical descriptor reuses the cached object. A different one releases
    /// the cached object and builds a new one. If the build fails the cache is
    /// left empty.
    pub fn configure(
        &mut self,
        api: &dyn NativeApi,
        device: DeviceId,
        descriptor: &D,
    ) -> GfxResult<D::Id> {
        if let Some((cached, id)) = &self.cached {
            if cached == descriptor {
                return Ok(*id);
            }
        }

        self.release(api);
        let id = descriptor.build(api, device).inspect_err(|e| {
            log::error!("Failed to build state object from {descriptor:?}: {e}");
        })?;
        log::debug!("Built state object {id:?}");
        self.cached = Some((descriptor.clone(), id));
        self.rebuilds += 1;
        Ok(id)
    }

    /// The currently cached object, if any.
    pub fn current(&self) -> Option<D::Id> {
        self.cached.as_ref().map(|(_, id)| *id)
    }

    /// How many native objects this cache has built.
    pub fn rebuilds(&self) -> u32 {
        self.rebuilds
    }

    /// Releases the cached object.
    pub fn release(&mut self, api: &dyn NativeApi) {
        if let Some((_, id)) = self.cached.take() {
            api.release(id.into());
        }
    }
}

/// The rasterizer, blend and depth caches used by draw submission.
///
/// Samplers are cached per slot on the [`Device`];
/// [`StateObjects::configure_sampler_state`] forwards to that list.
#[derive(Debug, Default)]
pub struct StateObjects {
    raster: StateCache<RasterDescriptor>,
    blend: StateCache<BlendDescriptor>,
    depth: StateCache<DepthDescriptor>,
}

impl StateObjects {
    /// Creates empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rasterizer state for `descriptor`, rebuilding only on change.
    pub fn configure_raster_state(
        &mut self,
        device: &Device,
        descriptor: &RasterDescriptor,
    ) -> GfxResult<RasterStateId> {
        self.raster
            .configure(device.api(), device.device_id(), descriptor)
    }

    /// Returns the blend state for `descriptor`, rebuilding only on change.
    pub fn configure_blend_state(
        &mut self,
        device: &Device,
        descriptor: &BlendDescriptor,
    ) -> GfxResult<BlendStateId> {
        self.blend.configure(device.api(), device.device_id(), descriptor)
    }

    /// Returns the depth-stencil state for `descriptor`, rebuilding only on change.
    pub fn configure_depth_state(
        &mut self,
        device: &Device,
        descriptor: &DepthDescriptor,
    ) -> GfxResult<DepthStateId> {
        self.depth.configure(device.api(), device.device_id(), descriptor)
    }

    /// Returns the sampler cached in `slot` of the device, rebuilding only on change.
    pub fn configure_sampler_state(
        &mut self,
        device: &mut Device,
        slot: u32,
        descriptor: &SamplerDescriptor,
    ) -> GfxResult<SamplerId> {
        device.configure_sampler(slot, descriptor)
    }

    /// Native rebuild counts as `(raster, blend, depth)`.
    pub fn rebuilds(&self) -> (u32, u32, u32) {
        (
            self.raster.rebuilds(),
            self.blend.rebuilds(),
            self.depth.rebuilds(),
        )
    }

    /// Releases every cached object.
    pub fn release(&mut self, device: &Device) {
        let api = device.api();
        self.raster.release(api);
        self.blend.release(api);
        self.depth.release(api);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::mock::{MockApi, MockCall};

    fn setup() -> (MockApi, DeviceId) {
        let api = MockApi::new();
        let factory = api.create_factory().unwrap();
        let adapter = api.open_adapter(factory, 0).unwrap();
        let device = api.create_device(adapter, FeatureLevel::L11_0, false).unwrap();
        (api, device)
    }

    #[test]
    fn identical_descriptor_never_rebuilds() {
        let (api, device) = setup();
        let mut cache = StateCache::<RasterDescriptor>::default();
        let desc = RasterDescriptor::default();

        let first = cache.configure(&api, device, &desc).unwrap();
        let second = cache.configure(&api, device, &desc).unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.rebuilds(), 1);
        assert_eq!(api.count(|c| matches!(c, MockCall::CreateRasterState(_))), 1);
    }

    #[test]
    fn changed_field_rebuilds_once_and_releases_the_old_object() {
        let (api, device) = setup();
        let mut cache = StateCache::<RasterDescriptor>::default();
        let desc = RasterDescriptor::default();
        let old = cache.configure(&api, device, &desc).unwrap();

        let culled = RasterDescriptor {
            cull_mode: CullMode::None,
            ..desc
        };
        let new = cache.configure(&api, device, &culled).unwrap();
        cache.configure(&api, device, &culled).unwrap();

        assert_ne!(old, new);
        assert_eq!(cache.rebuilds(), 2);
        assert!(!api.is_live(old));
        assert!(api.is_live(new));
    }

    #[test]
    fn failed_build_leaves_the_cache_empty() {
        let (api, device) = setup();
        let mut cache = StateCache::<BlendDescriptor>::default();
        cache
            .configure(&api, device, &BlendDescriptor::OPAQUE)
            .unwrap();

        api.fail("create_blend_state");
        assert!(cache
            .configure(&api, device, &BlendDescriptor::ALPHA_BLEND)
            .is_err());
        assert!(cache.current().is_none());
    }
}
