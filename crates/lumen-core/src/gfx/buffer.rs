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

use crate::gfx::api::*;
use crate::gfx::device::Device;
use crate::gfx::error::{GfxError, GfxResult};

/// A fixed-size GPU buffer with a CPU shadow of its contents.
///
/// The shadow always holds exactly `size` bytes and mirrors what was last
/// uploaded. Only [`BufferUsage::Dynamic`] buffers can be rewritten.
#[derive(Debug)]
pub struct Buffer {
    id: Option<BufferId>,
    buffer_type: BufferType,
    usage: BufferUsage,
    size: u64,
    shadow: Vec<u8>,
}

impl Buffer {
    /// Creates a buffer of exactly `size` bytes.
    ///
    /// ## Arguments
    /// * `device` - The owning device.
    /// * `data` - Initial contents. Shorter data is zero-padded, longer data is
    ///   truncated to `size`. `None` zero-fills the buffer.
    /// * `size` - Size in bytes.
    /// * `buffer_type` - What the buffer is bound as.
    /// * `usage` - How CPU and GPU access it.
    ///
    /// ## Errors
    /// * `NoData` - `size` is zero.
    /// * `Unknown` - staging usage on a bindable buffer, or immutable usage
    ///   without initial data.
    /// * `Error` - the native buffer could not be created.
    pub fn new(
        device: &Device,
        data: Option<&[u8]>,
        size: u64,
        buffer_type: BufferType,
        usage: BufferUsage,
    ) -> GfxResult<Self> {
        if size == 0 {
            return Err(GfxError::NoData { what: "buffer" });
        }
        match (usage, data) {
            (BufferUsage::Staging, _) => {
                return Err(GfxError::unknown(
                    "buffer type/usage combination",
                    (buffer_type, usage),
                ))
            }
            (BufferUsage::Immutable, None) => {
                return Err(GfxError::unknown(
                    "buffer usage without initial data",
                    usage,
                ))
            }
            _ => {}
        }

        let mut shadow = vec![0u8; size as usize];
        if let Some(data) = data {
            let len = data.len().min(shadow.len());
            shadow[..len].copy_from_slice(&data[..len]);
        }

        let descriptor = BufferDescriptor {
            label: None,
            size,
            buffer_type,
            usage,
            stride: 0,
        };
        let id = device
            .api()
            .create_buffer(device.device_id(), &descriptor, &shadow)
            .inspect_err(|e| {
                log::error!("Failed to create {size}-byte {buffer_type:?}/{usage:?} buffer: {e}");
            })?;
        log::debug!("Created {buffer_type:?} buffer {id:?} ({size} bytes, {usage:?})");

        Ok(Self {
            id: Some(id),
            buffer_type,
            usage,
            size,
            shadow,
        })
    }

    /// Creates a buffer from raw type and usage tags.
    ///
    /// ## Errors
    /// * `Unknown` - either tag is out of range. See [`Buffer::new`] for the rest.
    pub fn from_raw(
        device: &Device,
        data: Option<&[u8]>,
        size: u64,
        buffer_type: u32,
        usage: u32,
    ) -> GfxResult<Self> {
        let buffer_type = BufferType::try_from(buffer_type)?;
        let usage = BufferUsage::try_from(usage)?;
        Self::new(device, data, size, buffer_type, usage)
    }

    /// Writes `data` at the start of the buffer and uploads the whole shadow
    /// (map-discard, write, unmap).
    ///
    /// ## Errors
    /// * `Null` - the buffer was freed.
    /// * `Error` - the buffer is not dynamic, `data` is longer than the buffer,
    ///   or the native upload failed.
    pub fn copy(&mut self, device: &Device, data: &[u8]) -> GfxResult<()> {
        let id = self.id.ok_or(GfxError::Null { what: "buffer" })?;
        if self.usage != BufferUsage::Dynamic {
            return Err(GfxError::InvalidState {
                operation: "copy into buffer",
                state: format!("usage is {:?}", self.usage),
            });
        }
        if data.len() as u64 > self.size {
            return Err(GfxError::InvalidState {
                operation: "copy into buffer",
                state: format!("{} bytes exceed its {} bytes", data.len(), self.size),
            });
        }

        self.shadow[..data.len()].copy_from_slice(data);
        device
            .api()
            .write_buffer(device.context_id(), id, &self.shadow)
            .inspect_err(|e| log::error!("Failed to upload buffer {id:?}: {e}"))
    }

    /// Releases the native buffer and the shadow. Freeing twice is a no-op.
    pub fn free(&mut self, device: &Device) {
        if let Some(id) = self.id.take() {
            device.api().release(id.into());
            self.shadow = Vec::new();
            log::debug!("Released buffer {id:?}");
        }
    }

    /// The native buffer, or `None` once freed.
    pub fn id(&self) -> Option<BufferId> {
        self.id
    }

    /// Size in bytes. Never changes after creation.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bind type.
    pub fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    /// Access pattern.
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// The CPU shadow. Empty once freed.
    pub fn contents(&self) -> &[u8] {
        &self.shadow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::error::ErrorKind;
    use crate::gfx::mock::MockApi;
    use std::sync::Arc;

    fn device() -> (Arc<MockApi>, Device) {
        let api = Arc::new(MockApi::new());
        let device = Device::create(api.clone(), &GfxConfig::default()).unwrap();
        (api, device)
    }

    #[test]
    fn size_is_exact_for_every_valid_combination() {
        let (_api, device) = device();
        for buffer_type in [BufferType::Vertex, BufferType::Index, BufferType::Constant] {
            for usage in [BufferUsage::Default, BufferUsage::Dynamic] {
                for size in [1u64, 16, 100, 4096] {
                    let mut buffer = Buffer::new(&device, None, size, buffer_type, usage).unwrap();
                    assert_eq!(buffer.size(), size);
                    assert_eq!(buffer.contents().len() as u64, size);
                    buffer.free(&device);
                }
            }
        }
    }

    #[test]
    fn initial_data_is_padded_or_truncated() {
        let (api, device) = device();
        let mut short = Buffer::new(
            &device,
            Some(&[1, 2]),
            4,
            BufferType::Vertex,
            BufferUsage::Default,
        )
        .unwrap();
        assert_eq!(short.contents(), &[1, 2, 0, 0]);
        assert_eq!(api.buffer_contents(short.id().unwrap()).unwrap(), vec![1, 2, 0, 0]);

        let mut long = Buffer::new(
            &device,
            Some(&[1, 2, 3, 4, 5, 6]),
            4,
            BufferType::Vertex,
            BufferUsage::Immutable,
        )
        .unwrap();
        assert_eq!(long.contents(), &[1, 2, 3, 4]);

        short.free(&device);
        long.free(&device);
    }

    #[test]
    fn rejects_zero_size_and_bad_usages() {
        let (_api, device) = device();
        let err = Buffer::new(&device, None, 0, BufferType::Vertex, BufferUsage::Default)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoData);

        let err = Buffer::new(&device, None, 16, BufferType::Vertex, BufferUsage::Staging)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);

        let err = Buffer::new(&device, None, 16, BufferType::Index, BufferUsage::Immutable)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);

        let err = Buffer::from_raw(&device, None, 16, 9, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        let err = Buffer::from_raw(&device, None, 16, 0, 9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn copy_mirrors_bytes_into_shadow_and_native_buffer() {
        let (api, device) = device();
        let mut buffer =
            Buffer::new(&device, None, 8, BufferType::Vertex, BufferUsage::Dynamic).unwrap();

        let data = [10u8, 20, 30, 40, 50, 60, 70, 80];
        buffer.copy(&device, &data).unwrap();
        assert_eq!(buffer.contents(), &data);
        assert_eq!(api.buffer_contents(buffer.id().unwrap()).unwrap(), data.to_vec());

        let err = buffer.copy(&device, &[0; 9]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Error);
        buffer.free(&device);
    }

    #[test]
    fn copy_requires_dynamic_usage() {
        let (_api, device) = device();
        let mut buffer =
            Buffer::new(&device, None, 8, BufferType::Index, BufferUsage::Default).unwrap();
        assert_eq!(
            buffer.copy(&device, &[1; 8]).unwrap_err().kind(),
            ErrorKind::Error
        );
        buffer.free(&device);
    }

    #[test]
    fn free_is_idempotent() {
        let (api, device) = device();
        let before = api.live_objects();
        let mut buffer =
            Buffer::new(&device, None, 64, BufferType::Constant, BufferUsage::Dynamic).unwrap();
        buffer.free(&device);
        buffer.free(&device);
        assert!(buffer.id().is_none());
        assert!(buffer.contents().is_empty());
        assert_eq!(buffer.size(), 64);
        assert_eq!(api.live_objects(), before);
        assert_eq!(
            buffer.copy(&device, &[0; 4]).unwrap_err().kind(),
            ErrorKind::Null
        );
    }
}
