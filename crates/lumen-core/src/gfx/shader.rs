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

//! Shader programs, their input layouts and their constant buffers.

use crate::gfx::api::*;
use crate::gfx::buffer::Buffer;
use crate::gfx::device::Device;
use crate::gfx::error::{GfxError, GfxResult};
use crate::gfx::shader_var::{ShaderValue, ShaderVar, ShaderVars};
use std::borrow::Cow;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

/// Constant-buffer slot every shader binds its variables to.
pub const CONSTANT_SLOT: u32 = 0;

/// Lifecycle of a [`Shader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderState {
    /// Nothing compiled yet.
    Uninitialized,
    /// A blob exists but no program was built from it.
    Compiled,
    /// The program (and for vertex shaders the input layout) is built.
    Ready,
}

/// A vertex or pixel shader.
///
/// `Uninitialized -> compile -> Compiled -> build_program -> Ready`. A shader
/// without both a blob and a program is broken: binding it logs a warning and
/// does nothing.
///
/// Sharing is tracked with an atomic reference count. [`Shader::free`] only
/// releases native objects once every [`Shader::acquire`] has been matched by a
/// [`Shader::release`].
#[derive(Debug)]
pub struct Shader {
    kind: ShaderKind,
    label: String,
    state: ShaderState,
    target: Option<ShaderTarget>,
    blob: Option<ShaderBlobId>,
    program: Option<ProgramId>,
    input_layout: Option<InputLayoutId>,
    vertex_format: Option<VertexFormat>,
    vars: ShaderVars,
    constants: Option<Buffer>,
    refs: AtomicI32,
}

impl Shader {
    /// Creates an uninitialized shader for `kind`.
    pub fn new(kind: ShaderKind) -> Self {
        Self {
            kind,
            label: String::new(),
            state: ShaderState::Uninitialized,
            target: None,
            blob: None,
            program: None,
            input_layout: None,
            vertex_format: None,
            vars: ShaderVars::new(),
            constants: None,
            refs: AtomicI32::new(0),
        }
    }

    /// Reads and compiles the shader source at `path`.
    ///
    /// ## Errors
    /// * `NotFound` - the file cannot be read.
    /// * See [`Shader::compile_from_source`] for the rest.
    pub fn compile_from_file(
        &mut self,
        device: &Device,
        path: impl AsRef<Path>,
        entry_point: &str,
        target: &str,
    ) -> GfxResult<()> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Failed to read shader '{}': {e}", path.display());
            GfxError::not_found("shader source", path.display().to_string())
        })?;
        self.compile_from_source(
            device,
            &path.display().to_string(),
            &source,
            entry_point,
            target,
        )
    }

    /// Compiles in-memory `source`.
    ///
    /// Recompiling discards the previous blob and program; the shader must then
    /// be built again.
    ///
    /// ## Arguments
    /// * `label` - Name used in diagnostics, usually the source path.
    /// * `source` - The source text.
    /// * `entry_point` - Name of the entry-point function.
    /// * `target` - A profile such as `vs_5_0`.
    ///
    /// ## Errors
    /// * `Unknown` - unrecognized profile, or its stage disagrees with the shader.
    /// * `NotImplemented` - geometry and compute profiles.
    /// * `Error` - the native compiler rejected the source.
    pub fn compile_from_source(
        &mut self,
        device: &Device,
        label: &str,
        source: &str,
        entry_point: &str,
        target: &str,
    ) -> GfxResult<()> {
        let target = ShaderTarget::parse(target)
            .inspect_err(|e| log::error!("Cannot compile '{label}': {e}"))?;
        if target.kind != self.kind {
            return Err(GfxError::unknown(
                "shader target for stage",
                (target.to_string(), self.kind),
            ));
        }

        self.release_native(device);
        let descriptor = ShaderSourceDescriptor {
            label: Cow::Borrowed(label),
            entry_point: Cow::Borrowed(entry_point),
            target,
        };
        let blob = device
            .api()
            .compile_shader(source, &descriptor)
            .inspect_err(|e| log::error!("Failed to compile '{label}' ({target}): {e}"))?;

        log::debug!("Compiled '{label}' ({target}) into {blob:?}");
        self.label = label.to_string();
        self.target = Some(target);
        self.blob = Some(blob);
        self.state = ShaderState::Compiled;
        Ok(())
    }

    /// Builds the program. Vertex shaders also derive their input layout from
    /// `vertex_format`.
    ///
    /// ## Errors
    /// * `Error` - nothing is compiled, or a native call failed.
    /// * `Null` - a vertex shader was built without a vertex format.
    pub fn build_program(
        &mut self,
        device: &Device,
        vertex_format: Option<VertexFormat>,
    ) -> GfxResult<()> {
        let blob = self.blob.ok_or_else(|| GfxError::InvalidState {
            operation: "build shader program",
            state: format!("{:?}", self.state),
        })?;
        let format = match (self.kind, vertex_format) {
            (ShaderKind::Vertex, None) => return Err(GfxError::Null { what: "vertex format" }),
            (ShaderKind::Vertex, Some(format)) => Some(format),
            _ => None,
        };

        let api = device.api();
        if let Some(layout) = self.input_layout.take() {
            api.release(layout.into());
        }
        if let Some(program) = self.program.take() {
            api.release(program.into());
        }
        self.state = ShaderState::Compiled;

        let program = api
            .create_program(device.device_id(), blob)
            .inspect_err(|e| log::error!("Failed to build program for '{}': {e}", self.label))?;

        if let Some(format) = format {
            match api.create_input_layout(device.device_id(), blob, &format.input_layout()) {
                Ok(layout) => self.input_layout = Some(layout),
                Err(e) => {
                    log::error!("Failed to build {format:?} input layout for '{}': {e}", self.label);
                    api.release(program.into());
                    return Err(e);
                }
            }
        }

        self.program = Some(program);
        self.vertex_format = format;
        self.state = ShaderState::Ready;
        Ok(())
    }

    /// Returns `true` if the shader cannot be bound.
    pub fn is_broken(&self) -> bool {
        self.blob.is_none() || self.program.is_none()
    }

    /// Binds the program to its stage.
    ///
    /// A broken shader logs a warning and binds nothing.
    ///
    /// ## Errors
    /// * `Error` - the swapchain is resizing or missing.
    pub fn bind(&self, device: &mut Device) -> GfxResult<()> {
        device.ensure_bindable("bind shader")?;
        let Some(program) = self.program.filter(|_| self.blob.is_some()) else {
            log::warn!("Skipping bind of broken {:?} shader '{}'", self.kind, self.label);
            return Ok(());
        };
        let context = device.context_id();
        match self.kind {
            ShaderKind::Vertex => {
                device.api().bind_vertex_shader(context, Some(program));
                device.bound_vertex_shader = Some(program);
            }
            ShaderKind::Pixel => {
                device.api().bind_pixel_shader(context, Some(program));
                device.bound_pixel_shader = Some(program);
            }
            kind => {
                return Err(GfxError::NotImplemented {
                    what: format!("binding {kind:?} shaders"),
                })
            }
        }
        Ok(())
    }

    /// Binds the input layout of a vertex shader. A no-op for other stages or
    /// broken shaders.
    pub fn bind_input_layout(&self, device: &Device) -> GfxResult<()> {
        device.ensure_bindable("bind input layout")?;
        if self.kind == ShaderKind::Vertex && !self.is_broken() {
            device
                .api()
                .bind_input_layout(device.context_id(), self.input_layout);
        }
        Ok(())
    }

    /// Appends a variable.
    pub fn add_var(&mut self, var: ShaderVar) {
        self.vars.add(var);
    }

    /// Sets the first variable named `name`. See [`ShaderVars::set_by_name`].
    pub fn set_var_by_name(&mut self, name: &str, value: ShaderValue<'_>) -> GfxResult<()> {
        self.vars.set_by_name(name, value).inspect_err(|e| {
            log::error!("Cannot set '{name}' on shader '{}': {e}", self.label);
        })
    }

    /// Size of the constant buffer this shader needs.
    pub fn vars_size(&self) -> usize {
        self.vars.size()
    }

    /// Packs the variables into `out`. See [`ShaderVars::fill`].
    pub fn cbuffer_fill(&self, out: &mut Vec<u8>) -> usize {
        self.vars.fill(out)
    }

    /// The declared variables.
    pub fn vars(&self) -> &ShaderVars {
        &self.vars
    }

    /// Packs the variables through `scratch`, uploads them and binds the
    /// constant buffer. Nothing is uploaded or bound when there are no bytes.
    ///
    /// Returns the number of bytes uploaded.
    pub fn upload_constants(&mut self, device: &Device, scratch: &mut Vec<u8>) -> GfxResult<usize> {
        let size = self.cbuffer_fill(scratch);
        if size == 0 {
            return Ok(0);
        }

        let stale = self
            .constants
            .as_ref()
            .is_some_and(|buffer| buffer.size() != size as u64);
        if stale {
            if let Some(mut buffer) = self.constants.take() {
                buffer.free(device);
            }
        }
        if self.constants.is_none() {
            self.constants = Some(Buffer::new(
                device,
                None,
                size as u64,
                BufferType::Constant,
                BufferUsage::Dynamic,
            )?);
        }

        if let Some(constants) = self.constants.as_mut() {
            constants.copy(device, &scratch[..size])?;
            device.api().bind_constant_buffer(
                device.context_id(),
                self.kind,
                CONSTANT_SLOT,
                constants.id(),
            );
        }
        Ok(size)
    }

    /// The constant buffer, once constants have been uploaded.
    pub fn constant_buffer(&self) -> Option<&Buffer> {
        self.constants.as_ref()
    }

    /// Stage of the shader.
    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ShaderState {
        self.state
    }

    /// The profile the shader was compiled for.
    pub fn target(&self) -> Option<ShaderTarget> {
        self.target
    }

    /// The vertex format the input layout was built from.
    pub fn vertex_format(&self) -> Option<VertexFormat> {
        self.vertex_format
    }

    /// The native program.
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Takes a reference. The first acquire, or one after every reference was
    /// dropped, sets the count to 1.
    pub fn acquire(&self) {
        let _ = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| {
                Some(if refs <= 0 { 1 } else { refs + 1 })
            });
    }

    /// Drops a reference.
    pub fn release(&self) {
        self.refs.fetch_sub(1, Ordering::AcqRel);
    }

    /// Current reference count.
    pub fn ref_count(&self) -> i32 {
        self.refs.load(Ordering::Acquire)
    }

    /// Destroys the native objects if no reference is outstanding.
    ///
    /// Returns `true` if the shader was freed.
    pub fn free(&mut self, device: &mut Device) -> bool {
        if self.ref_count() > 0 {
            return false;
        }
        if self.program.is_some() {
            let context = device.context_id();
            match self.kind {
                ShaderKind::Vertex if device.bound_vertex_shader == self.program => {
                    device.api().bind_vertex_shader(context, None);
                    device.bound_vertex_shader = None;
                }
                ShaderKind::Pixel if device.bound_pixel_shader == self.program => {
                    device.api().bind_pixel_shader(context, None);
                    device.bound_pixel_shader = None;
                }
                _ => {}
            }
        }
        self.release_native(device);
        true
    }

    fn release_native(&mut self, device: &Device) {
        let api = device.api();
        if let Some(mut buffer) = self.constants.take() {
            buffer.free(device);
        }
        if let Some(layout) = self.input_layout.take() {
            api.release(layout.into());
        }
        if let Some(program) = self.program.take() {
            api.release(program.into());
        }
        if let Some(blob) = self.blob.take() {
            api.release(blob.into());
            log::debug!("Released shader '{}'", self.label);
        }
        self.vertex_format = None;
        self.state = ShaderState::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::error::ErrorKind;
    use crate::gfx::mock::{HeadlessWindow, MockApi, MockCall};
    use crate::gfx::shader_var::VarType;
    use std::sync::Arc;

    const SOURCE: &str = "fn vs_main() {} fn ps_main() {}";

    fn device() -> (Arc<MockApi>, Device) {
        let api = Arc::new(MockApi::new());
        let config = GfxConfig::default().with_window(Arc::new(HeadlessWindow::default()));
        let device = Device::initialize(api.clone(), &config).unwrap();
        (api, device)
    }

    fn vertex_shader(device: &Device) -> Shader {
        let mut shader = Shader::new(ShaderKind::Vertex);
        shader
            .compile_from_source(device, "test.vs", SOURCE, "vs_main", "vs_5_0")
            .unwrap();
        shader
            .build_program(device, Some(VertexFormat::PositionColor))
            .unwrap();
        shader
    }

    #[test]
    fn walks_the_state_machine() {
        let (api, device) = device();
        let mut shader = Shader::new(ShaderKind::Vertex);
        assert_eq!(shader.state(), ShaderState::Uninitialized);

        shader
            .compile_from_source(&device, "test.vs", SOURCE, "vs_main", "vs_5_0")
            .unwrap();
        assert_eq!(shader.state(), ShaderState::Compiled);
        assert!(shader.is_broken());

        shader
            .build_program(&device, Some(VertexFormat::PositionColorInstanced))
            .unwrap();
        assert_eq!(shader.state(), ShaderState::Ready);
        assert!(api.calls().contains(&MockCall::CreateInputLayout {
            layout: shader.input_layout.unwrap(),
            elements: 6,
        }));
    }

    #[test]
    fn compile_errors_map_to_kinds() {
        let (_api, device) = device();
        let mut shader = Shader::new(ShaderKind::Pixel);

        let missing = shader.compile_from_file(&device, "does/not/exist.wgsl", "ps_main", "ps_5_0");
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::NotFound);

        let wrong_stage = shader.compile_from_source(&device, "p", SOURCE, "ps_main", "vs_5_0");
        assert_eq!(wrong_stage.unwrap_err().kind(), ErrorKind::Unknown);

        let geometry = shader.compile_from_source(&device, "p", SOURCE, "ps_main", "gs_5_0");
        assert_eq!(geometry.unwrap_err().kind(), ErrorKind::NotImplemented);

        let rejected = shader.compile_from_source(&device, "p", SOURCE, "nope", "ps_5_0");
        assert_eq!(rejected.unwrap_err().kind(), ErrorKind::Error);
        assert!(shader.is_broken());
    }

    #[test]
    fn building_needs_a_blob_and_a_vertex_format() {
        let (_api, device) = device();
        let mut shader = Shader::new(ShaderKind::Vertex);
        assert_eq!(
            shader.build_program(&device, None).unwrap_err().kind(),
            ErrorKind::Error
        );
        shader
            .compile_from_source(&device, "v", SOURCE, "vs_main", "vs_5_0")
            .unwrap();
        assert_eq!(
            shader.build_program(&device, None).unwrap_err().kind(),
            ErrorKind::Null
        );
    }

    #[test]
    fn broken_shader_bind_is_a_no_op() {
        let (api, mut device) = device();
        let shader = Shader::new(ShaderKind::Pixel);
        api.clear_calls();
        shader.bind(&mut device).unwrap();
        assert!(api.calls().is_empty());
        assert!(device.bound_pixel_shader().is_none());
    }

    #[test]
    fn bind_tracks_the_bound_program() {
        let (api, mut device) = device();
        let mut shader = vertex_shader(&device);
        shader.bind(&mut device).unwrap();
        assert_eq!(device.bound_vertex_shader(), shader.program());
        let program = shader.program().unwrap();

        assert!(shader.free(&mut device));
        assert!(device.bound_vertex_shader().is_none());
        let unbound = api
            .position(|c| *c == MockCall::BindVertexShader(None))
            .expect("native stage unbound");
        let released = api
            .position(move |c| *c == MockCall::Release(program.into()))
            .expect("program released");
        assert!(unbound < released);
    }

    #[test]
    fn freeing_an_unbound_shader_leaves_the_stage_alone() {
        let (api, mut device) = device();
        let mut bound = vertex_shader(&device);
        let mut other = vertex_shader(&device);
        bound.bind(&mut device).unwrap();
        api.clear_calls();

        assert!(other.free(&mut device));
        assert!(!api.calls().contains(&MockCall::BindVertexShader(None)));
        assert_eq!(device.bound_vertex_shader(), bound.program());
    }

    #[test]
    fn refcount_controls_free() {
        let (api, mut device) = device();

        let mut fresh = vertex_shader(&device);
        fresh.acquire();
        assert_eq!(fresh.ref_count(), 1);
        fresh.release();
        assert!(fresh.free(&mut device));

        let mut shared = vertex_shader(&device);
        let program = shared.program().unwrap();
        shared.acquire();
        shared.acquire();
        shared.release();
        assert!(!shared.free(&mut device));
        assert!(api.is_live(program));

        shared.release();
        assert!(shared.free(&mut device));
        assert!(!api.is_live(program));
        assert_eq!(shared.state(), ShaderState::Uninitialized);
    }

    #[test]
    fn acquire_after_release_restarts_at_one() {
        let (api, mut device) = device();
        let mut shader = vertex_shader(&device);
        let program = shader.program().unwrap();

        shader.release();
        assert_eq!(shader.ref_count(), -1);
        shader.acquire();

        assert_eq!(shader.ref_count(), 1);
        assert!(!shader.free(&mut device));
        assert!(api.is_live(program));

        shader.release();
        assert!(shader.free(&mut device));
        assert!(!api.is_live(program));
    }

    #[test]
    fn constants_upload_only_when_non_empty() {
        let (api, device) = device();
        let mut shader = vertex_shader(&device);
        let mut scratch = Vec::new();

        assert_eq!(shader.upload_constants(&device, &mut scratch).unwrap(), 0);
        assert!(shader.constant_buffer().is_none());

        shader.add_var(ShaderVar::new("world", VarType::Mat4));
        shader
            .set_var_by_name("world", ShaderValue::of(&[1.0f32; 16]))
            .unwrap();
        assert_eq!(shader.upload_constants(&device, &mut scratch).unwrap(), 64);

        let buffer = shader.constant_buffer().unwrap();
        assert_eq!(buffer.contents(), bytemuck::bytes_of(&[1.0f32; 16]));
        assert!(api.calls().contains(&MockCall::BindConstantBuffer {
            stage: ShaderKind::Vertex,
            slot: CONSTANT_SLOT,
            buffer: buffer.id(),
        }));
    }
}
