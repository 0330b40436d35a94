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

use lumen_core::gfx::mock::{HeadlessWindow, MockAdapter, MockApi, MockCall};
use lumen_core::gfx::*;
use std::sync::Arc;

const SOURCE: &str = "
struct Constants { world: mat4x4<f32>, view_proj: mat4x4<f32> };
fn vs_main() {}
fn ps_main() {}
";

fn setup() -> (Arc<MockApi>, Device) {
    let api = Arc::new(MockApi::with_adapters(vec![
        MockAdapter::named("Integrated"),
        MockAdapter::named("Discrete"),
    ]));
    let mut config = GfxConfig::default().with_window(Arc::new(HeadlessWindow::default()));
    config.adapter = 1;
    config.width = 640;
    config.height = 480;
    config.pixel_format = PixelFormat::Rgba8Unorm;
    let device = Device::initialize(api.clone(), &config).expect("device should initialize");
    (api, device)
}

fn shader_pair(device: &Device) -> (Shader, Shader) {
    let mut vs = Shader::new(ShaderKind::Vertex);
    vs.compile_from_source(device, "color.vs", SOURCE, "vs_main", "vs_5_0")
        .unwrap();
    vs.build_program(device, Some(VertexFormat::PositionColor))
        .unwrap();
    vs.add_var(ShaderVar::new("world", VarType::Mat4));
    vs.add_var(ShaderVar::new("view_proj", VarType::Mat4));

    let mut ps = Shader::new(ShaderKind::Pixel);
    ps.compile_from_source(device, "color.ps", SOURCE, "ps_main", "ps_5_0")
        .unwrap();
    ps.build_program(device, None).unwrap();
    (vs, ps)
}

fn quad() -> Mesh {
    Mesh {
        positions: vec![
            [-0.5, -0.5, 0.0],
            [0.5, -0.5, 0.0],
            [0.5, 0.5, 0.0],
            [-0.5, 0.5, 0.0],
        ],
        colors: vec![[1.0, 0.5, 0.25, 1.0]; 4],
        triangles: vec![[0, 1, 2], [0, 2, 3]],
        ..Mesh::default()
    }
}

fn matrix(seed: f32) -> Mat4 {
    let mut m = [0.0; 16];
    for (i, v) in m.iter_mut().enumerate() {
        *v = seed + i as f32;
    }
    m
}

#[test]
fn test_indexed_quad_draws_with_packed_constants() {
    // --- 1. ARRANGE ---
    let (api, mut device) = setup();
    assert_eq!(device.adapter().name, "Discrete");
    let (mut vs, mut ps) = shader_pair(&device);
    let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
    let mesh = quad();
    let world = matrix(1.0);
    let view_proj = matrix(100.0);

    // --- 2. ACT ---
    renderer
        .begin_frame(&mut device, [0.0, 0.0, 0.0, 1.0])
        .unwrap();
    let unit = DrawUnit::new(&mesh, &mut vs, &mut ps)
        .vertex_var("world", ShaderValue::of(&world))
        .vertex_var("view_proj", ShaderValue::of(&view_proj));
    let stats = renderer.submit(&mut device, unit).unwrap();
    device.present(false).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.vertices, 4);
    assert_eq!(stats.indices, 6);
    assert!(api.calls().contains(&MockCall::DrawIndexed {
        index_count: 6,
        start_index: 0,
        base_vertex: 0,
    }));
    assert!(api
        .calls()
        .contains(&MockCall::Present { sync_interval: 0 }));

    // Two matrices, each in its own 64-byte slot.
    let constants = vs.constant_buffer().expect("vertex constants uploaded");
    assert_eq!(constants.size(), 128);
    let uploaded = api.buffer_contents(constants.id().unwrap()).unwrap();
    assert_eq!(&uploaded[0..64], bytemuck::bytes_of(&world));
    assert_eq!(&uploaded[64..128], bytemuck::bytes_of(&view_proj));
    assert!(ps.constant_buffer().is_none(), "pixel shader has no constants");

    assert_eq!(renderer.stats().totals.draw_calls, 1);
    renderer.release(&device);
}

#[test]
fn test_textured_draw_binds_the_texture_view() {
    // --- 1. ARRANGE ---
    let (api, mut device) = setup();
    let (mut vs, mut ps) = shader_pair(&device);
    ps.add_var(ShaderVar::new("albedo", VarType::Texture));
    let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
    let texels = vec![255u8; 4 * 4 * 4];
    let mut texture = Texture::create(
        &device,
        Some(&texels),
        &TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 4, 4).with_label("albedo"),
    )
    .unwrap();
    let srv = texture.shader_resource_view().unwrap();
    let mesh = quad();
    let world = matrix(0.0);

    // --- 2. ACT ---
    let unit = DrawUnit::new(&mesh, &mut vs, &mut ps)
        .vertex_var("world", ShaderValue::of(&world))
        .pixel_var("albedo", ShaderValue::texture(&texture).unwrap());
    renderer.submit(&mut device, unit).unwrap();

    // --- 3. ASSERT ---
    let sampler = api
        .position(|c| matches!(c, MockCall::BindSamplers { stage: ShaderKind::Pixel, .. }))
        .expect("sampler bound");
    let views = api
        .position(|c| {
            matches!(c, MockCall::BindShaderResources { stage: ShaderKind::Pixel, views, .. }
                if views == &vec![srv])
        })
        .expect("texture bound");
    let draw = api.position(MockCall::is_draw).unwrap();
    assert!(sampler < views && views < draw);

    texture.destroy(&device);
    renderer.release(&device);
}

#[test]
fn test_state_objects_rebuild_only_on_change() {
    // --- 1. ARRANGE ---
    let (api, mut device) = setup();
    let (mut vs, mut ps) = shader_pair(&device);
    let mut renderer = Renderer::new(&device, 1024, 256).unwrap();
    let mesh = quad();

    // --- 2. ACT ---
    for _ in 0..2 {
        renderer
            .submit(
                &mut device,
                DrawUnit::new(&mesh, &mut vs, &mut ps),
            )
            .unwrap();
    }
    let (raster_after_repeat, blend_after_repeat, _) = renderer.states().rebuilds();

    let mut unit = DrawUnit::new(&mesh, &mut vs, &mut ps);
    unit.raster.cull_mode = CullMode::None;
    renderer.submit(&mut device, unit).unwrap();
    let (raster_after_change, blend_after_change, _) = renderer.states().rebuilds();

    // --- 3. ASSERT ---
    assert_eq!(raster_after_repeat, 1, "identical raster state is reused");
    assert_eq!(blend_after_repeat, 1);
    assert_eq!(raster_after_change, 2, "changing cull mode rebuilds once");
    assert_eq!(blend_after_change, 1);
    assert_eq!(
        api.count(|c| matches!(c, MockCall::CreateRasterState(_))),
        2
    );

    renderer.release(&device);
}

#[test]
fn test_shader_free_respects_the_reference_count() {
    let (api, mut device) = setup();
    let (mut vs, _ps) = shader_pair(&device);
    let program = vs.program().unwrap();
    vs.bind(&mut device).unwrap();

    vs.acquire();
    assert_eq!(vs.ref_count(), 1);
    assert!(!vs.free(&mut device), "a held shader must not be freed");
    assert!(api.is_live(program));

    vs.release();
    assert!(vs.free(&mut device));
    assert!(!api.is_live(program));
    assert_eq!(vs.state(), ShaderState::Uninitialized);
    assert_eq!(device.bound_vertex_shader(), None);
}

#[test]
fn test_destroying_resources_twice_is_harmless() {
    let (api, device) = setup();
    let baseline = api.live_objects();

    let mut buffer = Buffer::new(
        &device,
        Some(&[1, 2, 3, 4]),
        16,
        BufferType::Vertex,
        BufferUsage::Immutable,
    )
    .unwrap();
    let mut texture = Texture::create(
        &device,
        None,
        &TextureDescriptor::new_2d(PixelFormat::Rgba8Unorm, 8, 8)
            .with_flags(TextureFlags::RENDER_TARGET),
    )
    .unwrap();
    let mut renderer = Renderer::new(&device, 64, 16).unwrap();
    assert!(api.live_objects() > baseline);

    for _ in 0..2 {
        buffer.free(&device);
        texture.destroy(&device);
        renderer.release(&device);
    }

    assert_eq!(api.live_objects(), baseline);
    assert!(texture.render_target_view().is_none());
    assert!(buffer.id().is_none());
}

#[test]
fn test_dropping_the_device_releases_every_native_object() {
    let (api, device) = setup();
    assert!(api.live_objects() > 0);
    drop(device);
    assert_eq!(api.live_objects(), 0);
}
