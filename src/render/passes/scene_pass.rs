//! Scene (Material) Pass
//!
//! Forward pass that turns the accumulated lighting into shaded color:
//! depth reconstruction first, then the four opaque material buckets, the
//! sky, particles, transparents and debug primitives, all into one HDR
//! target with a real depth buffer.
//!
//! Transparents draw in scene insertion order, not back-to-front. That is
//! a known limitation carried deliberately; the sequencer warns once per
//! run instead of sorting, because hosts that care order their inserts.

use glam::Mat4;

use crate::errors::Result;
use crate::gfx::{
    DepthFormat, DrawCall, MeshData, MeshVertex, SurfaceFormat, SurfaceSize, Technique,
    TechniqueParams,
};
use crate::render::frame::{FrameContext, LayerMask};
use crate::render::lists::RenderLists;
use crate::render::material::MaterialBucket;
use crate::render::passes::gbuffer::GBufferOutput;
use crate::render::pool::TargetId;
use crate::render::target::TargetKey;
use crate::scene::{Camera, Scene};

pub fn render_scene(
    ctx: &mut FrameContext,
    scene: &Scene,
    lists: &RenderLists,
    camera: &Camera,
    gbuffer: &GBufferOutput,
    light_accumulation: TargetId,
    size: SurfaceSize,
    particle_scratch: &mut Vec<DrawCall>,
) -> Result<TargetId> {
    let target = ctx.pool.fetch(
        ctx.backend,
        TargetKey::new(size, SurfaceFormat::Rgba16Float).with_depth(DepthFormat::Depth24Stencil8),
        "Scene Color",
    )?;

    let gbuffer_depth = ctx.resource(gbuffer.depth)?;
    let light_accum = ctx.resource(light_accumulation)?;

    ctx.enable_target(target, Some(camera.clear_color), true, "Scene Pass")?;

    // Rebuild hardware depth from the G-Buffer so forward geometry depth
    // tests correctly against deferred geometry.
    let mut reconstruct = TechniqueParams {
        view: camera.view(),
        projection: camera.projection(),
        color: glam::Vec3::new(camera.clear_color.r, camera.clear_color.g, camera.clear_color.b),
        intensity: camera.clear_color.a,
        ..TechniqueParams::default()
    };
    reconstruct.inputs.push(gbuffer_depth);
    ctx.draw(Technique::DepthReconstruct, &reconstruct, &[])?;

    let mut params = TechniqueParams {
        view: camera.view(),
        projection: camera.projection(),
        camera_position: camera.position,
        ..TechniqueParams::default()
    };
    params.inputs.push(light_accum);

    for bucket in MaterialBucket::ALL {
        let calls = &lists.opaque[bucket.index()];
        if calls.is_empty() {
            continue;
        }
        ctx.stats.material_buckets[bucket.index()] += calls.len() as u32;
        ctx.draw(bucket.technique(), &params, calls)?;
    }

    // Sky after the opaques: almost everything fails the depth test, so
    // the expensive pixels never shade.
    if let Some(sky) = &scene.sky
        && camera.layers.contains(LayerMask::SKY)
    {
        let sky_call = DrawCall {
            color: sky.color(),
            ..DrawCall::new(sky.mesh(), 0, Mat4::from_translation(camera.position))
        };
        ctx.draw(sky.technique(), &params, std::slice::from_ref(&sky_call))?;
    }

    if camera.layers.contains(LayerMask::PARTICLES) {
        particle_scratch.clear();
        let right = camera.view().transpose().x_axis.truncate();
        let up = camera.view().transpose().y_axis.truncate();
        for emitter in scene.emitters.values() {
            if emitter.enabled && !(emitter.layers & camera.layers).is_empty() {
                emitter.emit_draws(right, up, particle_scratch);
            }
        }
        if !particle_scratch.is_empty() {
            ctx.draw(Technique::Particles, &params, particle_scratch)?;
        }
    }

    if !lists.transparent.is_empty() {
        ctx.draw(Technique::ForwardTransparent, &params, &lists.transparent)?;
    }
    if !lists.transparent_skinned.is_empty() {
        ctx.draw(
            Technique::ForwardTransparentSkinned,
            &params,
            &lists.transparent_skinned,
        )?;
    }

    let debug_mesh = if camera.layers.contains(LayerMask::DEBUG) && !scene.debug_lines().is_empty()
    {
        Some(draw_debug_lines(ctx, scene, &params)?)
    } else {
        None
    };

    ctx.disable_target()?;
    // Freed only after the pass is encoded; the draw references it until
    // then.
    if let Some(mesh) = debug_mesh {
        ctx.backend.destroy_mesh(mesh);
    }
    Ok(target)
}

/// Debug lines are immediate-mode: a transient line-list mesh is built,
/// drawn, and freed by the caller once the pass is encoded.
fn draw_debug_lines(
    ctx: &mut FrameContext,
    scene: &Scene,
    params: &TechniqueParams,
) -> Result<crate::gfx::MeshId> {
    let lines = scene.debug_lines();
    let mut data = MeshData::default();
    for line in lines {
        let base = data.vertices.len() as u32;
        for point in [line.from, line.to] {
            data.vertices.push(MeshVertex {
                position: point.to_array(),
                normal: [0.0, 1.0, 0.0],
                uv: [0.0, 0.0],
            });
        }
        data.indices.push(base);
        data.indices.push(base + 1);
    }
    data.parts.push(crate::gfx::MeshPart {
        index_start: 0,
        index_count: data.indices.len() as u32,
    });

    let mesh = ctx.backend.upload_mesh(&data)?;
    // One draw per color batch would be tidier; one call with the first
    // line's color is enough for a debug layer.
    let call = DrawCall {
        color: lines[0].color,
        ..DrawCall::new(mesh, 0, Mat4::IDENTITY)
    };
    ctx.draw(Technique::DebugLines, params, std::slice::from_ref(&call))?;
    Ok(mesh)
}
