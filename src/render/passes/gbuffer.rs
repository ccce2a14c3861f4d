//! G-Buffer Pass
//!
//! Writes the MRT pair the whole deferred pipeline hangs off: view-space
//! linear depth in R32Float and encoded world normals in Rgba16Float,
//! sharing one depth-stencil buffer. A second fullscreen pass downsamples
//! the pair to half resolution for the occlusion estimate.
//!
//! Depth clears to zero, not to the far plane: zero is the "never
//! touched" sentinel the depth reconstruction shader maps back to the
//! far plane.

use crate::errors::Result;
use crate::gfx::{Color, DepthFormat, SurfaceFormat, SurfaceSize, TechniqueParams};
use crate::render::frame::FrameContext;
use crate::render::lists::RenderLists;
use crate::render::material::GBufferBucket;
use crate::render::pool::{BindingId, TargetId};
use crate::render::target::TargetKey;
use crate::scene::Camera;

/// Targets produced by the pass. All of them are pool fetches that the
/// sequencer releases at the end of the camera render.
pub struct GBufferOutput {
    pub binding: BindingId,
    pub depth: TargetId,
    pub normals: TargetId,
    pub half_binding: BindingId,
    pub half_depth: TargetId,
    pub half_normals: TargetId,
}

pub fn render_gbuffer(
    ctx: &mut FrameContext,
    lists: &RenderLists,
    camera: &Camera,
    size: SurfaceSize,
) -> Result<GBufferOutput> {
    let first_key = TargetKey::new(size, SurfaceFormat::R32Float)
        .with_depth(DepthFormat::Depth24Stencil8);
    let binding = ctx.pool.fetch_binding(
        ctx.backend,
        first_key,
        &[SurfaceFormat::Rgba16Float],
        "G-Buffer",
    )?;
    let members = ctx
        .pool
        .binding_targets(binding)
        .expect("binding fetched above");
    let (depth, normals) = (members[0], members[1]);

    ctx.enable_binding(binding, Some(Color::TRANSPARENT), "G-Buffer")?;
    let params = TechniqueParams {
        view: camera.view(),
        projection: camera.projection(),
        camera_position: camera.position,
        ..TechniqueParams::default()
    };
    for bucket in GBufferBucket::ALL {
        let calls = &lists.gbuffer[bucket.index()];
        if calls.is_empty() {
            continue;
        }
        ctx.stats.gbuffer_buckets[bucket.index()] += calls.len() as u32;
        ctx.draw(bucket.technique(), &params, calls)?;
    }
    ctx.disable_target()?;

    // Half-resolution pair for the occlusion estimate. No depth buffer:
    // the downsample is a fullscreen resample.
    let half_key = TargetKey::new(size.half(), SurfaceFormat::R32Float);
    let half_binding = ctx.pool.fetch_binding(
        ctx.backend,
        half_key,
        &[SurfaceFormat::Rgba16Float],
        "G-Buffer Half",
    )?;
    let half_members = ctx
        .pool
        .binding_targets(half_binding)
        .expect("binding fetched above");
    let (half_depth, half_normals) = (half_members[0], half_members[1]);

    let mut downsample_params = TechniqueParams::default();
    downsample_params.inputs.push(ctx.resource(depth)?);
    downsample_params.inputs.push(ctx.resource(normals)?);

    ctx.enable_binding(half_binding, Some(Color::TRANSPARENT), "G-Buffer Downsample")?;
    ctx.draw(crate::gfx::Technique::DownsampleGBuffer, &downsample_params, &[])?;
    ctx.disable_target()?;

    Ok(GBufferOutput {
        binding,
        depth,
        normals,
        half_binding,
        half_depth,
        half_normals,
    })
}
