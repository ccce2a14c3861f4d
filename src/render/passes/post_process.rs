//! Post-Processing
//!
//! Resolves the HDR scene color into the camera's destination: exposure
//! tone mapping with a bloom boost, reading the scene color alongside the
//! G-Buffer depth. Overlay quads queued on the scene are drawn afterwards
//! in gamma space, as a second pass that loads (never clears) the composed
//! image; with nothing queued that pass is skipped entirely. With
//! post-processing disabled the scene color is blitted across untouched.

use glam::Vec3;

use crate::errors::Result;
use crate::gfx::{BlitDestination, Color, Technique, TechniqueParams};
use crate::render::frame::FrameContext;
use crate::render::passes::gbuffer::GBufferOutput;
use crate::render::pool::TargetId;
use crate::scene::{Camera, OverlayQuad};

pub fn render_post(
    ctx: &mut FrameContext,
    camera: &Camera,
    gbuffer: &GBufferOutput,
    scene_color: TargetId,
    destination: TargetId,
    overlays: &[OverlayQuad],
) -> Result<()> {
    let source = ctx.resource(scene_color)?;

    if camera.post_process {
        let mut params = TechniqueParams {
            projection: camera.projection(),
            exposure: camera.exposure,
            bloom_threshold: camera.bloom_threshold,
            ..TechniqueParams::default()
        };
        // Fullscreen slot order: 0 depth, 1 normals, 2 source color.
        params.inputs.push(ctx.resource(gbuffer.depth)?);
        params.inputs.push(ctx.resource(gbuffer.normals)?);
        params.inputs.push(source);

        ctx.enable_target(destination, Some(Color::BLACK), true, "Post-Process")?;
        ctx.draw(Technique::PostProcess, &params, &[])?;
        ctx.disable_target()?;
    } else {
        let surface = ctx
            .pool
            .get(destination)
            .ok_or(crate::errors::EmberError::InvalidTarget("render_post"))?
            .attachment();
        ctx.backend
            .blit(source, BlitDestination::Surface(surface), None)?;
        ctx.note_external_write(destination);
    }

    if overlays.is_empty() {
        return Ok(());
    }

    // Overlay quads on top of the composed image; clear: None keeps it.
    ctx.enable_target(destination, None, false, "Gamma Overlay")?;
    for quad in overlays {
        let params = TechniqueParams {
            color: quad.color,
            intensity: quad.alpha,
            position: Vec3::new(quad.rect.x, quad.rect.y, 0.0),
            direction: Vec3::new(quad.rect.width, quad.rect.height, 0.0),
            ..TechniqueParams::default()
        };
        ctx.draw(Technique::GammaOverlay, &params, &[])?;
    }
    ctx.disable_target()?;

    Ok(())
}
