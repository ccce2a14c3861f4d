//! Light Pre-Pass
//!
//! Accumulates lighting into a single HDR target by sampling the G-Buffer
//! once per light: diffuse in rgb, monochrome specular in alpha. Every
//! light after the first is an additive fullscreen draw into the same
//! pass, so the cost per light is one draw, not one target.
//!
//! The ambient term optionally modulates by a half-resolution occlusion
//! estimate computed here from the downsampled G-Buffer.

use crate::errors::Result;
use crate::gfx::{Color, SurfaceFormat, SurfaceSize, Technique, TechniqueParams};
use crate::render::frame::FrameContext;
use crate::render::lists::RenderLists;
use crate::render::passes::gbuffer::GBufferOutput;
use crate::render::passes::shadow::ShadowCache;
use crate::render::pool::TargetId;
use crate::render::target::TargetKey;
use crate::scene::{Camera, LightKind, Scene};

/// Light accumulation target plus the occlusion target when one was
/// rendered; both are pool fetches the sequencer releases.
pub struct LightOutput {
    pub accumulation: TargetId,
    pub occlusion: Option<TargetId>,
}

pub fn render_lights(
    ctx: &mut FrameContext,
    scene: &Scene,
    lists: &RenderLists,
    camera: &Camera,
    gbuffer: &GBufferOutput,
    shadows: &ShadowCache,
    size: SurfaceSize,
) -> Result<LightOutput> {
    let wants_occlusion = lists.lights.iter().any(|key| {
        scene.lights.get(*key).is_some_and(|light| {
            matches!(&light.kind, LightKind::Ambient(a) if a.use_occlusion)
        })
    });

    let occlusion = if wants_occlusion {
        Some(render_occlusion(ctx, camera, gbuffer, size.half())?)
    } else {
        None
    };

    let accumulation = ctx.pool.fetch(
        ctx.backend,
        TargetKey::new(size, SurfaceFormat::Rgba16Float),
        "Light Accumulation",
    )?;
    ctx.enable_target(accumulation, Some(Color::TRANSPARENT), false, "Light Pre-Pass")?;

    let depth = ctx.resource(gbuffer.depth)?;
    let normals = ctx.resource(gbuffer.normals)?;

    for key in &lists.lights {
        let Some(light) = scene.lights.get(*key) else {
            continue;
        };
        if !contributes(light) {
            continue;
        }

        let mut params = TechniqueParams {
            view: camera.view(),
            projection: camera.projection(),
            camera_position: camera.position,
            color: light.color,
            intensity: light.intensity,
            ..TechniqueParams::default()
        };
        params.inputs.push(depth);
        params.inputs.push(normals);

        let technique = match &light.kind {
            LightKind::Ambient(ambient) => {
                if let (true, Some(ao)) = (ambient.use_occlusion, occlusion) {
                    params.inputs.push(ctx.resource(ao)?);
                }
                // Flatten the SH radiance into the tint; full per-pixel
                // SH evaluation would need the coefficients uploaded.
                if let Some(sh) = &ambient.sh_coefficients {
                    params.color += sh[0];
                }
                Technique::AmbientLight
            }
            LightKind::Directional(d) => {
                params.direction = d.direction;
                Technique::DirectionalLight
            }
            LightKind::Point(p) => {
                params.position = p.position;
                params.range = p.range;
                Technique::PointLight
            }
            LightKind::Spot(s) => {
                params.position = s.position;
                params.direction = s.direction;
                params.range = s.range;
                params.inner_cone = s.inner_cone;
                params.outer_cone = s.outer_cone;
                Technique::SpotLight
            }
        };

        if light.cast_shadows
            && let Some(map) = shadows.map_for(light.id)
        {
            // Slot 3 by convention; slot 2 may hold the occlusion buffer.
            while params.inputs.len() < 3 {
                params.inputs.push(depth);
            }
            params.inputs.push(ctx.resource(map)?);
        }

        ctx.draw(technique, &params, &[])?;
        ctx.stats.lights_drawn += 1;
    }

    ctx.disable_target()?;
    Ok(LightOutput {
        accumulation,
        occlusion,
    })
}

/// Zero-intensity and zero-range lights survive culling but add nothing;
/// their fullscreen draw is pure overdraw.
fn contributes(light: &crate::scene::Light) -> bool {
    if light.intensity <= 0.0 {
        return false;
    }
    match &light.kind {
        LightKind::Point(p) => p.range > 0.0,
        LightKind::Spot(s) => s.range > 0.0,
        _ => true,
    }
}

fn render_occlusion(
    ctx: &mut FrameContext,
    camera: &Camera,
    gbuffer: &GBufferOutput,
    half: SurfaceSize,
) -> Result<TargetId> {
    let target = ctx.pool.fetch(
        ctx.backend,
        TargetKey::new(half, SurfaceFormat::R8),
        "Ambient Occlusion",
    )?;
    let mut params = TechniqueParams {
        view: camera.view(),
        projection: camera.projection(),
        ..TechniqueParams::default()
    };
    params.inputs.push(ctx.resource(gbuffer.half_depth)?);
    params.inputs.push(ctx.resource(gbuffer.half_normals)?);

    ctx.enable_target(target, Some(Color::WHITE), false, "Occlusion Estimate")?;
    ctx.draw(Technique::AmbientOcclusion, &params, &[])?;
    ctx.disable_target()?;
    Ok(target)
}
