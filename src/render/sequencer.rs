//! Pass Sequencer
//!
//! Orders one camera's render from culling to post-process and owns the
//! cross-frame state the passes share: the reusable draw lists, the
//! particle scratch list and the shadow map cache. Everything fetched
//! from the pool during the render is released before this returns, so a
//! leak here would show up as pool growth on the very next frame.
//!
//! # Pass Order
//!
//! 1. Frustum culling into the render lists
//! 2. Shadow maps (cached across frames)
//! 3. G-Buffer MRT + half-resolution downsample
//! 4. Light pre-pass accumulation (with optional occlusion estimate)
//! 5. Scene (material) pass
//! 6. Post-process into the destination, then any queued overlay quads
//! 7. Release of every intermediate target

use log::warn;

use crate::errors::{EmberError, Result};
use crate::gfx::DrawCall;
use crate::render::culling::cull_scene;
use crate::render::frame::FrameContext;
use crate::render::lists::RenderLists;
use crate::render::passes::{gbuffer, light_prepass, post_process, scene_pass, ShadowCache};
use crate::render::pool::TargetId;
use crate::scene::{CameraKey, Scene};

pub struct PassSequencer {
    lists: RenderLists,
    shadows: ShadowCache,
    particle_scratch: Vec<DrawCall>,
    warned_unsorted_transparency: bool,
}

impl PassSequencer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lists: RenderLists::new(),
            shadows: ShadowCache::new(),
            particle_scratch: Vec::new(),
            warned_unsorted_transparency: false,
        }
    }

    /// Renders `camera_key` into the full area of `destination`.
    ///
    /// The destination must be a live target; a dead handle is a caller
    /// bug and fails fast rather than rendering into nothing.
    pub fn render_camera(
        &mut self,
        ctx: &mut FrameContext,
        scene: &Scene,
        camera_key: CameraKey,
        destination: TargetId,
    ) -> Result<()> {
        let size = ctx
            .pool
            .get(destination)
            .ok_or_else(|| EmberError::PreconditionViolation {
                component: "PassSequencer",
                message: "destination render target is not live".to_string(),
            })?
            .size();
        let camera = scene
            .cameras
            .get(camera_key)
            .ok_or_else(|| EmberError::PreconditionViolation {
                component: "PassSequencer",
                message: "camera key does not refer to a live camera".to_string(),
            })?;

        cull_scene(scene, camera, &mut self.lists, ctx.stats);

        if self.lists.has_transparents() && !self.warned_unsorted_transparency {
            self.warned_unsorted_transparency = true;
            warn!(
                "transparent geometry renders in insertion order, not depth-sorted; \
                 overlapping transparents may blend incorrectly"
            );
        }

        self.shadows.prepare(ctx, scene, &self.lists)?;

        let gbuffer = gbuffer::render_gbuffer(ctx, &self.lists, camera, size)?;
        let lights = light_prepass::render_lights(
            ctx,
            scene,
            &self.lists,
            camera,
            &gbuffer,
            &self.shadows,
            size,
        )?;
        let scene_color = scene_pass::render_scene(
            ctx,
            scene,
            &self.lists,
            camera,
            &gbuffer,
            lights.accumulation,
            size,
            &mut self.particle_scratch,
        )?;
        post_process::render_post(
            ctx,
            camera,
            &gbuffer,
            scene_color,
            destination,
            scene.overlay_quads(),
        )?;

        // Shadow maps stay cached; everything else goes back.
        ctx.pool.release_binding(gbuffer.binding);
        ctx.pool.release_binding(gbuffer.half_binding);
        if let Some(occlusion) = lights.occlusion {
            ctx.pool.release(occlusion);
        }
        ctx.pool.release(lights.accumulation);
        ctx.pool.release(scene_color);

        Ok(())
    }

    /// Drops all cached shadow maps, e.g. when the pool is cleared on
    /// resize.
    pub fn reset_caches(&mut self, ctx: &mut FrameContext) {
        self.shadows.flush(ctx);
    }

    #[must_use]
    pub fn shadow_map_count(&self) -> usize {
        self.shadows.len()
    }
}

impl Default for PassSequencer {
    fn default() -> Self {
        Self::new()
    }
}
