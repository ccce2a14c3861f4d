//! Camera Compositor
//!
//! Composites a master camera and its slaves into one destination.
//!
//! The common case — one enabled camera, full viewport — takes a fast
//! path that renders straight into the destination with zero pool
//! fetches. Split-screen output fetches one partial target per camera,
//! sized to the camera's viewport in destination pixels, renders each
//! camera into its partial, and blits the partials into place in
//! rendering order. The master is merged into the slave order with a
//! single linear scan, inserted exactly once.

use log::debug;

use crate::errors::{EmberError, Result};
use crate::gfx::BlitDestination;
use crate::render::frame::FrameContext;
use crate::render::pool::TargetId;
use crate::render::sequencer::PassSequencer;
use crate::render::target::TargetKey;
use crate::scene::{CameraKey, Scene};

#[derive(Default)]
pub struct CameraCompositor {
    // Reused across frames to avoid a per-frame allocation.
    order_scratch: Vec<CameraKey>,
}

impl CameraCompositor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        ctx: &mut FrameContext,
        sequencer: &mut PassSequencer,
        scene: &Scene,
        master_key: CameraKey,
        destination: TargetId,
    ) -> Result<()> {
        let master = scene
            .cameras
            .get(master_key)
            .ok_or_else(|| EmberError::PreconditionViolation {
                component: "CameraCompositor",
                message: "master camera key does not refer to a live camera".to_string(),
            })?;
        if !master.enabled {
            debug!("compositor: master camera disabled, skipping frame");
            return Ok(());
        }

        let has_active_slaves = master
            .slaves
            .iter()
            .any(|key| scene.cameras.get(*key).is_some_and(|c| c.enabled));

        // Fast path: nothing to composite, render straight into the
        // destination without touching the pool.
        if !has_active_slaves && master.viewport.is_full() {
            return sequencer.render_camera(ctx, scene, master_key, destination);
        }

        let dest_key = ctx
            .pool
            .get(destination)
            .ok_or(EmberError::InvalidTarget("CameraCompositor::render"))?
            .key();

        // Slaves sorted by rendering order, master merged in with one
        // scan. Equal orders place the master first.
        let mut slaves: Vec<CameraKey> = master
            .slaves
            .iter()
            .copied()
            .filter(|key| scene.cameras.get(*key).is_some_and(|c| c.enabled))
            .collect();
        slaves.sort_by_key(|key| scene.cameras[*key].rendering_order);

        self.order_scratch.clear();
        let mut master_inserted = false;
        for slave in slaves {
            if !master_inserted && master.rendering_order <= scene.cameras[slave].rendering_order {
                self.order_scratch.push(master_key);
                master_inserted = true;
            }
            self.order_scratch.push(slave);
        }
        if !master_inserted {
            self.order_scratch.push(master_key);
        }

        let order = std::mem::take(&mut self.order_scratch);
        let result = self.composite_ordered(ctx, sequencer, scene, &order, dest_key, destination);
        self.order_scratch = order;
        result
    }

    fn composite_ordered(
        &mut self,
        ctx: &mut FrameContext,
        sequencer: &mut PassSequencer,
        scene: &Scene,
        order: &[CameraKey],
        dest_key: TargetKey,
        destination: TargetId,
    ) -> Result<()> {
        for camera_key in order {
            let camera = &scene.cameras[*camera_key];
            let rect = camera.viewport.to_pixels(dest_key.size);

            let partial_key = TargetKey::new(rect.size(), dest_key.format);
            let partial = ctx
                .pool
                .fetch(ctx.backend, partial_key, "Compositor Partial")?;
            ctx.stats.partial_target_fetches += 1;

            let render_result = sequencer.render_camera(ctx, scene, *camera_key, partial);
            let blit_result = render_result.and_then(|()| {
                let src = ctx.resource(partial)?;
                let dst = ctx
                    .pool
                    .get(destination)
                    .ok_or(EmberError::InvalidTarget("CameraCompositor::render"))?
                    .attachment();
                ctx.backend
                    .blit(src, BlitDestination::Surface(dst), Some(rect))
            });

            // Release before propagating so a failed camera cannot leak
            // its partial target.
            ctx.pool.release(partial);
            blit_result?;
        }

        ctx.note_external_write(destination);
        Ok(())
    }
}
