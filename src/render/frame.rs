//! Per-Frame Context
//!
//! [`FrameContext`] is threaded explicitly through every pass for the
//! duration of one camera render. It owns nothing: it borrows the backend
//! and the pool, carries the frame counters, and enforces the target
//! protocol — exactly one target (or one multi-target binding) enabled at
//! a time, each taken through a full enable → write → disable cycle before
//! anything reads it.

use bitflags::bitflags;

use crate::errors::{EmberError, Result};
use crate::gfx::{
    Color, ColorAttachment, DrawCall, PassDescriptor, PixelRect, RenderBackend, SurfaceId,
    Technique, TechniqueParams,
};
use crate::render::pool::{BindingId, RenderTargetPool, TargetId};

bitflags! {
    /// Layer membership for scene objects and the camera-side filter.
    /// An object renders when `camera.layers & object.layers` is
    /// non-empty.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct LayerMask: u32 {
        const DEFAULT   = 1;
        const SKY       = 1 << 1;
        const PARTICLES = 1 << 2;
        const DEBUG     = 1 << 3;
        const ALL       = u32::MAX;
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-frame counters, reset at the start of every frame. Cheap enough to
/// maintain unconditionally; read by the debug overlay and by tests.
#[derive(Clone, Copy, Default, Debug)]
pub struct FrameStats {
    pub frame_index: u64,
    /// Draws issued per G-Buffer classification bucket.
    pub gbuffer_buckets: [u32; 7],
    /// Draws issued per opaque material bucket in the scene pass.
    pub material_buckets: [u32; 4],
    pub passes: u32,
    pub draw_calls: u32,
    pub lights_drawn: u32,
    pub shadow_maps_rendered: u32,
    pub models_visible: u32,
    pub models_culled: u32,
    /// Partial (split-screen) targets fetched by the compositor. The
    /// single-camera fast path keeps this at zero.
    pub partial_target_fetches: u32,
    pub screenshots_taken: u32,
}

impl FrameStats {
    pub fn begin_frame(&mut self, frame_index: u64) {
        *self = Self {
            frame_index,
            screenshots_taken: self.screenshots_taken,
            ..Self::default()
        };
    }
}

enum ActivePass {
    Target(TargetId),
    Binding(BindingId),
}

/// Everything a pass needs for one camera render.
pub struct FrameContext<'a> {
    pub backend: &'a mut dyn RenderBackend,
    pub pool: &'a mut RenderTargetPool,
    pub stats: &'a mut FrameStats,
    active: Option<ActivePass>,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        backend: &'a mut dyn RenderBackend,
        pool: &'a mut RenderTargetPool,
        stats: &'a mut FrameStats,
    ) -> Self {
        Self {
            backend,
            pool,
            stats,
            active: None,
        }
    }

    // ─── Target Protocol ──────────────────────────────────────────────────

    /// Enables a single target for writing. `clear: None` preserves the
    /// target's previous contents (overlay passes).
    pub fn enable_target(
        &mut self,
        id: TargetId,
        clear: Option<Color>,
        clear_depth: bool,
        label: &'static str,
    ) -> Result<()> {
        self.enable_target_region(id, clear, clear_depth, None, label)
    }

    /// [`enable_target`](Self::enable_target) restricted to a pixel
    /// viewport of the target.
    pub fn enable_target_region(
        &mut self,
        id: TargetId,
        clear: Option<Color>,
        clear_depth: bool,
        viewport: Option<PixelRect>,
        label: &'static str,
    ) -> Result<()> {
        if self.active.is_some() {
            return Err(EmberError::TargetAlreadyActive(label));
        }
        let target = self
            .pool
            .get_mut(id)
            .ok_or(EmberError::InvalidTarget("FrameContext::enable_target"))?;
        target.mark_enabled(label)?;
        let use_depth = target.key().depth_format.is_some();
        let surface = target.attachment();

        self.backend.begin_pass(&PassDescriptor {
            label,
            colors: smallvec::smallvec![ColorAttachment { surface, clear }],
            use_depth,
            clear_depth,
            viewport,
        })?;
        self.active = Some(ActivePass::Target(id));
        self.stats.passes += 1;
        Ok(())
    }

    /// Enables a multi-target binding. All members clear to `clear`; the
    /// shared depth buffer (the first member's) is always cleared.
    pub fn enable_binding(
        &mut self,
        id: BindingId,
        clear: Option<Color>,
        label: &'static str,
    ) -> Result<()> {
        if self.active.is_some() {
            return Err(EmberError::TargetAlreadyActive(label));
        }
        let targets: smallvec::SmallVec<[TargetId; 3]> = self
            .pool
            .binding_targets(id)
            .ok_or(EmberError::InvalidTarget("FrameContext::enable_binding"))?
            .into();

        let mut colors = smallvec::SmallVec::new();
        let mut use_depth = false;
        for (i, target_id) in targets.iter().enumerate() {
            let target = self
                .pool
                .get_mut(*target_id)
                .ok_or(EmberError::InvalidTarget("FrameContext::enable_binding"))?;
            target.mark_enabled(label)?;
            if i == 0 {
                use_depth = target.key().depth_format.is_some();
            }
            colors.push(ColorAttachment {
                surface: target.attachment(),
                clear,
            });
        }

        self.backend.begin_pass(&PassDescriptor {
            label,
            colors,
            use_depth,
            clear_depth: true,
            viewport: None,
        })?;
        self.active = Some(ActivePass::Binding(id));
        self.stats.passes += 1;
        Ok(())
    }

    /// Disables the active target or binding, resolving its contents and
    /// making them readable.
    pub fn disable_target(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Err(EmberError::PreconditionViolation {
                component: "FrameContext",
                message: "disable_target with no active target".to_string(),
            });
        };
        self.backend.end_pass()?;
        match active {
            ActivePass::Target(id) => {
                if let Some(target) = self.pool.get_mut(id) {
                    target.mark_disabled();
                }
            }
            ActivePass::Binding(id) => {
                let targets: smallvec::SmallVec<[TargetId; 3]> = self
                    .pool
                    .binding_targets(id)
                    .map(Into::into)
                    .unwrap_or_default();
                for target_id in targets {
                    if let Some(target) = self.pool.get_mut(target_id) {
                        target.mark_disabled();
                    }
                }
            }
        }
        Ok(())
    }

    /// Issues a technique batch into the active pass.
    pub fn draw(
        &mut self,
        technique: Technique,
        params: &TechniqueParams,
        calls: &[DrawCall],
    ) -> Result<()> {
        if self.active.is_none() {
            return Err(EmberError::PreconditionViolation {
                component: "FrameContext",
                message: "draw with no active target".to_string(),
            });
        }
        self.stats.draw_calls += calls.len().max(1) as u32;
        self.backend.draw(technique, params, calls)
    }

    /// Records that a target was written outside the enable/disable
    /// protocol (by a blit), making its contents readable.
    pub fn note_external_write(&mut self, id: TargetId) {
        if let Some(target) = self.pool.get_mut(id) {
            target.mark_disabled();
        }
    }

    /// Readable surface of a resolved target.
    pub fn resource(&self, id: TargetId) -> Result<SurfaceId> {
        self.pool
            .get(id)
            .ok_or(EmberError::InvalidTarget("FrameContext::resource"))?
            .resource()
    }

    #[must_use]
    pub const fn has_active_target(&self) -> bool {
        self.active.is_some()
    }
}
