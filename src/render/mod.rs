//! Deferred Renderer
//!
//! Light pre-pass deferred pipeline: a thin G-Buffer (linear depth +
//! normals), additive light accumulation, then a forward material pass
//! that consumes the accumulated lighting. All intermediate textures come
//! from the [`RenderTargetPool`] and are recycled frame over frame.
//!
//! [`Renderer`] is the façade the application loop drives: it owns the
//! pool, the pass sequencer, the camera compositor and the frame
//! counters, and borrows the backend only for the duration of a frame.

pub mod compositor;
pub mod culling;
pub mod frame;
pub mod lists;
pub mod material;
pub mod passes;
pub mod pool;
pub mod screenshot;
pub mod sequencer;
pub mod target;

pub use compositor::CameraCompositor;
pub use frame::{FrameContext, FrameStats, LayerMask};
pub use lists::RenderLists;
pub use material::{GBufferBucket, Material, MaterialBucket};
pub use pool::{BindingId, RenderTargetPool, TargetId, MAX_POOLED_TARGETS};
pub use sequencer::PassSequencer;
pub use target::{RenderTarget, TargetKey};

use log::info;

use crate::errors::Result;
use crate::gfx::{BlitDestination, RenderBackend, SurfaceFormat, SurfaceSize};
use crate::scene::{CameraKey, Scene};

/// Renderer configuration, fixed at construction.
///
/// | Field             | Default | Meaning                                  |
/// |-------------------|---------|------------------------------------------|
/// | `pool_capacity`   | 256     | Hard ceiling on pooled render targets    |
#[derive(Clone, Copy, Debug)]
pub struct RendererSettings {
    pub pool_capacity: usize,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            pool_capacity: MAX_POOLED_TARGETS,
        }
    }
}

/// The deferred renderer.
pub struct Renderer {
    pool: RenderTargetPool,
    sequencer: PassSequencer,
    compositor: CameraCompositor,
    stats: FrameStats,
    frame_index: u64,
    /// Composition destination, recreated on resize. Owned by the pool
    /// arena but never recycled.
    final_target: TargetId,
    size: SurfaceSize,
}

impl Renderer {
    /// Creates the renderer and its composition target at `size`.
    pub fn new(
        backend: &mut dyn RenderBackend,
        size: SurfaceSize,
        settings: RendererSettings,
    ) -> Result<Self> {
        let mut pool = RenderTargetPool::with_capacity(settings.pool_capacity);
        let final_target = pool.create_owned(
            backend,
            TargetKey::new(size, SurfaceFormat::Rgba8),
            "Final Composition",
        )?;
        info!(
            "renderer initialized at {}x{} (pool capacity {})",
            size.width, size.height, settings.pool_capacity
        );
        Ok(Self {
            pool,
            sequencer: PassSequencer::new(),
            compositor: CameraCompositor::new(),
            stats: FrameStats::default(),
            frame_index: 0,
            final_target,
            size,
        })
    }

    /// Renders one frame through every camera in `masters`, in slice
    /// order, and presents it. Each master composites itself (and its
    /// slaves) into the shared destination; a frame with no masters
    /// renders and presents nothing.
    pub fn render_frame(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &Scene,
        masters: &[CameraKey],
    ) -> Result<()> {
        if masters.is_empty() {
            return Ok(());
        }
        self.frame_index += 1;
        self.stats.begin_frame(self.frame_index);

        let mut ctx = FrameContext::new(&mut *backend, &mut self.pool, &mut self.stats);
        for master_key in masters {
            self.compositor.render(
                &mut ctx,
                &mut self.sequencer,
                scene,
                *master_key,
                self.final_target,
            )?;
        }

        let source = ctx.resource(self.final_target)?;
        ctx.backend.blit(source, BlitDestination::BackBuffer, None)?;
        backend.submit_frame()
    }

    /// Captures the most recently composed frame as raw RGBA8.
    pub fn capture_frame(&mut self, backend: &mut dyn RenderBackend) -> Result<crate::gfx::SurfaceData> {
        let target = self
            .pool
            .get(self.final_target)
            .ok_or(crate::errors::EmberError::InvalidTarget("Renderer::capture_frame"))?;
        let data = backend.read_surface(target.resource()?)?;
        self.stats.screenshots_taken += 1;
        Ok(data)
    }

    /// Drops every cached target and rebuilds the composition target at
    /// the new size. Every size-dependent texture is stale at once, so a
    /// full clear beats selective eviction.
    pub fn resize(&mut self, backend: &mut dyn RenderBackend, size: SurfaceSize) -> Result<()> {
        info!("renderer resize to {}x{}", size.width, size.height);
        let mut ctx = FrameContext::new(&mut *backend, &mut self.pool, &mut self.stats);
        self.sequencer.reset_caches(&mut ctx);
        drop(ctx);
        self.pool.clear(backend);
        self.final_target = self.pool.create_owned(
            backend,
            TargetKey::new(size, SurfaceFormat::Rgba8),
            "Final Composition",
        )?;
        self.size = size;
        Ok(())
    }

    #[must_use]
    pub const fn stats(&self) -> &FrameStats {
        &self.stats
    }

    #[must_use]
    pub const fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[must_use]
    pub const fn size(&self) -> SurfaceSize {
        self.size
    }

    #[must_use]
    pub const fn pool(&self) -> &RenderTargetPool {
        &self.pool
    }
}
