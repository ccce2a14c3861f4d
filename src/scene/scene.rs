//! Scene Container
//!
//! Pure data layer: slotmaps of models, lights, cameras and emitters plus
//! the optional sky and the debug primitive queues. `update` advances the
//! time-dependent pieces (animation players, particle simulations); the
//! renderer never mutates a scene.

use glam::Vec3;
use slotmap::SlotMap;

use crate::gfx::Viewport;
use crate::scene::{
    Camera, CameraKey, EmitterKey, Light, LightKey, ModelKey, ModelRenderer, ParticleEmitter, Sky,
};

/// One debug line segment, world space, drawn for a single frame.
#[derive(Clone, Copy, Debug)]
pub struct DebugLine {
    pub from: Vec3,
    pub to: Vec3,
    pub color: Vec3,
}

/// One screen-space overlay quad, drawn for a single frame in gamma space
/// after post-processing. The rect is in normalized screen coordinates.
#[derive(Clone, Copy, Debug)]
pub struct OverlayQuad {
    pub rect: Viewport,
    pub color: Vec3,
    pub alpha: f32,
}

#[derive(Default)]
pub struct Scene {
    pub models: SlotMap<ModelKey, ModelRenderer>,
    pub lights: SlotMap<LightKey, Light>,
    pub cameras: SlotMap<CameraKey, Camera>,
    pub emitters: SlotMap<EmitterKey, ParticleEmitter>,

    /// At most one sky per scene; box or dome, never both.
    pub sky: Option<Sky>,

    debug_lines: Vec<DebugLine>,
    overlay_quads: Vec<OverlayQuad>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model(&mut self, model: ModelRenderer) -> ModelKey {
        self.models.insert(model)
    }

    pub fn add_light(&mut self, light: Light) -> LightKey {
        self.lights.insert(light)
    }

    pub fn add_camera(&mut self, camera: Camera) -> CameraKey {
        self.cameras.insert(camera)
    }

    pub fn add_emitter(&mut self, emitter: ParticleEmitter) -> EmitterKey {
        self.emitters.insert(emitter)
    }

    /// Queues a debug line for the next rendered frame.
    pub fn draw_debug_line(&mut self, from: Vec3, to: Vec3, color: Vec3) {
        self.debug_lines.push(DebugLine { from, to, color });
    }

    #[must_use]
    pub fn debug_lines(&self) -> &[DebugLine] {
        &self.debug_lines
    }

    /// Queues a tinted screen-space quad drawn over the next frame, after
    /// post-processing.
    pub fn draw_overlay_quad(&mut self, rect: Viewport, color: Vec3, alpha: f32) {
        self.overlay_quads.push(OverlayQuad { rect, color, alpha });
    }

    #[must_use]
    pub fn overlay_quads(&self) -> &[OverlayQuad] {
        &self.overlay_quads
    }

    /// Advances animations and particle simulations by `dt` seconds.
    /// Drops last frame's debug primitives and overlays first, so anything
    /// queued by the host after this call survives until the next frame is
    /// drawn.
    pub fn update(&mut self, dt: f32) {
        self.debug_lines.clear();
        self.overlay_quads.clear();
        for model in self.models.values_mut() {
            if let Some(player) = model.animation.as_mut() {
                player.update(dt);
            }
        }
        for emitter in self.emitters.values_mut() {
            emitter.update(dt);
        }
    }
}
