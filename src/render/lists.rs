//! Render Lists
//!
//! Per-camera draw lists produced by culling and consumed by the passes.
//! The lists are owned by the pass sequencer and reused across frames so
//! the per-frame cost is a handful of `clear` calls, never a reallocation
//! in steady state.

use crate::gfx::DrawCall;
use crate::render::material::{GBufferBucket, MaterialBucket};
use crate::scene::LightKey;

#[derive(Default)]
pub struct RenderLists {
    /// G-Buffer draws, indexed by [`GBufferBucket::index`].
    pub gbuffer: [Vec<DrawCall>; GBufferBucket::COUNT],
    /// Opaque scene-pass draws, indexed by [`MaterialBucket::index`].
    pub opaque: [Vec<DrawCall>; MaterialBucket::COUNT],
    /// Forward transparents in scene insertion order. Not depth-sorted;
    /// the sequencer logs this known limitation once.
    pub transparent: Vec<DrawCall>,
    pub transparent_skinned: Vec<DrawCall>,
    /// Shadow casters (opaque, cast_shadows models only), reused for
    /// every shadow-mapped light this frame.
    pub shadow_casters: Vec<DrawCall>,
    /// Lights that survived culling, in scene order.
    pub lights: Vec<LightKey>,
}

impl RenderLists {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties every list, keeping capacity.
    pub fn clear(&mut self) {
        for list in &mut self.gbuffer {
            list.clear();
        }
        for list in &mut self.opaque {
            list.clear();
        }
        self.transparent.clear();
        self.transparent_skinned.clear();
        self.shadow_casters.clear();
        self.lights.clear();
    }

    #[must_use]
    pub fn gbuffer_total(&self) -> usize {
        self.gbuffer.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn has_transparents(&self) -> bool {
        !self.transparent.is_empty() || !self.transparent_skinned.is_empty()
    }
}
