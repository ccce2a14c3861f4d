//! Model Renderers
//!
//! A [`ModelRenderer`] binds an uploaded mesh to per-part materials, a
//! world transform and a bounding sphere. Skinned models additionally
//! carry an [`AnimationPlayer`] whose bone palette is advanced in the
//! scene update and snapshotted into draw calls.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::gfx::MeshId;
use crate::render::frame::LayerMask;
use crate::render::material::Material;

/// One drawable mesh part with its material.
#[derive(Clone, Copy, Debug)]
pub struct PartInstance {
    pub part: u32,
    pub material: Material,
}

#[derive(Clone, Debug)]
pub struct ModelRenderer {
    pub mesh: MeshId,
    pub parts: Vec<PartInstance>,
    pub world: Mat4,

    /// Object-space bounding sphere; culling transforms it by `world`.
    pub bounds_center: Vec3,
    pub bounds_radius: f32,

    pub layers: LayerMask,
    pub visible: bool,
    pub cast_shadows: bool,

    pub animation: Option<AnimationPlayer>,
}

impl ModelRenderer {
    #[must_use]
    pub fn new(mesh: MeshId, parts: Vec<PartInstance>) -> Self {
        Self {
            mesh,
            parts,
            world: Mat4::IDENTITY,
            bounds_center: Vec3::ZERO,
            bounds_radius: 1.0,
            layers: LayerMask::DEFAULT,
            visible: true,
            cast_shadows: true,
            animation: None,
        }
    }

    #[must_use]
    pub const fn is_skinned(&self) -> bool {
        self.animation.is_some()
    }

    /// World-space bounding sphere. The radius scales by the largest axis
    /// scale so non-uniform transforms stay conservative.
    #[must_use]
    pub fn world_bounds(&self) -> (Vec3, f32) {
        let center = self.world.transform_point3(self.bounds_center);
        let scale = self
            .world
            .x_axis
            .length()
            .max(self.world.y_axis.length())
            .max(self.world.z_axis.length());
        (center, self.bounds_radius * scale)
    }

    /// Current bone palette for skinned draws, `None` for rigid models.
    #[must_use]
    pub fn bone_palette(&self) -> Option<Arc<[Mat4]>> {
        self.animation.as_ref().map(AnimationPlayer::palette)
    }
}

// ─── Animation ────────────────────────────────────────────────────────────────

/// One bone's keyframe track. Tracks are sampled with linear
/// interpolation (nlerp for rotations) at the player's current time.
#[derive(Clone, Debug)]
pub struct BoneTrack {
    /// Keyframe timestamps in seconds, strictly increasing.
    pub times: Vec<f32>,
    pub translations: Vec<Vec3>,
    pub rotations: Vec<Quat>,
}

#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    fn sample_track(track: &BoneTrack, time: f32) -> Mat4 {
        if track.times.is_empty() {
            return Mat4::IDENTITY;
        }
        let next = track.times.partition_point(|t| *t <= time);
        if next == 0 {
            return Mat4::from_rotation_translation(track.rotations[0], track.translations[0]);
        }
        if next >= track.times.len() {
            let last = track.times.len() - 1;
            return Mat4::from_rotation_translation(
                track.rotations[last],
                track.translations[last],
            );
        }
        let prev = next - 1;
        let span = track.times[next] - track.times[prev];
        let t = if span > f32::EPSILON {
            (time - track.times[prev]) / span
        } else {
            0.0
        };
        let rotation = track.rotations[prev].lerp(track.rotations[next], t);
        let translation = track.translations[prev].lerp(track.translations[next], t);
        Mat4::from_rotation_translation(rotation.normalize(), translation)
    }
}

/// Playback state over a shared clip.
#[derive(Clone, Debug)]
pub struct AnimationPlayer {
    pub clip: Arc<AnimationClip>,
    pub time: f32,
    pub speed: f32,
    pub looping: bool,
    pub playing: bool,
    palette: Arc<[Mat4]>,
}

impl AnimationPlayer {
    #[must_use]
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        let palette: Arc<[Mat4]> = vec![Mat4::IDENTITY; clip.tracks.len()].into();
        Self {
            clip,
            time: 0.0,
            speed: 1.0,
            looping: true,
            playing: true,
            palette,
        }
    }

    /// Advances playback and rebuilds the bone palette.
    pub fn update(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        self.time += dt * self.speed;
        if self.clip.duration > 0.0 {
            if self.looping {
                self.time = self.time.rem_euclid(self.clip.duration);
            } else if self.time >= self.clip.duration {
                self.time = self.clip.duration;
                self.playing = false;
            }
        }
        self.palette = self
            .clip
            .tracks
            .iter()
            .map(|track| AnimationClip::sample_track(track, self.time))
            .collect();
    }

    #[must_use]
    pub fn palette(&self) -> Arc<[Mat4]> {
        Arc::clone(&self.palette)
    }
}
