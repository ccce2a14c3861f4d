//! Scene Graph
//!
//! Flat slotmap-backed scene: models, lights, cameras and particle
//! emitters are addressed by generational keys, never by reference. The
//! renderer walks the scene read-only; mutation happens between frames in
//! the host's update hook.

pub mod camera;
pub mod light;
pub mod model;
pub mod particles;
pub mod scene;
pub mod sky;

pub use camera::{Camera, Frustum};
pub use light::{Light, LightKind};
pub use model::{AnimationClip, AnimationPlayer, ModelRenderer, PartInstance};
pub use particles::ParticleEmitter;
pub use scene::{DebugLine, OverlayQuad, Scene};
pub use sky::Sky;

use slotmap::new_key_type;

new_key_type! {
    /// Key of a [`ModelRenderer`] in a [`Scene`].
    pub struct ModelKey;
    /// Key of a [`Light`] in a [`Scene`].
    pub struct LightKey;
    /// Key of a [`Camera`] in a [`Scene`].
    pub struct CameraKey;
    /// Key of a [`ParticleEmitter`] in a [`Scene`].
    pub struct EmitterKey;
}
