//! Lights
//!
//! Flat light components consumed by the light pre-pass. The scene holds
//! them in a slotmap; the pass sequencer additionally keys its shadow map
//! cache by the stable `id`, which survives slotmap reuse because it is
//! derived from the light's uuid.

use std::hash::{Hash, Hasher};

use glam::Vec3;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ShadowConfig {
    pub bias: f32,
    pub map_size: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            bias: 0.005,
            map_size: 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmbientLight {
    /// Second-order spherical harmonics coefficients for directional
    /// ambient variation; `None` falls back to the flat color term.
    pub sh_coefficients: Option<[Vec3; 9]>,
    /// Modulate by the half-resolution occlusion estimate.
    pub use_occlusion: bool,
}

#[derive(Debug, Clone)]
pub struct DirectionalLight {
    pub direction: Vec3,
}

#[derive(Debug, Clone)]
pub struct PointLight {
    pub position: Vec3,
    pub range: f32,
}

#[derive(Debug, Clone)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub range: f32,
    /// Cosine of the inner (full-intensity) cone half-angle.
    pub inner_cone: f32,
    /// Cosine of the outer (falloff) cone half-angle.
    pub outer_cone: f32,
}

#[derive(Debug, Clone)]
pub enum LightKind {
    Ambient(AmbientLight),
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
}

#[derive(Debug, Clone)]
pub struct Light {
    pub uuid: Uuid,
    /// Stable identity for caches keyed across frames (shadow maps).
    pub id: u64,
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,

    pub enabled: bool,
    pub cast_shadows: bool,
    pub shadow: ShadowConfig,
}

impl Light {
    fn generate_id_from_uuid(uuid: &Uuid) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        uuid.hash(&mut hasher);
        hasher.finish()
    }

    fn with_kind(color: Vec3, intensity: f32, kind: LightKind) -> Self {
        let uuid = Uuid::new_v4();
        Self {
            uuid,
            id: Self::generate_id_from_uuid(&uuid),
            color,
            intensity,
            kind,
            enabled: true,
            cast_shadows: false,
            shadow: ShadowConfig::default(),
        }
    }

    #[must_use]
    pub fn new_ambient(color: Vec3, intensity: f32) -> Self {
        Self::with_kind(
            color,
            intensity,
            LightKind::Ambient(AmbientLight {
                sh_coefficients: None,
                use_occlusion: true,
            }),
        )
    }

    #[must_use]
    pub fn new_directional(color: Vec3, intensity: f32, direction: Vec3) -> Self {
        Self::with_kind(
            color,
            intensity,
            LightKind::Directional(DirectionalLight {
                direction: direction.normalize_or_zero(),
            }),
        )
    }

    #[must_use]
    pub fn new_point(color: Vec3, intensity: f32, position: Vec3, range: f32) -> Self {
        Self::with_kind(
            color,
            intensity,
            LightKind::Point(PointLight { position, range }),
        )
    }

    #[must_use]
    pub fn new_spot(
        color: Vec3,
        intensity: f32,
        position: Vec3,
        direction: Vec3,
        range: f32,
        inner_cone: f32,
        outer_cone: f32,
    ) -> Self {
        Self::with_kind(
            color,
            intensity,
            LightKind::Spot(SpotLight {
                position,
                direction: direction.normalize_or_zero(),
                range,
                inner_cone,
                outer_cone,
            }),
        )
    }

    /// Bounding sphere for frustum culling. Ambient and directional
    /// lights are unbounded and always pass.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, f32)> {
        match &self.kind {
            LightKind::Ambient(_) | LightKind::Directional(_) => None,
            LightKind::Point(p) => Some((p.position, p.range)),
            LightKind::Spot(s) => Some((s.position, s.range)),
        }
    }
}
