//! Sky
//!
//! A scene carries at most one sky, either a cube-mapped box or a
//! gradient dome; the two are mutually exclusive by construction. The sky
//! draws after the opaque buckets with depth writes off, so deferred
//! geometry always wins the depth test.

use glam::Vec3;

use crate::gfx::{MeshId, Technique};

#[derive(Clone, Debug)]
pub enum Sky {
    /// Cube-mapped skybox.
    Box { mesh: MeshId, tint: Vec3 },
    /// Procedural gradient dome, zenith to horizon.
    Dome {
        mesh: MeshId,
        zenith_color: Vec3,
        horizon_color: Vec3,
    },
}

impl Sky {
    #[must_use]
    pub const fn technique(&self) -> Technique {
        match self {
            Self::Box { .. } => Technique::Skybox,
            Self::Dome { .. } => Technique::Skydome,
        }
    }

    #[must_use]
    pub const fn mesh(&self) -> MeshId {
        match self {
            Self::Box { mesh, .. } | Self::Dome { mesh, .. } => *mesh,
        }
    }

    #[must_use]
    pub const fn color(&self) -> Vec3 {
        match self {
            Self::Box { tint, .. } => *tint,
            Self::Dome { zenith_color, .. } => *zenith_color,
        }
    }
}
