//! Materials & Classification
//!
//! Materials are a closed tagged enum rather than an open trait object:
//! the deferred pipeline needs to classify every mesh part into a fixed
//! set of buckets twice per frame (once for the G-Buffer, once for the
//! material pass), and a `match` over a closed set makes both
//! classifications total — adding a material variant fails to compile
//! until every bucket mapping handles it.

use glam::Vec3;

use crate::gfx::Technique;

/// Surface appearance of one mesh part.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Material {
    /// Standard lit material. `normal_mapped` and `parallax` select the
    /// G-Buffer variant; parallax implies normal mapping.
    BlinnPhong {
        color: Vec3,
        normal_mapped: bool,
        parallax: bool,
    },
    /// Two-tone automotive paint with a flake layer.
    CarPaint { color: Vec3, flake_color: Vec3 },
    /// Unlit constant color.
    Constant { color: Vec3 },
    /// Alpha-blended forward material. Excluded from the opaque buckets
    /// and drawn in insertion order after the sky.
    Transparent { color: Vec3, opacity: f32 },
}

impl Material {
    #[must_use]
    pub const fn blinn_phong(color: Vec3) -> Self {
        Self::BlinnPhong {
            color,
            normal_mapped: false,
            parallax: false,
        }
    }

    #[must_use]
    pub const fn is_transparent(self) -> bool {
        matches!(self, Self::Transparent { .. })
    }

    #[must_use]
    pub const fn base_color(self) -> Vec3 {
        match self {
            Self::BlinnPhong { color, .. }
            | Self::CarPaint { color, .. }
            | Self::Constant { color }
            | Self::Transparent { color, .. } => color,
        }
    }

    #[must_use]
    pub const fn opacity(self) -> f32 {
        match self {
            Self::Transparent { opacity, .. } => opacity,
            _ => 1.0,
        }
    }

    /// G-Buffer classification. Total over material × skinning; the seven
    /// buckets are dispatched in declaration order, one pipeline bind each.
    #[must_use]
    pub const fn gbuffer_bucket(self, skinned: bool) -> GBufferBucket {
        match (self, skinned) {
            (Self::Transparent { .. }, false) => GBufferBucket::Transparent,
            (Self::Transparent { .. }, true) => GBufferBucket::TransparentSkinned,
            (Self::BlinnPhong { parallax: true, .. }, false) => GBufferBucket::Parallax,
            (Self::BlinnPhong { normal_mapped: true, .. } | Self::BlinnPhong { parallax: true, .. }, true) => {
                GBufferBucket::SkinnedNormalMapped
            }
            (Self::BlinnPhong { normal_mapped: true, .. }, false) => GBufferBucket::NormalMapped,
            (_, true) => GBufferBucket::SkinnedSimple,
            (_, false) => GBufferBucket::SimpleOpaque,
        }
    }

    /// Scene (material) pass classification. `None` for transparents,
    /// which bypass the opaque buckets entirely.
    #[must_use]
    pub const fn material_bucket(self, skinned: bool) -> Option<MaterialBucket> {
        match self {
            Self::Transparent { .. } => None,
            Self::CarPaint { .. } => Some(MaterialBucket::CarPaint),
            Self::Constant { .. } => Some(MaterialBucket::Constant),
            Self::BlinnPhong { .. } => {
                if skinned {
                    Some(MaterialBucket::SkinnedBlinnPhong)
                } else {
                    Some(MaterialBucket::BlinnPhong)
                }
            }
        }
    }
}

/// The seven G-Buffer buckets, in dispatch order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GBufferBucket {
    SimpleOpaque,
    NormalMapped,
    Parallax,
    SkinnedSimple,
    SkinnedNormalMapped,
    /// Transparents still write the G-Buffer so they receive lighting,
    /// accepting self-occlusion artifacts over a forward-lit split.
    Transparent,
    TransparentSkinned,
}

impl GBufferBucket {
    pub const COUNT: usize = 7;
    pub const ALL: [Self; Self::COUNT] = [
        Self::SimpleOpaque,
        Self::NormalMapped,
        Self::Parallax,
        Self::SkinnedSimple,
        Self::SkinnedNormalMapped,
        Self::Transparent,
        Self::TransparentSkinned,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn technique(self) -> Technique {
        match self {
            Self::SimpleOpaque => Technique::GBufferSimple,
            Self::NormalMapped => Technique::GBufferNormalMapped,
            Self::Parallax => Technique::GBufferParallax,
            Self::SkinnedSimple => Technique::GBufferSkinnedSimple,
            Self::SkinnedNormalMapped => Technique::GBufferSkinnedNormalMapped,
            Self::Transparent => Technique::GBufferTransparent,
            Self::TransparentSkinned => Technique::GBufferTransparentSkinned,
        }
    }
}

/// The four opaque scene-pass buckets, in dispatch order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MaterialBucket {
    BlinnPhong,
    SkinnedBlinnPhong,
    CarPaint,
    Constant,
}

impl MaterialBucket {
    pub const COUNT: usize = 4;
    pub const ALL: [Self; Self::COUNT] = [
        Self::BlinnPhong,
        Self::SkinnedBlinnPhong,
        Self::CarPaint,
        Self::Constant,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn technique(self) -> Technique {
        match self {
            Self::BlinnPhong => Technique::BlinnPhong,
            Self::SkinnedBlinnPhong => Technique::SkinnedBlinnPhong,
            Self::CarPaint => Technique::CarPaint,
            Self::Constant => Technique::Constant,
        }
    }
}
