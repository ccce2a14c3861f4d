//! Graphics Abstraction Layer
//!
//! The engine's passes never talk to a concrete graphics API. They speak to
//! [`RenderBackend`], a small object-safe trait covering exactly what the
//! deferred pipeline needs: offscreen surface creation, render passes over
//! 1–4 color attachments, technique-batched draws, blits, readback and
//! frame submission.
//!
//! The production implementation is [`WgpuBackend`]. Tests drive the engine
//! through a recording backend instead, which is what makes the pipeline's
//! orchestration testable without a GPU device.

pub mod backend;
pub mod wgpu_backend;

pub use backend::{
    BlitDestination, ColorAttachment, DrawCall, MeshData, MeshId, MeshPart, MeshVertex,
    PassDescriptor, RenderBackend, SurfaceData, SurfaceDescriptor, SurfaceId, Technique,
    TechniqueParams,
};
pub use wgpu_backend::WgpuBackend;

// ─── Vocabulary Types ─────────────────────────────────────────────────────────

/// Surface dimensions in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Half resolution, clamped so neither dimension reaches zero.
    #[must_use]
    pub const fn half(self) -> Self {
        Self {
            width: if self.width >= 2 { self.width / 2 } else { 1 },
            height: if self.height >= 2 { self.height / 2 } else { 1 },
        }
    }

    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Color formats available for offscreen surfaces.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SurfaceFormat {
    /// 8-bit normalized RGBA (LDR color, screenshot targets).
    Rgba8,
    /// 16-bit float RGBA (HDR scene color, light accumulation, normals).
    Rgba16Float,
    /// 32-bit float single channel (linear depth written by the G-Buffer).
    R32Float,
    /// 8-bit normalized single channel (ambient occlusion).
    R8,
}

/// Depth-stencil formats for surfaces that carry a depth attachment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DepthFormat {
    Depth24Stencil8,
    Depth32Float,
}

/// Hardware antialiasing level. Part of the render target pool key:
/// surfaces with different sample counts never match each other.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Antialiasing {
    #[default]
    Off,
    Msaa2x,
    Msaa4x,
    Msaa8x,
}

impl Antialiasing {
    #[must_use]
    pub const fn sample_count(self) -> u32 {
        match self {
            Self::Off => 1,
            Self::Msaa2x => 2,
            Self::Msaa4x => 4,
            Self::Msaa8x => 8,
        }
    }
}

/// Normalized viewport in `[0, 1]` coordinates relative to a destination
/// surface. `(0, 0)` is the top-left corner.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub const FULL: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether this viewport covers the whole destination. The compositor
    /// fast path requires an exactly-full viewport.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.width == 1.0 && self.height == 1.0
    }

    /// Resolves the normalized rectangle against a surface size.
    /// Degenerate viewports resolve to at least one pixel.
    #[must_use]
    pub fn to_pixels(&self, size: SurfaceSize) -> PixelRect {
        let w = (self.width * size.width as f32).round() as u32;
        let h = (self.height * size.height as f32).round() as u32;
        PixelRect {
            x: (self.x * size.width as f32).round() as u32,
            y: (self.y * size.height as f32).round() as u32,
            width: w.max(1),
            height: h.max(1),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::FULL
    }
}

/// Pixel-space rectangle on a surface.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[must_use]
    pub const fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.width, self.height)
    }
}

/// Linear RGBA color.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const CORNFLOWER_BLUE: Self = Self::new(0.392, 0.584, 0.929, 1.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}
