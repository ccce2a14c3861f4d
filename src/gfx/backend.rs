//! Render Backend Trait
//!
//! [`RenderBackend`] is the seam between the deferred pipeline and the
//! concrete graphics API. The trait is deliberately narrow: the pass
//! sequencer and compositor are expressed entirely in terms of surfaces,
//! passes, technique-batched draw lists and blits.
//!
//! # Design Principles
//!
//! - **Object safety**: the engine stores `&mut dyn RenderBackend` in its
//!   per-frame context so hosts and tests can substitute implementations.
//! - **Technique-batched draws**: a draw call never selects a shader on its
//!   own; the pass hands the backend a [`Technique`] plus a batch of calls
//!   that all share it, which is what keeps GPU state switches bounded by
//!   the number of buckets rather than the number of mesh parts.
//! - **No mid-frame suspension**: every method is synchronous. The engine
//!   is single-threaded by design and the backend must not require
//!   cross-thread coordination.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::gfx::{Antialiasing, Color, DepthFormat, PixelRect, SurfaceFormat, SurfaceSize};

new_key_type! {
    /// Handle to a GPU-backed surface owned by a backend.
    pub struct SurfaceId;
    /// Handle to an uploaded mesh (vertex/index buffers) owned by a backend.
    pub struct MeshId;
}

// ─── Surface Creation ─────────────────────────────────────────────────────────

/// Full description of an offscreen surface.
///
/// The five key fields (`size`, `format`, `depth_format`, `antialiasing`,
/// `mipmap`) are exactly the render target pool key: pool matching is
/// exact equality over all of them, never nearest-fit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SurfaceDescriptor {
    pub size: SurfaceSize,
    pub format: SurfaceFormat,
    pub depth_format: Option<DepthFormat>,
    pub antialiasing: Antialiasing,
    pub mipmap: bool,
    pub label: &'static str,
}

// ─── Meshes ───────────────────────────────────────────────────────────────────

/// Interleaved vertex layout shared by every geometry technique.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// One drawable index range of a mesh. Mesh parts are the unit of material
/// assignment and of per-frame classification.
#[derive(Clone, Copy, Debug)]
pub struct MeshPart {
    pub index_start: u32,
    pub index_count: u32,
}

/// CPU-side mesh data handed to [`RenderBackend::upload_mesh`].
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub parts: Vec<MeshPart>,
}

// ─── Techniques ───────────────────────────────────────────────────────────────

/// Closed set of shader techniques. One GPU program per variant; the pass
/// sequencer classifies work into these buckets once per frame and the
/// backend dispatches each bucket with a single pipeline bind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Technique {
    // G-Buffer generation (7 classification buckets)
    GBufferSimple,
    GBufferNormalMapped,
    GBufferParallax,
    GBufferSkinnedSimple,
    GBufferSkinnedNormalMapped,
    GBufferTransparent,
    GBufferTransparentSkinned,

    // G-Buffer derived work
    DownsampleGBuffer,
    DepthReconstruct,

    // Light pre-pass accumulation
    AmbientLight,
    AmbientOcclusion,
    DirectionalLight,
    PointLight,
    SpotLight,

    // Shadow map generation
    ShadowDepth,
    ShadowDepthCube,

    // Scene (material) pass, opaque buckets
    BlinnPhong,
    SkinnedBlinnPhong,
    CarPaint,
    Constant,

    // Scene pass tail
    Skybox,
    Skydome,
    Particles,
    ForwardTransparent,
    ForwardTransparentSkinned,
    DebugLines,

    // Post-processing and composition
    PostProcess,
    GammaOverlay,
}

impl Technique {
    /// Whether the technique accumulates additively (light pre-pass).
    #[must_use]
    pub const fn is_additive(self) -> bool {
        matches!(
            self,
            Self::AmbientLight | Self::DirectionalLight | Self::PointLight | Self::SpotLight
        )
    }

    /// Whether the technique renders a fullscreen primitive rather than
    /// scene geometry.
    #[must_use]
    pub const fn is_fullscreen(self) -> bool {
        matches!(
            self,
            Self::DownsampleGBuffer
                | Self::DepthReconstruct
                | Self::AmbientLight
                | Self::AmbientOcclusion
                | Self::DirectionalLight
                | Self::PointLight
                | Self::SpotLight
                | Self::PostProcess
        )
    }
}

/// Per-batch parameters for a technique dispatch.
///
/// This replaces the original design's process-wide singleton shader
/// instances: every pass owns the state it uploads, and the backend sees a
/// plain value it can diff against the last upload.
#[derive(Clone, Debug)]
pub struct TechniqueParams {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,

    /// Light or material tint.
    pub color: Vec3,
    pub intensity: f32,
    pub direction: Vec3,
    pub position: Vec3,
    pub range: f32,
    pub inner_cone: f32,
    pub outer_cone: f32,

    /// Tone-mapping exposure (post-process only).
    pub exposure: f32,
    /// Bloom luminance threshold (post-process only).
    pub bloom_threshold: f32,

    /// Input surfaces consumed by the technique, in technique-defined slot
    /// order (G-Buffer depth, G-Buffer normals, light accumulation, shadow
    /// map, …). At most four.
    pub inputs: SmallVec<[SurfaceId; 4]>,
}

impl Default for TechniqueParams {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            direction: Vec3::NEG_Z,
            position: Vec3::ZERO,
            range: 0.0,
            inner_cone: 0.0,
            outer_cone: 0.0,
            exposure: 1.0,
            bloom_threshold: 1.0,
            inputs: SmallVec::new(),
        }
    }
}

/// One mesh-part draw inside a technique batch. Color and opacity come
/// from the part's material; they vary per draw within a bucket, unlike
/// the batch-wide [`TechniqueParams`].
#[derive(Clone, Debug)]
pub struct DrawCall {
    pub mesh: MeshId,
    pub part: u32,
    pub world: Mat4,
    pub color: Vec3,
    pub opacity: f32,
    /// Skeletal palette for skinned buckets; `None` for rigid geometry.
    pub bones: Option<Arc<[Mat4]>>,
}

impl DrawCall {
    #[must_use]
    pub fn new(mesh: MeshId, part: u32, world: Mat4) -> Self {
        Self {
            mesh,
            part,
            world,
            color: Vec3::ONE,
            opacity: 1.0,
            bones: None,
        }
    }
}

// ─── Passes ───────────────────────────────────────────────────────────────────

/// A color attachment of a render pass. `clear: None` loads the existing
/// surface contents (used for overlay passes on an already-written target).
#[derive(Clone, Copy, Debug)]
pub struct ColorAttachment {
    pub surface: SurfaceId,
    pub clear: Option<Color>,
}

/// Description of a render pass over 1–4 color attachments.
///
/// The depth attachment, when present, is the depth surface of the *first*
/// color attachment — multi-target groups share one depth buffer, matching
/// the pool's binding contract.
#[derive(Clone, Debug)]
pub struct PassDescriptor {
    pub label: &'static str,
    pub colors: SmallVec<[ColorAttachment; 4]>,
    /// Use the first attachment's depth buffer.
    pub use_depth: bool,
    pub clear_depth: bool,
    /// Pixel viewport restriction; `None` covers the full attachment.
    pub viewport: Option<PixelRect>,
}

/// Destination of a blit operation.
#[derive(Clone, Copy, Debug)]
pub enum BlitDestination {
    /// Another offscreen surface.
    Surface(SurfaceId),
    /// The window back buffer (or the headless stand-in for it).
    BackBuffer,
}

/// Raw RGBA8 pixels read back from a surface.
#[derive(Clone, Debug)]
pub struct SurfaceData {
    pub size: SurfaceSize,
    pub rgba: Vec<u8>,
}

// ─── The Backend Trait ────────────────────────────────────────────────────────

/// The graphics API seam.
///
/// # Contract
///
/// - Passes must be strictly bracketed: `begin_pass` … `draw`* …
///   `end_pass`, never nested. The per-frame context enforces the
///   single-active-target invariant above this layer; the backend may
///   assume it.
/// - `create_surface` failures are fatal to the caller and are never
///   retried.
/// - `submit_frame` flushes all recorded work and presents when a window
///   surface exists.
pub trait RenderBackend {
    /// Allocates a GPU surface. Failure is propagated, not retried.
    fn create_surface(&mut self, desc: &SurfaceDescriptor) -> Result<SurfaceId>;

    /// Destroys a surface. Destroying an already-destroyed handle is a
    /// no-op.
    fn destroy_surface(&mut self, id: SurfaceId);

    /// Descriptor of a live surface, or `None` for dead handles.
    fn surface_descriptor(&self, id: SurfaceId) -> Option<SurfaceDescriptor>;

    /// Uploads vertex/index data and returns a mesh handle.
    fn upload_mesh(&mut self, data: &MeshData) -> Result<MeshId>;

    /// Frees a mesh. Unknown handles are a no-op. Used by transient
    /// geometry (debug lines rebuilt every frame).
    fn destroy_mesh(&mut self, id: MeshId);

    /// Begins recording a render pass.
    fn begin_pass(&mut self, desc: &PassDescriptor) -> Result<()>;

    /// Draws a technique batch inside the current pass. An empty `calls`
    /// slice dispatches one fullscreen primitive.
    fn draw(&mut self, technique: Technique, params: &TechniqueParams, calls: &[DrawCall])
    -> Result<()>;

    /// Ends the current render pass.
    fn end_pass(&mut self) -> Result<()>;

    /// Copies `src` into a destination rectangle (full destination when
    /// `viewport` is `None`). Must not be called inside a pass.
    fn blit(
        &mut self,
        src: SurfaceId,
        dst: BlitDestination,
        viewport: Option<PixelRect>,
    ) -> Result<()>;

    /// Reads a surface back to the CPU as tightly-packed RGBA8.
    ///
    /// Only `SurfaceFormat::Rgba8` surfaces are required to be readable;
    /// used by the screenshot path.
    fn read_surface(&mut self, id: SurfaceId) -> Result<SurfaceData>;

    /// Submits all recorded work for the frame and presents.
    fn submit_frame(&mut self) -> Result<()>;
}
