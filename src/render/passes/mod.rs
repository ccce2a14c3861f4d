//! Render Passes
//!
//! One module per stage of the deferred pipeline, in execution order:
//! shadow maps, G-Buffer generation (with half-resolution downsample),
//! light pre-pass accumulation, the forward material (scene) pass, and
//! post-processing. Each pass is a plain function over [`FrameContext`]
//! that fetches what it needs from the pool and returns the targets it
//! produced; the sequencer owns ordering and release.
//!
//! [`FrameContext`]: crate::render::frame::FrameContext

pub mod gbuffer;
pub mod light_prepass;
pub mod post_process;
pub mod scene_pass;
pub mod shadow;

pub use gbuffer::GBufferOutput;
pub use shadow::ShadowCache;
