//! Ember: a deferred (light pre-pass) 3D rendering engine.
//!
//! The pipeline renders a thin G-Buffer (linear depth + normals),
//! accumulates all lighting additively into one HDR target, then shades
//! materials in a forward pass that samples the accumulated light.
//! Every intermediate texture is recycled through a render target pool,
//! so steady-state frames allocate nothing on the GPU.

pub mod app;
pub mod errors;
pub mod gfx;
pub mod render;
pub mod scene;

#[cfg(feature = "winit")]
pub use app::runner::App;
pub use app::{
    AudioListener, ErrorPolicy, GameLoop, Input, NullPhysics, PhysicsHook, SceneHooks, Time,
};
pub use errors::{EmberError, Result};
pub use gfx::{RenderBackend, SurfaceSize, Technique, WgpuBackend};
pub use render::{
    CameraCompositor, FrameContext, FrameStats, LayerMask, Material, PassSequencer, Renderer,
    RendererSettings, RenderTargetPool,
};
pub use scene::{Camera, Light, ModelRenderer, Scene};
