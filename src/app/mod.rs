//! Application Loop
//!
//! [`GameLoop`] is the frame orchestrator: it owns the backend, the
//! renderer and the scene, and drives the host through the fixed phase
//! sequence `LoadContent → BeginRun → (Update, Draw)* → EndRun`. The host
//! participates through [`SceneHooks`], a trait of default-no-op
//! callbacks, and optionally through a [`PhysicsHook`] stepped before
//! every update.
//!
//! Draw errors are routed through the configured [`ErrorPolicy`]: `Halt`
//! propagates immediately, `PauseAndReport` logs, notifies the hooks and
//! pauses the loop so a host can show the failure and resume.

pub mod input;
#[cfg(feature = "winit")]
pub mod runner;

use std::path::PathBuf;

use glam::Vec3;
use log::{error, info};

use crate::errors::{EmberError, Result};
use crate::gfx::{RenderBackend, SurfaceSize};
use crate::render::screenshot;
use crate::render::{Renderer, RendererSettings};
use crate::scene::{CameraKey, Scene};

pub use input::{Input, Key, MouseButton};

/// Upper bound on simultaneously registered audio listeners (local
/// multiplayer caps at four viewports).
pub const MAX_AUDIO_LISTENERS: usize = 4;

/// Spatial audio listener attached to a fixed slot. A listener tracking a
/// camera is re-synced to the camera's pose on every update; untracked
/// listeners keep whatever the host last wrote.
#[derive(Clone, Copy, Debug)]
pub struct AudioListener {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub velocity: Vec3,
    pub tracked_camera: Option<CameraKey>,
}

impl AudioListener {
    /// Listener that follows `camera` from the next update on.
    #[must_use]
    pub fn tracking(camera: CameraKey) -> Self {
        Self {
            tracked_camera: Some(camera),
            ..Self::default()
        }
    }
}

impl Default for AudioListener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            velocity: Vec3::ZERO,
            tracked_camera: None,
        }
    }
}

/// What the loop does with a draw error.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ErrorPolicy {
    /// Propagate the error out of [`GameLoop::tick`].
    Halt,
    /// Log, notify [`SceneHooks::on_error`], and pause the loop.
    #[default]
    PauseAndReport,
}

/// Frame timing handed to the hooks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Time {
    /// Seconds since [`GameLoop::load_content`].
    pub total: f32,
    /// Seconds covered by this update.
    pub delta: f32,
    pub frame: u64,
}

/// Everything an update hook can reach.
pub struct UpdateArgs<'a> {
    pub scene: &'a mut Scene,
    pub input: &'a Input,
    pub time: Time,
}

/// Host callbacks, all defaulting to no-ops. The loop guarantees the
/// calling order documented on each method.
#[allow(unused_variables)]
pub trait SceneHooks {
    /// Called once, before the first frame. Upload meshes and build the
    /// scene here; failure aborts startup.
    fn load_content(&mut self, scene: &mut Scene, backend: &mut dyn RenderBackend) -> Result<()> {
        Ok(())
    }

    /// Called once after `load_content`, immediately before the first
    /// update.
    fn begin_run(&mut self, scene: &mut Scene) {}

    /// Called every frame, after the scene's own update (animations and
    /// particles have already advanced).
    fn update(&mut self, args: UpdateArgs<'_>) {}

    /// Called every frame after every `update` hook ran, for work that
    /// depends on the frame's final transforms (camera follow, IK).
    fn late_update(&mut self, args: UpdateArgs<'_>) {}

    /// Called after update, before the frame is rendered.
    fn before_draw(&mut self, scene: &mut Scene, time: Time) {}

    /// Called after the frame was submitted.
    fn after_draw(&mut self, scene: &mut Scene, time: Time) {}

    /// Called once when the loop shuts down.
    fn end_run(&mut self, scene: &mut Scene) {}

    /// Called once after `end_run`; release meshes and other GPU content
    /// uploaded in `load_content` here.
    fn unload_content(&mut self, scene: &mut Scene, backend: &mut dyn RenderBackend) {}

    /// Called after `unload_content`, when the backend is about to be
    /// dropped. Last chance to detach from device resources.
    fn on_device_disposed(&mut self) {}

    /// Called after a resize dropped every pooled and cached GPU target;
    /// the host must recreate anything it sized to the old back buffer.
    fn on_device_reset(&mut self, scene: &mut Scene, size: SurfaceSize) {}

    /// Called when the output size changed, after the renderer resized.
    fn on_resize(&mut self, scene: &mut Scene, size: SurfaceSize) {}

    /// Called when the loop pauses (explicitly or through
    /// [`ErrorPolicy::PauseAndReport`]).
    fn on_pause(&mut self) {}

    /// Called when the loop resumes.
    fn on_resume(&mut self) {}

    /// Called with every draw error routed through
    /// [`ErrorPolicy::PauseAndReport`].
    fn on_error(&mut self, error: &EmberError) {}
}

/// No-op host; useful for tests and tools that only need the renderer.
pub struct NullHooks;
impl SceneHooks for NullHooks {}

/// External physics integration, stepped before every update hook.
pub trait PhysicsHook {
    fn step(&mut self, scene: &mut Scene, dt: f32);
}

/// Default physics: nothing moves unless the host moves it.
pub struct NullPhysics;
impl PhysicsHook for NullPhysics {
    fn step(&mut self, _scene: &mut Scene, _dt: f32) {}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LoopPhase {
    Created,
    Running,
    Ended,
}

/// The frame orchestrator.
pub struct GameLoop {
    backend: Box<dyn RenderBackend>,
    renderer: Renderer,
    pub scene: Scene,
    hooks: Box<dyn SceneHooks>,
    physics: Box<dyn PhysicsHook>,

    pub error_policy: ErrorPolicy,
    /// When non-empty, exactly these cameras draw, in this order. Empty
    /// means every enabled top-level camera in rendering order.
    pub camera_override: Vec<CameraKey>,
    pub screenshot_dir: PathBuf,

    listeners: [Option<AudioListener>; MAX_AUDIO_LISTENERS],
    draw_order: Vec<CameraKey>,
    phase: LoopPhase,
    paused: bool,
    pending_error: Option<EmberError>,
    screenshot_requested: bool,
    time: Time,
}

impl GameLoop {
    pub fn new(
        mut backend: Box<dyn RenderBackend>,
        size: SurfaceSize,
        settings: RendererSettings,
        hooks: Box<dyn SceneHooks>,
    ) -> Result<Self> {
        let renderer = Renderer::new(backend.as_mut(), size, settings)?;
        Ok(Self {
            backend,
            renderer,
            scene: Scene::new(),
            hooks,
            physics: Box::new(NullPhysics),
            error_policy: ErrorPolicy::default(),
            camera_override: Vec::new(),
            screenshot_dir: PathBuf::from("."),
            listeners: [None; MAX_AUDIO_LISTENERS],
            draw_order: Vec::new(),
            phase: LoopPhase::Created,
            paused: false,
            pending_error: None,
            screenshot_requested: false,
            time: Time::default(),
        })
    }

    pub fn set_physics(&mut self, physics: Box<dyn PhysicsHook>) {
        self.physics = physics;
    }

    // ─── Phases ───────────────────────────────────────────────────────────

    /// Runs `LoadContent` and `BeginRun`. Must be called exactly once,
    /// before the first tick.
    pub fn load_content(&mut self) -> Result<()> {
        if self.phase != LoopPhase::Created {
            return Err(EmberError::PreconditionViolation {
                component: "GameLoop",
                message: "load_content called twice".to_string(),
            });
        }
        self.hooks
            .load_content(&mut self.scene, self.backend.as_mut())?;
        self.hooks.begin_run(&mut self.scene);
        self.phase = LoopPhase::Running;
        info!("game loop running");
        Ok(())
    }

    /// One update + draw cycle. While paused only the pending error is
    /// reported; nothing advances.
    pub fn tick(&mut self, dt: f32, input: &Input) -> Result<()> {
        if self.phase != LoopPhase::Running {
            return Err(EmberError::PreconditionViolation {
                component: "GameLoop",
                message: "tick outside of the running phase".to_string(),
            });
        }
        if self.paused {
            return Ok(());
        }

        self.time.delta = dt;
        self.time.total += dt;
        self.time.frame += 1;

        self.physics.step(&mut self.scene, dt);
        // Scene update runs first: it drops last frame's debug primitives,
        // so anything the update hook queues survives until this draw.
        self.scene.update(dt);
        self.hooks.update(UpdateArgs {
            scene: &mut self.scene,
            input,
            time: self.time,
        });
        self.hooks.late_update(UpdateArgs {
            scene: &mut self.scene,
            input,
            time: self.time,
        });
        self.sync_audio_listeners(dt);

        match self.draw() {
            Ok(()) => Ok(()),
            Err(err) => match self.error_policy {
                ErrorPolicy::Halt => Err(err),
                ErrorPolicy::PauseAndReport => {
                    error!("draw failed, pausing: {err}");
                    self.hooks.on_error(&err);
                    self.pending_error = Some(err);
                    self.pause();
                    Ok(())
                }
            },
        }
    }

    /// Fills `draw_order`: the override list verbatim, or every enabled
    /// camera that is no other camera's slave, sorted by rendering order.
    fn collect_draw_order(&mut self) {
        self.draw_order.clear();
        if !self.camera_override.is_empty() {
            self.draw_order.extend_from_slice(&self.camera_override);
            return;
        }
        for (key, camera) in &self.scene.cameras {
            if !camera.enabled {
                continue;
            }
            let is_slave = self.scene.cameras.values().any(|c| c.slaves.contains(&key));
            if !is_slave {
                self.draw_order.push(key);
            }
        }
        self.draw_order
            .sort_by_key(|key| self.scene.cameras[*key].rendering_order);
    }

    fn draw(&mut self) -> Result<()> {
        self.collect_draw_order();
        if self.draw_order.is_empty() {
            // No camera yet; a frame with nothing to render is not an
            // error during startup.
            return Ok(());
        }
        self.hooks.before_draw(&mut self.scene, self.time);
        let order = std::mem::take(&mut self.draw_order);
        let rendered = self
            .renderer
            .render_frame(self.backend.as_mut(), &self.scene, &order);
        self.draw_order = order;
        rendered?;

        if self.screenshot_requested {
            self.screenshot_requested = false;
            let data = self.renderer.capture_frame(self.backend.as_mut())?;
            screenshot::save_screenshot(&data, &self.screenshot_dir)?;
        }

        self.hooks.after_draw(&mut self.scene, self.time);
        Ok(())
    }

    /// Runs `EndRun` and the unload callbacks. Idempotent.
    pub fn shutdown(&mut self) {
        if self.phase == LoopPhase::Running {
            self.hooks.end_run(&mut self.scene);
            self.hooks
                .unload_content(&mut self.scene, self.backend.as_mut());
            self.hooks.on_device_disposed();
            self.phase = LoopPhase::Ended;
            info!("game loop ended");
        }
    }

    // ─── Pause & Errors ───────────────────────────────────────────────────

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.hooks.on_pause();
        }
    }

    /// Clears any pending error and resumes ticking.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.pending_error = None;
            self.hooks.on_resume();
        }
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub const fn pending_error(&self) -> Option<&EmberError> {
        self.pending_error.as_ref()
    }

    // ─── Services ─────────────────────────────────────────────────────────

    /// Captures the next presented frame to `screenshot_dir`.
    pub fn request_screenshot(&mut self) {
        self.screenshot_requested = true;
    }

    /// Installs or clears an audio listener slot.
    pub fn set_audio_listener(
        &mut self,
        slot: usize,
        listener: Option<AudioListener>,
    ) -> Result<()> {
        if slot >= MAX_AUDIO_LISTENERS {
            return Err(EmberError::PreconditionViolation {
                component: "GameLoop",
                message: format!("audio listener slot {slot} out of range"),
            });
        }
        self.listeners[slot] = listener;
        Ok(())
    }

    #[must_use]
    pub const fn audio_listeners(&self) -> &[Option<AudioListener>; MAX_AUDIO_LISTENERS] {
        &self.listeners
    }

    /// Snaps camera-tracking listeners to their camera's pose; velocity
    /// is the positional delta over this update.
    fn sync_audio_listeners(&mut self, dt: f32) {
        for slot in self.listeners.iter_mut().flatten() {
            let Some(camera) = slot
                .tracked_camera
                .and_then(|key| self.scene.cameras.get(key))
            else {
                continue;
            };
            let previous = slot.position;
            slot.position = camera.position;
            slot.forward = camera.forward();
            slot.up = camera.up;
            slot.velocity = if dt > 0.0 {
                (slot.position - previous) / dt
            } else {
                Vec3::ZERO
            };
        }
    }

    pub fn resize(&mut self, size: SurfaceSize) -> Result<()> {
        self.renderer.resize(self.backend.as_mut(), size)?;
        self.hooks.on_device_reset(&mut self.scene, size);
        for camera in self.scene.cameras.values_mut() {
            camera.aspect = size.width as f32 / size.height.max(1) as f32;
            camera.update_matrices();
        }
        self.hooks.on_resize(&mut self.scene, size);
        Ok(())
    }

    #[must_use]
    pub const fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    #[must_use]
    pub const fn time(&self) -> Time {
        self.time
    }

    pub fn backend_mut(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }
}
