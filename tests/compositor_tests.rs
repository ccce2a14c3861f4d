//! Camera Compositor Tests
//!
//! Tests for:
//! - The single-camera fast path (zero pool fetches, zero blits)
//! - Split-screen partials: one fetch and one placing blit per camera
//! - Rendering-order merge of master and slaves
//! - Disabled master / disabled slave handling
//! - Partial target recycling across frames

use ember::errors::EmberError;
use ember::gfx::{SurfaceFormat, SurfaceSize, Viewport};
use ember::render::{
    CameraCompositor, FrameContext, FrameStats, PassSequencer, RenderTargetPool, TargetId,
    TargetKey,
};
use ember::scene::{Camera, CameraKey, Scene};

mod common;
use common::RecordingBackend;

struct Rig {
    backend: RecordingBackend,
    pool: RenderTargetPool,
    stats: FrameStats,
    sequencer: PassSequencer,
    compositor: CameraCompositor,
    destination: TargetId,
}

impl Rig {
    fn new() -> Self {
        common::init_logging();
        let mut backend = RecordingBackend::new();
        let mut pool = RenderTargetPool::new();
        let destination = pool
            .create_owned(
                &mut backend,
                TargetKey::new(SurfaceSize::new(64, 64), SurfaceFormat::Rgba8),
                "Destination",
            )
            .unwrap();
        Self {
            backend,
            pool,
            stats: FrameStats::default(),
            sequencer: PassSequencer::new(),
            compositor: CameraCompositor::new(),
            destination,
        }
    }

    fn render(&mut self, scene: &Scene, master: CameraKey) -> ember::errors::Result<()> {
        self.stats.begin_frame(self.stats.frame_index + 1);
        let mut ctx = FrameContext::new(&mut self.backend, &mut self.pool, &mut self.stats);
        self.compositor
            .render(&mut ctx, &mut self.sequencer, scene, master, self.destination)
    }
}

fn camera_with_viewport(viewport: Viewport, order: i32) -> Camera {
    let mut camera = Camera::new(1.0);
    camera.viewport = viewport;
    camera.rendering_order = order;
    camera
}

/// Left half / right half split.
fn split_scene(master_order: i32, slave_order: i32) -> (Scene, CameraKey) {
    let mut scene = Scene::new();
    let slave = scene.add_camera(camera_with_viewport(
        Viewport::new(0.5, 0.0, 0.5, 1.0),
        slave_order,
    ));
    let master_key = scene.add_camera(camera_with_viewport(
        Viewport::new(0.0, 0.0, 0.5, 1.0),
        master_order,
    ));
    scene.cameras[master_key].slaves.push(slave);
    (scene, master_key)
}

// ============================================================================
// Fast Path
// ============================================================================

#[test]
fn single_fullscreen_camera_takes_the_fast_path() {
    let mut scene = Scene::new();
    let master = scene.add_camera(Camera::new(1.0));
    let mut rig = Rig::new();

    rig.render(&scene, master).unwrap();

    assert_eq!(rig.stats.partial_target_fetches, 0);
    assert!(rig.backend.blits.is_empty());
    assert!(rig.stats.passes > 0, "the camera still rendered");
}

#[test]
fn disabled_slaves_do_not_break_the_fast_path() {
    let mut scene = Scene::new();
    let mut slave = camera_with_viewport(Viewport::new(0.5, 0.0, 0.5, 1.0), 1);
    slave.enabled = false;
    let slave_key = scene.add_camera(slave);
    let master = scene.add_camera(Camera::new(1.0));
    scene.cameras[master].slaves.push(slave_key);
    let mut rig = Rig::new();

    rig.render(&scene, master).unwrap();
    assert_eq!(rig.stats.partial_target_fetches, 0);
}

#[test]
fn partial_viewport_alone_forces_composition() {
    let mut scene = Scene::new();
    let master = scene.add_camera(camera_with_viewport(Viewport::new(0.25, 0.25, 0.5, 0.5), 0));
    let mut rig = Rig::new();

    rig.render(&scene, master).unwrap();

    assert_eq!(rig.stats.partial_target_fetches, 1);
    assert_eq!(rig.backend.blits.len(), 1);
    let rect = rig.backend.blits[0].viewport.unwrap();
    assert_eq!((rect.x, rect.y, rect.width, rect.height), (16, 16, 32, 32));
}

// ============================================================================
// Split Screen
// ============================================================================

#[test]
fn split_screen_fetches_one_partial_per_camera() {
    let (scene, master) = split_scene(0, 0);
    let mut rig = Rig::new();

    rig.render(&scene, master).unwrap();

    assert_eq!(rig.stats.partial_target_fetches, 2);
    assert_eq!(rig.backend.blits.len(), 2);
    assert_eq!(rig.pool.in_use_count(), 0, "partials must be released");
}

#[test]
fn equal_order_places_the_master_first() {
    let (scene, master) = split_scene(0, 0);
    let mut rig = Rig::new();

    rig.render(&scene, master).unwrap();

    // Master owns the left half, so its blit lands at x = 0.
    assert_eq!(rig.backend.blits[0].viewport.unwrap().x, 0);
    assert_eq!(rig.backend.blits[1].viewport.unwrap().x, 32);
}

#[test]
fn lower_order_slave_renders_before_the_master() {
    let (scene, master) = split_scene(0, -1);
    let mut rig = Rig::new();

    rig.render(&scene, master).unwrap();

    // The slave owns the right half and blits first.
    assert_eq!(rig.backend.blits[0].viewport.unwrap().x, 32);
    assert_eq!(rig.backend.blits[1].viewport.unwrap().x, 0);
}

#[test]
fn composition_marks_the_destination_readable() {
    let (scene, master) = split_scene(0, 0);
    let mut rig = Rig::new();

    rig.stats.begin_frame(1);
    let mut ctx = FrameContext::new(&mut rig.backend, &mut rig.pool, &mut rig.stats);
    rig.compositor
        .render(&mut ctx, &mut rig.sequencer, &scene, master, rig.destination)
        .unwrap();
    assert!(ctx.resource(rig.destination).is_ok());
}

#[test]
fn partials_are_recycled_across_frames() {
    let (scene, master) = split_scene(0, 0);
    let mut rig = Rig::new();

    rig.render(&scene, master).unwrap();
    let created = rig.backend.surfaces_created;
    rig.render(&scene, master).unwrap();

    assert_eq!(rig.backend.surfaces_created, created);
    assert_eq!(rig.stats.partial_target_fetches, 2, "stats reset per frame");
}

// ============================================================================
// Degenerate Cases
// ============================================================================

#[test]
fn disabled_master_skips_the_frame() {
    let mut scene = Scene::new();
    let mut camera = Camera::new(1.0);
    camera.enabled = false;
    let master = scene.add_camera(camera);
    let mut rig = Rig::new();

    rig.render(&scene, master).unwrap();
    assert_eq!(rig.stats.passes, 0);
}

#[test]
fn dead_master_key_fails_fast() {
    let mut scene = Scene::new();
    let master = scene.add_camera(Camera::new(1.0));
    scene.cameras.remove(master);
    let mut rig = Rig::new();

    let err = rig.render(&scene, master).unwrap_err();
    assert!(matches!(err, EmberError::PreconditionViolation { .. }));
}

#[test]
fn failed_camera_render_still_releases_its_partial() {
    let (scene, master) = split_scene(0, 0);

    // A pool this small fails partway through the first camera's render,
    // after its partial target was already fetched.
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::with_capacity(4);
    let destination = pool
        .create_owned(
            &mut backend,
            TargetKey::new(SurfaceSize::new(64, 64), SurfaceFormat::Rgba8),
            "Destination",
        )
        .unwrap();
    let mut stats = FrameStats::default();
    let mut sequencer = PassSequencer::new();
    let mut compositor = CameraCompositor::new();

    let mut ctx = FrameContext::new(&mut backend, &mut pool, &mut stats);
    let err = compositor
        .render(&mut ctx, &mut sequencer, &scene, master, destination)
        .unwrap_err();
    assert!(matches!(err, EmberError::PoolCapacityExceeded { .. }));

    // The partial went back to the pool despite the failure: fetching its
    // key again recycles instead of tripping the capacity ceiling.
    let partial_key = TargetKey::new(SurfaceSize::new(32, 64), SurfaceFormat::Rgba8);
    assert!(ctx.pool.fetch(ctx.backend, partial_key, "Again").is_ok());
}
