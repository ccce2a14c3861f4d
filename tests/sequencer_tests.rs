//! Pass Sequencer Tests
//!
//! Tests for:
//! - Pass ordering and counts through a full camera render
//! - Technique dispatch per pipeline stage
//! - Pool hygiene: everything fetched is released by frame end
//! - Shadow map caching, recycling and periodic flushing
//! - Precondition failures (dead camera, dead destination)

use glam::Vec3;

use ember::errors::EmberError;
use ember::gfx::{SurfaceFormat, SurfaceSize, Technique, Viewport};
use ember::render::{
    FrameContext, FrameStats, GBufferBucket, Material, MaterialBucket, PassSequencer,
    RenderTargetPool, TargetKey,
};
use ember::scene::{Camera, CameraKey, Light, ModelRenderer, PartInstance, Scene};

mod common;
use common::RecordingBackend;

struct Rig {
    backend: RecordingBackend,
    pool: RenderTargetPool,
    stats: FrameStats,
    sequencer: PassSequencer,
    destination: ember::render::TargetId,
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
            destination,
        }
    }

    fn render(&mut self, scene: &Scene, camera: CameraKey) -> ember::errors::Result<()> {
        let mut ctx = FrameContext::new(&mut self.backend, &mut self.pool, &mut self.stats);
        self.sequencer.render_camera(&mut ctx, scene, camera, self.destination)
    }
}

fn simple_scene() -> (Scene, CameraKey) {
    let mut scene = Scene::new();
    let mut camera = Camera::new(1.0);
    camera.position = Vec3::new(0.0, 0.0, 5.0);
    camera.target = Vec3::ZERO;
    camera.update_matrices();
    let key = scene.add_camera(camera);
    scene.add_model(ModelRenderer::new(
        ember::gfx::MeshId::default(),
        vec![PartInstance {
            part: 0,
            material: Material::blinn_phong(Vec3::ONE),
        }],
    ));
    (scene, key)
}

// ============================================================================
// Pipeline Shape
// ============================================================================

#[test]
fn full_frame_runs_the_expected_passes() {
    let (mut scene, camera) = simple_scene();
    scene.add_light(Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();

    // G-Buffer, downsample, light accumulation, scene, post.
    assert_eq!(rig.stats.passes, 5);
    assert_eq!(rig.backend.technique_batches(Technique::GBufferSimple), 1);
    assert_eq!(rig.backend.technique_batches(Technique::DownsampleGBuffer), 1);
    assert_eq!(rig.backend.technique_batches(Technique::DirectionalLight), 1);
    assert_eq!(rig.backend.technique_batches(Technique::DepthReconstruct), 1);
    assert_eq!(rig.backend.technique_batches(Technique::BlinnPhong), 1);
    assert_eq!(rig.backend.technique_batches(Technique::PostProcess), 1);
    assert_eq!(rig.stats.lights_drawn, 1);
}

#[test]
fn bucket_stats_mirror_the_classification() {
    let (scene, camera) = simple_scene();
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();

    assert_eq!(rig.stats.gbuffer_buckets[GBufferBucket::SimpleOpaque.index()], 1);
    assert_eq!(rig.stats.material_buckets[MaterialBucket::BlinnPhong.index()], 1);
    assert_eq!(rig.stats.gbuffer_buckets.iter().sum::<u32>(), 1);
}

#[test]
fn unchanged_scene_classifies_identically_frame_over_frame() {
    let (mut scene, camera) = simple_scene();
    scene.add_light(Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();
    let first_gbuffer = rig.stats.gbuffer_buckets;
    let first_material = rig.stats.material_buckets;

    rig.stats.begin_frame(2);
    rig.render(&scene, camera).unwrap();

    assert_eq!(
        rig.stats.gbuffer_buckets, first_gbuffer,
        "classification must be deterministic for an unchanged scene"
    );
    assert_eq!(rig.stats.material_buckets, first_material);
}

#[test]
fn post_processing_reads_depth_and_scene_color() {
    let (scene, camera) = simple_scene();
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();

    let post = rig
        .backend
        .draws
        .iter()
        .find(|d| d.technique == Technique::PostProcess)
        .expect("post-process batch");
    // Slot order: G-Buffer depth, G-Buffer normals, scene color.
    assert_eq!(post.inputs.len(), 3);
    assert_ne!(post.inputs[0], post.inputs[2], "depth and scene color are distinct surfaces");
    assert_ne!(post.inputs[1], post.inputs[2]);
}

#[test]
fn ambient_occlusion_renders_only_for_ambient_lights() {
    let (mut scene, camera) = simple_scene();
    let mut rig = Rig::new();
    rig.render(&scene, camera).unwrap();
    assert_eq!(rig.backend.technique_batches(Technique::AmbientOcclusion), 0);

    scene.add_light(Light::new_ambient(Vec3::ONE, 0.2));
    rig.render(&scene, camera).unwrap();
    assert_eq!(rig.backend.technique_batches(Technique::AmbientOcclusion), 1);
    assert_eq!(rig.backend.technique_batches(Technique::AmbientLight), 1);
}

#[test]
fn disabled_post_processing_blits_the_scene_color() {
    let (mut scene, camera) = simple_scene();
    for cam in scene.cameras.values_mut() {
        cam.post_process = false;
    }
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();

    assert_eq!(rig.backend.technique_batches(Technique::PostProcess), 0);
    assert_eq!(rig.backend.blits.len(), 1);
    assert!(!rig.backend.blits[0].to_back_buffer);
}

#[test]
fn overlay_quads_draw_only_when_queued() {
    let (mut scene, camera) = simple_scene();
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();
    assert_eq!(rig.backend.technique_batches(Technique::GammaOverlay), 0);

    scene.draw_overlay_quad(Viewport::new(0.0, 0.0, 0.5, 0.25), Vec3::X, 0.5);
    scene.draw_overlay_quad(Viewport::FULL, Vec3::ONE, 0.1);
    rig.render(&scene, camera).unwrap();

    assert_eq!(rig.backend.technique_batches(Technique::GammaOverlay), 2);
    assert_eq!(
        rig.backend.draws.last().unwrap().technique,
        Technique::GammaOverlay,
        "overlays draw last, on the composed destination"
    );
}

#[test]
fn empty_scene_still_renders_a_complete_frame() {
    let mut scene = Scene::new();
    let camera = scene.add_camera(Camera::new(1.0));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();

    assert_eq!(rig.stats.passes, 5);
    assert_eq!(rig.stats.gbuffer_buckets.iter().sum::<u32>(), 0);
}

// ============================================================================
// Pool Hygiene
// ============================================================================

#[test]
fn every_intermediate_target_is_released_by_frame_end() {
    let (mut scene, camera) = simple_scene();
    scene.add_light(Light::new_ambient(Vec3::ONE, 0.2));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();
    assert_eq!(rig.pool.in_use_count(), 0, "a leak here grows the pool every frame");
}

#[test]
fn steady_state_frames_allocate_nothing() {
    let (mut scene, camera) = simple_scene();
    scene.add_light(Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();
    let after_first = rig.backend.surfaces_created;
    for _ in 0..5 {
        rig.render(&scene, camera).unwrap();
    }
    assert_eq!(
        rig.backend.surfaces_created, after_first,
        "every later frame must recycle the first frame's targets"
    );
}

// ============================================================================
// Shadow Maps
// ============================================================================

fn shadow_scene(light: Light) -> (Scene, CameraKey) {
    let (mut scene, camera) = simple_scene();
    let mut light = light;
    light.cast_shadows = true;
    scene.add_light(light);
    (scene, camera)
}

#[test]
fn directional_shadow_renders_one_face_and_stays_cached() {
    let (scene, camera) =
        shadow_scene(Light::new_directional(Vec3::ONE, 1.0, Vec3::new(-1.0, -1.0, 0.0)));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();

    assert_eq!(rig.backend.technique_batches(Technique::ShadowDepth), 1);
    assert_eq!(rig.stats.shadow_maps_rendered, 1);
    assert_eq!(rig.sequencer.shadow_map_count(), 1);
    assert_eq!(rig.pool.in_use_count(), 1, "the cached map stays fetched");
}

#[test]
fn point_light_renders_six_cube_faces_into_one_atlas() {
    let (scene, camera) = shadow_scene(Light::new_point(Vec3::ONE, 1.0, Vec3::ZERO, 10.0));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();

    assert_eq!(rig.backend.technique_batches(Technique::ShadowDepthCube), 6);
    assert_eq!(rig.stats.shadow_maps_rendered, 1, "six faces, one map");
    assert_eq!(rig.sequencer.shadow_map_count(), 1);
}

#[test]
fn shadow_map_is_reused_across_frames() {
    let (scene, camera) =
        shadow_scene(Light::new_spot(Vec3::ONE, 1.0, Vec3::Y, Vec3::NEG_Y, 10.0, 0.9, 0.8));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();
    let created = rig.backend.surfaces_created;
    rig.render(&scene, camera).unwrap();

    assert_eq!(rig.backend.surfaces_created, created);
    assert_eq!(rig.sequencer.shadow_map_count(), 1);
}

#[test]
fn shadow_cache_flush_interval_does_not_grow_the_pool() {
    let (scene, camera) =
        shadow_scene(Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();
    let arena = rig.pool.len();
    // Cross the periodic flush at least once.
    for _ in 0..40 {
        rig.render(&scene, camera).unwrap();
    }
    assert_eq!(rig.pool.len(), arena, "flushed maps must recycle, not reallocate");
    assert_eq!(rig.sequencer.shadow_map_count(), 1);
}

#[test]
fn reset_caches_returns_shadow_maps_to_the_pool() {
    let (scene, camera) =
        shadow_scene(Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();
    let mut ctx = FrameContext::new(&mut rig.backend, &mut rig.pool, &mut rig.stats);
    rig.sequencer.reset_caches(&mut ctx);
    drop(ctx);

    assert_eq!(rig.sequencer.shadow_map_count(), 0);
    assert_eq!(rig.pool.in_use_count(), 0);
}

#[test]
fn ambient_lights_never_render_shadow_maps() {
    let (scene, camera) = shadow_scene(Light::new_ambient(Vec3::ONE, 0.2));
    let mut rig = Rig::new();

    rig.render(&scene, camera).unwrap();
    assert_eq!(rig.sequencer.shadow_map_count(), 0);
}

// ============================================================================
// Preconditions
// ============================================================================

#[test]
fn dead_camera_key_fails_fast() {
    let (mut scene, camera) = simple_scene();
    scene.cameras.remove(camera);
    let mut rig = Rig::new();

    let err = rig.render(&scene, camera).unwrap_err();
    assert!(matches!(err, EmberError::PreconditionViolation { .. }));
}

#[test]
fn stale_destination_fails_fast() {
    let (scene, camera) = simple_scene();
    let mut rig = Rig::new();
    rig.pool.clear(&mut rig.backend);

    let err = rig.render(&scene, camera).unwrap_err();
    assert!(matches!(err, EmberError::PreconditionViolation { .. }));
}
