//! Render Target Pool Tests
//!
//! Tests for:
//! - Exact-key matching and recycling of pooled targets
//! - Key fields (size, format, depth, antialiasing) that must never match
//! - Tolerant release of foreign, stale and double-released handles
//! - Capacity ceiling
//! - Owned (non-recycled) targets
//! - Multi-target bindings and member theft

use ember::errors::EmberError;
use ember::gfx::{Antialiasing, DepthFormat, SurfaceFormat, SurfaceSize};
use ember::render::{RenderTargetPool, TargetKey};

mod common;
use common::RecordingBackend;

fn key(width: u32, height: u32) -> TargetKey {
    TargetKey::new(SurfaceSize::new(width, height), SurfaceFormat::Rgba16Float)
}

// ============================================================================
// Fetch & Recycle
// ============================================================================

#[test]
fn released_target_is_recycled_on_exact_key() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let first = pool.fetch(&mut backend, key(64, 64), "A").unwrap();
    pool.release(first);
    let second = pool.fetch(&mut backend, key(64, 64), "B").unwrap();

    assert_eq!(first, second, "same key must recycle the same entry");
    assert_eq!(backend.surfaces_created, 1);
    assert_eq!(pool.len(), 1);
}

#[test]
fn in_use_target_is_never_recycled() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let first = pool.fetch(&mut backend, key(64, 64), "A").unwrap();
    let second = pool.fetch(&mut backend, key(64, 64), "B").unwrap();

    assert_ne!(first, second);
    assert_eq!(backend.surfaces_created, 2);
}

#[test]
fn differing_size_creates_a_new_target() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let first = pool.fetch(&mut backend, key(64, 64), "A").unwrap();
    pool.release(first);
    pool.fetch(&mut backend, key(128, 64), "B").unwrap();

    assert_eq!(backend.surfaces_created, 2, "size is part of the key");
}

#[test]
fn differing_depth_format_creates_a_new_target() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let first = pool
        .fetch(&mut backend, key(64, 64).with_depth(DepthFormat::Depth24Stencil8), "A")
        .unwrap();
    pool.release(first);
    pool.fetch(&mut backend, key(64, 64), "B").unwrap();

    assert_eq!(backend.surfaces_created, 2, "depth format is part of the key");
}

#[test]
fn differing_antialiasing_creates_a_new_target() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let first = pool
        .fetch(&mut backend, key(64, 64).with_antialiasing(Antialiasing::Msaa4x), "A")
        .unwrap();
    pool.release(first);
    pool.fetch(&mut backend, key(64, 64), "B").unwrap();

    assert_eq!(backend.surfaces_created, 2, "sample count is part of the key");
}

#[test]
fn in_use_count_tracks_fetch_and_release() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let a = pool.fetch(&mut backend, key(64, 64), "A").unwrap();
    let b = pool.fetch(&mut backend, key(32, 32), "B").unwrap();
    assert_eq!(pool.in_use_count(), 2);

    pool.release(a);
    assert_eq!(pool.in_use_count(), 1);
    pool.release(b);
    assert_eq!(pool.in_use_count(), 0);
    assert_eq!(pool.len(), 2, "released targets stay in the arena");
}

// ============================================================================
// Tolerant Release
// ============================================================================

#[test]
fn double_release_is_a_no_op() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let id = pool.fetch(&mut backend, key(64, 64), "A").unwrap();
    pool.release(id);
    pool.release(id);

    assert_eq!(pool.in_use_count(), 0);
}

#[test]
fn release_of_stale_handle_after_clear_is_a_no_op() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let id = pool.fetch(&mut backend, key(64, 64), "A").unwrap();
    pool.clear(&mut backend);
    pool.release(id);

    assert!(pool.is_empty());
}

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn pool_refuses_to_grow_past_capacity() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::with_capacity(2);

    pool.fetch(&mut backend, key(1, 1), "A").unwrap();
    pool.fetch(&mut backend, key(2, 2), "B").unwrap();
    let err = pool.fetch(&mut backend, key(3, 3), "C").unwrap_err();

    assert!(
        matches!(err, EmberError::PoolCapacityExceeded { capacity: 2 }),
        "expected capacity error, got {err}"
    );
}

#[test]
fn surface_creation_failure_propagates() {
    let mut backend = RecordingBackend::new();
    backend.fail_surface_creation = true;
    let mut pool = RenderTargetPool::new();

    let err = pool.fetch(&mut backend, key(64, 64), "A").unwrap_err();
    assert!(matches!(err, EmberError::SurfaceCreationFailed(_)));
}

// ============================================================================
// Owned Targets
// ============================================================================

#[test]
fn owned_targets_are_never_matched_by_fetch() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let owned = pool.create_owned(&mut backend, key(64, 64), "Owned").unwrap();
    let fetched = pool.fetch(&mut backend, key(64, 64), "Fetched").unwrap();

    assert_ne!(owned, fetched);
    assert_eq!(backend.surfaces_created, 2);
}

#[test]
fn destroy_owned_frees_the_surface_once() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let owned = pool.create_owned(&mut backend, key(64, 64), "Owned").unwrap();
    pool.destroy_owned(&mut backend, owned);
    pool.destroy_owned(&mut backend, owned);

    assert_eq!(backend.surfaces_destroyed, 1);
}

#[test]
fn destroy_owned_ignores_pooled_handles() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let pooled = pool.fetch(&mut backend, key(64, 64), "A").unwrap();
    pool.release(pooled);
    pool.destroy_owned(&mut backend, pooled);

    assert_eq!(backend.surfaces_destroyed, 0);
    assert_eq!(
        pool.fetch(&mut backend, key(64, 64), "B").unwrap(),
        pooled,
        "pooled target must still be recyclable"
    );
}

// ============================================================================
// Multi-Target Bindings
// ============================================================================

fn mrt_key() -> TargetKey {
    TargetKey::new(SurfaceSize::new(64, 64), SurfaceFormat::R32Float)
        .with_depth(DepthFormat::Depth24Stencil8)
}

#[test]
fn binding_creates_first_plus_extras() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let binding = pool
        .fetch_binding(&mut backend, mrt_key(), &[SurfaceFormat::Rgba16Float], "MRT")
        .unwrap();

    assert_eq!(backend.surfaces_created, 2);
    assert_eq!(pool.binding_targets(binding).unwrap().len(), 2);
    assert_eq!(pool.in_use_count(), 2);
}

#[test]
fn released_binding_is_recycled() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let first = pool
        .fetch_binding(&mut backend, mrt_key(), &[SurfaceFormat::Rgba16Float], "A")
        .unwrap();
    pool.release_binding(first);
    let second = pool
        .fetch_binding(&mut backend, mrt_key(), &[SurfaceFormat::Rgba16Float], "B")
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.surfaces_created, 2, "recycle must not allocate");
}

#[test]
fn binding_with_different_extras_never_matches() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let first = pool
        .fetch_binding(&mut backend, mrt_key(), &[SurfaceFormat::Rgba16Float], "A")
        .unwrap();
    pool.release_binding(first);
    let second = pool
        .fetch_binding(&mut backend, mrt_key(), &[SurfaceFormat::Rgba8], "B")
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(backend.surfaces_created, 4);
}

#[test]
fn binding_with_stolen_member_is_skipped() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    let binding = pool
        .fetch_binding(&mut backend, mrt_key(), &[SurfaceFormat::Rgba16Float], "A")
        .unwrap();
    pool.release_binding(binding);

    // A single-target fetch grabs the binding's first member.
    let stolen = pool.fetch(&mut backend, mrt_key(), "Thief").unwrap();
    assert!(pool.binding_targets(binding).unwrap().contains(&stolen));

    let fresh = pool
        .fetch_binding(&mut backend, mrt_key(), &[SurfaceFormat::Rgba16Float], "B")
        .unwrap();
    assert_ne!(binding, fresh, "burned binding must not be handed out");
    assert_eq!(backend.surfaces_created, 4);

    // Once the thief releases, the original binding is matchable again.
    pool.release(stolen);
    pool.release_binding(fresh);
    let again = pool
        .fetch_binding(&mut backend, mrt_key(), &[SurfaceFormat::Rgba16Float], "C")
        .unwrap();
    assert_eq!(again, binding);
}

#[test]
fn clear_destroys_every_surface() {
    let mut backend = RecordingBackend::new();
    let mut pool = RenderTargetPool::new();

    pool.fetch(&mut backend, key(64, 64), "A").unwrap();
    pool.fetch_binding(&mut backend, mrt_key(), &[SurfaceFormat::Rgba16Float], "B")
        .unwrap();
    pool.clear(&mut backend);

    assert!(pool.is_empty());
    assert_eq!(backend.surfaces_destroyed, 3);
    assert_eq!(backend.live_surfaces(), 0);
}
