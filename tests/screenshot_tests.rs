//! Screenshot Tests
//!
//! Tests for:
//! - Index selection: one past the highest existing `Screenshot-NNNN.jpg`
//! - Non-matching filenames are ignored
//! - JPEG encoding of captured RGBA data

use std::fs::File;
use std::path::Path;

use ember::gfx::{SurfaceData, SurfaceSize};
use ember::render::screenshot::{next_screenshot_path, save_screenshot};

fn touch(dir: &Path, name: &str) {
    File::create(dir.join(name)).unwrap();
}

#[test]
fn empty_directory_starts_at_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = next_screenshot_path(dir.path());
    assert_eq!(path.file_name().unwrap(), "Screenshot-0001.jpg");
}

#[test]
fn next_index_is_one_past_the_highest() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "Screenshot-0001.jpg");
    touch(dir.path(), "Screenshot-0007.jpg");
    touch(dir.path(), "Screenshot-0003.jpg");

    let path = next_screenshot_path(dir.path());
    assert_eq!(path.file_name().unwrap(), "Screenshot-0008.jpg");
}

#[test]
fn gaps_are_not_refilled() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "Screenshot-0005.jpg");

    let path = next_screenshot_path(dir.path());
    assert_eq!(path.file_name().unwrap(), "Screenshot-0006.jpg");
}

#[test]
fn non_matching_names_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "Screenshot-12.jpg"); // not four digits
    touch(dir.path(), "Screenshot-abcd.jpg"); // not a number
    touch(dir.path(), "Capture-0009.jpg"); // wrong prefix
    touch(dir.path(), "Screenshot-0009.png"); // wrong extension
    touch(dir.path(), "Screenshot-0002.jpg");

    let path = next_screenshot_path(dir.path());
    assert_eq!(path.file_name().unwrap(), "Screenshot-0003.jpg");
}

#[test]
fn missing_directory_still_yields_a_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let path = next_screenshot_path(&missing);
    assert_eq!(path.file_name().unwrap(), "Screenshot-0001.jpg");
}

// ============================================================================
// Encoding
// ============================================================================

fn solid_frame(width: u32, height: u32) -> SurfaceData {
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        rgba.extend_from_slice(&[200, 64, 32, 255]);
    }
    SurfaceData {
        size: SurfaceSize::new(width, height),
        rgba,
    }
}

#[test]
fn save_writes_a_jpeg_at_the_next_index() {
    let dir = tempfile::tempdir().unwrap();
    let data = solid_frame(8, 8);

    let first = save_screenshot(&data, dir.path()).unwrap();
    let second = save_screenshot(&data, dir.path()).unwrap();

    assert_eq!(first.file_name().unwrap(), "Screenshot-0001.jpg");
    assert_eq!(second.file_name().unwrap(), "Screenshot-0002.jpg");
    assert!(first.exists());
    assert!(std::fs::metadata(&second).unwrap().len() > 0);
}

#[test]
fn mismatched_pixel_buffer_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let data = SurfaceData {
        size: SurfaceSize::new(8, 8),
        rgba: vec![0; 16], // far too small for 8x8
    };
    assert!(save_screenshot(&data, dir.path()).is_err());
}
