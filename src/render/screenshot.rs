//! Screenshots
//!
//! Saves a captured frame as `Screenshot-NNNN.jpg` in a target directory,
//! picking NNNN as one past the highest existing index so files are never
//! overwritten across runs.

use std::path::{Path, PathBuf};

use log::info;

use crate::errors::Result;
use crate::gfx::SurfaceData;

const PREFIX: &str = "Screenshot-";
const EXTENSION: &str = ".jpg";

/// Next free screenshot path in `dir`. Non-matching filenames and
/// unreadable entries are skipped, not errors.
#[must_use]
pub fn next_screenshot_path(dir: &Path) -> PathBuf {
    let mut highest = 0u32;
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(index) = name
                .strip_prefix(PREFIX)
                .and_then(|rest| rest.strip_suffix(EXTENSION))
                .and_then(|digits| (digits.len() == 4).then(|| digits.parse::<u32>().ok()))
                .flatten()
            {
                highest = highest.max(index);
            }
        }
    }
    dir.join(format!("{PREFIX}{:04}{EXTENSION}", highest + 1))
}

/// Encodes RGBA8 pixels as JPEG at the next free index.
pub fn save_screenshot(data: &SurfaceData, dir: &Path) -> Result<PathBuf> {
    let path = next_screenshot_path(dir);
    let image = image::RgbaImage::from_raw(data.size.width, data.size.height, data.rgba.clone())
        .ok_or_else(|| {
            crate::errors::EmberError::ImageEncodeError(
                "pixel buffer does not match surface dimensions".to_string(),
            )
        })?;
    // JPEG has no alpha channel.
    let rgb = image::DynamicImage::ImageRgba8(image).to_rgb8();
    rgb.save(&path)?;
    info!("saved screenshot {}", path.display());
    Ok(path)
}
