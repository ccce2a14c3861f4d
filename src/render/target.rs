//! Render Targets
//!
//! A [`RenderTarget`] wraps a backend surface with the two pieces of frame
//! state the pipeline cares about: whether the target is currently being
//! written (active) and whether it has been written and resolved since it
//! was last cleared. Reading a target that was never taken through a full
//! enable/disable cycle is a sequencing bug and surfaces as
//! [`EmberError::TargetNotResolved`].

use crate::errors::{EmberError, Result};
use crate::gfx::{Antialiasing, DepthFormat, SurfaceDescriptor, SurfaceFormat, SurfaceId, SurfaceSize};

/// Pool matching key. Matching is exact equality over every field; the
/// pool never hands out a nearest fit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TargetKey {
    pub size: SurfaceSize,
    pub format: SurfaceFormat,
    pub depth_format: Option<DepthFormat>,
    pub antialiasing: Antialiasing,
    pub mipmap: bool,
}

impl TargetKey {
    #[must_use]
    pub const fn new(size: SurfaceSize, format: SurfaceFormat) -> Self {
        Self {
            size,
            format,
            depth_format: None,
            antialiasing: Antialiasing::Off,
            mipmap: false,
        }
    }

    #[must_use]
    pub const fn with_depth(mut self, depth: DepthFormat) -> Self {
        self.depth_format = Some(depth);
        self
    }

    #[must_use]
    pub const fn with_antialiasing(mut self, aa: Antialiasing) -> Self {
        self.antialiasing = aa;
        self
    }

    #[must_use]
    pub const fn with_mipmap(mut self) -> Self {
        self.mipmap = true;
        self
    }

    pub(crate) const fn to_descriptor(self, label: &'static str) -> SurfaceDescriptor {
        SurfaceDescriptor {
            size: self.size,
            format: self.format,
            depth_format: self.depth_format,
            antialiasing: self.antialiasing,
            mipmap: self.mipmap,
            label,
        }
    }
}

/// A pooled or camera-owned offscreen render target.
#[derive(Debug)]
pub struct RenderTarget {
    surface: SurfaceId,
    key: TargetKey,
    active: bool,
    resolved: bool,
}

impl RenderTarget {
    pub(crate) const fn new(surface: SurfaceId, key: TargetKey) -> Self {
        Self {
            surface,
            key,
            active: false,
            resolved: false,
        }
    }

    #[must_use]
    pub const fn key(&self) -> TargetKey {
        self.key
    }

    #[must_use]
    pub const fn size(&self) -> SurfaceSize {
        self.key.size
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the target holds readable contents (written and resolved).
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// The surface, for use as a render attachment. Valid while active.
    #[must_use]
    pub const fn attachment(&self) -> SurfaceId {
        self.surface
    }

    /// The surface, for sampling or readback. Requires a completed
    /// write/resolve cycle.
    pub fn resource(&self) -> Result<SurfaceId> {
        if self.resolved {
            Ok(self.surface)
        } else {
            Err(EmberError::TargetNotResolved("RenderTarget::resource"))
        }
    }

    pub(crate) fn mark_enabled(&mut self, label: &'static str) -> Result<()> {
        if self.active {
            return Err(EmberError::TargetAlreadyActive(label));
        }
        self.active = true;
        self.resolved = false;
        Ok(())
    }

    pub(crate) fn mark_disabled(&mut self) {
        self.active = false;
        self.resolved = true;
    }

    /// Drops any previous contents, e.g. after the pool recycles the
    /// target to a new owner.
    pub(crate) fn invalidate(&mut self) {
        self.resolved = false;
    }
}
