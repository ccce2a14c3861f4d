//! Render Target Pool
//!
//! Central allocator for offscreen render targets. Passes fetch a target
//! by exact [`TargetKey`] match, write it, and release it back at the end
//! of the pass; the texture itself survives and is recycled by the next
//! fetch with the same key. On a typical frame every fetch after the first
//! few is a recycle, so the steady state performs zero GPU allocations.
//!
//! # Matching
//!
//! Matching is a linear scan with exact equality over the full key — size,
//! format, depth format, antialiasing and mipmap. The pool stays small
//! (tens of entries) because keys are shared aggressively, so a scan beats
//! any index.
//!
//! # Ownership
//!
//! The flag protocol is cooperative: `fetch` marks a target in use,
//! `release` clears the mark. Nothing stops a caller from writing to a
//! target it has released; the protocol relies on passes behaving, which
//! they do because every fetch/release pair lives inside one pass function.
//!
//! Releasing a target that is not pooled here (a camera-owned target or a
//! stale handle from before a [`clear`](RenderTargetPool::clear)) is a
//! tolerant no-op, never an error.

use log::{debug, trace};
use smallvec::SmallVec;

use crate::errors::{EmberError, Result};
use crate::gfx::{RenderBackend, SurfaceFormat};
use crate::render::target::{RenderTarget, TargetKey};

/// Hard ceiling on pool entries. Exceeding it means a pass is leaking
/// fetches, so the pool refuses to grow rather than mask the bug.
pub const MAX_POOLED_TARGETS: usize = 256;

/// Handle to a pool entry. Indices are stable for the lifetime of the
/// pool; [`RenderTargetPool::clear`] invalidates all outstanding handles.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TargetId(usize);

/// Handle to a multi-target surface binding (2–3 color surfaces rendered
/// in one pass, sharing the first surface's depth buffer).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BindingId(usize);

struct Entry {
    target: RenderTarget,
    in_use: bool,
    /// Pool-recyclable. Camera-owned targets live in the same arena but
    /// are never matched by a fetch.
    pooled: bool,
}

struct Binding {
    first_key: TargetKey,
    extra_formats: SmallVec<[SurfaceFormat; 2]>,
    targets: SmallVec<[TargetId; 3]>,
    in_use: bool,
}

/// The render target pool. One per renderer.
pub struct RenderTargetPool {
    entries: Vec<Entry>,
    bindings: Vec<Binding>,
    capacity: usize,
}

impl RenderTargetPool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_POOLED_TARGETS)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            bindings: Vec::new(),
            capacity,
        }
    }

    // ─── Single Targets ───────────────────────────────────────────────────

    /// Fetches a free target matching `key` exactly, creating one through
    /// the backend if no pooled target matches. Creation failure is fatal
    /// to the frame and is not retried.
    pub fn fetch(
        &mut self,
        backend: &mut dyn RenderBackend,
        key: TargetKey,
        label: &'static str,
    ) -> Result<TargetId> {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.pooled && !entry.in_use && entry.target.key() == key {
                entry.in_use = true;
                entry.target.invalidate();
                trace!("pool: recycled target {index} for {label}");
                return Ok(TargetId(index));
            }
        }
        let id = self.create_entry(backend, key, label, true)?;
        debug!(
            "pool: created target {} ({}x{} {:?}) for {label}",
            id.0, key.size.width, key.size.height, key.format
        );
        Ok(id)
    }

    /// Returns a target to the pool. Foreign, stale and camera-owned
    /// handles are ignored: a double release can never take down a frame.
    pub fn release(&mut self, id: TargetId) {
        if let Some(entry) = self.entries.get_mut(id.0)
            && entry.pooled
        {
            entry.in_use = false;
        }
    }

    /// Creates a target that the pool arena tracks but never recycles.
    /// Used for camera final and partial targets whose lifetime is tied
    /// to the camera, not to a pass.
    pub fn create_owned(
        &mut self,
        backend: &mut dyn RenderBackend,
        key: TargetKey,
        label: &'static str,
    ) -> Result<TargetId> {
        let id = self.create_entry(backend, key, label, false)?;
        debug!(
            "pool: created owned target {} ({}x{} {:?}) for {label}",
            id.0, key.size.width, key.size.height, key.format
        );
        Ok(id)
    }

    /// Destroys a camera-owned target. Pooled handles are ignored.
    pub fn destroy_owned(&mut self, backend: &mut dyn RenderBackend, id: TargetId) {
        if let Some(entry) = self.entries.get_mut(id.0)
            && !entry.pooled
            && !entry.in_use
        {
            entry.in_use = true; // tombstone: never matched again
            backend.destroy_surface(entry.target.attachment());
        }
    }

    fn create_entry(
        &mut self,
        backend: &mut dyn RenderBackend,
        key: TargetKey,
        label: &'static str,
        pooled: bool,
    ) -> Result<TargetId> {
        if self.entries.len() >= self.capacity {
            return Err(EmberError::PoolCapacityExceeded {
                capacity: self.capacity,
            });
        }
        let surface = backend.create_surface(&key.to_descriptor(label))?;
        self.entries.push(Entry {
            target: RenderTarget::new(surface, key),
            in_use: pooled,
            pooled,
        });
        Ok(TargetId(self.entries.len() - 1))
    }

    // ─── Multi-Target Bindings ────────────────────────────────────────────

    /// Fetches a 2–3 surface binding for MRT passes. The binding matches
    /// on the first surface's full key plus the extra color formats; the
    /// extra surfaces share the first's size and antialiasing and carry no
    /// depth buffer of their own.
    pub fn fetch_binding(
        &mut self,
        backend: &mut dyn RenderBackend,
        first_key: TargetKey,
        extra_formats: &[SurfaceFormat],
        label: &'static str,
    ) -> Result<BindingId> {
        debug_assert!((1..=2).contains(&extra_formats.len()));

        'scan: for (index, binding) in self.bindings.iter().enumerate() {
            if binding.in_use
                || binding.first_key != first_key
                || binding.extra_formats.as_slice() != extra_formats
            {
                continue;
            }
            // A member may have been grabbed by a single-target fetch
            // since this binding was released; such a binding is burned
            // for this frame but becomes matchable again later.
            for target in &binding.targets {
                if self.entries[target.0].in_use {
                    continue 'scan;
                }
            }
            for target in &binding.targets {
                let entry = &mut self.entries[target.0];
                entry.in_use = true;
                entry.target.invalidate();
            }
            self.bindings[index].in_use = true;
            trace!("pool: recycled binding {index} for {label}");
            return Ok(BindingId(index));
        }

        let mut targets: SmallVec<[TargetId; 3]> = SmallVec::new();
        targets.push(self.create_entry(backend, first_key, label, true)?);
        for format in extra_formats {
            let extra_key = TargetKey {
                format: *format,
                depth_format: None,
                ..first_key
            };
            targets.push(self.create_entry(backend, extra_key, label, true)?);
        }
        self.bindings.push(Binding {
            first_key,
            extra_formats: SmallVec::from_slice(extra_formats),
            targets,
            in_use: true,
        });
        let id = BindingId(self.bindings.len() - 1);
        debug!("pool: created binding {} for {label}", id.0);
        Ok(id)
    }

    /// Returns a binding and all of its member targets. Foreign and stale
    /// handles are ignored.
    pub fn release_binding(&mut self, id: BindingId) {
        let Some(binding) = self.bindings.get_mut(id.0) else {
            return;
        };
        if !binding.in_use {
            return;
        }
        binding.in_use = false;
        let targets = binding.targets.clone();
        for target in targets {
            self.release(target);
        }
    }

    /// Member targets of a binding, first surface first.
    #[must_use]
    pub fn binding_targets(&self, id: BindingId) -> Option<&[TargetId]> {
        self.bindings.get(id.0).map(|b| b.targets.as_slice())
    }

    // ─── Access & Maintenance ─────────────────────────────────────────────

    #[must_use]
    pub fn get(&self, id: TargetId) -> Option<&RenderTarget> {
        self.entries.get(id.0).map(|e| &e.target)
    }

    pub(crate) fn get_mut(&mut self, id: TargetId) -> Option<&mut RenderTarget> {
        self.entries.get_mut(id.0).map(|e| &mut e.target)
    }

    /// Whether the handle refers to a live target in this pool.
    #[must_use]
    pub fn contains(&self, id: TargetId) -> bool {
        id.0 < self.entries.len()
    }

    /// Number of targets currently fetched or owned.
    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.entries.iter().filter(|e| e.in_use).count()
    }

    /// Total number of targets in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destroys every target and binding. Called on display resize, where
    /// every cached size is stale at once. All outstanding handles become
    /// invalid; releasing them afterwards is still a no-op.
    pub fn clear(&mut self, backend: &mut dyn RenderBackend) {
        debug!("pool: clearing {} targets", self.entries.len());
        for entry in self.entries.drain(..) {
            backend.destroy_surface(entry.target.attachment());
        }
        self.bindings.clear();
    }
}

impl Default for RenderTargetPool {
    fn default() -> Self {
        Self::new()
    }
}
