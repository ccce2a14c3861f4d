//! Shadow Maps
//!
//! Renders light-space linear depth into pooled R32Float targets, one per
//! shadow-casting light, keyed by the light's stable id so a light keeps
//! its map across frames. Point lights render six perspective faces into
//! a 3x2 atlas on a single target, one viewport region per face.
//!
//! # Cache Policy
//!
//! Maps are held fetched across frames and re-rendered every frame; the
//! whole cache is flushed back to the pool on a fixed interval so maps of
//! deleted lights do not pin pool entries forever.

use glam::{Mat4, Vec3};
use log::debug;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::gfx::{Color, DepthFormat, PixelRect, SurfaceFormat, SurfaceSize, Technique, TechniqueParams};
use crate::render::frame::FrameContext;
use crate::render::lists::RenderLists;
use crate::render::pool::TargetId;
use crate::render::target::TargetKey;
use crate::scene::{Light, LightKind, Scene};

/// Frames between cache flushes.
pub const SHADOW_RELEASE_INTERVAL: u64 = 32;

struct CachedMap {
    target: TargetId,
    /// Set when the owning light was seen this frame.
    live: bool,
}

/// One light-space render: view, projection, atlas region.
type Face = (Mat4, Mat4, PixelRect);

/// Cross-frame shadow map cache, keyed by light id.
#[derive(Default)]
pub struct ShadowCache {
    maps: FxHashMap<u64, CachedMap>,
    frames_since_flush: u64,
}

impl ShadowCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shadow map of a light rendered this frame.
    #[must_use]
    pub fn map_for(&self, light_id: u64) -> Option<TargetId> {
        self.maps.get(&light_id).filter(|m| m.live).map(|m| m.target)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Renders shadow maps for every visible shadow-casting light.
    pub fn prepare(
        &mut self,
        ctx: &mut FrameContext,
        scene: &Scene,
        lists: &RenderLists,
    ) -> Result<()> {
        self.frames_since_flush += 1;
        if self.frames_since_flush >= SHADOW_RELEASE_INTERVAL {
            self.flush(ctx);
        }
        for map in self.maps.values_mut() {
            map.live = false;
        }

        if lists.shadow_casters.is_empty() {
            return Ok(());
        }

        for key in &lists.lights {
            let Some(light) = scene.lights.get(*key) else {
                continue;
            };
            if !light.cast_shadows
                || light.intensity <= 0.0
                || matches!(light.kind, LightKind::Ambient(_))
            {
                continue;
            }

            let (size, faces, cube) = light_faces(light);
            self.render_faces(ctx, light.id, size, &faces, lists, cube)?;
        }
        Ok(())
    }

    fn render_faces(
        &mut self,
        ctx: &mut FrameContext,
        light_id: u64,
        size: SurfaceSize,
        faces: &[Face],
        lists: &RenderLists,
        cube: bool,
    ) -> Result<()> {
        let key = TargetKey::new(size, SurfaceFormat::R32Float)
            .with_depth(DepthFormat::Depth32Float);

        let target = match self.maps.get(&light_id) {
            Some(cached) if ctx.pool.get(cached.target).is_some_and(|t| t.key() == key) => {
                cached.target
            }
            _ => {
                // Size changed or first sighting: drop any stale map.
                if let Some(stale) = self.maps.remove(&light_id) {
                    ctx.pool.release(stale.target);
                }
                ctx.pool.fetch(ctx.backend, key, "Shadow Map")?
            }
        };
        self.maps.insert(light_id, CachedMap { target, live: true });

        let technique = if cube {
            Technique::ShadowDepthCube
        } else {
            Technique::ShadowDepth
        };

        // Only the first face clears; later faces write disjoint regions
        // of the same atlas.
        for (index, (view, projection, rect)) in faces.iter().enumerate() {
            let first = index == 0;
            ctx.enable_target_region(
                target,
                first.then_some(Color::TRANSPARENT),
                first,
                Some(*rect),
                "Shadow Pass",
            )?;
            let params = TechniqueParams {
                view: *view,
                projection: *projection,
                ..TechniqueParams::default()
            };
            ctx.draw(technique, &params, &lists.shadow_casters)?;
            ctx.disable_target()?;
        }
        ctx.stats.shadow_maps_rendered += 1;
        Ok(())
    }

    /// Returns every cached map to the pool.
    pub fn flush(&mut self, ctx: &mut FrameContext) {
        if !self.maps.is_empty() {
            debug!("shadow cache: flushing {} maps", self.maps.len());
        }
        for (_, map) in self.maps.drain() {
            ctx.pool.release(map.target);
        }
        self.frames_since_flush = 0;
    }
}

fn light_faces(light: &Light) -> (SurfaceSize, SmallVec<[Face; 6]>, bool) {
    let map_size = light.shadow.map_size;
    let square = SurfaceSize::new(map_size, map_size);
    let full = PixelRect {
        x: 0,
        y: 0,
        width: map_size,
        height: map_size,
    };

    match &light.kind {
        LightKind::Directional(d) => {
            let view =
                Mat4::look_at_rh(-d.direction * 100.0, Vec3::ZERO, directional_up(d.direction));
            let projection = Mat4::orthographic_rh(-50.0, 50.0, -50.0, 50.0, 1.0, 200.0);
            (square, smallvec::smallvec![(view, projection, full)], false)
        }
        LightKind::Spot(s) => {
            let cone_angle = s.outer_cone.clamp(-0.999, 0.999).acos();
            let view = Mat4::look_at_rh(
                s.position,
                s.position + s.direction,
                directional_up(s.direction),
            );
            let projection = Mat4::perspective_rh(cone_angle * 2.0, 1.0, 0.1, s.range.max(0.1));
            (square, smallvec::smallvec![(view, projection, full)], false)
        }
        LightKind::Point(p) => {
            let atlas = SurfaceSize::new(map_size * 3, map_size * 2);
            let projection =
                Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, p.range.max(0.1));
            let faces = cube_faces(p.position)
                .into_iter()
                .enumerate()
                .map(|(i, view)| {
                    let rect = PixelRect {
                        x: (i as u32 % 3) * map_size,
                        y: (i as u32 / 3) * map_size,
                        width: map_size,
                        height: map_size,
                    };
                    (view, projection, rect)
                })
                .collect();
            (atlas, faces, true)
        }
        LightKind::Ambient(_) => unreachable!("filtered by the caller"),
    }
}

/// Up vector that is never colinear with the light direction.
fn directional_up(direction: Vec3) -> Vec3 {
    if direction.dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// View matrices of the six cube faces: +X, -X, +Y, -Y, +Z, -Z.
fn cube_faces(position: Vec3) -> [Mat4; 6] {
    [
        Mat4::look_at_rh(position, position + Vec3::X, Vec3::Y),
        Mat4::look_at_rh(position, position - Vec3::X, Vec3::Y),
        Mat4::look_at_rh(position, position + Vec3::Y, Vec3::Z),
        Mat4::look_at_rh(position, position - Vec3::Y, Vec3::NEG_Z),
        Mat4::look_at_rh(position, position + Vec3::Z, Vec3::Y),
        Mat4::look_at_rh(position, position - Vec3::Z, Vec3::Y),
    ]
}
