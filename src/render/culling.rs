//! Frustum Culling
//!
//! Fills the per-camera [`RenderLists`] from a scene: one conservative
//! sphere test per model, then per-part classification into the G-Buffer
//! and material buckets. Lights with finite bounds (point, spot) are
//! culled the same way; ambient and directional lights always pass.

use crate::gfx::DrawCall;
use crate::render::frame::FrameStats;
use crate::render::lists::RenderLists;
use crate::scene::{Camera, Scene};

pub fn cull_scene(scene: &Scene, camera: &Camera, lists: &mut RenderLists, stats: &mut FrameStats) {
    lists.clear();
    let frustum = camera.frustum();

    for model in scene.models.values() {
        if !model.visible || (model.layers & camera.layers).is_empty() {
            continue;
        }
        let (center, radius) = model.world_bounds();
        if !frustum.intersects_sphere(center, radius) {
            stats.models_culled += 1;
            continue;
        }
        stats.models_visible += 1;

        let skinned = model.is_skinned();
        let palette = model.bone_palette();

        for part in &model.parts {
            let call = DrawCall {
                mesh: model.mesh,
                part: part.part,
                world: model.world,
                color: part.material.base_color(),
                opacity: part.material.opacity(),
                bones: palette.clone(),
            };

            let gbucket = part.material.gbuffer_bucket(skinned);
            lists.gbuffer[gbucket.index()].push(call.clone());

            match part.material.material_bucket(skinned) {
                Some(bucket) => {
                    if model.cast_shadows {
                        lists.shadow_casters.push(call.clone());
                    }
                    lists.opaque[bucket.index()].push(call);
                }
                None => {
                    if skinned {
                        lists.transparent_skinned.push(call);
                    } else {
                        lists.transparent.push(call);
                    }
                }
            }
        }
    }

    for (key, light) in &scene.lights {
        if !light.enabled {
            continue;
        }
        let visible = match light.bounds() {
            None => true,
            Some((center, radius)) => frustum.intersects_sphere(center, radius),
        };
        if visible {
            lists.lights.push(key);
        }
    }
}
