//! Cameras
//!
//! A camera owns its view/projection math, its culling frustum, the
//! normalized viewport it composites into, and the list of slave cameras
//! rendered alongside it for split-screen output.

use glam::{Mat4, Vec3, Vec4};

use crate::gfx::{Color, Viewport};
use crate::render::frame::LayerMask;
use crate::scene::CameraKey;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,

    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,

    /// Region of the destination this camera composites into, in
    /// normalized coordinates. A non-full viewport forces the compositor
    /// off its fast path.
    pub viewport: Viewport,
    /// Composition order among the master and its slaves; lower renders
    /// first.
    pub rendering_order: i32,
    /// Slave cameras composited with this camera. Disabled slaves are
    /// skipped without affecting the others.
    pub slaves: Vec<CameraKey>,
    pub enabled: bool,

    pub clear_color: Color,
    pub layers: LayerMask,
    pub post_process: bool,
    pub exposure: f32,
    pub bloom_threshold: f32,

    // Cached per update; the renderer reads these without recomputing.
    view_matrix: Mat4,
    projection_matrix: Mat4,
    frustum: Frustum,
}

impl Camera {
    #[must_use]
    pub fn new(aspect: f32) -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 60_f32.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
            viewport: Viewport::FULL,
            rendering_order: 0,
            slaves: Vec::new(),
            enabled: true,
            clear_color: Color::CORNFLOWER_BLUE,
            layers: LayerMask::ALL,
            post_process: true,
            exposure: 1.0,
            bloom_threshold: 1.0,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        camera.update_matrices();
        camera
    }

    /// Recomputes the cached view/projection/frustum. Call after mutating
    /// any of the positional or projection fields.
    pub fn update_matrices(&mut self) {
        self.view_matrix = Mat4::look_at_rh(self.position, self.target, self.up);
        self.projection_matrix =
            Mat4::perspective_rh(self.fov_y, self.aspect.max(0.0001), self.near, self.far);
        self.frustum = Frustum::from_matrix(self.projection_matrix * self.view_matrix);
    }

    #[must_use]
    pub const fn view(&self) -> Mat4 {
        self.view_matrix
    }

    #[must_use]
    pub const fn projection(&self) -> Mat4 {
        self.projection_matrix
    }

    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    #[must_use]
    pub const fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }
}

/// View frustum as six inward-facing planes, extracted from a
/// view-projection matrix with the Gribb-Hartmann method.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    planes: [Vec4; 6],
}

impl Frustum {
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        planes[0] = rows[3] + rows[0];
        planes[1] = rows[3] - rows[0];
        planes[2] = rows[3] + rows[1];
        planes[3] = rows[3] - rows[1];
        // NDC depth range is [0, 1], so the near plane is row 2 alone.
        planes[4] = rows[2];
        planes[5] = rows[3] - rows[2];

        for plane in &mut planes {
            let length = Vec3::new(plane.x, plane.y, plane.z).length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }

        Self { planes }
    }

    /// Conservative sphere test: a sphere touching any plane counts as
    /// visible.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        for plane in &self.planes {
            let dist = plane.x * center.x + plane.y * center.y + plane.z * center.z + plane.w;
            if dist < -radius {
                return false;
            }
        }
        true
    }

    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.intersects_sphere(point, 0.0)
    }
}
