//! Camera projection and view matrices

use crate::foundation::math::{Mat4, Vec3};

/// Scene camera holding projection, view and inverse view matrices
///
/// Matrices target Vulkan clip space: depth in `[0, 1]`, Y pointing down.
/// The inverse view is maintained alongside the view so shaders can recover
/// the camera world position without a per-frame matrix inversion.
#[derive(Debug, Clone)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    inverse_view: Mat4,
}

impl Camera {
    /// Camera with identity matrices
    pub fn new() -> Self {
        Self {
            projection: Mat4::identity(),
            view: Mat4::identity(),
            inverse_view: Mat4::identity(),
        }
    }

    /// Set a perspective projection
    ///
    /// `fov_y` is the vertical field of view in radians; `near` and `far` are
    /// positive distances with `near < far`.
    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        let tan_half = (fov_y / 2.0).tan();
        let mut proj = Mat4::zeros();
        proj[(0, 0)] = 1.0 / (aspect * tan_half);
        proj[(1, 1)] = 1.0 / tan_half;
        proj[(2, 2)] = far / (far - near);
        proj[(2, 3)] = -(far * near) / (far - near);
        proj[(3, 2)] = 1.0;
        self.projection = proj;
    }

    /// Set an orthographic projection over the given volume
    pub fn set_orthographic(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        let mut proj = Mat4::identity();
        proj[(0, 0)] = 2.0 / (right - left);
        proj[(1, 1)] = 2.0 / (bottom - top);
        proj[(2, 2)] = 1.0 / (far - near);
        proj[(0, 3)] = -(right + left) / (right - left);
        proj[(1, 3)] = -(bottom + top) / (bottom - top);
        proj[(2, 3)] = -near / (far - near);
        self.projection = proj;
    }

    /// Set the view from a position and a viewing direction
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(&up).normalize();
        let v = w.cross(&u);
        self.set_view_basis(position, u, v, w);
    }

    /// Set the view looking from `position` at `target`
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Set the view from a position and Y-X-Z Euler rotation
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let (c3, s3) = (rotation.z.cos(), rotation.z.sin());
        let (c2, s2) = (rotation.x.cos(), rotation.x.sin());
        let (c1, s1) = (rotation.y.cos(), rotation.y.sin());
        let u = Vec3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vec3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vec3::new(c2 * s1, -s2, c1 * c2);
        self.set_view_basis(position, u, v, w);
    }

    fn set_view_basis(&mut self, position: Vec3, u: Vec3, v: Vec3, w: Vec3) {
        let mut view = Mat4::identity();
        view[(0, 0)] = u.x;
        view[(0, 1)] = u.y;
        view[(0, 2)] = u.z;
        view[(1, 0)] = v.x;
        view[(1, 1)] = v.y;
        view[(1, 2)] = v.z;
        view[(2, 0)] = w.x;
        view[(2, 1)] = w.y;
        view[(2, 2)] = w.z;
        view[(0, 3)] = -u.dot(&position);
        view[(1, 3)] = -v.dot(&position);
        view[(2, 3)] = -w.dot(&position);
        self.view = view;

        let mut inverse = Mat4::identity();
        inverse[(0, 0)] = u.x;
        inverse[(1, 0)] = u.y;
        inverse[(2, 0)] = u.z;
        inverse[(0, 1)] = v.x;
        inverse[(1, 1)] = v.y;
        inverse[(2, 1)] = v.z;
        inverse[(0, 2)] = w.x;
        inverse[(1, 2)] = w.y;
        inverse[(2, 2)] = w.z;
        inverse[(0, 3)] = position.x;
        inverse[(1, 3)] = position.y;
        inverse[(2, 3)] = position.z;
        self.inverse_view = inverse;
    }

    /// Projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// View matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// Inverse view matrix
    pub fn inverse_view(&self) -> &Mat4 {
        &self.inverse_view
    }

    /// Camera position in world space, read from the inverse view
    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.inverse_view[(0, 3)],
            self.inverse_view[(1, 3)],
            self.inverse_view[(2, 3)],
        )
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_view_is_inverse_of_inverse_view() {
        let mut camera = Camera::new();
        camera.set_view_yxz(Vec3::new(1.0, -2.0, 3.0), Vec3::new(0.2, 0.7, -0.1));
        let product = camera.view() * camera.inverse_view();
        assert_relative_eq!(product, Mat4::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_view_target_centers_target_on_axis() {
        let mut camera = Camera::new();
        let position = Vec3::new(0.0, 0.0, -5.0);
        camera.set_view_target(position, Vec3::zeros(), Vec3::new(0.0, -1.0, 0.0));
        // Target transforms onto the +Z view axis at the eye distance
        let p = camera.view().transform_point(&nalgebra::Point3::origin());
        assert_relative_eq!(p.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(p.y, 0.0, epsilon = EPSILON);
        assert_relative_eq!(p.z, 5.0, epsilon = EPSILON);
    }

    #[test]
    fn test_perspective_maps_near_and_far() {
        let mut camera = Camera::new();
        camera.set_perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let proj = camera.projection();
        let near = proj.transform_point(&nalgebra::Point3::new(0.0, 0.0, 0.1));
        let far = proj.transform_point(&nalgebra::Point3::new(0.0, 0.0, 100.0));
        assert_relative_eq!(near.z, 0.0, epsilon = EPSILON);
        assert_relative_eq!(far.z, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_position_matches_view_setup() {
        let mut camera = Camera::new();
        let position = Vec3::new(4.0, 5.0, 6.0);
        camera.set_view_yxz(position, Vec3::zeros());
        assert_relative_eq!(camera.position(), position, epsilon = EPSILON);
    }
}
