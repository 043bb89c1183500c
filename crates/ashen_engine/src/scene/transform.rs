//! Spatial transform for scene objects

use crate::foundation::math::{Mat3, Mat4, Vec3};

/// Translation, scale and Euler rotation for one object
///
/// The rotation follows the Tait-Bryan Y-X-Z convention: yaw around Y, then
/// pitch around X, then roll around Z.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in world space
    pub translation: Vec3,
    /// Per-axis scale factors
    pub scale: Vec3,
    /// Euler rotation in radians (applied Y, X, Z)
    pub rotation: Vec3,
}

impl Transform {
    /// Identity transform at the origin
    pub fn identity() -> Self {
        Self {
            translation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation: Vec3::zeros(),
        }
    }

    /// Transform at `translation` with unit scale and no rotation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Compute the model matrix: translate * rotate(YXZ) * scale
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.translation)
            * self.rotation_matrix().to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Compute the normal matrix: rotate(YXZ) * inverse scale
    ///
    /// Correctly transforms normals under non-uniform scaling.
    pub fn normal_matrix(&self) -> Mat3 {
        let inv_scale = Vec3::new(1.0 / self.scale.x, 1.0 / self.scale.y, 1.0 / self.scale.z);
        self.rotation_matrix() * Mat3::from_diagonal(&inv_scale)
    }

    fn rotation_matrix(&self) -> Mat3 {
        nalgebra::Rotation3::from_axis_angle(&Vec3::y_axis(), self.rotation.y).into_inner()
            * nalgebra::Rotation3::from_axis_angle(&Vec3::x_axis(), self.rotation.x).into_inner()
            * nalgebra::Rotation3::from_axis_angle(&Vec3::z_axis(), self.rotation.z).into_inner()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_identity_model_matrix() {
        let transform = Transform::identity();
        assert_relative_eq!(transform.model_matrix(), Mat4::identity(), epsilon = EPSILON);
        assert_relative_eq!(transform.normal_matrix(), Mat3::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_translation_lands_in_last_column() {
        let transform = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let model = transform.model_matrix();
        assert_relative_eq!(model[(0, 3)], 1.0, epsilon = EPSILON);
        assert_relative_eq!(model[(1, 3)], 2.0, epsilon = EPSILON);
        assert_relative_eq!(model[(2, 3)], 3.0, epsilon = EPSILON);
    }

    #[test]
    fn test_scale_applies_before_rotation() {
        let transform = Transform {
            translation: Vec3::zeros(),
            scale: Vec3::new(2.0, 3.0, 4.0),
            rotation: Vec3::zeros(),
        };
        let model = transform.model_matrix();
        let p = model.transform_point(&nalgebra::Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p.x, 2.0, epsilon = EPSILON);
        assert_relative_eq!(p.y, 3.0, epsilon = EPSILON);
        assert_relative_eq!(p.z, 4.0, epsilon = EPSILON);
    }

    #[test]
    fn test_normal_matrix_cancels_nonuniform_scale() {
        let transform = Transform {
            translation: Vec3::zeros(),
            scale: Vec3::new(2.0, 1.0, 1.0),
            rotation: Vec3::zeros(),
        };
        // A normal along X keeps direction; its magnitude is rescaled by 1/sx
        let n = transform.normal_matrix() * Vec3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(n, Vec3::new(0.5, 0.0, 0.0), epsilon = EPSILON);
    }
}
