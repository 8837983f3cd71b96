//! Local transforms and the matrix helpers used during propagation
//!
//! Re-exports the glam types the public API is expressed in.

pub use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};

/// Translation / rotation / scale triple describing an instance relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decompose an affine matrix. Shear is lost.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Compose `self` (outer) with `child` (inner) without going through matrices.
    pub fn mul(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.translation + self.rotation * (self.scale * child.translation),
            rotation: self.rotation * child.rotation,
            scale: self.scale * child.scale,
        }
    }

    /// Smallest scale component; what callers get when they ask for a single scale value.
    pub fn uniform_scale(&self) -> f32 {
        self.scale.min_element()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Combine a parent world matrix with a child local matrix.
#[inline]
pub fn compose(parent: &Mat4, local: &Mat4, scale_along_z: bool) -> Mat4 {
    if scale_along_z {
        *parent * *local
    } else {
        mul_no_scale_z(parent, local)
    }
}

/// `parent * child`, except the parent's Z-axis length does not stretch the
/// child's translation.
pub fn mul_no_scale_z(parent: &Mat4, child: &Mat4) -> Mat4 {
    let mut unscaled = *parent;
    unscaled.z_axis = parent.z_axis.truncate().normalize_or_zero().extend(0.0);
    let mut result = *parent * *child;
    result.w_axis = unscaled * child.w_axis;
    result
}

/// Euler angles in degrees, applied Z then Y then X.
pub fn euler_to_quat(degrees: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::ZYX,
        degrees.z.to_radians(),
        degrees.y.to_radians(),
        degrees.x.to_radians(),
    )
}

pub fn quat_to_euler(rotation: Quat) -> Vec3 {
    let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
    Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
}

/// Per-axis scale of an affine matrix.
pub fn matrix_scale(matrix: &Mat4) -> Vec3 {
    Vec3::new(
        matrix.x_axis.truncate().length(),
        matrix.y_axis.truncate().length(),
        matrix.z_axis.truncate().length(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn z_scale_only_reaches_translation_when_enabled() {
        let parent = Transform::new(Vec3::ZERO, Quat::IDENTITY, Vec3::new(1.0, 1.0, 2.0)).to_matrix();
        let child = Transform::from_translation(Vec3::new(1.0, 0.0, 1.0)).to_matrix();

        let scaled = compose(&parent, &child, true);
        assert!((scaled.w_axis.truncate() - Vec3::new(1.0, 0.0, 2.0)).length() < EPSILON);

        let unscaled = compose(&parent, &child, false);
        assert!((unscaled.w_axis.truncate() - Vec3::new(1.0, 0.0, 1.0)).length() < EPSILON);
        // The rotation/scale block is unaffected by the policy.
        assert!((matrix_scale(&unscaled) - Vec3::new(1.0, 1.0, 2.0)).length() < EPSILON);
    }

    #[test]
    fn trs_mul_matches_matrix_product() {
        let parent = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::splat(2.0),
        );
        let child = Transform::from_translation(Vec3::X);
        let composed = parent.mul(&child);
        let via_matrix = Transform::from_matrix(&(parent.to_matrix() * child.to_matrix()));
        assert!((composed.translation - via_matrix.translation).length() < EPSILON);
        assert!((composed.translation - Vec3::new(1.0, 4.0, 3.0)).length() < EPSILON);
    }

    #[test]
    fn euler_round_trip() {
        let degrees = Vec3::new(10.0, 20.0, 30.0);
        let back = quat_to_euler(euler_to_quat(degrees));
        assert!((back - degrees).length() < 1e-2);
    }
}
