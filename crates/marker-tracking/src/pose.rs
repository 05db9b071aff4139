//! Rigid marker pose and rotation utilities.
//!
//! Poses map marker-local points into camera space: `p_cam = R * p_marker + t`.
//! All poses leaving this crate are expressed in the GL camera frame:
//!
//! ```text
//!        +Y (up)
//!         |
//!         +------ +X (right)
//!        /
//!      +Z (towards the viewer; the camera looks down -Z)
//! ```
//!
//! Detection libraries built on computer-vision conventions report poses in
//! the vision frame (x right, y down, z forward). [`CameraConvention`]
//! converts between the two.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Below this angle two rotations are treated as identical when blending.
const SLERP_EPSILON: f64 = 1e-9;

/// Camera-frame convention a detector reports poses in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraConvention {
    /// x right, y down, z forward (OpenCV / ARToolKit)
    #[default]
    Vision,
    /// x right, y up, z backward (OpenGL)
    Gl,
}

impl CameraConvention {
    /// Basis change taking camera coordinates in this convention to the GL frame
    pub fn to_gl(&self) -> Matrix3<f64> {
        match self {
            CameraConvention::Vision => Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0)),
            CameraConvention::Gl => Matrix3::identity(),
        }
    }
}

/// One tracker output: marker pose plus the raw per-frame visibility flag.
///
/// `rotation` is always a proper rotation and `translation` always finite.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSample {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    pub raw_visible: bool,
    pub timestamp_ns: u64,
}

impl PoseSample {
    /// Marker at the camera origin, not seen
    pub fn identity(timestamp_ns: u64) -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: Vector3::zeros(),
            raw_visible: false,
            timestamp_ns,
        }
    }

    /// Visible sample built from a possibly non-orthonormal 3x3 matrix.
    ///
    /// Returns `None` if any entry of the input is non-finite.
    pub fn from_raw(
        rotation: &Matrix3<f64>,
        translation: &Vector3<f64>,
        timestamp_ns: u64,
    ) -> Option<Self> {
        if !translation.iter().all(|v| v.is_finite()) {
            return None;
        }
        let rotation = orthonormalize(rotation)?;
        Some(Self {
            rotation,
            translation: *translation,
            raw_visible: true,
            timestamp_ns,
        })
    }

    /// Miss: carry the previous pose forward unchanged
    pub fn missed(previous: &PoseSample, timestamp_ns: u64) -> Self {
        Self {
            raw_visible: false,
            timestamp_ns,
            ..previous.clone()
        }
    }

    /// 4x4 homogeneous marker-to-camera transform
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut m = self.rotation.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Marker origin in camera space
    pub fn position(&self) -> Vector3<f64> {
        self.translation
    }
}

/// Closest proper rotation to `m` (polar decomposition via SVD).
pub fn orthonormalize(m: &Matrix3<f64>) -> Option<Rotation3<f64>> {
    if !m.iter().all(|v| v.is_finite()) {
        return None;
    }

    let svd = (*m).svd(true, true);
    let (mut u, v_t) = (svd.u?, svd.v_t?);
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        // Reflection: flip the axis of the smallest singular value
        let smallest = svd
            .singular_values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(2);
        u.column_mut(smallest).neg_mut();
        r = u * v_t;
    }

    if !r.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(Rotation3::from_matrix_unchecked(r))
}

/// Spherical interpolation from `current` towards `target` by `alpha` in [0, 1].
pub fn blend_rotation(
    current: &Rotation3<f64>,
    target: &Rotation3<f64>,
    alpha: f64,
) -> Rotation3<f64> {
    let q0 = UnitQuaternion::from_rotation_matrix(current);
    let q1 = UnitQuaternion::from_rotation_matrix(target);
    let blended = q0.try_slerp(&q1, alpha, SLERP_EPSILON).unwrap_or(q1);
    blended.to_rotation_matrix()
}

/// Linear blend of translations by `alpha`
pub fn blend_translation(
    current: &Vector3<f64>,
    target: &Vector3<f64>,
    alpha: f64,
) -> Vector3<f64> {
    current * (1.0 - alpha) + target * alpha
}

/// Whether `r` is orthonormal with determinant +1 within `tolerance`
pub fn is_proper_rotation(r: &Matrix3<f64>, tolerance: f64) -> bool {
    let identity_error = (r.transpose() * r - Matrix3::identity()).abs().max();
    identity_error < tolerance && (r.determinant() - 1.0).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_orthonormalize_keeps_rotation() {
        let r = Rotation3::from_euler_angles(0.3, -0.2, 1.1);
        let fixed = orthonormalize(r.matrix()).unwrap();
        assert_relative_eq!(fixed.matrix(), r.matrix(), epsilon = 1e-10);
    }

    #[test]
    fn test_orthonormalize_repairs_near_singular() {
        let mut m = *Rotation3::from_euler_angles(0.1, 0.2, 0.3).matrix();
        m[(0, 0)] += 0.05;
        m[(1, 2)] -= 0.03;
        let fixed = orthonormalize(&m).unwrap();
        assert!(is_proper_rotation(fixed.matrix(), 1e-9));
    }

    #[test]
    fn test_orthonormalize_rejects_reflection() {
        let m = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
        let fixed = orthonormalize(&m).unwrap();
        assert!(is_proper_rotation(fixed.matrix(), 1e-9));
    }

    #[test]
    fn test_orthonormalize_rejects_nan() {
        let mut m = Matrix3::identity();
        m[(1, 1)] = f64::NAN;
        assert!(orthonormalize(&m).is_none());
    }

    #[test]
    fn test_from_raw_rejects_infinite_translation() {
        let t = Vector3::new(0.0, f64::INFINITY, 1.0);
        assert!(PoseSample::from_raw(&Matrix3::identity(), &t, 0).is_none());
    }

    #[test]
    fn test_missed_carries_pose() {
        let previous = PoseSample::from_raw(
            Rotation3::from_euler_angles(0.0, 0.5, 0.0).matrix(),
            &Vector3::new(1.0, 2.0, -300.0),
            10,
        )
        .unwrap();
        let miss = PoseSample::missed(&previous, 20);
        assert!(!miss.raw_visible);
        assert_eq!(miss.timestamp_ns, 20);
        assert_eq!(miss.rotation, previous.rotation);
        assert_eq!(miss.translation, previous.translation);
    }

    #[test]
    fn test_blend_rotation_halfway() {
        let a = Rotation3::identity();
        let b = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let mid = blend_rotation(&a, &b, 0.5);
        assert_relative_eq!(mid.angle(), FRAC_PI_2 / 2.0, epsilon = 1e-9);
        assert!(is_proper_rotation(mid.matrix(), 1e-9));
    }

    #[test]
    fn test_blend_rotation_identical_inputs() {
        let a = Rotation3::from_euler_angles(0.4, 0.4, 0.4);
        let blended = blend_rotation(&a, &a, 0.15);
        assert_relative_eq!(blended.matrix(), a.matrix(), epsilon = 1e-9);
    }

    #[test]
    fn test_vision_to_gl_is_rotation() {
        let f = CameraConvention::Vision.to_gl();
        assert!(is_proper_rotation(&f, 1e-12));
        // A point in front of a vision camera (+z) is in front of a GL camera (-z)
        let p = f * Vector3::new(0.0, 0.0, 5.0);
        assert_relative_eq!(p.z, -5.0);
    }

    #[test]
    fn test_homogeneous_layout() {
        let pose = PoseSample::from_raw(&Matrix3::identity(), &Vector3::new(1.0, 2.0, 3.0), 0).unwrap();
        let m = pose.to_homogeneous();
        assert_eq!(m[(0, 3)], 1.0);
        assert_eq!(m[(1, 3)], 2.0);
        assert_eq!(m[(2, 3)], 3.0);
        assert_eq!(m[(3, 3)], 1.0);
    }
}
