//! Quaternion representation matrices and the dual-quaternion encoding of rigid transforms.
//!
//! Quaternions are stored as `Vector4` in `[x, y, z, w]` order (vector part first, scalar
//! last), the same layout as `nalgebra::Quaternion::coords`. A rigid transform `p -> R p + t` is
//! encoded by a pair `(s, r)`: `r` is a unit quaternion carrying the rotation and `s = W(r) [t, 0]`
//! carries the translation. The pair is valid when `|r|^2 = 1` and `r . s = 0`.
//!
//! Based on Walker, Shao & Volz (1991), doi:10.1016/1049-9660(91)90036-O.

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Point3, Quaternion, Translation3, UnitQuaternion, Vector3,
    Vector4,
};

/// Embeds a vector as the pure quaternion `[x, y, z, 0]`.
#[inline]
pub fn pure(v: &Vector3<f64>) -> Vector4<f64> {
    Vector4::new(v.x, v.y, v.z, 0.0)
}

/// The "left" matrix `W(q)` of the rotation product `W(q)^T Q(q)`.
///
/// `W(q) * p` equals the Hamilton product `p * q`.
pub fn left_representation(q: &Vector4<f64>) -> Matrix4<f64> {
    let (x, y, z, w) = (q[0], q[1], q[2], q[3]);
    #[rustfmt::skip]
    let m = Matrix4::new(
         w,  z, -y,  x,
        -z,  w,  x,  y,
         y, -x,  w,  z,
        -x, -y, -z,  w,
    );
    m
}

/// The "right" matrix `Q(q)` of the rotation product `W(q)^T Q(q)`.
///
/// `Q(q) * p` equals the Hamilton product `q * p`.
pub fn right_representation(q: &Vector4<f64>) -> Matrix4<f64> {
    let (x, y, z, w) = (q[0], q[1], q[2], q[3]);
    #[rustfmt::skip]
    let m = Matrix4::new(
         w, -z,  y,  x,
         z,  w, -x,  y,
        -y,  x,  w,  z,
        -x, -y, -z,  w,
    );
    m
}

/// Converts a dual-quaternion pair into a rotation matrix and a translation vector.
///
/// The rotation is the top-left 3x3 block of `W(r)^T Q(r)` and the translation the top three
/// entries of `W(r)^T s`. The result is a proper rigid transform only when `|r| = 1` and
/// `r . s = 0`; callers enforce both.
pub fn to_rigid_transform(r: &Vector4<f64>, s: &Vector4<f64>) -> (Matrix3<f64>, Vector3<f64>) {
    let w_t = left_representation(r).transpose();
    let rotation = (w_t * right_representation(r))
        .fixed_view::<3, 3>(0, 0)
        .into_owned();
    let translation = (w_t * s).fixed_rows::<3>(0).into_owned();
    (rotation, translation)
}

/// A rigid transform encoded as the dual-quaternion pair `(s, r)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualQuaternion {
    /// Dual (translation) part.
    pub s: Vector4<f64>,
    /// Real (rotation) part.
    pub r: Vector4<f64>,
}

impl Default for DualQuaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl DualQuaternion {
    pub fn new(s: Vector4<f64>, r: Vector4<f64>) -> Self {
        Self { s, r }
    }

    /// `s = (0, 0, 0, 0)`, `r = (0, 0, 0, 1)`.
    pub fn identity() -> Self {
        Self {
            s: Vector4::zeros(),
            r: Vector4::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    pub fn from_parts(rotation: &UnitQuaternion<f64>, translation: &Vector3<f64>) -> Self {
        let r = rotation.into_inner().coords;
        let s = left_representation(&r) * pure(translation);
        Self { s, r }
    }

    pub fn from_isometry(isometry: &Isometry3<f64>) -> Self {
        Self::from_parts(&isometry.rotation, &isometry.translation.vector)
    }

    pub fn to_rigid_transform(&self) -> (Matrix3<f64>, Vector3<f64>) {
        to_rigid_transform(&self.r, &self.s)
    }

    /// The nearest proper isometry; `r` is normalized before conversion.
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let norm = self.r.norm().max(f64::MIN_POSITIVE);
        let (_, translation) = to_rigid_transform(&(self.r / norm), &(self.s / norm));
        let rotation = UnitQuaternion::from_quaternion(Quaternion::from_vector(self.r));
        Isometry3::from_parts(Translation3::from(translation), rotation)
    }

    /// Applies `p -> R p + t` using the raw (unnormalized) pair.
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        let (rotation, translation) = self.to_rigid_transform();
        Point3::from(rotation * point.coords + translation)
    }

    /// `|r|^2 - 1`
    pub fn norm_residual(&self) -> f64 {
        self.r.norm_squared() - 1.0
    }

    /// `r . s`
    pub fn orthogonality_residual(&self) -> f64 {
        self.r.dot(&self.s)
    }

    /// Flips the sign of both parts so that the scalar part of `r` is non-negative. `(s, r)` and
    /// `(-s, -r)` encode the same transform.
    pub fn canonicalized(self) -> Self {
        if self.r[3] < 0.0 {
            Self {
                s: -self.s,
                r: -self.r,
            }
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::geometry::rigid_transform;

    const TOLERANCE: f64 = 1e-12;

    fn sample_quaternions() -> (Vector4<f64>, Vector4<f64>) {
        (
            Vector4::new(0.3, -1.2, 0.7, 2.0),
            Vector4::new(-0.5, 0.4, 1.1, -0.9),
        )
    }

    #[test]
    fn representations_reproduce_hamilton_products() {
        let (a, b) = sample_quaternions();
        let expected_ab = (Quaternion::from_vector(a) * Quaternion::from_vector(b)).coords;
        let expected_ba = (Quaternion::from_vector(b) * Quaternion::from_vector(a)).coords;

        assert!((right_representation(&a) * b - expected_ab).norm() < TOLERANCE);
        assert!((left_representation(&b) * a - expected_ab).norm() < TOLERANCE);
        assert!((right_representation(&b) * a - expected_ba).norm() < TOLERANCE);
    }

    #[test]
    fn representations_are_orthogonal_for_unit_quaternions() {
        let (a, _) = sample_quaternions();
        let unit = a.normalize();
        let identity = Matrix4::identity();
        let w = left_representation(&unit);
        let q = right_representation(&unit);
        assert!((w.transpose() * w - identity).norm() < TOLERANCE);
        assert!((q.transpose() * q - identity).norm() < TOLERANCE);
        assert!((w * q - q * w).norm() < TOLERANCE);
    }

    #[test]
    fn rotation_block_matches_unit_quaternion_rotation() {
        let (a, _) = sample_quaternions();
        let unit = UnitQuaternion::from_quaternion(Quaternion::from_vector(a));
        let (rotation, translation) =
            to_rigid_transform(&unit.into_inner().coords, &Vector4::zeros());

        assert!((rotation - unit.to_rotation_matrix().into_inner()).norm() < TOLERANCE);
        assert!((rotation.transpose() * rotation - Matrix3::identity()).norm() < TOLERANCE);
        assert!((rotation.determinant() - 1.0).abs() < TOLERANCE);
        assert!(translation.norm() < TOLERANCE);
    }

    #[test]
    fn from_isometry_round_trips_and_satisfies_constraints() {
        let isometry = rigid_transform(
            &Vector3::new(1.0, 2.0, -0.5),
            73.0,
            &Vector3::new(0.4, -3.0, 2.2),
        );
        let dq = DualQuaternion::from_isometry(&isometry);

        assert!(dq.norm_residual().abs() < TOLERANCE);
        assert!(dq.orthogonality_residual().abs() < TOLERANCE);

        let (rotation, translation) = dq.to_rigid_transform();
        assert!((rotation - isometry.rotation.to_rotation_matrix().into_inner()).norm() < 1e-10);
        assert!((translation - isometry.translation.vector).norm() < 1e-10);

        let point = Point3::new(-1.0, 0.5, 2.0);
        assert!((dq.apply(&point) - isometry * point).norm() < 1e-10);
        assert!((dq.to_isometry() * point - isometry * point).norm() < 1e-10);
    }

    #[test]
    fn identity_leaves_points_unchanged() {
        let point = Point3::new(3.0, -2.0, 1.0);
        assert_eq!(DualQuaternion::identity().apply(&point), point);
        assert_eq!(DualQuaternion::default(), DualQuaternion::identity());
    }

    #[test]
    fn canonicalized_pair_encodes_same_transform() {
        let isometry = rigid_transform(&Vector3::x(), 200.0, &Vector3::new(1.0, 1.0, 0.0));
        let dq = DualQuaternion::from_isometry(&isometry);
        let flipped = DualQuaternion::new(-dq.s, -dq.r);
        let canonical = flipped.canonicalized();

        assert!(canonical.r[3] >= 0.0);
        let point = Point3::new(0.2, 0.3, 0.4);
        assert!((canonical.apply(&point) - dq.apply(&point)).norm() < 1e-10);
        assert!((flipped.apply(&point) - dq.apply(&point)).norm() < 1e-10);
    }
}
