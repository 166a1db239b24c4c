use nalgebra::{Isometry3, Point3, Rotation3, Translation3, Unit, UnitQuaternion, Vector3};

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Rigid transform `p -> R p + t` built from an axis-angle rotation and a translation.
pub fn rigid_transform(
    axis: &Vector3<f64>,
    angle_degrees: f64,
    translation: &Vector3<f64>,
) -> Isometry3<f64> {
    let rotation = UnitQuaternion::from_rotation_matrix(&rotation_from_axis_angle(
        axis,
        angle_degrees,
    ));
    Isometry3::from_parts(Translation3::from(*translation), rotation)
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Some(Point3::from(sum / points.len() as f64))
}
