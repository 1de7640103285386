//! Helper functions

use crate::kinematic_traits::{Joints, Pose};
use nalgebra::{Isometry3, UnitQuaternion, Vector3, Vector6};

/// Checks if all elements in the array are finite
pub fn is_valid(qs: &Joints) -> bool {
    qs.iter().all(|&q| q.is_finite())
}

/// Converts ```nalgebra::Vector6<f64>``` to Joints ([f64; 6])
pub fn vector6_to_joints(v: Vector6<f64>) -> Joints {
    [v[0], v[1], v[2], v[3], v[4], v[5]]
}

/// Converts ```Joints ([f64; 6])``` to a ```Vector6<f64>```
pub fn joints_to_vector6(j: Joints) -> Vector6<f64> {
    Vector6::new(j[0], j[1], j[2], j[3], j[4], j[5])
}

/// Cartesian difference `target - current` as (translation, rotation vector), both in the
/// frame the poses are given in. The rotation vector is the one that rotates `current`
/// onto `target` when applied from the left.
pub fn pose_error(target: &Pose, current: &Pose) -> Vector6<f64> {
    let dp: Vector3<f64> = target.translation.vector - current.translation.vector;
    let dr = (target.rotation * current.rotation.inverse()).scaled_axis();
    Vector6::new(dp.x, dp.y, dp.z, dr.x, dr.y, dr.z)
}

/// Print joint values, converting radians to degrees.
pub fn dump_joints(joints: &Joints) {
    let mut row_str = String::new();
    for joint_idx in 0..6 {
        let computed = joints[joint_idx];
        row_str.push_str(&format!("{:5.2} ", computed.to_degrees()));
    }
    println!("[{}]", row_str.trim_end());
}

pub fn dump_pose(isometry: &Isometry3<f64>) {
    let translation = isometry.translation.vector;
    let rotation: UnitQuaternion<f64> = isometry.rotation;

    println!(
        "x: {:.5}, y: {:.5}, z: {:.5},  quat: {:.5},{:.5},{:.5},{:.5}",
        translation.x, translation.y, translation.z, rotation.i, rotation.j, rotation.k, rotation.w
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Translation3;
    use std::f64::consts::PI;

    #[test]
    fn test_is_valid_with_all_finite() {
        let qs = [0.0, 1.0, -1.0, 0.5, -0.5, PI];
        assert!(is_valid(&qs));
    }

    #[test]
    fn test_is_valid_with_nan() {
        let qs = [0.0, f64::NAN, 1.0, -1.0, 0.5, -0.5];
        assert!(!is_valid(&qs));
    }

    #[test]
    fn test_is_valid_with_infinity() {
        let qs = [0.0, f64::INFINITY, 1.0, -1.0, 0.5, -0.5];
        assert!(!is_valid(&qs));
    }

    #[test]
    fn test_pose_error() {
        let current = Isometry3::from_parts(
            Translation3::new(1.0, 0.0, 0.0), UnitQuaternion::identity());
        let target = Isometry3::from_parts(
            Translation3::new(1.0, 0.5, 0.0), UnitQuaternion::from_euler_angles(0.0, 0.0, 0.1));
        let e = pose_error(&target, &current);
        assert!((e[1] - 0.5).abs() < 1e-12);
        assert!((e[5] - 0.1).abs() < 1e-12);
        assert!(e[0].abs() < 1e-12 && e[3].abs() < 1e-12 && e[4].abs() < 1e-12);
    }
}
