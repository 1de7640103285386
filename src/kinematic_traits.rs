//! Narrow contract of the kinematics solver the controller consumes.

extern crate nalgebra as na;

use na::{Isometry3, Matrix6};
use crate::jacobian::compute_jacobian;

/// Pose is used as a pose of the robot flange or any frame attached to it. It contains both
/// Cartesian position and rotation quaternion (always normalized by construction).
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion, Vector3};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// // The quaternion should be normalized to represent a valid rotation.
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0).normalize());
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Values of the 6 joints: rotation angles (radians), velocities (rad/s), efforts or anything
/// else that comes one per joint.
pub type Joints = [f64; 6];

/// For providing positions where all joints are zero.
pub const JOINTS_AT_ZERO: Joints = [0.0; 6];

/// Default finite difference step used by the numeric Jacobian.
pub const JACOBIAN_EPSILON: f64 = 1e-6;

/// Kinematics solver as seen by the controller. Both methods must be pure and side-effect free,
/// and must not allocate, as they are called from the control cycle.
pub trait Kinematics: Send + Sync {
    /// Pose of the flange (tip of the last link) in the base frame.
    fn forward(&self, qs: &Joints) -> Pose;

    /// Jacobian mapping joint velocities to the flange twist (linear, angular) expressed
    /// in the base frame. The default implementation differentiates `forward` numerically.
    fn jacobian(&self, qs: &Joints) -> Matrix6<f64> {
        compute_jacobian(self, qs, JACOBIAN_EPSILON)
    }
}
