//! Jacobian of the arm and the differential inverse kinematics built on it.

extern crate nalgebra as na;

use na::{Matrix6, Vector6};
use na::linalg::SVD;
use crate::kinematic_traits::{Joints, Kinematics};
use crate::utils::vector6_to_joints;

/// Struct representing the Jacobian matrix at some joint configuration
#[derive(Debug, Clone, Copy)]
pub struct Jacobian {
    /// A 6x6 matrix representing the Jacobian
    ///
    /// The Jacobian matrix maps the joint velocities to the end-effector velocities.
    /// Each column corresponds to a joint, and each row corresponds to a degree of freedom
    /// of the end-effector (linear and angular velocities).
    matrix: Matrix6<f64>,
}

impl Jacobian {
    /// Constructs a new Jacobian by asking the solver for the matrix at the given joint configuration
    pub fn new(robot: &(impl Kinematics + ?Sized), qs: &Joints) -> Self {
        Self { matrix: robot.jacobian(qs) }
    }

    pub fn from_matrix(matrix: Matrix6<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix6<f64> {
        &self.matrix
    }

    /// Ratio of the largest to the smallest singular value. Infinite if the matrix is
    /// rank deficient or contains non-finite entries.
    pub fn condition_number(&self) -> f64 {
        if !self.matrix.iter().all(|v| v.is_finite()) {
            return f64::INFINITY;
        }
        let singular_values = SVD::new(self.matrix, false, false).singular_values;
        let max = singular_values.max();
        let min = singular_values.min();
        if min <= f64::EPSILON * max || min == 0.0 {
            f64::INFINITY
        } else {
            max / min
        }
    }

    /// Computes the joint velocities required to achieve a desired end-effector twist,
    /// using the exact inverse. Returns None if the matrix cannot be inverted.
    pub fn velocities_from_vector(&self, twist: &Vector6<f64>) -> Option<Joints> {
        self.matrix.lu().solve(twist)
            .filter(|qdot| qdot.iter().all(|v| v.is_finite()))
            .map(vector6_to_joints)
    }

    /// Damped least squares solution J^T (J J^T + λ²I)^-1 v. Always bounded for λ > 0:
    /// the joint speed never exceeds |v| / (2λ).
    pub fn damped_velocities_from_vector(&self, twist: &Vector6<f64>, damping: f64) -> Joints {
        let jjt = self.matrix * self.matrix.transpose();
        let regularized = jjt + Matrix6::identity() * (damping * damping);
        match regularized.cholesky() {
            Some(cholesky) => vector6_to_joints(self.matrix.transpose() * cholesky.solve(twist)),
            None => [0.0; 6],
        }
    }
}

/// Function to compute the Jacobian matrix for a given robot and joint configuration
/// numerically, perturbing one joint at time.
///
/// # Arguments
///
/// * `robot` - A reference to the robot implementing the Kinematics trait
/// * `joints` - A reference to the joint configuration
/// * `epsilon` - A small value used for numerical differentiation
///
/// # Returns
///
/// A 6x6 matrix representing the Jacobian, linear rows first, angular rows in the base frame.
pub fn compute_jacobian<K: Kinematics + ?Sized>(robot: &K, joints: &Joints, epsilon: f64) -> Matrix6<f64> {
    let mut jacobian = Matrix6::zeros();
    let current_pose = robot.forward(joints);
    let current_position = current_pose.translation.vector;
    let current_orientation = current_pose.rotation;

    for i in 0..6 {
        let mut perturbed_qs = *joints;
        perturbed_qs[i] += epsilon;
        let perturbed_pose = robot.forward(&perturbed_qs);

        let delta_position = (perturbed_pose.translation.vector - current_position) / epsilon;
        let delta_orientation =
            (perturbed_pose.rotation * current_orientation.inverse()).scaled_axis() / epsilon;

        jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&delta_position);
        jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&delta_orientation);
    }

    jacobian
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::{Isometry3, Translation3, UnitQuaternion};
    use crate::kinematic_traits::Pose;

    const EPSILON: f64 = 1e-6;

    /// When the first joint rotates, it affects the Y-position and the Z-orientation of the end-effector.
    /// The derivative of the Y-position with respect to the first joint should be 1.
    /// The derivative of the Z-orientation with respect to the first joint should be 1.
    /// No other joint affects the end-effector in this simple robot model.
    pub struct SingleRotaryJointRobot;

    impl Kinematics for SingleRotaryJointRobot {
        fn forward(&self, qs: &Joints) -> Pose {
            let angle = qs[0];
            let rotation = UnitQuaternion::from_euler_angles(0.0, 0.0, angle);
            let translation = Translation3::new(angle.cos(), angle.sin(), 0.0);
            Isometry3::from_parts(translation, rotation)
        }
    }

    fn assert_matrix_approx_eq(left: &Matrix6<f64>, right: &Matrix6<f64>, epsilon: f64) {
        for i in 0..6 {
            for j in 0..6 {
                assert!((left[(i, j)] - right[(i, j)]).abs() < epsilon,
                        "left[{0},{1}] = {2} is not approximately equal to right[{0},{1}] = {3}",
                        i, j, left[(i, j)], right[(i, j)]);
            }
        }
    }

    #[test]
    fn test_compute_jacobian() {
        let robot = SingleRotaryJointRobot;
        let jacobian = compute_jacobian(&robot, &[0.0; 6], EPSILON);
        let mut expected_jacobian = Matrix6::zeros();
        expected_jacobian[(1, 0)] = 1.0; // Y position is affected by the first joint
        expected_jacobian[(5, 0)] = 1.0; // Z orientation is affected by the first joint

        assert_matrix_approx_eq(&jacobian, &expected_jacobian, 1e-5);
    }

    #[test]
    fn test_single_joint_is_singular() {
        let jacobian = Jacobian::new(&SingleRotaryJointRobot, &[0.0; 6]);
        assert!(jacobian.condition_number().is_infinite());
        let twist = Vector6::new(0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(jacobian.velocities_from_vector(&twist).is_none());
    }

    #[test]
    fn test_damped_solution_of_single_joint() {
        let jacobian = Jacobian::new(&SingleRotaryJointRobot, &[0.0; 6]);
        let twist = Vector6::new(0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let qdot = jacobian.damped_velocities_from_vector(&twist, 1e-3);
        // Column is (0,1,0,0,0,1): least squares gives 1 rad/s on the first joint.
        assert!((qdot[0] - 1.0).abs() < 1e-4, "{:?}", qdot);
        for q in &qdot[1..] {
            assert_eq!(*q, 0.0);
        }
    }

    #[test]
    fn test_identity_is_well_conditioned() {
        let jacobian = Jacobian::from_matrix(Matrix6::identity());
        assert!((jacobian.condition_number() - 1.0).abs() < 1e-12);
        let twist = Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let qdot = jacobian.velocities_from_vector(&twist).unwrap();
        assert_eq!(qdot, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
