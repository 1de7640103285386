//! Reference kinematics solver: forward kinematics and geometric Jacobian of a 6 joint
//! revolute chain described by standard Denavit–Hartenberg parameters.

use crate::kinematic_traits::{Joints, Kinematics, Pose};
use crate::parameters::dh_kinematics::Parameters;
use nalgebra::{Isometry3, Matrix6, Translation3, UnitQuaternion, Vector3};

#[derive(Debug, Clone, Copy)]
pub struct DhChain {
    parameters: Parameters,
}

impl DhChain {
    /// Creates a new `DhChain` instance with the given parameters.
    pub fn new(parameters: Parameters) -> Self {
        DhChain { parameters }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Transform of the link `i` relative to the previous link for the given joint value.
    fn link(&self, i: usize, joint: f64) -> Isometry3<f64> {
        let p = &self.parameters;
        let theta = joint * p.sign_corrections[i] as f64 + p.offsets[i];
        let (sin_theta, cos_theta) = theta.sin_cos();

        Isometry3::from_parts(
            Translation3::new(p.a[i] * cos_theta, p.a[i] * sin_theta, p.d[i]),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), theta)
                * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), p.alpha[i]),
        )
    }
}

impl Kinematics for DhChain {
    fn forward(&self, qs: &Joints) -> Pose {
        let mut pose = Pose::identity();
        for (i, q) in qs.iter().enumerate() {
            pose *= self.link(i, *q);
        }
        pose
    }

    /// Geometric Jacobian: for the revolute joint i, the linear column is z_i x (p - o_i)
    /// and the angular column is z_i, with z_i and o_i the joint axis and origin in base.
    fn jacobian(&self, qs: &Joints) -> Matrix6<f64> {
        let mut origins = [Vector3::zeros(); 6];
        let mut axes = [Vector3::z(); 6];
        let mut frame = Pose::identity();
        for i in 0..6 {
            origins[i] = frame.translation.vector;
            axes[i] = frame.rotation * Vector3::z();
            frame *= self.link(i, qs[i]);
        }
        let tip = frame.translation.vector;

        let mut jacobian = Matrix6::zeros();
        for i in 0..6 {
            let sign = self.parameters.sign_corrections[i] as f64;
            let linear = axes[i].cross(&(tip - origins[i])) * sign;
            let angular = axes[i] * sign;
            jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&linear);
            jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&angular);
        }
        jacobian
    }
}
