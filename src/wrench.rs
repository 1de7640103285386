//! Frame tagged spatial vectors: wrench (force, torque) and twist (linear, angular velocity).
//! Both use the (linear x,y,z; angular x,y,z) ordering when converted to `Vector6`.

use nalgebra::{Isometry3, Vector3, Vector6};
use crate::frame::FrameId;

/// Combined force and torque, expressed in the frame it is tagged with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wrench {
    pub force: Vector3<f64>,
    pub torque: Vector3<f64>,
    pub frame: FrameId,
}

/// Combined linear and angular velocity, expressed in the frame it is tagged with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
    pub frame: FrameId,
}

impl Wrench {
    pub fn new(force: Vector3<f64>, torque: Vector3<f64>, frame: FrameId) -> Self {
        Self { force, torque, frame }
    }

    pub fn zero(frame: FrameId) -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros(), frame)
    }

    pub fn from_vector(v: &Vector6<f64>, frame: FrameId) -> Self {
        Self::new(v.fixed_rows::<3>(0).clone_owned(), v.fixed_rows::<3>(3).clone_owned(), frame)
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(self.force.x, self.force.y, self.force.z,
                     self.torque.x, self.torque.y, self.torque.z)
    }

    pub fn is_finite(&self) -> bool {
        self.force.iter().chain(self.torque.iter()).all(|v| v.is_finite())
    }

    /// Re-expresses the wrench in `target`. The `transform` maps coordinates of the frame
    /// the wrench is currently in into `target` coordinates: f' = R f, t' = R t + p x f'.
    pub fn transformed(&self, transform: &Isometry3<f64>, target: FrameId) -> Self {
        let force = transform.rotation * self.force;
        let torque = transform.rotation * self.torque
            + transform.translation.vector.cross(&force);
        Self::new(force, torque, target)
    }
}

impl Twist {
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>, frame: FrameId) -> Self {
        Self { linear, angular, frame }
    }

    pub fn zero(frame: FrameId) -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros(), frame)
    }

    pub fn from_vector(v: &Vector6<f64>, frame: FrameId) -> Self {
        Self::new(v.fixed_rows::<3>(0).clone_owned(), v.fixed_rows::<3>(3).clone_owned(), frame)
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(self.linear.x, self.linear.y, self.linear.z,
                     self.angular.x, self.angular.y, self.angular.z)
    }

    pub fn is_finite(&self) -> bool {
        self.linear.iter().chain(self.angular.iter()).all(|v| v.is_finite())
    }

    /// Re-expresses the twist in `target`, moving the reference point to the origin of
    /// `target`: w' = R w, v' = R v + p x w'.
    pub fn transformed(&self, transform: &Isometry3<f64>, target: FrameId) -> Self {
        let angular = transform.rotation * self.angular;
        let linear = transform.rotation * self.linear
            + transform.translation.vector.cross(&angular);
        Self::new(linear, angular, target)
    }
}
