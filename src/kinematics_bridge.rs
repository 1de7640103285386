//! Maps the compliant Cartesian motion into joint space.
//!
//! Velocity based: the joint velocity command is the differential inverse of the Cartesian
//! command twist, and the joint position command integrates it over one cycle from the
//! measured joint positions. No positional inverse kinematics is solved, so there is no
//! multiple solution ambiguity and the cost per cycle is one SVD and one 6x6 solve.

use std::sync::Arc;
use nalgebra::Vector6;
use crate::error::ControlError;
use crate::jacobian::Jacobian;
use crate::kinematic_traits::{Joints, Kinematics, Pose};
use crate::utils::is_valid;

/// What to do when the Jacobian condition number exceeds the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingularityPolicy {
    /// Use the damped least squares solution, which stays bounded near singularities.
    DampedLeastSquares,

    /// Report `ControlError::Singularity`; the controller then holds the last command.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingularitySettings {
    /// Condition number above which the Jacobian is considered singular.
    pub condition_threshold: f64,

    /// Damping factor λ of the damped least squares solution.
    pub damping: f64,

    pub policy: SingularityPolicy,
}

impl Default for SingularitySettings {
    fn default() -> Self {
        Self {
            condition_threshold: 100.0,
            damping: 0.05,
            policy: SingularityPolicy::DampedLeastSquares,
        }
    }
}

impl SingularitySettings {
    pub fn validate(&self) -> Result<(), ControlError> {
        if !(self.condition_threshold >= 1.0) {
            return Err(ControlError::invalid_config(format!(
                "condition number threshold must be at least 1 (got {})", self.condition_threshold)));
        }
        if !self.damping.is_finite() || self.damping <= 0.0 {
            return Err(ControlError::invalid_config(format!(
                "damped least squares factor must be finite and positive (got {})", self.damping)));
        }
        Ok(())
    }
}

/// Joint velocities solving the command twist, with the conditioning they were obtained at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointVelocitySolution {
    pub velocities: Joints,
    pub condition_number: f64,

    /// True if the damped least squares approximation was used.
    pub damped: bool,
}

#[derive(Clone)]
pub struct KinematicsBridge {
    robot: Arc<dyn Kinematics>,
    settings: SingularitySettings,
}

impl KinematicsBridge {
    pub fn new(robot: Arc<dyn Kinematics>, settings: SingularitySettings) -> Self {
        Self { robot, settings }
    }

    pub fn robot(&self) -> &dyn Kinematics {
        self.robot.as_ref()
    }

    pub fn settings(&self) -> &SingularitySettings {
        &self.settings
    }

    /// Flange pose for the joint positions.
    pub fn forward(&self, joints: &Joints) -> Pose {
        self.robot.forward(joints)
    }

    /// Joint velocities that realize the twist of the flange (linear velocity of the flange
    /// origin and angular velocity, both in base).
    pub fn inverse_velocity(&self, twist: &Vector6<f64>, joints: &Joints)
                            -> Result<JointVelocitySolution, ControlError> {
        let jacobian = Jacobian::new(self.robot.as_ref(), joints);
        let condition_number = jacobian.condition_number();
        let singular = !(condition_number <= self.settings.condition_threshold);

        if singular && self.settings.policy == SingularityPolicy::Reject {
            return Err(ControlError::Singularity {
                condition_number,
                threshold: self.settings.condition_threshold,
            });
        }

        let exact = if singular { None } else { jacobian.velocities_from_vector(twist) };
        let (velocities, damped) = match exact {
            Some(velocities) => (velocities, false),
            None => (jacobian.damped_velocities_from_vector(twist, self.settings.damping), true),
        };

        if !is_valid(&velocities) {
            return Err(ControlError::Singularity {
                condition_number,
                threshold: self.settings.condition_threshold,
            });
        }
        Ok(JointVelocitySolution { velocities, condition_number, damped })
    }

    /// Position command reached by moving with the given joint velocities for `dt`.
    pub fn integrate(joints: &Joints, velocities: &Joints, dt: f64) -> Joints {
        std::array::from_fn(|i| joints[i] + velocities[i] * dt)
    }
}
