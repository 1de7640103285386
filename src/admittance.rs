//! Admittance dynamics: a virtual mass-damper-spring per Cartesian axis of the control frame,
//!
//! M a + D v + K x = F
//!
//! integrated once per cycle with semi-implicit (symplectic) Euler. `x` is the offset of the
//! compliant pose from the desired pose. The rotational part of the offset is carried as a
//! unit quaternion and exposed as a rotation vector; each cycle it is advanced by the small
//! rotation `v_rot * dt` and renormalized.

use nalgebra::{UnitQuaternion, Vector3, Vector6};
use crate::error::ControlError;
use crate::frame::FrameId;
use crate::kinematic_traits::Pose;
use crate::wrench::{Twist, Wrench};

/// Per-axis virtual dynamics of the admittance, in the control frame, ordered
/// (x, y, z, rx, ry, rz).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmittanceParameters {
    /// kg for linear axes, kg·m² for rotational
    pub mass: [f64; 6],

    /// N·s/m for linear axes, N·m·s/rad for rotational
    pub damping: [f64; 6],

    /// N/m for linear axes, N·m/rad for rotational
    pub stiffness: [f64; 6],

    /// Axes that yield to the wrench. Others are held rigidly on the desired trajectory.
    pub selected: [bool; 6],
}

impl AdmittanceParameters {
    /// Same dynamics on all axes, all axes compliant.
    pub fn uniform(mass: f64, damping: f64, stiffness: f64) -> Self {
        Self {
            mass: [mass; 6],
            damping: [damping; 6],
            stiffness: [stiffness; 6],
            selected: [true; 6],
        }
    }

    /// All coefficients must be finite and strictly positive.
    pub fn validate(&self) -> Result<(), ControlError> {
        for (name, values) in [("mass", &self.mass), ("damping", &self.damping), ("stiffness", &self.stiffness)] {
            for (axis, value) in values.iter().enumerate() {
                if !value.is_finite() || *value <= 0.0 {
                    return Err(ControlError::invalid_config(format!(
                        "admittance {}[{}] must be finite and positive (got {})", name, axis, value)));
                }
            }
        }
        Ok(())
    }
}

impl Default for AdmittanceParameters {
    fn default() -> Self {
        Self {
            mass: [3.0, 3.0, 3.0, 0.05, 0.05, 0.05],
            damping: [100.0, 100.0, 100.0, 1.5, 1.5, 1.5],
            stiffness: [200.0, 200.0, 200.0, 10.0, 10.0, 10.0],
            selected: [true; 6],
        }
    }
}

/// Integrator state carried between cycles, in the control frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmittanceState {
    /// Linear offset (m) and rotation vector (rad) of the compliant pose from the desired pose.
    pub position: Vector6<f64>,

    pub velocity: Vector6<f64>,

    pub acceleration: Vector6<f64>,

    /// Rotational offset, the source of truth for `position[3..6]`.
    rotation: UnitQuaternion<f64>,
}

impl AdmittanceState {
    pub fn zero() -> Self {
        Self {
            position: Vector6::zeros(),
            velocity: Vector6::zeros(),
            acceleration: Vector6::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn rotation(&self) -> &UnitQuaternion<f64> {
        &self.rotation
    }

    pub fn is_zero(&self) -> bool {
        self.position == Vector6::zeros()
            && self.velocity == Vector6::zeros()
            && self.acceleration == Vector6::zeros()
    }
}

impl Default for AdmittanceState {
    fn default() -> Self {
        Self::zero()
    }
}

/// Corrected motion produced by one integration step, in the base frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompliantMotion {
    pub pose: Pose,
    pub twist: Twist,
}

#[derive(Debug, Clone, Default)]
pub struct AdmittanceIntegrator {
    state: AdmittanceState,
}

impl AdmittanceIntegrator {
    pub fn new() -> Self {
        Self { state: AdmittanceState::zero() }
    }

    pub fn state(&self) -> &AdmittanceState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = AdmittanceState::zero();
    }

    /// Advances the admittance by `dt`.
    ///
    /// * `wrench` - filtered wrench, expressed in the control frame
    /// * `desired_pose`, `desired_twist` - nominal motion in the base frame
    /// * `control_in_base` - orientation of the control frame in the base frame
    ///
    /// Axes not selected in `params` pass the desired motion through. If any resulting value
    /// is non-finite the state is left as it was and `NumericalInstability` is returned.
    pub fn step(&mut self, wrench: &Wrench, dt: f64,
                desired_pose: &Pose, desired_twist: &Twist,
                params: &AdmittanceParameters,
                control_in_base: &UnitQuaternion<f64>) -> Result<CompliantMotion, ControlError> {
        let force = wrench.to_vector();
        let previous = &self.state;
        let x = previous.position;

        let mut acceleration = Vector6::zeros();
        let mut velocity = Vector6::zeros();
        for i in 0..6 {
            if params.selected[i] {
                acceleration[i] = (force[i] - params.damping[i] * previous.velocity[i]
                    - params.stiffness[i] * x[i]) / params.mass[i];
                velocity[i] = previous.velocity[i] + acceleration[i] * dt;
            }
        }

        let mut position = Vector6::zeros();
        for i in 0..3 {
            if params.selected[i] {
                position[i] = x[i] + velocity[i] * dt;
            }
        }

        let angular_step: Vector3<f64> = velocity.fixed_rows::<3>(3) * dt;
        let mut rotation = if angular_step.iter().all(|v| v.is_finite()) {
            UnitQuaternion::from_scaled_axis(angular_step) * previous.rotation
        } else {
            previous.rotation
        };
        rotation.renormalize();
        let mut rotation_vector = rotation.scaled_axis();
        // Axes held rigid must not accumulate rotation through the composition.
        for i in 0..3 {
            if !params.selected[3 + i] {
                rotation_vector[i] = 0.0;
            }
        }
        rotation = UnitQuaternion::from_scaled_axis(rotation_vector);
        position.fixed_rows_mut::<3>(3).copy_from(&rotation_vector);

        for i in 0..6 {
            if !(position[i].is_finite() && velocity[i].is_finite() && acceleration[i].is_finite()) {
                return Err(ControlError::NumericalInstability {
                    axis: i,
                    position: position[i],
                    velocity: velocity[i],
                    acceleration: acceleration[i],
                });
            }
        }

        self.state = AdmittanceState { position, velocity, acceleration, rotation };

        let linear_offset = control_in_base * Vector3::new(position[0], position[1], position[2]);
        let angular_offset = control_in_base * rotation_vector;
        let linear_velocity = control_in_base * Vector3::new(velocity[0], velocity[1], velocity[2]);
        let angular_velocity = control_in_base * Vector3::new(velocity[3], velocity[4], velocity[5]);

        let mut pose = *desired_pose;
        pose.translation.vector += linear_offset;
        pose.rotation = UnitQuaternion::from_scaled_axis(angular_offset) * desired_pose.rotation;

        let twist = Twist::new(desired_twist.linear + linear_velocity,
                               desired_twist.angular + angular_velocity,
                               FrameId::Base);
        Ok(CompliantMotion { pose, twist })
    }
}
