//! Real-time admittance control for six-axis robot arms
//!
//! The controller makes a position-controlled arm yield to external forces as if the
//! end-effector were a mass on a spring and damper: each axis of the control frame follows
//!
//! ```text
//! M a + D v + K x = F
//! ```
//!
//! where `F` is the filtered wrench measured by a force/torque sensor and `x` is the
//! compliant offset from the desired trajectory. The offset is mapped to joint position and
//! velocity commands through the manipulator Jacobian, and the commands are made safe against
//! the joint limits before they are handed to the hardware.
//!
//! # Features
//!
//! - Semi-implicit Euler integration of the admittance per axis; rotational offset kept as a
//!   unit quaternion so large rotations do not drift.
//! - Selection of compliant axes: unselected axes follow the desired trajectory rigidly.
//! - Sensor, end-effector and control frames may be mounted anywhere on the flange or fixed
//!   in the workcell; wrenches and twists are transformed between them.
//! - Sensor bias, payload gravity compensation, low-pass filter and deadband.
//! - Velocity-level differential kinematics with condition number monitoring and either
//!   damped least squares or rejection near singularities.
//! - Joint limit enforcement that scales all joint velocities by a common factor, so the
//!   direction of the motion is preserved.
//! - Lifecycle state machine and non-blocking hand-off of new tuning from another thread.
//! - Denavit-Hartenberg kinematics with the parameters of Universal Robots e-Series arms;
//!   any other arm can be used by implementing `Kinematics`.
//! - Configuration from YAML and joint limits from URDF (feature `allow_filesystem`).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nalgebra::Vector3;
//! use rs_admittance_control::config::ControllerConfig;
//! use rs_admittance_control::controller::{AdmittanceController, CycleInput, JointState};
//! use rs_admittance_control::frame::FrameId;
//! use rs_admittance_control::kinematics_impl::DhChain;
//! use rs_admittance_control::parameters::dh_kinematics::Parameters;
//! use rs_admittance_control::wrench::Wrench;
//!
//! let mut controller = AdmittanceController::new(Arc::new(DhChain::new(Parameters::ur5e())));
//! let tuning = controller.configure(ControllerConfig::default()).unwrap();
//!
//! let mut joints = JointState::at_rest([0.0, -1.2, 1.5, -1.9, -1.57, 0.3]);
//! controller.activate(&joints).unwrap();
//!
//! // Retune from any thread; adopted at the start of a later cycle.
//! let mut softer = controller.config().unwrap().runtime_parameters();
//! softer.admittance.stiffness = [50.0, 50.0, 50.0, 5.0, 5.0, 5.0];
//! tuning.publish(softer).unwrap();
//!
//! let push = Wrench::new(Vector3::new(5.0, 0.0, 0.0), Vector3::zeros(), FrameId::Sensor);
//! for cycle in 0..10u32 {
//!     let input = CycleInput { joint_state: joints, wrench: push, reference: None };
//!     let output = controller.update(Duration::from_millis(2 * cycle as u64),
//!                                    Duration::from_millis(2), &input).unwrap();
//!     joints.positions = output.command.positions;
//! }
//! ```

pub mod parameters;
pub mod parameters_robots;

#[path = "utils/utils.rs"]
pub mod utils;
pub mod kinematic_traits;
pub mod kinematics_impl;

pub mod jacobian;

pub mod error;

pub mod wrench;

pub mod frame;

pub mod filter;

pub mod admittance;

pub mod kinematics_bridge;

pub mod limits;

pub mod handoff;

pub mod config;

#[cfg(feature = "allow_filesystem")]
pub mod config_from_file;

#[cfg(feature = "allow_filesystem")]
pub mod urdf;

pub mod controller;

pub mod simulation;

#[cfg(test)]
#[cfg(feature = "allow_filesystem")]
mod tests;
