//! The control loop: lifecycle state machine and the per cycle pipeline
//!
//! raw wrench -> filter -> control frame -> admittance -> differential kinematics -> limits
//!
//! The host calls `configure` and `activate` from its management thread, then `update` once
//! per cycle from the real-time thread. `update` does not allocate and does not block.
//! Nothing is committed until the end of a cycle, so any failure inside the cycle leaves the
//! controller exactly as it was before the cycle began.
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
//! let _tuning = controller.configure(ControllerConfig::default()).unwrap();
//!
//! let joints = JointState::at_rest([0.0, -1.2, 1.5, -1.9, -1.57, 0.3]);
//! controller.activate(&joints).unwrap();
//!
//! let push = Wrench::new(Vector3::new(0.0, 0.0, 5.0), Vector3::zeros(), FrameId::Sensor);
//! let input = CycleInput { joint_state: joints, wrench: push, reference: None };
//! let output = controller.update(Duration::ZERO, Duration::from_millis(2), &input).unwrap();
//! assert!(output.command.is_finite());
//! ```

use std::sync::Arc;
use std::time::Duration;
use nalgebra::Vector6;
use tracing::{debug, error, info, warn};

use crate::admittance::{AdmittanceIntegrator, AdmittanceState};
use crate::config::{ControllerConfig, FailSafe, RuntimeParameters};
use crate::error::ControlError;
use crate::filter::WrenchFilter;
use crate::frame::{FrameId, FrameProvider};
use crate::handoff::{ParameterBuffer, ParameterWriter};
use crate::kinematic_traits::{Joints, Kinematics, Pose};
use crate::kinematics_bridge::KinematicsBridge;
use crate::limits::{clamp, JointCommand, LimitViolation};
use crate::utils::{is_valid, pose_error};
use crate::wrench::{Twist, Wrench};

/// Lifecycle mode of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    Inactive,
    Activating,
    Active,
    Error,
}

/// Measured state of the controlled joints, in the configured joint order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointState {
    pub positions: Joints,
    pub velocities: Joints,
    pub efforts: Option<Joints>,
}

impl JointState {
    pub fn new(positions: Joints, velocities: Joints) -> Self {
        Self { positions, velocities, efforts: None }
    }

    pub fn at_rest(positions: Joints) -> Self {
        Self::new(positions, [0.0; 6])
    }

    /// Builds the state from values reported per joint name in any order.
    pub fn from_named(joint_names: &[String; 6], names: &[&str], positions: &[f64],
                      velocities: &[f64]) -> Result<Self, ControlError> {
        if names.len() != positions.len() || names.len() != velocities.len() {
            return Err(ControlError::invalid_config(format!(
                "joint state has {} names, {} positions and {} velocities",
                names.len(), positions.len(), velocities.len())));
        }
        let mut state = Self::at_rest([0.0; 6]);
        for (i, joint) in joint_names.iter().enumerate() {
            let index = names.iter().position(|n| n == joint).ok_or_else(||
                ControlError::invalid_config(format!("joint state lacks joint '{}'", joint)))?;
            state.positions[i] = positions[index];
            state.velocities[i] = velocities[index];
        }
        Ok(state)
    }

    pub fn is_finite(&self) -> bool {
        is_valid(&self.positions) && is_valid(&self.velocities)
    }
}

/// Desired end-effector motion: pose in base and twist in base orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reference {
    pub pose: Pose,
    pub twist: Twist,
}

/// Everything the controller reads in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleInput {
    pub joint_state: JointState,

    /// Raw sensor reading, normally tagged `FrameId::Sensor`.
    pub wrench: Wrench,

    /// Desired motion. If absent, the end-effector pose captured at activation is held.
    pub reference: Option<Reference>,
}

/// What the controller produced in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleOutput {
    pub command: JointCommand,
    pub mode: ControllerMode,
    pub violations: LimitViolation,

    /// True if the Jacobian was beyond the singularity threshold this cycle.
    pub singular: bool,

    pub condition_number: f64,
}

struct Setup {
    config: ControllerConfig,
    frames: FrameProvider,
    bridge: KinematicsBridge,
    parameters: ParameterBuffer<RuntimeParameters>,
}

pub struct AdmittanceController {
    robot: Arc<dyn Kinematics>,
    mode: ControllerMode,
    setup: Option<Setup>,
    integrator: AdmittanceIntegrator,
    filter: WrenchFilter,
    reference: Option<Reference>,
    last_command: Option<JointCommand>,
    last_violations: LimitViolation,
    last_singular: bool,
}

impl AdmittanceController {
    pub fn new(robot: Arc<dyn Kinematics>) -> Self {
        Self {
            robot,
            mode: ControllerMode::Inactive,
            setup: None,
            integrator: AdmittanceIntegrator::new(),
            filter: WrenchFilter::new(Default::default()),
            reference: None,
            last_command: None,
            last_violations: LimitViolation::empty(),
            last_singular: false,
        }
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    pub fn admittance_state(&self) -> &AdmittanceState {
        self.integrator.state()
    }

    /// Reference held when the cycle input carries none.
    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    /// Last command handed out: the safe output to write if `update` returned an error.
    pub fn last_command(&self) -> Option<&JointCommand> {
        self.last_command.as_ref()
    }

    pub fn config(&self) -> Option<&ControllerConfig> {
        self.setup.as_ref().map(|s| &s.config)
    }

    pub fn frames(&self) -> Option<&FrameProvider> {
        self.setup.as_ref().map(|s| &s.frames)
    }

    pub fn robot(&self) -> &dyn Kinematics {
        self.robot.as_ref()
    }

    /// Handle for retuning admittance and filter while active.
    pub fn parameter_writer(&self) -> Option<ParameterWriter<RuntimeParameters>> {
        self.setup.as_ref().map(|s| s.parameters.writer())
    }

    /// Validates and adopts the configuration. Allowed only while inactive; on failure the
    /// previous configuration (if any) stays.
    pub fn configure(&mut self, config: ControllerConfig)
                     -> Result<ParameterWriter<RuntimeParameters>, ControlError> {
        if self.mode != ControllerMode::Inactive {
            return Err(ControlError::InvalidTransition { mode: self.mode, event: "configure" });
        }
        config.validate()?;
        let frames = FrameProvider::new(&config.frames)?;
        let bridge = KinematicsBridge::new(Arc::clone(&self.robot), config.singularity);
        let parameters = ParameterBuffer::with_validation(config.runtime_parameters(),
                                                          RuntimeParameters::validate);
        let writer = parameters.writer();

        self.filter = WrenchFilter::new(config.filter);
        info!(joints = ?config.joint_names, dt = config.dt, "admittance controller configured");
        self.setup = Some(Setup { config, frames, bridge, parameters });
        Ok(writer)
    }

    /// Inactive -> Activating -> Active. The admittance state is zeroed and the current
    /// end-effector pose becomes the held reference. On failure the controller stays inactive.
    pub fn activate(&mut self, joint_state: &JointState) -> Result<(), ControlError> {
        if self.mode != ControllerMode::Inactive {
            return Err(ControlError::InvalidTransition { mode: self.mode, event: "activate" });
        }
        let Some(setup) = self.setup.as_mut() else {
            return Err(ControlError::invalid_config("controller is not configured"));
        };
        self.mode = ControllerMode::Activating;

        let checked = Self::check_activation(setup, joint_state);
        let flange = match checked {
            Ok(flange) => flange,
            Err(e) => {
                self.mode = ControllerMode::Inactive;
                warn!(error = %e, "activation refused");
                return Err(e);
            }
        };

        setup.parameters.reset(setup.config.runtime_parameters());
        setup.parameters.try_adopt();
        self.filter = WrenchFilter::new(setup.parameters.active().filter);
        self.integrator.reset();
        self.reference = Some(Reference {
            pose: setup.frames.pose_in_base(FrameId::EndEffector, &flange),
            twist: Twist::zero(FrameId::Base),
        });
        self.last_command = Some(JointCommand::hold(joint_state.positions));
        self.last_violations = LimitViolation::empty();
        self.last_singular = false;
        self.mode = ControllerMode::Active;
        info!("admittance controller active");
        Ok(())
    }

    fn check_activation(setup: &Setup, joint_state: &JointState) -> Result<Pose, ControlError> {
        if !joint_state.is_finite() {
            return Err(ControlError::invalid_config("joint state is not finite"));
        }
        if !setup.config.limits.compliant(&joint_state.positions) {
            return Err(ControlError::invalid_config("joint state is outside the joint limits"));
        }
        let flange = setup.bridge.forward(&joint_state.positions);
        if !flange.translation.vector.iter().all(|v| v.is_finite())
            || !flange.rotation.coords.iter().all(|v| v.is_finite()) {
            return Err(ControlError::invalid_config("forward kinematics is not finite"));
        }
        setup.config.runtime_parameters().validate()?;
        Ok(flange)
    }

    /// Active -> Inactive. Admittance and filter state are discarded.
    pub fn deactivate(&mut self) -> Result<(), ControlError> {
        match self.mode {
            ControllerMode::Inactive => Ok(()),
            ControllerMode::Active | ControllerMode::Activating => {
                self.integrator.reset();
                self.filter.reset();
                self.mode = ControllerMode::Inactive;
                info!("admittance controller inactive");
                Ok(())
            }
            ControllerMode::Error => Err(ControlError::InvalidTransition { mode: self.mode, event: "deactivate" }),
        }
    }

    /// Error -> Inactive.
    pub fn reset(&mut self) -> Result<(), ControlError> {
        if self.mode != ControllerMode::Error {
            return Err(ControlError::InvalidTransition { mode: self.mode, event: "reset" });
        }
        self.integrator.reset();
        self.filter.reset();
        self.mode = ControllerMode::Inactive;
        info!("admittance controller reset after error");
        Ok(())
    }

    /// One control cycle. `period` is the time since the previous cycle; if it is zero the
    /// configured cycle period is used.
    ///
    /// * Active: runs the pipeline. A singularity under the reject policy holds the last
    ///   command for this cycle. A numerical instability switches to `ControllerMode::Error`
    ///   and returns the error; `last_command` then holds the fail-safe output.
    /// * Error: returns the frozen fail-safe command.
    /// * Inactive, Activating: `ControlError::NotActive`.
    pub fn update(&mut self, time: Duration, period: Duration, input: &CycleInput)
                  -> Result<CycleOutput, ControlError> {
        match self.mode {
            ControllerMode::Active => {
                let result = self.cycle(time, period, input);
                if let Err(e) = &result {
                    if e.is_fatal_in_cycle() {
                        self.enter_error(&input.joint_state.positions);
                    }
                }
                result
            }
            ControllerMode::Error => Ok(self.hold_output(ControllerMode::Error, false, f64::NAN)),
            mode => Err(ControlError::NotActive(mode)),
        }
    }

    /// Freezes the fail-safe command and switches to the error mode.
    fn enter_error(&mut self, measured: &Joints) {
        let fail_safe = match self.setup.as_ref().map(|s| s.config.fail_safe) {
            Some(FailSafe::HoldLastCommand) | None => {
                self.last_command.map(|c| c.positions).unwrap_or(*measured)
            }
            Some(FailSafe::HoldPosition) => *measured,
        };
        self.last_command = Some(JointCommand::hold(fail_safe));
        self.mode = ControllerMode::Error;
    }

    fn hold_output(&self, mode: ControllerMode, singular: bool, condition_number: f64) -> CycleOutput {
        let command = self.last_command.map(|c| JointCommand::hold(c.positions))
            .unwrap_or(JointCommand::hold([0.0; 6]));
        CycleOutput {
            command,
            mode,
            violations: self.last_violations,
            singular,
            condition_number,
        }
    }

    fn cycle(&mut self, time: Duration, period: Duration, input: &CycleInput)
             -> Result<CycleOutput, ControlError> {
        let Some(setup) = self.setup.as_mut() else {
            return Err(ControlError::NotActive(self.mode));
        };

        if setup.parameters.try_adopt() {
            self.filter.set_settings(setup.parameters.active().filter);
            debug!("adopted new admittance parameters");
        }
        let parameters = *setup.parameters.active();
        let config = &setup.config;
        let frames = &setup.frames;

        let dt = {
            let p = period.as_secs_f64();
            if p > 0.0 && p.is_finite() { p } else { config.dt }
        };

        let q = input.joint_state.positions;
        let flange = setup.bridge.forward(&q);
        let flange_valid = flange.translation.vector.iter().all(|v| v.is_finite())
            && flange.rotation.coords.iter().all(|v| v.is_finite());
        if !input.joint_state.is_finite() || !flange_valid {
            if !self.last_violations.contains(LimitViolation::NON_FINITE) {
                warn!(?time, "joint state is not usable, holding the last command");
            }
            self.last_violations = LimitViolation::NON_FINITE;
            return Ok(self.hold_output(ControllerMode::Active, false, f64::NAN));
        }

        // Wrench: sensor frame compensation and filtering, then into the control frame.
        let raw = frames.wrench_to(FrameId::Sensor, &input.wrench, &flange);
        if let Some(payload) = &config.payload {
            let sensor_in_base = frames.pose_in_base(FrameId::Sensor, &flange).rotation;
            self.filter.set_gravity_offset(payload.gravity_wrench(&sensor_in_base, &config.gravity));
        }
        let mut filter = self.filter.clone();
        let filtered = filter.filter(&raw, dt);
        // Moments are taken about the end-effector, where the compliance acts; the control
        // frame only gives the axes.
        let at_end_effector = frames.wrench_to(FrameId::EndEffector, &filtered, &flange);
        let to_control = frames.transform(FrameId::Control, FrameId::EndEffector, &flange).rotation;
        let wrench = Wrench::new(to_control * at_end_effector.force, to_control * at_end_effector.torque,
                                 FrameId::Control);

        let reference = match (input.reference, self.reference) {
            (Some(reference), _) => reference,
            (None, Some(held)) => held,
            (None, None) => Reference {
                pose: frames.pose_in_base(FrameId::EndEffector, &flange),
                twist: Twist::zero(FrameId::Base),
            },
        };
        let reference_twist = if reference.twist.frame == FrameId::Base {
            reference.twist
        } else {
            let rotation = frames.pose_in_base(reference.twist.frame, &flange).rotation;
            Twist::new(rotation * reference.twist.linear, rotation * reference.twist.angular, FrameId::Base)
        };
        let control_in_base = frames.pose_in_base(FrameId::Control, &flange).rotation;

        let mut integrator = self.integrator.clone();
        let motion = match integrator.step(&wrench, dt, &reference.pose, &reference_twist,
                                           &parameters.admittance, &control_in_base) {
            Ok(motion) => motion,
            Err(e) => {
                error!(?time, error = %e, force = ?wrench.force, torque = ?wrench.torque,
                       "admittance diverged");
                return Err(e);
            }
        };

        // Twist of the end-effector point with feedback toward the compliant pose, then moved
        // to the flange origin the Jacobian refers to: v_f = v_e + w x (p_f - p_e).
        let end_effector = frames.pose_in_base(FrameId::EndEffector, &flange);
        // The error is corrected within one cycle at most, whatever period the host runs at.
        let feedback_gain = config.pose_feedback_gain.min(1.0 / dt);
        let command_twist = motion.twist.to_vector()
            + pose_error(&motion.pose, &end_effector) * feedback_gain;
        let angular = command_twist.fixed_rows::<3>(3).clone_owned();
        let lever = flange.translation.vector - end_effector.translation.vector;
        let linear = command_twist.fixed_rows::<3>(0) + angular.cross(&lever);
        let flange_twist = Vector6::new(linear.x, linear.y, linear.z, angular.x, angular.y, angular.z);

        let solution = match setup.bridge.inverse_velocity(&flange_twist, &q) {
            Ok(solution) => solution,
            Err(ControlError::Singularity { condition_number, threshold }) => {
                if !self.last_singular {
                    warn!(?time, condition_number, threshold, "singular configuration, holding the last command");
                }
                self.last_singular = true;
                return Ok(self.hold_output(ControllerMode::Active, true, condition_number));
            }
            Err(e) => return Err(e),
        };
        if solution.damped && !self.last_singular {
            warn!(?time, condition_number = solution.condition_number, "singular configuration, using damped least squares");
        }

        let position_command = KinematicsBridge::integrate(&q, &solution.velocities, dt);
        let safe = clamp(&position_command, &solution.velocities, &q, &config.limits, config.speed_scaling);
        if safe.violations != self.last_violations && !safe.violations.is_empty() {
            warn!(?time, violations = ?safe.violations, scale = safe.velocity_scale, "joint command limited");
        }

        // Commit.
        self.integrator = integrator;
        self.filter = filter;
        self.last_command = Some(safe.command);
        self.last_violations = safe.violations;
        self.last_singular = solution.damped;

        Ok(CycleOutput {
            command: safe.command,
            mode: ControllerMode::Active,
            violations: safe.violations,
            singular: solution.damped,
            condition_number: solution.condition_number,
        })
    }
}
