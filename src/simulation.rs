//! Closed loop of the controller with an ideal arm that reaches every command by the next
//! cycle. Used by the command line demo and by the scenario tests.

use std::time::Duration;
use tracing::debug;
use crate::controller::{AdmittanceController, CycleInput, CycleOutput, JointState, Reference};
use crate::error::ControlError;
use crate::frame::FrameId;
use crate::kinematic_traits::{Joints, Pose};
use crate::limits::JointCommand;
use crate::wrench::Wrench;

/// Arm that tracks the command perfectly.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedArm {
    state: JointState,
}

impl SimulatedArm {
    pub fn new(positions: Joints) -> Self {
        Self { state: JointState::at_rest(positions) }
    }

    pub fn state(&self) -> &JointState {
        &self.state
    }

    pub fn apply(&mut self, command: &JointCommand) {
        self.state.positions = command.positions;
        self.state.velocities = command.velocities;
    }
}

pub struct Simulation {
    controller: AdmittanceController,
    arm: SimulatedArm,
    period: Duration,
    time: Duration,
    cycles: u64,
}

impl Simulation {
    /// Activates the configured controller at the given joint positions.
    pub fn new(mut controller: AdmittanceController, positions: Joints) -> Result<Self, ControlError> {
        let arm = SimulatedArm::new(positions);
        controller.activate(arm.state())?;
        let dt = controller.config().map(|c| c.dt)
            .ok_or_else(|| ControlError::invalid_config("controller is not configured"))?;
        Ok(Self {
            controller,
            arm,
            period: Duration::from_secs_f64(dt),
            time: Duration::ZERO,
            cycles: 0,
        })
    }

    pub fn controller(&self) -> &AdmittanceController {
        &self.controller
    }

    pub fn arm(&self) -> &SimulatedArm {
        &self.arm
    }

    pub fn time(&self) -> Duration {
        self.time
    }

    /// Pose of the frame in base for the current arm joints.
    pub fn pose(&self, frame: FrameId) -> Option<Pose> {
        let frames = self.controller.frames()?;
        let flange = self.controller.robot().forward(&self.arm.state().positions);
        Some(frames.pose_in_base(frame, &flange))
    }

    /// One cycle holding the reference captured at activation. On error the arm is given the
    /// controller's safe command before the error is returned.
    pub fn step(&mut self, wrench: &Wrench) -> Result<CycleOutput, ControlError> {
        self.step_with_reference(wrench, None)
    }

    pub fn step_with_reference(&mut self, wrench: &Wrench, reference: Option<Reference>)
                               -> Result<CycleOutput, ControlError> {
        let input = CycleInput { joint_state: *self.arm.state(), wrench: *wrench, reference };
        let result = self.controller.update(self.time, self.period, &input);
        self.time += self.period;
        self.cycles += 1;
        match result {
            Ok(output) => {
                self.arm.apply(&output.command);
                Ok(output)
            }
            Err(e) => {
                if let Some(command) = self.controller.last_command() {
                    self.arm.apply(command);
                }
                Err(e)
            }
        }
    }

    /// Runs the given number of cycles with a constant wrench, returning the last output.
    pub fn run(&mut self, wrench: &Wrench, cycles: u64) -> Result<Option<CycleOutput>, ControlError> {
        let mut last = None;
        for _ in 0..cycles {
            last = Some(self.step(wrench)?);
        }
        debug!(cycles = self.cycles, time = ?self.time, "simulation advanced");
        Ok(last)
    }
}
