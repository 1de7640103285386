//! Configuration the controller is given at configure time.

use crate::admittance::AdmittanceParameters;
use crate::error::ControlError;
use crate::filter::{FilterSettings, Payload, STANDARD_GRAVITY};
use crate::frame::FrameConfig;
use crate::kinematics_bridge::SingularitySettings;
use crate::limits::JointLimits;
use nalgebra::Vector3;

/// Output while the controller is in the error mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailSafe {
    /// Repeat the last command that passed the safety checks, with zero velocity.
    HoldLastCommand,

    /// Command the joint positions measured when the error occurred.
    HoldPosition,
}

/// Parameters that may be retuned while the controller is active. Published through
/// `ParameterWriter` and adopted whole at the start of a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeParameters {
    pub admittance: AdmittanceParameters,
    pub filter: FilterSettings,
}

impl RuntimeParameters {
    pub fn validate(&self) -> Result<(), ControlError> {
        self.admittance.validate()?;
        self.filter.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Names of the controlled joints, in the order the kinematics expects them.
    pub joint_names: [String; 6],

    pub limits: JointLimits,

    pub frames: FrameConfig,

    pub admittance: AdmittanceParameters,

    pub filter: FilterSettings,

    /// Mass after the sensor whose weight is compensated, if any.
    pub payload: Option<Payload>,

    /// Gravity in the base frame, m/s².
    pub gravity: Vector3<f64>,

    pub singularity: SingularitySettings,

    /// Nominal cycle period, s.
    pub dt: f64,

    /// Gain (1/s) of the feedback that pulls the measured pose toward the compliant pose.
    pub pose_feedback_gain: f64,

    /// Fraction (0, 1] of the joint velocity limits that may be used.
    pub speed_scaling: f64,

    pub fail_safe: FailSafe,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            joint_names: std::array::from_fn(|i| format!("joint{}", i + 1)),
            limits: JointLimits::default(),
            frames: FrameConfig::default(),
            admittance: AdmittanceParameters::default(),
            filter: FilterSettings::default(),
            payload: None,
            gravity: STANDARD_GRAVITY,
            singularity: SingularitySettings::default(),
            dt: 0.002,
            pose_feedback_gain: 10.0,
            speed_scaling: 1.0,
            fail_safe: FailSafe::HoldLastCommand,
        }
    }
}

impl ControllerConfig {
    pub fn runtime_parameters(&self) -> RuntimeParameters {
        RuntimeParameters { admittance: self.admittance, filter: self.filter }
    }

    /// Checks everything that can be checked without the kinematics; frame names are
    /// resolved separately when the frame tree is built.
    pub fn validate(&self) -> Result<(), ControlError> {
        for (i, name) in self.joint_names.iter().enumerate() {
            if name.is_empty() {
                return Err(ControlError::invalid_config(format!("joint {} has no name", i)));
            }
            if self.joint_names[..i].contains(name) {
                return Err(ControlError::invalid_config(format!("joint name '{}' is repeated", name)));
            }
        }
        self.limits.validate()?;
        self.runtime_parameters().validate()?;
        self.singularity.validate()?;

        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ControlError::invalid_config(format!(
                "cycle period must be finite and positive (got {})", self.dt)));
        }
        if !self.pose_feedback_gain.is_finite() || self.pose_feedback_gain < 0.0 {
            return Err(ControlError::invalid_config(format!(
                "pose feedback gain must be finite and non-negative (got {})", self.pose_feedback_gain)));
        }
        if self.pose_feedback_gain * self.dt > 1.0 {
            return Err(ControlError::invalid_config(format!(
                "pose feedback gain {} overshoots within one cycle of {} s", self.pose_feedback_gain, self.dt)));
        }
        if !(self.speed_scaling > 0.0 && self.speed_scaling <= 1.0) {
            return Err(ControlError::invalid_config(format!(
                "speed scaling must be in (0, 1] (got {})", self.speed_scaling)));
        }
        if let Some(payload) = &self.payload {
            if !payload.mass.is_finite() || payload.mass < 0.0
                || !payload.center_of_gravity.iter().all(|v| v.is_finite()) {
                return Err(ControlError::invalid_config("payload mass and centre of gravity must be finite"));
            }
        }
        if !self.gravity.iter().all(|v| v.is_finite()) {
            return Err(ControlError::invalid_config("gravity vector must be finite"));
        }
        Ok(())
    }
}

/// Joint names from hardware interface names like `joint1/position`, `joint1/velocity`:
/// the part before the last `/`, in order of first appearance, without repetition.
pub fn joint_names_from_interfaces<S: AsRef<str>>(interfaces: &[S]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for interface in interfaces {
        let interface = interface.as_ref();
        let name = match interface.rfind('/') {
            Some(pos) => &interface[..pos],
            None => interface,
        };
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = ControllerConfig::default();
        config.dt = 0.0;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.speed_scaling = 1.5;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.admittance.damping[1] = -1.0;
        assert!(matches!(config.validate(), Err(ControlError::InvalidConfig(_))));

        let mut config = ControllerConfig::default();
        config.joint_names[3] = "joint1".to_string();
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.pose_feedback_gain = 1000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn names_from_interfaces() {
        let interfaces = ["shoulder_pan/position", "shoulder_pan/velocity",
                          "prefix/elbow/position", "wrist_1/position", "elbow_only"];
        assert_eq!(joint_names_from_interfaces(&interfaces),
                   vec!["shoulder_pan", "prefix/elbow", "wrist_1", "elbow_only"]);
    }
}
