//! Error taxonomy of the controller and of its file based configuration

use std::io;
use thiserror::Error;

use crate::controller::ControllerMode;

/// Failures the controller classifies. Configure-time variants abort configuration or
/// activation; per-cycle variants either produce a defined safe output or move the
/// controller into `ControllerMode::Error`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    /// The kinematic chain between two frames cannot be computed. Fatal, configure time only.
    #[error("cannot resolve frame '{from}' relative to '{to}': {reason}")]
    FrameResolution {
        from: String,
        to: String,
        reason: String,
    },

    /// The admittance integrator produced a non-finite value on the given Cartesian axis.
    #[error("numerical instability on axis {axis}: x = {position}, v = {velocity}, a = {acceleration}")]
    NumericalInstability {
        axis: usize,
        position: f64,
        velocity: f64,
        acceleration: f64,
    },

    /// The Jacobian is too ill conditioned to be inverted under the configured policy.
    #[error("kinematic singularity: condition number {condition_number} exceeds {threshold}")]
    Singularity {
        condition_number: f64,
        threshold: f64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Lifecycle call is not permitted in the current mode.
    #[error("cannot {event} while {mode:?}")]
    InvalidTransition {
        mode: ControllerMode,
        event: &'static str,
    },

    /// Update requested while the controller does not produce commands.
    #[error("controller is not active ({0:?})")]
    NotActive(ControllerMode),
}

impl ControlError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Creates a frame resolution error.
    #[must_use]
    pub fn frame_resolution(from: &str, to: &str, reason: impl Into<String>) -> Self {
        Self::FrameResolution {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error moves the controller into the error mode.
    pub fn is_fatal_in_cycle(&self) -> bool {
        matches!(self, Self::NumericalInstability { .. })
    }
}

/// Unified error to report failures while reading configuration from YAML and URDF files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse Error: {0}")]
    Parse(String),

    #[error("Missing Field: {0}")]
    MissingField(String),

    #[error("Invalid Length of {field}: expected {expected}, found {found}")]
    InvalidLength {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("XML Processing Error: {0}")]
    XmlProcessing(String),

    #[error("Joint '{0}' not found")]
    UnknownJoint(String),

    #[error(transparent)]
    Invalid(#[from] ControlError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_values() {
        let err = ControlError::NumericalInstability {
            axis: 2,
            position: f64::NAN,
            velocity: 1.0,
            acceleration: f64::INFINITY,
        };
        let text = err.to_string();
        assert!(text.contains("axis 2"));
        assert!(text.contains("NaN"));
        assert!(err.is_fatal_in_cycle());
    }

    #[test]
    fn singularity_is_recoverable() {
        let err = ControlError::Singularity { condition_number: 1e9, threshold: 100.0 };
        assert!(!err.is_fatal_in_cycle());
        assert!(err.to_string().contains("condition number"));
    }

    #[test]
    fn frame_resolution_names_frames() {
        let err = ControlError::frame_resolution("ft_sensor", "base_link", "unknown parent 'wrist'");
        let text = err.to_string();
        assert!(text.contains("ft_sensor") && text.contains("base_link") && text.contains("wrist"));
    }

    #[test]
    fn config_error_wraps_control_error() {
        let err: ConfigError = ControlError::invalid_config("dt must be positive").into();
        assert!(err.to_string().contains("dt must be positive"));
    }
}
