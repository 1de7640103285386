//! Joint limits and the last line of defense before the command reaches the hardware.

use bitflags::bitflags;
use crate::error::ControlError;
use crate::kinematic_traits::Joints;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimit {
    /// rad. May be -infinity for a continuous joint.
    pub min_position: f64,

    /// rad. May be +infinity for a continuous joint.
    pub max_position: f64,

    /// rad/s
    pub max_velocity: f64,

    /// N·m. Carried for the host; effort is never commanded by this controller.
    pub max_effort: f64,
}

impl JointLimit {
    pub fn new(min_position: f64, max_position: f64, max_velocity: f64, max_effort: f64) -> Self {
        Self { min_position, max_position, max_velocity, max_effort }
    }

    /// Joint without position limits.
    pub fn continuous(max_velocity: f64, max_effort: f64) -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY, max_velocity, max_effort)
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.min_position && position <= self.max_position
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub joints: [JointLimit; 6],
}

impl JointLimits {
    pub fn new(joints: [JointLimit; 6]) -> Self {
        Self { joints }
    }

    /// Same limits on every joint.
    pub fn uniform(limit: JointLimit) -> Self {
        Self { joints: [limit; 6] }
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        for (i, limit) in self.joints.iter().enumerate() {
            if limit.min_position.is_nan() || limit.max_position.is_nan()
                || limit.min_position > limit.max_position {
                return Err(ControlError::invalid_config(format!(
                    "joint {} position range [{}, {}] is empty", i, limit.min_position, limit.max_position)));
            }
            if !limit.max_velocity.is_finite() || limit.max_velocity <= 0.0 {
                return Err(ControlError::invalid_config(format!(
                    "joint {} velocity limit must be finite and positive (got {})", i, limit.max_velocity)));
            }
            if limit.max_effort.is_nan() || limit.max_effort < 0.0 {
                return Err(ControlError::invalid_config(format!(
                    "joint {} effort limit must be non-negative (got {})", i, limit.max_effort)));
            }
        }
        Ok(())
    }

    /// True if all joint positions are within their ranges.
    pub fn compliant(&self, positions: &Joints) -> bool {
        self.joints.iter().zip(positions.iter()).all(|(limit, q)| limit.contains(*q))
    }
}

impl Default for JointLimits {
    fn default() -> Self {
        Self::uniform(JointLimit::new(-2.0 * std::f64::consts::PI, 2.0 * std::f64::consts::PI, 3.14, 150.0))
    }
}

bitflags! {
    /// Limit violations detected while making a command safe. Non-fatal: the command was
    /// corrected and these flags report what had to be done.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LimitViolation: u8 {
        /// A position command was saturated to the joint range.
        const POSITION =        0b0000_0001;

        /// A velocity command exceeded the joint velocity limit.
        const VELOCITY =        0b0000_0010;

        /// All velocities were scaled down by the same factor to respect the limits.
        const VELOCITY_SCALED = 0b0000_0100;

        /// The command contained non-finite values and was replaced by holding position.
        const NON_FINITE =      0b0000_1000;
    }
}

/// Per joint position and velocity command as written to the hardware.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointCommand {
    pub positions: Joints,
    pub velocities: Joints,
}

impl JointCommand {
    /// Stay at the given positions.
    pub fn hold(positions: Joints) -> Self {
        Self { positions, velocities: [0.0; 6] }
    }

    pub fn is_finite(&self) -> bool {
        self.positions.iter().chain(self.velocities.iter()).all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeCommand {
    pub command: JointCommand,
    pub violations: LimitViolation,

    /// Factor all velocities were divided by (1.0 if no scaling was needed).
    pub velocity_scale: f64,
}

/// Makes the joint command safe. Never fails and always returns a finite command.
///
/// 1. Non-finite commands are replaced by holding the current position.
/// 2. If any joint exceeds `max_velocity * speed_scaling`, all velocities are divided by the
///    same factor, so the direction of the motion is preserved. The position command is
///    pulled back toward the current position by the same factor.
/// 3. Positions are saturated to the joint range; velocity pushing further out is zeroed.
pub fn clamp(position_command: &Joints, velocity_command: &Joints, current: &Joints,
             limits: &JointLimits, speed_scaling: f64) -> SafeCommand {
    let mut violations = LimitViolation::empty();
    let speed_scaling = if speed_scaling > 0.0 && speed_scaling <= 1.0 { speed_scaling } else { 1.0 };

    // Where to stay if nothing better is known: the measured position, or failing that the
    // commanded one, saturated to the range.
    let hold: Joints = std::array::from_fn(|i| {
        let limit = &limits.joints[i];
        let q = if current[i].is_finite() {
            current[i]
        } else if position_command[i].is_finite() {
            position_command[i]
        } else if limit.min_position.is_finite() && limit.max_position.is_finite() {
            0.5 * (limit.min_position + limit.max_position)
        } else {
            0.0
        };
        q.max(limit.min_position).min(limit.max_position)
    });

    let finite = position_command.iter().chain(velocity_command.iter()).chain(current.iter())
        .all(|v| v.is_finite());
    if !finite {
        return SafeCommand {
            command: JointCommand::hold(hold),
            violations: LimitViolation::NON_FINITE,
            velocity_scale: 1.0,
        };
    }

    let mut scale: f64 = 1.0;
    for i in 0..6 {
        let max_velocity = limits.joints[i].max_velocity * speed_scaling;
        scale = scale.max(velocity_command[i].abs() / max_velocity);
    }

    let mut positions = *position_command;
    let mut velocities = *velocity_command;
    if scale > 1.0 {
        violations |= LimitViolation::VELOCITY | LimitViolation::VELOCITY_SCALED;
        for i in 0..6 {
            velocities[i] /= scale;
            positions[i] = current[i] + (position_command[i] - current[i]) / scale;
        }
    }

    for i in 0..6 {
        let limit = &limits.joints[i];
        let max_velocity = limit.max_velocity * speed_scaling;
        if velocities[i].abs() > max_velocity {
            // Only rounding can get here after scaling.
            velocities[i] = velocities[i].max(-max_velocity).min(max_velocity);
            violations |= LimitViolation::VELOCITY;
        }
        if positions[i] > limit.max_position {
            positions[i] = limit.max_position;
            velocities[i] = velocities[i].min(0.0);
            violations |= LimitViolation::POSITION;
        } else if positions[i] < limit.min_position {
            positions[i] = limit.min_position;
            velocities[i] = velocities[i].max(0.0);
            violations |= LimitViolation::POSITION;
        }
    }

    SafeCommand {
        command: JointCommand { positions, velocities },
        violations,
        velocity_scale: scale.max(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn limits() -> JointLimits {
        JointLimits::uniform(JointLimit::new(-PI, PI, 1.0, 100.0))
    }

    #[test]
    fn command_within_limits_is_unchanged() {
        let current = [0.1; 6];
        let qdot = [0.5, -0.5, 0.2, 0.0, 0.9, -0.9];
        let q = std::array::from_fn(|i| current[i] + qdot[i] * 0.001);
        let safe = clamp(&q, &qdot, &current, &limits(), 1.0);
        assert!(safe.violations.is_empty());
        assert_eq!(safe.command.velocities, qdot);
        assert_eq!(safe.command.positions, q);
    }

    #[test]
    fn velocities_are_scaled_together() {
        let current = [0.0; 6];
        let qdot = [1.5, 0.75, -0.3, 0.0, 0.6, -1.2];
        let q: Joints = std::array::from_fn(|i| qdot[i] * 0.001);
        let safe = clamp(&q, &qdot, &current, &limits(), 1.0);
        assert!(safe.violations.contains(LimitViolation::VELOCITY_SCALED));
        assert!((safe.velocity_scale - 1.5).abs() < 1e-12);
        for i in 0..6 {
            assert!((safe.command.velocities[i] - qdot[i] / 1.5).abs() < 1e-12);
            assert!((safe.command.positions[i] - q[i] / 1.5).abs() < 1e-12);
        }
        // Direction preserved: the ratio of any two joints is the same as commanded.
        assert!((safe.command.velocities[0] / safe.command.velocities[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn speed_scaling_lowers_the_limit() {
        let qdot = [0.8, 0.0, 0.0, 0.0, 0.0, 0.0];
        let safe = clamp(&[0.0008, 0.0, 0.0, 0.0, 0.0, 0.0], &qdot, &[0.0; 6], &limits(), 0.5);
        assert!((safe.command.velocities[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn position_is_saturated() {
        let current = [PI - 0.0005, 0.0, 0.0, 0.0, 0.0, 0.0];
        let qdot = [0.9, 0.0, 0.0, 0.0, 0.0, 0.0];
        let q = [PI + 0.0004, 0.0, 0.0, 0.0, 0.0, 0.0];
        let safe = clamp(&q, &qdot, &current, &limits(), 1.0);
        assert!(safe.violations.contains(LimitViolation::POSITION));
        assert_eq!(safe.command.positions[0], PI);
        assert_eq!(safe.command.velocities[0], 0.0);
    }

    #[test]
    fn non_finite_command_holds_position() {
        let current = [0.2, 0.1, 0.0, -0.1, 0.3, 0.0];
        let qdot = [f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0];
        let safe = clamp(&current, &qdot, &current, &limits(), 1.0);
        assert_eq!(safe.violations, LimitViolation::NON_FINITE);
        assert_eq!(safe.command, JointCommand::hold(current));
        assert!(safe.command.is_finite());
    }

    #[test]
    fn continuous_joint_is_never_position_clamped() {
        let mut limits = limits();
        limits.joints[5] = JointLimit::continuous(1.0, 10.0);
        let q = [0.0, 0.0, 0.0, 0.0, 0.0, 10.0 * PI];
        let safe = clamp(&q, &[0.0; 6], &q, &limits, 1.0);
        assert!(safe.violations.is_empty());
        assert_eq!(safe.command.positions[5], 10.0 * PI);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn inverted_range_is_invalid() {
        let limits = JointLimits::uniform(JointLimit::new(1.0, -1.0, 1.0, 1.0));
        assert!(limits.validate().is_err());
        assert!(!limits.compliant(&[0.0; 6]));
    }
}
