//! Conditioning of the raw force/torque sensor reading before it drives the admittance.
//!
//! Per call, in order: subtraction of the static bias and of the payload gravity offset,
//! first order low-pass filter per axis, deadband.

use std::f64::consts::PI;
use nalgebra::{UnitQuaternion, Vector3, Vector6};
use crate::error::ControlError;
use crate::wrench::Wrench;

/// Standard gravity in the base frame, for a robot mounted upright.
pub const STANDARD_GRAVITY: Vector3<f64> = Vector3::new(0.0, 0.0, -9.80665);

/// Tunable filter parameters. Can be swapped at runtime without resetting the filter state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    /// Cutoff frequency of the low-pass filter, Hz. Zero or infinite disables filtering.
    pub cutoff_frequency: f64,

    /// Force components with magnitude below this (N) are zeroed.
    pub force_deadband: f64,

    /// Torque components with magnitude below this (N·m) are zeroed.
    pub torque_deadband: f64,

    /// Static sensor offset in the sensor frame, subtracted from every reading.
    pub bias: Vector6<f64>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            cutoff_frequency: 20.0,
            force_deadband: 0.5,
            torque_deadband: 0.05,
            bias: Vector6::zeros(),
        }
    }
}

impl FilterSettings {
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.cutoff_frequency.is_nan() || self.cutoff_frequency < 0.0 {
            return Err(ControlError::invalid_config(format!(
                "filter cutoff frequency must be non-negative (got {})", self.cutoff_frequency)));
        }
        for (name, value) in [("force deadband", self.force_deadband),
                              ("torque deadband", self.torque_deadband)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ControlError::invalid_config(format!(
                    "{} must be finite and non-negative (got {})", name, value)));
            }
        }
        if !self.bias.iter().all(|v| v.is_finite()) {
            return Err(ControlError::invalid_config("sensor bias must be finite"));
        }
        Ok(())
    }

    /// Smoothing factor of the discrete first order filter for the given sample period.
    pub fn alpha(&self, dt: f64) -> f64 {
        if !(self.cutoff_frequency > 0.0) || !self.cutoff_frequency.is_finite() || !(dt > 0.0) {
            return 1.0;
        }
        let time_constant = 1.0 / (2.0 * PI * self.cutoff_frequency);
        dt / (dt + time_constant)
    }
}

/// Mass carried after the sensor (gripper, tool, workpiece) whose weight the sensor reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payload {
    /// kg
    pub mass: f64,

    /// Centre of gravity in the sensor frame, m.
    pub center_of_gravity: Vector3<f64>,
}

impl Payload {
    /// Wrench the payload weight produces in the sensor frame, given the sensor orientation
    /// in base and the gravity vector in base.
    pub fn gravity_wrench(&self, sensor_in_base: &UnitQuaternion<f64>, gravity: &Vector3<f64>) -> Vector6<f64> {
        let force = sensor_in_base.inverse() * (gravity * self.mass);
        let torque = self.center_of_gravity.cross(&force);
        Vector6::new(force.x, force.y, force.z, torque.x, torque.y, torque.z)
    }
}

/// Stateful wrench filter. Owned by the control loop; `filter` is called once per cycle.
#[derive(Debug, Clone)]
pub struct WrenchFilter {
    settings: FilterSettings,
    gravity_offset: Vector6<f64>,
    state: Vector6<f64>,
    initialized: bool,
}

impl WrenchFilter {
    pub fn new(settings: FilterSettings) -> Self {
        Self {
            settings,
            gravity_offset: Vector6::zeros(),
            state: Vector6::zeros(),
            initialized: false,
        }
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Adopts new settings, keeping the filter state.
    pub fn set_settings(&mut self, settings: FilterSettings) {
        self.settings = settings;
    }

    /// Gravity (or otherwise estimated) offset subtracted on top of the static bias,
    /// in the sensor frame.
    pub fn set_gravity_offset(&mut self, offset: Vector6<f64>) {
        self.gravity_offset = offset;
    }

    /// Forgets the filter history. The next reading initializes the filter.
    pub fn reset(&mut self) {
        self.state = Vector6::zeros();
        self.initialized = false;
    }

    /// Filters the raw reading. A non-finite reading is not fed into the filter;
    /// the previous filtered value is returned instead.
    pub fn filter(&mut self, raw: &Wrench, dt: f64) -> Wrench {
        if raw.is_finite() {
            let compensated = raw.to_vector() - self.settings.bias - self.gravity_offset;
            if self.initialized {
                let alpha = self.settings.alpha(dt);
                self.state += (compensated - self.state) * alpha;
            } else {
                self.state = compensated;
                self.initialized = true;
            }
        }

        let mut out = self.state;
        for i in 0..6 {
            let deadband = if i < 3 { self.settings.force_deadband } else { self.settings.torque_deadband };
            if out[i].abs() < deadband {
                out[i] = 0.0;
            }
        }
        Wrench::from_vector(&out, raw.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameId;

    fn reading(fz: f64) -> Wrench {
        Wrench::new(Vector3::new(0.0, 0.0, fz), Vector3::zeros(), FrameId::Sensor)
    }

    #[test]
    fn bias_is_removed() {
        let settings = FilterSettings {
            bias: Vector6::new(0.0, 0.0, 3.0, 0.0, 0.0, 0.0),
            ..FilterSettings::default()
        };
        let mut filter = WrenchFilter::new(settings);
        let out = filter.filter(&reading(3.2), 0.001);
        assert_eq!(out.force.z, 0.0); // 0.2 N left is inside the deadband
        let out = filter.filter(&reading(13.0), 0.001);
        assert!(out.force.z > 0.0 && out.force.z < 10.0);
    }

    #[test]
    fn low_pass_converges_to_step() {
        let settings = FilterSettings { force_deadband: 0.0, ..FilterSettings::default() };
        let mut filter = WrenchFilter::new(settings);
        filter.filter(&reading(0.0), 0.001);
        let first = filter.filter(&reading(10.0), 0.001).force.z;
        let alpha = settings.alpha(0.001);
        assert!((first - 10.0 * alpha).abs() < 1e-12);
        let mut last = first;
        for _ in 0..2000 {
            last = filter.filter(&reading(10.0), 0.001).force.z;
        }
        assert!((last - 10.0).abs() < 1e-6, "filtered value {}", last);
    }

    #[test]
    fn zero_cutoff_passes_through() {
        let settings = FilterSettings { cutoff_frequency: 0.0, force_deadband: 0.0, ..FilterSettings::default() };
        let mut filter = WrenchFilter::new(settings);
        filter.filter(&reading(1.0), 0.001);
        assert_eq!(filter.filter(&reading(7.5), 0.001).force.z, 7.5);
    }

    #[test]
    fn deadband_zeroes_small_components() {
        let mut filter = WrenchFilter::new(FilterSettings::default());
        let w = Wrench::new(Vector3::new(0.3, -0.49, 2.0), Vector3::new(0.01, 0.2, -0.04), FrameId::Sensor);
        let out = filter.filter(&w, 0.001);
        assert_eq!(out.force, Vector3::new(0.0, 0.0, 2.0));
        assert_eq!(out.torque, Vector3::new(0.0, 0.2, 0.0));
    }

    #[test]
    fn non_finite_reading_holds_previous_output() {
        let settings = FilterSettings { force_deadband: 0.0, ..FilterSettings::default() };
        let mut filter = WrenchFilter::new(settings);
        filter.filter(&reading(4.0), 0.001);
        let out = filter.filter(&reading(f64::NAN), 0.001);
        assert_eq!(out.force.z, 4.0);
    }

    #[test]
    fn payload_gravity_is_compensated() {
        // 1 kg payload, sensor upright: sensor reads -9.81 N along its z axis at rest.
        let payload = Payload { mass: 1.0, center_of_gravity: Vector3::new(0.1, 0.0, 0.0) };
        let offset = payload.gravity_wrench(&UnitQuaternion::identity(), &STANDARD_GRAVITY);
        assert!((offset[2] + 9.80665).abs() < 1e-12);
        // Lever of 0.1 m along x under a force along -z produces a torque about +y.
        assert!((offset[4] - 0.980665).abs() < 1e-12);

        let mut filter = WrenchFilter::new(FilterSettings::default());
        filter.set_gravity_offset(offset);
        let at_rest = Wrench::from_vector(&offset, FrameId::Sensor);
        let out = filter.filter(&at_rest, 0.001);
        assert_eq!(out.to_vector(), Vector6::zeros());
    }

    #[test]
    fn invalid_settings_are_reported() {
        let settings = FilterSettings { force_deadband: -1.0, ..FilterSettings::default() };
        assert!(settings.validate().is_err());
        assert!(FilterSettings::default().validate().is_ok());
    }
}
