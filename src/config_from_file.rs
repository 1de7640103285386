//! Supports reading the controller configuration from YAML file (optional)

use std::path::Path;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3, Vector6};
use regex::Regex;
use yaml_rust2::{Yaml, YamlLoader};

use crate::config::{joint_names_from_interfaces, ControllerConfig, FailSafe};
use crate::error::ConfigError;
use crate::filter::Payload;
use crate::frame::{AttachedFrame, FrameConfig};
use crate::kinematics_bridge::SingularityPolicy;
use crate::limits::{JointLimit, JointLimits};

impl ControllerConfig {
    /// Read the controller configuration from YAML file. YAML file like this is supported:
    /// ```yaml
    /// joints: [shoulder_pan_joint, shoulder_lift_joint, elbow_joint,
    ///          wrist_1_joint, wrist_2_joint, wrist_3_joint]
    /// controller:
    ///   dt: 0.002
    ///   pose_feedback_gain: 10.0
    ///   speed_scaling: 0.5
    ///   fail_safe: hold_position
    /// frames:
    ///   base: base_link
    ///   flange: flange
    ///   sensor: { name: ft_sensor, parent: flange, xyz: [0.0, 0.0, 0.035], rpy: [0.0, 0.0, deg(90)] }
    ///   end_effector: { name: gripper_tip, parent: ft_sensor, xyz: [0.0, 0.0, 0.15] }
    ///   control: { name: control, parent: base_link }
    /// admittance:
    ///   mass: [3.0, 3.0, 3.0, 0.05, 0.05, 0.05]
    ///   damping: [100.0, 100.0, 100.0, 1.5, 1.5, 1.5]
    ///   stiffness: 200.0
    ///   selected: [true, true, true, false, false, false]
    /// filter:
    ///   cutoff_frequency: 20.0
    ///   force_deadband: 0.5
    ///   torque_deadband: 0.05
    /// payload: { mass: 1.2, center_of_gravity: [0.0, 0.0, 0.08] }
    /// singularity: { condition_threshold: 100.0, damping: 0.05, policy: reject }
    /// limits:
    ///   - { min_position: deg(-360), max_position: deg(360), max_velocity: 3.14, max_effort: 150 }
    ///   # ... six entries in total, or a single entry applied to every joint
    /// ```
    /// Every section is optional and falls back to `ControllerConfig::default()`. Instead of
    /// `joints`, `interfaces` may list hardware interface names (`joint1/position`) from
    /// which the joint names are derived. Six-valued fields also accept a single number
    /// meaning the same value on every axis.
    ///
    /// YAML extension to parse the deg(angle) function is supported: wherever a number is
    /// expected, `deg(90)` may be written and is converted to radians.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Same as `from_yaml_file` for YAML already in memory.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let documents = YamlLoader::load_from_str(contents)
            .map_err(|e| ConfigError::Parse(format!("{}", e)))?;
        let root = match documents.first() {
            Some(root) => root,
            None => return Err(ConfigError::Parse("YAML document is empty".to_string())),
        };

        let mut config = ControllerConfig::default();

        if let Some(joints) = section(root, "joints") {
            config.joint_names = strings6(joints, "joints")?;
        } else if let Some(interfaces) = section(root, "interfaces") {
            let interfaces = strings(interfaces, "interfaces")?;
            let names = joint_names_from_interfaces(&interfaces);
            let found = names.len();
            config.joint_names = names.try_into().map_err(|_|
                ConfigError::InvalidLength { field: "interfaces".to_string(), expected: 6, found })?;
        }

        if let Some(controller) = section(root, "controller") {
            if let Some(v) = section(controller, "dt") {
                config.dt = number(v, "controller.dt")?;
            }
            if let Some(v) = section(controller, "pose_feedback_gain") {
                config.pose_feedback_gain = number(v, "controller.pose_feedback_gain")?;
            }
            if let Some(v) = section(controller, "speed_scaling") {
                config.speed_scaling = number(v, "controller.speed_scaling")?;
            }
            if let Some(v) = section(controller, "fail_safe") {
                config.fail_safe = match text(v, "controller.fail_safe")? {
                    "hold_last_command" => FailSafe::HoldLastCommand,
                    "hold_position" => FailSafe::HoldPosition,
                    other => return Err(ConfigError::Parse(format!(
                        "controller.fail_safe must be hold_last_command or hold_position (got {})", other))),
                };
            }
        }

        if let Some(frames) = section(root, "frames") {
            if let Some(v) = section(frames, "base") {
                config.frames.base = text(v, "frames.base")?.to_string();
            }
            if let Some(v) = section(frames, "flange") {
                config.frames.flange = text(v, "frames.flange")?.to_string();
            }
            // Renamed base and flange carry the default attachments along.
            let defaults = FrameConfig::default();
            for attached in [&mut config.frames.end_effector, &mut config.frames.sensor] {
                if attached.parent == defaults.flange {
                    attached.parent = config.frames.flange.clone();
                }
            }
            if config.frames.control.parent == defaults.base {
                config.frames.control.parent = config.frames.base.clone();
            }
            if let Some(v) = section(frames, "end_effector") {
                config.frames.end_effector = attached_frame(v, &config.frames.end_effector, "frames.end_effector")?;
            }
            if let Some(v) = section(frames, "sensor") {
                config.frames.sensor = attached_frame(v, &config.frames.sensor, "frames.sensor")?;
            }
            if let Some(v) = section(frames, "control") {
                config.frames.control = attached_frame(v, &config.frames.control, "frames.control")?;
            }
        }

        if let Some(admittance) = section(root, "admittance") {
            if let Some(v) = section(admittance, "mass") {
                config.admittance.mass = numbers6(v, "admittance.mass")?;
            }
            if let Some(v) = section(admittance, "damping") {
                config.admittance.damping = numbers6(v, "admittance.damping")?;
            }
            if let Some(v) = section(admittance, "stiffness") {
                config.admittance.stiffness = numbers6(v, "admittance.stiffness")?;
            }
            if let Some(v) = section(admittance, "selected") {
                config.admittance.selected = flags6(v, "admittance.selected")?;
            }
        }

        if let Some(filter) = section(root, "filter") {
            if let Some(v) = section(filter, "cutoff_frequency") {
                config.filter.cutoff_frequency = number(v, "filter.cutoff_frequency")?;
            }
            if let Some(v) = section(filter, "force_deadband") {
                config.filter.force_deadband = number(v, "filter.force_deadband")?;
            }
            if let Some(v) = section(filter, "torque_deadband") {
                config.filter.torque_deadband = number(v, "filter.torque_deadband")?;
            }
            if let Some(v) = section(filter, "bias") {
                config.filter.bias = Vector6::from(numbers6(v, "filter.bias")?);
            }
        }

        if let Some(payload) = section(root, "payload") {
            let mass = section(payload, "mass")
                .ok_or_else(|| ConfigError::MissingField("payload.mass".to_string()))?;
            let center_of_gravity = match section(payload, "center_of_gravity") {
                Some(v) => vector3(v, "payload.center_of_gravity")?,
                None => Vector3::zeros(),
            };
            config.payload = Some(Payload { mass: number(mass, "payload.mass")?, center_of_gravity });
        }

        if let Some(gravity) = section(root, "gravity") {
            config.gravity = vector3(gravity, "gravity")?;
        }

        if let Some(singularity) = section(root, "singularity") {
            if let Some(v) = section(singularity, "condition_threshold") {
                config.singularity.condition_threshold = number(v, "singularity.condition_threshold")?;
            }
            if let Some(v) = section(singularity, "damping") {
                config.singularity.damping = number(v, "singularity.damping")?;
            }
            if let Some(v) = section(singularity, "policy") {
                config.singularity.policy = match text(v, "singularity.policy")? {
                    "damped_least_squares" => SingularityPolicy::DampedLeastSquares,
                    "reject" => SingularityPolicy::Reject,
                    other => return Err(ConfigError::Parse(format!(
                        "singularity.policy must be damped_least_squares or reject (got {})", other))),
                };
            }
        }

        if let Some(limits) = section(root, "limits") {
            config.limits = joint_limits(limits)?;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Present and not null.
fn section<'a>(yaml: &'a Yaml, key: &str) -> Option<&'a Yaml> {
    let value = &yaml[key];
    if value.is_badvalue() || value.is_null() { None } else { Some(value) }
}

fn text<'a>(value: &'a Yaml, field: &str) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| ConfigError::Parse(format!("{} must be a string", field)))
}

fn strings(value: &Yaml, field: &str) -> Result<Vec<String>, ConfigError> {
    let items = value.as_vec()
        .ok_or_else(|| ConfigError::Parse(format!("{} must be a list", field)))?;
    items.iter().map(|item| text(item, field).map(str::to_string)).collect()
}

fn strings6(value: &Yaml, field: &str) -> Result<[String; 6], ConfigError> {
    let items = strings(value, field)?;
    let found = items.len();
    items.try_into().map_err(|_| ConfigError::InvalidLength { field: field.to_string(), expected: 6, found })
}

/// Number in radians: plain number, or deg(angle).
fn number(value: &Yaml, field: &str) -> Result<f64, ConfigError> {
    match value {
        Yaml::Integer(i) => Ok(*i as f64),
        Yaml::Real(_) => value.as_f64()
            .ok_or_else(|| ConfigError::Parse(format!("{} is not a valid number", field))),
        Yaml::String(s) => parse_angle(s, field),
        _ => Err(ConfigError::Parse(format!("{} must be a number", field))),
    }
}

fn parse_angle(text: &str, field: &str) -> Result<f64, ConfigError> {
    let re = Regex::new(r"^\s*deg\(\s*(-?\d+(\.\d+)?)\s*\)\s*$")
        .map_err(|_| ConfigError::Parse("Invalid regex pattern".to_string()))?;
    if let Some(caps) = re.captures(text) {
        let degrees: f64 = caps.get(1)
            .map(|m| m.as_str())
            .ok_or_else(|| ConfigError::Parse(format!("{}: bad angle {}", field, text)))?
            .parse()
            .map_err(|_| ConfigError::Parse(format!("{}: bad angle {}", field, text)))?;
        Ok(degrees.to_radians())
    } else {
        text.trim().parse()
            .map_err(|_| ConfigError::Parse(format!("{} must be a number (got {})", field, text)))
    }
}

/// Six numbers, or a single number for all six.
fn numbers6(value: &Yaml, field: &str) -> Result<[f64; 6], ConfigError> {
    match value.as_vec() {
        Some(items) => {
            if items.len() != 6 {
                return Err(ConfigError::InvalidLength { field: field.to_string(), expected: 6, found: items.len() });
            }
            let mut out = [0.0; 6];
            for (i, item) in items.iter().enumerate() {
                out[i] = number(item, field)?;
            }
            Ok(out)
        }
        None => Ok([number(value, field)?; 6]),
    }
}

fn flags6(value: &Yaml, field: &str) -> Result<[bool; 6], ConfigError> {
    let flag = |item: &Yaml| match item {
        Yaml::Boolean(b) => Ok(*b),
        Yaml::Integer(0) => Ok(false),
        Yaml::Integer(1) => Ok(true),
        _ => Err(ConfigError::Parse(format!("{} must contain true/false values", field))),
    };
    match value.as_vec() {
        Some(items) => {
            if items.len() != 6 {
                return Err(ConfigError::InvalidLength { field: field.to_string(), expected: 6, found: items.len() });
            }
            let mut out = [true; 6];
            for (i, item) in items.iter().enumerate() {
                out[i] = flag(item)?;
            }
            Ok(out)
        }
        None => Ok([flag(value)?; 6]),
    }
}

fn vector3(value: &Yaml, field: &str) -> Result<Vector3<f64>, ConfigError> {
    let items = value.as_vec()
        .ok_or_else(|| ConfigError::Parse(format!("{} must be a list of three numbers", field)))?;
    if items.len() != 3 {
        return Err(ConfigError::InvalidLength { field: field.to_string(), expected: 3, found: items.len() });
    }
    Ok(Vector3::new(number(&items[0], field)?, number(&items[1], field)?, number(&items[2], field)?))
}

/// `{ name, parent, xyz, rpy }`, missing keys taken from `default`. The offset is given by
/// translation and roll, pitch, yaw; if either is given, the other defaults to zero.
fn attached_frame(value: &Yaml, default: &AttachedFrame, field: &str) -> Result<AttachedFrame, ConfigError> {
    let name = match section(value, "name") {
        Some(v) => text(v, field)?.to_string(),
        None => default.name.clone(),
    };
    let parent = match section(value, "parent") {
        Some(v) => text(v, field)?.to_string(),
        None => default.parent.clone(),
    };
    let xyz = section(value, "xyz").map(|v| vector3(v, field)).transpose()?;
    let rpy = section(value, "rpy").map(|v| vector3(v, field)).transpose()?;
    let offset = if xyz.is_none() && rpy.is_none() {
        default.offset
    } else {
        let xyz = xyz.unwrap_or_else(Vector3::zeros);
        let rpy = rpy.unwrap_or_else(Vector3::zeros);
        Isometry3::from_parts(Translation3::from(xyz),
                              UnitQuaternion::from_euler_angles(rpy.x, rpy.y, rpy.z))
    };
    Ok(AttachedFrame { name, parent, offset })
}

/// Six limit entries in joint order, or one entry for all joints. Missing position bounds
/// mean the joint is continuous; missing effort means unlimited.
fn joint_limits(value: &Yaml) -> Result<JointLimits, ConfigError> {
    let entry = |item: &Yaml, i: usize| -> Result<JointLimit, ConfigError> {
        let field = |key: &str| format!("limits[{}].{}", i, key);
        let optional = |key: &str, absent: f64| match section(item, key) {
            Some(v) => number(v, &field(key)),
            None => Ok(absent),
        };
        let max_velocity = section(item, "max_velocity")
            .ok_or_else(|| ConfigError::MissingField(field("max_velocity")))?;
        Ok(JointLimit::new(
            optional("min_position", f64::NEG_INFINITY)?,
            optional("max_position", f64::INFINITY)?,
            number(max_velocity, &field("max_velocity"))?,
            optional("max_effort", f64::INFINITY)?,
        ))
    };

    let items = value.as_vec()
        .ok_or_else(|| ConfigError::Parse("limits must be a list".to_string()))?;
    match items.len() {
        1 => Ok(JointLimits::uniform(entry(&items[0], 0)?)),
        6 => {
            let mut joints = [JointLimit::continuous(1.0, f64::INFINITY); 6];
            for (i, item) in items.iter().enumerate() {
                joints[i] = entry(item, i)?;
            }
            Ok(JointLimits::new(joints))
        }
        found => Err(ConfigError::InvalidLength { field: "limits".to_string(), expected: 6, found }),
    }
}
