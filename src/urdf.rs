//! Supports extracting joint limits from URDF (optional)

extern crate sxd_document;

use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;
use regex::Regex;
use sxd_document::{dom, parser, QName};
use crate::error::ConfigError;
use crate::limits::{JointLimit, JointLimits};

/// Reads the joint limits of the named joints from URDF (or XACRO) file.
///
/// # Parameters
/// - `path`: the location of URDF or XACRO file to load from.
/// - `joint_names`: the controlled joints, in controller order.
///
/// # Example
/// ```
/// let names = ["shoulder_pan_joint", "shoulder_lift_joint", "elbow_joint",
///     "wrist_1_joint", "wrist_2_joint", "wrist_3_joint"].map(String::from);
/// let limits = rs_admittance_control::urdf::joint_limits_from_urdf_file(
///     "src/tests/data/ur5e.urdf", &names).unwrap();
/// assert!(limits.joints[0].max_velocity > 0.0);
/// ```
pub fn joint_limits_from_urdf_file<P: AsRef<Path>>(path: P, joint_names: &[String; 6])
                                                   -> Result<JointLimits, ConfigError> {
    let xml_content = read_to_string(path)?;
    joint_limits_from_urdf(&xml_content, joint_names)
}

/// Reads the joint limits of the named joints from URDF XML content.
///
/// Joints are matched by name. Names written with a xacro macro prefix such as
/// `${prefix}elbow_joint` match `elbow_joint`. Joints of `continuous` type get unbounded
/// position limits; `lower` and `upper` may be written as `${radians(deg)}` as is common
/// in xacro. Each of the joints must define `velocity` in its `<limit>` tag; missing
/// `effort` means unlimited.
///
/// # Errors
/// - `ConfigError::XmlProcessing` if the XML cannot be parsed or a joint name is defined
///   twice with different limits.
/// - `ConfigError::UnknownJoint` if a requested joint is not in the file.
/// - `ConfigError::MissingField` if a joint lacks a limit it must have.
/// - `ConfigError::Invalid` if the limits read are not usable (inverted range and the like).
pub fn joint_limits_from_urdf(xml_content: &str, joint_names: &[String; 6])
                              -> Result<JointLimits, ConfigError> {
    let joint_map = process_joints(xml_content)?;

    let mut joints = [JointLimit::continuous(1.0, f64::INFINITY); 6];
    for (i, name) in joint_names.iter().enumerate() {
        let data = joint_map.get(name)
            .ok_or_else(|| ConfigError::UnknownJoint(name.clone()))?;
        joints[i] = data.to_limit()?;
    }

    let limits = JointLimits::new(joints);
    limits.validate()?;
    Ok(limits)
}

#[derive(Debug, PartialEq)]
struct JointData {
    name: String,
    kind: String,
    lower: Option<f64>,
    upper: Option<f64>,
    velocity: Option<f64>,
    effort: Option<f64>,
}

impl JointData {
    fn to_limit(&self) -> Result<JointLimit, ConfigError> {
        let velocity = self.velocity.ok_or_else(||
            ConfigError::MissingField(format!("velocity limit of joint {}", self.name)))?;
        let effort = self.effort.unwrap_or(f64::INFINITY);
        match self.kind.as_str() {
            "continuous" => Ok(JointLimit::continuous(velocity, effort)),
            "revolute" | "prismatic" | "" => {
                let lower = self.lower.ok_or_else(||
                    ConfigError::MissingField(format!("lower limit of joint {}", self.name)))?;
                let upper = self.upper.ok_or_else(||
                    ConfigError::MissingField(format!("upper limit of joint {}", self.name)))?;
                Ok(JointLimit::new(lower, upper, velocity, effort))
            }
            other => Err(ConfigError::XmlProcessing(format!(
                "joint {} of type '{}' cannot be controlled", self.name, other))),
        }
    }
}

fn process_joints(xml: &str) -> Result<HashMap<String, JointData>, ConfigError> {
    let package = parser::parse(xml)
        .map_err(|e| ConfigError::XmlProcessing(format!("Failed to parse XML: {:?}", e)))?;
    let document = package.as_document();

    let root_element = document.root().children().into_iter()
        .find_map(|e| e.element())
        .ok_or_else(|| ConfigError::XmlProcessing("No root element found".to_string()))?;

    let mut joints = Vec::new();
    collect_joints(root_element, &mut joints)?;
    convert_to_map(joints)
}

// Recursive, xacro files nest joints inside macros.
fn collect_joints(element: dom::Element, joints: &mut Vec<JointData>) -> Result<(), ConfigError> {
    let joint_tag = QName::new("joint");
    let limit_tag = QName::new("limit");

    for child in element.children().into_iter().filter_map(|e| e.element()) {
        if child.name() == joint_tag {
            let urdf_name = child.attribute("name")
                .map(|attr| attr.value().to_string())
                .unwrap_or_else(|| "Unnamed".to_string());
            let limit_element = child.children().into_iter()
                .find_map(|e| e.element().filter(|el| el.name() == limit_tag));

            let mut joint_data = JointData {
                name: strip_macro_prefix(&urdf_name)?,
                kind: child.attribute("type").map(|attr| attr.value().to_string()).unwrap_or_default(),
                lower: None,
                upper: None,
                velocity: None,
                effort: None,
            };
            if let Some(limit) = limit_element {
                joint_data.lower = optional_value(limit, "lower", parse_angle)?;
                joint_data.upper = optional_value(limit, "upper", parse_angle)?;
                joint_data.velocity = optional_value(limit, "velocity", parse_number)?;
                joint_data.effort = optional_value(limit, "effort", parse_number)?;
            }
            joints.push(joint_data);
        }

        collect_joints(child, joints)?;
    }

    Ok(())
}

fn optional_value(element: dom::Element, attribute: &str,
                  parse: fn(&str) -> Result<f64, ConfigError>) -> Result<Option<f64>, ConfigError> {
    element.attribute(attribute).map(|attr| parse(attr.value())).transpose()
}

fn strip_macro_prefix(name: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"^\$\{[^}]+\}")
        .map_err(|_| ConfigError::Parse("Invalid regex pattern".to_string()))?;
    Ok(re.replace(name, "").to_string())
}

fn parse_number(attr_value: &str) -> Result<f64, ConfigError> {
    attr_value.trim().parse()
        .map_err(|_| ConfigError::Parse(format!("not a number: {}", attr_value)))
}

fn parse_angle(attr_value: &str) -> Result<f64, ConfigError> {
    // Regular expression to match the ${radians(<number>)} format that is common in xacro
    let re = Regex::new(r"^\$\{radians\((-?\d+(\.\d+)?)\)\}$")
        .map_err(|_| ConfigError::Parse("Invalid regex pattern".to_string()))?;

    if let Some(caps) = re.captures(attr_value) {
        let degrees: f64 = caps.get(1)
            .ok_or_else(|| ConfigError::Parse(format!("Bad representation: {}", attr_value)))?
            .as_str()
            .parse()
            .map_err(|_| ConfigError::Parse(format!("Bad angle: {}", attr_value)))?;
        Ok(degrees.to_radians())
    } else {
        // Plain number, in radians
        parse_number(attr_value)
    }
}

fn convert_to_map(joints: Vec<JointData>) -> Result<HashMap<String, JointData>, ConfigError> {
    let mut map: HashMap<String, JointData> = HashMap::new();

    for joint in joints {
        if let Some(existing) = map.get(&joint.name) {
            if existing != &joint {
                return Err(ConfigError::XmlProcessing(format!(
                    "Duplicate joint name with different data found: {}", joint.name)));
            }
        } else {
            map.insert(joint.name.clone(), joint);
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(prefix: &str) -> [String; 6] {
        std::array::from_fn(|i| format!("{}joint_{}", prefix, i))
    }

    #[test]
    fn test_process_joints() {
        let xml = r#"
            <robot>
                <joint name="${prefix}joint_2" type="revolute">
                    <axis xyz="0 0 1"/>
                    <limit lower="${radians(-180)}" upper="4.62" effort="28" velocity="3.67"/>
                </joint>
                <joint name="joint_1" type="continuous">
                    <limit effort="150" velocity="3.14"/>
                </joint>
                <joint name="fixed_tool" type="fixed"/>
            </robot>
        "#;

        let joint_data = process_joints(xml).expect("Failed to process XML joints");
        assert_eq!(joint_data.len(), 3);

        let j2 = &joint_data["joint_2"];
        assert!((j2.lower.unwrap() + std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(j2.upper, Some(4.62));
        assert_eq!(j2.effort, Some(28.0));

        let j1 = joint_data["joint_1"].to_limit().unwrap();
        assert_eq!(j1.min_position, f64::NEG_INFINITY);
        assert_eq!(j1.max_position, f64::INFINITY);
        assert_eq!(j1.max_velocity, 3.14);

        assert!(joint_data["fixed_tool"].to_limit().is_err());
    }

    #[test]
    fn test_named_joints_in_multi_robot_cell() {
        let mut xml = String::from("<robot>");
        for side in ["left_", "right_"] {
            for i in 0..6 {
                let velocity = if side == "left_" { 1.0 + i as f64 } else { 10.0 };
                xml.push_str(&format!(
                    r#"<joint name="{}joint_{}" type="revolute">
                         <limit lower="-2.0" upper="2.0" effort="100" velocity="{}"/>
                       </joint>"#, side, i, velocity));
            }
        }
        xml.push_str("</robot>");

        let limits = joint_limits_from_urdf(&xml, &names("left_")).expect("Failed to read limits");
        for i in 0..6 {
            assert_eq!(limits.joints[i].max_velocity, 1.0 + i as f64);
            assert_eq!(limits.joints[i].min_position, -2.0);
            assert_eq!(limits.joints[i].max_effort, 100.0);
        }
    }

    #[test]
    fn test_missing_joint_is_reported() {
        let xml = r#"<robot><joint name="joint_0" type="continuous"><limit velocity="1"/></joint></robot>"#;
        let result = joint_limits_from_urdf(xml, &names(""));
        assert!(matches!(result, Err(ConfigError::UnknownJoint(ref name)) if name == "joint_1"),
                "{:?}", result);
    }

    #[test]
    fn test_conflicting_duplicates_are_rejected() {
        let xml = r#"
            <robot>
                <joint name="a" type="continuous"><limit velocity="1"/></joint>
                <joint name="a" type="continuous"><limit velocity="2"/></joint>
            </robot>"#;
        assert!(matches!(process_joints(xml), Err(ConfigError::XmlProcessing(_))));
    }

    #[test]
    fn test_missing_velocity() {
        let xml = r#"<robot><joint name="a" type="revolute"><limit lower="-1" upper="1"/></joint></robot>"#;
        let joints = process_joints(xml).unwrap();
        assert!(matches!(joints["a"].to_limit(), Err(ConfigError::MissingField(_))));
    }
}
