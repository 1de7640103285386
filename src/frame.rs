//! Fixed geometric relationships between the frames the controller works with.
//!
//! The base frame is the root. The flange is moved by the kinematics solver (it is the pose
//! `Kinematics::forward` returns). End-effector, sensor and control frames are each rigidly
//! attached to some other frame by a fixed offset, so a sensor mounted between flange and
//! gripper, or a control frame at the gripper tip, or a control frame fixed in the workcell
//! can all be expressed. Parent names are resolved once, at configure time; afterwards all
//! lookups work on `FrameId` and do not allocate.

use nalgebra::Isometry3;
use crate::error::ControlError;
use crate::kinematic_traits::{Joints, Kinematics, Pose};
use crate::wrench::{Twist, Wrench};

/// Frames known to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameId {
    Base,
    Flange,
    EndEffector,
    Sensor,
    Control,
}

const FRAME_COUNT: usize = 5;

impl FrameId {
    pub const ALL: [FrameId; FRAME_COUNT] =
        [FrameId::Base, FrameId::Flange, FrameId::EndEffector, FrameId::Sensor, FrameId::Control];

    fn index(self) -> usize {
        match self {
            FrameId::Base => 0,
            FrameId::Flange => 1,
            FrameId::EndEffector => 2,
            FrameId::Sensor => 3,
            FrameId::Control => 4,
        }
    }
}

/// Frame rigidly attached to another frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedFrame {
    pub name: String,

    /// Name of the frame this one is attached to.
    pub parent: String,

    /// Pose of this frame in the parent frame.
    pub offset: Isometry3<f64>,
}

impl AttachedFrame {
    pub fn new(name: &str, parent: &str, offset: Isometry3<f64>) -> Self {
        Self { name: name.to_string(), parent: parent.to_string(), offset }
    }
}

/// Frame names and mounting offsets as configured by the integrator.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    pub base: String,
    pub flange: String,
    pub end_effector: AttachedFrame,
    pub sensor: AttachedFrame,
    pub control: AttachedFrame,
}

impl FrameConfig {
    /// Sensor and end-effector directly on the flange without offset, control frame
    /// aligned with the base. This is the typical setup for the base-frame admittance.
    pub fn new(base: &str, flange: &str) -> Self {
        Self {
            base: base.to_string(),
            flange: flange.to_string(),
            end_effector: AttachedFrame::new("tool0", flange, Isometry3::identity()),
            sensor: AttachedFrame::new("ft_sensor", flange, Isometry3::identity()),
            control: AttachedFrame::new("control", base, Isometry3::identity()),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self::new("base_link", "flange")
    }
}

/// Resolved frame tree: for every attached frame the parent id and the fixed offset.
#[derive(Debug, Clone)]
pub struct FrameProvider {
    names: [String; FRAME_COUNT],
    parents: [FrameId; FRAME_COUNT],
    offsets: [Isometry3<f64>; FRAME_COUNT],
}

impl FrameProvider {
    /// Resolves the parent names and verifies the tree has no cycles.
    pub fn new(config: &FrameConfig) -> Result<Self, ControlError> {
        let names = [
            config.base.clone(),
            config.flange.clone(),
            config.end_effector.name.clone(),
            config.sensor.name.clone(),
            config.control.name.clone(),
        ];

        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(ControlError::frame_resolution(
                    "", &config.base, format!("frame {:?} has no name", FrameId::ALL[i])));
            }
            if names[..i].contains(name) {
                return Err(ControlError::frame_resolution(
                    name, &config.base, "frame name is used more than once"));
            }
        }

        let mut parents = [FrameId::Base; FRAME_COUNT];
        let mut offsets = [Isometry3::identity(); FRAME_COUNT];
        for (id, attached) in [
            (FrameId::EndEffector, &config.end_effector),
            (FrameId::Sensor, &config.sensor),
            (FrameId::Control, &config.control),
        ] {
            let parent = names.iter().position(|n| *n == attached.parent)
                .map(|i| FrameId::ALL[i])
                .ok_or_else(|| ControlError::frame_resolution(
                    &attached.name, &attached.parent, "parent frame is not configured"))?;
            if !attached.offset.translation.vector.iter().all(|v| v.is_finite())
                || !attached.offset.rotation.coords.iter().all(|v| v.is_finite()) {
                return Err(ControlError::frame_resolution(
                    &attached.name, &attached.parent, "offset is not finite"));
            }
            parents[id.index()] = parent;
            offsets[id.index()] = attached.offset;
        }

        let provider = Self { names, parents, offsets };
        for id in FrameId::ALL {
            provider.root_distance(id).ok_or_else(|| ControlError::frame_resolution(
                provider.name(id), provider.name(FrameId::Base), "frames are attached in a cycle"))?;
        }
        Ok(provider)
    }

    pub fn name(&self, id: FrameId) -> &str {
        &self.names[id.index()]
    }

    /// Frame id for the configured name.
    pub fn id(&self, name: &str) -> Option<FrameId> {
        self.names.iter().position(|n| n == name).map(|i| FrameId::ALL[i])
    }

    /// Number of hops to the base or flange, None if the frame is part of a cycle.
    fn root_distance(&self, id: FrameId) -> Option<usize> {
        let mut current = id;
        for hops in 0..=FRAME_COUNT {
            match current {
                FrameId::Base | FrameId::Flange => return Some(hops),
                other => current = self.parents[other.index()],
            }
        }
        None
    }

    /// Pose of the frame in base, given the current flange pose.
    pub fn pose_in_base(&self, id: FrameId, flange: &Pose) -> Pose {
        let mut pose = Pose::identity();
        let mut current = id;
        // Depth is bounded by the cycle check done at construction.
        for _ in 0..=FRAME_COUNT {
            match current {
                FrameId::Base => return pose,
                FrameId::Flange => return flange * pose,
                other => {
                    pose = self.offsets[other.index()] * pose;
                    current = self.parents[other.index()];
                }
            }
        }
        pose
    }

    /// Transform that maps coordinates given in `source` into coordinates in `target`.
    pub fn transform(&self, target: FrameId, source: FrameId, flange: &Pose) -> Isometry3<f64> {
        self.pose_in_base(target, flange).inverse() * self.pose_in_base(source, flange)
    }

    /// Transform between two frames given by name, for the current joint positions.
    pub fn resolve(&self, target: &str, source: &str,
                   robot: &(impl Kinematics + ?Sized), joints: &Joints)
                   -> Result<Isometry3<f64>, ControlError> {
        let target_id = self.id(target).ok_or_else(||
            ControlError::frame_resolution(source, target, format!("unknown frame '{}'", target)))?;
        let source_id = self.id(source).ok_or_else(||
            ControlError::frame_resolution(source, target, format!("unknown frame '{}'", source)))?;
        let flange = robot.forward(joints);
        if !flange.translation.vector.iter().all(|v| v.is_finite()) {
            return Err(ControlError::frame_resolution(
                source, target, "forward kinematics is not finite for the joint state"));
        }
        Ok(self.transform(target_id, source_id, &flange))
    }

    /// Expresses the wrench in the target frame.
    pub fn wrench_to(&self, target: FrameId, wrench: &Wrench, flange: &Pose) -> Wrench {
        if wrench.frame == target {
            return *wrench;
        }
        wrench.transformed(&self.transform(target, wrench.frame, flange), target)
    }

    /// Expresses the twist in the target frame.
    pub fn twist_to(&self, target: FrameId, twist: &Twist, flange: &Pose) -> Twist {
        if twist.frame == target {
            return *twist;
        }
        twist.transformed(&self.transform(target, twist.frame, flange), target)
    }
}
