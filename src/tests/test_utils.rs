use std::sync::Arc;
use nalgebra::Vector3;
use crate::config::ControllerConfig;
use crate::controller::AdmittanceController;
use crate::frame::FrameId;
use crate::kinematic_traits::Joints;
use crate::kinematics_impl::DhChain;
use crate::parameters::dh_kinematics::Parameters;
use crate::simulation::Simulation;
use crate::wrench::Wrench;

/// Well conditioned UR5e configuration, elbow up, tool pointing down.
pub(crate) const HOME: Joints = [0.0, -1.2, 1.5, -1.9, -1.57, 0.3];

pub(crate) fn ur5e_controller(config: ControllerConfig) -> AdmittanceController {
    let mut controller = AdmittanceController::new(Arc::new(DhChain::new(Parameters::ur5e())));
    controller.configure(config).expect("configuration must be accepted");
    controller
}

pub(crate) fn simulation(config: ControllerConfig, joints: Joints) -> Simulation {
    Simulation::new(ur5e_controller(config), joints).expect("activation must succeed")
}

pub(crate) fn force(x: f64, y: f64, z: f64) -> Wrench {
    Wrench::new(Vector3::new(x, y, z), Vector3::zeros(), FrameId::Sensor)
}

pub(crate) fn end_effector_position(simulation: &Simulation) -> Vector3<f64> {
    simulation.pose(FrameId::EndEffector).expect("configured").translation.vector
}
