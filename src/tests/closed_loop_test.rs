#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use crate::config::ControllerConfig;
    use crate::controller::ControllerMode;
    use crate::frame::FrameId;
    use crate::tests::test_utils::{end_effector_position, force, simulation, HOME};
    use crate::wrench::Wrench;

    #[test]
    fn test_push_settles_at_force_over_stiffness() {
        let config = ControllerConfig::default();
        assert_eq!(config.admittance.stiffness[2], 200.0);
        let mut simulation = simulation(config, HOME);

        let start = simulation.pose(FrameId::Sensor).unwrap();
        // 40 N along the sensor z axis, 200 N/m: 0.2 m along that axis.
        let expected = start.rotation * Vector3::new(0.0, 0.0, 0.2);

        let output = simulation.run(&force(0.0, 0.0, 40.0), 5000).unwrap().unwrap();
        let moved = end_effector_position(&simulation) - start.translation.vector;

        assert!((moved.norm() - 0.2).abs() < 0.002, "moved {:?}", moved);
        assert!((moved - expected).norm() < 0.002, "moved {:?}, expected {:?}", moved, expected);
        assert!(output.violations.is_empty());
        assert!(!output.singular);

        let state = simulation.controller().admittance_state();
        assert!((state.position.norm() - 0.2).abs() < 0.002);
        assert!(state.velocity.norm() < 1e-4);
    }

    #[test]
    fn test_orientation_is_held_under_pure_force() {
        let mut simulation = simulation(ControllerConfig::default(), HOME);
        let start = simulation.pose(FrameId::EndEffector).unwrap();
        simulation.run(&force(25.0, -10.0, 0.0), 3000).unwrap();
        let end = simulation.pose(FrameId::EndEffector).unwrap();
        assert!(start.rotation.angle_to(&end.rotation) < 1e-3);
    }

    #[test]
    fn test_release_returns_to_reference() {
        let mut simulation = simulation(ControllerConfig::default(), HOME);
        let start = end_effector_position(&simulation);
        simulation.run(&force(30.0, 0.0, 0.0), 2000).unwrap();
        assert!((end_effector_position(&simulation) - start).norm() > 0.1);

        simulation.run(&Wrench::zero(FrameId::Sensor), 5000).unwrap();
        assert!((end_effector_position(&simulation) - start).norm() < 1e-3);
    }

    #[test]
    fn test_small_push_inside_deadband_does_nothing() {
        let mut simulation = simulation(ControllerConfig::default(), HOME);
        simulation.run(&force(0.0, 0.3, 0.0), 500).unwrap();
        assert!(simulation.controller().admittance_state().is_zero());
        assert_eq!(simulation.arm().state().positions, HOME);
    }

    #[test]
    fn test_unselected_axis_is_rigid() {
        let mut config = ControllerConfig::default();
        config.admittance.selected = [true, true, false, true, true, true];
        let mut simulation = simulation(config, HOME);
        let start = end_effector_position(&simulation);

        // Straight up in base, the axis that is not selected.
        let sensor = simulation.pose(FrameId::Sensor).unwrap();
        let push_up = sensor.rotation.inverse() * Vector3::new(0.0, 0.0, 40.0);
        simulation.run(&Wrench::new(push_up, Vector3::zeros(), FrameId::Sensor), 2000).unwrap();

        let moved = end_effector_position(&simulation) - start;
        assert!(moved.z.abs() < 1e-3, "moved {:?}", moved);
    }

    #[test]
    fn test_retuning_takes_effect_while_active() {
        let mut simulation = simulation(ControllerConfig::default(), HOME);
        let writer = simulation.controller().parameter_writer().unwrap();
        let start = end_effector_position(&simulation);

        let mut stiffer = simulation.controller().config().unwrap().runtime_parameters();
        stiffer.admittance.stiffness = [400.0, 400.0, 400.0, 10.0, 10.0, 10.0];
        writer.publish(stiffer).unwrap();

        simulation.run(&force(0.0, 0.0, 40.0), 5000).unwrap();
        let moved = end_effector_position(&simulation) - start;
        assert!((moved.norm() - 0.1).abs() < 0.001, "moved {:?}", moved);
    }

    #[test]
    fn test_non_positive_retuning_is_refused() {
        let mut simulation = simulation(ControllerConfig::default(), HOME);
        let writer = simulation.controller().parameter_writer().unwrap();
        let start = end_effector_position(&simulation);

        let mut unstable = simulation.controller().config().unwrap().runtime_parameters();
        unstable.admittance.damping = [-5.0; 6];
        unstable.admittance.stiffness = [-50.0; 6];
        assert!(writer.publish(unstable).is_err());

        // Still the configured 200 N/m: 5 N yields 25 mm.
        simulation.run(&force(0.0, 0.0, 5.0), 3000).unwrap();
        let moved = end_effector_position(&simulation) - start;
        assert_eq!(simulation.controller().mode(), ControllerMode::Active);
        assert!((moved.norm() - 0.025).abs() < 0.001, "moved {:?}", moved);
    }

    #[test]
    fn test_reference_motion_is_followed() {
        let mut simulation = simulation(ControllerConfig::default(), HOME);
        let mut reference = *simulation.controller().reference().unwrap();
        reference.pose.translation.vector.x += 0.05;

        for _ in 0..3000 {
            simulation.step_with_reference(&Wrench::zero(FrameId::Sensor), Some(reference)).unwrap();
        }
        let reached = end_effector_position(&simulation);
        assert!((reached - reference.pose.translation.vector).norm() < 1e-3);
    }
}
