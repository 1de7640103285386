use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{bail, Context, Result};
use clap::Parser;
use nalgebra::Vector3;
use rs_admittance_control::config::ControllerConfig;
use rs_admittance_control::controller::AdmittanceController;
use rs_admittance_control::frame::FrameId;
use rs_admittance_control::kinematic_traits::Joints;
use rs_admittance_control::kinematics_impl::DhChain;
use rs_admittance_control::parameters::dh_kinematics::Parameters;
use rs_admittance_control::simulation::Simulation;
use rs_admittance_control::urdf::joint_limits_from_urdf_file;
use rs_admittance_control::utils::{dump_joints, dump_pose};
use rs_admittance_control::wrench::Wrench;

/// Pushes a simulated UR5e with a constant wrench at the sensor and reports how far the
/// end-effector yields. The arm follows every command exactly, so the result shows the
/// admittance dynamics alone.
#[derive(Parser, Debug)]
#[command(author, version, name = "rs-admittance-control")]
struct CommandLineArguments {
    /// YAML controller configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// URDF file to read the joint limits from
    #[arg(long)]
    urdf: Option<PathBuf>,

    /// Force at the sensor, N, as fx,fy,fz in the sensor frame
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_values_t = [0.0, 0.0, 10.0])]
    force: Vec<f64>,

    /// Torque at the sensor, N·m, as tx,ty,tz in the sensor frame
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_values_t = [0.0, 0.0, 0.0])]
    torque: Vec<f64>,

    /// Number of control cycles to simulate
    #[arg(long, default_value_t = 5000)]
    cycles: u64,

    /// Initial joint positions, rad
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true,
           default_values_t = [0.0, -1.2, 1.5, -1.9, -1.57, 0.3])]
    joints: Vec<f64>,
}

fn vector3(values: &[f64], what: &str) -> Result<Vector3<f64>> {
    if values.len() != 3 {
        bail!("{} needs three values, got {}", what, values.len());
    }
    Ok(Vector3::new(values[0], values[1], values[2]))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?),
        )
        .init();

    let args = CommandLineArguments::parse();

    let mut config = match &args.config {
        Some(path) => ControllerConfig::from_yaml_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    if let Some(path) = &args.urdf {
        config.limits = joint_limits_from_urdf_file(path, &config.joint_names)
            .with_context(|| format!("reading joint limits from {}", path.display()))?;
    }

    let joints: Joints = args.joints.as_slice().try_into()
        .with_context(|| format!("six joint positions needed, got {}", args.joints.len()))?;
    let wrench = Wrench::new(vector3(&args.force, "force")?, vector3(&args.torque, "torque")?,
                             FrameId::Sensor);

    let stiffness = config.admittance.stiffness;
    let mut controller = AdmittanceController::new(Arc::new(DhChain::new(Parameters::ur5e())));
    controller.configure(config)?;
    let mut simulation = Simulation::new(controller, joints)?;

    let start = simulation.pose(FrameId::EndEffector).context("controller is not configured")?;
    println!("Initial joints:");
    dump_joints(&joints);
    println!("Initial end-effector pose:");
    dump_pose(&start);

    let last = simulation.run(&wrench, args.cycles)?;

    let end = simulation.pose(FrameId::EndEffector).context("controller is not configured")?;
    let moved = end.translation.vector - start.translation.vector;
    println!("After {} cycles ({:.3} s):", args.cycles, simulation.time().as_secs_f64());
    dump_joints(&simulation.arm().state().positions);
    dump_pose(&end);
    println!("Displacement: [{:.5}, {:.5}, {:.5}] m", moved.x, moved.y, moved.z);
    println!("Stiffness:    [{:.1}, {:.1}, {:.1}] N/m", stiffness[0], stiffness[1], stiffness[2]);
    if let Some(output) = last {
        println!("Condition number {:.1}, limits hit: {:?}", output.condition_number, output.violations);
    }
    Ok(())
}
