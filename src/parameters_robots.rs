//! Hardcoded DH parameters for a few collaborative robots commonly used with force/torque sensors

pub mod dh_kinematics {
    use crate::parameters::dh_kinematics::Parameters;
    use std::f64::consts::FRAC_PI_2;

    /// Twists shared by the whole Universal Robots e-Series family.
    const UR_ALPHA: [f64; 6] = [FRAC_PI_2, 0.0, 0.0, FRAC_PI_2, -FRAC_PI_2, 0.0];

    #[allow(dead_code)]
    impl Parameters {
        // Provides default values
        pub fn new() -> Self {
            Parameters {
                d: [0.0; 6],
                a: [0.0; 6],
                alpha: [0.0; 6],
                offsets: [0.0; 6],
                sign_corrections: [1; 6],
            }
        }

        // See https://www.universal-robots.com/articles/ur/application-installation/dh-parameters-for-calculations-of-kinematics-and-dynamics/
        pub fn ur3e() -> Self {
            Parameters {
                d: [0.15185, 0.0, 0.0, 0.13105, 0.08535, 0.0921],
                a: [0.0, -0.24355, -0.2132, 0.0, 0.0, 0.0],
                alpha: UR_ALPHA,
                ..Self::new()
            }
        }

        pub fn ur5e() -> Self {
            Parameters {
                d: [0.1625, 0.0, 0.0, 0.1333, 0.0997, 0.0996],
                a: [0.0, -0.425, -0.3922, 0.0, 0.0, 0.0],
                alpha: UR_ALPHA,
                ..Self::new()
            }
        }

        pub fn ur10e() -> Self {
            Parameters {
                d: [0.1807, 0.0, 0.0, 0.17415, 0.11985, 0.11655],
                a: [0.0, -0.6127, -0.57155, 0.0, 0.0, 0.0],
                alpha: UR_ALPHA,
                ..Self::new()
            }
        }
    }
}
