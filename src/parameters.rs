//! Defines the kinematic parameter data structure of the reference serial chain

pub mod dh_kinematics {
    /// Standard Denavit–Hartenberg parameters of a 6 joint revolute arm. Link `i` transform is
    /// `Rz(theta_i) * Tz(d_i) * Tx(a_i) * Rx(alpha_i)` with
    /// `theta_i = joint_i * sign_corrections[i] + offsets[i]`.
    /// See [parameters_robots.rs](parameters_robots.rs) for concrete robot models.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Parameters {
        /// Link offsets along the previous z axis.
        pub d: [f64; 6],

        /// Link lengths along the rotated x axis.
        pub a: [f64; 6],

        /// Link twists about the rotated x axis.
        pub alpha: [f64; 6],

        /// Offsets applied to each joint angle to adjust the reference zero position.
        pub offsets: [f64; 6],

        /// Specifies the direction of positive rotation from the zero angle for each joint.
        /// A value of `-1` reverses the default rotation direction for that joint.
        pub sign_corrections: [i8; 6],
    }

    impl Parameters {
        /// All values finite and sign corrections in {-1, 1}.
        pub fn is_valid(&self) -> bool {
            self.d.iter()
                .chain(self.a.iter())
                .chain(self.alpha.iter())
                .chain(self.offsets.iter())
                .all(|v| v.is_finite())
                && self.sign_corrections.iter().all(|&s| s == 1 || s == -1)
        }

        /// Approximate reach of the arm: sum of all link lengths and offsets.
        pub fn reach(&self) -> f64 {
            self.d.iter().chain(self.a.iter()).map(|v| v.abs()).sum()
        }
    }
}
