//! Unicycle motion model shared by the estimator and the truth simulator.

use nalgebra::{Matrix3, Matrix3x2};
use serde::{Deserialize, Serialize};

use crate::util::Pose;

/// Integration scheme for the pose update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionIntegrator {
    Euler,
    #[default]
    RungeKutta4,
}

/// Time derivative of the pose under forward speed `v` and turn rate `w`.
pub fn unicycle_derivative(pose: &Pose, v: f64, w: f64) -> Pose {
    Pose::new(v * pose[2].cos(), v * pose[2].sin(), w)
}

pub fn euler_step(pose: &Pose, v: f64, w: f64, dt: f64) -> Pose {
    pose + unicycle_derivative(pose, v, w) * dt
}

/// Classic fourth-order Runge-Kutta step with the control held constant.
pub fn rk4_step(pose: &Pose, v: f64, w: f64, dt: f64) -> Pose {
    let k1 = unicycle_derivative(pose, v, w);
    let k2 = unicycle_derivative(&(pose + k1 * (0.5 * dt)), v, w);
    let k3 = unicycle_derivative(&(pose + k2 * (0.5 * dt)), v, w);
    let k4 = unicycle_derivative(&(pose + k3 * dt), v, w);
    pose + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

impl MotionIntegrator {
    pub fn step(&self, pose: &Pose, v: f64, w: f64, dt: f64) -> Pose {
        match self {
            MotionIntegrator::Euler => euler_step(pose, v, w, dt),
            MotionIntegrator::RungeKutta4 => rk4_step(pose, v, w, dt),
        }
    }
}

/// Jacobians of the Euler-linearized motion with respect to the pose (A) and
/// the control noise (N), evaluated at heading `theta`.
pub fn motion_jacobians(theta: f64, v: f64, dt: f64) -> (Matrix3<f64>, Matrix3x2<f64>) {
    let (s, c) = theta.sin_cos();
    #[rustfmt::skip]
    let a = Matrix3::new(
        1.0, 0.0, -dt * v * s,
        0.0, 1.0, dt * v * c,
        0.0, 0.0, 1.0,
    );
    #[rustfmt::skip]
    let n = Matrix3x2::new(
        dt * c, 0.0,
        dt * s, 0.0,
        0.0, dt,
    );
    (a, n)
}
