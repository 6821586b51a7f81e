use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Physical constants
// ---------------------------------------------------------------------------

pub const GRAVITY: f64 = 9.81; // m/s^2

// ---------------------------------------------------------------------------
// Kinematic state: position, velocity, attitude, angular rate
// ---------------------------------------------------------------------------

/// Rigid-body state of the vehicle.
/// Frame: world X/Y horizontal, Z up, origin on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    pub pos: Vector3<f64>,      // m
    pub vel: Vector3<f64>,      // m/s
    pub attitude: Vector3<f64>, // rad [roll, pitch, yaw]
    pub omega: Vector3<f64>,    // rad/s, body rates
}

impl Default for KinematicState {
    fn default() -> Self {
        Self {
            pos: Vector3::zeros(),
            vel: Vector3::zeros(),
            attitude: Vector3::zeros(),
            omega: Vector3::zeros(),
        }
    }
}

impl KinematicState {
    pub fn apply(&self, d: &Deriv, dt: f64) -> KinematicState {
        KinematicState {
            pos: self.pos + d.dpos * dt,
            vel: self.vel + d.dvel * dt,
            attitude: self.attitude + d.dattitude * dt,
            omega: self.omega + d.domega * dt,
        }
    }

    pub fn roll(&self) -> f64 {
        self.attitude.x
    }

    pub fn pitch(&self) -> f64 {
        self.attitude.y
    }

    pub fn yaw(&self) -> f64 {
        self.attitude.z
    }

    /// Straight-line distance to a world point (m).
    pub fn distance_to(&self, target: &Vector3<f64>) -> f64 {
        (self.pos - target).norm()
    }
}

// ---------------------------------------------------------------------------
// State derivative
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Deriv {
    pub dpos: Vector3<f64>,
    pub dvel: Vector3<f64>,
    pub dattitude: Vector3<f64>,
    pub domega: Vector3<f64>, // angular acceleration, body frame
}

// ---------------------------------------------------------------------------
// Motor command
// ---------------------------------------------------------------------------

/// Normalized thrust fraction per rotor, X configuration.
/// Order: front-left, front-right, rear-left, rear-right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand(pub [f64; 4]);

impl MotorCommand {
    pub fn new(m1: f64, m2: f64, m3: f64, m4: f64) -> Self {
        Self([
            m1.clamp(0.0, 1.0),
            m2.clamp(0.0, 1.0),
            m3.clamp(0.0, 1.0),
            m4.clamp(0.0, 1.0),
        ])
    }

    /// Same thrust fraction on every rotor.
    pub fn uniform(level: f64) -> Self {
        Self::new(level, level, level, level)
    }

    pub fn motors(&self) -> [f64; 4] {
        self.0
    }

    /// Sum of the four thrust fractions.
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Angle helpers
// ---------------------------------------------------------------------------

/// Wrap an angle into (-pi, pi].
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = PI - (PI - angle).rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU just above pi.
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Wrap each component of an Euler-angle vector into (-pi, pi].
pub fn wrap_attitude(attitude: Vector3<f64>) -> Vector3<f64> {
    attitude.map(wrap_angle)
}
