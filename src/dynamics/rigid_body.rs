use std::f64::consts::SQRT_2;

use nalgebra::{Rotation3, Vector3};

use crate::dynamics::state::{Deriv, KinematicState, MotorCommand};
use crate::vehicle::VehicleParameters;

// ---------------------------------------------------------------------------
// 6DOF Newton-Euler equations of motion
// ---------------------------------------------------------------------------

/// Body-frame thrust (N) and torques (N·m) produced by a motor command.
///
/// Sign convention, shared with the mixer:
///   roll  > 0 from motors 2/4 over motors 1/3
///   pitch > 0 from the front pair over the rear pair
///   yaw   > 0 from motors 1/3 over motors 2/4
pub fn motor_wrench(cmd: &MotorCommand, params: &VehicleParameters) -> (f64, Vector3<f64>) {
    let [m1, m2, m3, m4] = cmd.motors();
    let f = params.max_motor_thrust;
    let lever = params.arm_length / SQRT_2;

    let thrust = (m1 + m2 + m3 + m4) * f;
    let torque = Vector3::new(
        lever * f * ((m2 + m4) - (m1 + m3)),
        lever * f * ((m1 + m2) - (m3 + m4)),
        params.thrust_to_torque * f * ((m1 + m3) - (m2 + m4)),
    );
    (thrust, torque)
}

/// Compute full 6DOF state derivatives for a constant motor command.
///
/// Forces & moments:
///   1. Rotor thrust along body +Z, rotated to world by Rz(yaw)·Ry(pitch)·Rx(roll)
///   2. Gravity on world -Z
///   3. Quadratic drag opposing velocity
///   4. Rotor differential torques with gyroscopic coupling
pub fn derivatives(
    state: &KinematicState,
    params: &VehicleParameters,
    cmd: &MotorCommand,
) -> Deriv {
    let (thrust, torque_body) = motor_wrench(cmd, params);

    // --- Thrust (body frame → world) ---
    let rot = Rotation3::from_euler_angles(state.attitude.x, state.attitude.y, state.attitude.z);
    let f_thrust = rot * Vector3::new(0.0, 0.0, thrust);

    // --- Gravity ---
    let f_gravity = Vector3::new(0.0, 0.0, -params.weight());

    // --- Drag (opposing velocity, magnitude c·|v|^2) ---
    let speed = state.vel.norm();
    let f_drag = if speed > 1e-9 {
        -state.vel / speed * (params.drag_coeff * speed * speed)
    } else {
        Vector3::zeros()
    };

    let accel = (f_thrust + f_gravity + f_drag) / params.mass;

    // --- Euler's equation: I * domega = torque - omega × (I * omega) ---
    let i_vec = params.inertia;
    let w = state.omega;
    let i_omega = i_vec.component_mul(&w);
    let domega = (torque_body - w.cross(&i_omega)).component_div(&i_vec);

    Deriv {
        dpos: state.vel,
        dvel: accel,
        // Body rates drive the Euler angles directly.
        dattitude: w,
        domega,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
