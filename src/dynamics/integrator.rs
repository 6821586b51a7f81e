use crate::dynamics::rigid_body;
use crate::dynamics::state::{KinematicState, MotorCommand};
use crate::vehicle::VehicleParameters;

// ---------------------------------------------------------------------------
// 6DOF RK4 integrator with constant motor command over the step
// ---------------------------------------------------------------------------

/// Single RK4 step with constant motor command over the step.
///
/// Returns the raw integrated state; ground contact and angle wrapping are
/// applied by the caller.
pub fn rk4_step(
    state: &KinematicState,
    params: &VehicleParameters,
    cmd: &MotorCommand,
    dt: f64,
) -> KinematicState {
    let k1 = rigid_body::derivatives(state, params, cmd);
    let k2 = rigid_body::derivatives(&state.apply(&k1, dt * 0.5), params, cmd);
    let k3 = rigid_body::derivatives(&state.apply(&k2, dt * 0.5), params, cmd);
    let k4 = rigid_body::derivatives(&state.apply(&k3, dt), params, cmd);

    KinematicState {
        pos: state.pos + (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) * (dt / 6.0),
        vel: state.vel + (k1.dvel + 2.0 * k2.dvel + 2.0 * k3.dvel + k4.dvel) * (dt / 6.0),
        attitude: state.attitude
            + (k1.dattitude + 2.0 * k2.dattitude + 2.0 * k3.dattitude + k4.dattitude)
                * (dt / 6.0),
        omega: state.omega
            + (k1.domega + 2.0 * k2.domega + 2.0 * k3.domega + k4.domega) * (dt / 6.0),
    }
}
