use crate::dynamics::integrator::rk4_step;
use crate::dynamics::state::{wrap_attitude, KinematicState, MotorCommand};
use crate::vehicle::VehicleParameters;

// ---------------------------------------------------------------------------
// Rigid-body model: owns the vehicle state and advances it
// ---------------------------------------------------------------------------

/// Quadrotor rigid body. Knows nothing about control or scheduling.
#[derive(Debug, Clone)]
pub struct RigidBodyModel {
    params: VehicleParameters,
    state: KinematicState,
}

impl RigidBodyModel {
    pub fn new(params: VehicleParameters) -> Self {
        debug_assert!(params.validate().is_ok(), "invalid vehicle: {:?}", params.validate());
        Self {
            params,
            state: KinematicState::default(),
        }
    }

    /// Advance the state by `dt` seconds under a constant motor command.
    pub fn update(&mut self, cmd: &MotorCommand, dt: f64) {
        debug_assert!(dt > 0.0 && dt.is_finite(), "dt must be positive, got {}", dt);

        let mut next = rk4_step(&self.state, &self.params, cmd, dt);

        // Ground contact: no penetration, no bounce.
        if next.pos.z < 0.0 {
            next.pos.z = 0.0;
            next.vel.z = next.vel.z.max(0.0);
        }
        next.attitude = wrap_attitude(next.attitude);

        self.state = next;
    }

    pub fn state(&self) -> KinematicState {
        self.state
    }

    pub fn set_state(&mut self, state: KinematicState) {
        self.state = KinematicState {
            attitude: wrap_attitude(state.attitude),
            ..state
        };
    }

    /// Back to rest at the origin.
    pub fn reset(&mut self) {
        self.state = KinematicState::default();
    }

    pub fn params(&self) -> &VehicleParameters {
        &self.params
    }

    pub fn set_params(&mut self, params: VehicleParameters) {
        debug_assert!(params.validate().is_ok(), "invalid vehicle: {:?}", params.validate());
        self.params = params;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::presets;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::f64::consts::PI;

    #[test]
    fn hover_holds_altitude() {
        let p = presets::trainer();
        let hover = MotorCommand::uniform(p.hover_throttle());
        let mut model = RigidBodyModel::new(p);
        let mut s = model.state();
        s.pos.z = 5.0;
        model.set_state(s);
        for _ in 0..500 {
            model.update(&hover, 0.01);
        }
        assert_relative_eq!(model.state().pos.z, 5.0, epsilon = 1e-9);
        assert_relative_eq!(model.state().vel.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn ground_clamp_without_bounce() {
        let mut model = RigidBodyModel::new(presets::trainer());
        let mut s = model.state();
        s.pos.z = 0.05;
        s.vel.z = -4.0;
        model.set_state(s);
        for _ in 0..20 {
            model.update(&MotorCommand::default(), 0.01);
            let st = model.state();
            assert!(st.pos.z >= 0.0);
            if st.pos.z == 0.0 {
                assert!(st.vel.z >= 0.0);
            }
        }
        assert_eq!(model.state().pos.z, 0.0);
        assert_eq!(model.state().vel.z, 0.0);
    }

    #[test]
    fn attitude_stays_normalized_while_spinning() {
        let mut model = RigidBodyModel::new(presets::trainer());
        let mut s = model.state();
        s.pos.z = 50.0;
        s.omega = Vector3::new(7.0, -5.0, 11.0);
        model.set_state(s);
        // Full yaw differential keeps the body spinning up.
        let cmd = MotorCommand::new(1.0, 0.2, 1.0, 0.2);
        for _ in 0..3000 {
            model.update(&cmd, 0.01);
            for a in model.state().attitude.iter() {
                assert!(*a > -PI && *a <= PI, "angle {} escaped (-pi, pi]", a);
            }
        }
    }

    #[test]
    fn yaw_at_pi_with_tiny_rate_stays_in_range() {
        let p = presets::trainer();
        let hover = MotorCommand::uniform(p.hover_throttle());
        let mut model = RigidBodyModel::new(p);
        let mut s = model.state();
        s.pos.z = 10.0;
        s.attitude.z = PI;
        s.omega.z = 4.5e-14;
        model.set_state(s);
        model.update(&hover, 0.01);
        let yaw = model.state().yaw();
        assert!(yaw > -PI && yaw <= PI, "yaw {} escaped (-pi, pi]", yaw);
    }

    #[test]
    fn reset_returns_to_rest() {
        let mut model = RigidBodyModel::new(presets::trainer());
        model.update(&MotorCommand::uniform(1.0), 0.01);
        assert!(model.state().pos.z > 0.0);
        model.reset();
        assert_eq!(model.state(), KinematicState::default());
    }

    #[test]
    fn set_state_wraps_attitude() {
        let mut model = RigidBodyModel::new(presets::trainer());
        let mut s = KinematicState::default();
        s.attitude = Vector3::new(2.0 * PI + 0.3, 0.0, -PI);
        model.set_state(s);
        assert_relative_eq!(model.state().attitude.x, 0.3, epsilon = 1e-9);
        assert_relative_eq!(model.state().attitude.z, PI, epsilon = 1e-9);
    }
}
