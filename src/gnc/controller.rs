use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::dynamics::state::{wrap_angle, KinematicState, MotorCommand};
use crate::vehicle::NOMINAL_HOVER_THROTTLE;

use super::cascade::CascadedLoop;
use super::mixer::{axis_inputs, mix, AxisInputs, FlightMode, LoopOutputs, ManualInputs};
use super::pid::{PidGains, PidLoop};

// ---------------------------------------------------------------------------
// Controller configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub altitude: PidGains,
    pub roll: PidGains,
    pub pitch: PidGains,
    pub yaw: PidGains,
    pub position_x_outer: PidGains,
    pub position_x_inner: PidGains,
    pub position_y_outer: PidGains,
    pub position_y_inner: PidGains,
    pub hover_throttle: f64,      // collective fraction added to the altitude output
    pub max_climb_output: f64,    // ± bound on the altitude loop
    pub max_attitude_output: f64, // ± bound on each attitude loop
    pub max_velocity: f64,        // m/s, ± bound on the position loops
    pub max_tilt: f64,            // rad, ± bound on commanded roll/pitch
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Tuned for the trainer airframe (1 kg, Ixx~0.01, hover at 0.65)
            altitude: PidGains::new(0.5, 0.1, 0.4),
            roll: PidGains::new(0.15, 0.01, 0.03),
            pitch: PidGains::new(0.15, 0.01, 0.03),
            yaw: PidGains::new(0.3, 0.01, 0.1),
            position_x_outer: PidGains::new(0.8, 0.0, 0.0),
            position_x_inner: PidGains::new(0.2, 0.02, 0.0),
            position_y_outer: PidGains::new(0.8, 0.0, 0.0),
            position_y_inner: PidGains::new(0.2, 0.02, 0.0),
            hover_throttle: NOMINAL_HOVER_THROTTLE,
            max_climb_output: 0.35,
            max_attitude_output: 0.2,
            max_velocity: 2.0,
            max_tilt: 0.3,
        }
    }
}

impl ControllerConfig {
    pub fn merge(&mut self, update: &ControllerConfigUpdate) {
        let gains = [
            (&mut self.altitude, update.altitude),
            (&mut self.roll, update.roll),
            (&mut self.pitch, update.pitch),
            (&mut self.yaw, update.yaw),
            (&mut self.position_x_outer, update.position_x_outer),
            (&mut self.position_x_inner, update.position_x_inner),
            (&mut self.position_y_outer, update.position_y_outer),
            (&mut self.position_y_inner, update.position_y_inner),
        ];
        for (slot, new) in gains {
            if let Some(g) = new {
                *slot = g;
            }
        }
        let limits = [
            (&mut self.hover_throttle, update.hover_throttle),
            (&mut self.max_climb_output, update.max_climb_output),
            (&mut self.max_attitude_output, update.max_attitude_output),
            (&mut self.max_velocity, update.max_velocity),
            (&mut self.max_tilt, update.max_tilt),
        ];
        for (slot, new) in limits {
            if let Some(v) = new {
                *slot = v;
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let gains = [
            ("altitude", &self.altitude),
            ("roll", &self.roll),
            ("pitch", &self.pitch),
            ("yaw", &self.yaw),
            ("position_x_outer", &self.position_x_outer),
            ("position_x_inner", &self.position_x_inner),
            ("position_y_outer", &self.position_y_outer),
            ("position_y_inner", &self.position_y_inner),
        ];
        for (name, g) in gains {
            if !g.is_finite() {
                return Err(format!("{} gains must be finite: {:?}", name, g));
            }
        }
        if !(0.0..=1.0).contains(&self.hover_throttle) {
            return Err(format!("hover_throttle must be in [0, 1], got {}", self.hover_throttle));
        }
        let limits = [
            ("max_climb_output", self.max_climb_output),
            ("max_attitude_output", self.max_attitude_output),
            ("max_velocity", self.max_velocity),
            ("max_tilt", self.max_tilt),
        ];
        for (name, v) in limits {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{} must be non-negative and finite, got {}", name, v));
            }
        }
        Ok(())
    }
}

/// Partial update for [`ControllerConfig`]; gains replace per axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfigUpdate {
    pub altitude: Option<PidGains>,
    pub roll: Option<PidGains>,
    pub pitch: Option<PidGains>,
    pub yaw: Option<PidGains>,
    pub position_x_outer: Option<PidGains>,
    pub position_x_inner: Option<PidGains>,
    pub position_y_outer: Option<PidGains>,
    pub position_y_inner: Option<PidGains>,
    pub hover_throttle: Option<f64>,
    pub max_climb_output: Option<f64>,
    pub max_attitude_output: Option<f64>,
    pub max_velocity: Option<f64>,
    pub max_tilt: Option<f64>,
}

// ---------------------------------------------------------------------------
// Setpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setpoints {
    pub position: Vector3<f64>, // m, world
    pub attitude: Vector3<f64>, // rad [roll, pitch, yaw]
}

impl Default for Setpoints {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            attitude: Vector3::zeros(),
        }
    }
}

impl Setpoints {
    pub fn merge(&mut self, update: &SetpointsUpdate) {
        if let Some(v) = update.x {
            self.position.x = v;
        }
        if let Some(v) = update.y {
            self.position.y = v;
        }
        if let Some(v) = update.z {
            self.position.z = v;
        }
        if let Some(v) = update.roll {
            self.attitude.x = v;
        }
        if let Some(v) = update.pitch {
            self.attitude.y = v;
        }
        if let Some(v) = update.yaw {
            self.attitude.z = v;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SetpointsUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
}

impl SetpointsUpdate {
    pub fn position(target: Vector3<f64>) -> Self {
        Self {
            x: Some(target.x),
            y: Some(target.y),
            z: Some(target.z),
            ..Default::default()
        }
    }

    pub fn altitude(z: f64) -> Self {
        Self { z: Some(z), ..Default::default() }
    }
}

// ---------------------------------------------------------------------------
// Per-step controller output
// ---------------------------------------------------------------------------

/// One value per control axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisValues {
    pub altitude: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub position_x: f64,
    pub position_y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlStep {
    pub motors: MotorCommand,
    pub inputs: AxisInputs,
    pub outputs: AxisValues,
    pub errors: AxisValues,
}

// ---------------------------------------------------------------------------
// Flight controller: every loop of the cascade plus the mixer
// ---------------------------------------------------------------------------

/// Loop groups that ran on the previous step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ActiveLoops {
    altitude: bool,
    attitude: bool,
    yaw: bool,
    position: bool,
}

#[derive(Debug, Clone)]
pub struct FlightController {
    config: ControllerConfig,
    altitude: PidLoop,
    roll: PidLoop,
    pitch: PidLoop,
    yaw: PidLoop,
    position_x: CascadedLoop,
    position_y: CascadedLoop,
    active: ActiveLoops,
}

impl FlightController {
    pub fn new(config: ControllerConfig) -> Self {
        debug_assert!(
            config.validate().is_ok(),
            "invalid controller config: {:?}",
            config.validate(),
        );
        let c = &config;
        let altitude = PidLoop::symmetric(c.altitude, c.max_climb_output);
        let roll = PidLoop::symmetric(c.roll, c.max_attitude_output);
        let pitch = PidLoop::symmetric(c.pitch, c.max_attitude_output);
        let yaw = PidLoop::symmetric(c.yaw, c.max_attitude_output);
        let position_x = CascadedLoop::new(
            c.position_x_outer,
            c.position_x_inner,
            c.max_velocity,
            c.max_tilt,
        );
        let position_y = CascadedLoop::new(
            c.position_y_outer,
            c.position_y_inner,
            c.max_velocity,
            c.max_tilt,
        );
        Self {
            config,
            altitude,
            roll,
            pitch,
            yaw,
            position_x,
            position_y,
            active: ActiveLoops::default(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Merge a partial config and push it into the live loops.
    /// Gains are replaced; integrators and last errors carry over.
    pub fn apply_config(&mut self, update: &ControllerConfigUpdate) {
        self.config.merge(update);
        debug_assert!(
            self.config.validate().is_ok(),
            "invalid controller config: {:?}",
            self.config.validate(),
        );

        let c = &self.config;
        self.altitude.set_gains(c.altitude);
        self.roll.set_gains(c.roll);
        self.pitch.set_gains(c.pitch);
        self.yaw.set_gains(c.yaw);
        self.position_x.set_gains(c.position_x_outer, c.position_x_inner);
        self.position_y.set_gains(c.position_y_outer, c.position_y_inner);

        self.altitude.set_limits(-c.max_climb_output, c.max_climb_output);
        for axis in [&mut self.roll, &mut self.pitch, &mut self.yaw] {
            axis.set_limits(-c.max_attitude_output, c.max_attitude_output);
        }
        self.position_x.set_limits(c.max_velocity, c.max_tilt);
        self.position_y.set_limits(c.max_velocity, c.max_tilt);
    }

    pub fn reset(&mut self) {
        self.altitude.reset();
        self.roll.reset();
        self.pitch.reset();
        self.yaw.reset();
        self.position_x.reset();
        self.position_y.reset();
        self.active = ActiveLoops::default();
    }

    /// Loops idle on the previous step carry an old last error; drop it so
    /// their first update back has no derivative kick.
    fn resync_newly_active(&mut self, now: ActiveLoops) {
        let was = self.active;
        if now.altitude && !was.altitude {
            self.altitude.resync();
        }
        if now.attitude && !was.attitude {
            self.roll.resync();
            self.pitch.resync();
        }
        if now.yaw && !was.yaw {
            self.yaw.resync();
        }
        if now.position && !was.position {
            self.position_x.resync();
            self.position_y.resync();
        }
        self.active = now;
    }

    /// Run the loops the flight mode needs and mix the result.
    pub fn compute(
        &mut self,
        mode: FlightMode,
        state: &KinematicState,
        setpoints: &Setpoints,
        manual: &ManualInputs,
        dt: f64,
    ) -> ControlStep {
        let mut loops = LoopOutputs::default();
        let mut outputs = AxisValues::default();
        let mut errors = AxisValues::default();

        let run_altitude = matches!(
            mode,
            FlightMode::AltitudeHold | FlightMode::PositionHold | FlightMode::Waypoint
        );
        let run_attitude = matches!(
            mode,
            FlightMode::Stabilized | FlightMode::PositionHold | FlightMode::Waypoint
        );
        let run_yaw = mode != FlightMode::Manual;
        self.resync_newly_active(ActiveLoops {
            altitude: run_altitude,
            attitude: run_attitude,
            yaw: run_yaw,
            position: mode.holds_position(),
        });

        if run_altitude {
            loops.altitude = self.altitude.update(setpoints.position.z, state.pos.z, dt);
            outputs.altitude = loops.altitude;
            errors.altitude = self.altitude.error();
        }

        let mut attitude_target = setpoints.attitude;
        if mode.holds_position() {
            let ux = self.position_x.update(setpoints.position.x, state.pos.x, state.vel.x, dt);
            let uy = self.position_y.update(setpoints.position.y, state.pos.y, state.vel.y, dt);
            outputs.position_x = ux;
            outputs.position_y = uy;
            errors.position_x = self.position_x.position_error();
            errors.position_y = self.position_y.position_error();

            // World-frame tilt demand into the heading frame. Positive pitch
            // accelerates along body +X, positive roll along body -Y.
            let (sin_yaw, cos_yaw) = state.yaw().sin_cos();
            let forward = cos_yaw * ux + sin_yaw * uy;
            let left = -sin_yaw * ux + cos_yaw * uy;
            let max_tilt = self.config.max_tilt;
            attitude_target.y = forward.clamp(-max_tilt, max_tilt);
            attitude_target.x = (-left).clamp(-max_tilt, max_tilt);
        }

        if run_attitude {
            loops.roll = self.roll.update(attitude_target.x, state.roll(), dt);
            loops.pitch = self.pitch.update(attitude_target.y, state.pitch(), dt);
            outputs.roll = loops.roll;
            outputs.pitch = loops.pitch;
            errors.roll = self.roll.error();
            errors.pitch = self.pitch.error();
        }

        if run_yaw {
            // Shortest way round: feed the loop a setpoint within pi of the measurement.
            let yaw = state.yaw();
            let yaw_target = yaw + wrap_angle(attitude_target.z - yaw);
            loops.yaw = self.yaw.update(yaw_target, yaw, dt);
            outputs.yaw = loops.yaw;
            errors.yaw = self.yaw.error();
        }

        let inputs = axis_inputs(mode, &loops, manual, self.config.hover_throttle);
        ControlStep {
            motors: mix(&inputs),
            inputs,
            outputs,
            errors,
        }
    }

    /// Collective-only command at the hover baseline, used when control is bypassed.
    pub fn idle_command(&self) -> MotorCommand {
        MotorCommand::uniform(self.config.hover_throttle)
    }
}

impl Default for FlightController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::model::RigidBodyModel;
    use crate::vehicle::presets;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn hovering_at(z: f64) -> KinematicState {
        let mut s = KinematicState::default();
        s.pos.z = z;
        s
    }

    #[test]
    fn below_setpoint_adds_thrust() {
        let mut fc = FlightController::default();
        let sp = Setpoints { position: Vector3::new(0.0, 0.0, 2.0), ..Default::default() };
        let step = fc.compute(
            FlightMode::PositionHold,
            &hovering_at(1.0),
            &sp,
            &ManualInputs::default(),
            0.01,
        );
        assert!(step.inputs.thrust > NOMINAL_HOVER_THROTTLE);
        assert_relative_eq!(step.errors.altitude, 1.0);
        let [m1, m2, m3, m4] = step.motors.motors();
        assert_relative_eq!(m1, m2);
        assert_relative_eq!(m3, m4);
        assert_relative_eq!(m1, m4);
    }

    #[test]
    fn forward_target_commands_positive_pitch() {
        let mut fc = FlightController::default();
        let sp = Setpoints { position: Vector3::new(3.0, 0.0, 1.0), ..Default::default() };
        fc.compute(
            FlightMode::PositionHold,
            &hovering_at(1.0),
            &sp,
            &ManualInputs::default(),
            0.01,
        );
        let step = fc.compute(
            FlightMode::PositionHold,
            &hovering_at(1.0),
            &sp,
            &ManualInputs::default(),
            0.01,
        );
        assert!(step.outputs.position_x > 0.0);
        assert!(step.outputs.pitch > 0.0);
        assert_relative_eq!(step.outputs.roll, 0.0);
    }

    #[test]
    fn left_target_commands_negative_roll() {
        let mut fc = FlightController::default();
        let sp = Setpoints { position: Vector3::new(0.0, 3.0, 1.0), ..Default::default() };
        fc.compute(
            FlightMode::PositionHold,
            &hovering_at(1.0),
            &sp,
            &ManualInputs::default(),
            0.01,
        );
        let step = fc.compute(
            FlightMode::PositionHold,
            &hovering_at(1.0),
            &sp,
            &ManualInputs::default(),
            0.01,
        );
        assert!(step.outputs.position_y > 0.0);
        assert!(step.outputs.roll < 0.0);
    }

    #[test]
    fn yaw_error_takes_short_way_round() {
        let mut fc = FlightController::default();
        let mut s = hovering_at(1.0);
        s.attitude.z = PI - 0.1;
        let sp = Setpoints { attitude: Vector3::new(0.0, 0.0, -PI + 0.1), ..Default::default() };
        let step = fc.compute(FlightMode::Stabilized, &s, &sp, &ManualInputs::default(), 0.01);
        assert_relative_eq!(step.errors.yaw, 0.2, epsilon = 1e-9);
        assert!(step.outputs.yaw > 0.0);
    }

    #[test]
    fn manual_mode_runs_no_loops() {
        let mut fc = FlightController::default();
        let sp = Setpoints { position: Vector3::new(5.0, 5.0, 5.0), ..Default::default() };
        let manual = ManualInputs { throttle: 0.3, ..Default::default() };
        let step = fc.compute(FlightMode::Manual, &hovering_at(0.0), &sp, &manual, 0.01);
        assert_eq!(step.outputs, AxisValues::default());
        assert_eq!(step.motors, MotorCommand::uniform(0.3));
    }

    #[test]
    fn reentering_a_mode_has_no_derivative_kick() {
        let mut fc = FlightController::default();
        let level = Setpoints::default();
        let manual = ManualInputs::default();
        let mut tilted = hovering_at(5.0);
        tilted.attitude.x = 0.3;
        for _ in 0..5 {
            fc.compute(FlightMode::Stabilized, &tilted, &level, &manual, 0.01);
        }
        for _ in 0..5 {
            fc.compute(FlightMode::Manual, &hovering_at(5.0), &level, &manual, 0.01);
        }

        let step = fc.compute(FlightMode::Stabilized, &hovering_at(5.0), &level, &manual, 0.01);
        assert_eq!(fc.roll.derivative(), 0.0);
        assert!(step.outputs.roll.abs() < 0.01, "roll output {}", step.outputs.roll);
        assert!(fc.roll.integral() < 0.0);
    }

    #[test]
    fn apply_config_swaps_gains_and_keeps_integrators() {
        let mut fc = FlightController::default();
        let sp = Setpoints { position: Vector3::new(0.0, 0.0, 1.2), ..Default::default() };
        for _ in 0..10 {
            fc.compute(
                FlightMode::AltitudeHold,
                &hovering_at(1.0),
                &sp,
                &ManualInputs::default(),
                0.01,
            );
        }
        let integral = fc.altitude.integral();
        assert!(integral > 0.0);

        fc.apply_config(&ControllerConfigUpdate {
            altitude: Some(PidGains::new(0.9, 0.2, 0.1)),
            max_climb_output: Some(0.2),
            ..Default::default()
        });
        assert_eq!(fc.config().altitude, PidGains::new(0.9, 0.2, 0.1));
        assert_eq!(fc.config().roll, ControllerConfig::default().roll);
        assert_relative_eq!(fc.altitude.integral(), integral);
        assert_eq!(fc.altitude.limits(), (-0.2, 0.2));
    }

    #[test]
    fn disabling_an_axis_zeroes_its_output() {
        let mut fc = FlightController::default();
        fc.apply_config(&ControllerConfigUpdate {
            altitude: Some(PidGains::disabled()),
            ..Default::default()
        });
        let sp = Setpoints { position: Vector3::new(0.0, 0.0, 4.0), ..Default::default() };
        let step = fc.compute(
            FlightMode::PositionHold,
            &hovering_at(1.0),
            &sp,
            &ManualInputs::default(),
            0.01,
        );
        assert_eq!(step.outputs.altitude, 0.0);
        assert_relative_eq!(step.inputs.thrust, NOMINAL_HOVER_THROTTLE);
    }

    #[test]
    fn stabilized_levels_a_tilted_vehicle() {
        let params = presets::trainer();
        let mut model = RigidBodyModel::new(params.clone());
        let mut s = hovering_at(20.0);
        s.attitude = Vector3::new(0.3, -0.2, 0.0);
        model.set_state(s);

        let mut fc = FlightController::default();
        let manual = ManualInputs { throttle: params.hover_throttle(), ..Default::default() };
        for _ in 0..500 {
            let step = fc.compute(
                FlightMode::Stabilized,
                &model.state(),
                &Setpoints::default(),
                &manual,
                0.01,
            );
            model.update(&step.motors, 0.01);
        }
        let att = model.state().attitude;
        assert!(att.x.abs() < 0.01, "roll {}", att.x);
        assert!(att.y.abs() < 0.01, "pitch {}", att.y);
    }

    #[test]
    fn position_hold_flies_to_target() {
        let mut model = RigidBodyModel::new(presets::trainer());
        let mut fc = FlightController::default();
        let sp = Setpoints { position: Vector3::new(2.0, -1.5, 3.0), ..Default::default() };
        for _ in 0..3000 {
            let step = fc.compute(
                FlightMode::PositionHold,
                &model.state(),
                &sp,
                &ManualInputs::default(),
                0.01,
            );
            model.update(&step.motors, 0.01);
        }
        let err = model.state().pos - sp.position;
        assert!(err.norm() < 0.1, "position error {:?}", err);
    }
}
