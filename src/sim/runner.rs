use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::dynamics::model::RigidBodyModel;
use crate::dynamics::state::KinematicState;
use crate::error::{Result, SimError};
use crate::gnc::{
    ControlStep, ControllerConfig, ControllerConfigUpdate, FlightController, FlightMode,
    ManualInputs, ManualInputsUpdate, Setpoints, SetpointsUpdate,
};
use crate::mission::waypoint::{Waypoint, WaypointProgress, WaypointSequencer};

use super::config::{ConfigPatch, SimulationConfig, SimulationConfigUpdate, TickPolicy};
use super::event::{SimEvent, SimObserver};
use super::telemetry::{TelemetryHistory, TelemetrySample};

// ---------------------------------------------------------------------------
// Simulator: owns the vehicle, the controllers and the telemetry
// ---------------------------------------------------------------------------

/// Fixed-timestep quadrotor simulation. Single writer of all simulation
/// state; getters hand out copies.
pub struct Simulator {
    config: SimulationConfig,
    model: RigidBodyModel,
    controller: FlightController,
    setpoints: Setpoints,
    mode: FlightMode,
    manual: ManualInputs,
    waypoints: WaypointSequencer,
    telemetry: TelemetryHistory,
    time: f64,
    steps: u64,
    running: bool,
    last_step_at: Option<Instant>,
    observers: Vec<Box<dyn SimObserver>>,
    on_update: Option<Box<dyn FnMut(&TelemetrySample)>>,
    on_reset: Option<Box<dyn FnMut()>>,
}

impl Simulator {
    pub fn new(config: SimulationConfig, controller: ControllerConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "invalid config: {:?}", config.validate());
        Self {
            model: RigidBodyModel::new(config.vehicle.clone()),
            controller: FlightController::new(controller),
            setpoints: Setpoints::default(),
            mode: FlightMode::default(),
            manual: ManualInputs::default(),
            waypoints: WaypointSequencer::new(config.waypoint_tolerance),
            telemetry: TelemetryHistory::new(config.telemetry_capacity),
            time: 0.0,
            steps: 0,
            running: false,
            last_step_at: None,
            observers: Vec::new(),
            on_update: None,
            on_reset: None,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Begin scheduling. A no-op while already running.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        info!("simulation started at t={:.3}s", self.time);
        self.running = true;
        self.last_step_at = None;
    }

    /// Stop scheduling. No step runs from `tick` until `start` is called again.
    pub fn pause(&mut self) {
        if self.running {
            info!("simulation paused at t={:.3}s", self.time);
        }
        self.running = false;
        self.last_step_at = None;
    }

    /// Stop, zero the vehicle and clock, clear telemetry and every controller.
    pub fn reset(&mut self) {
        self.pause();
        self.model.reset();
        self.controller.reset();
        self.waypoints.restart();
        self.telemetry.clear();
        self.time = 0.0;
        self.steps = 0;
        info!("simulation reset");

        if let Some(cb) = self.on_reset.as_mut() {
            cb();
        }
        self.publish(&SimEvent::Reset);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Drive function for an external frame or timer callback.
    ///
    /// Runs a step once `timestep / real_time_multiplier` of wall time has
    /// passed since the previous one. Under [`TickPolicy::Single`] late ticks
    /// still run one step and the backlog is dropped. Returns the number of
    /// steps executed.
    pub fn tick(&mut self, now: Instant) -> u32 {
        if !self.running {
            return 0;
        }
        let Some(last) = self.last_step_at else {
            self.last_step_at = Some(now);
            return 0;
        };

        let interval = self.step_interval();
        let elapsed = now.saturating_duration_since(last);
        if elapsed < interval {
            return 0;
        }

        match self.config.tick_policy {
            TickPolicy::Single => {
                self.step();
                self.last_step_at = Some(now);
                1
            }
            TickPolicy::CatchUp { max_steps } => {
                let due = (elapsed.as_secs_f64() / interval.as_secs_f64()).floor() as u32;
                let n = due.clamp(1, max_steps.max(1));
                for _ in 0..n {
                    self.step();
                }
                self.last_step_at = Some(if due > n { now } else { last + interval * n });
                n
            }
        }
    }

    /// Wall time between steps. Saturates at `Duration::MAX` for very slow
    /// multipliers.
    pub fn step_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.config.timestep / self.config.real_time_multiplier)
            .unwrap_or(Duration::MAX)
    }

    /// Advance exactly one timestep: control, physics, waypoints, telemetry,
    /// notification.
    pub fn step(&mut self) {
        let dt = self.config.timestep;

        if self.mode == FlightMode::Waypoint {
            if let Some(wp) = self.waypoints.active() {
                self.setpoints.position = wp.position;
            }
        }

        let state = self.model.state();
        let control = if self.mode == FlightMode::Manual || self.config.enable_control {
            self.controller.compute(self.mode, &state, &self.setpoints, &self.manual, dt)
        } else {
            ControlStep {
                motors: self.controller.idle_command(),
                ..Default::default()
            }
        };

        if self.config.enable_physics {
            self.model.update(&control.motors, dt);
        }

        if self.mode == FlightMode::Waypoint {
            self.advance_waypoints();
        }

        self.time += dt;
        self.steps += 1;

        let sample = TelemetrySample {
            time: self.time,
            state: self.model.state(),
            motors: control.motors,
            outputs: control.outputs,
            errors: control.errors,
            setpoints: self.setpoints,
            mode: self.mode,
            manual: self.manual,
        };
        trace!(
            "step {} t={:.3} pos=({:.3}, {:.3}, {:.3})",
            self.steps,
            sample.time,
            sample.state.pos.x,
            sample.state.pos.y,
            sample.state.pos.z
        );
        self.telemetry.push(sample.clone());

        if let Some(cb) = self.on_update.as_mut() {
            cb(&sample);
        }
        self.publish(&SimEvent::StepCompleted(sample));
    }

    /// Run `n` steps back to back, ignoring wall time.
    pub fn run_steps(&mut self, n: usize) {
        for _ in 0..n {
            self.step();
        }
    }

    fn advance_waypoints(&mut self) {
        match self.waypoints.update(&self.model.state()) {
            WaypointProgress::Reached { index } => {
                if let Some(next) = self.waypoints.active() {
                    debug!("waypoint {} reached, heading to id {}", index, next.id);
                    self.setpoints.position = next.position;
                }
            }
            WaypointProgress::Completed => {
                info!("waypoint run complete, holding position");
                self.change_mode(FlightMode::PositionHold);
            }
            WaypointProgress::EnRoute { .. } | WaypointProgress::Idle => {}
        }
    }

    // -----------------------------------------------------------------------
    // Configuration (merge updates, applied between steps)
    // -----------------------------------------------------------------------

    pub fn set_config(&mut self, update: &SimulationConfigUpdate) {
        self.config.merge(update);
        debug_assert!(
            self.config.validate().is_ok(),
            "invalid config: {:?}",
            self.config.validate(),
        );
        self.model.set_params(self.config.vehicle.clone());
        self.telemetry.set_capacity(self.config.telemetry_capacity);
        self.waypoints.set_tolerance(self.config.waypoint_tolerance);
        debug!("simulation config updated: {:?}", update);
    }

    /// Gains replace the live ones; integrators keep their state.
    pub fn set_controller_config(&mut self, update: &ControllerConfigUpdate) {
        self.controller.apply_config(update);
        debug!("controller config updated: {:?}", update);
    }

    /// Validate a patch as a whole and apply it, or leave everything untouched.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) -> Result<()> {
        let mut sim = self.config.clone();
        if let Some(update) = &patch.simulation {
            sim.merge(update);
        }
        sim.validate().map_err(SimError::Config)?;

        let mut ctl = self.controller.config().clone();
        if let Some(update) = &patch.controller {
            ctl.merge(update);
        }
        ctl.validate().map_err(SimError::Config)?;

        if let Some(update) = &patch.simulation {
            self.set_config(update);
        }
        if let Some(update) = &patch.controller {
            self.set_controller_config(update);
        }
        Ok(())
    }

    pub fn set_setpoints(&mut self, update: &SetpointsUpdate) {
        self.setpoints.merge(update);
    }

    pub fn set_manual_inputs(&mut self, update: &ManualInputsUpdate) {
        self.manual.merge(update);
    }

    pub fn set_flight_mode(&mut self, mode: FlightMode) {
        if mode == FlightMode::Waypoint && self.waypoints.is_complete() {
            self.waypoints.restart();
        }
        self.change_mode(mode);
    }

    fn change_mode(&mut self, mode: FlightMode) {
        if mode == self.mode {
            return;
        }
        let from = self.mode;
        self.mode = mode;
        info!("flight mode {} -> {}", from, mode);
        self.publish(&SimEvent::ModeChanged { from, to: mode });
    }

    // -----------------------------------------------------------------------
    // Waypoints
    // -----------------------------------------------------------------------

    pub fn add_waypoint(&mut self, waypoint: Waypoint) {
        self.waypoints.add(waypoint);
    }

    pub fn remove_waypoint(&mut self, id: u32) -> Option<Waypoint> {
        self.waypoints.remove(id)
    }

    pub fn clear_waypoints(&mut self) {
        self.waypoints.clear();
    }

    pub fn set_waypoints(&mut self, waypoints: Vec<Waypoint>) {
        self.waypoints.set(waypoints);
    }

    pub fn waypoints(&self) -> Vec<Waypoint> {
        self.waypoints.waypoints().to_vec()
    }

    pub fn current_waypoint_index(&self) -> Option<usize> {
        self.waypoints.current_index()
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn drone_state(&self) -> KinematicState {
        self.model.state()
    }

    /// Oldest to newest, bounded by the telemetry capacity.
    pub fn data_history(&self) -> Vec<TelemetrySample> {
        self.telemetry.to_vec()
    }

    pub fn current_data(&self) -> Option<TelemetrySample> {
        self.telemetry.latest().cloned()
    }

    pub fn telemetry(&self) -> &TelemetryHistory {
        &self.telemetry
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub fn flight_mode(&self) -> FlightMode {
        self.mode
    }

    pub fn setpoints(&self) -> Setpoints {
        self.setpoints
    }

    pub fn manual_inputs(&self) -> ManualInputs {
        self.manual
    }

    pub fn config(&self) -> SimulationConfig {
        self.config.clone()
    }

    pub fn controller_config(&self) -> ControllerConfig {
        self.controller.config().clone()
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    /// Called once per executed step with the sample it appended.
    pub fn set_update_callback(&mut self, callback: impl FnMut(&TelemetrySample) + 'static) {
        self.on_update = Some(Box::new(callback));
    }

    /// Called once per `reset`.
    pub fn set_reset_callback(&mut self, callback: impl FnMut() + 'static) {
        self.on_reset = Some(Box::new(callback));
    }

    pub fn add_observer(&mut self, observer: Box<dyn SimObserver>) {
        self.observers.push(observer);
    }

    fn publish(&mut self, event: &SimEvent) {
        for obs in self.observers.iter_mut() {
            obs.notify(event);
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimulationConfig::default(), ControllerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::state::MotorCommand;
    use crate::gnc::PidGains;
    use crate::vehicle::NOMINAL_HOVER_THROTTLE;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::cell::RefCell;
    use std::f64::consts::PI;
    use std::rc::Rc;
    use std::sync::mpsc;

    #[test]
    fn position_hold_converges_to_altitude() {
        let mut sim = Simulator::default();
        sim.set_flight_mode(FlightMode::PositionHold);
        sim.set_setpoints(&SetpointsUpdate::altitude(2.0));
        sim.run_steps(2000);
        let z = sim.drone_state().pos.z;
        assert!((z - 2.0).abs() < 0.05, "altitude error {:.4} m after 20 s", z - 2.0);
        assert_relative_eq!(sim.time(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut sim = Simulator::default();
        sim.set_setpoints(&SetpointsUpdate::altitude(1.0));
        sim.run_steps(150);
        assert!(sim.drone_state().pos.z > 0.0);

        sim.reset();
        let once = (sim.drone_state(), sim.data_history().len(), sim.time());
        sim.reset();
        let twice = (sim.drone_state(), sim.data_history().len(), sim.time());
        assert_eq!(once, twice);
        assert_eq!(once.0, KinematicState::default());
        assert_eq!(once.1, 0);
        assert!(sim.current_data().is_none());
    }

    #[test]
    fn single_waypoint_hands_over_to_position_hold() {
        let mut sim = Simulator::default();
        let (tx, rx) = mpsc::channel();
        sim.add_observer(Box::new(tx));
        sim.set_waypoints(vec![Waypoint::new(1, 0.0, 0.0, 2.0)]);
        sim.set_flight_mode(FlightMode::Waypoint);

        for _ in 0..2000 {
            sim.step();
            if sim.flight_mode() == FlightMode::PositionHold {
                break;
            }
        }
        assert_eq!(sim.flight_mode(), FlightMode::PositionHold);
        assert_eq!(sim.current_waypoint_index(), Some(1));
        assert_relative_eq!(sim.setpoints().position, Vector3::new(0.0, 0.0, 2.0));
        let state = sim.drone_state();
        assert!(state.distance_to(&Vector3::new(0.0, 0.0, 2.0)) <= sim.config().waypoint_tolerance);

        let changes: Vec<SimEvent> = rx
            .try_iter()
            .filter(|e| matches!(e, SimEvent::ModeChanged { .. }))
            .collect();
        assert_eq!(
            changes,
            vec![
                SimEvent::ModeChanged { from: FlightMode::PositionHold, to: FlightMode::Waypoint },
                SimEvent::ModeChanged { from: FlightMode::Waypoint, to: FlightMode::PositionHold },
            ]
        );
    }

    #[test]
    fn waypoint_run_visits_each_target() {
        let mut sim = Simulator::default();
        sim.set_waypoints(vec![
            Waypoint::new(1, 0.0, 0.0, 1.5),
            Waypoint::new(2, 1.5, 0.0, 1.5),
            Waypoint::new(3, 1.5, 1.5, 2.0),
        ]);
        sim.set_flight_mode(FlightMode::Waypoint);
        let mut seen = Vec::new();
        for _ in 0..6000 {
            sim.step();
            if let Some(i) = sim.current_waypoint_index() {
                if seen.last() != Some(&i) {
                    seen.push(i);
                }
            }
            if sim.flight_mode() == FlightMode::PositionHold {
                break;
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(sim.flight_mode(), FlightMode::PositionHold);
    }

    #[test]
    fn time_is_monotonic_and_history_bounded() {
        let mut sim = Simulator::default();
        sim.set_config(&SimulationConfigUpdate {
            telemetry_capacity: Some(50),
            ..Default::default()
        });
        assert_eq!(sim.telemetry().capacity(), 50);
        sim.run_steps(120);
        let history = sim.data_history();
        assert_eq!(history.len(), 50);
        assert!(history.windows(2).all(|w| w[1].time > w[0].time));
        assert_relative_eq!(history.last().unwrap().time, 1.2, epsilon = 1e-9);
        assert_eq!(sim.current_data().unwrap(), *history.last().unwrap());
    }

    #[test]
    fn callbacks_fire_once_per_step_and_reset() {
        let mut sim = Simulator::default();
        let steps = Rc::new(RefCell::new(Vec::new()));
        let resets = Rc::new(RefCell::new(0));
        {
            let steps = steps.clone();
            sim.set_update_callback(move |s| steps.borrow_mut().push(s.time));
        }
        {
            let resets = resets.clone();
            sim.set_reset_callback(move || *resets.borrow_mut() += 1);
        }
        sim.run_steps(7);
        assert_eq!(steps.borrow().len(), 7);
        sim.reset();
        sim.reset();
        assert_eq!(*resets.borrow(), 2);
        assert_eq!(steps.borrow().len(), 7);
    }

    #[test]
    fn tick_is_gated_by_running_and_wall_time() {
        let mut sim = Simulator::default();
        let t0 = Instant::now();
        assert!(!sim.is_running());
        assert_eq!(sim.tick(t0), 0);

        sim.start();
        assert!(sim.is_running());
        assert_eq!(sim.tick(t0), 0); // anchors the clock
        assert_eq!(sim.tick(t0 + Duration::from_millis(5)), 0);
        assert_eq!(sim.tick(t0 + Duration::from_millis(10)), 1);
        // A long stall still yields a single step.
        assert_eq!(sim.tick(t0 + Duration::from_millis(500)), 1);
        assert_eq!(sim.step_count(), 2);
        assert_relative_eq!(sim.time(), 0.02, epsilon = 1e-12);

        sim.pause();
        assert!(!sim.is_running());
        assert_eq!(sim.tick(t0 + Duration::from_secs(2)), 0);
        assert_eq!(sim.step_count(), 2);
    }

    #[test]
    fn repeated_start_keeps_the_clock_anchor() {
        let mut sim = Simulator::default();
        let t0 = Instant::now();
        sim.start();
        sim.tick(t0);
        sim.start();
        assert_eq!(sim.tick(t0 + Duration::from_millis(10)), 1);
        sim.start();
        assert_eq!(sim.tick(t0 + Duration::from_millis(20)), 1);
    }

    #[test]
    fn tiny_multiplier_saturates_interval_instead_of_panicking() {
        let mut sim = Simulator::default();
        let patch = ConfigPatch {
            simulation: Some(SimulationConfigUpdate {
                real_time_multiplier: Some(1e-30),
                ..Default::default()
            }),
            controller: None,
        };
        sim.apply_patch(&patch).unwrap();
        assert_eq!(sim.step_interval(), Duration::MAX);

        let t0 = Instant::now();
        sim.start();
        assert_eq!(sim.tick(t0), 0);
        assert_eq!(sim.tick(t0 + Duration::from_secs(3600)), 0);
        assert_eq!(sim.step_count(), 0);
    }

    #[test]
    fn real_time_multiplier_shortens_interval() {
        let mut sim = Simulator::default();
        sim.set_config(&SimulationConfigUpdate {
            real_time_multiplier: Some(10.0),
            ..Default::default()
        });
        assert_relative_eq!(sim.step_interval().as_secs_f64(), 0.001, epsilon = 1e-9);
        let t0 = Instant::now();
        sim.start();
        sim.tick(t0);
        assert_eq!(sim.tick(t0 + Duration::from_micros(500)), 0);
        assert_eq!(sim.tick(t0 + Duration::from_millis(2)), 1);
    }

    #[test]
    fn catch_up_policy_runs_bounded_bursts() {
        let mut sim = Simulator::default();
        sim.set_config(&SimulationConfigUpdate {
            tick_policy: Some(TickPolicy::CatchUp { max_steps: 3 }),
            ..Default::default()
        });
        let t0 = Instant::now();
        sim.start();
        sim.tick(t0);
        assert_eq!(sim.tick(t0 + Duration::from_millis(20)), 2);
        assert_eq!(sim.tick(t0 + Duration::from_millis(200)), 3);
        assert_eq!(sim.step_count(), 5);
    }

    #[test]
    fn physics_bypass_freezes_vehicle() {
        let mut sim = Simulator::default();
        sim.set_config(&SimulationConfigUpdate {
            enable_physics: Some(false),
            ..Default::default()
        });
        sim.set_setpoints(&SetpointsUpdate::altitude(3.0));
        sim.run_steps(100);
        assert_eq!(sim.drone_state(), KinematicState::default());
        assert_relative_eq!(sim.time(), 1.0, epsilon = 1e-9);
        // Controller still runs and asks for climb.
        assert!(sim.current_data().unwrap().outputs.altitude > 0.0);
    }

    #[test]
    fn control_bypass_uses_idle_command() {
        let mut sim = Simulator::default();
        sim.set_config(&SimulationConfigUpdate {
            enable_control: Some(false),
            ..Default::default()
        });
        sim.set_setpoints(&SetpointsUpdate::altitude(3.0));
        sim.run_steps(10);
        let sample = sim.current_data().unwrap();
        assert_eq!(sample.motors, MotorCommand::uniform(NOMINAL_HOVER_THROTTLE));
        assert_relative_eq!(sample.state.pos.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn manual_mode_flies_the_sticks() {
        let mut sim = Simulator::default();
        sim.set_flight_mode(FlightMode::Manual);
        sim.set_manual_inputs(&ManualInputsUpdate { throttle: Some(0.9), ..Default::default() });
        sim.run_steps(100);
        let sample = sim.current_data().unwrap();
        assert_eq!(sample.motors, MotorCommand::uniform(0.9));
        assert!(sample.state.pos.z > 0.5);
        assert_eq!(sample.manual.throttle, 0.9);
    }

    #[test]
    fn controller_config_reaches_live_loops() {
        let mut sim = Simulator::default();
        sim.set_setpoints(&SetpointsUpdate::altitude(1.0));
        sim.set_controller_config(&ControllerConfigUpdate {
            altitude: Some(PidGains::disabled()),
            ..Default::default()
        });
        sim.run_steps(50);
        let sample = sim.current_data().unwrap();
        assert_eq!(sample.outputs.altitude, 0.0);
        assert_eq!(sim.controller_config().altitude, PidGains::disabled());
        assert_eq!(sim.controller_config().roll, ControllerConfig::default().roll);
    }

    #[test]
    fn apply_patch_is_all_or_nothing() {
        let mut sim = Simulator::default();
        let bad = ConfigPatch {
            simulation: Some(SimulationConfigUpdate {
                real_time_multiplier: Some(2.0),
                ..Default::default()
            }),
            controller: Some(ControllerConfigUpdate {
                hover_throttle: Some(1.5),
                ..Default::default()
            }),
        };
        assert!(matches!(sim.apply_patch(&bad), Err(SimError::Config(_))));
        assert_eq!(sim.config().real_time_multiplier, 1.0);

        let good = ConfigPatch {
            simulation: Some(SimulationConfigUpdate {
                real_time_multiplier: Some(2.0),
                ..Default::default()
            }),
            controller: None,
        };
        sim.apply_patch(&good).unwrap();
        assert_eq!(sim.config().real_time_multiplier, 2.0);
    }

    #[test]
    fn yaw_setpoint_is_tracked() {
        let mut sim = Simulator::default();
        sim.set_setpoints(&SetpointsUpdate {
            z: Some(2.0),
            yaw: Some(PI / 2.0),
            ..Default::default()
        });
        sim.run_steps(1500);
        let s = sim.drone_state();
        assert!((s.yaw() - PI / 2.0).abs() < 0.05, "yaw {}", s.yaw());
        assert!(s.pos.xy().norm() < 0.1);
    }

    #[test]
    fn observers_see_steps_and_resets() {
        let mut sim = Simulator::default();
        let (tx, rx) = mpsc::channel();
        sim.add_observer(Box::new(tx));
        sim.run_steps(3);
        sim.reset();
        let names: Vec<&str> = rx.try_iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["step_completed", "step_completed", "step_completed", "reset"]);
    }
}
