use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use log::{debug, info};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::gnc::{FlightMode, SetpointsUpdate};
use crate::sim::runner::Simulator;
use crate::sim::telemetry::TelemetrySample;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

pub type CorrelationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionCommand {
    /// Climb (or descend) to `altitude` over the current ground position.
    Takeoff { altitude: f64 },
    /// Descend to the ground at the current ground position.
    Land,
    /// Fly to a world position.
    MoveTo { target: Vector3<f64> },
    /// Keep the current setpoints for `seconds` of simulated time.
    Hold { seconds: f64 },
    /// Latest telemetry sample; answered on the next poll.
    GetTelemetry,
}

impl MissionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            MissionCommand::Takeoff { .. } => "takeoff",
            MissionCommand::Land => "land",
            MissionCommand::MoveTo { .. } => "move_to",
            MissionCommand::Hold { .. } => "hold",
            MissionCommand::GetTelemetry => "get_telemetry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissionRequest {
    pub id: CorrelationId,
    pub command: MissionCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MissionReply {
    /// The motion command's goal was reached.
    Completed,
    /// `None` until the first step has run.
    Telemetry(Option<Box<TelemetrySample>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionResponse {
    pub id: CorrelationId,
    pub reply: MissionReply,
}

// ---------------------------------------------------------------------------
// Goal tolerances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissionConfig {
    pub altitude_tolerance: f64, // m, takeoff done when |z - target| is below
    pub position_tolerance: f64, // m, move done when distance is below
    pub landed_altitude: f64,    // m, land done when z is below
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            altitude_tolerance: 0.1,
            position_tolerance: 0.2,
            landed_altitude: 0.05,
        }
    }
}

/// Connected script/simulator endpoints with default tolerances.
pub fn mission_channel() -> (MissionLink, MissionDriver) {
    mission_channel_with(MissionConfig::default())
}

pub fn mission_channel_with(config: MissionConfig) -> (MissionLink, MissionDriver) {
    let (req_tx, req_rx) = mpsc::channel();
    let (resp_tx, resp_rx) = mpsc::channel();
    let link = MissionLink {
        requests: req_tx,
        responses: resp_rx,
        next_id: 1,
    };
    let driver = MissionDriver {
        requests: req_rx,
        responses: resp_tx,
        queue: VecDeque::new(),
        active: None,
        config,
    };
    (link, driver)
}

// ---------------------------------------------------------------------------
// Script side
// ---------------------------------------------------------------------------

/// Script endpoint. May live on another thread; it never touches the
/// simulator directly.
pub struct MissionLink {
    requests: Sender<MissionRequest>,
    responses: Receiver<MissionResponse>,
    next_id: CorrelationId,
}

impl MissionLink {
    /// Queue a command. Returns the id its response will carry.
    pub fn send(&mut self, command: MissionCommand) -> Result<CorrelationId> {
        let id = self.next_id;
        self.requests
            .send(MissionRequest { id, command })
            .map_err(|_| SimError::Disconnected)?;
        self.next_id += 1;
        Ok(id)
    }

    pub fn try_recv(&self) -> Result<Option<MissionResponse>> {
        match self.responses.try_recv() {
            Ok(resp) => Ok(Some(resp)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SimError::Disconnected),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<MissionResponse>> {
        match self.responses.recv_timeout(timeout) {
            Ok(resp) => Ok(Some(resp)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SimError::Disconnected),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Goal {
    Altitude(f64),
    Position(Vector3<f64>),
    Landed,
    Until(f64), // simulated time
}

#[derive(Debug, Clone, Copy)]
struct ActiveGoal {
    id: CorrelationId,
    goal: Goal,
}

/// Simulator endpoint, polled from the thread that owns the [`Simulator`].
/// Motion commands run one at a time in arrival order.
pub struct MissionDriver {
    requests: Receiver<MissionRequest>,
    responses: Sender<MissionResponse>,
    queue: VecDeque<MissionRequest>,
    active: Option<ActiveGoal>,
    config: MissionConfig,
}

impl MissionDriver {
    /// Take new requests, answer telemetry reads, and advance the motion
    /// queue. Fails only when the script endpoint has been dropped.
    pub fn poll(&mut self, sim: &mut Simulator) -> Result<()> {
        for req in self.requests.try_iter() {
            match req.command {
                MissionCommand::GetTelemetry => {
                    let sample = sim.current_data().map(Box::new);
                    let reply = MissionReply::Telemetry(sample);
                    self.responses
                        .send(MissionResponse { id: req.id, reply })
                        .map_err(|_| SimError::Disconnected)?;
                }
                _ => self.queue.push_back(req),
            }
        }

        loop {
            let active = match self.active {
                Some(active) => active,
                None => match self.queue.pop_front() {
                    Some(req) => {
                        let active = self.begin(sim, req);
                        self.active = Some(active);
                        active
                    }
                    None => return Ok(()),
                },
            };

            if !self.reached(sim, active.goal) {
                return Ok(());
            }
            debug!("mission command {} complete at t={:.2}s", active.id, sim.time());
            self.active = None;
            self.responses
                .send(MissionResponse { id: active.id, reply: MissionReply::Completed })
                .map_err(|_| SimError::Disconnected)?;
        }
    }

    /// No command running or queued.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.queue.is_empty()
    }

    /// Motion commands waiting behind the active one.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    fn begin(&self, sim: &mut Simulator, req: MissionRequest) -> ActiveGoal {
        info!("mission command {}: {}", req.id, req.command.name());
        let pos = sim.drone_state().pos;
        let goal = match req.command {
            MissionCommand::Takeoff { altitude } => {
                sim.set_flight_mode(FlightMode::PositionHold);
                sim.set_setpoints(&SetpointsUpdate::position(Vector3::new(pos.x, pos.y, altitude)));
                Goal::Altitude(altitude)
            }
            MissionCommand::Land => {
                sim.set_flight_mode(FlightMode::PositionHold);
                sim.set_setpoints(&SetpointsUpdate::position(Vector3::new(pos.x, pos.y, 0.0)));
                Goal::Landed
            }
            MissionCommand::MoveTo { target } => {
                sim.set_flight_mode(FlightMode::PositionHold);
                sim.set_setpoints(&SetpointsUpdate::position(target));
                Goal::Position(target)
            }
            MissionCommand::Hold { seconds } => Goal::Until(sim.time() + seconds.max(0.0)),
            // Answered on receipt, never queued.
            MissionCommand::GetTelemetry => Goal::Until(sim.time()),
        };
        ActiveGoal { id: req.id, goal }
    }

    fn reached(&self, sim: &Simulator, goal: Goal) -> bool {
        let state = sim.drone_state();
        match goal {
            Goal::Altitude(z) => (state.pos.z - z).abs() <= self.config.altitude_tolerance,
            Goal::Position(target) => state.distance_to(&target) <= self.config.position_tolerance,
            Goal::Landed => state.pos.z <= self.config.landed_altitude,
            Goal::Until(t) => sim.time() >= t,
        }
    }
}
