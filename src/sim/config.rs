use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::gnc::ControllerConfigUpdate;
use crate::mission::waypoint::DEFAULT_WAYPOINT_TOLERANCE;
use crate::vehicle::{VehicleParameters, VehicleParametersUpdate};

/// Default telemetry ring-buffer size (samples).
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 10_000;

// ---------------------------------------------------------------------------
// Scheduling policy
// ---------------------------------------------------------------------------

/// How `tick` reacts when more than one timestep of wall time has elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// At most one step per tick; the surplus wall time is dropped.
    #[default]
    Single,
    /// Run up to `max_steps` steps per tick to keep pace with wall time.
    CatchUp { max_steps: u32 },
}

// ---------------------------------------------------------------------------
// Simulation config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub timestep: f64,             // s of simulated time per step
    pub real_time_multiplier: f64, // simulated seconds per wall second
    pub enable_physics: bool,
    pub enable_control: bool,
    pub waypoint_tolerance: f64,   // m
    pub telemetry_capacity: usize,
    pub tick_policy: TickPolicy,
    pub vehicle: VehicleParameters,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 0.01, // 100 Hz
            real_time_multiplier: 1.0,
            enable_physics: true,
            enable_control: true,
            waypoint_tolerance: DEFAULT_WAYPOINT_TOLERANCE,
            telemetry_capacity: DEFAULT_TELEMETRY_CAPACITY,
            tick_policy: TickPolicy::Single,
            vehicle: VehicleParameters::default(),
        }
    }
}

impl SimulationConfig {
    pub fn merge(&mut self, update: &SimulationConfigUpdate) {
        if let Some(v) = update.timestep {
            self.timestep = v;
        }
        if let Some(v) = update.real_time_multiplier {
            self.real_time_multiplier = v;
        }
        if let Some(v) = update.enable_physics {
            self.enable_physics = v;
        }
        if let Some(v) = update.enable_control {
            self.enable_control = v;
        }
        if let Some(v) = update.waypoint_tolerance {
            self.waypoint_tolerance = v;
        }
        if let Some(v) = update.telemetry_capacity {
            self.telemetry_capacity = v;
        }
        if let Some(v) = update.tick_policy {
            self.tick_policy = v;
        }
        if let Some(v) = &update.vehicle {
            self.vehicle.merge(v);
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(format!("timestep must be positive, got {}", self.timestep));
        }
        if !self.real_time_multiplier.is_finite() || self.real_time_multiplier <= 0.0 {
            return Err(format!(
                "real_time_multiplier must be positive, got {}",
                self.real_time_multiplier
            ));
        }
        if !self.waypoint_tolerance.is_finite() || self.waypoint_tolerance <= 0.0 {
            return Err(format!(
                "waypoint_tolerance must be positive, got {}",
                self.waypoint_tolerance
            ));
        }
        if self.telemetry_capacity == 0 {
            return Err("telemetry_capacity must be at least 1".into());
        }
        if self.tick_policy == (TickPolicy::CatchUp { max_steps: 0 }) {
            return Err("catch-up policy needs max_steps >= 1".into());
        }
        self.vehicle.validate()
    }
}

/// Partial update for [`SimulationConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfigUpdate {
    pub timestep: Option<f64>,
    pub real_time_multiplier: Option<f64>,
    pub enable_physics: Option<bool>,
    pub enable_control: Option<bool>,
    pub waypoint_tolerance: Option<f64>,
    pub telemetry_capacity: Option<usize>,
    pub tick_policy: Option<TickPolicy>,
    pub vehicle: Option<VehicleParametersUpdate>,
}

// ---------------------------------------------------------------------------
// Config patch (JSON)
// ---------------------------------------------------------------------------

/// Partial simulation and controller updates loaded together from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default)]
    pub simulation: Option<SimulationConfigUpdate>,
    #[serde(default)]
    pub controller: Option<ControllerConfigUpdate>,
}

/// Parse a config patch. Unknown top-level sections are rejected; the
/// merged result is validated when applied.
pub fn load_patch_json(text: &str) -> Result<ConfigPatch> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if let Some(obj) = value.as_object() {
        if let Some(key) = obj.keys().find(|k| *k != "simulation" && *k != "controller") {
            return Err(SimError::Config(format!("unknown section `{}`", key)));
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// Read and parse a config patch file.
pub fn load_patch_file(path: &str) -> Result<ConfigPatch> {
    let text = std::fs::read_to_string(path)?;
    load_patch_json(&text)
}
