//! Flight modes and the X-configuration motor mixer.
//!
//! Each mode decides where the thrust, roll, pitch and yaw inputs come from
//! (sticks, PID loops, or a blend). The mixer then spreads those four inputs
//! over the rotors. Both steps are pure functions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dynamics::state::MotorCommand;

/// Stick authority when the pilot flies the motors directly.
pub const MANUAL_AUTHORITY: f64 = 0.25;
/// Stick authority layered on top of an auto-stabilized axis.
pub const ASSIST_AUTHORITY: f64 = 0.1;

// ---------------------------------------------------------------------------
// Flight mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightMode {
    Manual,
    Stabilized,
    AltitudeHold,
    #[default]
    PositionHold,
    Waypoint,
}

impl FlightMode {
    pub const ALL: [FlightMode; 5] = [
        FlightMode::Manual,
        FlightMode::Stabilized,
        FlightMode::AltitudeHold,
        FlightMode::PositionHold,
        FlightMode::Waypoint,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FlightMode::Manual => "manual",
            FlightMode::Stabilized => "stabilized",
            FlightMode::AltitudeHold => "altitude_hold",
            FlightMode::PositionHold => "position_hold",
            FlightMode::Waypoint => "waypoint",
        }
    }

    /// Whether the horizontal position cascades drive roll and pitch.
    pub fn holds_position(&self) -> bool {
        matches!(self, FlightMode::PositionHold | FlightMode::Waypoint)
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Pilot stick inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualInputs {
    pub pitch: f64,    // [-1, 1]
    pub roll: f64,     // [-1, 1]
    pub yaw: f64,      // [-1, 1]
    pub throttle: f64, // [0, 1]
}

impl ManualInputs {
    /// Merge the given fields, clamping each into its stick range.
    pub fn merge(&mut self, update: &ManualInputsUpdate) {
        if let Some(v) = update.pitch {
            self.pitch = v.clamp(-1.0, 1.0);
        }
        if let Some(v) = update.roll {
            self.roll = v.clamp(-1.0, 1.0);
        }
        if let Some(v) = update.yaw {
            self.yaw = v.clamp(-1.0, 1.0);
        }
        if let Some(v) = update.throttle {
            self.throttle = v.clamp(0.0, 1.0);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualInputsUpdate {
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
    pub throttle: Option<f64>,
}

// ---------------------------------------------------------------------------
// Mixing
// ---------------------------------------------------------------------------

/// PID contributions available to the mixer for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopOutputs {
    pub altitude: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Collective thrust plus the three differential inputs fed to the rotors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisInputs {
    pub thrust: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Select each axis input according to the flight mode.
pub fn axis_inputs(
    mode: FlightMode,
    loops: &LoopOutputs,
    manual: &ManualInputs,
    hover_throttle: f64,
) -> AxisInputs {
    match mode {
        FlightMode::Manual => AxisInputs {
            thrust: manual.throttle,
            roll: manual.roll * MANUAL_AUTHORITY,
            pitch: manual.pitch * MANUAL_AUTHORITY,
            yaw: manual.yaw * MANUAL_AUTHORITY,
        },
        FlightMode::Stabilized => AxisInputs {
            thrust: manual.throttle,
            roll: loops.roll + manual.roll * ASSIST_AUTHORITY,
            pitch: loops.pitch + manual.pitch * ASSIST_AUTHORITY,
            yaw: loops.yaw + manual.yaw * ASSIST_AUTHORITY,
        },
        FlightMode::AltitudeHold => AxisInputs {
            thrust: hover_throttle + loops.altitude,
            roll: manual.roll * MANUAL_AUTHORITY,
            pitch: manual.pitch * MANUAL_AUTHORITY,
            yaw: loops.yaw + manual.yaw * ASSIST_AUTHORITY,
        },
        FlightMode::PositionHold | FlightMode::Waypoint => AxisInputs {
            thrust: hover_throttle + loops.altitude,
            roll: loops.roll,
            pitch: loops.pitch,
            yaw: loops.yaw,
        },
    }
}

/// Spread axis inputs over the four rotors (front-left, front-right, rear-left, rear-right).
pub fn mix(inputs: &AxisInputs) -> MotorCommand {
    let AxisInputs { thrust: b, roll: r, pitch: p, yaw: y } = *inputs;
    MotorCommand::new(
        b + p + y - r,
        b + p - y + r,
        b - p + y - r,
        b - p - y + r,
    )
}
