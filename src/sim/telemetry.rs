use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::dynamics::state::{KinematicState, MotorCommand};
use crate::gnc::{AxisValues, FlightMode, ManualInputs, Setpoints};

// ---------------------------------------------------------------------------
// Telemetry sample
// ---------------------------------------------------------------------------

/// Everything recorded for one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub time: f64, // s, simulated
    pub state: KinematicState,
    pub motors: MotorCommand,
    pub outputs: AxisValues,
    pub errors: AxisValues,
    pub setpoints: Setpoints,
    pub mode: FlightMode,
    pub manual: ManualInputs,
}

// ---------------------------------------------------------------------------
// Bounded history (FIFO ring buffer)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TelemetryHistory {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl TelemetryHistory {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "telemetry capacity must be positive");
        Self {
            samples: VecDeque::with_capacity(capacity.min(16_384)),
            capacity,
        }
    }

    /// Append, evicting the oldest sample when full.
    pub fn push(&mut self, sample: TelemetrySample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Change the bound, dropping the oldest samples if it shrank.
    pub fn set_capacity(&mut self, capacity: usize) {
        debug_assert!(capacity > 0, "telemetry capacity must be positive");
        self.capacity = capacity;
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    /// Owned copy, oldest to newest.
    pub fn to_vec(&self) -> Vec<TelemetrySample> {
        self.samples.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
