use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::dynamics::state::KinematicState;

/// Default arrival radius around a waypoint (m).
pub const DEFAULT_WAYPOINT_TOLERANCE: f64 = 0.2;

// ---------------------------------------------------------------------------
// Waypoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: u32,
    pub position: Vector3<f64>, // m, world
}

impl Waypoint {
    pub fn new(id: u32, x: f64, y: f64, z: f64) -> Self {
        Self { id, position: Vector3::new(x, y, z) }
    }
}

/// What a sequencer update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointProgress {
    /// No active waypoint (empty list or already finished).
    Idle,
    /// Still flying toward the waypoint at `index`.
    EnRoute { index: usize },
    /// Arrived at `index`; the next waypoint is now active.
    Reached { index: usize },
    /// Arrived at the last waypoint this update.
    Completed,
}

// ---------------------------------------------------------------------------
// Waypoint sequencer: ordered list plus a cursor
// ---------------------------------------------------------------------------

/// The cursor runs from 0 to `len`; `len` means every waypoint was reached.
#[derive(Debug, Clone)]
pub struct WaypointSequencer {
    waypoints: Vec<Waypoint>,
    current: usize,
    tolerance: f64,
}

impl WaypointSequencer {
    pub fn new(tolerance: f64) -> Self {
        debug_assert!(tolerance > 0.0, "tolerance must be positive, got {}", tolerance);
        Self {
            waypoints: Vec::new(),
            current: 0,
            tolerance,
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Cursor position, or `None` while the list is empty.
    pub fn current_index(&self) -> Option<usize> {
        if self.waypoints.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }

    /// Waypoint currently being flown to.
    pub fn active(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.current)
    }

    pub fn is_complete(&self) -> bool {
        !self.waypoints.is_empty() && self.current >= self.waypoints.len()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        debug_assert!(tolerance > 0.0, "tolerance must be positive, got {}", tolerance);
        self.tolerance = tolerance;
    }

    /// Compare the vehicle position against the active waypoint and advance on arrival.
    pub fn update(&mut self, state: &KinematicState) -> WaypointProgress {
        let Some(active) = self.active() else {
            return WaypointProgress::Idle;
        };
        let index = self.current;
        if state.distance_to(&active.position) > self.tolerance {
            return WaypointProgress::EnRoute { index };
        }

        debug!("reached waypoint {} (id {})", index, active.id);
        self.current += 1;
        if self.current >= self.waypoints.len() {
            WaypointProgress::Completed
        } else {
            WaypointProgress::Reached { index }
        }
    }

    pub fn add(&mut self, waypoint: Waypoint) {
        self.waypoints.push(waypoint);
    }

    /// Remove by id. Indices behind the removed entry shift down; removing the
    /// active waypoint keeps the cursor in range.
    pub fn remove(&mut self, id: u32) -> Option<Waypoint> {
        let pos = self.waypoints.iter().position(|w| w.id == id)?;
        let removed = self.waypoints.remove(pos);
        if pos < self.current {
            self.current -= 1;
        } else if pos == self.current {
            self.current = self.current.min(self.waypoints.len().saturating_sub(1));
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.current = 0;
    }

    /// Replace the whole list and start again from the first entry.
    pub fn set(&mut self, waypoints: Vec<Waypoint>) {
        self.waypoints = waypoints;
        self.current = 0;
    }

    /// Start the sequence again without touching the list.
    pub fn restart(&mut self) {
        self.current = 0;
    }
}

impl Default for WaypointSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_WAYPOINT_TOLERANCE)
    }
}
