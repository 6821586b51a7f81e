use std::sync::mpsc::Sender;

use crate::gnc::FlightMode;

use super::telemetry::TelemetrySample;

// ---------------------------------------------------------------------------
// Simulation events
// ---------------------------------------------------------------------------

/// Notifications published by the simulator, synchronously, from the tick
/// that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// One step ran; carries the sample it appended.
    StepCompleted(TelemetrySample),
    /// Flight mode changed, by command or by finishing a waypoint run.
    ModeChanged { from: FlightMode, to: FlightMode },
    /// State, telemetry and controllers were cleared.
    Reset,
}

impl SimEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SimEvent::StepCompleted(_) => "step_completed",
            SimEvent::ModeChanged { .. } => "mode_changed",
            SimEvent::Reset => "reset",
        }
    }
}

/// Receives simulator events. Implementations must not call back into the
/// simulator; they get a reference to the event only.
pub trait SimObserver {
    fn notify(&mut self, event: &SimEvent);
}

/// Channel publishing: each event is cloned into the queue. A dropped
/// receiver is ignored.
impl SimObserver for Sender<SimEvent> {
    fn notify(&mut self, event: &SimEvent) {
        let _ = self.send(event.clone());
    }
}

/// Adapter so plain closures can observe every event.
pub struct FnObserver<F>(pub F);

impl<F: FnMut(&SimEvent)> SimObserver for FnObserver<F> {
    fn notify(&mut self, event: &SimEvent) {
        (self.0)(event)
    }
}
