use std::io::Write;

use nalgebra::Vector3;
use serde::Serialize;

use crate::error::Result;
use crate::gnc::FlightMode;
use crate::sim::telemetry::TelemetrySample;
use crate::vehicle::VehicleParameters;

/// Summary statistics computed from a telemetry history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightSummary {
    pub peak_altitude_m: f64,
    pub peak_altitude_time: f64,
    pub max_speed: f64,
    pub max_tilt_deg: f64,
    pub horizontal_distance_m: f64,
    pub flight_time: f64,
    pub final_position: Vector3<f64>,
    pub final_mode: FlightMode,
    pub samples: usize,
}

impl FlightSummary {
    /// Compute summary from samples, oldest first. `None` when empty.
    pub fn from_samples(samples: &[TelemetrySample]) -> Option<Self> {
        let first = samples.first()?;
        let last = samples.last()?;

        let peak = samples
            .iter()
            .max_by(|a, b| a.state.pos.z.total_cmp(&b.state.pos.z))
            .unwrap_or(last);

        let max_speed = samples
            .iter()
            .map(|s| s.state.vel.norm())
            .fold(0.0_f64, f64::max);

        let max_tilt = samples
            .iter()
            .map(|s| s.state.roll().abs().max(s.state.pitch().abs()))
            .fold(0.0_f64, f64::max);

        let horizontal_distance_m = samples
            .windows(2)
            .map(|w| (w[1].state.pos.xy() - w[0].state.pos.xy()).norm())
            .sum();

        Some(FlightSummary {
            peak_altitude_m: peak.state.pos.z,
            peak_altitude_time: peak.time,
            max_speed,
            max_tilt_deg: max_tilt.to_degrees(),
            horizontal_distance_m,
            flight_time: last.time - first.time,
            final_position: last.state.pos,
            final_mode: last.mode,
            samples: samples.len(),
        })
    }
}

#[derive(Serialize)]
struct Report<'a> {
    vehicle: &'a VehicleParameters,
    performance: &'a FlightSummary,
}

/// Write the vehicle and flight summary as pretty JSON.
pub fn write_summary<W: Write>(
    writer: &mut W,
    vehicle: &VehicleParameters,
    summary: &FlightSummary,
) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &Report { vehicle, performance: summary })?;
    writeln!(writer)?;
    Ok(())
}

/// Write flight summary JSON to a file.
pub fn write_summary_file(
    path: &str,
    vehicle: &VehicleParameters,
    summary: &FlightSummary,
) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_summary(&mut file, vehicle, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gnc::SetpointsUpdate;
    use crate::sim::runner::Simulator;

    #[test]
    fn summary_tracks_climb() {
        let mut sim = Simulator::default();
        sim.set_setpoints(&SetpointsUpdate::altitude(2.0));
        sim.run_steps(500);
        let s = FlightSummary::from_samples(&sim.data_history()).unwrap();
        assert!(s.peak_altitude_m > 1.5);
        assert!(s.max_speed > 0.0);
        assert_eq!(s.samples, 500);
        assert_eq!(s.final_mode, FlightMode::PositionHold);
        assert!((s.flight_time - 4.99).abs() < 1e-6);
    }

    #[test]
    fn empty_history_has_no_summary() {
        assert!(FlightSummary::from_samples(&[]).is_none());
    }

    #[test]
    fn json_output_is_valid() {
        let mut sim = Simulator::default();
        sim.run_steps(10);
        let summary = FlightSummary::from_samples(&sim.data_history()).unwrap();

        let mut buf = Vec::new();
        write_summary(&mut buf, &sim.config().vehicle, &summary).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert!(value["vehicle"]["mass"].is_number());
        assert_eq!(value["performance"]["samples"], 10);
        assert_eq!(value["performance"]["final_mode"], "position_hold");
    }

    #[test]
    fn summary_file_round_trips_through_disk() {
        let mut sim = Simulator::default();
        sim.run_steps(5);
        let summary = FlightSummary::from_samples(&sim.data_history()).unwrap();

        let name = format!("quad-sim-summary-{}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        let path_str = path.to_string_lossy().into_owned();
        write_summary_file(&path_str, &sim.config().vehicle, &summary).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["performance"]["samples"], 5);
    }
}
