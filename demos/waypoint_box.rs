use std::sync::mpsc;

use quad_sim::gnc::{ControllerConfig, FlightMode};
use quad_sim::mission::Waypoint;
use quad_sim::sim::{SimEvent, SimulationConfig, Simulator};
use quad_sim::vehicle::presets;

/// Heavy-lift airframe flying a 4 m box at 3 m, then holding the last corner.
fn main() {
    let config = SimulationConfig {
        vehicle: presets::heavy_lift(),
        ..Default::default()
    };
    let mut sim = Simulator::new(config, ControllerConfig::default());

    let (tx, rx) = mpsc::channel();
    sim.add_observer(Box::new(tx));

    sim.set_waypoints(vec![
        Waypoint::new(1, 0.0, 0.0, 3.0),
        Waypoint::new(2, 4.0, 0.0, 3.0),
        Waypoint::new(3, 4.0, 4.0, 3.0),
        Waypoint::new(4, 0.0, 4.0, 3.0),
        Waypoint::new(5, 0.0, 0.0, 3.0),
    ]);
    sim.set_flight_mode(FlightMode::Waypoint);

    let mut last_index = sim.current_waypoint_index();
    for _ in 0..12_000 {
        sim.step();
        let index = sim.current_waypoint_index();
        if index != last_index {
            let p = sim.drone_state().pos;
            println!(
                "  t={:>6.2}s  waypoint {:?} -> {:?}  pos=({:.2}, {:.2}, {:.2})",
                sim.time(),
                last_index,
                index,
                p.x,
                p.y,
                p.z
            );
            last_index = index;
        }
        if sim.flight_mode() == FlightMode::PositionHold {
            break;
        }
    }

    for event in rx.try_iter() {
        if let SimEvent::ModeChanged { from, to } = event {
            println!("  mode {} -> {}", from, to);
        }
    }
    println!("Box complete in {:.1} s ({} samples kept)", sim.time(), sim.data_history().len());
}
