use std::env;
use std::process;

use log::{error, info};
use nalgebra::Vector3;

use quad_sim::gnc::ControllerConfig;
use quad_sim::io::{self, FlightSummary};
use quad_sim::mission::{mission_channel, CorrelationId, MissionCommand, MissionLink, MissionReply};
use quad_sim::sim::{load_patch_file, SimulationConfig, Simulator};
use quad_sim::vehicle::presets;
use quad_sim::Result;

/// Upper bound on simulated steps for the demo (120 s at the default dt).
const MAX_STEPS: usize = 12_000;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    // Usage: quad-sim [config.json] [telemetry.csv]
    let args: Vec<String> = env::args().skip(1).collect();

    // -----------------------------------------------------------------------
    // Vehicle & simulator
    // -----------------------------------------------------------------------
    let config = SimulationConfig {
        vehicle: presets::trainer(),
        ..Default::default()
    };
    let mut sim = Simulator::new(config, ControllerConfig::default());

    if let Some(path) = args.first() {
        let patch = load_patch_file(path)?;
        sim.apply_patch(&patch)?;
        info!("applied config patch from {}", path);
    }

    // -----------------------------------------------------------------------
    // Scripted mission: takeoff, box out and back, land
    // -----------------------------------------------------------------------
    let (mut link, mut driver) = mission_channel();
    let script = [
        MissionCommand::Takeoff { altitude: 3.0 },
        MissionCommand::MoveTo { target: Vector3::new(4.0, 0.0, 3.0) },
        MissionCommand::MoveTo { target: Vector3::new(4.0, 3.0, 4.0) },
        MissionCommand::Hold { seconds: 2.0 },
        MissionCommand::MoveTo { target: Vector3::new(0.0, 0.0, 3.0) },
        MissionCommand::Land,
    ];
    let mut ids = Vec::with_capacity(script.len());
    for cmd in script {
        ids.push((link.send(cmd)?, cmd));
    }

    let mut events = Vec::new();
    for _ in 0..MAX_STEPS {
        driver.poll(&mut sim)?;
        collect_replies(&link, &sim, &mut events)?;
        if events.len() == ids.len() {
            break;
        }
        sim.step();
    }

    let summary = FlightSummary::from_samples(&sim.data_history());
    let vehicle = sim.config().vehicle;
    let state = sim.drone_state();

    // -----------------------------------------------------------------------
    // Print results
    // -----------------------------------------------------------------------
    println!();
    println!("====================================================================");
    println!("  QUADROTOR FLIGHT SIMULATION");
    println!("====================================================================");
    println!();
    println!("  Vehicle Parameters");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  Mass:          {:>8.2} kg    Arm length:   {:>8.3} m",
        vehicle.mass, vehicle.arm_length
    );
    println!(
        "  Rotor thrust:  {:>8.2} N     TWR:          {:>8.2}",
        vehicle.max_motor_thrust,
        vehicle.twr()
    );
    println!(
        "  Hover cmd:     {:>8.3}       Drag coeff:   {:>8.3}",
        vehicle.hover_throttle(),
        vehicle.drag_coeff
    );
    println!();

    println!("  Mission Events");
    println!("  ──────────────────────────────────────────────────────────────────");
    for (id, cmd) in &ids {
        match events.iter().find(|(eid, _, _)| eid == id) {
            Some((_, t, pos)) => println!(
                "  #{:<2} {:<10} done  t={:>6.2}s   pos=({:>6.2}, {:>6.2}, {:>6.2})",
                id,
                cmd.name(),
                t,
                pos.x,
                pos.y,
                pos.z
            ),
            None => println!("  #{:<2} {:<10} NOT COMPLETED", id, cmd.name()),
        }
    }
    println!();

    if let Some(s) = &summary {
        println!("  Performance Summary");
        println!("  ──────────────────────────────────────────────────────────────────");
        println!(
            "  Peak altitude: {:>8.2} m   (t={:.1} s)",
            s.peak_altitude_m, s.peak_altitude_time
        );
        println!("  Max speed:     {:>8.2} m/s", s.max_speed);
        println!("  Max tilt:      {:>8.1} deg", s.max_tilt_deg);
        println!("  Ground track:  {:>8.2} m", s.horizontal_distance_m);
        println!("  Flight time:   {:>8.1} s", s.flight_time);
        println!(
            "  Final:         ({:.2}, {:.2}, {:.2}) m, mode {}",
            state.pos.x, state.pos.y, state.pos.z, s.final_mode
        );
        println!();
    }

    // -----------------------------------------------------------------------
    // Trajectory table (sampled)
    // -----------------------------------------------------------------------
    let history = sim.data_history();
    println!("  Trajectory");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  {:>7}  {:>7}  {:>7}  {:>7}  {:>8}  {:>9}",
        "t (s)", "x (m)", "y (m)", "z (m)", "v (m/s)", "tilt(deg)"
    );
    println!("  {}", "─".repeat(56));

    let sample_interval = (history.len() / 30).max(1);
    for (i, s) in history.iter().enumerate() {
        if i % sample_interval != 0 && i != history.len() - 1 {
            continue;
        }
        let tilt = s.state.roll().abs().max(s.state.pitch().abs()).to_degrees();
        println!(
            "  {:>7.2}  {:>7.2}  {:>7.2}  {:>7.2}  {:>8.2}  {:>9.2}",
            s.time,
            s.state.pos.x,
            s.state.pos.y,
            s.state.pos.z,
            s.state.vel.norm(),
            tilt
        );
    }

    println!();
    println!(
        "  Simulation: {} steps, dt={} s",
        sim.step_count(),
        sim.config().timestep
    );
    println!("====================================================================");
    println!();

    if let Some(path) = args.get(1) {
        io::write_telemetry_file(path, history.iter())?;
        info!("wrote {} telemetry rows to {}", history.len(), path);
    }

    Ok(())
}

/// Drain mission replies, recording completion time and position.
fn collect_replies(
    link: &MissionLink,
    sim: &Simulator,
    events: &mut Vec<(CorrelationId, f64, Vector3<f64>)>,
) -> Result<()> {
    while let Some(resp) = link.try_recv()? {
        if resp.reply == MissionReply::Completed {
            events.push((resp.id, sim.time(), sim.drone_state().pos));
        }
    }
    Ok(())
}
