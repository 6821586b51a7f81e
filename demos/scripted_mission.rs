use std::thread;
use std::time::{Duration, Instant};

use nalgebra::Vector3;

use quad_sim::mission::{mission_channel, MissionCommand, MissionReply};
use quad_sim::sim::{SimulationConfigUpdate, Simulator, TickPolicy};

/// Script on its own thread, simulator driven by `tick` in real time (x20).
fn main() -> quad_sim::Result<()> {
    env_logger::init();

    let mut sim = Simulator::default();
    sim.set_config(&SimulationConfigUpdate {
        real_time_multiplier: Some(20.0),
        tick_policy: Some(TickPolicy::CatchUp { max_steps: 10 }),
        ..Default::default()
    });

    let (mut link, mut driver) = mission_channel();
    let script = thread::spawn(move || -> quad_sim::Result<()> {
        let plan = [
            MissionCommand::Takeoff { altitude: 2.0 },
            MissionCommand::MoveTo { target: Vector3::new(3.0, 1.0, 2.5) },
            MissionCommand::Land,
        ];
        for cmd in plan {
            let id = link.send(cmd)?;
            loop {
                if let Some(resp) = link.recv_timeout(Duration::from_millis(50))? {
                    if resp.id == id && resp.reply == MissionReply::Completed {
                        println!("  {} done", cmd.name());
                        break;
                    }
                }
            }
        }
        Ok(())
    });

    sim.start();
    while !script.is_finished() {
        sim.tick(Instant::now());
        driver.poll(&mut sim)?;
        thread::sleep(Duration::from_millis(1));
    }
    sim.pause();

    let p = sim.drone_state().pos;
    println!(
        "Landed at ({:.2}, {:.2}, {:.2}) after {:.1} s simulated",
        p.x,
        p.y,
        p.z,
        sim.time()
    );
    match script.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
