use std::io::{self, Write};

use crate::sim::telemetry::TelemetrySample;

/// Write telemetry samples as CSV.
///
/// Columns: time, mode, pos_x, pos_y, pos_z, vel_x, vel_y, vel_z,
///          roll_deg, pitch_deg, yaw_deg, omega_x, omega_y, omega_z,
///          m1, m2, m3, m4, sp_x, sp_y, sp_z, err_alt, err_roll, err_pitch, err_yaw
pub fn write_telemetry<'a, W, I>(writer: &mut W, samples: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a TelemetrySample>,
{
    writeln!(
        writer,
        "time,mode,pos_x,pos_y,pos_z,vel_x,vel_y,vel_z,\
         roll_deg,pitch_deg,yaw_deg,omega_x,omega_y,omega_z,\
         m1,m2,m3,m4,sp_x,sp_y,sp_z,\
         err_alt,err_roll,err_pitch,err_yaw"
    )?;

    for s in samples {
        let st = &s.state;
        let [m1, m2, m3, m4] = s.motors.motors();
        let sp = s.setpoints.position;
        writeln!(
            writer,
            "{:.4},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},\
             {:.3},{:.3},{:.3},{:.5},{:.5},{:.5},\
             {:.4},{:.4},{:.4},{:.4},{:.3},{:.3},{:.3},\
             {:.5},{:.5},{:.5},{:.5}",
            s.time,
            s.mode.name(),
            st.pos.x, st.pos.y, st.pos.z,
            st.vel.x, st.vel.y, st.vel.z,
            st.roll().to_degrees(), st.pitch().to_degrees(), st.yaw().to_degrees(),
            st.omega.x, st.omega.y, st.omega.z,
            m1, m2, m3, m4,
            sp.x, sp.y, sp.z,
            s.errors.altitude, s.errors.roll, s.errors.pitch, s.errors.yaw,
        )?;
    }

    Ok(())
}

/// Write telemetry to a CSV file at the given path.
pub fn write_telemetry_file<'a, I>(path: &str, samples: I) -> io::Result<()>
where
    I: IntoIterator<Item = &'a TelemetrySample>,
{
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    write_telemetry(&mut file, samples)?;
    file.flush()
}
