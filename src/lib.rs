pub mod dynamics;
pub mod error;
pub mod gnc;
pub mod io;
pub mod mission;
pub mod sim;
pub mod vehicle;

pub use error::{Result, SimError};
pub use sim::Simulator;
