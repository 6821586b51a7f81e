pub mod integrator;
pub mod model;
pub mod rigid_body;
pub mod state;

pub use model::RigidBodyModel;
pub use state::{wrap_angle, KinematicState, MotorCommand, GRAVITY};
