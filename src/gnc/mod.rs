pub mod cascade;
pub mod controller;
pub mod mixer;
pub mod pid;

pub use cascade::CascadedLoop;
pub use controller::{
    AxisValues, ControlStep, ControllerConfig, ControllerConfigUpdate, FlightController, Setpoints,
    SetpointsUpdate,
};
pub use mixer::{mix, FlightMode, ManualInputs, ManualInputsUpdate};
pub use pid::{PidGains, PidLoop};
