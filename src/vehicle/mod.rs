pub mod params;

pub use params::{
    presets, VehicleBuilder, VehicleParameters, VehicleParametersUpdate, NOMINAL_HOVER_THROTTLE,
};
