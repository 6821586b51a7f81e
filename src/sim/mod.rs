pub mod config;
pub mod event;
pub mod runner;
pub mod telemetry;

pub use config::{
    load_patch_file, load_patch_json, ConfigPatch, SimulationConfig, SimulationConfigUpdate,
    TickPolicy, DEFAULT_TELEMETRY_CAPACITY,
};
pub use event::{FnObserver, SimEvent, SimObserver};
pub use runner::Simulator;
pub use telemetry::{TelemetryHistory, TelemetrySample};
