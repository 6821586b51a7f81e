//! Error types for the simulator boundary.
//!
//! The simulation core itself is total; these cover configuration loading,
//! telemetry export and the mission link.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mission link disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, SimError>;
