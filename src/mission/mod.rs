pub mod script;
pub mod waypoint;

pub use script::{
    mission_channel, mission_channel_with, CorrelationId, MissionCommand, MissionConfig,
    MissionDriver, MissionLink, MissionReply, MissionRequest, MissionResponse,
};
pub use waypoint::{Waypoint, WaypointProgress, WaypointSequencer, DEFAULT_WAYPOINT_TOLERANCE};
