//! Domain models
//!
//! Pure domain entities: observed resource/machine statuses, the drone
//! control record, and the lifecycle state machine.

pub mod drone;
pub mod resources;
pub mod state;

pub use drone::{is_valid_drone_uuid, Drone, DroneRecord, DRONE_UUID_PATTERN};
pub use resources::{MachineStatus, ResourceAttributes, ResourceStatus};
pub use state::{DroneState, Observation};
