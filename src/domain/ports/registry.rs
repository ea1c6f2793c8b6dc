//! Drone registry port.

use async_trait::async_trait;

use crate::domain::errors::RegistryResult;
use crate::domain::models::DroneRecord;

/// Durable store of drones and their last observed state.
///
/// The registry backs the observability API. It may lag the live state
/// machine by one transition but must stay monotonic per drone: writes for
/// one `drone_uuid` are applied in the order they were issued.
#[async_trait]
pub trait DroneRegistry: Send + Sync {
    /// Name of the drone's last recorded state, if the drone is known.
    async fn get_resource_state(&self, drone_uuid: &str) -> RegistryResult<Option<String>>;

    /// All registered drones.
    async fn get_resources(&self) -> RegistryResult<Vec<DroneRecord>>;

    /// Record a transition. Invoked after every completed step.
    async fn upsert(&self, record: &DroneRecord) -> RegistryResult<()>;
}
