//! The drone control record.

use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ports::{BatchSystemAgent, SiteAgent};

use super::resources::ResourceAttributes;
use super::state::DroneState;

/// Pattern every externally exposed drone uuid matches.
pub const DRONE_UUID_PATTERN: &str = r"^\S+-[A-Fa-f0-9]{10}$";

pub fn is_valid_drone_uuid(candidate: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(DRONE_UUID_PATTERN).expect("drone uuid pattern is valid"))
        .is_match(candidate)
}

/// Control record for one managed remote resource.
///
/// A drone is a logically sequential actor: exactly one state is current at
/// any time and all writes happen from its own task. The supply/demand pair
/// is the contract with the upstream controller: demand flows in, supply is
/// what the drone currently offers.
pub struct Drone {
    unique_id: String,
    site_name: String,
    pub resource_attributes: ResourceAttributes,
    state: DroneState,
    demand: f64,
    maximum_demand: f64,
    supply: f64,
    allocation: f64,
    utilisation: f64,
    pub site_agent: Arc<dyn SiteAgent>,
    pub batch_system_agent: Arc<dyn BatchSystemAgent>,
}

impl Drone {
    /// Create a fresh drone in `Request` with a generated unique id.
    pub fn new(
        site_name: impl Into<String>,
        maximum_demand: f64,
        site_agent: Arc<dyn SiteAgent>,
        batch_system_agent: Arc<dyn BatchSystemAgent>,
    ) -> Self {
        let site_name = site_name.into();
        let suffix = Uuid::new_v4().simple().to_string();
        let unique_id = format!("{}-{}", site_name, &suffix[..10]);
        Self::with_unique_id(unique_id, site_name, maximum_demand, site_agent, batch_system_agent)
    }

    /// Create a drone with a caller-chosen unique id (restores from the
    /// registry, tests).
    pub fn with_unique_id(
        unique_id: impl Into<String>,
        site_name: impl Into<String>,
        maximum_demand: f64,
        site_agent: Arc<dyn SiteAgent>,
        batch_system_agent: Arc<dyn BatchSystemAgent>,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            site_name: site_name.into(),
            resource_attributes: ResourceAttributes::default(),
            state: DroneState::Request,
            demand: maximum_demand,
            maximum_demand,
            supply: 0.0,
            allocation: 0.0,
            utilisation: 0.0,
            site_agent,
            batch_system_agent,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn state(&self) -> DroneState {
        self.state
    }

    /// Write the next state. Entering a state that must not offer supply
    /// zeroes the supply, so teardown jumps cannot leave a stale offer.
    pub fn set_state(&mut self, next: DroneState) {
        if !next.offers_supply() {
            self.supply = 0.0;
        }
        self.state = next;
    }

    pub fn demand(&self) -> f64 {
        self.demand
    }

    pub fn set_demand(&mut self, demand: f64) {
        self.demand = demand.max(0.0);
    }

    pub fn maximum_demand(&self) -> f64 {
        self.maximum_demand
    }

    pub fn supply(&self) -> f64 {
        self.supply
    }

    pub(crate) fn set_supply(&mut self, supply: f64) {
        self.supply = supply.max(0.0);
    }

    pub fn allocation(&self) -> f64 {
        self.allocation
    }

    pub(crate) fn set_allocation(&mut self, allocation: f64) {
        self.allocation = allocation.clamp(0.0, 1.0);
    }

    pub fn utilisation(&self) -> f64 {
        self.utilisation
    }

    pub(crate) fn set_utilisation(&mut self, utilisation: f64) {
        self.utilisation = utilisation.clamp(0.0, 1.0);
    }

    /// Snapshot for the registry, taken after a completed step so state and
    /// attributes are consistent.
    pub fn record(&self) -> DroneRecord {
        DroneRecord {
            drone_uuid: self.unique_id.clone(),
            state: self.state.name().to_string(),
            site: self.site_name.clone(),
            resource_id: self.resource_attributes.resource_id.clone(),
            dns_name: self.resource_attributes.dns_name.clone(),
            resource_status: self
                .resource_attributes
                .resource_status
                .map(|status| status.as_str().to_string()),
            last_seen: Utc::now(),
        }
    }
}

impl fmt::Display for Drone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unique_id)
    }
}

/// Registry snapshot of one drone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneRecord {
    pub drone_uuid: String,
    pub state: String,
    pub site: String,
    pub resource_id: Option<String>,
    pub dns_name: Option<String>,
    pub resource_status: Option<String>,
    pub last_seen: DateTime<Utc>,
}
