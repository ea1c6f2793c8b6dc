//! Scripted site and batch-system doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use aviary::domain::errors::AgentResult;
use aviary::domain::models::{
    Drone, DroneState, MachineStatus, ResourceAttributes, ResourceStatus,
};
use aviary::domain::ports::{BatchSystemAgent, SiteAgent};
use aviary::services::config::FleetConfig;
use aviary::services::lifecycle::LifecycleConfig;

/// Pop the next scripted response; the last entry repeats forever.
fn next<T: Clone>(queue: &Mutex<VecDeque<AgentResult<T>>>) -> AgentResult<T> {
    let mut queue = queue.lock().unwrap();
    let response = queue.pop_front().expect("script exhausted");
    if queue.is_empty() {
        queue.push_back(response.clone());
    }
    response
}

/// Attribute set a site would return from a successful deploy.
pub fn deployed_attributes(
    resource_id: &str,
    dns_name: &str,
    status: ResourceStatus,
) -> ResourceAttributes {
    ResourceAttributes {
        resource_id: Some(resource_id.to_string()),
        dns_name: Some(dns_name.to_string()),
        resource_status: Some(status),
        ..Default::default()
    }
}

/// Site agent double replaying a scripted deploy result and a sequence of
/// status readings. Stop and terminate calls are counted.
pub struct ScriptedSite {
    deploy: Mutex<Option<AgentResult<ResourceAttributes>>>,
    statuses: Mutex<VecDeque<AgentResult<ResourceStatus>>>,
    stopped_after_stop: bool,
    pub stop_calls: AtomicUsize,
    pub terminate_calls: AtomicUsize,
}

impl ScriptedSite {
    pub fn new(
        deploy: AgentResult<ResourceAttributes>,
        statuses: Vec<AgentResult<ResourceStatus>>,
    ) -> Self {
        Self {
            deploy: Mutex::new(Some(deploy)),
            statuses: Mutex::new(statuses.into_iter().collect()),
            stopped_after_stop: false,
            stop_calls: AtomicUsize::new(0),
            terminate_calls: AtomicUsize::new(0),
        }
    }

    /// After `stop_resource` has been called, status reads report Stopped
    /// regardless of the script.
    pub fn stopped_after_stop(mut self) -> Self {
        self.stopped_after_stop = true;
        self
    }

    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn terminate_count(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SiteAgent for ScriptedSite {
    async fn deploy_resource(&self, _unique_id: &str) -> AgentResult<ResourceAttributes> {
        self.deploy
            .lock()
            .unwrap()
            .take()
            .expect("deploy_resource called more than once")
    }

    async fn resource_status(
        &self,
        _attributes: &ResourceAttributes,
    ) -> AgentResult<ResourceAttributes> {
        if self.stopped_after_stop && self.stop_count() > 0 {
            return Ok(ResourceAttributes {
                resource_status: Some(ResourceStatus::Stopped),
                ..Default::default()
            });
        }
        next(&self.statuses).map(|status| ResourceAttributes {
            resource_status: Some(status),
            ..Default::default()
        })
    }

    async fn stop_resource(&self, _attributes: &ResourceAttributes) -> AgentResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn terminate_resource(&self, _attributes: &ResourceAttributes) -> AgentResult<()> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Batch-system double replaying scripted machine statuses with fixed
/// allocation and utilisation readings.
pub struct ScriptedBatch {
    statuses: Mutex<VecDeque<AgentResult<MachineStatus>>>,
    drained_after_drain: bool,
    pub allocation: f64,
    pub utilisation: f64,
    pub integrate_calls: AtomicUsize,
    pub drain_calls: AtomicUsize,
    pub disintegrate_calls: AtomicUsize,
}

impl ScriptedBatch {
    pub fn new(statuses: Vec<AgentResult<MachineStatus>>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            drained_after_drain: false,
            allocation: 0.5,
            utilisation: 0.25,
            integrate_calls: AtomicUsize::new(0),
            drain_calls: AtomicUsize::new(0),
            disintegrate_calls: AtomicUsize::new(0),
        }
    }

    /// After `drain_machine` has been called, status reads report Drained
    /// regardless of the script.
    pub fn drained_after_drain(mut self) -> Self {
        self.drained_after_drain = true;
        self
    }

    pub fn integrate_count(&self) -> usize {
        self.integrate_calls.load(Ordering::SeqCst)
    }

    pub fn drain_count(&self) -> usize {
        self.drain_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSystemAgent for ScriptedBatch {
    async fn integrate_machine(&self, _dns_name: &str) -> AgentResult<()> {
        self.integrate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_machine_status(&self, _dns_name: &str) -> AgentResult<MachineStatus> {
        if self.drained_after_drain && self.drain_count() > 0 {
            return Ok(MachineStatus::Drained);
        }
        next(&self.statuses)
    }

    async fn get_allocation(&self, _dns_name: &str) -> AgentResult<f64> {
        Ok(self.allocation)
    }

    async fn get_utilisation(&self, _dns_name: &str) -> AgentResult<f64> {
        Ok(self.utilisation)
    }

    async fn drain_machine(&self, _dns_name: &str) -> AgentResult<()> {
        self.drain_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disintegrate_machine(&self, _dns_name: &str) -> AgentResult<()> {
        self.disintegrate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A drone placed directly into `state` with deployed attributes, as if it
/// had already passed Request.
pub fn deployed_drone(
    state: DroneState,
    maximum_demand: f64,
    site: Arc<ScriptedSite>,
    batch: Arc<ScriptedBatch>,
) -> Drone {
    let mut drone = Drone::with_unique_id("nemo-0123456789", "nemo", maximum_demand, site, batch);
    drone.resource_attributes.resource_id = Some("r1".to_string());
    drone.resource_attributes.dns_name = Some("h1".to_string());
    drone.resource_attributes.resource_status = Some(ResourceStatus::Running);
    drone.set_state(state);
    drone
}

/// Lifecycle timing with no sleeps, for tests.
pub fn fast_lifecycle() -> LifecycleConfig {
    LifecycleConfig {
        availability_interval: Duration::ZERO,
        agent_timeout: Duration::from_secs(5),
    }
}

/// Fleet timing with no sleeps, for tests.
pub fn fast_fleet() -> FleetConfig {
    FleetConfig {
        availability_interval_secs: 0,
        pacing_millis: 0,
        agent_timeout_secs: 5,
    }
}
