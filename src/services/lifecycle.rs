//! Per-state run steps of the drone state machine.
//!
//! Each step performs at most one externally observable round-trip (the
//! Available step additionally refreshes allocation and utilisation), then
//! writes the successor state. Attribute mutation always happens before the
//! state write, so a registry snapshot taken after the step never pairs a
//! new state with stale attributes.
//!
//! Auth and timeout failures are absorbed only in states whose transition
//! table has a self-loop; everything else bubbles up to the fleet, which
//! takes the fatal teardown path.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::errors::{AgentError, AgentResult};
use crate::domain::models::{
    Drone, DroneState, MachineStatus, Observation, ResourceStatus,
};
use crate::services::config::FleetConfig;

/// Timing knobs for the run steps.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Poll interval while a drone sits in Available.
    pub availability_interval: Duration,
    /// Deadline applied to every site/batch agent call.
    pub agent_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            availability_interval: Duration::from_secs(10),
            agent_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&FleetConfig> for LifecycleConfig {
    fn from(config: &FleetConfig) -> Self {
        Self {
            availability_interval: Duration::from_secs(config.availability_interval_secs),
            agent_timeout: Duration::from_secs(config.agent_timeout_secs),
        }
    }
}

/// Errors that end a drone's life.
#[derive(Debug, Error)]
pub enum StepError {
    /// Non-retryable agent failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The observed status is not in the current state's transition table.
    #[error("{state} has no transition for {observation}")]
    UnmappedObservation {
        state: DroneState,
        observation: Observation,
    },
}

/// Execute one run step for the drone's current state.
pub async fn step(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    match drone.state() {
        DroneState::Request => run_request(drone, config).await,
        DroneState::Booting => run_booting(drone, config).await,
        DroneState::Integrate => run_integrate(drone, config).await,
        DroneState::Integrating => run_integrating(drone, config).await,
        DroneState::Available => run_available(drone, config).await,
        DroneState::Drain => run_drain(drone, config).await,
        DroneState::Draining => run_draining(drone, config).await,
        DroneState::Disintegrate => run_disintegrate(drone),
        DroneState::ShutDown => run_shut_down(drone, config).await,
        DroneState::ShuttingDown => run_shutting_down(drone, config).await,
        DroneState::Cleanup => run_cleanup(drone, config).await,
        DroneState::Down => Ok(()),
    }
}

async fn with_deadline<T>(
    deadline: Duration,
    call: impl Future<Output = AgentResult<T>>,
) -> AgentResult<T> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Timeout(deadline)),
    }
}

/// Dispatch an observation through the current state's transition table.
fn dispatch(drone: &mut Drone, observation: Observation) -> Result<(), StepError> {
    let state = drone.state();
    match state.observe(observation) {
        Some(next) => {
            drone.set_state(next);
            Ok(())
        }
        None => Err(StepError::UnmappedObservation { state, observation }),
    }
}

fn observed_resource_status(drone: &Drone) -> AgentResult<ResourceStatus> {
    drone
        .resource_attributes
        .resource_status
        .ok_or_else(|| AgentError::Site("resource_status missing from site response".to_string()))
}

fn dns_name(drone: &Drone) -> AgentResult<String> {
    drone
        .resource_attributes
        .dns_name
        .clone()
        .ok_or_else(|| AgentError::Batch("dns_name not known yet".to_string()))
}

async fn run_request(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    info!("requesting resource");
    let site = drone.site_agent.clone();
    let deployed =
        with_deadline(config.agent_timeout, site.deploy_resource(drone.unique_id())).await;
    match deployed {
        Ok(attributes) => {
            drone.resource_attributes.merge(attributes);
            drone.set_state(DroneState::Booting);
        }
        Err(err) if err.is_retryable() => {
            // The resource may never have come into existence; give up
            // instead of leaking an unobservable machine.
            warn!(error = %err, "deploy failed, assuming the resource does not exist");
            drone.set_state(DroneState::Down);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn run_booting(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    let site = drone.site_agent.clone();
    let refreshed = with_deadline(
        config.agent_timeout,
        site.resource_status(&drone.resource_attributes),
    )
    .await;
    match refreshed {
        Ok(attributes) => {
            drone.resource_attributes.merge(attributes);
            let status = observed_resource_status(drone)?;
            dispatch(drone, Observation::Resource(status))?;
        }
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "status query failed, retrying");
            drone.set_state(DroneState::Booting);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn run_integrate(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    let dns_name = dns_name(drone)?;
    info!(%dns_name, "integrating machine into the batch system");
    let batch = drone.batch_system_agent.clone();
    with_deadline(config.agent_timeout, batch.integrate_machine(&dns_name)).await?;
    drone.set_state(DroneState::Integrating);
    Ok(())
}

async fn run_integrating(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    let dns_name = dns_name(drone)?;
    let batch = drone.batch_system_agent.clone();
    match with_deadline(config.agent_timeout, batch.get_machine_status(&dns_name)).await {
        Ok(status) => dispatch(drone, Observation::Machine(status))?,
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "machine status query failed, retrying");
            drone.set_state(DroneState::Integrating);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn run_available(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    tokio::time::sleep(config.availability_interval).await;

    let dns_name = dns_name(drone)?;
    let batch = drone.batch_system_agent.clone();
    let status = match with_deadline(config.agent_timeout, batch.get_machine_status(&dns_name))
        .await
    {
        Ok(status) => status,
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "machine status query failed, keeping last reading");
            drone.set_state(DroneState::Available);
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    // Demand is checked before machine health: an upstream demand drop must
    // drain cleanly even when the node is unhealthy.
    if drone.demand() == 0.0 {
        info!("demand dropped to zero, draining");
        drone.set_supply(0.0);
        drone.set_state(DroneState::Drain);
        return Ok(());
    }

    if status == MachineStatus::NotAvailable {
        warn!("machine vanished from the batch system, shutting down");
        drone.set_supply(0.0);
        drone.set_state(DroneState::ShutDown);
        return Ok(());
    }

    match with_deadline(config.agent_timeout, batch.get_allocation(&dns_name)).await {
        Ok(allocation) => drone.set_allocation(allocation),
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "allocation query failed, keeping last reading");
        }
        Err(err) => return Err(err.into()),
    }
    match with_deadline(config.agent_timeout, batch.get_utilisation(&dns_name)).await {
        Ok(utilisation) => drone.set_utilisation(utilisation),
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "utilisation query failed, keeping last reading");
        }
        Err(err) => return Err(err.into()),
    }

    drone.set_supply(drone.maximum_demand());
    drone.set_state(DroneState::Available);
    Ok(())
}

async fn run_drain(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    let dns_name = dns_name(drone)?;
    info!(%dns_name, "draining machine");
    let batch = drone.batch_system_agent.clone();
    with_deadline(config.agent_timeout, batch.drain_machine(&dns_name)).await?;
    drone.set_state(DroneState::Draining);
    Ok(())
}

async fn run_draining(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    let dns_name = dns_name(drone)?;
    let batch = drone.batch_system_agent.clone();
    match with_deadline(config.agent_timeout, batch.get_machine_status(&dns_name)).await {
        Ok(status) => dispatch(drone, Observation::Machine(status))?,
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "machine status query failed, retrying");
            drone.set_state(DroneState::Draining);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn run_disintegrate(drone: &mut Drone) -> Result<(), StepError> {
    drone.set_state(DroneState::ShutDown);
    Ok(())
}

async fn run_shut_down(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    info!(
        resource_id = drone.resource_attributes.resource_id.as_deref(),
        "stopping resource"
    );
    let site = drone.site_agent.clone();
    with_deadline(
        config.agent_timeout,
        site.stop_resource(&drone.resource_attributes),
    )
    .await?;
    drone.set_state(DroneState::ShuttingDown);
    Ok(())
}

async fn run_shutting_down(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    let site = drone.site_agent.clone();
    let refreshed = with_deadline(
        config.agent_timeout,
        site.resource_status(&drone.resource_attributes),
    )
    .await;
    match refreshed {
        Ok(attributes) => {
            drone.resource_attributes.merge(attributes);
            let status = observed_resource_status(drone)?;
            if status == ResourceStatus::Booting {
                warn!("resource reports booting after a stop request");
            }
            dispatch(drone, Observation::Resource(status))?;
        }
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "status query failed, retrying");
            drone.set_state(DroneState::ShuttingDown);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn run_cleanup(drone: &mut Drone, config: &LifecycleConfig) -> Result<(), StepError> {
    info!(
        resource_id = drone.resource_attributes.resource_id.as_deref(),
        "destroying resource"
    );
    let site = drone.site_agent.clone();
    with_deadline(
        config.agent_timeout,
        site.terminate_resource(&drone.resource_attributes),
    )
    .await?;
    drone.set_state(DroneState::Down);
    Ok(())
}
