//! Fleet orchestration: one cooperative actor per drone.
//!
//! Each drone runs on its own tokio task and is driven step by step through
//! the state machine. Commands (demand updates, cancellation) arrive through
//! a mailbox and are delivered at the next suspension point. Drones advance
//! concurrently and independently; no cross-drone ordering exists.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::domain::models::{Drone, DroneState};
use crate::domain::ports::DroneRegistry;
use crate::services::config::FleetConfig;
use crate::services::lifecycle::{self, LifecycleConfig, StepError};

/// External command delivered to a drone actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DroneCommand {
    /// Update the upstream demand signal.
    SetDemand(f64),
    /// Tear the drone down from its current state.
    Cancel,
}

/// Handle to a running drone actor.
pub struct DroneHandle {
    unique_id: String,
    commands: mpsc::Sender<DroneCommand>,
    task: JoinHandle<DroneState>,
}

impl DroneHandle {
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Update the demand signal. Returns false if the drone already
    /// terminated.
    pub async fn set_demand(&self, demand: f64) -> bool {
        self.commands
            .send(DroneCommand::SetDemand(demand))
            .await
            .is_ok()
    }

    /// Request teardown. Returns false if the drone already terminated.
    pub async fn cancel(&self) -> bool {
        self.commands.send(DroneCommand::Cancel).await.is_ok()
    }

    /// Wait for the drone to reach its terminal state.
    pub async fn join(self) -> DroneState {
        self.task.await.unwrap_or(DroneState::Down)
    }
}

/// Spawns and supervises drone actors against a shared registry.
pub struct FleetOrchestrator {
    registry: Arc<dyn DroneRegistry>,
    lifecycle: LifecycleConfig,
    pacing: Duration,
}

impl FleetOrchestrator {
    pub fn new(registry: Arc<dyn DroneRegistry>, config: &FleetConfig) -> Self {
        Self {
            registry,
            lifecycle: LifecycleConfig::from(config),
            pacing: Duration::from_millis(config.pacing_millis),
        }
    }

    /// Start the actor loop for one drone.
    pub fn spawn(&self, drone: Drone) -> DroneHandle {
        let (commands, mailbox) = mpsc::channel(16);
        let unique_id = drone.unique_id().to_string();
        let task = tokio::spawn(drone_loop(
            drone,
            mailbox,
            self.registry.clone(),
            self.lifecycle.clone(),
            self.pacing,
        ));
        DroneHandle {
            unique_id,
            commands,
            task,
        }
    }
}

enum Tick {
    Command(Option<DroneCommand>),
    Step(Result<(), StepError>),
}

async fn drone_loop(
    mut drone: Drone,
    mut mailbox: mpsc::Receiver<DroneCommand>,
    registry: Arc<dyn DroneRegistry>,
    config: LifecycleConfig,
    pacing: Duration,
) -> DroneState {
    let mut cancelled = false;
    let mut mailbox_open = true;

    // Make the drone observable before its first step.
    persist(registry.as_ref(), &drone).await;

    while !drone.state().is_terminal() {
        while let Ok(command) = mailbox.try_recv() {
            apply_command(&mut drone, command, &mut cancelled);
        }

        if cancelled {
            let target = teardown_state(drone.state());
            if target != drone.state() {
                info!(
                    drone_uuid = %drone.unique_id(),
                    from = drone.state().name(),
                    to = target.name(),
                    "cancellation requested, redirecting"
                );
                drone.set_state(target);
                persist(registry.as_ref(), &drone).await;
                continue;
            }
        }

        let span = info_span!(
            "drone",
            drone_uuid = %drone.unique_id(),
            state = drone.state().name()
        );

        // A deploy in flight must not be abandoned half-way; every other
        // step may be interrupted by a mailbox message at its suspension
        // points.
        let result = if drone.state() == DroneState::Request || !mailbox_open {
            lifecycle::step(&mut drone, &config).instrument(span).await
        } else {
            let tick = tokio::select! {
                biased;
                command = mailbox.recv() => Tick::Command(command),
                result = lifecycle::step(&mut drone, &config).instrument(span) => {
                    Tick::Step(result)
                }
            };
            match tick {
                Tick::Command(Some(command)) => {
                    apply_command(&mut drone, command, &mut cancelled);
                    continue;
                }
                Tick::Command(None) => {
                    mailbox_open = false;
                    continue;
                }
                Tick::Step(result) => result,
            }
        };

        match result {
            Ok(()) => persist(registry.as_ref(), &drone).await,
            Err(err) => {
                error!(
                    drone_uuid = %drone.unique_id(),
                    state = drone.state().name(),
                    error = %err,
                    "drone failed, tearing down"
                );
                best_effort_cleanup(&drone, &config).await;
                drone.set_state(DroneState::Down);
                persist(registry.as_ref(), &drone).await;
                break;
            }
        }

        if pacing > Duration::ZERO && !drone.state().is_terminal() {
            tokio::time::sleep(pacing).await;
        }
    }

    info!(drone_uuid = %drone.unique_id(), "drone reached its terminal state");
    drone.state()
}

fn apply_command(drone: &mut Drone, command: DroneCommand, cancelled: &mut bool) {
    match command {
        DroneCommand::SetDemand(demand) => drone.set_demand(demand),
        DroneCommand::Cancel => *cancelled = true,
    }
}

/// Where cancellation sends a drone, given its current state.
///
/// A drone that never provisioned goes straight down; an available one
/// drains first; one that is integrated but not yet serving skips the drain
/// and stops the resource. States already on the teardown path keep going.
fn teardown_state(state: DroneState) -> DroneState {
    match state {
        DroneState::Request => DroneState::Down,
        DroneState::Booting | DroneState::Integrate | DroneState::Integrating => {
            DroneState::ShutDown
        }
        DroneState::Available => DroneState::Drain,
        other => other,
    }
}

/// Best-effort release of batch and site resources after a fatal error.
/// Failures here are logged and swallowed; the drone goes down regardless.
async fn best_effort_cleanup(drone: &Drone, config: &LifecycleConfig) {
    let deadline = config.agent_timeout;

    async fn attempt<T>(
        deadline: Duration,
        what: &str,
        call: impl std::future::Future<Output = crate::domain::errors::AgentResult<T>>,
    ) -> bool {
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(error = %err, "{what} during cleanup failed");
                false
            }
            Err(_) => {
                debug!("{what} during cleanup timed out");
                false
            }
        }
    }

    if let Some(dns_name) = drone.resource_attributes.dns_name.clone() {
        let batch = drone.batch_system_agent.clone();
        attempt(deadline, "drain", batch.drain_machine(&dns_name)).await;
        attempt(deadline, "disintegrate", batch.disintegrate_machine(&dns_name)).await;
    }

    if drone.resource_attributes.resource_id.is_some() {
        let site = drone.site_agent.clone();
        attempt(deadline, "stop", site.stop_resource(&drone.resource_attributes)).await;
        let terminated = attempt(
            deadline,
            "terminate",
            site.terminate_resource(&drone.resource_attributes),
        )
        .await;
        if !terminated {
            warn!(
                drone_uuid = %drone.unique_id(),
                "terminate during cleanup failed, resource may leak"
            );
        }
    }
}

async fn persist(registry: &dyn DroneRegistry, drone: &Drone) {
    if let Err(err) = registry.upsert(&drone.record()).await {
        warn!(
            drone_uuid = %drone.unique_id(),
            error = %err,
            "failed to record transition"
        );
    }
}
