//! Batch-system agent port: node lifecycle inside a workload scheduler.

use async_trait::async_trait;

use crate::domain::errors::AgentResult;
use crate::domain::models::MachineStatus;

/// Adapter contract for the batch scheduler (Slurm, HTCondor, ...).
///
/// Machines are addressed by the `dns_name` the site assigned to the
/// underlying resource.
#[async_trait]
pub trait BatchSystemAgent: Send + Sync {
    /// Add the machine to the scheduler.
    async fn integrate_machine(&self, dns_name: &str) -> AgentResult<()>;

    /// Current availability of the machine.
    async fn get_machine_status(&self, dns_name: &str) -> AgentResult<MachineStatus>;

    /// Fraction of the machine's resources currently allocated, in [0, 1].
    async fn get_allocation(&self, dns_name: &str) -> AgentResult<f64>;

    /// Fraction of the machine's resources currently used, in [0, 1].
    async fn get_utilisation(&self, dns_name: &str) -> AgentResult<f64>;

    /// Stop the scheduler from placing new workload on the machine.
    async fn drain_machine(&self, dns_name: &str) -> AgentResult<()>;

    /// Remove the machine from the scheduler.
    async fn disintegrate_machine(&self, dns_name: &str) -> AgentResult<()>;
}
