//! Site agent port: resource lifecycle on a remote compute provider.

use async_trait::async_trait;

use crate::domain::errors::AgentResult;
use crate::domain::models::ResourceAttributes;

/// Adapter contract for one remote site (cloud, VM farm, HPC overlay).
///
/// Every operation may fail with `AgentError::Auth` (credentials rejected)
/// or `AgentError::Timeout`; other failures surface as `AgentError::Site`.
#[async_trait]
pub trait SiteAgent: Send + Sync {
    /// Create the resource. Idempotent keyed by `unique_id`; the returned
    /// attributes include `resource_id` and `dns_name`.
    async fn deploy_resource(&self, unique_id: &str) -> AgentResult<ResourceAttributes>;

    /// Return refreshed attributes. Must set `resource_status`.
    async fn resource_status(
        &self,
        attributes: &ResourceAttributes,
    ) -> AgentResult<ResourceAttributes>;

    /// Request a graceful shutdown. Idempotent.
    async fn stop_resource(&self, attributes: &ResourceAttributes) -> AgentResult<()>;

    /// Destroy the resource. Idempotent; may return before the resource is
    /// fully gone. The final observation is `resource_status == Deleted`
    /// from a later `resource_status` call.
    async fn terminate_resource(&self, attributes: &ResourceAttributes) -> AgentResult<()>;
}
