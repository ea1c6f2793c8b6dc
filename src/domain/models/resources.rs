//! Observed statuses and the mutable attribute set of a remote resource.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a site-side resource, as reported by the site agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceStatus {
    Booting,
    Running,
    Stopped,
    Deleted,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Booting => "Booting",
            ResourceStatus::Running => "Running",
            ResourceStatus::Stopped => "Stopped",
            ResourceStatus::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability of a machine inside the batch scheduler, as reported by the
/// batch-system agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineStatus {
    NotAvailable,
    Available,
    Draining,
    Drained,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MachineStatus::NotAvailable => "NotAvailable",
            MachineStatus::Available => "Available",
            MachineStatus::Draining => "Draining",
            MachineStatus::Drained => "Drained",
        };
        f.write_str(name)
    }
}

/// Mutable attribute set describing one remote resource.
///
/// Site queries return fresh attribute sets that are merged over the current
/// one. Site-specific fields the core does not interpret are carried in
/// `extra` and merged the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    /// Opaque site-side identifier, set once deployment succeeds.
    pub resource_id: Option<String>,
    /// Hostname the batch system addresses the machine by.
    pub dns_name: Option<String>,
    /// Last observed site-side status.
    pub resource_status: Option<ResourceStatus>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ResourceAttributes {
    /// Merge `update` over the current attributes. Fields absent from the
    /// update keep their current value.
    pub fn merge(&mut self, update: ResourceAttributes) {
        if update.resource_id.is_some() {
            self.resource_id = update.resource_id;
        }
        if update.dns_name.is_some() {
            self.dns_name = update.dns_name;
        }
        if update.resource_status.is_some() {
            self.resource_status = update.resource_status;
        }
        self.extra.extend(update.extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overwrites_present_fields_only() {
        let mut attributes = ResourceAttributes {
            resource_id: Some("r1".to_string()),
            dns_name: Some("h1".to_string()),
            resource_status: Some(ResourceStatus::Booting),
            extra: HashMap::from([("flavour".to_string(), json!("m1.small"))]),
        };

        attributes.merge(ResourceAttributes {
            resource_status: Some(ResourceStatus::Running),
            extra: HashMap::from([("ip".to_string(), json!("10.0.0.7"))]),
            ..Default::default()
        });

        assert_eq!(attributes.resource_id.as_deref(), Some("r1"));
        assert_eq!(attributes.dns_name.as_deref(), Some("h1"));
        assert_eq!(attributes.resource_status, Some(ResourceStatus::Running));
        assert_eq!(attributes.extra["flavour"], json!("m1.small"));
        assert_eq!(attributes.extra["ip"], json!("10.0.0.7"));
    }

    #[test]
    fn test_extra_fields_roundtrip_through_flatten() {
        let attributes = ResourceAttributes {
            resource_id: Some("r1".to_string()),
            dns_name: None,
            resource_status: Some(ResourceStatus::Stopped),
            extra: HashMap::from([("zone".to_string(), json!("eu-1"))]),
        };

        let value = serde_json::to_value(&attributes).unwrap();
        assert_eq!(value["zone"], json!("eu-1"));
        assert_eq!(value["resource_status"], json!("Stopped"));

        let back: ResourceAttributes = serde_json::from_value(value).unwrap();
        assert_eq!(back, attributes);
    }
}
