//! Aviary - Drone Lifecycle Orchestrator
//!
//! Provisions ephemeral compute resources ("drones") on remote sites and
//! integrates them into a batch scheduler:
//! - Per-drone state machine from provisioning through integration,
//!   utilization reporting, draining, and teardown
//! - Site and batch-system agent contracts
//! - Supply/demand reporting towards an upstream controller
//! - SQLite-backed drone registry
//! - Token-protected observability REST API

pub mod adapters;
pub mod domain;
pub mod services;
