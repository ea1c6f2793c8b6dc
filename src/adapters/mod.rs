//! Adapters binding the domain ports to concrete backends.

pub mod batchsystem;
pub mod rest;
pub mod sqlite;
