//! Orchestration services: configuration, token handling, and the fleet.

pub mod auth;
pub mod config;
pub mod fleet;
pub mod lifecycle;

pub use auth::{AuthService, TokenData, Unauthorized};
pub use config::{Config, ConfigError};
pub use fleet::{DroneCommand, DroneHandle, FleetOrchestrator};
pub use lifecycle::{LifecycleConfig, StepError};
