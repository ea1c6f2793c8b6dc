//! Domain ports (interfaces) for the external collaborators.

pub mod batch_system_agent;
pub mod command_runner;
pub mod registry;
pub mod site_agent;

pub use batch_system_agent::BatchSystemAgent;
pub use command_runner::CommandRunner;
pub use registry::DroneRegistry;
pub use site_agent::SiteAgent;
