//! Batch-system adapters.

pub mod executor;
pub mod slurm;

pub use executor::ShellCommandRunner;
pub use slurm::SlurmBatchSystemAgent;
