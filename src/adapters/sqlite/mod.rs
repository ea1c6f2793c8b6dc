//! SQLite database adapters.

pub mod registry;

pub use registry::SqliteRegistry;
