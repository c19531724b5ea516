//! Radio Rotation Server Library
//!
//! This library exposes the internal modules for testing and for the binaries.

pub mod catalog_store;
pub mod config;
pub mod play_events;
pub mod rotation;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use catalog_store::{CatalogStore, SqliteCatalogStore};
pub use play_events::{PlayEventStore, SqlitePlayEventStore};
pub use rotation::{RadioService, RotationScheduler};
pub use server::{run_server, RequestsLoggingLevel};
