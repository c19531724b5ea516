//! Play log: the sink for rotation events and the source used to rebuild
//! fairness history after a restart.

mod models;
mod store;

pub use models::{PlayEvent, PlayEventKind};
pub use store::{InMemoryPlayEventStore, PlayEventStore, SqlitePlayEventStore};
