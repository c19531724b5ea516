pub mod config;
mod http_layers;
mod listener;
pub mod metrics;
mod radio_routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use listener::{Listener, HEADER_LISTENER_ID_KEY};
pub use radio_routes::{CurrentTrackResponse, IngestResponse};
pub use server::{make_app, run_server};
