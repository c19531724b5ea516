use axum::extract::FromRef;

use crate::rotation::RadioService;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedRadioService = Arc<RadioService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub radio: GuardedRadioService,
    pub hash: String,
}

impl ServerState {
    pub fn new(config: ServerConfig, radio: GuardedRadioService) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            radio,
            hash: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

impl FromRef<ServerState> for GuardedRadioService {
    fn from_ref(input: &ServerState) -> Self {
        input.radio.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
