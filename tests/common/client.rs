//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and provides methods for all radio endpoints.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

const LISTENER_HEADER: &str = "X-Listener-Id";

/// HTTP test client acting as one listener
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Sent in the listener header, `None` sends no header at all
    pub listener_id: Option<String>,
}

impl TestClient {
    pub fn new(base_url: String, listener_id: &str) -> Self {
        Self {
            client: Self::build_client(),
            base_url,
            listener_id: Some(listener_id.to_string()),
        }
    }

    /// Client that never identifies itself
    pub fn anonymous(base_url: String) -> Self {
        Self {
            client: Self::build_client(),
            base_url,
            listener_id: None,
        }
    }

    fn build_client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client")
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(format!("{}{}", self.base_url, path));
        match &self.listener_id {
            Some(id) => builder.header(LISTENER_HEADER, id),
            None => builder,
        }
    }

    // ========================================================================
    // Radio Endpoints
    // ========================================================================

    /// GET /
    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// GET /v1/radio/current
    pub async fn get_current(&self) -> Response {
        self.client
            .get(format!("{}/v1/radio/current", self.base_url))
            .send()
            .await
            .expect("Current track request failed")
    }

    /// POST /v1/radio/heartbeat
    pub async fn heartbeat(&self, epoch: u64, song_id: &str) -> Response {
        self.post("/v1/radio/heartbeat")
            .json(&json!({ "epoch": epoch, "song_id": song_id }))
            .send()
            .await
            .expect("Heartbeat request failed")
    }

    /// POST /v1/radio/report
    pub async fn report(&self, epoch: u64, song_id: &str, outcome: &str) -> Response {
        self.post("/v1/radio/report")
            .json(&json!({ "epoch": epoch, "song_id": song_id, "outcome": outcome }))
            .send()
            .await
            .expect("Report request failed")
    }
}
