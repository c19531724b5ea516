//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own catalog and play log.

use super::constants::*;
use super::fixtures::{create_empty_catalog, create_test_catalog};
use radio_rotation_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use radio_rotation_server::config::RotationSettings;
use radio_rotation_server::play_events::{PlayEventStore, SqlitePlayEventStore};
use radio_rotation_server::rotation::{RadioService, RotationScheduler, SystemClock};
use radio_rotation_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with isolated catalog and play log
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Catalog store for direct database access in tests
    pub catalog_store: Arc<SqliteCatalogStore>,

    /// Play log for direct database access in tests
    pub play_events: Arc<SqlitePlayEventStore>,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server over the seeded test catalog on a random port
    pub async fn spawn() -> Self {
        let (temp_dir, db_path) = create_test_catalog().expect("Failed to create test catalog");
        Self::spawn_with(temp_dir, db_path).await
    }

    /// Spawns a server whose catalog has no songs
    pub async fn spawn_empty() -> Self {
        let (temp_dir, db_path) = create_empty_catalog().expect("Failed to create test catalog");
        Self::spawn_with(temp_dir, db_path).await
    }

    async fn spawn_with(temp_dir: TempDir, catalog_db_path: PathBuf) -> Self {
        let catalog_store = Arc::new(
            SqliteCatalogStore::new(&catalog_db_path, 2).expect("Failed to open catalog store"),
        );
        let play_events = Arc::new(
            SqlitePlayEventStore::new(temp_dir.path().join("play_events.db"))
                .expect("Failed to open play events store"),
        );

        let scheduler = Arc::new(RotationScheduler::new(
            catalog_store.clone() as Arc<dyn CatalogStore>,
            play_events.clone() as Arc<dyn PlayEventStore>,
            Arc::new(SystemClock),
            RotationSettings {
                rng_seed: Some(2024),
                ..Default::default()
            },
        ));
        scheduler.restore().expect("Failed to restore rotation");
        let radio = Arc::new(RadioService::new(scheduler));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            metrics_port: 0,
            requests_logging_level: RequestsLoggingLevel::None,
        };
        let app = make_app(config, radio);

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            catalog_store,
            play_events,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
