use super::error::RotationError;
use super::ingestion::RadioService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Spawns the central advancement check. The stream moves on when a song
/// runs out even if no listener asks for it.
pub fn spawn_advancement_ticker(
    service: Arc<RadioService>,
    interval: Duration,
    shutdown_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Advancement ticker started, checking every {:?}", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match service.tick().await {
                        Ok(()) => {}
                        Err(RotationError::InvariantViolation(msg)) => {
                            error!("Advancement check hit an invariant violation: {}", msg);
                        }
                        Err(e) => error!("Advancement check failed: {}", e),
                    }
                }
                _ = shutdown_token.cancelled() => {
                    info!("Advancement ticker received shutdown signal");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::InMemoryCatalogStore;
    use crate::config::RotationSettings;
    use crate::play_events::InMemoryPlayEventStore;
    use crate::rotation::clock::ManualClock;
    use crate::rotation::scheduler::RotationScheduler;

    #[tokio::test]
    async fn ticker_starts_the_stream_and_stops_on_cancel() {
        let catalog = InMemoryCatalogStore::new();
        catalog.insert_approved("a", "artist-a", 60);
        let scheduler = Arc::new(RotationScheduler::new(
            Arc::new(catalog),
            Arc::new(InMemoryPlayEventStore::new()),
            Arc::new(ManualClock::new(1_000)),
            RotationSettings::default(),
        ));
        let service = Arc::new(RadioService::new(scheduler.clone()));
        let token = CancellationToken::new();

        let handle =
            spawn_advancement_ticker(service, Duration::from_millis(10), token.clone());

        let mut started = false;
        for _ in 0..100 {
            if scheduler.stream().epoch() == 1 {
                started = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(started);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("ticker did not stop")
            .unwrap();
    }
}
