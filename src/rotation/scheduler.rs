//! Chooses and commits the next song.
//!
//! Advancement past an epoch is claimed with a compare-and-swap on the stream
//! state; the winner runs selection and commit on its own task so a dropped
//! request cannot leave a half-applied commit behind. Losers wait until the
//! winner committed or gave up, so a re-read sees the new state.

use super::catalog_view::CatalogView;
use super::clock::Clock;
use super::error::RotationError;
use super::fairness::FairnessTracker;
use super::selection::{select_next, Selection, SelectionKind, SelectionRequest};
use super::stream_state::{StreamSnapshot, StreamState};
use crate::catalog_store::CatalogStore;
use crate::config::RotationSettings;
use crate::play_events::{PlayEvent, PlayEventKind, PlayEventStore};
use crate::server::metrics;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// How the outgoing song ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayOutcome {
    Completed,
    Skipped,
}

impl PlayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayOutcome::Completed => "completed",
            PlayOutcome::Skipped => "skipped",
        }
    }

    fn event_kind(&self) -> PlayEventKind {
        match self {
            PlayOutcome::Completed => PlayEventKind::Completed,
            PlayOutcome::Skipped => PlayEventKind::Skipped,
        }
    }
}

/// What caused an advancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceTrigger {
    pub outcome: PlayOutcome,
    pub listener_id: Option<String>,
}

impl AdvanceTrigger {
    /// The current song ran out of time.
    pub fn elapsed() -> Self {
        Self {
            outcome: PlayOutcome::Completed,
            listener_id: None,
        }
    }

    pub fn reported(outcome: PlayOutcome, listener_id: &str) -> Self {
        Self {
            outcome,
            listener_id: Some(listener_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceResult {
    /// This call committed the advancement.
    Advanced(StreamSnapshot),
    /// Someone else advanced past this epoch, or tried and gave up. The
    /// attempt has settled by the time this is returned.
    AlreadyClaimed,
}

pub struct RotationScheduler {
    catalog: Arc<dyn CatalogStore>,
    play_events: Arc<dyn PlayEventStore>,
    clock: Arc<dyn Clock>,
    settings: RotationSettings,
    stream: StreamState,
    fairness: Mutex<FairnessTracker>,
    rng: Mutex<StdRng>,
}

impl RotationScheduler {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        play_events: Arc<dyn PlayEventStore>,
        clock: Arc<dyn Clock>,
        settings: RotationSettings,
    ) -> Self {
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            catalog,
            play_events,
            clock,
            fairness: Mutex::new(FairnessTracker::new(settings.fairness_window_secs)),
            settings,
            stream: StreamState::new(),
            rng: Mutex::new(rng),
        }
    }

    /// Restores fairness history and the epoch sequence from the play log.
    pub fn restore(&self) -> Result<()> {
        let now = self.clock.now();
        let events = self
            .play_events
            .load_since(now - self.settings.fairness_window_secs)?;
        let last_epoch = self.play_events.last_epoch()?;

        let tracker = FairnessTracker::rebuild(self.settings.fairness_window_secs, &events, now);
        *self.fairness.lock().unwrap_or_else(|e| e.into_inner()) = tracker;
        self.stream.resume_from(last_epoch);

        info!(
            "Restored rotation from {} play events, resuming after epoch {}",
            events.len(),
            last_epoch
        );
        Ok(())
    }

    pub fn stream(&self) -> &StreamState {
        &self.stream
    }

    pub fn settings(&self) -> &RotationSettings {
        &self.settings
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn last_played_at(&self, song_id: &str) -> Option<i64> {
        self.fairness
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_played_at(song_id)
    }

    /// Advances past `expected_epoch` if nobody else already does.
    pub async fn advance(
        self: &Arc<Self>,
        expected_epoch: u64,
        trigger: AdvanceTrigger,
    ) -> Result<AdvanceResult, RotationError> {
        if !self.stream.try_claim(expected_epoch) {
            debug!("Advancement past epoch {} already claimed", expected_epoch);
            self.stream.settled_past(expected_epoch).await;
            return Ok(AdvanceResult::AlreadyClaimed);
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = this.select_and_commit(expected_epoch, &trigger).await;
            if result.is_err() {
                this.stream.release_claim(expected_epoch);
            }
            result
        });

        match handle.await {
            Ok(result) => result.map(AdvanceResult::Advanced),
            Err(e) => {
                self.stream.release_claim(expected_epoch);
                metrics::record_invariant_violation();
                error!("Advancement task for epoch {} died: {}", expected_epoch, e);
                Err(RotationError::InvariantViolation(format!(
                    "advancement task failed: {}",
                    e
                )))
            }
        }
    }

    async fn select_and_commit(
        &self,
        expected_epoch: u64,
        trigger: &AdvanceTrigger,
    ) -> Result<StreamSnapshot, RotationError> {
        let started = Instant::now();
        let now = self.clock.now();

        let outgoing = self.stream.current();
        if outgoing.epoch != expected_epoch {
            return Err(self.invariant_violation(format!(
                "claimed epoch {} but stream is at {}",
                expected_epoch, outgoing.epoch
            )));
        }

        let mut view = match self.load_catalog_view(now).await {
            Ok(view) => view,
            Err(e) => {
                metrics::record_no_content();
                return Err(e);
            }
        };
        metrics::set_eligible_songs(view.songs().len());

        let mut fairness = self
            .fairness
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .window_snapshot(now);
        if let (Some(np), PlayOutcome::Skipped) = (&outgoing.now_playing, trigger.outcome) {
            fairness.note_skip(&np.song.id);
        }

        let mut exclude = HashSet::new();
        let mut credits_allowed = true;
        let mut races = 0;
        let selection = loop {
            let selection = {
                let request = SelectionRequest {
                    view: &view,
                    fairness: &fairness,
                    settings: &self.settings,
                    now,
                    exclude: &exclude,
                    credits_allowed,
                };
                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                select_next(&request, &mut *rng)?
            };
            if selection.kind != SelectionKind::Promoted {
                break selection;
            }

            match self.consume_credit(&selection.song.artist_id).await {
                Ok(true) => break selection,
                Ok(false) => {
                    metrics::record_credit_race();
                    races += 1;
                    debug!(
                        "Artist {} ran out of credits while selecting {}, reselecting",
                        selection.song.artist_id, selection.song.id
                    );
                    exclude.insert(selection.song.id.clone());
                    view.exhaust_artist(&selection.song.artist_id);
                    if races > self.settings.max_credit_retries {
                        metrics::record_ledger_fallback("retries_exhausted");
                        warn!(
                            "Credit retries exhausted after {} races, selecting organically",
                            races
                        );
                        credits_allowed = false;
                    }
                }
                Err(e) => {
                    metrics::record_ledger_fallback("ledger_unavailable");
                    warn!("{}, selecting organically", e);
                    credits_allowed = false;
                }
            }
        };

        let snapshot = self.commit(expected_epoch, &outgoing, &selection, trigger.outcome, now)?;
        self.record_events(&outgoing, &snapshot, trigger, now).await;

        let kind = selection.kind.as_str();
        metrics::record_advance(
            kind,
            trigger.outcome.as_str(),
            snapshot.epoch,
            started.elapsed(),
        );
        info!(
            "Epoch {}: now playing {} ({}) after {}",
            snapshot.epoch,
            selection.song.id,
            kind,
            trigger.outcome.as_str()
        );
        Ok(snapshot)
    }

    // Stream state and fairness change together or not at all.
    fn commit(
        &self,
        expected_epoch: u64,
        outgoing: &StreamSnapshot,
        selection: &Selection,
        outcome: PlayOutcome,
        now: i64,
    ) -> Result<StreamSnapshot, RotationError> {
        let mut tracker = self.fairness.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.stream.current();
        if current.epoch != expected_epoch || current.now_playing != outgoing.now_playing {
            return Err(self.invariant_violation(format!(
                "stream moved from epoch {} to {} during selection",
                expected_epoch, current.epoch
            )));
        }

        if let Some(np) = &outgoing.now_playing {
            match outcome {
                PlayOutcome::Completed => tracker.record_play(&np.song.id, now),
                PlayOutcome::Skipped => tracker.record_skip(&np.song.id, now),
            }
        }
        tracker.record_started(&selection.song.id, now);

        self.stream
            .advance(
                expected_epoch,
                selection.song.clone(),
                now,
                selection.kind == SelectionKind::Promoted,
            )
            .map_err(|e| self.invariant_violation(e.to_string()))
    }

    // Best-effort: the commit already happened and stays. A lost `Started`
    // row lets a restart reuse its epoch, so that one counts as a violation.
    async fn record_events(
        &self,
        outgoing: &StreamSnapshot,
        snapshot: &StreamSnapshot,
        trigger: &AdvanceTrigger,
        now: i64,
    ) {
        let mut events = Vec::with_capacity(2);
        if let Some(np) = &outgoing.now_playing {
            events.push(PlayEvent {
                epoch: outgoing.epoch,
                song_id: np.song.id.clone(),
                kind: trigger.outcome.event_kind(),
                promoted: np.promoted,
                listener_id: trigger.listener_id.clone(),
                at: now,
            });
        }
        if let Some(np) = &snapshot.now_playing {
            events.push(PlayEvent {
                epoch: snapshot.epoch,
                song_id: np.song.id.clone(),
                kind: PlayEventKind::Started,
                promoted: np.promoted,
                listener_id: None,
                at: now,
            });
        }

        let play_events = Arc::clone(&self.play_events);
        let write = tokio::task::spawn_blocking(move || {
            events
                .into_iter()
                .filter_map(|event| play_events.record(&event).err().map(|e| (event, e)))
                .collect::<Vec<_>>()
        });
        let failures = match write.await {
            Ok(failures) => failures,
            Err(join_error) => {
                error!(
                    "Play event write for epoch {} died: {}",
                    snapshot.epoch, join_error
                );
                metrics::record_invariant_violation();
                return;
            }
        };

        for (event, e) in failures {
            error!(
                "Failed to record {} event for epoch {}: {}",
                event.kind, event.epoch, e
            );
            if event.kind == PlayEventKind::Started {
                metrics::record_invariant_violation();
            }
        }
    }

    /// Reads the catalog with a timeout, retrying once after a backoff.
    async fn load_catalog_view(&self, now: i64) -> Result<CatalogView, RotationError> {
        let mut last_error = None;
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(self.settings.catalog_retry_backoff()).await;
            }
            match self.try_load_catalog_view(now).await {
                Ok(view) if view.is_empty() => {
                    info!("No eligible songs in the catalog");
                    return Err(RotationError::NoEligibleContent);
                }
                Ok(view) => return Ok(view),
                Err(e) => {
                    warn!("Catalog read attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }
        if let Some(e) = last_error {
            error!("Giving up on catalog read: {}", e);
        }
        Err(RotationError::NoEligibleContent)
    }

    async fn try_load_catalog_view(&self, now: i64) -> Result<CatalogView, RotationError> {
        let catalog = Arc::clone(&self.catalog);
        let read = tokio::task::spawn_blocking(move || CatalogView::load(catalog.as_ref(), now));
        match tokio::time::timeout(self.settings.catalog_timeout(), read).await {
            Err(_) => Err(RotationError::Catalog(anyhow::anyhow!(
                "timed out after {:?}",
                self.settings.catalog_timeout()
            ))),
            Ok(Err(join_error)) => Err(RotationError::Catalog(join_error.into())),
            Ok(Ok(result)) => result.map_err(RotationError::Catalog),
        }
    }

    async fn consume_credit(&self, artist_id: &str) -> Result<bool, RotationError> {
        let catalog = Arc::clone(&self.catalog);
        let artist = artist_id.to_string();
        let decrement = tokio::task::spawn_blocking(move || catalog.decrement_credit(&artist));
        match tokio::time::timeout(self.settings.ledger_timeout(), decrement).await {
            Err(_) => Err(RotationError::LedgerUnavailable(format!(
                "decrement for {} timed out after {:?}",
                artist_id,
                self.settings.ledger_timeout()
            ))),
            Ok(Err(join_error)) => Err(RotationError::LedgerUnavailable(join_error.to_string())),
            Ok(Ok(result)) => result.map_err(|e| RotationError::LedgerUnavailable(e.to_string())),
        }
    }

    fn invariant_violation(&self, message: String) -> RotationError {
        metrics::record_invariant_violation();
        error!("Rotation invariant violated: {}", message);
        RotationError::InvariantViolation(message)
    }
}
