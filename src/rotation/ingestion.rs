//! Listener-facing operations: the current track, heartbeats and play
//! reports.

use super::error::RotationError;
use super::scheduler::{AdvanceTrigger, PlayOutcome, RotationScheduler};
use super::stream_state::StreamSnapshot;
use crate::catalog_store::Song;
use crate::server::metrics;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Last heartbeat time of every listener.
#[derive(Default)]
pub struct ListenerRegistry {
    last_seen: Mutex<HashMap<String, i64>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&self, listener_id: &str, at: i64) {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        let seen = last_seen.entry(listener_id.to_string()).or_insert(at);
        *seen = (*seen).max(at);
    }

    /// Forgets listeners not heard from since `now - timeout_secs`.
    pub fn sweep(&self, now: i64, timeout_secs: i64) -> usize {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        let before = last_seen.len();
        last_seen.retain(|_, seen| now - *seen <= timeout_secs);
        before - last_seen.len()
    }

    pub fn active_count(&self) -> usize {
        self.last_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentTrack {
    pub song: Song,
    pub started_at: i64,
    pub epoch: u64,
    pub remaining_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Ok,
    Stale { current_epoch: u64 },
}

pub struct RadioService {
    scheduler: Arc<RotationScheduler>,
    listeners: ListenerRegistry,
}

impl RadioService {
    pub fn new(scheduler: Arc<RotationScheduler>) -> Self {
        Self {
            scheduler,
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn scheduler(&self) -> &Arc<RotationScheduler> {
        &self.scheduler
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// What is playing now. Advances first if the current song ran out or
    /// nothing was ever started.
    pub async fn current_track(&self) -> Result<CurrentTrack, RotationError> {
        let now = self.scheduler.now();
        let mut snapshot = self.scheduler.stream().current();
        if snapshot.needs_advance(now) {
            self.scheduler
                .advance(snapshot.epoch, AdvanceTrigger::elapsed())
                .await?;
            snapshot = self.scheduler.stream().current();
        }
        Self::to_current_track(&snapshot, now).ok_or(RotationError::NoEligibleContent)
    }

    /// Liveness signal from a listener who believes `(epoch, song_id)` is on.
    pub async fn heartbeat(
        &self,
        listener_id: &str,
        epoch: u64,
        song_id: &str,
    ) -> Result<IngestStatus, RotationError> {
        let now = self.scheduler.now();
        let snapshot = self.scheduler.stream().current();
        if !snapshot.is_current(epoch, song_id) {
            debug!(
                "Stale heartbeat from {} for epoch {}, current is {}",
                listener_id, epoch, snapshot.epoch
            );
            metrics::record_stale("heartbeat");
            return Ok(IngestStatus::Stale {
                current_epoch: snapshot.epoch,
            });
        }

        self.listeners.touch(listener_id, now);
        if snapshot.needs_advance(now) {
            self.advance_quietly(snapshot.epoch, AdvanceTrigger::elapsed())
                .await?;
        }
        Ok(IngestStatus::Ok)
    }

    /// Terminal report for the song at `epoch`. The first report for the
    /// current epoch advances the stream, every later one is acknowledged
    /// without effect.
    pub async fn report_play_outcome(
        &self,
        listener_id: &str,
        epoch: u64,
        song_id: &str,
        outcome: PlayOutcome,
    ) -> Result<IngestStatus, RotationError> {
        let now = self.scheduler.now();
        let snapshot = self.scheduler.stream().current();

        if snapshot.is_current(epoch, song_id) {
            self.listeners.touch(listener_id, now);
            self.advance_quietly(epoch, AdvanceTrigger::reported(outcome, listener_id))
                .await?;
            return Ok(IngestStatus::Ok);
        }

        let just_ended = snapshot
            .last_ended
            .as_ref()
            .is_some_and(|ended| ended.epoch == epoch && ended.song_id == song_id);
        if just_ended {
            debug!(
                "Duplicate {} report from {} for epoch {}",
                outcome.as_str(),
                listener_id,
                epoch
            );
            self.listeners.touch(listener_id, now);
            return Ok(IngestStatus::Ok);
        }

        debug!(
            "Stale {} report from {} for epoch {}, current is {}",
            outcome.as_str(),
            listener_id,
            epoch,
            snapshot.epoch
        );
        metrics::record_stale("report");
        Ok(IngestStatus::Stale {
            current_epoch: snapshot.epoch,
        })
    }

    /// One pass of the central advancement check.
    pub async fn tick(&self) -> Result<(), RotationError> {
        let now = self.scheduler.now();
        let swept = self
            .listeners
            .sweep(now, self.scheduler.settings().listener_timeout_secs);
        if swept > 0 {
            debug!("Dropped {} silent listeners", swept);
        }
        metrics::set_active_listeners(self.listeners.active_count());

        let snapshot = self.scheduler.stream().current();
        if snapshot.needs_advance(now) {
            self.advance_quietly(snapshot.epoch, AdvanceTrigger::elapsed())
                .await?;
        }
        Ok(())
    }

    // Runs an advancement whose outcome the caller does not report back.
    // Nothing to play is expected while the catalog is empty.
    async fn advance_quietly(
        &self,
        epoch: u64,
        trigger: AdvanceTrigger,
    ) -> Result<(), RotationError> {
        match self.scheduler.advance(epoch, trigger).await {
            Ok(_) => Ok(()),
            Err(RotationError::NoEligibleContent) => {
                info!("Nothing to play after epoch {}", epoch);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn to_current_track(snapshot: &StreamSnapshot, now: i64) -> Option<CurrentTrack> {
        let remaining = snapshot.remaining_time(now)?;
        let np = snapshot.now_playing.as_ref()?;
        Some(CurrentTrack {
            song: np.song.clone(),
            started_at: np.started_at,
            epoch: snapshot.epoch,
            remaining_seconds: remaining.max(0),
        })
    }
}
