//! The single "now playing" record shared by every listener.

use super::error::RotationError;
use crate::catalog_store::Song;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub song: Song,
    /// Unix seconds.
    pub started_at: i64,
    pub promoted: bool,
}

/// Song and epoch that the latest advancement replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedPlay {
    pub epoch: u64,
    pub song_id: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSnapshot {
    pub epoch: u64,
    pub now_playing: Option<NowPlaying>,
    pub last_ended: Option<EndedPlay>,
}

impl StreamSnapshot {
    /// Seconds left in the current song, `None` when nothing plays.
    pub fn remaining_time(&self, now: i64) -> Option<i64> {
        self.now_playing
            .as_ref()
            .map(|np| np.song.duration_secs as i64 - (now - np.started_at))
    }

    /// Whether the stream needs a new song at `now`.
    pub fn needs_advance(&self, now: i64) -> bool {
        self.remaining_time(now).map_or(true, |remaining| remaining <= 0)
    }

    /// Whether `(epoch, song_id)` names what is playing right now.
    pub fn is_current(&self, epoch: u64, song_id: &str) -> bool {
        self.epoch == epoch
            && self
                .now_playing
                .as_ref()
                .is_some_and(|np| np.song.id == song_id)
    }
}

/// Readers take a shared lock and get a full copy, so they never see a new
/// song paired with an old epoch. Writers go through [`StreamState::advance`]
/// only, after winning [`StreamState::try_claim`] for the epoch.
pub struct StreamState {
    inner: RwLock<StreamSnapshot>,
    // Next epoch that may be claimed. Equals the current epoch while nobody
    // holds the claim, current + 1 while an advancement is in flight.
    claim: AtomicU64,
    // Bumped whenever a claim settles, by advance or by release.
    settled: watch::Sender<u64>,
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StreamSnapshot::default()),
            claim: AtomicU64::new(0),
            settled: watch::channel(0).0,
        }
    }

    /// Continues the epoch sequence of a previous run. Must be called before
    /// any advancement.
    pub fn resume_from(&self, epoch: u64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.epoch = epoch;
        inner.now_playing = None;
        inner.last_ended = None;
        self.claim.store(epoch, Ordering::SeqCst);
    }

    pub fn current(&self) -> StreamSnapshot {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn epoch(&self) -> u64 {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).epoch
    }

    pub fn remaining_time(&self, now: i64) -> Option<i64> {
        self.current().remaining_time(now)
    }

    /// Claims the right to advance past `epoch`. Exactly one caller wins per
    /// epoch; everybody else gets false.
    pub fn try_claim(&self, epoch: u64) -> bool {
        self.claim
            .compare_exchange(epoch, epoch + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Gives back a claim whose advancement did not happen.
    pub fn release_claim(&self, epoch: u64) {
        let released = self
            .claim
            .compare_exchange(epoch + 1, epoch, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if released {
            self.settled.send_modify(|n| *n += 1);
        }
    }

    /// Whether someone holds the claim past `epoch` and has not committed yet.
    pub fn is_advancing_past(&self, epoch: u64) -> bool {
        self.claim.load(Ordering::SeqCst) == epoch + 1 && self.epoch() == epoch
    }

    /// Waits until the advancement past `epoch`, if any, committed or gave
    /// its claim back.
    pub async fn settled_past(&self, epoch: u64) {
        let mut settled = self.settled.subscribe();
        while self.is_advancing_past(epoch) {
            if settled.changed().await.is_err() {
                return;
            }
        }
    }

    /// Makes `song` current at epoch `expected_epoch + 1`.
    pub fn advance(
        &self,
        expected_epoch: u64,
        song: Song,
        at: i64,
        promoted: bool,
    ) -> Result<StreamSnapshot, RotationError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.epoch != expected_epoch {
            return Err(RotationError::InvariantViolation(format!(
                "advance expected epoch {} but stream is at {}",
                expected_epoch, inner.epoch
            )));
        }
        if self.claim.load(Ordering::SeqCst) != expected_epoch + 1 {
            return Err(RotationError::InvariantViolation(format!(
                "advance past epoch {} without holding its claim",
                expected_epoch
            )));
        }

        inner.last_ended = inner.now_playing.take().map(|np| EndedPlay {
            epoch: expected_epoch,
            song_id: np.song.id,
        });
        inner.epoch = expected_epoch + 1;
        inner.now_playing = Some(NowPlaying {
            song,
            started_at: at,
            promoted,
        });
        let snapshot = inner.clone();
        drop(inner);

        self.settled.send_modify(|n| *n += 1);
        Ok(snapshot)
    }
}
