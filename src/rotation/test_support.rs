//! Store wrappers that misbehave on purpose.

use crate::catalog_store::{
    CatalogStore, CreditBalance, InMemoryCatalogStore, NewSong, Song, SongStatus,
};
use crate::play_events::{PlayEvent, PlayEventStore};
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Catalog whose song listing is slow and fails a given number of times.
pub struct FlakyCatalog {
    pub inner: InMemoryCatalogStore,
    pub read_delay: Duration,
    pub failing_reads: AtomicUsize,
    pub reads: AtomicUsize,
}

impl FlakyCatalog {
    pub fn new(inner: InMemoryCatalogStore) -> Self {
        Self {
            inner,
            read_delay: Duration::ZERO,
            failing_reads: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn failing(self, reads: usize) -> Self {
        self.failing_reads.store(reads, Ordering::SeqCst);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl CatalogStore for FlakyCatalog {
    fn list_approved_songs(&self, now: i64) -> Result<Vec<Song>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
        let should_fail = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            bail!("catalog database is locked");
        }
        self.inner.list_approved_songs(now)
    }
    fn get_credit_balance(&self, artist_id: &str) -> Result<CreditBalance> {
        self.inner.get_credit_balance(artist_id)
    }
    fn list_credit_balances(&self) -> Result<HashMap<String, i64>> {
        self.inner.list_credit_balances()
    }
    fn decrement_credit(&self, artist_id: &str) -> Result<bool> {
        self.inner.decrement_credit(artist_id)
    }
    fn grant_credits(&self, artist_id: &str, amount: i64) -> Result<CreditBalance> {
        self.inner.grant_credits(artist_id, amount)
    }
    fn add_song(&self, song: NewSong) -> Result<Song> {
        self.inner.add_song(song)
    }
    fn get_song(&self, id: &str) -> Result<Option<Song>> {
        self.inner.get_song(id)
    }
    fn set_song_status(&self, id: &str, status: SongStatus, at: i64) -> Result<()> {
        self.inner.set_song_status(id, status, at)
    }
    fn suspend_song(&self, id: &str, until: Option<i64>) -> Result<()> {
        self.inner.suspend_song(id, until)
    }
    fn list_songs(&self) -> Result<Vec<Song>> {
        self.inner.list_songs()
    }
}

/// Play log that refuses every write.
#[derive(Default)]
pub struct BrokenPlayEventStore;

impl PlayEventStore for BrokenPlayEventStore {
    fn record(&self, _event: &PlayEvent) -> Result<()> {
        bail!("disk full")
    }
    fn load_since(&self, _since: i64) -> Result<Vec<PlayEvent>> {
        Ok(Vec::new())
    }
    fn last_epoch(&self) -> Result<u64> {
        Ok(0)
    }
    fn prune_older_than(&self, _cutoff: i64) -> Result<usize> {
        Ok(0)
    }
}
