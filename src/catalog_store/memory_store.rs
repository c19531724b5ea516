//! In-memory catalog store.
//!
//! Used by tests and by tooling that needs a throwaway catalog. Credit
//! balances are plain atomics updated with compare-and-swap.

use super::models::{CreditBalance, NewSong, Song, SongStatus};
use super::trait_def::CatalogStore;
use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct InMemoryCatalogStore {
    songs: RwLock<BTreeMap<String, Song>>,
    credits: RwLock<HashMap<String, Arc<AtomicI64>>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an already-approved song, handy for fixtures.
    pub fn insert_approved(&self, id: &str, artist_id: &str, duration_secs: u32) {
        let song = Song {
            id: id.to_string(),
            artist_id: artist_id.to_string(),
            title: format!("Song {}", id),
            audio_location: format!("audio/{}.mp3", id),
            artwork_location: None,
            duration_secs,
            status: SongStatus::Approved,
            approved_at: Some(0),
            suspended_until: None,
        };
        self.songs.write().unwrap().insert(id.to_string(), song);
    }

    fn credit_cell(&self, artist_id: &str) -> Option<Arc<AtomicI64>> {
        self.credits.read().unwrap().get(artist_id).cloned()
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn list_approved_songs(&self, now: i64) -> Result<Vec<Song>> {
        Ok(self
            .songs
            .read()
            .unwrap()
            .values()
            .filter(|song| song.is_eligible(now))
            .cloned()
            .collect())
    }

    fn get_credit_balance(&self, artist_id: &str) -> Result<CreditBalance> {
        let credits = self
            .credit_cell(artist_id)
            .map(|cell| cell.load(Ordering::SeqCst))
            .unwrap_or(0);
        Ok(CreditBalance { credits })
    }

    fn list_credit_balances(&self) -> Result<HashMap<String, i64>> {
        Ok(self
            .credits
            .read()
            .unwrap()
            .iter()
            .map(|(artist, cell)| (artist.clone(), cell.load(Ordering::SeqCst)))
            .filter(|(_, credits)| *credits > 0)
            .collect())
    }

    fn decrement_credit(&self, artist_id: &str) -> Result<bool> {
        let cell = match self.credit_cell(artist_id) {
            Some(cell) => cell,
            None => return Ok(false),
        };
        let mut current = cell.load(Ordering::SeqCst);
        loop {
            if current < 1 {
                return Ok(false);
            }
            match cell.compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Ok(true),
                Err(actual) => current = actual,
            }
        }
    }

    fn grant_credits(&self, artist_id: &str, amount: i64) -> Result<CreditBalance> {
        if amount <= 0 {
            bail!("Credit grants must be positive, got {}", amount);
        }
        let cell = self
            .credits
            .write()
            .unwrap()
            .entry(artist_id.to_string())
            .or_insert_with(|| Arc::new(AtomicI64::new(0)))
            .clone();
        let credits = cell.fetch_add(amount, Ordering::SeqCst) + amount;
        Ok(CreditBalance { credits })
    }

    fn add_song(&self, song: NewSong) -> Result<Song> {
        let mut songs = self.songs.write().unwrap();
        if songs.contains_key(&song.id) {
            bail!("Song already exists: {}", song.id);
        }
        let song = Song {
            id: song.id,
            artist_id: song.artist_id,
            title: song.title,
            audio_location: song.audio_location,
            artwork_location: song.artwork_location,
            duration_secs: song.duration_secs,
            status: SongStatus::Pending,
            approved_at: None,
            suspended_until: None,
        };
        songs.insert(song.id.clone(), song.clone());
        Ok(song)
    }

    fn get_song(&self, id: &str) -> Result<Option<Song>> {
        Ok(self.songs.read().unwrap().get(id).cloned())
    }

    fn set_song_status(&self, id: &str, status: SongStatus, at: i64) -> Result<()> {
        let mut songs = self.songs.write().unwrap();
        match songs.get_mut(id) {
            Some(song) => {
                song.status = status;
                song.approved_at = (status == SongStatus::Approved).then_some(at);
                Ok(())
            }
            None => bail!("Song not found: {}", id),
        }
    }

    fn suspend_song(&self, id: &str, until: Option<i64>) -> Result<()> {
        let mut songs = self.songs.write().unwrap();
        match songs.get_mut(id) {
            Some(song) => {
                song.suspended_until = until;
                Ok(())
            }
            None => bail!("Song not found: {}", id),
        }
    }

    fn list_songs(&self) -> Result<Vec<Song>> {
        Ok(self.songs.read().unwrap().values().cloned().collect())
    }
}
