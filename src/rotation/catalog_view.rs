use crate::catalog_store::{CatalogStore, Song};
use anyhow::Result;
use std::collections::HashMap;

/// Read-only snapshot of the songs eligible at one instant, with their
/// artists' credit balances.
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    songs: Vec<Song>,
    credits: HashMap<String, i64>,
}

impl CatalogView {
    pub fn new(songs: Vec<Song>, credits: HashMap<String, i64>) -> Self {
        Self { songs, credits }
    }

    pub fn load(catalog: &dyn CatalogStore, now: i64) -> Result<Self> {
        let songs = catalog.list_approved_songs(now)?;
        let credits = catalog.list_credit_balances()?;
        Ok(Self::new(songs, credits))
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn contains(&self, song_id: &str) -> bool {
        self.songs.iter().any(|s| s.id == song_id)
    }

    pub fn credits_of(&self, artist_id: &str) -> i64 {
        self.credits.get(artist_id).copied().unwrap_or(0).max(0)
    }

    /// Forgets an artist's balance after the ledger refused a decrement.
    pub fn exhaust_artist(&mut self, artist_id: &str) {
        self.credits.remove(artist_id);
    }
}
