//! Test fixture creation
//!
//! Builds a temporary SQLite catalog seeded with the songs and credits
//! described in constants.rs.

use super::constants::*;
use anyhow::Result;
use radio_rotation_server::catalog_store::{
    CatalogStore, NewSong, SongStatus, SqliteCatalogStore,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn new_song(id: &str, artist_id: &str) -> NewSong {
    NewSong {
        id: id.to_string(),
        artist_id: artist_id.to_string(),
        title: format!("Title of {}", id),
        audio_location: format!("audio/{}.mp3", id),
        artwork_location: Some(format!("artwork/{}.jpg", id)),
        duration_secs: SONG_DURATION_SECS,
    }
}

/// Creates a temporary directory holding a seeded `catalog.db`.
///
/// Returns the directory (keep it alive for the test's duration) and the
/// database path.
pub fn create_test_catalog() -> Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("catalog.db");
    let store = SqliteCatalogStore::new(&db_path, 1)?;

    for (id, artist_id) in [
        (SONG_PROMOTED_ID, PROMOTED_ARTIST_ID),
        (SONG_ORGANIC_1_ID, ORGANIC_ARTIST_ID),
        (SONG_ORGANIC_2_ID, ORGANIC_ARTIST_ID),
        (SONG_SUSPENDED_ID, ORGANIC_ARTIST_ID),
    ] {
        store.add_song(new_song(id, artist_id))?;
        store.set_song_status(id, SongStatus::Approved, 0)?;
    }
    store.add_song(new_song(SONG_PENDING_ID, PROMOTED_ARTIST_ID))?;
    store.suspend_song(SONG_SUSPENDED_ID, Some(i64::MAX))?;
    store.grant_credits(PROMOTED_ARTIST_ID, PROMOTED_ARTIST_CREDITS)?;

    Ok((temp_dir, db_path))
}

/// Creates a temporary directory with an empty `catalog.db`.
pub fn create_empty_catalog() -> Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("catalog.db");
    SqliteCatalogStore::new(&db_path, 1)?;
    Ok((temp_dir, db_path))
}
