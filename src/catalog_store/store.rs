//! SQLite-backed catalog store and credit ledger.

use super::models::*;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::trait_def::CatalogStore;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const SONG_COLUMNS: &str = "id, artist_id, title, audio_location, artwork_location, \
     duration_secs, status, approved_at, suspended_until";

/// SQLite-backed catalog store.
///
/// Writes go through a single connection; reads are spread over a small pool
/// of read-only connections so that rotation reads never queue behind ledger
/// writes.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn song_from_row(row: &Row) -> rusqlite::Result<Song> {
    let status: String = row.get(6)?;
    let status = status.parse::<SongStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;
    Ok(Song {
        id: row.get(0)?,
        artist_id: row.get(1)?,
        title: row.get(2)?,
        audio_location: row.get(3)?,
        artwork_location: row.get(4)?,
        duration_secs: row.get(5)?,
        status,
        approved_at: row.get(7)?,
        suspended_until: row.get(8)?,
    })
}

impl SqliteCatalogStore {
    /// Opens (and creates or migrates if needed) the catalog database.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of connections for concurrent reads
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open catalog database")?;

        migrate_if_needed(&mut write_conn, CATALOG_VERSIONED_SCHEMAS, "catalog")?;
        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let song_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM songs", [], |r| r.get(0))
            .unwrap_or(0);
        let approved_count: i64 = write_conn
            .query_row(
                "SELECT COUNT(*) FROM songs WHERE status = 'approved'",
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);
        info!(
            "Opened catalog: {} songs, {} approved",
            song_count, approved_count
        );

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteCatalogStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn query_songs(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Song>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(sql)?;
        let songs = stmt
            .query_map(params, song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn list_approved_songs(&self, now: i64) -> Result<Vec<Song>> {
        self.query_songs(
            &format!(
                "SELECT {} FROM songs WHERE status = 'approved' \
                 AND (suspended_until IS NULL OR suspended_until <= ?1) ORDER BY id",
                SONG_COLUMNS
            ),
            params![now],
        )
    }

    fn get_credit_balance(&self, artist_id: &str) -> Result<CreditBalance> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let credits: Option<i64> = conn
            .query_row(
                "SELECT credits FROM artist_credits WHERE artist_id = ?1",
                params![artist_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(CreditBalance {
            credits: credits.unwrap_or(0),
        })
    }

    fn list_credit_balances(&self) -> Result<HashMap<String, i64>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached("SELECT artist_id, credits FROM artist_credits WHERE credits > 0")?;
        let balances = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(balances)
    }

    fn decrement_credit(&self, artist_id: &str) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        // Conditional update is the compare-and-swap: it only matches while a credit is left.
        let updated = conn.execute(
            "UPDATE artist_credits SET credits = credits - 1, \
             updated = cast(strftime('%s','now') as int) \
             WHERE artist_id = ?1 AND credits >= 1",
            params![artist_id],
        )?;
        debug!("decrement_credit({}) -> {}", artist_id, updated == 1);
        Ok(updated == 1)
    }

    fn grant_credits(&self, artist_id: &str, amount: i64) -> Result<CreditBalance> {
        if amount <= 0 {
            bail!("Credit grants must be positive, got {}", amount);
        }
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO artist_credits (artist_id, credits) VALUES (?1, ?2) \
             ON CONFLICT(artist_id) DO UPDATE SET credits = credits + excluded.credits, \
             updated = cast(strftime('%s','now') as int)",
            params![artist_id, amount],
        )?;
        let credits: i64 = tx.query_row(
            "SELECT credits FROM artist_credits WHERE artist_id = ?1",
            params![artist_id],
            |r| r.get(0),
        )?;
        tx.commit()?;
        Ok(CreditBalance { credits })
    }

    fn add_song(&self, song: NewSong) -> Result<Song> {
        if song.duration_secs == 0 {
            bail!("Song {} must have a positive duration", song.id);
        }
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO songs (id, artist_id, title, audio_location, artwork_location, duration_secs) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                song.id,
                song.artist_id,
                song.title,
                song.audio_location,
                song.artwork_location,
                song.duration_secs
            ],
        )
        .with_context(|| format!("Failed to insert song {}", song.id))?;
        Ok(Song {
            id: song.id,
            artist_id: song.artist_id,
            title: song.title,
            audio_location: song.audio_location,
            artwork_location: song.artwork_location,
            duration_secs: song.duration_secs,
            status: SongStatus::Pending,
            approved_at: None,
            suspended_until: None,
        })
    }

    fn get_song(&self, id: &str) -> Result<Option<Song>> {
        Ok(self
            .query_songs(
                &format!("SELECT {} FROM songs WHERE id = ?1", SONG_COLUMNS),
                params![id],
            )?
            .into_iter()
            .next())
    }

    fn set_song_status(&self, id: &str, status: SongStatus, at: i64) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        let approved_at = match status {
            SongStatus::Approved => Some(at),
            _ => None,
        };
        let updated = conn.execute(
            "UPDATE songs SET status = ?1, approved_at = ?2 WHERE id = ?3",
            params![status.as_str(), approved_at, id],
        )?;
        if updated == 0 {
            bail!("Song not found: {}", id);
        }
        Ok(())
    }

    fn suspend_song(&self, id: &str, until: Option<i64>) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE songs SET suspended_until = ?1 WHERE id = ?2",
            params![until, id],
        )?;
        if updated == 0 {
            bail!("Song not found: {}", id);
        }
        Ok(())
    }

    fn list_songs(&self) -> Result<Vec<Song>> {
        self.query_songs(
            &format!("SELECT {} FROM songs ORDER BY id", SONG_COLUMNS),
            [],
        )
    }
}
