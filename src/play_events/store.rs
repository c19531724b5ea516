//! Append-only play log persisted in SQLite.

use super::models::{PlayEvent, PlayEventKind};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    migrate_if_needed, Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Sink and source of play events.
pub trait PlayEventStore: Send + Sync {
    fn record(&self, event: &PlayEvent) -> Result<()>;

    /// Events at or after `since`, oldest first.
    fn load_since(&self, since: i64) -> Result<Vec<PlayEvent>>;

    /// Highest epoch ever recorded, 0 on an empty log.
    fn last_epoch(&self) -> Result<u64>;

    /// Deletes events older than `cutoff`, returning how many were removed.
    /// The event carrying the highest epoch is always kept.
    fn prune_older_than(&self, cutoff: i64) -> Result<usize>;
}

const PLAY_EVENTS_TABLE: Table = Table {
    name: "play_events",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("epoch", &SqlType::Integer, non_null = true),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
        sqlite_column!("kind", &SqlType::Text, non_null = true),
        sqlite_column!(
            "promoted",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("listener_id", &SqlType::Text),
        sqlite_column!("at", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_play_events_at", "at"),
        ("idx_play_events_epoch", "epoch"),
    ],
    unique_constraints: &[],
};

const PLAY_EVENTS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[PLAY_EVENTS_TABLE],
    migration: None,
}];

#[derive(Clone)]
pub struct SqlitePlayEventStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePlayEventStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref()).with_context(|| {
            format!("Failed to open play events database {:?}", db_path.as_ref())
        })?;
        migrate_if_needed(&mut conn, PLAY_EVENTS_VERSIONED_SCHEMAS, "play events")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM play_events", [], |r| r.get(0))
            .unwrap_or(0);
        info!("Opened play log with {} events", count);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl PlayEventStore for SqlitePlayEventStore {
    fn record(&self, event: &PlayEvent) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO play_events (epoch, song_id, kind, promoted, listener_id, at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.epoch as i64,
                event.song_id,
                event.kind.as_str(),
                event.promoted,
                event.listener_id,
                event.at
            ],
        )?;
        Ok(())
    }

    fn load_since(&self, since: i64) -> Result<Vec<PlayEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT epoch, song_id, kind, promoted, listener_id, at FROM play_events \
             WHERE at >= ?1 ORDER BY at, id",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (epoch, song_id, kind, promoted, listener_id, at) = row?;
            events.push(PlayEvent {
                epoch: epoch as u64,
                song_id,
                kind: kind.parse::<PlayEventKind>()?,
                promoted,
                listener_id,
                at,
            });
        }
        Ok(events)
    }

    fn last_epoch(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let epoch: Option<i64> =
            conn.query_row("SELECT MAX(epoch) FROM play_events", [], |r| r.get(0))?;
        Ok(epoch.unwrap_or(0) as u64)
    }

    fn prune_older_than(&self, cutoff: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM play_events WHERE at < ?1 \
             AND id <> (SELECT id FROM play_events ORDER BY epoch DESC, id DESC LIMIT 1)",
            params![cutoff],
        )?;
        Ok(deleted)
    }
}

/// Play log kept in memory, for tests.
#[derive(Default)]
pub struct InMemoryPlayEventStore {
    events: Mutex<Vec<PlayEvent>>,
}

impl InMemoryPlayEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlayEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl PlayEventStore for InMemoryPlayEventStore {
    fn record(&self, event: &PlayEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn load_since(&self, since: i64) -> Result<Vec<PlayEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.at >= since)
            .cloned()
            .collect())
    }

    fn last_epoch(&self) -> Result<u64> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.epoch)
            .max()
            .unwrap_or(0))
    }

    fn prune_older_than(&self, cutoff: i64) -> Result<usize> {
        let mut events = self.events.lock().unwrap();
        let last_epoch = events.iter().map(|e| e.epoch).max().unwrap_or(0);
        let before = events.len();
        events.retain(|e| e.at >= cutoff || e.epoch == last_epoch);
        Ok(before - events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event(epoch: u64, song_id: &str, kind: PlayEventKind, at: i64) -> PlayEvent {
        PlayEvent {
            epoch,
            song_id: song_id.to_string(),
            kind,
            promoted: false,
            listener_id: None,
            at,
        }
    }

    #[test]
    fn records_and_loads_events_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqlitePlayEventStore::new(temp_dir.path().join("plays.db")).unwrap();

        store.record(&event(1, "a", PlayEventKind::Started, 100)).unwrap();
        store
            .record(&PlayEvent {
                listener_id: Some("listener-1".to_string()),
                ..event(1, "a", PlayEventKind::Skipped, 150)
            })
            .unwrap();
        store.record(&event(2, "b", PlayEventKind::Started, 150)).unwrap();

        let events = store.load_since(120).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, PlayEventKind::Skipped);
        assert_eq!(events[0].listener_id.as_deref(), Some("listener-1"));
        assert_eq!(events[1].song_id, "b");
        assert_eq!(store.last_epoch().unwrap(), 2);
    }

    #[test]
    fn empty_log_has_epoch_zero() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqlitePlayEventStore::new(temp_dir.path().join("plays.db")).unwrap();
        assert_eq!(store.last_epoch().unwrap(), 0);
    }

    #[test]
    fn pruning_keeps_the_latest_epoch() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqlitePlayEventStore::new(temp_dir.path().join("plays.db")).unwrap();
        store.record(&event(1, "a", PlayEventKind::Started, 10)).unwrap();
        store.record(&event(2, "b", PlayEventKind::Started, 20)).unwrap();

        let deleted = store.prune_older_than(1_000).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.last_epoch().unwrap(), 2);
    }

    #[test]
    fn in_memory_store_behaves_like_sqlite() {
        let store = InMemoryPlayEventStore::new();
        store.record(&event(1, "a", PlayEventKind::Started, 10)).unwrap();
        store.record(&event(2, "b", PlayEventKind::Started, 20)).unwrap();

        assert_eq!(store.prune_older_than(1_000).unwrap(), 1);
        assert_eq!(store.last_epoch().unwrap(), 2);
        assert_eq!(store.load_since(0).unwrap().len(), 1);
    }
}
