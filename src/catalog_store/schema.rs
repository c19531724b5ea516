//! SQLite schema definitions for the song catalog and credit ledger.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};
use anyhow::Result;
use rusqlite::Connection;

/// Songs submitted by artists.
const SONGS_TABLE_V_0: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("audio_location", &SqlType::Text, non_null = true),
        sqlite_column!("artwork_location", &SqlType::Text),
        sqlite_column!("duration_secs", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'pending'")
        ), // 'pending', 'approved', 'rejected'
        sqlite_column!("approved_at", &SqlType::Integer),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_songs_id", "id"),
        ("idx_songs_artist", "artist_id"),
        ("idx_songs_status", "status"),
    ],
    unique_constraints: &[&["id"]],
};

/// V1 adds temporary suspensions.
const SONGS_TABLE_V_1: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("audio_location", &SqlType::Text, non_null = true),
        sqlite_column!("artwork_location", &SqlType::Text),
        sqlite_column!("duration_secs", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'pending'")
        ),
        sqlite_column!("approved_at", &SqlType::Integer),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("suspended_until", &SqlType::Integer),
    ],
    indices: &[
        ("idx_songs_id", "id"),
        ("idx_songs_artist", "artist_id"),
        ("idx_songs_status", "status"),
    ],
    unique_constraints: &[&["id"]],
};

/// Per-artist promotional credits.
const ARTIST_CREDITS_TABLE: Table = Table {
    name: "artist_credits",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "credits",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    conn.execute("ALTER TABLE songs ADD COLUMN suspended_until INTEGER", [])?;
    Ok(())
}

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[SONGS_TABLE_V_0, ARTIST_CREDITS_TABLE],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[SONGS_TABLE_V_1, ARTIST_CREDITS_TABLE],
        migration: Some(migrate_v0_to_v1),
    },
];
