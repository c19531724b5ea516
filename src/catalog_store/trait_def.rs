//! CatalogStore trait definition.
//!
//! The rotation core only ever reads songs and consumes credits through this
//! trait; writes are used by the catalog CLI and by tests.

use super::models::{CreditBalance, NewSong, Song, SongStatus};
use anyhow::Result;
use std::collections::HashMap;

/// Trait for catalog and credit ledger backends.
pub trait CatalogStore: Send + Sync {
    // =========================================================================
    // Rotation reads
    // =========================================================================

    /// Songs that are approved and not suspended at `now`.
    fn list_approved_songs(&self, now: i64) -> Result<Vec<Song>>;

    /// Credit balance of an artist; artists without a ledger row have zero.
    fn get_credit_balance(&self, artist_id: &str) -> Result<CreditBalance>;

    /// All non-zero credit balances, keyed by artist id.
    fn list_credit_balances(&self) -> Result<HashMap<String, i64>>;

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Atomically consumes one credit. Returns false if the balance was
    /// already zero, never lets it go negative.
    fn decrement_credit(&self, artist_id: &str) -> Result<bool>;

    /// Adds `amount` credits to an artist, returning the new balance.
    fn grant_credits(&self, artist_id: &str, amount: i64) -> Result<CreditBalance>;

    // =========================================================================
    // Catalog administration
    // =========================================================================

    fn add_song(&self, song: NewSong) -> Result<Song>;

    fn get_song(&self, id: &str) -> Result<Option<Song>>;

    /// Sets the moderation status, stamping `approved_at` when approving.
    fn set_song_status(&self, id: &str, status: SongStatus, at: i64) -> Result<()>;

    /// Suspends a song until the given timestamp, `None` lifts the suspension.
    fn suspend_song(&self, id: &str, until: Option<i64>) -> Result<()>;

    fn list_songs(&self) -> Result<Vec<Song>>;
}
