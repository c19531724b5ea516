//! Shared constants for end-to-end tests
//!
//! When the seeded catalog changes, update only this file.

// ============================================================================
// Listeners
// ============================================================================

pub const LISTENER_1: &str = "listener-1";

pub const LISTENER_2: &str = "listener-2";

// ============================================================================
// Test Catalog
// ============================================================================

/// Artist with promotional credits
pub const PROMOTED_ARTIST_ID: &str = "artist-promoted";

/// Credits granted to PROMOTED_ARTIST_ID at startup
pub const PROMOTED_ARTIST_CREDITS: i64 = 5;

/// Artist without credits
pub const ORGANIC_ARTIST_ID: &str = "artist-organic";

/// Approved song by PROMOTED_ARTIST_ID
pub const SONG_PROMOTED_ID: &str = "song-promoted";

/// Approved songs by ORGANIC_ARTIST_ID
pub const SONG_ORGANIC_1_ID: &str = "song-organic-1";
pub const SONG_ORGANIC_2_ID: &str = "song-organic-2";

/// Song that is still pending moderation, never played
pub const SONG_PENDING_ID: &str = "song-pending";

/// Song that is approved but suspended, never played
pub const SONG_SUSPENDED_ID: &str = "song-suspended";

/// Long enough that no song ends during a test
pub const SONG_DURATION_SECS: u32 = 600;

/// Songs that can be picked
pub const ELIGIBLE_SONG_IDS: &[&str] = &[SONG_PROMOTED_ID, SONG_ORGANIC_1_ID, SONG_ORGANIC_2_ID];

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between server readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
