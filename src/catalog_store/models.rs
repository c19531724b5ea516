use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Moderation status of a submitted song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongStatus {
    Pending,
    Approved,
    Rejected,
}

impl SongStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SongStatus::Pending => "pending",
            SongStatus::Approved => "approved",
            SongStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SongStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SongStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(SongStatus::Pending),
            "approved" => Ok(SongStatus::Approved),
            "rejected" => Ok(SongStatus::Rejected),
            other => Err(anyhow::anyhow!("Unknown song status: {}", other)),
        }
    }
}

/// A song as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub artist_id: String,
    pub title: String,
    pub audio_location: String,
    pub artwork_location: Option<String>,
    pub duration_secs: u32,
    pub status: SongStatus,
    /// Unix seconds.
    pub approved_at: Option<i64>,
    /// Not eligible for rotation before this unix timestamp.
    pub suspended_until: Option<i64>,
}

impl Song {
    /// Approved and not suspended at `now`.
    pub fn is_eligible(&self, now: i64) -> bool {
        self.status == SongStatus::Approved
            && self.suspended_until.map(|until| until <= now).unwrap_or(true)
    }
}

/// Data needed to submit a new song.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSong {
    pub id: String,
    pub artist_id: String,
    pub title: String,
    pub audio_location: String,
    pub artwork_location: Option<String>,
    pub duration_secs: u32,
}

/// Promotional credits held by an artist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    pub credits: i64,
}
