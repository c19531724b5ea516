use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayEventKind {
    /// The rotation committed a new current song.
    Started,
    Completed,
    Skipped,
}

impl PlayEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayEventKind::Started => "started",
            PlayEventKind::Completed => "completed",
            PlayEventKind::Skipped => "skipped",
        }
    }
}

impl fmt::Display for PlayEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayEventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(PlayEventKind::Started),
            "completed" => Ok(PlayEventKind::Completed),
            "skipped" => Ok(PlayEventKind::Skipped),
            other => Err(anyhow::anyhow!("Unknown play event kind: {}", other)),
        }
    }
}

/// One entry of the play log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub epoch: u64,
    pub song_id: String,
    pub kind: PlayEventKind,
    pub promoted: bool,
    pub listener_id: Option<String>,
    /// Unix seconds.
    pub at: i64,
}
