//! Per-song play history over a trailing window.
//!
//! The tracker keeps raw timestamps and counts them lazily when a snapshot is
//! taken, so no background sweep is needed. Timestamps that fell out of the
//! window are dropped whenever the song's entry is written to.

use crate::play_events::{PlayEvent, PlayEventKind};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
struct PlayHistoryEntry {
    last_played_at: Option<i64>,
    plays: VecDeque<i64>,
    skips: VecDeque<i64>,
}

impl PlayHistoryEntry {
    fn prune(&mut self, cutoff: i64) {
        while self.plays.front().is_some_and(|at| *at < cutoff) {
            self.plays.pop_front();
        }
        while self.skips.front().is_some_and(|at| *at < cutoff) {
            self.skips.pop_front();
        }
    }
}

/// Window-restricted statistics of one song.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SongStats {
    pub last_played_at: Option<i64>,
    pub plays: u32,
    pub skips: u32,
}

/// Immutable view of the tracker at a point in time.
#[derive(Debug, Clone, Default)]
pub struct FairnessSnapshot {
    stats: HashMap<String, SongStats>,
}

impl FairnessSnapshot {
    /// Stats of a song, zeroed if it never played.
    pub fn get(&self, song_id: &str) -> SongStats {
        self.stats.get(song_id).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Counts a skip that has been reported but not committed yet.
    pub fn note_skip(&mut self, song_id: &str) {
        self.stats.entry(song_id.to_string()).or_default().skips += 1;
    }

    #[cfg(test)]
    pub fn insert(&mut self, song_id: &str, stats: SongStats) {
        self.stats.insert(song_id.to_string(), stats);
    }
}

pub struct FairnessTracker {
    window_secs: i64,
    entries: HashMap<String, PlayHistoryEntry>,
}

impl FairnessTracker {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            entries: HashMap::new(),
        }
    }

    /// Rebuilds the history from persisted play events, oldest first.
    pub fn rebuild(window_secs: i64, events: &[PlayEvent], now: i64) -> Self {
        let mut tracker = Self::new(window_secs);
        let mut ordered: Vec<&PlayEvent> = events.iter().collect();
        ordered.sort_by_key(|e| (e.at, e.epoch));
        for event in ordered {
            match event.kind {
                PlayEventKind::Started => tracker.record_started(&event.song_id, event.at),
                PlayEventKind::Completed => tracker.record_play(&event.song_id, event.at),
                PlayEventKind::Skipped => tracker.record_skip(&event.song_id, event.at),
            }
        }
        let cutoff = now - window_secs;
        for entry in tracker.entries.values_mut() {
            entry.prune(cutoff);
        }
        tracker
    }

    /// The song became current at `at`. Starts its cool-down.
    pub fn record_started(&mut self, song_id: &str, at: i64) {
        let entry = self.entry_for_write(song_id, at);
        entry.last_played_at = Some(entry.last_played_at.map_or(at, |last| last.max(at)));
    }

    /// The song played through.
    pub fn record_play(&mut self, song_id: &str, at: i64) {
        let entry = self.entry_for_write(song_id, at);
        entry.last_played_at = Some(entry.last_played_at.map_or(at, |last| last.max(at)));
        entry.plays.push_back(at);
    }

    /// The song was skipped. The last played time set when it started stays
    /// untouched, so the song remains in cool-down.
    pub fn record_skip(&mut self, song_id: &str, at: i64) {
        let entry = self.entry_for_write(song_id, at);
        entry.skips.push_back(at);
    }

    pub fn window_snapshot(&self, now: i64) -> FairnessSnapshot {
        let cutoff = now - self.window_secs;
        let stats = self
            .entries
            .iter()
            .map(|(song_id, entry)| {
                let stats = SongStats {
                    last_played_at: entry.last_played_at,
                    plays: entry.plays.iter().filter(|at| **at >= cutoff).count() as u32,
                    skips: entry.skips.iter().filter(|at| **at >= cutoff).count() as u32,
                };
                (song_id.clone(), stats)
            })
            .collect();
        FairnessSnapshot { stats }
    }

    pub fn last_played_at(&self, song_id: &str) -> Option<i64> {
        self.entries.get(song_id).and_then(|e| e.last_played_at)
    }

    fn entry_for_write(&mut self, song_id: &str, at: i64) -> &mut PlayHistoryEntry {
        let cutoff = at - self.window_secs;
        let entry = self.entries.entry(song_id.to_string()).or_default();
        entry.prune(cutoff);
        entry
    }
}
