//! Weighted lottery picking the next song.
//!
//! Everything here is a pure function of its inputs: no ledger calls, no
//! clock reads. The scheduler feeds it snapshots and commits the result.

use super::catalog_view::CatalogView;
use super::error::RotationError;
use super::fairness::{FairnessSnapshot, SongStats};
use crate::catalog_store::Song;
use crate::config::RotationSettings;
use rand::Rng;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    /// Drawn from songs whose artist has credits. Costs one credit.
    Promoted,
    Organic,
    /// Every song was cooling down, the least recently played one was taken.
    OldestFallback,
}

impl SelectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionKind::Promoted => "promoted",
            SelectionKind::Organic => "organic",
            SelectionKind::OldestFallback => "oldest_fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub song: Song,
    pub kind: SelectionKind,
}

/// Inputs of one selection round.
pub struct SelectionRequest<'a> {
    pub view: &'a CatalogView,
    pub fairness: &'a FairnessSnapshot,
    pub settings: &'a RotationSettings,
    pub now: i64,
    /// Songs that may not be picked as promoted in this round.
    pub exclude: &'a HashSet<String>,
    pub credits_allowed: bool,
}

struct Candidate<'a> {
    song: &'a Song,
    stats: SongStats,
    base: f64,
}

fn cooled_down(stats: &SongStats, now: i64, cooldown_secs: i64) -> bool {
    stats
        .last_played_at
        .map_or(true, |last| now - last >= cooldown_secs)
}

/// Grows linearly with the time since the last play, capped. Songs that
/// never played get the cap.
pub fn recency_boost(stats: &SongStats, now: i64, settings: &RotationSettings) -> f64 {
    match stats.last_played_at {
        None => settings.max_recency_boost,
        Some(last) => {
            let elapsed = (now - last).max(0) as f64;
            let boost = 1.0 + elapsed / settings.recency_boost_unit_secs as f64;
            boost.min(settings.max_recency_boost)
        }
    }
}

fn weight(candidate: &Candidate, now: i64, settings: &RotationSettings) -> f64 {
    candidate.base / (1.0 + candidate.stats.skips as f64)
        * recency_boost(&candidate.stats, now, settings)
}

// Never played first, then oldest last play, then id.
fn order_key(stats: &SongStats, song: &Song) -> (i64, String) {
    (stats.last_played_at.unwrap_or(i64::MIN), song.id.clone())
}

fn draw<'a, R: Rng>(
    mut candidates: Vec<Candidate<'a>>,
    now: i64,
    settings: &RotationSettings,
    rng: &mut R,
) -> Option<&'a Song> {
    candidates.sort_by_cached_key(|c| order_key(&c.stats, c.song));
    let weights: Vec<f64> = candidates
        .iter()
        .map(|c| weight(c, now, settings))
        .collect();
    let total: f64 = weights.iter().sum();
    if candidates.is_empty() || !total.is_finite() || total <= 0.0 {
        return candidates.first().map(|c| c.song);
    }

    let mut ticket = rng.random::<f64>() * total;
    for (candidate, weight) in candidates.iter().zip(weights.iter()) {
        if ticket < *weight {
            return Some(candidate.song);
        }
        ticket -= weight;
    }
    candidates.last().map(|c| c.song)
}

/// Picks the next song out of `request.view`.
pub fn select_next<R: Rng>(
    request: &SelectionRequest,
    rng: &mut R,
) -> Result<Selection, RotationError> {
    let SelectionRequest {
        view,
        fairness,
        settings,
        now,
        exclude,
        credits_allowed,
    } = *request;

    if view.is_empty() {
        return Err(RotationError::NoEligibleContent);
    }

    let mut promoted = Vec::new();
    let mut organic = Vec::new();
    for song in view.songs() {
        let stats = fairness.get(&song.id);
        let credits = view.credits_of(&song.artist_id);
        let promotable = credits_allowed
            && credits >= 1
            && !exclude.contains(&song.id)
            && cooled_down(&stats, now, settings.promoted_cooldown_secs);
        if promotable {
            promoted.push(Candidate {
                song,
                stats,
                base: credits as f64,
            });
        } else if cooled_down(&stats, now, settings.organic_cooldown_secs) {
            organic.push(Candidate {
                song,
                stats,
                base: 1.0,
            });
        }
    }

    let use_promoted = match (promoted.is_empty(), organic.is_empty()) {
        (true, true) => {
            let oldest = view
                .songs()
                .iter()
                .min_by_key(|song| order_key(&fairness.get(&song.id), song))
                .ok_or(RotationError::NoEligibleContent)?;
            return Ok(Selection {
                song: oldest.clone(),
                kind: SelectionKind::OldestFallback,
            });
        }
        (false, true) => true,
        (true, false) => false,
        (false, false) => rng.random::<f64>() < settings.p_promoted,
    };

    let (candidates, kind) = if use_promoted {
        (promoted, SelectionKind::Promoted)
    } else {
        (organic, SelectionKind::Organic)
    };
    let song = draw(candidates, now, settings, rng).ok_or(RotationError::NoEligibleContent)?;
    Ok(Selection {
        song: song.clone(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::SongStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    const NOW: i64 = 1_000_000;

    fn song(id: &str, artist_id: &str) -> Song {
        Song {
            id: id.to_string(),
            artist_id: artist_id.to_string(),
            title: id.to_string(),
            audio_location: format!("{}.mp3", id),
            artwork_location: None,
            duration_secs: 200,
            status: SongStatus::Approved,
            approved_at: Some(0),
            suspended_until: None,
        }
    }

    fn view(songs: &[(&str, &str)], credits: &[(&str, i64)]) -> CatalogView {
        CatalogView::new(
            songs.iter().map(|(id, artist)| song(id, artist)).collect(),
            credits
                .iter()
                .map(|(artist, c)| (artist.to_string(), *c))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn played_at(at: i64) -> SongStats {
        SongStats {
            last_played_at: Some(at),
            ..Default::default()
        }
    }

    fn select(
        view: &CatalogView,
        fairness: &FairnessSnapshot,
        settings: &RotationSettings,
        rng: &mut StdRng,
    ) -> Selection {
        let exclude = HashSet::new();
        let request = SelectionRequest {
            view,
            fairness,
            settings,
            now: NOW,
            exclude: &exclude,
            credits_allowed: true,
        };
        select_next(&request, rng).unwrap()
    }

    #[test]
    fn empty_catalog_has_no_content() {
        let settings = RotationSettings::default();
        let exclude = HashSet::new();
        let view = CatalogView::default();
        let fairness = FairnessSnapshot::default();
        let request = SelectionRequest {
            view: &view,
            fairness: &fairness,
            settings: &settings,
            now: NOW,
            exclude: &exclude,
            credits_allowed: true,
        };
        let result = select_next(&request, &mut StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(RotationError::NoEligibleContent)));
    }

    #[test]
    fn credited_artist_is_favoured_but_others_still_play() {
        let settings = RotationSettings::default();
        let view = view(&[("a", "artist-a"), ("b", "artist-b")], &[("artist-a", 3)]);
        let fairness = FairnessSnapshot::default();
        let mut rng = StdRng::seed_from_u64(7);

        let mut picked_a = 0;
        let mut picked_b = 0;
        for _ in 0..1000 {
            let selection = select(&view, &fairness, &settings, &mut rng);
            match selection.song.id.as_str() {
                "a" => {
                    assert_eq!(selection.kind, SelectionKind::Promoted);
                    picked_a += 1;
                }
                _ => {
                    assert_eq!(selection.kind, SelectionKind::Organic);
                    picked_b += 1;
                }
            }
        }
        assert!(picked_a > 600 && picked_a < 800, "picked a {} times", picked_a);
        assert!(picked_b > 0);
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let settings = RotationSettings::default();
        let view = view(
            &[("a", "artist-a"), ("b", "artist-b"), ("c", "artist-c")],
            &[("artist-a", 3), ("artist-c", 1)],
        );
        let fairness = FairnessSnapshot::default();

        let run = |seed: u64| -> Vec<String> {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50)
                .map(|_| select(&view, &fairness, &settings, &mut rng).song.id)
                .collect()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn everything_cooling_down_picks_the_oldest() {
        let settings = RotationSettings::default();
        let view = view(&[("a", "x"), ("b", "x"), ("c", "x")], &[("x", 5)]);
        let mut fairness = FairnessSnapshot::default();
        fairness.insert("a", played_at(NOW - 60));
        fairness.insert("b", played_at(NOW - 300));
        fairness.insert("c", played_at(NOW - 120));

        let selection = select(&view, &fairness, &settings, &mut StdRng::seed_from_u64(3));
        assert_eq!(selection.song.id, "b");
        assert_eq!(selection.kind, SelectionKind::OldestFallback);
    }

    #[test]
    fn oldest_fallback_breaks_ties_by_id() {
        let settings = RotationSettings::default();
        let view = view(&[("b", "x"), ("a", "x")], &[]);
        let mut fairness = FairnessSnapshot::default();
        fairness.insert("a", played_at(NOW - 10));
        fairness.insert("b", played_at(NOW - 10));

        let selection = select(&view, &fairness, &settings, &mut StdRng::seed_from_u64(3));
        assert_eq!(selection.song.id, "a");
    }

    #[test]
    fn promoted_cooldown_demotes_to_organic() {
        let settings = RotationSettings::default();
        let view = view(&[("a", "artist-a")], &[("artist-a", 10)]);
        let mut fairness = FairnessSnapshot::default();
        // Past the organic cool-down, inside the promoted one.
        fairness.insert("a", played_at(NOW - 900));

        let selection = select(&view, &fairness, &settings, &mut StdRng::seed_from_u64(9));
        assert_eq!(selection.kind, SelectionKind::Organic);
    }

    #[test]
    fn excluded_and_uncredited_songs_are_not_promoted() {
        let settings = RotationSettings::default();
        let view = view(&[("a", "artist-a"), ("b", "artist-b")], &[("artist-a", 2)]);
        let fairness = FairnessSnapshot::default();
        let exclude: HashSet<String> = ["a".to_string()].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(11);

        for credits_allowed in [true, false] {
            let excluded = if credits_allowed {
                exclude.clone()
            } else {
                HashSet::new()
            };
            let request = SelectionRequest {
                view: &view,
                fairness: &fairness,
                settings: &settings,
                now: NOW,
                exclude: &excluded,
                credits_allowed,
            };
            for _ in 0..50 {
                let selection = select_next(&request, &mut rng).unwrap();
                assert_ne!(selection.kind, SelectionKind::Promoted);
            }
        }
    }

    #[test]
    fn zero_promotion_probability_never_promotes_when_organic_exists() {
        let settings = RotationSettings {
            p_promoted: 0.0,
            ..Default::default()
        };
        let view = view(&[("a", "artist-a"), ("b", "artist-b")], &[("artist-a", 2)]);
        let fairness = FairnessSnapshot::default();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            assert_eq!(select(&view, &fairness, &settings, &mut rng).song.id, "b");
        }
    }

    #[test]
    fn skips_and_recency_shape_the_weights() {
        let settings = RotationSettings::default();
        let view = view(&[("fresh", "x"), ("skipped", "y")], &[]);
        let mut fairness = FairnessSnapshot::default();
        fairness.insert(
            "skipped",
            SongStats {
                last_played_at: Some(NOW - 700),
                plays: 0,
                skips: 9,
            },
        );
        let mut rng = StdRng::seed_from_u64(13);

        let fresh_picks = (0..1000)
            .filter(|_| select(&view, &fairness, &settings, &mut rng).song.id == "fresh")
            .count();
        // 4.0 against roughly 0.12.
        assert!(fresh_picks > 900, "fresh picked {} times", fresh_picks);
    }

    #[test]
    fn recency_boost_is_capped() {
        let settings = RotationSettings::default();
        assert_eq!(recency_boost(&SongStats::default(), NOW, &settings), 4.0);
        assert_eq!(recency_boost(&played_at(NOW), NOW, &settings), 1.0);
        assert_eq!(recency_boost(&played_at(NOW - 3600), NOW, &settings), 2.0);
        assert_eq!(recency_boost(&played_at(NOW - 100_000), NOW, &settings), 4.0);
    }

    #[test]
    fn always_returns_a_catalog_member() {
        let settings = RotationSettings::default();
        let view = view(
            &[("a", "p"), ("b", "q"), ("c", "r"), ("d", "s")],
            &[("p", 1), ("r", 4)],
        );
        let mut fairness = FairnessSnapshot::default();
        fairness.insert("c", played_at(NOW - 30));
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..200 {
            let selection = select(&view, &fairness, &settings, &mut rng);
            assert!(view.contains(&selection.song.id));
        }
    }
}
