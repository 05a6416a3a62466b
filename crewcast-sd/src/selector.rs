//! Catalog selector
//!
//! Pure fairness logic: given the station's participants and the recent
//! play context, pick the next entry. Rotation starts immediately after the
//! previously served participant and wraps around, so nobody is skipped
//! twice before everyone has had a turn.

use crate::autofill::Autofill;
use crate::db::{entries, players};
use crate::error::Result;
use crate::mood::MoodTracker;
use crewcast_common::db::{Entry, Player, Station};
use crewcast_common::EventBus;
use sqlx::{Pool, Sqlite};
use tracing::debug;

/// Rotate `players` to start immediately after the player with
/// `previous_id`, wrapping around to include it last. When `previous_id`
/// is absent or not found, the original order is returned.
pub fn rotation_from(players: &[Player], previous_id: Option<i64>) -> Vec<&Player> {
    let split = previous_id
        .and_then(|id| players.iter().position(|p| p.id == id))
        .map(|idx| idx + 1);

    match split {
        Some(idx) => players[idx..].iter().chain(players[..idx].iter()).collect(),
        None => players.iter().collect(),
    }
}

/// Find the oldest entry whose artist fits the station's current mood.
///
/// Candidates exclude `previous_artist` (case-insensitive). If only one
/// distinct artist remains, similarity is moot and the oldest entry wins.
/// Otherwise the mood ranking is walked in descending sample count; the
/// first ranked artist present among the candidates supplies the result.
/// No ranked match yields `None` — the caller decides the fallback.
pub async fn mood_fit(
    db: &Pool<Sqlite>,
    tracker: &MoodTracker,
    queue_id: i64,
    station_id: i64,
    previous_artist: Option<&str>,
) -> Result<Option<Entry>> {
    let candidates = entries::for_station(db, queue_id, station_id, previous_artist).await?;
    if candidates.is_empty() {
        return Ok(None);
    }

    let artists: std::collections::HashSet<String> =
        candidates.iter().map(|e| e.artist.to_lowercase()).collect();
    if artists.len() == 1 {
        // the similarity is inconsequential
        return Ok(candidates.into_iter().next());
    }

    let ranked = tracker
        .top_artists(station_id, previous_artist, 0)
        .await?;
    for (artist, _) in ranked {
        let lowered = artist.to_lowercase();
        if artists.contains(&lowered) {
            debug!("'{}' fits the mood", artist);
            return Ok(candidates
                .into_iter()
                .find(|e| e.artist.to_lowercase() == lowered));
        }
    }

    Ok(None)
}

/// The best offering of one participant for a station: mood-fit for
/// auto-mode participants (oldest entry as fallback), plain oldest entry
/// otherwise. Inactive or missing queues offer nothing.
pub async fn best_entry_for_player(
    db: &Pool<Sqlite>,
    tracker: &MoodTracker,
    player: &Player,
    station_id: i64,
    previous_artist: Option<&str>,
) -> Result<Option<Entry>> {
    let queue = match players::queue_of(db, player.id).await? {
        Some(queue) if queue.active => queue,
        _ => return Ok(None),
    };

    if player.auto_mode {
        if let Some(entry) = mood_fit(db, tracker, queue.id, station_id, previous_artist).await? {
            return Ok(Some(entry));
        }
    }

    entries::next_for(db, queue.id, station_id).await
}

/// Per-station selection engine
#[derive(Clone)]
pub struct Selector {
    db: Pool<Sqlite>,
    tracker: MoodTracker,
    /// Curator replenishment, present when "shake things up" is configured
    autofill: Option<Autofill>,
    curator_id: i64,
    main_station_id: i64,
}

impl Selector {
    pub fn new(
        db: Pool<Sqlite>,
        tracker: MoodTracker,
        autofill: Option<Autofill>,
        curator_id: i64,
        main_station_id: i64,
    ) -> Self {
        Self {
            db,
            tracker,
            autofill,
            curator_id,
            main_station_id,
        }
    }

    /// Select the next entry for `station`.
    ///
    /// Walks the rotation anchored after `previous_player_id` and returns
    /// the first offering found. When auto-curation is enabled for this
    /// station the curator queue is replenished first, excluded from the
    /// rotation, and consulted only after every human participant came up
    /// empty. `Ok(None)` means nobody has anything queued - the scheduler
    /// blocks on the event bus.
    pub async fn select(
        &self,
        station: &Station,
        participants: &[Player],
        previous_player_id: Option<i64>,
        previous_artist: Option<&str>,
        bus: &EventBus,
    ) -> Result<Option<Entry>> {
        let curated = self.autofill.is_some() && station.id == self.main_station_id;

        if curated {
            if let Some(autofill) = &self.autofill {
                autofill.replenish(station, bus).await?;
            }
        }

        for player in rotation_from(participants, previous_player_id) {
            if curated && player.id == self.curator_id {
                continue;
            }
            if let Some(entry) =
                best_entry_for_player(&self.db, &self.tracker, player, station.id, previous_artist)
                    .await?
            {
                return Ok(Some(entry));
            }
        }

        if curated {
            let curator = players::curator(&self.db).await?;
            return best_entry_for_player(
                &self.db,
                &self.tracker,
                &curator,
                station.id,
                previous_artist,
            )
            .await;
        }

        Ok(None)
    }
}
