//! Song-change fan-out
//!
//! One task subscribed to the event bus reacts to every song transition
//! with an ordered list of side effects: mood logging, then play-history
//! recording. Each step's failure is logged and never blocks the next
//! step or the next event; external subscribers (the SSE stream) consume
//! the same bus independently.

use crate::db::{players, playlog};
use crate::mood::{MoodTracker, SILENCE_ARTIST};
use crewcast_common::db::init::CURATOR_NAME;
use crewcast_common::db::Player;
use crewcast_common::events::{Event, NowPlaying};
use crewcast_common::EventBus;
use sqlx::{Pool, Sqlite};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawn the fan-out task. It runs until the bus closes.
pub fn spawn(db: Pool<Sqlite>, bus: EventBus, tracker: MoodTracker) -> JoinHandle<()> {
    // Subscribe before spawning: events published between this call and
    // the task's first poll must not be lost.
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(Event::SongChanged {
                    station_id,
                    current,
                    ..
                }) => on_song_changed(&db, &bus, &tracker, station_id, &current).await,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Fan-out lagged, {} events dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Fan-out task finished");
    })
}

async fn on_song_changed(
    db: &Pool<Sqlite>,
    bus: &EventBus,
    tracker: &MoodTracker,
    station_id: i64,
    current: &NowPlaying,
) {
    let Some(artist) = current.artist.as_deref() else {
        return;
    };
    if artist.is_empty() || artist == SILENCE_ARTIST {
        return;
    }

    let contributor = match current.dj.as_deref() {
        Some(dj) => match players::by_dj_name(db, dj).await {
            Ok(player) => player,
            Err(e) => {
                warn!("Could not resolve dj '{}': {}", dj, e);
                None
            }
        },
        None => None,
    };
    let is_curator = contributor
        .as_ref()
        .is_some_and(|p| p.name == CURATOR_NAME);

    // Curator picks reflect the mood, they do not set it.
    if !is_curator {
        match tracker.log(station_id, artist).await {
            Ok(()) => bus.publish(Event::MoodLogged {
                station_id,
                artist: artist.to_string(),
                timestamp: chrono::Utc::now(),
            }),
            Err(e) => warn!("Mood logging failed for '{}': {}", artist, e),
        }
    }

    if let Some(Player { id: player_id, .. }) = contributor {
        let title = current.title.as_deref().unwrap_or("Unknown");
        match playlog::record(db, station_id, player_id, artist, title).await {
            Ok(()) => bus.publish(Event::PlayLogged {
                station_id,
                artist: artist.to_string(),
                title: title.to_string(),
                timestamp: chrono::Utc::now(),
            }),
            Err(e) => warn!("Play-log recording failed for '{}': {}", artist, e),
        }
    }
}
