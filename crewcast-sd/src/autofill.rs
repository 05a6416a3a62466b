//! Curation strategies
//!
//! Fill an under-supplied curator queue from the song library. The
//! strategies themselves are pure functions over an in-memory pool slice:
//! result length never exceeds the requested count, every result item comes
//! from the pool, and no item appears twice. [`Autofill::replenish`] wires
//! a strategy to the database, copies the chosen media into the store, and
//! wakes blocked schedulers.

use crate::db::{entries, library, players};
use crate::error::{Error, Result};
use crate::lastfm::{tags_from_station_name, MetadataClient};
use crate::mood::MoodTracker;
use crewcast_common::db::{LibraryItem, Station};
use crewcast_common::EventBus;
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Selection policy used to refill the curator queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutofillStrategy {
    /// Distinct uniform-random draws
    Random,
    /// One random contiguous window, original order
    Contiguous,
    /// One item per mood-ranked artist, random-padded
    Mood,
    /// Uniform-random over artists matching the station's tags
    Tags,
}

impl FromStr for AutofillStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(Self::Random),
            "contiguous" => Ok(Self::Contiguous),
            "mood" => Ok(Self::Mood),
            "tags" => Ok(Self::Tags),
            other => Err(Error::InvalidState(format!(
                "unknown autofill strategy '{other}'"
            ))),
        }
    }
}

/// Uniform-random: draw single random indices until the requested count of
/// distinct items is reached or the pool is exhausted.
pub fn fill_random(pool: &[LibraryItem], entries_needed: usize) -> Vec<LibraryItem> {
    if pool.is_empty() || entries_needed == 0 {
        return Vec::new();
    }

    let num_to_get = entries_needed.min(pool.len());
    let mut rng = rand::thread_rng();
    let mut chosen_ids = HashSet::new();
    let mut chosen = Vec::with_capacity(num_to_get);

    while chosen.len() < num_to_get {
        let item = &pool[rng.gen_range(0..pool.len())];
        if chosen_ids.insert(item.id) {
            chosen.push(item.clone());
        }
    }

    chosen
}

/// Contiguous-random: one random start offset such that a window of
/// `entries_needed` items fits (offset 0 when the pool is smaller), returned
/// in original order.
pub fn fill_contiguous(pool: &[LibraryItem], entries_needed: usize) -> Vec<LibraryItem> {
    if pool.is_empty() || entries_needed == 0 {
        return Vec::new();
    }

    let max_start = pool.len().saturating_sub(entries_needed);
    let start = rand::thread_rng().gen_range(0..=max_start);
    pool[start..pool.len().min(start + entries_needed)].to_vec()
}

/// Mood-weighted: one random item per mood-ranked artist up to the
/// top-artists cap, widening the window up to 24 hours, then padding with
/// uniform-random draws from the remainder.
pub async fn fill_mood(
    pool: &[LibraryItem],
    entries_needed: usize,
    station_id: i64,
    tracker: &MoodTracker,
    top_artists_limit: i64,
) -> Result<Vec<LibraryItem>> {
    let mut chosen: Vec<LibraryItem> = Vec::new();
    let mut chosen_ids: HashSet<i64> = HashSet::new();
    let base_window = tracker.window_secs().max(1);
    let mut window = base_window;

    while chosen.len() < entries_needed && window <= 86_400 {
        let mut top_artists = tracker
            .top_artists_in_window(station_id, window, None, top_artists_limit)
            .await?
            .into_iter()
            .map(|(artist, _)| artist)
            .collect::<Vec<_>>();
        // ThreadRng must not live across an await; scope it per iteration.
        let mut rng = rand::thread_rng();
        top_artists.shuffle(&mut rng);

        for artist in top_artists {
            let candidates: Vec<&LibraryItem> = pool
                .iter()
                .filter(|item| {
                    item.artist.eq_ignore_ascii_case(&artist) && !chosen_ids.contains(&item.id)
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let item = candidates[rng.gen_range(0..candidates.len())];
            chosen_ids.insert(item.id);
            chosen.push(item.clone());

            if chosen.len() == entries_needed {
                break;
            }
        }

        window += base_window;
    }

    let still_needed = entries_needed - chosen.len();
    if still_needed > 0 {
        let remainder: Vec<LibraryItem> = pool
            .iter()
            .filter(|item| !chosen_ids.contains(&item.id))
            .cloned()
            .collect();
        chosen.extend(fill_random(&remainder, still_needed));
    }

    chosen.shuffle(&mut rand::thread_rng());
    Ok(chosen)
}

/// Tag-weighted: expand the station's `#tags` into an artist set through
/// the metadata helper, filter the pool to those artists, then draw
/// uniform-random from the filtered set.
pub async fn fill_tags(
    pool: &[LibraryItem],
    entries_needed: usize,
    station_name: &str,
    metadata: &MetadataClient,
) -> Vec<LibraryItem> {
    let tags = tags_from_station_name(station_name);
    if tags.is_empty() {
        return Vec::new();
    }
    debug!("Tags: {}", tags.join(", "));

    let artists: HashSet<String> = metadata
        .artists_from_tags(&tags)
        .await
        .into_iter()
        .map(|a| a.to_lowercase())
        .collect();

    let filtered: Vec<LibraryItem> = pool
        .iter()
        .filter(|item| artists.contains(&item.artist.to_lowercase()))
        .cloned()
        .collect();

    fill_random(&filtered, entries_needed)
}

/// Curator queue replenishment
#[derive(Clone)]
pub struct Autofill {
    db: Pool<Sqlite>,
    media_root: PathBuf,
    tracker: MoodTracker,
    metadata: MetadataClient,
    strategy: AutofillStrategy,
    /// Fill the curator queue up to this many entries per station
    max_entries: i64,
    /// Replenish only when the current count is at or below this
    minimum: i64,
    top_artists_limit: i64,
}

impl Autofill {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Pool<Sqlite>,
        media_root: PathBuf,
        tracker: MoodTracker,
        metadata: MetadataClient,
        strategy: AutofillStrategy,
        max_entries: i64,
        minimum: i64,
        top_artists_limit: i64,
    ) -> Self {
        Self {
            db,
            media_root,
            tracker,
            metadata,
            strategy,
            max_entries,
            minimum,
            top_artists_limit,
        }
    }

    /// Top the curator queue up from the library.
    ///
    /// No-op unless the curator's current entry count for `station` is at
    /// or below the configured minimum. Returns the number of entries
    /// added; wakes blocked schedulers when anything was added.
    pub async fn replenish(&self, station: &Station, bus: &EventBus) -> Result<usize> {
        let curator = players::curator(&self.db).await?;
        let queue = players::queue_of(&self.db, curator.id)
            .await?
            .ok_or_else(|| Error::NotFound("curator queue".into()))?;

        let current = entries::count_for(&self.db, queue.id, station.id).await?;
        if current > self.minimum {
            return Ok(0);
        }

        let needed = (self.max_entries - current).max(0) as usize;
        if needed == 0 {
            return Ok(0);
        }

        let pool = library::all(&self.db).await?;
        let chosen = match self.strategy {
            AutofillStrategy::Random => fill_random(&pool, needed),
            AutofillStrategy::Contiguous => fill_contiguous(&pool, needed),
            AutofillStrategy::Mood => {
                fill_mood(&pool, needed, station.id, &self.tracker, self.top_artists_limit).await?
            }
            AutofillStrategy::Tags => {
                fill_tags(&pool, needed, &station.name, &self.metadata).await
            }
        };

        let mut added = 0;
        for item in &chosen {
            match self.add_to_queue(item, queue.id, station.id).await {
                Ok(()) => added += 1,
                Err(e) => warn!("autofill: could not queue library item {}: {}", item.id, e),
            }
        }

        if added > 0 {
            info!(
                "Curator queued {} entries for station {} ({:?})",
                added, station.id, self.strategy
            );
            bus.queue_changed(Some(station.id));
        }
        Ok(added)
    }

    /// Copy a library item into the media store and create its entry.
    ///
    /// Entries own their media (deletion unlinks it), so the library file
    /// is copied rather than referenced.
    async fn add_to_queue(&self, item: &LibraryItem, queue_id: i64, station_id: i64) -> Result<()> {
        let extension = Path::new(&item.path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3");
        let song_path = format!(
            "songs/{}.{}",
            uuid::Uuid::new_v4().simple(),
            extension
        );

        let dest = self.media_root.join(&song_path);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&item.path, &dest).await?;

        entries::create(
            &self.db,
            queue_id,
            station_id,
            &song_path,
            &item.artist,
            &item.title,
            Some(&item.album),
            extension,
        )
        .await?;
        Ok(())
    }
}
