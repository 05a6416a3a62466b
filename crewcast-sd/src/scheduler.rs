//! Station scheduler
//!
//! One scheduler per station, running as an independent tokio task. The
//! scheduler owns the station's engine process, watches its playlist, and
//! keeps exactly one upcoming song queued: when the playing song nears its
//! end it asks the selector for the next entry, stages the media, hands it
//! to the engine, and consumes the entry. A companion task listens for the
//! engine's asynchronous player transitions and republishes them on the
//! event bus.

use crate::db::{entries, players, stations};
use crate::engine::{Catalog, EngineAdapter, PlaylistItem};
use crate::error::{Error, Result};
use crate::mood::SILENCE_ARTIST;
use crate::selector::Selector;
use crate::stager::FileStager;
use crewcast_common::db::{Entry, Station};
use crewcast_common::events::{Event, NowPlaying};
use crewcast_common::EventBus;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Delay before reconnecting the transition listener after a lost connection
const LISTENER_BACKOFF: Duration = Duration::from_secs(30);

/// Seconds added to the crossfade time to form the injection lead: the next
/// song must be staged and queued this long before the current one ends.
const INJECTION_MARGIN: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Per-station scheduling engine loop
pub struct StationScheduler {
    station: Station,
    db: Pool<Sqlite>,
    bus: EventBus,
    selector: Selector,
    engine: Arc<EngineAdapter>,
    stager: FileStager,
    media_root: PathBuf,
    crossfade_secs: u64,
    running: Arc<AtomicBool>,
    state: Mutex<State>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl StationScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        station: Station,
        db: Pool<Sqlite>,
        bus: EventBus,
        selector: Selector,
        engine: EngineAdapter,
        stager: FileStager,
        media_root: PathBuf,
        crossfade_secs: u64,
    ) -> Self {
        Self {
            station,
            db,
            bus,
            selector,
            engine: Arc::new(engine),
            stager,
            media_root,
            crossfade_secs,
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(State::Stopped),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn station_id(&self) -> i64 {
        self.station.id
    }

    pub fn state(&self) -> State {
        *self.state.lock().unwrap()
    }

    /// Snapshot of what the station's engine is playing right now
    pub async fn currently_playing(&self) -> Result<NowPlaying> {
        self.engine.currently_playing().await
    }

    /// Bring the engine up and launch the scheduling loop.
    ///
    /// Returns once the engine accepts connections; the loop itself runs as
    /// a detached task until [`stop`](Self::stop).
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != State::Stopped {
                return Err(Error::InvalidState(format!(
                    "scheduler for station {} is {:?}",
                    self.station.id, *state
                )));
            }
            *state = State::Starting;
        }

        self.engine.write_config().await?;
        if let Err(e) = self.engine.start().await {
            *self.state.lock().unwrap() = State::Stopped;
            return Err(e);
        }

        self.running.store(true, Ordering::SeqCst);

        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(Self::listen(self.clone())));
        tasks.push(tokio::spawn(Self::run(self.clone())));
        drop(tasks);

        *self.state.lock().unwrap() = State::Running;
        info!("Scheduler for station {} running", self.station.id);
        Ok(())
    }

    /// Stop the scheduler, safe to call while the loop is blocked anywhere.
    ///
    /// Flips the running flag, kills the engine process (which fails any
    /// blocked engine call), and publishes a station-removed event (which
    /// unblocks a loop waiting on the event bus). The loop observes the
    /// flag on its next check and exits.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == State::Stopped || *state == State::Stopping {
                return;
            }
            *state = State::Stopping;
        }
        info!("Stopping scheduler for station {}", self.station.id);

        self.running.store(false, Ordering::SeqCst);
        self.engine.stop().await;
        self.bus.publish(Event::StationRemoved {
            station_id: self.station.id,
            timestamp: chrono::Utc::now(),
        });

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
        drop(tasks);

        *self.state.lock().unwrap() = State::Stopped;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The scheduling loop task. Any error escaping an iteration while the
    /// scheduler is still supposed to run is fatal to this station: logged
    /// with the last now-playing snapshot, then the task terminates.
    async fn run(self: Arc<Self>) {
        let mut last_seen: Option<NowPlaying> = None;

        if let Err(e) = self.run_loop(&mut last_seen).await {
            if self.is_running() {
                error!(
                    "Scheduler for station {} died: {} (last playing: {:?})",
                    self.station.id, e, last_seen
                );
            }
        }
        debug!("Scheduler loop for station {} finished", self.station.id);
    }

    async fn run_loop(&self, last_seen: &mut Option<NowPlaying>) -> Result<()> {
        // Rotation continuity is scoped to this scheduler's lifetime.
        let mut previous_player_id: Option<i64> = None;

        while self.is_running() {
            let playlist = self.engine.playlist().await?;
            let now_playing = self.engine.currently_playing().await?;
            *last_seen = Some(now_playing.clone());

            // A song is already queued ahead; adding another would
            // double-queue. Wait for the playlist to drain.
            if playlist.len() > 1 {
                self.engine.idle("playlist").await?;
                continue;
            }

            // One song playing, nothing queued behind it: sleep until the
            // injection lead, or until the engine reports a change first.
            if playlist.len() == 1 {
                let wait = injection_wait(now_playing.remaining_time, self.crossfade_secs);
                self.engine.idle_or_wait(wait).await;
                if !self.is_running() {
                    break;
                }
            }

            let previous_artist = previous_artist_from(&playlist);

            // Subscribe before selecting so a pool change landing between
            // an empty selection and the blocking wait is not missed.
            let mut rx = self.bus.subscribe();
            let participants = stations::participants(&self.db, self.station.id).await?;
            let entry = self
                .selector
                .select(
                    &self.station,
                    &participants,
                    previous_player_id,
                    previous_artist.as_deref(),
                    &self.bus,
                )
                .await?;

            let Some(entry) = entry else {
                debug!(
                    "Nothing queued for station {}, waiting for the pool to change",
                    self.station.id
                );
                EventBus::recv_queue_change(&mut rx, self.station.id).await;
                continue;
            };

            let owner = players::owner_of_queue(&self.db, entry.queue_id).await?;
            let Some(staged_name) = stage_checked(
                &self.stager,
                self.engine.as_ref(),
                &self.db,
                &self.media_root,
                &entry,
                owner.id,
            )
            .await?
            else {
                continue;
            };

            self.engine.enqueue(&staged_name).await?;
            if let Err(e) = self
                .engine
                .set_sticker(&staged_name, "dj", &owner.dj_name)
                .await
            {
                warn!("Could not tag {} with its dj: {}", staged_name, e);
            }
            if self.crossfade_secs > 0 {
                self.engine.set_crossfade(self.crossfade_secs).await?;
            }
            self.engine.play().await?;

            info!(
                "Station {}: queued '{}' by {} for {}",
                self.station.id, entry.title, entry.artist, owner.dj_name
            );

            // Handed off. The entry and its backing file are consumed.
            entries::delete(&self.db, &self.media_root, &entry).await?;
            self.bus.publish(Event::SongRemoved {
                station_id: self.station.id,
                player_id: owner.id,
                artist: entry.artist.clone(),
                title: entry.title.clone(),
                timestamp: chrono::Utc::now(),
            });
            previous_player_id = Some(owner.id);

            let keep: Vec<String> = self
                .engine
                .playlist()
                .await?
                .into_iter()
                .map(|item| item.file)
                .collect();
            self.stager.purge_unused(&keep).await?;
        }

        Ok(())
    }

    /// Companion transition listener: blocks on the engine's player
    /// subsystem and republishes each transition on the event bus, so
    /// reacting to a song change never competes with the scheduling loop's
    /// own waits. Lost connections back off and retry while running.
    async fn listen(self: Arc<Self>) {
        let mut previous: Option<NowPlaying> = None;

        while self.is_running() {
            if let Err(e) = self.engine.idle("player").await {
                if !self.is_running() {
                    break;
                }
                warn!(
                    "Transition listener for station {} lost its engine: {}",
                    self.station.id, e
                );
                tokio::time::sleep(LISTENER_BACKOFF).await;
                continue;
            }

            match self.engine.currently_playing().await {
                Ok(current) => {
                    self.bus.publish(Event::SongChanged {
                        station_id: self.station.id,
                        previous: previous.take(),
                        current: current.clone(),
                        timestamp: chrono::Utc::now(),
                    });
                    previous = Some(current);
                }
                Err(e) => {
                    if self.is_running() {
                        warn!(
                            "Could not read now-playing for station {}: {}",
                            self.station.id, e
                        );
                    }
                }
            }
        }
        debug!("Transition listener for station {} finished", self.station.id);
    }
}

/// Stage an entry and wait for the engine to see it.
///
/// Both failure modes consume the entry without retrying it: a staging
/// error (missing or unreadable source file) and a confirmation timeout
/// each delete the entry and return `Ok(None)`, so the loop moves on to
/// the next selection. Only database failures propagate.
pub async fn stage_checked<C: Catalog>(
    stager: &FileStager,
    catalog: &C,
    db: &Pool<Sqlite>,
    media_root: &Path,
    entry: &Entry,
    player_id: i64,
) -> Result<Option<String>> {
    let staged_name = match stager.stage(entry, player_id).await {
        Ok(name) => name,
        Err(e) => {
            error!(
                "Dropping entry {} ('{}' by {}): staging failed: {}",
                entry.id, entry.title, entry.artist, e
            );
            entries::delete(db, media_root, entry).await?;
            return Ok(None);
        }
    };

    if !stager.confirm(catalog, &staged_name).await {
        // The song never arrived. The entry is lost; do not retry it.
        error!(
            "Dropping entry {} ('{}' by {}): never confirmed",
            entry.id, entry.title, entry.artist
        );
        stager.discard(&staged_name).await;
        entries::delete(db, media_root, entry).await?;
        return Ok(None);
    }

    Ok(Some(staged_name))
}

/// Artist of the last playlist item; the silence sentinel counts as absent
fn previous_artist_from(playlist: &[PlaylistItem]) -> Option<String> {
    EngineAdapter::last_artist(playlist).filter(|artist| artist != SILENCE_ARTIST)
}

/// Seconds to wait before injecting the next song
fn injection_wait(remaining_time: u64, crossfade_secs: u64) -> f64 {
    let lead = crossfade_secs as f64 + INJECTION_MARGIN;
    (remaining_time as f64 - lead).max(0.0)
}
