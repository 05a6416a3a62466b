//! Playback engine adapter
//!
//! Wraps the one external, MPD-compatible engine process each station owns:
//! config generation, process lifecycle, and the command surface the
//! scheduler needs. Every command runs over a scoped connection (open,
//! send, read, close); nothing is held across scheduler sleep points except
//! the engine's own blocking `idle` wait.

pub mod client;
pub mod config;

use crate::error::{Error, Result};
use client::{first_of, values_of, EngineConnection};
use crewcast_common::db::Station;
use crewcast_common::events::NowPlaying;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Engine binary, resolved through PATH
const ENGINE_BINARY: &str = "mpd";

/// Delay between connection attempts while the engine starts up
const STARTUP_POLL: Duration = Duration::from_millis(200);

/// One item of the engine's playlist, as reported by the engine itself
#[derive(Debug, Clone)]
pub struct PlaylistItem {
    pub file: String,
    pub artist: Option<String>,
    pub title: Option<String>,
}

/// Catalog view used by the file stager; implemented by [`EngineAdapter`]
/// and by test doubles.
pub trait Catalog {
    /// Ask the engine to rescan its watched directory
    fn refresh(&self) -> impl std::future::Future<Output = Result<()>> + Send;
    /// All files currently known to the engine
    fn files(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// Per-station client for one engine process
pub struct EngineAdapter {
    station_id: i64,
    station_name: String,
    address: String,
    port: u16,
    stream_port: u16,
    engine_dir: PathBuf,
    queue_dir: PathBuf,
    conf_file: PathBuf,
    process: Mutex<Option<Child>>,
}

impl EngineAdapter {
    /// Ports are derived deterministically from the station id; all paths
    /// live under `<root>/stations/<id>/`.
    pub fn new(root: &Path, station: &Station, base_port: u16, stream_base_port: u16) -> Self {
        let engine_dir = root.join("stations").join(station.id.to_string());
        let queue_dir = engine_dir.join("queue");
        let conf_file = engine_dir.join("engine.conf");

        Self {
            station_id: station.id,
            station_name: station.name.clone(),
            address: "127.0.0.1".to_string(),
            port: base_port.saturating_add(station.id as u16),
            stream_port: stream_base_port.saturating_add(station.id as u16),
            engine_dir,
            queue_dir,
            conf_file,
            process: Mutex::new(None),
        }
    }

    pub fn station_id(&self) -> i64 {
        self.station_id
    }

    /// The directory the engine watches; the stager publishes into it
    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    /// Create the station directories and write the engine config
    pub async fn write_config(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.queue_dir).await?;

        let rendered = config::render(&config::EngineConfigParams {
            station_name: &self.station_name,
            bind_address: &self.address,
            port: self.port,
            stream_port: self.stream_port,
            queue_dir: &self.queue_dir,
            pid_file: &self.engine_dir.join("engine.pid"),
            db_file: &self.engine_dir.join("engine.db"),
            sticker_file: &self.engine_dir.join("engine.stickers"),
            log_file: &self.engine_dir.join("engine.log"),
        });
        tokio::fs::write(&self.conf_file, rendered).await?;

        debug!("Wrote engine config for station {}", self.station_id);
        Ok(())
    }

    /// Spawn the engine and block until it accepts connections.
    ///
    /// Connection refusal is retried indefinitely with a short fixed delay
    /// (engine start is typically sub-second); a dead child process is the
    /// only way out of the retry loop.
    pub async fn start(&self) -> Result<()> {
        {
            let mut process = self.process.lock().await;
            if process.is_some() {
                return Err(Error::InvalidState(format!(
                    "engine for station {} already running",
                    self.station_id
                )));
            }

            let child = tokio::process::Command::new(ENGINE_BINARY)
                .arg("--no-daemon")
                .arg(&self.conf_file)
                .spawn()?;
            *process = Some(child);
        }

        loop {
            match self.command("status", &[]).await {
                Ok(_) => break,
                Err(_) => {
                    let mut process = self.process.lock().await;
                    if let Some(child) = process.as_mut() {
                        if let Some(status) = child.try_wait()? {
                            *process = None;
                            return Err(Error::EngineConnection(format!(
                                "engine for station {} exited during startup: {}",
                                self.station_id, status
                            )));
                        }
                    }
                    tokio::time::sleep(STARTUP_POLL).await;
                }
            }
        }

        self.command("update", &[]).await?;
        self.command("consume", &["1"]).await?;
        self.command("play", &[]).await?;

        info!(
            "Engine for station {} accepting connections on port {}",
            self.station_id, self.port
        );
        Ok(())
    }

    /// Terminate the engine process and release the station directory
    pub async fn stop(&self) {
        let mut process = self.process.lock().await;
        if let Some(mut child) = process.take() {
            if let Err(e) = child.kill().await {
                warn!("Could not kill engine for station {}: {}", self.station_id, e);
            }
        }
        drop(process);

        if let Err(e) = tokio::fs::remove_dir_all(&self.engine_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Could not remove engine dir for station {}: {}",
                    self.station_id, e
                );
            }
        }
    }

    /// Run one command over a scoped connection
    pub async fn command(&self, command: &str, args: &[&str]) -> Result<Vec<(String, String)>> {
        let mut conn = EngineConnection::open(&self.address, self.port).await?;
        let result = conn.command(command, args).await;
        conn.close().await;
        result
    }

    /// The engine's current playlist in play order
    pub async fn playlist(&self) -> Result<Vec<PlaylistItem>> {
        let pairs = self.command("playlistinfo", &[]).await?;

        let mut items: Vec<PlaylistItem> = Vec::new();
        for (key, value) in pairs {
            match key.as_str() {
                "file" => items.push(PlaylistItem {
                    file: value,
                    artist: None,
                    title: None,
                }),
                "Artist" => {
                    if let Some(item) = items.last_mut() {
                        item.artist = Some(value);
                    }
                }
                "Title" => {
                    if let Some(item) = items.last_mut() {
                        item.title = Some(value);
                    }
                }
                _ => {}
            }
        }
        Ok(items)
    }

    /// Queue a staged file for playback
    pub async fn enqueue(&self, filename: &str) -> Result<()> {
        self.command("add", &[filename]).await?;
        Ok(())
    }

    /// Resume playback
    pub async fn play(&self) -> Result<()> {
        self.command("play", &[]).await?;
        Ok(())
    }

    /// Apply the crossfade setting
    pub async fn set_crossfade(&self, seconds: u64) -> Result<()> {
        self.command("crossfade", &[&seconds.to_string()]).await?;
        Ok(())
    }

    /// Attach an attribution tag to a catalog file.
    ///
    /// Metadata only: failures are logged by the caller and never fail
    /// playback.
    pub async fn set_sticker(&self, filename: &str, key: &str, value: &str) -> Result<()> {
        self.command("sticker", &["set", "song", filename, key, value])
            .await?;
        Ok(())
    }

    /// Snapshot of what is currently playing.
    ///
    /// Artist and times come back zeroed during a station break.
    pub async fn currently_playing(&self) -> Result<NowPlaying> {
        let not_playing = NowPlaying {
            station_id: self.station_id,
            ..NowPlaying::default()
        };

        let current = self.command("currentsong", &[]).await?;
        let Some(file) = first_of(&current, "file").map(str::to_string) else {
            return Ok(not_playing);
        };

        let status = self.command("status", &[]).await?;
        let Some((elapsed, total)) = first_of(&status, "time").and_then(parse_time) else {
            return Ok(not_playing);
        };

        // Attribution sticker is best-effort metadata.
        let dj = match self.command("sticker", &["get", "song", &file, "dj"]).await {
            Ok(pairs) => first_of(&pairs, "sticker")
                .and_then(|s| s.split_once('='))
                .map(|(_, v)| v.to_string()),
            Err(_) => None,
        };

        Ok(NowPlaying {
            station_id: self.station_id,
            artist: first_of(&current, "Artist").map(str::to_string),
            title: first_of(&current, "Title").map(str::to_string),
            album: first_of(&current, "Album").map(str::to_string),
            dj,
            total_time: total,
            remaining_time: total.saturating_sub(elapsed),
        })
    }

    /// Block until the engine reports a change in `subsystem`
    pub async fn idle(&self, subsystem: &str) -> Result<()> {
        self.command("idle", &[subsystem]).await?;
        Ok(())
    }

    /// Wait out `seconds`, or return early when the playlist changes first.
    ///
    /// A race, not two sequential waits: whichever of the timer and the
    /// engine notification resolves first wins. Returns true when the
    /// engine fired first.
    pub async fn idle_or_wait(&self, seconds: f64) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))) => false,
            result = self.idle("playlist") => result.is_ok(),
        }
    }

    /// Artist of the last playlist item, `None` when the playlist is empty
    pub fn last_artist(playlist: &[PlaylistItem]) -> Option<String> {
        playlist.last().and_then(|item| item.artist.clone())
    }
}

impl Catalog for EngineAdapter {
    async fn refresh(&self) -> Result<()> {
        self.command("update", &[]).await?;
        Ok(())
    }

    async fn files(&self) -> Result<Vec<String>> {
        let pairs = self.command("listall", &[]).await?;
        Ok(values_of(&pairs, "file"))
    }
}

/// Parse the status `time` field (`elapsed:total`, integer seconds)
fn parse_time(time: &str) -> Option<(u64, u64)> {
    let (elapsed, total) = time.split_once(':')?;
    Some((elapsed.parse().ok()?, total.parse().ok()?))
}
