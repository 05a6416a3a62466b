//! Scheduler registry
//!
//! Process-wide table of running station schedulers keyed by station id.
//! The registry's mutex protects only the map; schedulers themselves are
//! fully independent and share no lock.

use crate::autofill::{Autofill, AutofillStrategy};
use crate::db::{players, stations, SchedulerConfig};
use crate::engine::EngineAdapter;
use crate::error::{Error, Result};
use crate::lastfm::MetadataClient;
use crate::mood::MoodTracker;
use crate::scheduler::StationScheduler;
use crate::selector::Selector;
use crate::stager::FileStager;
use crewcast_common::db::Station;
use crewcast_common::EventBus;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

pub struct SchedulerRegistry {
    db: Pool<Sqlite>,
    bus: EventBus,
    config: SchedulerConfig,
    /// Root folder: media store lives directly under it, engine state under
    /// `stations/<id>/`
    root: PathBuf,
    schedulers: Mutex<HashMap<i64, Arc<StationScheduler>>>,
}

impl SchedulerRegistry {
    pub fn new(db: Pool<Sqlite>, bus: EventBus, config: SchedulerConfig, root: PathBuf) -> Self {
        Self {
            db,
            bus,
            config,
            root,
            schedulers: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the scheduler for `station`, starting it when created.
    ///
    /// Idempotent per station id: a second create for a registered station
    /// returns the existing scheduler untouched. When the freshly built
    /// scheduler fails to start it is deregistered and the error surfaces.
    pub async fn create(&self, station: &Station) -> Result<Arc<StationScheduler>> {
        if let Some(existing) = self.get(station.id) {
            return Ok(existing);
        }

        let scheduler = Arc::new(self.build(station).await?);

        {
            let mut schedulers = self.schedulers.lock().unwrap();
            // A concurrent create may have won the race.
            if let Some(existing) = schedulers.get(&station.id) {
                return Ok(existing.clone());
            }
            schedulers.insert(station.id, scheduler.clone());
        }

        if let Err(e) = scheduler.start().await {
            self.schedulers.lock().unwrap().remove(&station.id);
            return Err(e);
        }
        Ok(scheduler)
    }

    /// Pop and stop the scheduler for `station_id`.
    ///
    /// An unknown id is a lifecycle bug upstream and fails loudly.
    pub async fn remove(&self, station_id: i64) -> Result<()> {
        let scheduler = self
            .schedulers
            .lock()
            .unwrap()
            .remove(&station_id)
            .ok_or_else(|| {
                Error::NotFound(format!("no scheduler for station {station_id}"))
            })?;

        scheduler.stop().await;
        info!("Scheduler for station {} removed", station_id);
        Ok(())
    }

    pub fn get(&self, station_id: i64) -> Option<Arc<StationScheduler>> {
        self.schedulers.lock().unwrap().get(&station_id).cloned()
    }

    pub fn get_all(&self) -> Vec<Arc<StationScheduler>> {
        self.schedulers.lock().unwrap().values().cloned().collect()
    }

    /// Stop every registered scheduler; used at shutdown
    pub async fn stop_all(&self) {
        let schedulers: Vec<Arc<StationScheduler>> = {
            let mut map = self.schedulers.lock().unwrap();
            map.drain().map(|(_, s)| s).collect()
        };
        for scheduler in schedulers {
            scheduler.stop().await;
        }
    }

    /// Wire up one station's scheduler from the loaded configuration
    async fn build(&self, station: &Station) -> Result<StationScheduler> {
        let metadata = MetadataClient::new(self.config.lastfm_api_key.clone());
        let tracker = MoodTracker::new(
            self.db.clone(),
            metadata.clone(),
            self.config.mood_window_secs,
        );

        let curator = players::curator(&self.db).await?;
        let main_station = stations::main_station(&self.db).await?;

        let autofill = if self.config.shake_things_up > 0 {
            let strategy = AutofillStrategy::from_str(&self.config.autofill_strategy)?;
            Some(Autofill::new(
                self.db.clone(),
                self.root.clone(),
                tracker.clone(),
                metadata,
                strategy,
                self.config.shake_things_up,
                self.config.shake_things_up_minimum,
                self.config.autofill_mood_top_artists,
            ))
        } else {
            None
        };

        let selector = Selector::new(
            self.db.clone(),
            tracker,
            autofill,
            curator.id,
            main_station.id,
        );

        let engine = EngineAdapter::new(
            &self.root,
            station,
            self.config.engine_base_port,
            self.config.stream_base_port,
        );
        let stager = FileStager::new(
            self.root.clone(),
            engine.queue_dir().to_path_buf(),
            Duration::from_secs(self.config.stage_confirm_timeout_secs),
            Duration::from_millis(self.config.stage_confirm_poll_ms),
        );

        Ok(StationScheduler::new(
            station.clone(),
            self.db.clone(),
            self.bus.clone(),
            selector,
            engine,
            stager,
            self.root.clone(),
            self.config.crossfade_secs,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::settings::load_scheduler_config;
    use crate::db::test_support::fixture;

    #[tokio::test]
    async fn test_remove_unknown_station_is_an_error() {
        let fx = fixture().await;
        let config = load_scheduler_config(&fx.pool).await.unwrap();
        let registry = SchedulerRegistry::new(
            fx.pool.clone(),
            EventBus::new(),
            config,
            std::env::temp_dir(),
        );

        match registry.remove(99).await {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lookups_on_empty_registry() {
        let fx = fixture().await;
        let config = load_scheduler_config(&fx.pool).await.unwrap();
        let registry = SchedulerRegistry::new(
            fx.pool.clone(),
            EventBus::new(),
            config,
            std::env::temp_dir(),
        );

        assert!(registry.get(fx.station_id).is_none());
        assert!(registry.get_all().is_empty());
    }
}
