//! Event types and the broadcast event bus
//!
//! Everything the scheduling core makes externally observable flows through
//! [`EventBus`]: song transitions detected on the engine, entries consumed by
//! the scheduler, mood/play-log appends, and queue mutations. Subscribers
//! (the SSE endpoint, the fan-out task, blocked schedulers) each hold their
//! own broadcast receiver; a slow subscriber never blocks a publisher.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Snapshot of what a station's engine is currently playing.
///
/// `artist`/`title` are `None` during a station break (nothing playing or
/// only the silence sentinel loaded); times are zero in that case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NowPlaying {
    pub station_id: i64,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    /// Display name of the contributor, from the engine's sticker store
    pub dj: Option<String>,
    pub total_time: u64,
    pub remaining_time: u64,
}

/// Crewcast event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The engine reported a player transition on a station
    SongChanged {
        station_id: i64,
        previous: Option<NowPlaying>,
        current: NowPlaying,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An entry was consumed by the scheduler and removed from its queue
    SongRemoved {
        station_id: i64,
        player_id: i64,
        artist: String,
        title: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A mood sample was appended for an artist
    MoodLogged {
        station_id: i64,
        artist: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A play was recorded in the play log
    PlayLogged {
        station_id: i64,
        artist: String,
        title: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The pool of schedulable entries changed (song added, queue toggled,
    /// curator replenished). `station_id` of `None` means "any station" -
    /// blocked schedulers treat it as a wakeup regardless.
    QueueChanged {
        station_id: Option<i64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A station was created and should be scheduled
    StationCreated {
        station_id: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A station was removed and its scheduler stopped
    StationRemoved {
        station_id: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl Event {
    /// Event type name, used as the SSE event field
    pub fn type_str(&self) -> &'static str {
        match self {
            Event::SongChanged { .. } => "SongChanged",
            Event::SongRemoved { .. } => "SongRemoved",
            Event::MoodLogged { .. } => "MoodLogged",
            Event::PlayLogged { .. } => "PlayLogged",
            Event::QueueChanged { .. } => "QueueChanged",
            Event::StationCreated { .. } => "StationCreated",
            Event::StationRemoved { .. } => "StationRemoved",
        }
    }
}

/// Broadcast event bus shared by all stations and the control surface
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish an event to all subscribers. No receivers is not an error.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Notify blocked schedulers that the entry pool changed
    pub fn queue_changed(&self, station_id: Option<i64>) {
        self.publish(Event::QueueChanged {
            station_id,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Block until the entry pool changes for `station_id` (or for all
    /// stations), or until the bus is closed.
    ///
    /// Callers that must not miss a wakeup between checking the pool and
    /// blocking should [`subscribe`](Self::subscribe) first and pass the
    /// receiver to [`recv_queue_change`](Self::recv_queue_change).
    pub async fn wait_queue_change(&self, station_id: i64) {
        let mut rx = self.subscribe();
        Self::recv_queue_change(&mut rx, station_id).await;
    }

    /// Drain `rx` until a pool change relevant to `station_id` arrives.
    ///
    /// A lagged receiver returns immediately: missing events means events
    /// definitely happened, so waking the caller is always correct.
    pub async fn recv_queue_change(rx: &mut broadcast::Receiver<Event>, station_id: i64) {
        loop {
            match rx.recv().await {
                Ok(Event::QueueChanged { station_id: sid, .. })
                    if sid.is_none() || sid == Some(station_id) =>
                {
                    return;
                }
                Ok(Event::StationRemoved { station_id: sid, .. }) if sid == station_id => {
                    return;
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => return,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.queue_changed(Some(3));

        match rx.recv().await.unwrap() {
            Event::QueueChanged { station_id, .. } => assert_eq!(station_id, Some(3)),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wait_queue_change_filters_stations() {
        let bus = EventBus::new();

        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_queue_change(2).await })
        };

        // Give the waiter time to subscribe before publishing.
        tokio::task::yield_now().await;
        bus.queue_changed(Some(1)); // different station, ignored
        bus.queue_changed(Some(2)); // this one unblocks

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should unblock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_global_queue_change_wakes_all() {
        let bus = EventBus::new();

        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_queue_change(7).await })
        };

        tokio::task::yield_now().await;
        bus.queue_changed(None);

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("global wakeup should unblock any station")
            .unwrap();
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::SongRemoved {
            station_id: 1,
            player_id: 2,
            artist: "Spoon".into(),
            title: "New York Kiss".into(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"SongRemoved\""));
    }
}
