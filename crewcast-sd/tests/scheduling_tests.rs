//! Integration tests for the selection and staging pipeline
//!
//! Exercises the scheduler's per-iteration behavior without an engine
//! process: selection over real participants, the staging/confirmation
//! contract with a catalog double, and staging-directory eviction.

mod helpers;

use crewcast_sd::db::{entries, players, stations};
use crewcast_sd::engine::Catalog;
use crewcast_sd::lastfm::MetadataClient;
use crewcast_sd::mood::MoodTracker;
use crewcast_sd::selector::Selector;
use crewcast_sd::stager::FileStager;
use crewcast_common::EventBus;
use helpers::{test_db, TestDb};
use std::time::Duration;
use tempfile::TempDir;

fn selector_for(db: &TestDb) -> Selector {
    let tracker = MoodTracker::new(db.pool.clone(), MetadataClient::disabled(), 3600);
    Selector::new(
        db.pool.clone(),
        tracker,
        None,
        db.curator_id,
        db.station.id,
    )
}

fn stager_for(media_root: &TempDir, queue_dir: &TempDir) -> FileStager {
    FileStager::new(
        media_root.path().to_path_buf(),
        queue_dir.path().to_path_buf(),
        Duration::from_millis(200),
        Duration::from_millis(50),
    )
}

/// A catalog that never lists anything: the engine "lost" every file
struct EmptyCatalog;

impl Catalog for EmptyCatalog {
    async fn refresh(&self) -> crewcast_sd::Result<()> {
        Ok(())
    }

    async fn files(&self) -> crewcast_sd::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Three participants, one song each: three selections serve each exactly
/// once, the fourth finds the pool empty.
#[tokio::test]
async fn test_three_participants_each_served_once() {
    let db = test_db().await;
    let media_root = TempDir::new().unwrap();

    let mut expected = Vec::new();
    for name in ["alice", "bob", "carol"] {
        let (player_id, queue_id) = db.add_player(name).await;
        db.add_entry(media_root.path(), queue_id, &format!("Band {name}"), "song")
            .await;
        expected.push(player_id);
    }

    let selector = selector_for(&db);
    let bus = EventBus::new();
    let mut previous: Option<i64> = None;
    let mut served = Vec::new();

    for _ in 0..3 {
        let participants = stations::participants(&db.pool, db.station.id)
            .await
            .unwrap();
        let entry = selector
            .select(&db.station, &participants, previous, None, &bus)
            .await
            .unwrap()
            .expect("someone still has a song queued");

        let owner = players::owner_of_queue(&db.pool, entry.queue_id)
            .await
            .unwrap();
        served.push(owner.id);
        previous = Some(owner.id);

        // The scheduler consumes the entry after hand-off.
        entries::delete(&db.pool, media_root.path(), &entry)
            .await
            .unwrap();
    }

    served.sort_unstable();
    expected.sort_unstable();
    assert_eq!(served, expected);

    let participants = stations::participants(&db.pool, db.station.id)
        .await
        .unwrap();
    let entry = selector
        .select(&db.station, &participants, previous, None, &bus)
        .await
        .unwrap();
    assert!(entry.is_none(), "pool is exhausted");
}

/// Confirmation timeout drops the entry and selection moves on to the next
/// participant instead of retrying the lost one.
#[tokio::test]
async fn test_confirmation_timeout_drops_entry_and_moves_on() {
    let db = test_db().await;
    let media_root = TempDir::new().unwrap();
    let queue_dir = TempDir::new().unwrap();

    let (alice, alice_queue) = db.add_player("alice").await;
    db.add_entry(media_root.path(), alice_queue, "Band A", "lost song")
        .await;
    let (_bob, bob_queue) = db.add_player("bob").await;
    db.add_entry(media_root.path(), bob_queue, "Band B", "next song")
        .await;

    let selector = selector_for(&db);
    let stager = stager_for(&media_root, &queue_dir);
    let bus = EventBus::new();

    let participants = stations::participants(&db.pool, db.station.id)
        .await
        .unwrap();
    let entry = selector
        .select(&db.station, &participants, None, None, &bus)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.artist, "Band A");

    let staged = stager.stage(&entry, alice).await.unwrap();
    let confirmed = stager.confirm(&EmptyCatalog, &staged).await;
    assert!(!confirmed, "the catalog never saw the file");

    // The loop's failure path: discard the staged file, consume the entry.
    stager.discard(&staged).await;
    entries::delete(&db.pool, media_root.path(), &entry)
        .await
        .unwrap();

    let remaining = entries::next_for(&db.pool, alice_queue, db.station.id)
        .await
        .unwrap();
    assert!(remaining.is_none(), "the lost entry is gone for good");

    let participants = stations::participants(&db.pool, db.station.id)
        .await
        .unwrap();
    let entry = selector
        .select(&db.station, &participants, None, None, &bus)
        .await
        .unwrap()
        .expect("selection proceeds past the loss");
    assert_eq!(entry.artist, "Band B");
}

/// A contributor's file vanishing from the media store is not fatal: the
/// entry is consumed and selection proceeds to the next participant.
#[tokio::test]
async fn test_missing_source_dropped_and_selection_moves_on() {
    let db = test_db().await;
    let media_root = TempDir::new().unwrap();
    let queue_dir = TempDir::new().unwrap();

    let (alice, alice_queue) = db.add_player("alice").await;
    db.add_entry(media_root.path(), alice_queue, "Band A", "vanished")
        .await;
    let (_bob, bob_queue) = db.add_player("bob").await;
    db.add_entry(media_root.path(), bob_queue, "Band B", "next song")
        .await;

    let selector = selector_for(&db);
    let stager = stager_for(&media_root, &queue_dir);
    let bus = EventBus::new();

    let participants = stations::participants(&db.pool, db.station.id)
        .await
        .unwrap();
    let entry = selector
        .select(&db.station, &participants, None, None, &bus)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.artist, "Band A");

    // The backing file disappears before the loop stages it.
    std::fs::remove_file(media_root.path().join(&entry.song_path)).unwrap();

    let staged = crewcast_sd::scheduler::stage_checked(
        &stager,
        &EmptyCatalog,
        &db.pool,
        media_root.path(),
        &entry,
        alice,
    )
    .await
    .expect("a lost source must not error the loop");
    assert!(staged.is_none());

    let remaining = entries::next_for(&db.pool, alice_queue, db.station.id)
        .await
        .unwrap();
    assert!(remaining.is_none(), "the doomed entry is gone");

    let participants = stations::participants(&db.pool, db.station.id)
        .await
        .unwrap();
    let entry = selector
        .select(&db.station, &participants, None, None, &bus)
        .await
        .unwrap()
        .expect("the loop keeps scheduling");
    assert_eq!(entry.artist, "Band B");
}

/// Staged files not referenced by the playlist are evicted; referenced ones
/// survive.
#[tokio::test]
async fn test_staged_files_evicted_when_unreferenced() {
    let db = test_db().await;
    let media_root = TempDir::new().unwrap();
    let queue_dir = TempDir::new().unwrap();

    let (alice, alice_queue) = db.add_player("alice").await;
    db.add_entry(media_root.path(), alice_queue, "Band A", "first")
        .await;
    db.add_entry(media_root.path(), alice_queue, "Band A", "second")
        .await;

    let stager = stager_for(&media_root, &queue_dir);

    let first = entries::next_for(&db.pool, alice_queue, db.station.id)
        .await
        .unwrap()
        .unwrap();
    let first_staged = stager.stage(&first, alice).await.unwrap();
    entries::delete(&db.pool, media_root.path(), &first)
        .await
        .unwrap();

    let second = entries::next_for(&db.pool, alice_queue, db.station.id)
        .await
        .unwrap()
        .unwrap();
    let second_staged = stager.stage(&second, alice).await.unwrap();

    // Only the second file is still on the engine's playlist.
    let removed = stager
        .purge_unused(&[second_staged.clone()])
        .await
        .unwrap();

    assert_eq!(removed, vec![first_staged.clone()]);
    assert!(!queue_dir.path().join(&first_staged).exists());
    assert!(queue_dir.path().join(&second_staged).exists());
}
